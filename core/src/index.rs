use serde::{Deserialize, Serialize};
use std::collections::HashMap;

pub type TermId = u32;
pub type DocId = u32;
pub type Position = u32;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DocMeta {
    pub external_id: String,
    pub title: String,
    /// Relative path to the stored full text for snippet extraction, e.g., texts/{doc_id}.txt
    pub text_path: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Posting {
    pub doc_id: DocId,
    /// Zero-based token positions of the term in this document, strictly increasing.
    pub positions: Vec<Position>,
}

#[derive(Default, Serialize, Deserialize)]
pub struct InvertedIndex {
    pub dictionary: HashMap<String, TermId>,
    pub postings: HashMap<TermId, Vec<Posting>>, // postings sorted by doc_id
    pub docs: HashMap<DocId, DocMeta>,
    pub num_docs: u32,
}

impl InvertedIndex {
    pub fn new() -> Self {
        Self::default()
    }

    /// Positional postings for a term, or `None` when the term never occurs.
    pub fn postings_for(&self, term: &str) -> Option<&[Posting]> {
        self.dictionary
            .get(term)
            .and_then(|tid| self.postings.get(tid))
            .map(Vec::as_slice)
    }

    /// Every doc id known to the index, sorted. Documents with no surviving
    /// terms are included; NOT complements against this set.
    pub fn universe(&self) -> Vec<DocId> {
        let mut ids: Vec<DocId> = self.docs.keys().copied().collect();
        ids.sort_unstable();
        ids
    }

    pub fn num_terms(&self) -> usize {
        self.dictionary.len()
    }
}

/// Accumulates normalized term streams into an [`InvertedIndex`].
///
/// Construction is single-pass: each document's (term, position) pairs are
/// folded in once, then `finish` freezes the index. The index must not be
/// queried before `finish` returns.
#[derive(Default)]
pub struct IndexBuilder {
    index: InvertedIndex,
    next_doc_id: DocId,
    next_term_id: TermId,
}

impl IndexBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a document and append its positions to the affected terms.
    ///
    /// Positions must arrive in increasing order, as produced by
    /// [`crate::tokenizer::Analyzer::analyze`]. A document with an empty term
    /// stream still joins the universe.
    pub fn add_document(&mut self, meta: DocMeta, terms: &[(String, usize)]) -> DocId {
        let doc_id = self.next_doc_id;
        self.next_doc_id += 1;
        self.index.docs.insert(doc_id, meta);

        for (term, pos) in terms {
            let term_id = match self.index.dictionary.get(term) {
                Some(&id) => id,
                None => {
                    let id = self.next_term_id;
                    self.next_term_id += 1;
                    self.index.dictionary.insert(term.clone(), id);
                    id
                }
            };
            let plist = self.index.postings.entry(term_id).or_default();
            match plist.last_mut() {
                Some(last) if last.doc_id == doc_id => last.positions.push(*pos as Position),
                _ => plist.push(Posting { doc_id, positions: vec![*pos as Position] }),
            }
        }
        doc_id
    }

    /// Mutable access to a registered document's metadata, so callers can
    /// record the stored-text path once the doc id is known.
    pub fn doc_meta_mut(&mut self, doc_id: DocId) -> Option<&mut DocMeta> {
        self.index.docs.get_mut(&doc_id)
    }

    pub fn finish(mut self) -> InvertedIndex {
        // Doc ids are handed out in increasing order, but lookups merge-walk
        // postings by doc id, so the sorted invariant is enforced here rather
        // than assumed from insertion order.
        for plist in self.index.postings.values_mut() {
            plist.sort_by_key(|p| p.doc_id);
        }
        self.index.num_docs = self.next_doc_id;
        tracing::debug!(
            num_docs = self.index.num_docs,
            num_terms = self.index.dictionary.len(),
            "index construction finished"
        );
        self.index
    }
}
