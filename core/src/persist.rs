use crate::{DocId, DocMeta, InvertedIndex, Posting, TermId};
use anyhow::Result;
use bincode;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fs::{create_dir_all, File};
use std::io::{Read, Write};
use std::path::{Path, PathBuf};

#[derive(Debug, Serialize, Deserialize)]
pub struct MetaFile {
    pub num_docs: u32,
    pub created_at: String,
    pub version: u32,
}

pub struct IndexPaths {
    pub root: PathBuf,
}

impl IndexPaths {
    pub fn new<P: AsRef<Path>>(root: P) -> Self {
        Self { root: root.as_ref().to_path_buf() }
    }
    fn dictionary(&self) -> PathBuf { self.root.join("dictionary.bin") }
    fn docs(&self) -> PathBuf { self.root.join("docs.bin") }
    fn meta(&self) -> PathBuf { self.root.join("meta.json") }
    fn postings_dir(&self) -> PathBuf { self.root.join("postings") }
}

pub fn save_dictionary(paths: &IndexPaths, dict: &HashMap<String, TermId>) -> Result<()> {
    create_dir_all(&paths.root)?;
    let mut f = File::create(paths.dictionary())?;
    let bytes = bincode::serialize(dict)?;
    f.write_all(&bytes)?;
    Ok(())
}

pub fn load_dictionary(paths: &IndexPaths) -> Result<HashMap<String, TermId>> {
    let mut f = File::open(paths.dictionary())?;
    let mut buf = Vec::new();
    f.read_to_end(&mut buf)?;
    let dict = bincode::deserialize(&buf)?;
    Ok(dict)
}

pub fn save_docs(paths: &IndexPaths, docs: &HashMap<DocId, DocMeta>) -> Result<()> {
    let mut f = File::create(paths.docs())?;
    let bytes = bincode::serialize(docs)?;
    f.write_all(&bytes)?;
    Ok(())
}

pub fn load_docs(paths: &IndexPaths) -> Result<HashMap<DocId, DocMeta>> {
    let mut f = File::open(paths.docs())?;
    let mut buf = Vec::new();
    f.read_to_end(&mut buf)?;
    let docs = bincode::deserialize(&buf)?;
    Ok(docs)
}

pub fn save_postings_for_term(paths: &IndexPaths, term_id: TermId, postings: &[Posting]) -> Result<()> {
    let dir = paths.postings_dir();
    create_dir_all(&dir)?;
    let file = dir.join(format!("{term_id:08}.postings.bin"));
    let mut f = File::create(file)?;
    let bytes = bincode::serialize(postings)?;
    f.write_all(&bytes)?;
    Ok(())
}

pub fn load_postings_for_term(paths: &IndexPaths, term_id: TermId) -> Result<Vec<Posting>> {
    let file = paths.postings_dir().join(format!("{term_id:08}.postings.bin"));
    let mut f = File::open(file)?;
    let mut buf = Vec::new();
    f.read_to_end(&mut buf)?;
    let postings = bincode::deserialize(&buf)?;
    Ok(postings)
}

pub fn save_meta(paths: &IndexPaths, meta: &MetaFile) -> Result<()> {
    create_dir_all(&paths.root)?;
    let mut f = File::create(paths.meta())?;
    let json = serde_json::to_string_pretty(meta)?;
    f.write_all(json.as_bytes())?;
    Ok(())
}

pub fn load_meta(paths: &IndexPaths) -> Result<MetaFile> {
    let mut f = File::open(paths.meta())?;
    let mut buf = String::new();
    f.read_to_string(&mut buf)?;
    let meta: MetaFile = serde_json::from_str(&buf)?;
    Ok(meta)
}

/// Persist a built index under the index directory so later runs reload it
/// instead of rebuilding.
pub fn save_index(paths: &IndexPaths, index: &InvertedIndex, meta: &MetaFile) -> Result<()> {
    save_dictionary(paths, &index.dictionary)?;
    save_docs(paths, &index.docs)?;
    for (term_id, postings) in &index.postings {
        save_postings_for_term(paths, *term_id, postings)?;
    }
    save_meta(paths, meta)?;
    Ok(())
}

/// Load a previously saved index in full. Every dictionary term must have a
/// postings file; a term with no occurrences is never persisted.
pub fn load_index(paths: &IndexPaths) -> Result<InvertedIndex> {
    let dictionary = load_dictionary(paths)?;
    let docs = load_docs(paths)?;
    let meta = load_meta(paths)?;
    let mut postings: HashMap<TermId, Vec<Posting>> = HashMap::with_capacity(dictionary.len());
    for term_id in dictionary.values() {
        postings.insert(*term_id, load_postings_for_term(paths, *term_id)?);
    }
    Ok(InvertedIndex { dictionary, postings, docs, num_docs: meta.num_docs })
}
