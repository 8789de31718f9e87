use crate::index::{DocId, InvertedIndex, Position};
use crate::query::QueryExpr;
use std::cmp::Ordering;

/// Evaluate a query against an immutable index.
///
/// Returns the matching doc ids, sorted and duplicate-free. A term that does
/// not occur in the index contributes an empty set; absence is never an
/// error. NOT complements against the full universe of documents known at
/// build time, including documents that indexed no terms at all.
pub fn evaluate(expr: &QueryExpr, index: &InvertedIndex) -> Vec<DocId> {
    match expr {
        QueryExpr::Term(term) => term_docs(index, term),
        QueryExpr::And(children) => {
            let mut iter = children.iter();
            let mut acc = match iter.next() {
                Some(child) => evaluate(child, index),
                None => Vec::new(),
            };
            for child in iter {
                if acc.is_empty() {
                    break;
                }
                acc = intersect_sorted(&acc, &evaluate(child, index));
            }
            acc
        }
        QueryExpr::Or(children) => {
            let mut acc = Vec::new();
            for child in children {
                acc = union_sorted(&acc, &evaluate(child, index));
            }
            acc
        }
        QueryExpr::Not(child) => difference_sorted(&index.universe(), &evaluate(child, index)),
        QueryExpr::Proximity { left, right, window } => {
            proximity_docs(index, left, right, *window)
        }
    }
}

fn term_docs(index: &InvertedIndex, term: &str) -> Vec<DocId> {
    match index.postings_for(term) {
        Some(postings) => postings.iter().map(|p| p.doc_id).collect(),
        None => Vec::new(),
    }
}

/// Documents where `left` and `right` occur within `window` positions of
/// each other, in either order. Walks the two doc-sorted posting lists in
/// step; for each common document the position lists are merged with two
/// pointers, so the check is linear in the combined posting length.
fn proximity_docs(index: &InvertedIndex, left: &str, right: &str, window: u32) -> Vec<DocId> {
    let (a, b) = match (index.postings_for(left), index.postings_for(right)) {
        (Some(a), Some(b)) => (a, b),
        _ => return Vec::new(),
    };
    let mut out = Vec::new();
    let (mut i, mut j) = (0, 0);
    while i < a.len() && j < b.len() {
        match a[i].doc_id.cmp(&b[j].doc_id) {
            Ordering::Less => i += 1,
            Ordering::Greater => j += 1,
            Ordering::Equal => {
                if within_window(&a[i].positions, &b[j].positions, window) {
                    out.push(a[i].doc_id);
                }
                i += 1;
                j += 1;
            }
        }
    }
    out
}

/// True if any pair drawn from the two increasing position lists is at most
/// `window` apart. Advancing the smaller position can only shrink the gap,
/// so each list is scanned once.
fn within_window(a: &[Position], b: &[Position], window: u32) -> bool {
    let (mut i, mut j) = (0, 0);
    while i < a.len() && j < b.len() {
        if a[i].abs_diff(b[j]) <= window {
            return true;
        }
        if a[i] < b[j] {
            i += 1;
        } else {
            j += 1;
        }
    }
    false
}

fn intersect_sorted(a: &[DocId], b: &[DocId]) -> Vec<DocId> {
    let mut out = Vec::new();
    let (mut i, mut j) = (0, 0);
    while i < a.len() && j < b.len() {
        match a[i].cmp(&b[j]) {
            Ordering::Equal => {
                out.push(a[i]);
                i += 1;
                j += 1;
            }
            Ordering::Less => i += 1,
            Ordering::Greater => j += 1,
        }
    }
    out
}

fn union_sorted(a: &[DocId], b: &[DocId]) -> Vec<DocId> {
    let mut out = Vec::with_capacity(a.len().max(b.len()));
    let (mut i, mut j) = (0, 0);
    while i < a.len() && j < b.len() {
        match a[i].cmp(&b[j]) {
            Ordering::Equal => {
                out.push(a[i]);
                i += 1;
                j += 1;
            }
            Ordering::Less => {
                out.push(a[i]);
                i += 1;
            }
            Ordering::Greater => {
                out.push(b[j]);
                j += 1;
            }
        }
    }
    out.extend_from_slice(&a[i..]);
    out.extend_from_slice(&b[j..]);
    out
}

fn difference_sorted(a: &[DocId], b: &[DocId]) -> Vec<DocId> {
    let mut out = Vec::new();
    let (mut i, mut j) = (0, 0);
    while i < a.len() && j < b.len() {
        match a[i].cmp(&b[j]) {
            Ordering::Equal => {
                i += 1;
                j += 1;
            }
            Ordering::Less => {
                out.push(a[i]);
                i += 1;
            }
            Ordering::Greater => j += 1,
        }
    }
    out.extend_from_slice(&a[i..]);
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn merge_helpers() {
        assert_eq!(intersect_sorted(&[1, 3, 5], &[2, 3, 5, 7]), vec![3, 5]);
        assert_eq!(union_sorted(&[1, 3], &[2, 3, 4]), vec![1, 2, 3, 4]);
        assert_eq!(difference_sorted(&[1, 2, 3, 4], &[2, 4]), vec![1, 3]);
        assert_eq!(intersect_sorted(&[], &[1]), Vec::<DocId>::new());
        assert_eq!(union_sorted(&[], &[]), Vec::<DocId>::new());
    }

    #[test]
    fn window_check_walks_both_lists() {
        assert!(within_window(&[0, 10], &[12], 2));
        assert!(!within_window(&[0, 10], &[13], 2));
        // Window zero only matches identical positions.
        assert!(within_window(&[4], &[4], 0));
        assert!(!within_window(&[4], &[5], 0));
        assert!(!within_window(&[], &[1], 100));
    }
}
