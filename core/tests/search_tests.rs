use quarry_core::index::{DocMeta, IndexBuilder};
use quarry_core::query::parse_query;
use quarry_core::search::evaluate;
use quarry_core::tokenizer::Analyzer;
use quarry_core::{DocId, InvertedIndex};

fn meta(name: &str) -> DocMeta {
    DocMeta { external_id: name.to_string(), title: name.to_string(), text_path: None }
}

fn build(docs: &[&str]) -> (Analyzer, InvertedIndex) {
    let analyzer = Analyzer::default();
    let mut builder = IndexBuilder::new();
    for (i, body) in docs.iter().enumerate() {
        let tokens = analyzer.analyze(body);
        builder.add_document(meta(&format!("doc{i}")), &tokens);
    }
    (analyzer, builder.finish())
}

fn run(query: &str, analyzer: &Analyzer, index: &InvertedIndex) -> Vec<DocId> {
    let expr = parse_query(query, analyzer).expect("query parses");
    evaluate(&expr, index)
}

// Two-document corpus exercised throughout: doc 0 = "computer science data",
// doc 1 = "data science only" ("only" is a stop word, so doc 1 indexes
// data@0 and science@1).
fn tiny_corpus() -> (Analyzer, InvertedIndex) {
    build(&["computer science data", "data science only"])
}

#[test]
fn and_intersects() {
    let (a, idx) = tiny_corpus();
    assert_eq!(run("computer AND science", &a, &idx), vec![0]);
}

#[test]
fn or_unions() {
    let (a, idx) = tiny_corpus();
    assert_eq!(run("computer OR data", &a, &idx), vec![0, 1]);
}

#[test]
fn infix_not_subtracts() {
    // Both documents contain "science" and "data", so the difference is empty.
    let (a, idx) = tiny_corpus();
    assert_eq!(run("science NOT data", &a, &idx), Vec::<DocId>::new());
}

#[test]
fn prefix_not_complements_against_universe() {
    let (a, idx) = tiny_corpus();
    assert_eq!(run("NOT computer", &a, &idx), vec![1]);
}

#[test]
fn double_negation_restores_the_set() {
    let (a, idx) = tiny_corpus();
    assert_eq!(run("NOT NOT computer", &a, &idx), run("computer", &a, &idx));
    assert_eq!(run("NOT NOT quantum", &a, &idx), run("quantum", &a, &idx));
}

#[test]
fn proximity_respects_window() {
    let (a, idx) = tiny_corpus();
    // doc 0: computer@0, science@1; distance 1.
    assert_eq!(run("computer science /1", &a, &idx), vec![0]);
    assert_eq!(run("computer science /0", &a, &idx), Vec::<DocId>::new());
}

#[test]
fn proximity_is_symmetric() {
    let (a, idx) = tiny_corpus();
    assert_eq!(
        run("computer science /1", &a, &idx),
        run("science computer /1", &a, &idx)
    );
}

#[test]
fn proximity_widens_monotonically() {
    let (a, idx) = tiny_corpus();
    for narrow in 0..3u32 {
        let close = run(&format!("computer data /{narrow}"), &a, &idx);
        let wide = run(&format!("computer data /{}", narrow + 1), &a, &idx);
        assert!(close.iter().all(|d| wide.contains(d)));
    }
}

#[test]
fn proximity_implies_cooccurrence() {
    let (a, idx) = tiny_corpus();
    let prox = run("science data /5", &a, &idx);
    let both = run("science AND data", &a, &idx);
    assert!(prox.iter().all(|d| both.contains(d)));
}

#[test]
fn proximity_counts_stopword_slots() {
    // "of" is removed but still occupies position 1, so the surviving terms
    // sit two apart.
    let (a, idx) = build(&["computer of science"]);
    assert_eq!(run("computer science /1", &a, &idx), Vec::<DocId>::new());
    assert_eq!(run("computer science /2", &a, &idx), vec![0]);
}

#[test]
fn unknown_term_yields_empty_set_without_error() {
    let (a, idx) = tiny_corpus();
    assert_eq!(run("quantum", &a, &idx), Vec::<DocId>::new());
    assert_eq!(run("quantum AND computer", &a, &idx), Vec::<DocId>::new());
    assert_eq!(run("quantum OR computer", &a, &idx), vec![0]);
}

#[test]
fn stopword_query_term_matches_nothing() {
    let (a, idx) = tiny_corpus();
    assert_eq!(run("the", &a, &idx), Vec::<DocId>::new());
}

#[test]
fn and_results_subset_both_operands() {
    let (a, idx) = tiny_corpus();
    let and = run("science AND data", &a, &idx);
    let left = run("science", &a, &idx);
    let right = run("data", &a, &idx);
    assert!(and.iter().all(|d| left.contains(d)));
    assert!(and.iter().all(|d| right.contains(d)));
}

#[test]
fn or_results_superset_both_operands() {
    let (a, idx) = tiny_corpus();
    let or = run("computer OR data", &a, &idx);
    for operand in ["computer", "data"] {
        assert!(run(operand, &a, &idx).iter().all(|d| or.contains(d)));
    }
}

#[test]
fn termless_documents_still_count_for_not() {
    // Doc 2 is all stop words: it indexes nothing but belongs to the
    // universe, so NOT must report it.
    let (a, idx) = build(&["computer science data", "data science only", "the and of"]);
    assert_eq!(idx.universe(), vec![0, 1, 2]);
    assert_eq!(run("NOT computer", &a, &idx), vec![1, 2]);
    assert_eq!(run("NOT quantum", &a, &idx), vec![0, 1, 2]);
}

#[test]
fn precedence_and_grouping_change_results() {
    let (a, idx) = build(&["computer science data", "data science only", "quantum leap"]);
    // AND binds tighter: quantum OR (computer AND science) = {2} U {0}.
    assert_eq!(run("quantum OR computer AND science", &a, &idx), vec![0, 2]);
    // Grouping forces the union first: (quantum OR computer) AND science = {0}.
    assert_eq!(run("(quantum OR computer) AND science", &a, &idx), vec![0]);
}

#[test]
fn query_terms_stem_to_index_terms() {
    let (a, idx) = build(&["running dogs", "sleeping cats"]);
    assert_eq!(run("run", &a, &idx), vec![0]);
    assert_eq!(run("runs", &a, &idx), vec![0]);
    assert_eq!(run("dog AND running", &a, &idx), vec![0]);
    assert_eq!(run("cat", &a, &idx), vec![1]);
}
