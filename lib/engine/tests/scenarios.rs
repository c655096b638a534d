//! End-to-end scenarios for the query endpoint pipeline: parse, plan,
//! quota-bounded execution and continuation handling.

use oxrdf::{NamedNode, Term, Triple};
use rdf_quanta_engine::{
    Dataset, Graph, GraphConfig, QueryEvaluationError, QueryRequest, QueryResponse,
    evaluate_request,
};
use rdf_quanta_storage::MemoryGraph;
use std::sync::Arc;

fn ex(name: &str) -> NamedNode {
    NamedNode::new_unchecked(format!("http://example.org/{name}"))
}

fn term(name: &str) -> Term {
    ex(name).into()
}

fn triple(s: &str, p: &str, o: &str) -> Triple {
    Triple::new(ex(s), ex(p), ex(o))
}

fn config(quota_ms: u64, max_results: usize) -> GraphConfig {
    GraphConfig {
        name: "test".to_owned(),
        description: String::new(),
        quota_ms,
        max_results,
        distinct_cap: 100_000,
        publish: false,
        example_queries: Vec::new(),
    }
}

fn dataset(
    triples: Vec<Triple>,
    quota_ms: u64,
    max_results: usize,
) -> (Dataset, Arc<MemoryGraph>) {
    let backend = Arc::new(MemoryGraph::from_triples(triples));
    let graph = Graph::new(
        Arc::clone(&backend) as Arc<dyn rdf_quanta_storage::GraphBackend>,
        config(quota_ms, max_results),
    );
    (Dataset::stateless().with_graph(graph), backend)
}

fn query(dataset: &Dataset, text: &str) -> QueryResponse {
    evaluate_request(
        dataset,
        &QueryRequest {
            query: Some(text.to_owned()),
            graph: "test".to_owned(),
            continuation: None,
        },
    )
    .unwrap()
}

fn resume(dataset: &Dataset, continuation: &str) -> QueryResponse {
    evaluate_request(
        dataset,
        &QueryRequest {
            query: None,
            graph: "test".to_owned(),
            continuation: Some(continuation.to_owned()),
        },
    )
    .unwrap()
}

fn values(page: &QueryResponse, variable: &str) -> Vec<Term> {
    page.bindings
        .iter()
        .map(|mapping| mapping.get(variable).cloned().unwrap())
        .collect()
}

// S1: a single triple pattern, no preemption.
#[test]
fn single_pattern_without_preemption() {
    let (dataset, _) = dataset(
        vec![triple("a", "p", "b"), triple("a", "p", "c")],
        1_000_000,
        100,
    );
    let page = query(
        &dataset,
        "SELECT ?x WHERE { <http://example.org/a> <http://example.org/p> ?x }",
    );
    assert_eq!(values(&page, "x"), vec![term("b"), term("c")]);
    assert!(page.next.is_none());
}

// S2: preemption forced by the result cap; two pages exactly.
#[test]
fn result_cap_produces_two_pages() {
    let (dataset, _) = dataset(
        vec![triple("a", "p", "b"), triple("a", "p", "c")],
        1_000_000,
        1,
    );
    let first = query(
        &dataset,
        "SELECT ?x WHERE { <http://example.org/a> <http://example.org/p> ?x }",
    );
    assert_eq!(values(&first, "x"), vec![term("b")]);
    let continuation = first.next.expect("the first page must carry a continuation");

    let second = resume(&dataset, &continuation);
    assert_eq!(values(&second, "x"), vec![term("c")]);
    assert!(second.next.is_none());
}

// S3: an index join across two patterns.
#[test]
fn join_across_two_patterns() {
    let (dataset, _) = dataset(
        vec![triple("a", "p", "b"), triple("b", "q", "c")],
        1_000_000,
        100,
    );
    let page = query(
        &dataset,
        "SELECT ?y ?z WHERE { ?x <http://example.org/p> ?y . ?y <http://example.org/q> ?z }",
    );
    assert_eq!(page.bindings.len(), 1);
    assert_eq!(page.bindings[0].get("y"), Some(&term("b")));
    assert_eq!(page.bindings[0].get("z"), Some(&term("c")));
    assert_eq!(page.bindings[0].get("x"), None);
}

// S4: OPTIONAL preserves the left binding without a right match.
#[test]
fn optional_preserves_left() {
    let (dataset, _) = dataset(vec![triple("a", "p", "b")], 1_000_000, 100);
    let page = query(
        &dataset,
        "SELECT ?x ?y WHERE { <http://example.org/a> <http://example.org/p> ?x \
         OPTIONAL { ?x <http://example.org/q> ?y } }",
    );
    assert_eq!(page.bindings.len(), 1);
    assert_eq!(page.bindings[0].get("x"), Some(&term("b")));
    assert_eq!(page.bindings[0].get("y"), None);
}

// S5: a tampered continuation is rejected without touching a transaction.
#[test]
fn tampered_continuation_is_rejected() {
    let (dataset, backend) = dataset(
        vec![triple("a", "p", "b"), triple("a", "p", "c")],
        1_000_000,
        1,
    );
    let first = query(
        &dataset,
        "SELECT ?x WHERE { <http://example.org/a> <http://example.org/p> ?x }",
    );
    let continuation = first.next.unwrap();
    let commits_before = backend.commit_count();

    let mut broken = continuation.into_bytes();
    broken[0] = if broken[0] == b'A' { b'B' } else { b'A' };
    let broken = String::from_utf8(broken).unwrap();
    let result = evaluate_request(
        &dataset,
        &QueryRequest {
            query: None,
            graph: "test".to_owned(),
            continuation: Some(broken),
        },
    );
    assert!(matches!(
        result,
        Err(QueryEvaluationError::InvalidContinuation(_))
    ));
    assert_eq!(backend.commit_count(), commits_before);
    assert_eq!(backend.abort_count(), 0);
}

// S6: LIMIT/OFFSET counted across resumptions.
#[test]
fn limit_and_offset_span_resumptions() {
    let triples: Vec<Triple> = (0..10)
        .map(|i| triple("a", "p", &format!("o{i}")))
        .collect();
    let (dataset, _) = dataset(triples, 1_000_000, 2);
    let text = "SELECT ?o WHERE { <http://example.org/a> <http://example.org/p> ?o } \
                LIMIT 5 OFFSET 3";

    let mut pages = vec![query(&dataset, text)];
    while let Some(continuation) = pages.last().unwrap().next.clone() {
        pages.push(resume(&dataset, &continuation));
    }

    let sizes: Vec<usize> = pages.iter().map(|page| page.bindings.len()).collect();
    assert_eq!(sizes, vec![2, 2, 1]);
    let collected: Vec<Term> = pages
        .iter()
        .flat_map(|page| values(page, "o"))
        .collect();
    let expected: Vec<Term> = (3..8).map(|i| term(&format!("o{i}"))).collect();
    assert_eq!(collected, expected);
}

#[test]
fn ask_reports_a_boolean() {
    let (dataset, _) = dataset(vec![triple("a", "p", "b")], 1_000_000, 100);
    let hit = query(
        &dataset,
        "ASK { <http://example.org/a> <http://example.org/p> ?x }",
    );
    assert_eq!(hit.boolean, Some(true));
    assert!(hit.next.is_none());
    assert!(hit.bindings.is_empty());

    let miss = query(
        &dataset,
        "ASK { <http://example.org/a> <http://example.org/nope> ?x }",
    );
    assert_eq!(miss.boolean, Some(false));
    assert!(miss.next.is_none());
}

#[test]
fn unknown_graph_is_reported() {
    let (dataset, _) = dataset(vec![triple("a", "p", "b")], 1_000_000, 100);
    let result = evaluate_request(
        &dataset,
        &QueryRequest {
            query: Some("SELECT * WHERE { ?s ?p ?o }".to_owned()),
            graph: "nope".to_owned(),
            continuation: None,
        },
    );
    assert!(matches!(result, Err(QueryEvaluationError::UnknownGraph(_))));
}

#[test]
fn missing_query_and_continuation_is_reported() {
    let (dataset, _) = dataset(vec![triple("a", "p", "b")], 1_000_000, 100);
    let result = evaluate_request(
        &dataset,
        &QueryRequest {
            query: None,
            graph: "test".to_owned(),
            continuation: None,
        },
    );
    assert!(matches!(result, Err(QueryEvaluationError::MissingQuery)));
}

#[test]
fn union_filter_and_bind_compose() {
    let (dataset, _) = dataset(
        vec![
            triple("a", "p", "b"),
            triple("a", "q", "c"),
            triple("a", "p", "d"),
        ],
        1_000_000,
        100,
    );
    let page = query(
        &dataset,
        "SELECT ?o ?tag WHERE { \
           { <http://example.org/a> <http://example.org/p> ?o } UNION \
           { <http://example.org/a> <http://example.org/q> ?o } \
           BIND(STR(?o) AS ?tag) \
           FILTER(?o != <http://example.org/d>) }",
    );
    let mut seen = values(&page, "o");
    seen.sort_by_key(ToString::to_string);
    assert_eq!(seen, vec![term("b"), term("c")]);
    assert!(page.bindings.iter().all(|mapping| mapping.contains("tag")));
}
