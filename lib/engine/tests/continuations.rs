//! Property-level tests for the continuation machinery: replay
//! equivalence, preemption soundness, stateful lineages and transaction
//! pairing.

use oxrdf::{NamedNode, Term, Triple};
use rdf_quanta_engine::iterators::{ExecutionContext, QueryStep};
use rdf_quanta_engine::{
    Dataset, Graph, GraphConfig, PlanOptions, QueryEvaluationError, QueryRequest,
    QueryResponse, SavedPlan, build_plan, decode_saved_plan, encode_saved_plan,
    evaluate_request, load_plan, parse_query,
};
use rdf_quanta_model::SolutionMapping;
use rdf_quanta_storage::{
    GraphBackend, MemoryGraph, StorageError, TripleCursor,
};
use std::sync::Arc;
use std::time::Duration;

fn ex(name: &str) -> NamedNode {
    NamedNode::new_unchecked(format!("http://example.org/{name}"))
}

fn term(name: &str) -> Term {
    ex(name).into()
}

fn triple(s: &str, p: &str, o: &str) -> Triple {
    Triple::new(ex(s), ex(p), ex(o))
}

/// A small social-ish graph with joins, optional matches and duplicates.
fn sample_triples() -> Vec<Triple> {
    let mut triples = Vec::new();
    for i in 0..8 {
        triples.push(triple(&format!("person{i}"), "knows", &format!("person{}", (i + 1) % 8)));
        triples.push(triple(&format!("person{i}"), "type", "Person"));
        if i % 2 == 0 {
            triples.push(triple(&format!("person{i}"), "name", &format!("n{i}")));
        }
    }
    triples
}

fn backend(triples: Vec<Triple>) -> Arc<dyn GraphBackend> {
    Arc::new(MemoryGraph::from_triples(triples))
}

fn config(name: &str, quota_ms: u64, max_results: usize, distinct_cap: usize) -> GraphConfig {
    GraphConfig {
        name: name.to_owned(),
        description: String::new(),
        quota_ms,
        max_results,
        distinct_cap,
        publish: false,
        example_queries: Vec::new(),
    }
}

const JOIN_QUERY: &str = "SELECT ?a ?b ?n WHERE { \
     ?a <http://example.org/knows> ?b . \
     ?b <http://example.org/type> <http://example.org/Person> \
     OPTIONAL { ?b <http://example.org/name> ?n } }";

const UNION_QUERY: &str = "SELECT ?s ?o WHERE { \
     { ?s <http://example.org/knows> ?o } UNION \
     { ?s <http://example.org/name> ?o } }";

/// Drains a plan with an unbounded context.
fn drain(plan: &mut rdf_quanta_engine::iterators::BoxedPlan) -> Vec<SolutionMapping> {
    let ctx = ExecutionContext::unbounded();
    let mut out = Vec::new();
    loop {
        match plan.next(&ctx).unwrap() {
            QueryStep::Binding(mapping) => out.push(mapping),
            QueryStep::End => return out,
            QueryStep::Suspended => panic!("unbounded context must not suspend"),
        }
    }
}

/// Replay equivalence: dumping after `k` solutions and reloading must
/// produce exactly the remaining sequence, for every reachable `k`.
#[test]
fn replay_equivalence_at_every_step() {
    for query in [JOIN_QUERY, UNION_QUERY] {
        let backend = backend(sample_triples());
        let parsed = parse_query(query, None).unwrap();
        let (mut reference, _) =
            build_plan(&parsed.plan, &backend, PlanOptions::default()).unwrap();
        let full = drain(&mut reference);
        assert!(!full.is_empty());

        for k in 0..=full.len() {
            let (mut plan, _) =
                build_plan(&parsed.plan, &backend, PlanOptions::default()).unwrap();
            let ctx = ExecutionContext::unbounded();
            for expected in &full[..k] {
                match plan.next(&ctx).unwrap() {
                    QueryStep::Binding(mapping) => assert_eq!(&mapping, expected),
                    other => panic!("expected a binding, got {other:?}"),
                }
            }
            let token = encode_saved_plan(&SavedPlan {
                form: parsed.form,
                root: plan.save(),
            })
            .unwrap();
            let reloaded = decode_saved_plan(&token).unwrap();
            let mut resumed = load_plan(reloaded.root, &backend).unwrap();
            assert_eq!(drain(&mut resumed), &full[k..], "diverged after {k} solutions");
        }
    }
}

fn paged_dataset(quota_ms: u64, max_results: usize, stateless: bool) -> (Dataset, Arc<MemoryGraph>) {
    let memory = Arc::new(MemoryGraph::from_triples(sample_triples()));
    let graph = Graph::new(
        Arc::clone(&memory) as Arc<dyn GraphBackend>,
        config("test", quota_ms, max_results, 100_000),
    );
    let dataset = if stateless {
        Dataset::stateless()
    } else {
        Dataset::stateful_in_memory()
    };
    (dataset.with_graph(graph), memory)
}

fn page_to_completion(dataset: &Dataset, query: &str) -> (Vec<SolutionMapping>, usize) {
    let mut request = QueryRequest {
        query: Some(query.to_owned()),
        graph: "test".to_owned(),
        continuation: None,
    };
    let mut bindings = Vec::new();
    let mut pages = 0;
    loop {
        let page: QueryResponse = evaluate_request(dataset, &request).unwrap();
        pages += 1;
        bindings.extend(page.bindings);
        match page.next {
            Some(next) => {
                request.query = None;
                request.continuation = Some(next);
            }
            None => return (bindings, pages),
        }
    }
}

/// Preemption soundness: concatenated pages equal the uninterrupted run,
/// in order.
#[test]
fn paging_equals_one_shot_execution() {
    for query in [JOIN_QUERY, UNION_QUERY] {
        let (unbounded, _) = paged_dataset(1_000_000, 10_000, true);
        let (reference, reference_pages) = page_to_completion(&unbounded, query);
        assert_eq!(reference_pages, 1);

        let (paged, _) = paged_dataset(1_000_000, 1, true);
        let (collected, pages) = page_to_completion(&paged, query);
        assert!(pages > 1);
        assert_eq!(collected, reference);
    }
}

/// A backend that sleeps on every triple, to force quota suspensions.
struct SlowGraph {
    inner: MemoryGraph,
    delay: Duration,
}

struct SlowCursor {
    inner: Box<dyn TripleCursor>,
    delay: Duration,
}

impl GraphBackend for SlowGraph {
    fn search(
        &self,
        pattern: &rdf_quanta_model::TriplePattern,
        from: usize,
    ) -> Result<Box<dyn TripleCursor>, StorageError> {
        Ok(Box::new(SlowCursor {
            inner: self.inner.search(pattern, from)?,
            delay: self.delay,
        }))
    }

    fn estimate_cardinality(
        &self,
        pattern: &rdf_quanta_model::TriplePattern,
    ) -> Result<usize, StorageError> {
        self.inner.estimate_cardinality(pattern)
    }

    fn commit(&self) {
        self.inner.commit();
    }

    fn abort(&self) {
        self.inner.abort();
    }
}

impl TripleCursor for SlowCursor {
    fn next_triple(&mut self) -> Result<Option<Triple>, StorageError> {
        std::thread::sleep(self.delay);
        self.inner.next_triple()
    }

    fn position(&self) -> usize {
        self.inner.position()
    }

    fn cardinality(&self) -> usize {
        self.inner.cardinality()
    }
}

/// Quota suspensions on a slow backend still page to the same result.
#[test]
fn quota_preemption_is_sound() {
    let slow = Arc::new(SlowGraph {
        inner: MemoryGraph::from_triples(sample_triples()),
        delay: Duration::from_millis(2),
    });
    let graph = Graph::new(
        Arc::clone(&slow) as Arc<dyn GraphBackend>,
        config("test", 10, 10_000, 100_000),
    );
    let dataset = Dataset::stateless().with_graph(graph);
    let (collected, pages) = page_to_completion(&dataset, UNION_QUERY);

    let (reference_dataset, _) = paged_dataset(1_000_000, 10_000, true);
    let (reference, _) = page_to_completion(&reference_dataset, UNION_QUERY);
    assert!(pages > 1, "the quota must have preempted at least once");
    assert_eq!(collected, reference);
}

/// Stateful mode: one lineage keeps one id, and completion deletes it.
#[test]
fn stateful_lineage_reuses_its_id_and_completes_once() {
    let (dataset, _) = paged_dataset(1_000_000, 3, false);
    let first = evaluate_request(
        &dataset,
        &QueryRequest {
            query: Some(UNION_QUERY.to_owned()),
            graph: "test".to_owned(),
            continuation: None,
        },
    )
    .unwrap();
    let id = first.next.unwrap();
    assert!(uuid::Uuid::parse_str(&id).is_ok());

    let mut last_id = id.clone();
    let mut finished = false;
    for _ in 0..100 {
        let page = evaluate_request(
            &dataset,
            &QueryRequest {
                query: None,
                graph: "test".to_owned(),
                continuation: Some(last_id.clone()),
            },
        )
        .unwrap();
        match page.next {
            Some(next) => {
                assert_eq!(next, id, "a lineage keeps a single saved-plan id");
                last_id = next;
            }
            None => {
                finished = true;
                break;
            }
        }
    }
    assert!(finished);

    // Idempotent completion: the saved plan is gone.
    let replay = evaluate_request(
        &dataset,
        &QueryRequest {
            query: None,
            graph: "test".to_owned(),
            continuation: Some(id),
        },
    );
    assert!(matches!(
        replay,
        Err(QueryEvaluationError::InvalidContinuation(_))
    ));
}

/// Planning is a pure function of the algebra and the cardinalities.
#[test]
fn plan_building_is_deterministic() {
    let backend = backend(sample_triples());
    let parsed = parse_query(JOIN_QUERY, None).unwrap();
    let (plan_a, cards_a) =
        build_plan(&parsed.plan, &backend, PlanOptions::default()).unwrap();
    let (plan_b, cards_b) =
        build_plan(&parsed.plan, &backend, PlanOptions::default()).unwrap();
    assert_eq!(plan_a.save(), plan_b.save());
    assert_eq!(cards_a, cards_b);
}

/// Every execution pairs with exactly one commit or abort.
#[test]
fn transactions_pair_with_executions() {
    let (dataset, memory) = paged_dataset(1_000_000, 2, true);
    let (_, pages) = page_to_completion(&dataset, UNION_QUERY);
    assert_eq!(memory.commit_count(), pages as u64);
    assert_eq!(memory.abort_count(), 0);
}

/// Distinct overflow aborts the execution and rolls back.
#[test]
fn distinct_overflow_aborts() {
    let memory = Arc::new(MemoryGraph::from_triples(sample_triples()));
    let graph = Graph::new(
        Arc::clone(&memory) as Arc<dyn GraphBackend>,
        config("test", 1_000_000, 10_000, 3),
    );
    let dataset = Dataset::stateless().with_graph(graph);
    let result = evaluate_request(
        &dataset,
        &QueryRequest {
            query: Some(
                "SELECT DISTINCT ?s WHERE { ?s <http://example.org/knows> ?o }"
                    .to_owned(),
            ),
            graph: "test".to_owned(),
            continuation: None,
        },
    );
    match result {
        Err(QueryEvaluationError::Aborted(reason)) => {
            assert_eq!(reason.to_string(), "distinct-overflow");
        }
        other => panic!("expected an abort, got {other:?}"),
    }
    assert_eq!(memory.abort_count(), 1);
    assert_eq!(memory.commit_count(), 0);
}

/// Bindings with unbound optional variables survive the token round trip.
#[test]
fn optional_bindings_round_trip_through_tokens() {
    let (dataset, _) = paged_dataset(1_000_000, 1, true);
    let (collected, _) = page_to_completion(&dataset, JOIN_QUERY);
    let with_name = collected.iter().filter(|m| m.contains("n")).count();
    let without_name = collected.iter().filter(|m| !m.contains("n")).count();
    assert!(with_name > 0);
    assert!(without_name > 0);
    assert_eq!(
        collected.iter().filter(|m| m.get("b") == Some(&term("person0"))).count(),
        1
    );
}
