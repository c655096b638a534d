use crate::algebra::{QueryForm, parse_query};
use crate::dataset::Dataset;
use crate::engine::QueryEngine;
use crate::error::{InvalidContinuationError, QueryEvaluationError};
use crate::optimizer::{CardinalityEstimate, PlanOptions, build_plan};
use crate::saved::{SavedPlan, decode_saved_plan, encode_saved_plan, load_plan};
use rdf_quanta_model::SolutionMapping;
use serde::Serialize;
use std::time::Instant;
use uuid::Uuid;

/// One query-endpoint request: a fresh query, or a continuation of a
/// previous one.
#[derive(Debug, Clone)]
pub struct QueryRequest {
    /// SPARQL text; optional when a continuation is present.
    pub query: Option<String>,
    /// The registered graph name to execute against.
    pub graph: String,
    /// An opaque continuation from a previous response.
    pub continuation: Option<String>,
}

/// Timing and planning metadata reported alongside each result page.
#[derive(Debug, Clone, Default, Serialize)]
pub struct ExecutionStats {
    pub cardinalities: Vec<CardinalityEstimate>,
    /// Parse/plan (or continuation load) time, in milliseconds.
    pub import: f64,
    /// Result export time, in milliseconds; filled in by the encoder.
    pub export: f64,
}

/// One result page.
#[derive(Debug)]
pub struct QueryResponse {
    pub variables: Vec<String>,
    pub bindings: Vec<SolutionMapping>,
    /// The ASK verdict, present only on the final page of an ASK query.
    pub boolean: Option<bool>,
    /// The continuation for the next page, absent when done.
    pub next: Option<String>,
    pub stats: ExecutionStats,
}

/// Runs one execution slice for `request` against `dataset`.
///
/// Resolves the graph, reconstitutes or builds a plan, drives it under
/// the graph's quota (the engine pairs the transaction), and packages the
/// next continuation: the token itself in stateless mode, a saved-plan id
/// in stateful mode. Aborts surface as [`QueryEvaluationError::Aborted`]
/// after the engine has rolled back.
pub fn evaluate_request(
    dataset: &Dataset,
    request: &QueryRequest,
) -> Result<QueryResponse, QueryEvaluationError> {
    let graph = dataset
        .graph(&request.graph)
        .ok_or_else(|| QueryEvaluationError::UnknownGraph(request.graph.clone()))?;

    let import_started = Instant::now();
    let (mut plan, form, cardinalities, lineage) = match &request.continuation {
        Some(continuation) => {
            let (token, lineage) = match dataset.saved_plans() {
                None => (continuation.clone(), None),
                Some(store) => {
                    Uuid::parse_str(continuation).map_err(|_| {
                        InvalidContinuationError::msg("malformed saved-plan id")
                    })?;
                    let token = store.take(continuation).ok_or_else(|| {
                        InvalidContinuationError::msg(
                            "unknown or already consumed saved-plan id",
                        )
                    })?;
                    (token, Some(continuation.clone()))
                }
            };
            let saved = decode_saved_plan(&token)?;
            let plan = load_plan(saved.root, graph.backend())?;
            (plan, saved.form, Vec::new(), lineage)
        }
        None => {
            let text = request
                .query
                .as_deref()
                .ok_or(QueryEvaluationError::MissingQuery)?;
            let parsed = parse_query(text, None)?;
            let options = PlanOptions {
                distinct_cap: graph.config().distinct_cap,
            };
            let (plan, cardinalities) =
                build_plan(&parsed.plan, graph.backend(), options)?;
            (plan, parsed.form, cardinalities, None)
        }
    };
    let import = to_millis(import_started);

    let outcome = QueryEngine::new().execute(
        &mut plan,
        graph.backend().as_ref(),
        graph.quota(),
        graph.max_results(),
    );
    if let Some(reason) = outcome.abort_reason {
        return Err(QueryEvaluationError::Aborted(reason));
    }

    let next = match outcome.saved_plan {
        Some(root) => {
            let token = encode_saved_plan(&SavedPlan { form, root })?;
            match dataset.saved_plans() {
                None => Some(token),
                Some(store) => {
                    // The lineage keeps one id for its whole life; the
                    // first suspension mints it.
                    let id =
                        lineage.unwrap_or_else(|| Uuid::new_v4().to_string());
                    store.save(&id, token);
                    Some(id)
                }
            }
        }
        // Completion in stateful mode: the resume already took the entry,
        // so a reused token can only miss from now on.
        None => None,
    };

    let variables = plan.variables();
    let (bindings, boolean) = match form {
        QueryForm::Select => (outcome.bindings, None),
        QueryForm::Ask => {
            let verdict =
                outcome.is_done.then(|| !outcome.bindings.is_empty());
            (Vec::new(), verdict)
        }
    };

    Ok(QueryResponse {
        variables,
        bindings,
        boolean,
        next,
        stats: ExecutionStats {
            cardinalities,
            import,
            export: 0.0,
        },
    })
}

fn to_millis(started: Instant) -> f64 {
    started.elapsed().as_secs_f64() * 1000.0
}
