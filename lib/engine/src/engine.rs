use crate::error::AbortReason;
use crate::iterators::{BoxedPlan, ExecutionContext, QueryStep};
use crate::saved::SavedPlanNode;
use rdf_quanta_model::SolutionMapping;
use rdf_quanta_storage::GraphBackend;
use std::time::{Duration, Instant};

/// The result of one quota-bounded execution slice.
#[derive(Debug)]
pub struct ExecutionOutcome {
    /// The solutions produced during this slice.
    pub bindings: Vec<SolutionMapping>,
    /// The reified plan, present iff the execution was suspended cleanly.
    pub saved_plan: Option<SavedPlanNode>,
    /// Whether the plan ran to completion.
    pub is_done: bool,
    /// Present iff the execution was aborted; the transaction was rolled
    /// back and no plan was saved.
    pub abort_reason: Option<AbortReason>,
}

/// The quota-bounded execution engine.
///
/// Drives a physical plan until it completes, fills the result page,
/// exhausts its time quota or fails. Exactly one of `commit()`/`abort()`
/// is called on the backend per invocation: commit on completion and on
/// clean suspension, abort on failure.
#[derive(Debug, Default, Clone, Copy)]
pub struct QueryEngine;

impl QueryEngine {
    pub fn new() -> Self {
        Self
    }

    pub fn execute(
        self,
        plan: &mut BoxedPlan,
        backend: &dyn GraphBackend,
        quota: Duration,
        max_results: usize,
    ) -> ExecutionOutcome {
        let started = Instant::now();
        let ctx = ExecutionContext::new(started, quota);
        let mut bindings = Vec::new();
        let mut saved_plan = None;
        let mut is_done = false;
        let mut abort_reason = None;

        loop {
            if bindings.len() >= max_results {
                // The page is full. Snapshot first, then probe once: if
                // the stream is already exhausted there is no point in
                // handing out a continuation for an empty final page. A
                // probed-out binding is not lost, the snapshot re-emits
                // it on resume.
                let snapshot = plan.save();
                match plan.next(&ctx) {
                    Ok(QueryStep::End) => is_done = true,
                    Ok(_) => saved_plan = Some(snapshot),
                    Err(error) => abort_reason = Some(error.into_abort_reason()),
                }
                break;
            }
            // Preemption is cooperative: the flag is also observed inside
            // the operators, between tuples, so a pull in flight winds
            // down at its next yield point.
            if ctx.is_preempted() {
                saved_plan = Some(plan.save());
                break;
            }
            match plan.next(&ctx) {
                Ok(QueryStep::Binding(mapping)) => bindings.push(mapping),
                Ok(QueryStep::Suspended) => {
                    saved_plan = Some(plan.save());
                    break;
                }
                Ok(QueryStep::End) => {
                    is_done = true;
                    break;
                }
                Err(error) => {
                    abort_reason = Some(error.into_abort_reason());
                    break;
                }
            }
        }

        if let Some(reason) = abort_reason {
            backend.abort();
            tracing::warn!(reason = %reason, "query execution aborted");
            return ExecutionOutcome {
                bindings,
                saved_plan: None,
                is_done: false,
                abort_reason: Some(reason),
            };
        }

        backend.commit();
        tracing::debug!(
            results = bindings.len(),
            is_done,
            elapsed_ms = started.elapsed().as_millis() as u64,
            "execution slice finished"
        );
        ExecutionOutcome {
            bindings,
            saved_plan,
            is_done,
            abort_reason: None,
        }
    }
}
