//! The physical iterator algebra.
//!
//! Every operator follows the same pull contract: `next` returns the next
//! solution, `End`, or `Suspended` once the execution context signals
//! preemption. Operators keep all of their resumable state in explicit
//! fields (cursor offsets, the current left binding of a join, the seen
//! set of a distinct...), never in control flow, so that `save` can
//! reify the plan between any two pulls.

mod distinct;
mod extend;
mod filter;
mod join;
mod leftjoin;
mod projection;
mod scan;
mod slice;
mod union;

pub use distinct::DistinctIterator;
pub use extend::ExtendIterator;
pub use filter::FilterIterator;
pub use join::IndexJoinIterator;
pub use leftjoin::LeftJoinIterator;
pub use projection::ProjectionIterator;
pub use scan::ScanIterator;
pub use slice::SliceIterator;
pub use union::BagUnionIterator;

use crate::error::AbortReason;
use crate::saved::SavedPlanNode;
use rdf_quanta_model::{SolutionMapping, TriplePattern};
use rdf_quanta_storage::{GraphBackend, StorageError};
use std::cell::Cell;
use std::sync::Arc;
use std::time::Instant;

/// The outcome of one pull on an operator.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum QueryStep {
    /// The next solution of the operator's sequence.
    Binding(SolutionMapping),
    /// The execution was preempted; the operator state is ready to be
    /// saved and resumed.
    Suspended,
    /// The sequence is exhausted. Terminal.
    End,
}

/// An error raised while pulling an operator.
///
/// The engine does not recover from these: it classifies them into an
/// [`AbortReason`] and rolls back the execution's transaction.
#[derive(Debug, thiserror::Error)]
pub enum IteratorError {
    #[error(transparent)]
    Storage(#[from] StorageError),
    #[error("distinct overflow")]
    DistinctOverflow,
}

impl IteratorError {
    pub fn into_abort_reason(self) -> AbortReason {
        match self {
            Self::Storage(error) => AbortReason::Backend(error.to_string()),
            Self::DistinctOverflow => AbortReason::DistinctOverflow,
        }
    }
}

/// Shared per-execution state: the preemption signal.
///
/// The engine owns the context; operators only read it, at tuple
/// granularity, so no pull ever suspends mid-tuple. Once the deadline has
/// passed the flag latches, keeping further checks cheap and the decision
/// stable for the rest of the execution.
pub struct ExecutionContext {
    deadline: Option<Instant>,
    preempted: Cell<bool>,
}

impl ExecutionContext {
    /// A context that preempts once `quota` has elapsed from `started`.
    pub fn new(started: Instant, quota: std::time::Duration) -> Self {
        Self {
            deadline: started.checked_add(quota),
            preempted: Cell::new(false),
        }
    }

    /// A context that never preempts on time (used by tests and one-shot
    /// evaluation).
    pub fn unbounded() -> Self {
        Self {
            deadline: None,
            preempted: Cell::new(false),
        }
    }

    /// Signals preemption explicitly.
    pub fn interrupt(&self) {
        self.preempted.set(true);
    }

    /// Whether the plan must suspend at the next yield point.
    pub fn is_preempted(&self) -> bool {
        if self.preempted.get() {
            return true;
        }
        if let Some(deadline) = self.deadline {
            if Instant::now() >= deadline {
                self.preempted.set(true);
                return true;
            }
        }
        false
    }
}

/// The pull contract every physical operator implements.
pub trait PreemptableIterator: Send {
    /// Pulls the next solution, observing the preemption signal between
    /// tuples.
    fn next(&mut self, ctx: &ExecutionContext) -> Result<QueryStep, IteratorError>;

    /// Reifies the operator (static configuration + mutable state) into a
    /// serializable node. Valid between any two `next` calls.
    fn save(&self) -> SavedPlanNode;

    /// The variables this operator can bind.
    fn variables(&self) -> Vec<String>;
}

pub type BoxedPlan = Box<dyn PreemptableIterator>;

/// Builds the left-deep scan/join chain over a list of triple patterns,
/// in the given order. Used for BGP chains and for the right side of an
/// OPTIONAL, which is rebuilt for every left binding.
pub(crate) fn pattern_chain(
    backend: &Arc<dyn GraphBackend>,
    patterns: &[TriplePattern],
    binding: &SolutionMapping,
) -> BoxedPlan {
    let mut patterns = patterns.iter().map(|p| p.bind(binding));
    let first = patterns
        .next()
        .expect("pattern chains are built from non-empty BGPs");
    let mut plan: BoxedPlan = Box::new(ScanIterator::new(Arc::clone(backend), first));
    for pattern in patterns {
        plan = Box::new(IndexJoinIterator::new(plan, pattern, Arc::clone(backend)));
    }
    plan
}

pub(crate) fn merge_variables(mut left: Vec<String>, right: Vec<String>) -> Vec<String> {
    for variable in right {
        if !left.contains(&variable) {
            left.push(variable);
        }
    }
    left
}
