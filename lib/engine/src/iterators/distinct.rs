use crate::iterators::{
    BoxedPlan, ExecutionContext, IteratorError, PreemptableIterator, QueryStep,
};
use crate::saved::SavedPlanNode;
use rustc_hash::FxHashSet;

/// DISTINCT over the canonical text form of each solution.
///
/// The seen set is bounded: DISTINCT over an unbounded stream would let a
/// single query grow server memory without limit, defeating the point of
/// preemption. Hitting the cap aborts the execution with the
/// `distinct-overflow` reason. The set is part of the saved state, sorted
/// for deterministic tokens.
pub struct DistinctIterator {
    inner: BoxedPlan,
    seen: FxHashSet<String>,
    cap: usize,
}

impl DistinctIterator {
    pub fn new(inner: BoxedPlan, cap: usize) -> Self {
        Self {
            inner,
            seen: FxHashSet::default(),
            cap,
        }
    }

    pub(crate) fn resume(inner: BoxedPlan, seen: Vec<String>, cap: usize) -> Self {
        Self {
            inner,
            seen: seen.into_iter().collect(),
            cap,
        }
    }
}

impl PreemptableIterator for DistinctIterator {
    fn next(&mut self, ctx: &ExecutionContext) -> Result<QueryStep, IteratorError> {
        loop {
            match self.inner.next(ctx)? {
                QueryStep::Binding(mapping) => {
                    let key = mapping.canonical_key();
                    if self.seen.contains(&key) {
                        continue;
                    }
                    if self.seen.len() >= self.cap {
                        return Err(IteratorError::DistinctOverflow);
                    }
                    self.seen.insert(key);
                    return Ok(QueryStep::Binding(mapping));
                }
                step => return Ok(step),
            }
        }
    }

    fn save(&self) -> SavedPlanNode {
        let mut seen: Vec<String> = self.seen.iter().cloned().collect();
        seen.sort_unstable();
        SavedPlanNode::Distinct {
            inner: Box::new(self.inner.save()),
            seen,
            cap: self.cap,
        }
    }

    fn variables(&self) -> Vec<String> {
        self.inner.variables()
    }
}
