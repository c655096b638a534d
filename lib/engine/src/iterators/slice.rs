use crate::iterators::{
    BoxedPlan, ExecutionContext, IteratorError, PreemptableIterator, QueryStep,
};
use crate::saved::SavedPlanNode;

/// OFFSET/LIMIT. The counters are decremented as solutions flow through,
/// so they transparently carry over suspensions: a resumed slice keeps
/// skipping or counting exactly where it stopped.
pub struct SliceIterator {
    inner: BoxedPlan,
    remaining_offset: usize,
    remaining_limit: Option<usize>,
}

impl SliceIterator {
    pub fn new(inner: BoxedPlan, offset: usize, limit: Option<usize>) -> Self {
        Self {
            inner,
            remaining_offset: offset,
            remaining_limit: limit,
        }
    }
}

impl PreemptableIterator for SliceIterator {
    fn next(&mut self, ctx: &ExecutionContext) -> Result<QueryStep, IteratorError> {
        if self.remaining_limit == Some(0) {
            return Ok(QueryStep::End);
        }
        loop {
            match self.inner.next(ctx)? {
                QueryStep::Binding(mapping) => {
                    if self.remaining_offset > 0 {
                        self.remaining_offset -= 1;
                        continue;
                    }
                    if let Some(remaining) = &mut self.remaining_limit {
                        *remaining -= 1;
                    }
                    return Ok(QueryStep::Binding(mapping));
                }
                step => return Ok(step),
            }
        }
    }

    fn save(&self) -> SavedPlanNode {
        SavedPlanNode::Slice {
            inner: Box::new(self.inner.save()),
            remaining_offset: self.remaining_offset,
            remaining_limit: self.remaining_limit,
        }
    }

    fn variables(&self) -> Vec<String> {
        self.inner.variables()
    }
}
