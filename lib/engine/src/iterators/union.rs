use crate::iterators::{
    BoxedPlan, ExecutionContext, IteratorError, PreemptableIterator, QueryStep,
    merge_variables,
};
use crate::saved::SavedPlanNode;

/// Bag union over any number of children.
///
/// Children are pulled round-robin, one solution at a time, so that a
/// short quota still makes progress on every branch instead of draining
/// the first child before touching the others.
pub struct BagUnionIterator {
    children: Vec<BoxedPlan>,
    exhausted: Vec<bool>,
    next_child: usize,
}

impl BagUnionIterator {
    pub fn new(children: Vec<BoxedPlan>) -> Self {
        let exhausted = vec![false; children.len()];
        Self::resume(children, exhausted, 0)
    }

    pub(crate) fn resume(
        children: Vec<BoxedPlan>,
        exhausted: Vec<bool>,
        next_child: usize,
    ) -> Self {
        Self {
            children,
            exhausted,
            next_child,
        }
    }
}

impl PreemptableIterator for BagUnionIterator {
    fn next(&mut self, ctx: &ExecutionContext) -> Result<QueryStep, IteratorError> {
        loop {
            if ctx.is_preempted() {
                return Ok(QueryStep::Suspended);
            }
            if self.exhausted.iter().all(|done| *done) {
                return Ok(QueryStep::End);
            }
            for turn in 0..self.children.len() {
                let index = (self.next_child + turn) % self.children.len();
                if self.exhausted[index] {
                    continue;
                }
                match self.children[index].next(ctx)? {
                    QueryStep::Binding(mapping) => {
                        self.next_child = (index + 1) % self.children.len();
                        return Ok(QueryStep::Binding(mapping));
                    }
                    QueryStep::Suspended => {
                        self.next_child = index;
                        return Ok(QueryStep::Suspended);
                    }
                    QueryStep::End => self.exhausted[index] = true,
                }
            }
        }
    }

    fn save(&self) -> SavedPlanNode {
        SavedPlanNode::Union {
            children: self.children.iter().map(|child| child.save()).collect(),
            exhausted: self.exhausted.clone(),
            next_child: self.next_child,
        }
    }

    fn variables(&self) -> Vec<String> {
        self.children
            .iter()
            .fold(Vec::new(), |acc, child| merge_variables(acc, child.variables()))
    }
}
