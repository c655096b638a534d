use crate::expression::Expression;
use crate::iterators::{
    BoxedPlan, ExecutionContext, IteratorError, PreemptableIterator, QueryStep,
};
use crate::saved::SavedPlanNode;

/// Drops the solutions whose effective boolean value is not `true`.
/// Stateless beyond its child.
pub struct FilterIterator {
    expression: Expression,
    inner: BoxedPlan,
}

impl FilterIterator {
    pub fn new(expression: Expression, inner: BoxedPlan) -> Self {
        Self { expression, inner }
    }
}

impl PreemptableIterator for FilterIterator {
    fn next(&mut self, ctx: &ExecutionContext) -> Result<QueryStep, IteratorError> {
        loop {
            match self.inner.next(ctx)? {
                QueryStep::Binding(mapping) => {
                    if self.expression.boolean(&mapping) == Some(true) {
                        return Ok(QueryStep::Binding(mapping));
                    }
                }
                step => return Ok(step),
            }
        }
    }

    fn save(&self) -> SavedPlanNode {
        SavedPlanNode::Filter {
            expression: self.expression.clone(),
            inner: Box::new(self.inner.save()),
        }
    }

    fn variables(&self) -> Vec<String> {
        self.inner.variables()
    }
}
