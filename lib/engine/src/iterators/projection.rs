use crate::iterators::{
    BoxedPlan, ExecutionContext, IteratorError, PreemptableIterator, QueryStep,
};
use crate::saved::SavedPlanNode;

/// Narrows every solution to the projected variables.
pub struct ProjectionIterator {
    inner: BoxedPlan,
    variables: Vec<String>,
}

impl ProjectionIterator {
    pub fn new(inner: BoxedPlan, variables: Vec<String>) -> Self {
        Self { inner, variables }
    }
}

impl PreemptableIterator for ProjectionIterator {
    fn next(&mut self, ctx: &ExecutionContext) -> Result<QueryStep, IteratorError> {
        match self.inner.next(ctx)? {
            QueryStep::Binding(mapping) => {
                Ok(QueryStep::Binding(mapping.project(&self.variables)))
            }
            step => Ok(step),
        }
    }

    fn save(&self) -> SavedPlanNode {
        SavedPlanNode::Projection {
            inner: Box::new(self.inner.save()),
            variables: self.variables.clone(),
        }
    }

    fn variables(&self) -> Vec<String> {
        self.variables.clone()
    }
}
