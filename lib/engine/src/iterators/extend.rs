use crate::expression::Expression;
use crate::iterators::{
    BoxedPlan, ExecutionContext, IteratorError, PreemptableIterator, QueryStep,
    merge_variables,
};
use crate::saved::SavedPlanNode;

/// BIND: adds one computed variable to every solution. An evaluation
/// error leaves the variable unbound, per SPARQL semantics.
pub struct ExtendIterator {
    inner: BoxedPlan,
    variable: String,
    expression: Expression,
}

impl ExtendIterator {
    pub fn new(inner: BoxedPlan, variable: String, expression: Expression) -> Self {
        Self {
            inner,
            variable,
            expression,
        }
    }
}

impl PreemptableIterator for ExtendIterator {
    fn next(&mut self, ctx: &ExecutionContext) -> Result<QueryStep, IteratorError> {
        match self.inner.next(ctx)? {
            QueryStep::Binding(mut mapping) => {
                if let Some(term) = self.expression.evaluate(&mapping) {
                    mapping.insert(self.variable.clone(), term);
                }
                Ok(QueryStep::Binding(mapping))
            }
            step => Ok(step),
        }
    }

    fn save(&self) -> SavedPlanNode {
        SavedPlanNode::Extend {
            inner: Box::new(self.inner.save()),
            variable: self.variable.clone(),
            expression: self.expression.clone(),
        }
    }

    fn variables(&self) -> Vec<String> {
        merge_variables(self.inner.variables(), vec![self.variable.clone()])
    }
}
