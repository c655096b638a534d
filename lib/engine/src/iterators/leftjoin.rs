use crate::expression::Expression;
use crate::iterators::{
    BoxedPlan, ExecutionContext, IteratorError, PreemptableIterator, QueryStep,
    merge_variables, pattern_chain,
};
use crate::saved::SavedPlanNode;
use rdf_quanta_model::{SolutionMapping, TriplePattern};
use rdf_quanta_storage::GraphBackend;
use std::sync::Arc;

/// OPTIONAL: emits every compatible merge with the right side, or the left
/// binding unchanged when the right side produced no match.
///
/// The right side is a BGP rebuilt (bound) for every left binding. The
/// `found` flag records whether the current left binding matched at least
/// once, which decides whether it must be emitted bare at right-side
/// exhaustion; it is part of the saved state for exactly that reason.
pub struct LeftJoinIterator {
    left: BoxedPlan,
    patterns: Vec<TriplePattern>,
    expression: Option<Expression>,
    backend: Arc<dyn GraphBackend>,
    current: Option<SolutionMapping>,
    right: Option<BoxedPlan>,
    found: bool,
}

impl LeftJoinIterator {
    pub fn new(
        left: BoxedPlan,
        patterns: Vec<TriplePattern>,
        expression: Option<Expression>,
        backend: Arc<dyn GraphBackend>,
    ) -> Self {
        Self::resume(left, patterns, expression, backend, None, None, false)
    }

    pub(crate) fn resume(
        left: BoxedPlan,
        patterns: Vec<TriplePattern>,
        expression: Option<Expression>,
        backend: Arc<dyn GraphBackend>,
        current: Option<SolutionMapping>,
        right: Option<BoxedPlan>,
        found: bool,
    ) -> Self {
        Self {
            left,
            patterns,
            expression,
            backend,
            current,
            right,
            found,
        }
    }
}

impl PreemptableIterator for LeftJoinIterator {
    fn next(&mut self, ctx: &ExecutionContext) -> Result<QueryStep, IteratorError> {
        loop {
            if ctx.is_preempted() {
                return Ok(QueryStep::Suspended);
            }
            let Some(current) = &self.current else {
                match self.left.next(ctx)? {
                    QueryStep::Binding(mapping) => {
                        self.right =
                            Some(pattern_chain(&self.backend, &self.patterns, &mapping));
                        self.current = Some(mapping);
                        self.found = false;
                    }
                    step => return Ok(step),
                }
                continue;
            };
            let Some(right) = &mut self.right else {
                self.current = None;
                continue;
            };
            match right.next(ctx)? {
                QueryStep::Binding(mapping) => {
                    let Some(merged) = current.merged(&mapping) else {
                        continue;
                    };
                    // A join filter only counts satisfying rows as matches,
                    // so a filtered-out right side still leaves the left
                    // binding to be emitted bare.
                    if let Some(expression) = &self.expression {
                        if expression.boolean(&merged) != Some(true) {
                            continue;
                        }
                    }
                    self.found = true;
                    return Ok(QueryStep::Binding(merged));
                }
                QueryStep::Suspended => return Ok(QueryStep::Suspended),
                QueryStep::End => {
                    let current = self.current.take();
                    self.right = None;
                    if !self.found {
                        if let Some(current) = current {
                            return Ok(QueryStep::Binding(current));
                        }
                    }
                }
            }
        }
    }

    fn save(&self) -> SavedPlanNode {
        SavedPlanNode::LeftJoin {
            left: Box::new(self.left.save()),
            patterns: self.patterns.clone(),
            expression: self.expression.clone(),
            current: self.current.clone(),
            right: self.right.as_ref().map(|right| Box::new(right.save())),
            found: self.found,
        }
    }

    fn variables(&self) -> Vec<String> {
        let mut variables = self.left.variables();
        for pattern in &self.patterns {
            variables = merge_variables(variables, pattern.variables());
        }
        variables
    }
}
