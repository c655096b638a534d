use crate::iterators::{
    ExecutionContext, IteratorError, PreemptableIterator, QueryStep, ScanIterator,
    merge_variables,
};
use crate::saved::SavedPlanNode;
use rdf_quanta_model::{SolutionMapping, TriplePattern};
use rdf_quanta_storage::GraphBackend;
use std::sync::Arc;

/// An index-nested-loop join: for each binding of the left child, scans
/// the right triple pattern re-parameterized with that binding.
///
/// Resumable state is the current left binding plus the inner scan; both
/// survive a suspension, so a reloaded join picks up inside the same inner
/// loop iteration.
pub struct IndexJoinIterator {
    left: Box<dyn PreemptableIterator>,
    pattern: TriplePattern,
    backend: Arc<dyn GraphBackend>,
    current: Option<SolutionMapping>,
    right: Option<ScanIterator>,
}

impl IndexJoinIterator {
    pub fn new(
        left: Box<dyn PreemptableIterator>,
        pattern: TriplePattern,
        backend: Arc<dyn GraphBackend>,
    ) -> Self {
        Self {
            left,
            pattern,
            backend,
            current: None,
            right: None,
        }
    }

    pub(crate) fn resume(
        left: Box<dyn PreemptableIterator>,
        pattern: TriplePattern,
        backend: Arc<dyn GraphBackend>,
        current: Option<SolutionMapping>,
        right: Option<ScanIterator>,
    ) -> Self {
        Self {
            left,
            pattern,
            backend,
            current,
            right,
        }
    }
}

impl PreemptableIterator for IndexJoinIterator {
    fn next(&mut self, ctx: &ExecutionContext) -> Result<QueryStep, IteratorError> {
        loop {
            if ctx.is_preempted() {
                return Ok(QueryStep::Suspended);
            }
            let Some(current) = &self.current else {
                match self.left.next(ctx)? {
                    QueryStep::Binding(mapping) => {
                        // A fresh cursor for the re-parameterized pattern;
                        // the previous one was released with the old scan.
                        self.right = Some(ScanIterator::new(
                            Arc::clone(&self.backend),
                            self.pattern.bind(&mapping),
                        ));
                        self.current = Some(mapping);
                    }
                    step => return Ok(step),
                }
                continue;
            };
            let Some(right) = &mut self.right else {
                // A saved join is never suspended between binding and scan.
                self.current = None;
                continue;
            };
            match right.next(ctx)? {
                QueryStep::Binding(mapping) => {
                    if let Some(merged) = current.merged(&mapping) {
                        return Ok(QueryStep::Binding(merged));
                    }
                }
                QueryStep::Suspended => return Ok(QueryStep::Suspended),
                QueryStep::End => {
                    self.current = None;
                    self.right = None;
                }
            }
        }
    }

    fn save(&self) -> SavedPlanNode {
        SavedPlanNode::IndexJoin {
            left: Box::new(self.left.save()),
            pattern: self.pattern.clone(),
            current: self.current.clone(),
            right: self.right.as_ref().map(|scan| Box::new(scan.save())),
        }
    }

    fn variables(&self) -> Vec<String> {
        merge_variables(self.left.variables(), self.pattern.variables())
    }
}
