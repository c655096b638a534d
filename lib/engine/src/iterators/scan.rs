use crate::iterators::{ExecutionContext, IteratorError, PreemptableIterator, QueryStep};
use crate::saved::SavedPlanNode;
use rdf_quanta_model::TriplePattern;
use rdf_quanta_storage::{GraphBackend, TripleCursor};
use std::sync::Arc;

/// The leaf operator: scans one triple pattern against the backend.
///
/// The cursor is opened lazily so that a plan can be reloaded from a
/// continuation without touching the backend until it is actually pulled.
/// The offset tracks the cursor position after every consumed triple
/// (matching or not), which is all the state a suspended scan needs.
pub struct ScanIterator {
    backend: Arc<dyn GraphBackend>,
    pattern: TriplePattern,
    cursor: Option<Box<dyn TripleCursor>>,
    offset: usize,
}

impl ScanIterator {
    pub fn new(backend: Arc<dyn GraphBackend>, pattern: TriplePattern) -> Self {
        Self::resume(backend, pattern, 0)
    }

    pub fn resume(
        backend: Arc<dyn GraphBackend>,
        pattern: TriplePattern,
        offset: usize,
    ) -> Self {
        Self {
            backend,
            pattern,
            cursor: None,
            offset,
        }
    }

    pub fn pattern(&self) -> &TriplePattern {
        &self.pattern
    }
}

impl PreemptableIterator for ScanIterator {
    fn next(&mut self, ctx: &ExecutionContext) -> Result<QueryStep, IteratorError> {
        loop {
            if ctx.is_preempted() {
                return Ok(QueryStep::Suspended);
            }
            if self.cursor.is_none() {
                self.cursor = Some(self.backend.search(&self.pattern, self.offset)?);
            }
            let Some(cursor) = self.cursor.as_mut() else {
                continue;
            };
            let Some(triple) = cursor.next_triple()? else {
                return Ok(QueryStep::End);
            };
            self.offset = cursor.position();
            if let Some(mapping) = self.pattern.match_triple(&triple) {
                return Ok(QueryStep::Binding(mapping));
            }
        }
    }

    fn save(&self) -> SavedPlanNode {
        SavedPlanNode::Scan {
            pattern: self.pattern.clone(),
            offset: self.offset,
        }
    }

    fn variables(&self) -> Vec<String> {
        self.pattern.variables()
    }
}
