use crate::StorageError;
use oxrdf::Triple;
use rdf_quanta_model::TriplePattern;

/// A read-only triple store a query plan can scan.
///
/// Scans are the unit of preemption at the leaves of a plan: a cursor
/// exposes its position, and re-opening the same pattern from that position
/// must produce the identical suffix as long as the store is unchanged.
/// Each query execution is bracketed by exactly one [`commit`](Self::commit)
/// or [`abort`](Self::abort) call.
pub trait GraphBackend: Send + Sync {
    /// Opens a cursor over all triples matching `pattern`, skipping the
    /// first `from` entries of the scan order.
    fn search(
        &self,
        pattern: &TriplePattern,
        from: usize,
    ) -> Result<Box<dyn TripleCursor>, StorageError>;

    /// An estimate of the number of triples matching `pattern`.
    ///
    /// Estimates drive plan ordering; callers must not assume exactness.
    fn estimate_cardinality(&self, pattern: &TriplePattern) -> Result<usize, StorageError>;

    /// Closes the scoped transaction of a successful or cleanly suspended
    /// execution.
    fn commit(&self);

    /// Rolls back the scoped transaction of a failed execution.
    fn abort(&self);
}

/// A resumable scan over the triples matching one pattern.
pub trait TripleCursor: Send {
    fn next_triple(&mut self) -> Result<Option<Triple>, StorageError>;

    /// The number of triples consumed from the start of the full scan,
    /// including any skipped by the `from` offset. Feeding this back into
    /// [`GraphBackend::search`] resumes the scan at the next unread triple.
    fn position(&self) -> usize;

    /// The cardinality estimate for the full scan this cursor belongs to.
    fn cardinality(&self) -> usize;
}
