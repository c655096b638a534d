use std::io;

/// An error raised by the triple storage layer.
///
/// Scans either fail at the medium (I/O for disk-backed stores) or when
/// an index row no longer decodes to a well-formed triple. The engine
/// treats both as transient: the execution aborts and its transaction is
/// rolled back.
#[derive(Debug, thiserror::Error)]
#[non_exhaustive]
pub enum StorageError {
    /// The underlying medium failed while reading triples.
    #[error("storage I/O failure: {0}")]
    Io(#[from] io::Error),
    /// An index row does not decode to a well-formed triple, e.g. a term
    /// id outside the dictionary or a literal in subject position.
    #[error("corrupted index entry: {0}")]
    CorruptedIndex(String),
}

impl StorageError {
    pub fn corrupted_index(detail: impl Into<String>) -> Self {
        Self::CorruptedIndex(detail.into())
    }
}
