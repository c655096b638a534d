use rdf_quanta_storage::StorageError;
use std::fmt;

/// A syntactically valid query uses a construct outside the supported
/// fragment of SPARQL 1.1.
///
/// These failures are non-retryable: the same query will always be
/// rejected, so no transaction is opened.
#[derive(Debug, thiserror::Error)]
#[error("unsupported SPARQL feature: {feature}")]
pub struct UnsupportedSparqlError {
    feature: String,
}

impl UnsupportedSparqlError {
    pub fn new(feature: impl Into<String>) -> Self {
        Self {
            feature: feature.into(),
        }
    }

    pub fn feature(&self) -> &str {
        &self.feature
    }
}

/// A continuation token could not be decoded, carries an unknown format
/// version, or references a saved plan that no longer exists.
#[derive(Debug, thiserror::Error)]
#[error("invalid continuation token: {reason}")]
pub struct InvalidContinuationError {
    reason: String,
}

impl InvalidContinuationError {
    pub fn msg(reason: impl Into<String>) -> Self {
        Self {
            reason: reason.into(),
        }
    }
}

/// Why the engine aborted an execution.
///
/// Aborts always pair with a transaction `abort()` on the graph; the reason
/// is passed through to the caller verbatim.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AbortReason {
    /// The storage layer failed during a pull.
    Backend(String),
    /// A DISTINCT operator exceeded its seen-set cap.
    DistinctOverflow,
}

impl fmt::Display for AbortReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Backend(reason) => write!(f, "{reason}"),
            Self::DistinctOverflow => write!(f, "distinct-overflow"),
        }
    }
}

/// A SPARQL evaluation error.
#[derive(Debug, thiserror::Error)]
#[non_exhaustive]
pub enum QueryEvaluationError {
    /// An error in SPARQL parsing.
    #[error(transparent)]
    Syntax(#[from] spargebra::SparqlSyntaxError),
    /// The query is outside the supported SPARQL fragment.
    #[error(transparent)]
    Unsupported(#[from] UnsupportedSparqlError),
    /// The continuation token cannot be used.
    #[error(transparent)]
    InvalidContinuation(#[from] InvalidContinuationError),
    /// The requested graph is not registered.
    #[error("no RDF graph named '{0}' is registered")]
    UnknownGraph(String),
    /// The request carries neither a query nor a continuation.
    #[error("the request must carry a query or a continuation")]
    MissingQuery,
    /// An error from the storage layer outside a pull loop.
    #[error(transparent)]
    Storage(#[from] StorageError),
    /// The engine aborted the execution and rolled back its transaction.
    #[error("the query execution has been aborted: {0}")]
    Aborted(AbortReason),
    /// An internal error that likely indicates a bug in RDF Quanta.
    #[error("internal error: {0}")]
    Internal(String),
}
