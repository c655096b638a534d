use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use rdf_quanta_engine::QueryEvaluationError;

#[derive(Debug, thiserror::Error)]
pub enum ServerError {
    #[error("Bad request: {0}")]
    BadRequest(String),
    #[error("Content negotiation failed: {0}")]
    ContentNegotiation(String),
    #[error("Not found: {0}")]
    NotFound(String),
    #[error("The query has been aborted: {0}")]
    Aborted(String),
    #[error("Internal server error: {0}")]
    Internal(anyhow::Error),
}

impl From<QueryEvaluationError> for ServerError {
    fn from(error: QueryEvaluationError) -> Self {
        match error {
            QueryEvaluationError::Syntax(_)
            | QueryEvaluationError::Unsupported(_)
            | QueryEvaluationError::InvalidContinuation(_)
            | QueryEvaluationError::MissingQuery => Self::BadRequest(error.to_string()),
            QueryEvaluationError::UnknownGraph(name) => {
                Self::NotFound(format!("no RDF graph named '{name}' is registered"))
            }
            QueryEvaluationError::Aborted(reason) => Self::Aborted(reason.to_string()),
            other => Self::Internal(other.into()),
        }
    }
}

impl IntoResponse for ServerError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            Self::BadRequest(message) => (StatusCode::BAD_REQUEST, message),
            Self::ContentNegotiation(message) => (StatusCode::NOT_ACCEPTABLE, message),
            Self::NotFound(message) => (StatusCode::NOT_FOUND, message),
            Self::Aborted(reason) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                format!("The SPARQL query has been aborted for the following reason: '{reason}'"),
            ),
            Self::Internal(error) => {
                (StatusCode::INTERNAL_SERVER_ERROR, error.to_string())
            }
        };
        (status, message).into_response()
    }
}
