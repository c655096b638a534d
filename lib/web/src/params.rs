use crate::AppState;
use crate::error::ServerError;
use axum::RequestPartsExt;
use axum::extract::{FromRequestParts, Query};
use axum::http::request::Parts;
use serde::Deserialize;

#[derive(Deserialize)]
struct SparqlQueryParamsRaw {
    #[serde(default)]
    query: Option<String>,
    #[serde(default)]
    #[serde(rename = "default-graph-uri")]
    default_graph_uri: Option<String>,
    #[serde(default)]
    next: Option<String>,
}

/// The query-endpoint arguments, shared by the GET (query string) and
/// POST (JSON body) flavors.
pub struct SparqlQueryParams {
    pub query: Option<String>,
    pub default_graph_uri: String,
    pub next: Option<String>,
}

/// The POST body: `{"query": ..., "defaultGraph": ..., "next": ...}`.
#[derive(Deserialize)]
pub struct SparqlQueryBody {
    #[serde(default)]
    pub query: Option<String>,
    #[serde(rename = "defaultGraph")]
    pub default_graph: String,
    #[serde(default)]
    pub next: Option<String>,
}

impl SparqlQueryParams {
    fn validate(
        query: Option<String>,
        default_graph_uri: Option<String>,
        next: Option<String>,
    ) -> Result<Self, ServerError> {
        let Some(default_graph_uri) = default_graph_uri else {
            return Err(ServerError::BadRequest(
                "the 'default-graph-uri' parameter is mandatory".to_owned(),
            ));
        };
        if query.is_none() && next.is_none() {
            return Err(ServerError::BadRequest(
                "the request must carry a 'query' or a 'next' parameter".to_owned(),
            ));
        }
        Ok(Self {
            query,
            default_graph_uri,
            next,
        })
    }

    pub fn from_body(body: SparqlQueryBody) -> Result<Self, ServerError> {
        Self::validate(body.query, Some(body.default_graph), body.next)
    }
}

impl FromRequestParts<AppState> for SparqlQueryParams {
    type Rejection = ServerError;

    async fn from_request_parts(
        parts: &mut Parts,
        _state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let raw = parts
            .extract::<Query<SparqlQueryParamsRaw>>()
            .await
            .map_err(|e| ServerError::BadRequest(e.to_string()))?
            .0;
        Self::validate(raw.query, raw.default_graph_uri, raw.next)
    }
}
