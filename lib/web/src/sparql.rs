use crate::AppState;
use crate::error::ServerError;
use crate::negotiation::ResponseFormat;
use crate::params::{SparqlQueryBody, SparqlQueryParams};
use crate::results::encode_response;
use axum::Json;
use axum::extract::{Path, State};
use axum::response::Response;
use rdf_quanta_engine::{Dataset, QueryRequest, evaluate_request};
use serde_json::json;
use std::sync::Arc;

pub async fn handle_query_get(
    State(state): State<AppState>,
    format: Result<ResponseFormat, ServerError>,
    params: Result<SparqlQueryParams, ServerError>,
) -> Result<Response, ServerError> {
    run_query(state.dataset, params?, format?).await
}

pub async fn handle_query_post(
    State(state): State<AppState>,
    format: Result<ResponseFormat, ServerError>,
    Json(body): Json<SparqlQueryBody>,
) -> Result<Response, ServerError> {
    let params = SparqlQueryParams::from_body(body)?;
    run_query(state.dataset, params, format?).await
}

async fn run_query(
    dataset: Arc<Dataset>,
    params: SparqlQueryParams,
    format: ResponseFormat,
) -> Result<Response, ServerError> {
    let request = QueryRequest {
        query: params.query.clone(),
        graph: resolve_graph_name(&params.default_graph_uri),
        continuation: params.next,
    };
    // The engine is synchronous and one slice is quota-bounded; run it on
    // the blocking pool so the async workers stay responsive.
    let page = tokio::task::spawn_blocking(move || evaluate_request(&dataset, &request))
        .await
        .map_err(|e| ServerError::Internal(e.into()))??;
    encode_response(page, format, params.query.as_deref())
}

/// Accepts both bare graph names and full graph URIs; a URI selects the
/// graph named by its last path segment.
fn resolve_graph_name(uri: &str) -> String {
    match uri.rsplit_once('/') {
        Some((prefix, name)) if !prefix.is_empty() && !name.is_empty() => {
            name.to_owned()
        }
        _ => uri.to_owned(),
    }
}

pub async fn handle_graph_describe(
    State(state): State<AppState>,
    Path(graph): Path<String>,
) -> Result<Json<serde_json::Value>, ServerError> {
    let graph = state
        .dataset
        .graph(&graph)
        .ok_or_else(|| ServerError::NotFound(format!("no RDF graph named '{graph}'")))?;
    let description = graph.describe("");
    serde_json::to_value(&description)
        .map(Json)
        .map_err(|e| ServerError::Internal(e.into()))
}

pub async fn handle_home(State(state): State<AppState>) -> Json<serde_json::Value> {
    let graphs: Vec<serde_json::Value> = state
        .dataset
        .graph_names()
        .into_iter()
        .filter_map(|name| state.dataset.graph(name))
        .map(|graph| {
            json!({
                "name": graph.name(),
                "description": graph.config().description,
                "publish": graph.config().publish,
                "endpoint": format!("/sparql?default-graph-uri={}", graph.name()),
            })
        })
        .collect();
    Json(json!({
        "name": "RDF Quanta",
        "mode": if state.dataset.is_stateless() { "stateless" } else { "stateful" },
        "graphs": graphs,
    }))
}
