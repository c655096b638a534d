//! HTTP transport for RDF Quanta.
//!
//! Exposes the preemptable query endpoint (`GET`/`POST /sparql`), graph
//! descriptors and the server home page. The engine itself is synchronous;
//! each execution slice runs on the blocking thread pool.

mod config;
mod error;
mod negotiation;
mod params;
mod results;
mod sparql;

pub use config::ServerConfig;
pub use negotiation::ResponseFormat;

use crate::sparql::{
    handle_graph_describe, handle_home, handle_query_get, handle_query_post,
};
use axum::body::Body;
use axum::http::Request;
use axum::routing::get;
use axum::Router;
use rdf_quanta_engine::Dataset;
use std::net::SocketAddr;
use std::str::FromStr;
use std::sync::Arc;
use tower_http::trace::TraceLayer;
use tracing::info_span;

pub async fn serve(config: ServerConfig) -> anyhow::Result<()> {
    let addr = SocketAddr::from_str(&config.bind)?;
    let app = build_router(config.dataset, config.cors);

    tracing::info!("listening on {addr}");
    let listener = tokio::net::TcpListener::bind(addr).await?;
    Ok(axum::serve(listener, app).await?)
}

/// Builds the application router; separate from [`serve`] so tests can
/// drive it without a socket.
pub fn build_router(dataset: Arc<Dataset>, cors: bool) -> Router {
    // One span per request, named so that engine-side events (slice
    // timings, aborts) nest under the query that caused them.
    let trace = TraceLayer::new_for_http().make_span_with(|request: &Request<Body>| {
        info_span!(
            "sparql_request",
            method = %request.method(),
            path = %request.uri().path(),
        )
    });

    let state = AppState { dataset };
    let app = Router::new()
        .route("/", get(handle_home))
        .route("/sparql", get(handle_query_get).post(handle_query_post))
        .route("/sparql/{graph}", get(handle_graph_describe))
        .with_state(state)
        .layer(trace);
    if cors {
        app.layer(tower_http::cors::CorsLayer::permissive())
    } else {
        app
    }
}

#[derive(Clone)]
pub(crate) struct AppState {
    pub(crate) dataset: Arc<Dataset>,
}
