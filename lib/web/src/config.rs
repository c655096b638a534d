use rdf_quanta_engine::Dataset;
use std::sync::Arc;

/// Holds the configuration for an RDF Quanta web server.
pub struct ServerConfig {
    /// The dataset registry the server exposes.
    pub dataset: Arc<Dataset>,
    /// The IP address or DNS name that the socket binds to.
    pub bind: String,
    /// Whether CORS is enabled.
    pub cors: bool,
}
