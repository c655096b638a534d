use rdf_quanta_engine::GraphConfig;
use serde::Deserialize;
use std::path::PathBuf;

fn default_bind() -> String {
    "localhost:8000".to_owned()
}

fn default_stateless() -> bool {
    true
}

/// The server configuration file.
#[derive(Debug, Deserialize)]
pub struct ServerSettings {
    #[serde(default = "default_bind")]
    pub bind: String,
    /// Stateless continuations (self-contained tokens) vs. stateful
    /// (server-side saved plans addressed by id).
    #[serde(default = "default_stateless")]
    pub stateless: bool,
    #[serde(default)]
    pub cors: bool,
    pub graphs: Vec<GraphSettings>,
}

/// One graph entry: its execution budget plus the RDF files to load.
#[derive(Debug, Deserialize)]
pub struct GraphSettings {
    #[serde(flatten)]
    pub config: GraphConfig,
    #[serde(default)]
    pub files: Vec<PathBuf>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn minimal_configuration_parses() {
        let settings: ServerSettings = serde_json::from_str(
            r#"{
                "graphs": [
                    {"name": "test", "quota_ms": 75, "max_results": 2000,
                     "files": ["data/test.nt"]}
                ]
            }"#,
        )
        .unwrap();
        assert_eq!(settings.bind, "localhost:8000");
        assert!(settings.stateless);
        assert_eq!(settings.graphs.len(), 1);
        assert_eq!(settings.graphs[0].config.quota_ms, 75);
        assert_eq!(settings.graphs[0].config.distinct_cap, 100_000);
    }

    #[test]
    fn example_queries_parse() {
        let settings: ServerSettings = serde_json::from_str(
            r#"{
                "stateless": false,
                "graphs": [
                    {"name": "test", "quota_ms": 75, "max_results": 10,
                     "publish": true,
                     "example_queries": [{"name": "all", "query": "SELECT * WHERE { ?s ?p ?o }"}]}
                ]
            }"#,
        )
        .unwrap();
        assert!(!settings.stateless);
        assert_eq!(settings.graphs[0].config.example_queries.len(), 1);
    }
}
