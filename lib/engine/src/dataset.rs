use crate::plans::{InMemoryPlanStore, SavedPlanStore};
use rdf_quanta_storage::GraphBackend;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

fn default_distinct_cap() -> usize {
    100_000
}

/// Immutable per-graph configuration, fixed at startup.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GraphConfig {
    pub name: String,
    #[serde(default)]
    pub description: String,
    /// Wall-time budget of one execution slice, in milliseconds.
    pub quota_ms: u64,
    /// Result-page cap of one execution slice.
    pub max_results: usize,
    /// Seen-set cap of DISTINCT operators.
    #[serde(default = "default_distinct_cap")]
    pub distinct_cap: usize,
    /// Whether the graph is advertised on the server home page.
    #[serde(default)]
    pub publish: bool,
    #[serde(default)]
    pub example_queries: Vec<ExampleQuery>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExampleQuery {
    pub name: String,
    pub query: String,
}

/// The JSON descriptor served for a graph.
#[derive(Debug, Clone, Serialize)]
pub struct GraphDescription {
    #[serde(rename = "@id")]
    pub id: String,
    pub name: String,
    pub description: String,
    pub quota_ms: u64,
    pub max_results: usize,
    pub publish: bool,
    pub example_queries: Vec<ExampleQuery>,
}

/// A registered graph: a storage backend plus its execution budget.
pub struct Graph {
    backend: Arc<dyn GraphBackend>,
    config: GraphConfig,
}

impl Graph {
    pub fn new(backend: Arc<dyn GraphBackend>, config: GraphConfig) -> Self {
        Self { backend, config }
    }

    pub fn name(&self) -> &str {
        &self.config.name
    }

    pub fn backend(&self) -> &Arc<dyn GraphBackend> {
        &self.backend
    }

    pub fn config(&self) -> &GraphConfig {
        &self.config
    }

    pub fn quota(&self) -> Duration {
        Duration::from_millis(self.config.quota_ms)
    }

    pub fn max_results(&self) -> usize {
        self.config.max_results
    }

    pub fn describe(&self, url: &str) -> GraphDescription {
        GraphDescription {
            id: format!("{url}/sparql/{}", self.config.name),
            name: self.config.name.clone(),
            description: self.config.description.clone(),
            quota_ms: self.config.quota_ms,
            max_results: self.config.max_results,
            publish: self.config.publish,
            example_queries: self.config.example_queries.clone(),
        }
    }
}

/// The read-only registry of graphs a server exposes, plus the
/// continuation mode (stateless tokens vs. saved-plan ids).
pub struct Dataset {
    graphs: HashMap<String, Arc<Graph>>,
    saved_plans: Option<Arc<dyn SavedPlanStore>>,
}

impl Dataset {
    /// A dataset whose continuations are self-contained tokens.
    pub fn stateless() -> Self {
        Self {
            graphs: HashMap::new(),
            saved_plans: None,
        }
    }

    /// A dataset whose continuations are ids into `store`.
    pub fn stateful(store: Arc<dyn SavedPlanStore>) -> Self {
        Self {
            graphs: HashMap::new(),
            saved_plans: Some(store),
        }
    }

    /// A stateful dataset backed by the default in-process store.
    pub fn stateful_in_memory() -> Self {
        Self::stateful(Arc::new(InMemoryPlanStore::new()))
    }

    pub fn with_graph(mut self, graph: Graph) -> Self {
        self.graphs
            .insert(graph.name().to_owned(), Arc::new(graph));
        self
    }

    pub fn graph(&self, name: &str) -> Option<&Arc<Graph>> {
        self.graphs.get(name)
    }

    pub fn graph_names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.graphs.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }

    pub fn is_stateless(&self) -> bool {
        self.saved_plans.is_none()
    }

    pub fn saved_plans(&self) -> Option<&Arc<dyn SavedPlanStore>> {
        self.saved_plans.as_ref()
    }
}
