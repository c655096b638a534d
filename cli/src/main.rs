#![allow(clippy::print_stdout, clippy::print_stderr)]
use crate::cli::{Args, Command};
use crate::config::ServerSettings;
use anyhow::{Context, bail};
use clap::Parser;
use oxrdfio::{RdfFormat, RdfParser};
use rdf_quanta_engine::{Dataset, Graph, GraphConfig, QueryRequest, evaluate_request};
use rdf_quanta_model::Triple;
use rdf_quanta_storage::MemoryGraph;
use std::ffi::OsStr;
use std::fs::File;
use std::io::BufReader;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

mod cli;
mod config;

#[tokio::main]
pub async fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let matches = Args::parse();
    match matches.command {
        Command::Serve { config, bind } => {
            let file = File::open(&config)
                .with_context(|| format!("cannot open {}", config.display()))?;
            let settings: ServerSettings = serde_json::from_reader(BufReader::new(file))
                .with_context(|| format!("cannot parse {}", config.display()))?;
            let bind = bind.unwrap_or_else(|| settings.bind.clone());
            let cors = settings.cors;
            let dataset = build_dataset(settings)?;
            rdf_quanta_web::serve(rdf_quanta_web::ServerConfig {
                dataset: Arc::new(dataset),
                bind,
                cors,
            })
            .await
        }
        Command::Query {
            file,
            query,
            quota,
            max_results,
        } => run_query(&file, &query, quota, max_results),
    }
}

fn build_dataset(settings: ServerSettings) -> anyhow::Result<Dataset> {
    let mut dataset = if settings.stateless {
        Dataset::stateless()
    } else {
        Dataset::stateful_in_memory()
    };
    for graph in settings.graphs {
        let backend = Arc::new(load_graph(&graph.files)?);
        tracing::info!(
            graph = graph.config.name,
            triples = backend.len(),
            "graph loaded"
        );
        dataset = dataset.with_graph(Graph::new(backend, graph.config));
    }
    Ok(dataset)
}

fn load_graph(files: &[PathBuf]) -> anyhow::Result<MemoryGraph> {
    let mut triples = Vec::new();
    for path in files {
        let format = rdf_format_from_path(path)?;
        let file = File::open(path)
            .with_context(|| format!("cannot open {}", path.display()))?;
        for quad in RdfParser::from_format(format).for_reader(BufReader::new(file)) {
            let quad =
                quad.with_context(|| format!("cannot parse {}", path.display()))?;
            // Named graphs in the input collapse into the loaded graph.
            triples.push(Triple::new(quad.subject, quad.predicate, quad.object));
        }
    }
    Ok(MemoryGraph::from_triples(triples))
}

fn rdf_format_from_path(path: &Path) -> anyhow::Result<RdfFormat> {
    let Some(extension) = path.extension().and_then(OsStr::to_str) else {
        bail!("cannot guess the RDF format of {}", path.display());
    };
    RdfFormat::from_extension(extension)
        .with_context(|| format!("unknown RDF file extension '{extension}'"))
}

fn run_query(
    files: &[PathBuf],
    query: &str,
    quota: u64,
    max_results: usize,
) -> anyhow::Result<()> {
    let backend = Arc::new(load_graph(files)?);
    let config = GraphConfig {
        name: "default".to_owned(),
        description: String::new(),
        quota_ms: quota,
        max_results,
        distinct_cap: 100_000,
        publish: false,
        example_queries: Vec::new(),
    };
    let dataset = Dataset::stateless().with_graph(Graph::new(backend, config));

    let mut request = QueryRequest {
        query: Some(query.to_owned()),
        graph: "default".to_owned(),
        continuation: None,
    };
    let mut pages = 0_usize;
    let mut results = 0_usize;
    loop {
        let page = evaluate_request(&dataset, &request)?;
        pages += 1;
        results += page.bindings.len();
        for mapping in &page.bindings {
            println!("{mapping}");
        }
        if let Some(boolean) = page.boolean {
            println!("{boolean}");
        }
        match page.next {
            Some(next) => {
                request.query = None;
                request.continuation = Some(next);
            }
            None => break,
        }
    }
    eprintln!("{results} result(s) over {pages} page(s)");
    Ok(())
}
