use clap::{Parser, Subcommand, ValueHint};
use std::path::PathBuf;

#[derive(Parser)]
#[command(about, version, name = "rdf-quanta")]
/// RDF Quanta command line tool and preemptable SPARQL HTTP server
pub struct Args {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand)]
pub enum Command {
    /// Start the preemptable SPARQL HTTP server
    Serve {
        /// Path to the server configuration file (JSON)
        #[arg(short, long, value_hint = ValueHint::FilePath)]
        config: PathBuf,
        /// Host and port to listen to; overrides the configuration file
        #[arg(short, long, value_hint = ValueHint::Hostname)]
        bind: Option<String>,
    },
    /// Execute one query against local RDF files, paging to completion
    ///
    /// Runs the same quota-bounded engine as the server and resumes the
    /// produced continuations in a loop, which makes it handy for checking
    /// how a query slices up under a given budget.
    Query {
        /// RDF file(s) to load into the queried graph
        ///
        /// The format is guessed from the file extension.
        #[arg(short, long, required = true, value_hint = ValueHint::FilePath)]
        file: Vec<PathBuf>,
        /// The SPARQL query to execute
        #[arg(short, long)]
        query: String,
        /// Wall-time quota of one execution slice, in milliseconds
        #[arg(long, default_value_t = 75)]
        quota: u64,
        /// Result cap of one execution slice
        #[arg(long, default_value_t = 500)]
        max_results: usize,
    },
}
