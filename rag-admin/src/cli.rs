use std::path::PathBuf;

use clap::{Parser, Subcommand};

#[derive(Parser, Debug)]
#[command(name = "rag-admin")]
#[command(about = "Provisioning, corpus and client tools for the error-log RAG service")]
#[command(version)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Create the collection, its policies and the k-NN index mapping
    Provision,
    /// Write a synthetic error-log corpus to a JSON file
    GenerateLogs {
        /// Output file
        #[arg(long, default_value = "error_logs.json")]
        out: PathBuf,
        /// Seed for a reproducible corpus
        #[arg(long)]
        seed: Option<u64>,
        /// Length of the window ending now, in days
        #[arg(long, default_value_t = 7, value_parser = clap::value_parser!(i64).range(1..=365))]
        days: i64,
        /// Chance of one log per minute
        #[arg(long, default_value_t = 0.1)]
        probability: f64,
    },
    /// Embed and index error logs from a file or a fresh synthetic corpus
    Load {
        /// JSON array or JSON Lines file
        #[arg(long, required_unless_present = "generate", conflicts_with = "generate")]
        file: Option<PathBuf>,
        /// Generate a 7-day corpus instead of reading a file
        #[arg(long)]
        generate: bool,
        /// Seed used with --generate
        #[arg(long, requires = "generate")]
        seed: Option<u64>,
        /// Hide the progress bar
        #[arg(long)]
        no_progress: bool,
    },
    /// Nearest error logs for a query, without generation
    Search {
        query: String,
        /// Number of neighbours
        #[arg(short, long, default_value_t = 5)]
        k: usize,
    },
    /// Ask the running service; interactive when QUERY is omitted
    Ask {
        query: Option<String>,
        /// Full URL of the submit_query route
        #[arg(
            long,
            env = "RAG_SERVICE_URL",
            default_value = "http://127.0.0.1:5000/submit_query"
        )]
        url: String,
        /// Request a single JSON answer instead of a stream
        #[arg(long)]
        no_stream: bool,
    },
    /// Upload a local file (e.g. a PDF) to AWS_BUCKET_NAME
    Upload { file: PathBuf },
}
