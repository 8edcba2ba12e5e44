use clap::{Parser, Subcommand};

use fundrag_core::types::SourceTag;
use fundrag_hybrid::SearchMode;

#[derive(Parser, Debug)]
#[command(name = "fundrag", version, about = "Hybrid keyword + vector retrieval over fund FAQs and fund data")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Build the indices from the configured CSV files
    Ingest {
        /// Rebuild the vector index even if the source data is unchanged
        #[arg(long)]
        force: bool,
    },

    /// Retrieve context for a question
    Query {
        text: String,

        /// lexical, semantic or hybrid
        #[arg(short, long, default_value = "hybrid", value_parser = parse_mode)]
        mode: SearchMode,

        #[arg(short = 'k', long)]
        top_k: Option<usize>,

        /// Only return documents from this source (faq or fund)
        #[arg(short, long, value_parser = parse_source)]
        source: Option<SourceTag>,

        /// Weight of the vector ranking in hybrid mode, 0..=1
        #[arg(short, long)]
        alpha: Option<f64>,

        #[arg(long)]
        no_rerank: bool,

        /// Print the full response as JSON
        #[arg(long)]
        json: bool,
    },

    /// Show index readiness, document counts and cache statistics
    Status,
}

fn parse_mode(s: &str) -> Result<SearchMode, String> {
    s.parse().map_err(|e: fundrag_core::Error| e.to_string())
}

fn parse_source(s: &str) -> Result<SourceTag, String> {
    s.parse().map_err(|e: fundrag_core::Error| e.to_string())
}
