mod app;
mod cli;

use clap::Parser;

use fundrag_core::config::Config;
use fundrag_core::types::{Hit, Origin};
use fundrag_hybrid::{RetrievalRequest, RetrievalResponse};

use app::{base_dir, App};
use cli::{Cli, Commands};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let config = Config::load()?;
    let settings = config.settings()?;
    init_logging(&settings.logging.level);

    let app = App::build(&settings, &base_dir()?)?;

    match cli.command {
        Commands::Ingest { force } => {
            let report = app.bootstrap(force).await?;
            println!("Indexing finished");
            println!("  decision:  {:?}{}", report.decision, if report.forced { " (forced)" } else { "" });
            println!("  keyword:   {} documents", report.lexical_documents);
            println!("  vector:    {} documents{}", report.vector_documents, if report.rebuilt { " (rebuilt)" } else { "" });
            if let Some(err) = &report.vector_error {
                println!("  vector index unavailable: {err}");
            }
        }
        Commands::Query { text, mode, top_k, source, alpha, no_rerank, json } => {
            app.bootstrap(false).await?;
            let mut request = RetrievalRequest::new(text).mode(mode).source(source);
            if let Some(k) = top_k {
                request = request.top_k(k);
            }
            if let Some(a) = alpha {
                request = request.alpha(a);
            }
            if no_rerank {
                request = request.without_rerank();
            }
            let response = app.pipeline().retrieve(&request).await?;
            if json {
                println!("{}", serde_json::to_string_pretty(&response)?);
            } else {
                print_response(&response);
            }
        }
        Commands::Status => {
            app.bootstrap(false).await?;
            let health = app.pipeline().health().await;
            println!("{}", serde_json::to_string_pretty(&health)?);
            println!("sources: {}", app.loader().source_paths().iter().map(|p| p.display().to_string()).collect::<Vec<_>>().join(", "));
        }
    }
    Ok(())
}

fn init_logging(level: &str) {
    use tracing_subscriber::{fmt, EnvFilter};

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
    fmt().with_env_filter(filter).with_target(false).with_writer(std::io::stderr).init();
}

fn print_response(response: &RetrievalResponse) {
    println!("Query: {} ({})", response.query, response.mode);
    if response.degraded {
        println!("note: degraded result, see log for details");
    }
    if response.hits.is_empty() {
        println!("no matches");
    }
    for (i, hit) in response.hits.iter().enumerate() {
        let origin = match hit {
            Hit::Lexical(_) => "lexical",
            Hit::Vector(_) => "vector",
            Hit::Fused(f) => match f.origin() {
                Origin::Both => "both",
                Origin::LexicalOnly => "lexical",
                Origin::VectorOnly => "vector",
            },
            Hit::Reranked(_) => "reranked",
        };
        println!("\n{:>2}. [{}] {}  score={:.4}  via {}", i + 1, hit.source_tag(), hit.id(), hit.score(), origin);
        for line in hit.text().lines() {
            println!("    {line}");
        }
    }
}
