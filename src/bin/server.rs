//! HTTP server for the holdings Q&A page and `/ask` endpoint

use anyhow::Result;
use clap::Parser;
use holdings_qa::{build_pipeline, llm, server, Config};
use std::path::PathBuf;
use std::sync::Arc;
use tokio::net::TcpListener;
use tracing::{info, warn};

#[derive(Parser)]
#[command(name = "server")]
#[command(about = "Serve the holdings Q&A endpoint")]
struct Args {
    /// Address to bind (or set HOLDINGS_QA_BIND)
    #[arg(short, long)]
    bind: Option<String>,

    /// Directory containing holdings.csv and trades.csv
    #[arg(short, long)]
    data_dir: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load environment variables from .env file
    dotenv::dotenv().ok();
    holdings_qa::init_tracing();

    let args = Args::parse();
    let mut config = Config::from_env()?;
    if let Some(bind) = args.bind {
        config.bind_addr = bind;
    }
    if let Some(dir) = args.data_dir {
        config.data_dir = dir;
    }

    info!(
        "Starting holdings Q&A server ({:?} backend, data from {})",
        config.llm.provider,
        config.data_dir.display()
    );
    if !llm::backend_reachable(&config.llm).await {
        warn!(
            "Ollama is not responding at {}; questions will get no answer until it is up",
            config.llm.ollama_url
        );
    }
    let pipeline = Arc::new(build_pipeline(&config)?);

    let listener = TcpListener::bind(&config.bind_addr).await?;
    server::serve(listener, pipeline).await?;
    Ok(())
}
