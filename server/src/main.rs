use anyhow::Result;
use axum::Router;
use bookrec_core::EngineConfig;
use clap::Parser;
use std::net::SocketAddr;
use tracing_subscriber::{fmt, EnvFilter};
use server::build_app;
use tokio::net::TcpListener;

#[derive(Parser)]
struct Args {
    /// Artifact directory written by the indexer
    #[arg(long, default_value = "./artifacts")]
    artifacts: String,
    /// Host to bind
    #[arg(long, default_value = "0.0.0.0")]
    host: String,
    /// Port to bind
    #[arg(long, default_value_t = 8080)]
    port: u16,
    /// Results per free-text query
    #[arg(long, default_value_t = 5)]
    text_k: usize,
    /// Results per library (book id) query
    #[arg(long, default_value_t = 20)]
    item_k: usize,
    /// Neighbor users per collaborative query
    #[arg(long, default_value_t = 200)]
    cf_neighbors: usize,
    /// Results per collaborative query
    #[arg(long, default_value_t = 20)]
    cf_recs: usize,
    /// Default number of item columns in a cold-start sample
    #[arg(long, default_value_t = 9)]
    sample_size: usize,
    /// Words of a free-text query kept before encoding
    #[arg(long, default_value_t = 256)]
    max_query_words: usize,
}

impl Args {
    fn engine_config(&self) -> EngineConfig {
        EngineConfig {
            text_k: self.text_k,
            item_k: self.item_k,
            cf_neighbors: self.cf_neighbors,
            cf_recs: self.cf_recs,
            sample_size: self.sample_size,
            max_query_words: self.max_query_words,
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    fmt().with_env_filter(EnvFilter::from_default_env()).init();
    let args = Args::parse();
    let app: Router = build_app(&args.artifacts, args.engine_config())?;

    let addr: SocketAddr = format!("{}:{}", args.host, args.port).parse()?;
    let listener = TcpListener::bind(addr).await?;
    tracing::info!(%addr, "server listening");
    axum::serve(listener, app).await?;
    Ok(())
}
