use anyhow::Result;
use clap::Parser;
use trustchain_cli::{run, Cli};

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    run(Cli::parse()).await
}
