//! TrustChain node: loads the ledger configuration and serves the HTTP API.

use anyhow::{Context, Result};
use clap::Parser;
use std::net::SocketAddr;
use std::path::PathBuf;
use tracing::info;
use trustchain_ledger::{LedgerConfig, TrustLedger};

#[derive(Parser)]
#[command(name = "trustchain")]
#[command(about = "TrustChain ledger node", long_about = None)]
struct Args {
    /// Address to serve the RPC API on
    #[arg(long, default_value = "127.0.0.1:3030")]
    listen: SocketAddr,

    /// Path to a JSON ledger config; defaults apply when omitted
    #[arg(long)]
    config: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let args = Args::parse();
    let config = match &args.config {
        Some(path) => LedgerConfig::load(path)
            .with_context(|| format!("failed to load config from {}", path.display()))?,
        None => LedgerConfig::default(),
    };
    info!(
        "starting TrustChain node (interest {} bps, collateral {} bps, term {}s)",
        config.interest_rate_bps, config.collateral_factor_bps, config.loan_duration_secs
    );

    let ledger = TrustLedger::new(config).context("invalid ledger configuration")?;
    let shared = trustchain_rpc::new_shared(ledger);
    trustchain_rpc::serve(args.listen, shared).await;
    Ok(())
}
