//! Operator CLI for a running TrustChain node. Every subcommand maps onto
//! one RPC route and prints the JSON response.

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use serde_json::{json, Value};
use tracing::debug;

#[derive(Parser)]
#[command(name = "trustchain-cli")]
#[command(about = "TrustChain ledger CLI", long_about = None)]
pub struct Cli {
    /// Base URL of the TrustChain RPC server
    #[arg(long, global = true, default_value = "http://127.0.0.1:3030")]
    pub endpoint: String,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Register an address as a new user
    Register { address: String },

    /// Stake value on another user to boost their trust score
    Endorse {
        endorser: String,
        endorsee: String,
        stake: u128,
    },

    /// Contribute capital to the lending pool
    Deposit { from: String, amount: u128 },

    /// Request a loan. Collateral defaults to 130% of the amount.
    RequestLoan {
        borrower: String,
        amount: u128,
        #[arg(long)]
        collateral: Option<u128>,
    },

    /// Repay an active loan in full
    Repay {
        payer: String,
        loan_id: u64,
        amount: u128,
    },

    /// Sweep an overdue loan into default
    Sweep { caller: String, loan_id: u64 },

    /// Show a user's on-ledger profile
    User { address: String },

    /// Show a loan by id
    Loan { loan_id: u64 },

    /// List a user's active loan ids
    Loans { address: String },

    /// Show pool liquidity and active loan count
    Pool,

    /// Show the withdrawable balance credited to an address
    Balance { address: String },

    /// Dump the ledger's audit trail
    Events,
}

pub async fn run(cli: Cli) -> Result<()> {
    let client = reqwest::Client::new();
    let endpoint = cli.endpoint.trim_end_matches('/');

    let response = match &cli.command {
        Commands::Register { address } => {
            client
                .post(format!("{endpoint}/user/register"))
                .json(&json!({ "address": address }))
                .send()
                .await
        }
        Commands::Endorse {
            endorser,
            endorsee,
            stake,
        } => {
            client
                .post(format!("{endpoint}/endorse"))
                .json(&json!({
                    "endorser": endorser,
                    "endorsee": endorsee,
                    "stake": stake,
                }))
                .send()
                .await
        }
        Commands::Deposit { from, amount } => {
            client
                .post(format!("{endpoint}/pool/deposit"))
                .json(&json!({ "from": from, "amount": amount }))
                .send()
                .await
        }
        Commands::RequestLoan {
            borrower,
            amount,
            collateral,
        } => {
            let collateral = (*collateral).unwrap_or(amount.saturating_mul(13_000) / 10_000);
            client
                .post(format!("{endpoint}/loan/request"))
                .json(&json!({
                    "borrower": borrower,
                    "amount": amount,
                    "collateral": collateral,
                }))
                .send()
                .await
        }
        Commands::Repay {
            payer,
            loan_id,
            amount,
        } => {
            client
                .post(format!("{endpoint}/loan/repay"))
                .json(&json!({
                    "payer": payer,
                    "loan_id": loan_id,
                    "amount": amount,
                }))
                .send()
                .await
        }
        Commands::Sweep { caller, loan_id } => {
            client
                .post(format!("{endpoint}/loan/sweep"))
                .json(&json!({ "caller": caller, "loan_id": loan_id }))
                .send()
                .await
        }
        Commands::User { address } => client.get(format!("{endpoint}/user/{address}")).send().await,
        Commands::Loan { loan_id } => client.get(format!("{endpoint}/loan/{loan_id}")).send().await,
        Commands::Loans { address } => {
            client
                .get(format!("{endpoint}/user/{address}/loans"))
                .send()
                .await
        }
        Commands::Pool => client.get(format!("{endpoint}/pool")).send().await,
        Commands::Balance { address } => {
            client
                .get(format!("{endpoint}/balance/{address}"))
                .send()
                .await
        }
        Commands::Events => client.get(format!("{endpoint}/events")).send().await,
    };

    let response = response.context("request to the TrustChain RPC server failed")?;
    let status = response.status();
    debug!("{} -> {}", endpoint, status);

    let body: Value = response
        .json()
        .await
        .context("response was not valid JSON")?;
    println!("{}", serde_json::to_string_pretty(&body)?);

    if !status.is_success() {
        bail!(
            "operation rejected ({}): {}",
            body["error"].as_str().unwrap_or("Unknown"),
            body["message"].as_str().unwrap_or("")
        );
    }
    Ok(())
}
