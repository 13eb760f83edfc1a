//! Paimon CLI - multi-currency balances in your terminal

use std::process::ExitCode;

use anyhow::Result;
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

mod commands;
mod output;

use commands::{balances, deposit, doctor, transactions, withdraw};

/// Paimon - multi-currency balance ledger
#[derive(Parser)]
#[command(name = "paimon", version, about, long_about = None)]
struct Cli {
    /// User whose ledger to operate on
    #[arg(long, short, global = true, env = "PAIMON_USER_ID")]
    user: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Record money arriving from an external bank account
    Deposit {
        /// Amount in minor units
        #[arg(long)]
        amount: i64,
        /// ISO-4217 currency code
        #[arg(long)]
        currency: String,
        /// Sender bank account number
        #[arg(long)]
        sender_account: String,
        /// Sender bank name
        #[arg(long)]
        sender_bank: String,
        /// URL of the transfer proof image (.jpg, .jpeg, .png)
        #[arg(long)]
        proof: String,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },

    /// Send money to an external bank account
    Withdraw {
        /// Amount in minor units
        #[arg(long)]
        amount: i64,
        /// ISO-4217 currency code
        #[arg(long)]
        currency: String,
        /// Recipient bank account number
        #[arg(long)]
        recipient_account: String,
        /// Recipient bank name
        #[arg(long)]
        recipient_bank: String,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },

    /// Show balances per currency
    Balances {
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },

    /// Show transaction history, newest first
    Transactions {
        /// Maximum number of entries
        #[arg(long, default_value_t = 5)]
        limit: u32,
        /// Entries to skip
        #[arg(long, default_value_t = 0)]
        offset: u32,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },

    /// Reconcile balances against the ledger
    Doctor {
        /// Show verbose output
        #[arg(long, short)]
        verbose: bool,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));

    // stderr only, stdout carries command output
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .try_init();
}

fn main() -> ExitCode {
    init_tracing();
    let cli = Cli::parse();

    match run(cli) {
        Ok(code) => code,
        Err(e) => {
            output::error(&format!("{:#}", e));
            ExitCode::FAILURE
        }
    }
}

fn run(cli: Cli) -> Result<ExitCode> {
    let user = cli.user;
    match cli.command {
        Commands::Deposit {
            amount,
            currency,
            sender_account,
            sender_bank,
            proof,
            json,
        } => {
            let request = paimon_core::DepositRequest {
                sender_bank_account_number: sender_account,
                sender_bank_name: sender_bank,
                added_balance: amount,
                currency,
                transfer_proof_img: proof,
            };
            deposit::run(user, &request, json)
        }
        Commands::Withdraw {
            amount,
            currency,
            recipient_account,
            recipient_bank,
            json,
        } => {
            let request = paimon_core::WithdrawalRequest {
                recipient_bank_account_number: recipient_account,
                recipient_bank_name: recipient_bank,
                balances: amount,
                from_currency: currency,
            };
            withdraw::run(user, &request, json)
        }
        Commands::Balances { json } => balances::run(user, json),
        Commands::Transactions {
            limit,
            offset,
            json,
        } => transactions::run(user, limit, offset, json),
        Commands::Doctor { verbose, json } => doctor::run(verbose, json),
    }
}
