//! CLI command implementations

pub mod balances;
pub mod deposit;
pub mod doctor;
pub mod transactions;
pub mod withdraw;

use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::{anyhow, Context, Result};
use paimon_core::{OperationResult, OutcomeStatus, PaimonContext};
use serde::Serialize;

use crate::output;

/// Exit code for a rejected withdrawal
const EXIT_INSUFFICIENT_FUNDS: u8 = 2;

/// Get the paimon data directory from environment or default
pub fn get_data_dir() -> Result<PathBuf> {
    if let Ok(dir) = std::env::var("PAIMON_DIR") {
        return Ok(PathBuf::from(dir));
    }
    dirs::home_dir()
        .map(|home| home.join(".paimon"))
        .ok_or_else(|| anyhow!("Could not find home directory; set PAIMON_DIR"))
}

/// Open the ledger in the data directory
pub fn get_context() -> Result<PaimonContext> {
    let data_dir = get_data_dir()?;
    PaimonContext::new(&data_dir)
        .with_context(|| format!("Failed to open ledger in {}", data_dir.display()))
}

/// The authenticated user, required by every ledger command
pub fn require_user(user: Option<String>) -> Result<String> {
    match user {
        Some(id) if !id.trim().is_empty() => Ok(id),
        _ => Err(anyhow!("No user given; pass --user or set PAIMON_USER_ID")),
    }
}

/// Map an outcome to the process exit code
pub fn exit_code(status: OutcomeStatus) -> ExitCode {
    match status {
        OutcomeStatus::Success => ExitCode::SUCCESS,
        OutcomeStatus::InsufficientFunds => ExitCode::from(EXIT_INSUFFICIENT_FUNDS),
        OutcomeStatus::Internal => ExitCode::FAILURE,
    }
}

/// Print a failed result the same way for every command
pub fn report_failure<T: Serialize>(result: &OperationResult<T>, json: bool) -> Result<ExitCode> {
    if json {
        println!("{}", serde_json::to_string_pretty(result)?);
    } else {
        let message = result.message.as_deref().unwrap_or("Operation failed");
        match &result.error {
            Some(detail) => output::error(&format!("{}: {}", message, detail)),
            None => output::error(message),
        }
    }
    Ok(exit_code(result.status))
}
