//! Deposit command - credit money from an external bank account

use std::process::ExitCode;

use anyhow::Result;
use paimon_core::DepositRequest;

use super::{exit_code, get_context, report_failure, require_user};
use crate::output;

pub fn run(user: Option<String>, request: &DepositRequest, json: bool) -> Result<ExitCode> {
    let user = require_user(user)?;
    let ctx = get_context()?;
    let result = ctx.deposit(&user, request);

    let Some(receipt) = result.data.as_ref().filter(|_| result.is_success()) else {
        return report_failure(&result, json);
    };

    if json {
        println!("{}", serde_json::to_string_pretty(&result)?);
    } else {
        output::success(&format!(
            "Deposited {} {} (transaction {})",
            request.added_balance, receipt.currency, receipt.transaction_id
        ));
        output::info(&format!("New balance: {} {}", receipt.balance, receipt.currency));
    }
    Ok(exit_code(result.status))
}
