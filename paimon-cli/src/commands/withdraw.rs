//! Withdraw command - send money to an external bank account

use std::process::ExitCode;

use anyhow::Result;
use paimon_core::WithdrawalRequest;

use super::{exit_code, get_context, report_failure, require_user};
use crate::output;

pub fn run(user: Option<String>, request: &WithdrawalRequest, json: bool) -> Result<ExitCode> {
    let user = require_user(user)?;
    let ctx = get_context()?;
    let result = ctx.withdraw(&user, request);

    let Some(receipt) = result.data.as_ref().filter(|_| result.is_success()) else {
        return report_failure(&result, json);
    };

    if json {
        println!("{}", serde_json::to_string_pretty(&result)?);
    } else {
        output::success(&format!(
            "Withdrew {} {} to {} at {} (transaction {})",
            request.balances,
            receipt.currency,
            request.recipient_bank_account_number,
            request.recipient_bank_name,
            receipt.transaction_id
        ));
        output::info(&format!("Remaining balance: {} {}", receipt.balance, receipt.currency));
    }
    Ok(exit_code(result.status))
}
