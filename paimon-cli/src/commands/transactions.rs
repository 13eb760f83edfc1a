//! Transactions command - paginated history

use std::process::ExitCode;

use anyhow::Result;
use colored::Colorize;
use comfy_table::{Cell, CellAlignment, Color};
use paimon_core::services::Counterparty;

use super::{exit_code, get_context, report_failure, require_user};
use crate::output;

pub fn run(user: Option<String>, limit: u32, offset: u32, json: bool) -> Result<ExitCode> {
    let user = require_user(user)?;
    let ctx = get_context()?;
    let result = ctx.query_service.list_transactions(&user, limit, offset);

    if !result.is_success() {
        return report_failure(&result, json);
    }

    if json {
        println!("{}", serde_json::to_string_pretty(&result)?);
        return Ok(exit_code(result.status));
    }

    let entries = result.data.as_deref().unwrap_or_default();
    let mut table = output::create_table();
    table.set_header(vec!["Transaction", "Created", "Amount", "Currency", "Counterparty", "Proof"]);

    for entry in entries {
        let (amount, party) = match &entry.counterparty {
            Counterparty::Source(account) => (
                Cell::new(format!("+{}", entry.balance)).fg(Color::Green),
                format!("from {} ({})", account.bank_account_number, account.bank_name),
            ),
            Counterparty::Recipient(account) => (
                Cell::new(format!("-{}", entry.balance)).fg(Color::Red),
                format!("to {} ({})", account.bank_account_number, account.bank_name),
            ),
        };
        table.add_row(vec![
            Cell::new(&entry.transaction_id),
            Cell::new(output::format_millis(entry.created_at)),
            amount.set_alignment(CellAlignment::Right),
            Cell::new(&entry.currency),
            Cell::new(party),
            Cell::new(entry.transfer_proof_img.as_deref().unwrap_or("")),
        ]);
    }

    if !entries.is_empty() {
        println!("{}", table);
    }
    if let Some(meta) = result.meta {
        println!(
            "{}",
            format!(
                "Showing {} of {} (offset {}, limit {})",
                entries.len(),
                meta.total,
                meta.offset,
                meta.limit
            )
            .dimmed()
        );
    }

    Ok(exit_code(result.status))
}
