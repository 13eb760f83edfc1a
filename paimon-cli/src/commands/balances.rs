//! Balances command - list holdings per currency

use std::process::ExitCode;

use anyhow::Result;
use comfy_table::{Cell, CellAlignment};

use super::{exit_code, get_context, report_failure, require_user};
use crate::output;

pub fn run(user: Option<String>, json: bool) -> Result<ExitCode> {
    let user = require_user(user)?;
    let ctx = get_context()?;
    let result = ctx.query_service.list_balances(&user);

    if !result.is_success() {
        return report_failure(&result, json);
    }

    if json {
        println!("{}", serde_json::to_string_pretty(&result)?);
        return Ok(exit_code(result.status));
    }

    let balances = result.data.as_deref().unwrap_or_default();
    if balances.is_empty() {
        output::info("No balances yet");
        return Ok(exit_code(result.status));
    }

    let mut table = output::create_table();
    table.set_header(vec!["Currency", "Balance"]);
    for balance in balances {
        table.add_row(vec![
            Cell::new(&balance.currency),
            Cell::new(balance.balance).set_alignment(CellAlignment::Right),
        ]);
    }
    println!("{}", table);

    Ok(exit_code(result.status))
}
