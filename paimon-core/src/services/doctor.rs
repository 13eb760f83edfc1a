//! Doctor service - ledger reconciliation checks

use std::collections::BTreeMap;
use std::sync::Arc;

use serde::Serialize;
use serde_json::json;

use crate::adapters::duckdb::DuckDbRepository;
use crate::domain::result::Result;
use crate::ports::Storage;

/// Doctor service for health checks
pub struct DoctorService {
    repository: Arc<DuckDbRepository>,
}

impl DoctorService {
    pub fn new(repository: Arc<DuckDbRepository>) -> Self {
        Self { repository }
    }

    /// Run all checks; ledger checks share one consistent snapshot
    pub fn run_checks(&self) -> Result<DoctorResult> {
        let mut checks = BTreeMap::new();

        let location = match self.repository.db_path() {
            Some(path) => path.display().to_string(),
            None => "in-memory".to_string(),
        };
        checks.insert(
            "database".to_string(),
            CheckResult {
                status: "pass".to_string(),
                message: format!("Database at {}", location),
                details: None,
            },
        );

        let pending = self.repository.pending_migrations()?;
        checks.insert(
            "schema_migrations".to_string(),
            CheckResult::from_findings(
                "warning",
                pending.iter().map(|name| json!({"migration": name})).collect(),
                "All migrations applied",
                |n| format!("{} migration(s) pending", n),
            ),
        );

        let unit = self.repository.begin()?;

        // Every balance must equal the sum of its ledger entries
        let mismatches = unit.check_balance_mismatches()?;
        checks.insert(
            "balance_matches_ledger".to_string(),
            CheckResult::from_findings(
                "error",
                mismatches
                    .iter()
                    .map(|(user_id, currency, balance, ledger_sum)| {
                        json!({
                            "user_id": user_id,
                            "currency": currency,
                            "balance": balance,
                            "ledger_sum": ledger_sum,
                        })
                    })
                    .collect(),
                "All balances match their ledger entries",
                |n| format!("{} balance(s) differ from the sum of their ledger entries", n),
            ),
        );

        let negative = unit.check_negative_balances()?;
        checks.insert(
            "negative_balances".to_string(),
            CheckResult::from_findings(
                "error",
                negative
                    .iter()
                    .map(|(user_id, currency, balance)| {
                        json!({"user_id": user_id, "currency": currency, "balance": balance})
                    })
                    .collect(),
                "No negative balances",
                |n| format!("{} balance(s) are below zero", n),
            ),
        );

        let orphaned = unit.check_orphaned_entries()?;
        checks.insert(
            "orphaned_entries".to_string(),
            CheckResult::from_findings(
                "error",
                orphaned
                    .iter()
                    .map(|(transaction_id, user_id, currency)| {
                        json!({
                            "transaction_id": transaction_id,
                            "user_id": user_id,
                            "currency": currency,
                        })
                    })
                    .collect(),
                "Every ledger entry has a balance",
                |n| format!("{} ledger entr(ies) have no balance row", n),
            ),
        );

        let zero = unit.check_zero_amount_entries()?;
        checks.insert(
            "zero_amount_entries".to_string(),
            CheckResult::from_findings(
                "warning",
                zero.iter().map(|id| json!({"transaction_id": id})).collect(),
                "No zero-amount entries",
                |n| format!("{} ledger entr(ies) move no money", n),
            ),
        );

        let transactions = unit.get_transaction_count()?;
        let balances = unit.get_balance_count()?;
        checks.insert(
            "ledger_size".to_string(),
            CheckResult {
                status: "pass".to_string(),
                message: format!("{} balance(s), {} ledger entr(ies)", balances, transactions),
                details: None,
            },
        );

        let passed = checks.values().filter(|c| c.status == "pass").count() as i64;
        let warnings = checks.values().filter(|c| c.status == "warning").count() as i64;
        let errors = checks.values().filter(|c| c.status == "error").count() as i64;

        if errors > 0 {
            tracing::warn!(errors, warnings, "reconciliation found problems");
        }

        Ok(DoctorResult {
            checks,
            summary: DoctorSummary {
                passed,
                warnings,
                errors,
            },
        })
    }
}

#[derive(Debug, Serialize)]
pub struct DoctorResult {
    pub checks: BTreeMap<String, CheckResult>,
    pub summary: DoctorSummary,
}

impl DoctorResult {
    pub fn is_healthy(&self) -> bool {
        self.summary.errors == 0
    }
}

#[derive(Debug, Serialize)]
pub struct CheckResult {
    pub status: String,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<Vec<serde_json::Value>>,
}

impl CheckResult {
    fn from_findings(
        severity: &str,
        findings: Vec<serde_json::Value>,
        clean: &str,
        dirty: impl FnOnce(usize) -> String,
    ) -> Self {
        if findings.is_empty() {
            Self {
                status: "pass".to_string(),
                message: clean.to_string(),
                details: None,
            }
        } else {
            Self {
                status: severity.to_string(),
                message: dirty(findings.len()),
                details: Some(findings),
            }
        }
    }
}

#[derive(Debug, Serialize)]
pub struct DoctorSummary {
    pub passed: i64,
    pub warnings: i64,
    pub errors: i64,
}
