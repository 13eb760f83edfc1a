//! Query service - read-only views of balances and history

use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::domain::result::{OperationResult, Pagination, Result};
use crate::domain::{BankAccount, Direction, LedgerEntry};
use crate::ports::{BalanceStore, Storage, TransactionLedger};

/// One currency holding as shown to the user
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BalanceView {
    pub currency: String,
    pub balance: i64,
}

/// Where the money came from or went to
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Counterparty {
    Source(BankAccount),
    Recipient(BankAccount),
}

/// Ledger entry in presentation form
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TransactionView {
    pub transaction_id: String,
    /// Unsigned magnitude; direction is carried by `source` / `recipient`
    pub balance: u64,
    pub currency: String,
    pub transfer_proof_img: Option<String>,
    /// Milliseconds since the Unix epoch
    pub created_at: i64,
    #[serde(flatten)]
    pub counterparty: Counterparty,
}

impl From<LedgerEntry> for TransactionView {
    fn from(entry: LedgerEntry) -> Self {
        let balance = entry.magnitude();
        let counterparty = match entry.direction() {
            Direction::Inbound => Counterparty::Source(entry.counterparty),
            Direction::Outbound => Counterparty::Recipient(entry.counterparty),
        };
        Self {
            transaction_id: entry.transaction_id,
            balance,
            currency: entry.currency.to_string(),
            transfer_proof_img: entry.proof_image,
            created_at: entry.created_at.timestamp_millis(),
            counterparty,
        }
    }
}

/// Query service for balances and transaction history
pub struct QueryService<S: Storage> {
    storage: Arc<S>,
}

impl<S: Storage> QueryService<S> {
    pub fn new(storage: Arc<S>) -> Self {
        Self { storage }
    }

    /// All balances of the user, largest first; empty when there are none
    pub fn list_balances(&self, user_id: &str) -> OperationResult<Vec<BalanceView>> {
        match self.fetch_balances(user_id) {
            Ok(balances) => OperationResult::ok(balances),
            Err(e) => {
                tracing::error!(user_id, error = %e, "listing balances failed");
                OperationResult::fail(&e)
            }
        }
    }

    /// One page of the user's history, newest first, with the full count
    pub fn list_transactions(
        &self,
        user_id: &str,
        limit: u32,
        offset: u32,
    ) -> OperationResult<Vec<TransactionView>> {
        match self.fetch_transactions(user_id, limit, offset) {
            Ok((items, meta)) => OperationResult::ok_with_meta(items, meta),
            Err(e) => {
                tracing::error!(user_id, error = %e, "listing transactions failed");
                OperationResult::fail(&e)
            }
        }
    }

    fn fetch_balances(&self, user_id: &str) -> Result<Vec<BalanceView>> {
        let unit = self.storage.begin()?;
        let balances = unit.list_balances(user_id)?;
        Ok(balances
            .into_iter()
            .map(|b| BalanceView {
                currency: b.currency.to_string(),
                balance: b.balance,
            })
            .collect())
    }

    fn fetch_transactions(
        &self,
        user_id: &str,
        limit: u32,
        offset: u32,
    ) -> Result<(Vec<TransactionView>, Pagination)> {
        let unit = self.storage.begin()?;
        let page = unit.list_by_user(user_id, limit, offset)?;
        let meta = Pagination {
            limit: page.limit,
            offset: page.offset,
            total: page.total,
        };
        Ok((page.items.into_iter().map(TransactionView::from).collect(), meta))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::Currency;
    use chrono::{TimeZone, Utc};
    use serde_json::json;

    fn entry(amount: i64, proof: Option<&str>) -> LedgerEntry {
        LedgerEntry {
            transaction_id: "abc123".to_string(),
            user_id: "u1".to_string(),
            amount,
            currency: Currency::parse("IDR").unwrap(),
            counterparty: BankAccount::new("1234567890", "Bank Central"),
            proof_image: proof.map(str::to_string),
            created_at: Utc.timestamp_millis_opt(1_700_000_000_123).unwrap(),
        }
    }

    #[test]
    fn test_inbound_entry_has_source() {
        let view = TransactionView::from(entry(500, Some("https://x.example.com/p.png")));
        assert_eq!(
            serde_json::to_value(&view).unwrap(),
            json!({
                "transactionId": "abc123",
                "balance": 500,
                "currency": "IDR",
                "transferProofImg": "https://x.example.com/p.png",
                "createdAt": 1_700_000_000_123i64,
                "source": {"bankAccountNumber": "1234567890", "bankName": "Bank Central"}
            })
        );
    }

    #[test]
    fn test_outbound_entry_has_recipient_and_magnitude() {
        let view = TransactionView::from(entry(-75, None));
        let value = serde_json::to_value(&view).unwrap();
        assert_eq!(value["balance"], 75);
        assert_eq!(value["recipient"]["bankName"], "Bank Central");
        assert!(value.get("source").is_none());
        assert!(value["transferProofImg"].is_null());
    }
}
