//! Ledger entry domain model

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::amount::Amount;
use super::currency::Currency;

/// External bank account on the other side of a movement
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BankAccount {
    pub bank_account_number: String,
    pub bank_name: String,
}

impl BankAccount {
    pub fn new(bank_account_number: impl Into<String>, bank_name: impl Into<String>) -> Self {
        Self {
            bank_account_number: bank_account_number.into(),
            bank_name: bank_name.into(),
        }
    }
}

/// Direction of a movement, implied by the sign of its amount
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    /// Deposit; the counterparty is the source
    Inbound,
    /// Withdrawal; the counterparty is the recipient
    Outbound,
}

/// A ledger entry before the store has stamped it
///
/// The identifier is pre-generated by the caller so the entry can be
/// referenced before the unit of work commits.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewLedgerEntry {
    pub transaction_id: String,
    pub user_id: String,
    /// Signed amount in minor units (positive = inbound, negative = outbound)
    pub amount: i64,
    pub currency: Currency,
    pub counterparty: BankAccount,
    /// Proof-of-transfer image reference, inbound only
    pub proof_image: Option<String>,
}

impl NewLedgerEntry {
    /// Entry for money arriving from an external account
    pub fn deposit(
        transaction_id: impl Into<String>,
        user_id: impl Into<String>,
        amount: Amount,
        currency: Currency,
        source: BankAccount,
        proof_image: impl Into<String>,
    ) -> Self {
        Self {
            transaction_id: transaction_id.into(),
            user_id: user_id.into(),
            amount: amount.inbound(),
            currency,
            counterparty: source,
            proof_image: Some(proof_image.into()),
        }
    }

    /// Entry for money leaving to an external account
    pub fn withdrawal(
        transaction_id: impl Into<String>,
        user_id: impl Into<String>,
        amount: Amount,
        currency: Currency,
        recipient: BankAccount,
    ) -> Self {
        Self {
            transaction_id: transaction_id.into(),
            user_id: user_id.into(),
            amount: amount.outbound(),
            currency,
            counterparty: recipient,
            proof_image: None,
        }
    }
}

/// An immutable, committed movement in a user's history
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LedgerEntry {
    pub transaction_id: String,
    pub user_id: String,
    pub amount: i64,
    pub currency: Currency,
    pub counterparty: BankAccount,
    pub proof_image: Option<String>,
    /// Assigned by the store at insert time
    pub created_at: DateTime<Utc>,
}

impl LedgerEntry {
    pub fn direction(&self) -> Direction {
        if self.amount >= 0 {
            Direction::Inbound
        } else {
            Direction::Outbound
        }
    }

    /// Unsigned size of the movement
    pub fn magnitude(&self) -> u64 {
        self.amount.unsigned_abs()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn usd() -> Currency {
        Currency::parse("USD").unwrap()
    }

    #[test]
    fn test_deposit_is_positive_with_proof() {
        let entry = NewLedgerEntry::deposit(
            "tx1",
            "u1",
            Amount::new(100).unwrap(),
            usd(),
            BankAccount::new("1234567", "Bank Central"),
            "https://img.example.com/proof.png",
        );
        assert_eq!(entry.amount, 100);
        assert!(entry.proof_image.is_some());
    }

    #[test]
    fn test_withdrawal_is_negative_without_proof() {
        let entry = NewLedgerEntry::withdrawal(
            "tx2",
            "u1",
            Amount::new(40).unwrap(),
            usd(),
            BankAccount::new("7654321", "Other Bank"),
        );
        assert_eq!(entry.amount, -40);
        assert!(entry.proof_image.is_none());
    }

    #[test]
    fn test_direction_from_sign() {
        let mut entry = LedgerEntry {
            transaction_id: "tx".into(),
            user_id: "u1".into(),
            amount: -75,
            currency: usd(),
            counterparty: BankAccount::new("1234567", "Bank Central"),
            proof_image: None,
            created_at: Utc::now(),
        };
        assert_eq!(entry.direction(), Direction::Outbound);
        assert_eq!(entry.magnitude(), 75);

        entry.amount = 75;
        assert_eq!(entry.direction(), Direction::Inbound);
    }
}
