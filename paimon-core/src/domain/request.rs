//! Request payloads and their validation
//!
//! Payloads arrive as loosely typed JSON. `validate()` checks every field and
//! produces the typed intent the coordinator works with, so the coordinator
//! never sees an unvalidated amount, currency or counterparty.

use std::sync::OnceLock;

use regex::Regex;
use serde::{Deserialize, Serialize};

use super::amount::Amount;
use super::currency::Currency;
use super::result::{Error, Result};
use super::transaction::BankAccount;

const BANK_FIELD_MIN: usize = 5;
const BANK_FIELD_MAX: usize = 30;

fn image_url_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(
            r"^(https?://)?[A-Za-z0-9-]+(\.[A-Za-z0-9-]+)+(:[0-9]{1,5})?(/[A-Za-z0-9._~%-]+)*/[A-Za-z0-9._~%-]+\.(jpg|jpeg|png)$",
        )
        .expect("image url pattern is valid")
    })
}

fn check_length(field: &str, value: &str) -> Result<()> {
    let len = value.chars().count();
    if !(BANK_FIELD_MIN..=BANK_FIELD_MAX).contains(&len) {
        return Err(Error::validation(format!(
            "{} must be between {} and {} characters",
            field, BANK_FIELD_MIN, BANK_FIELD_MAX
        )));
    }
    Ok(())
}

/// Body of a deposit request
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DepositRequest {
    pub sender_bank_account_number: String,
    pub sender_bank_name: String,
    pub added_balance: i64,
    pub currency: String,
    pub transfer_proof_img: String,
}

/// Body of a withdrawal request
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WithdrawalRequest {
    pub recipient_bank_account_number: String,
    pub recipient_bank_name: String,
    pub balances: i64,
    pub from_currency: String,
}

/// A validated deposit
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DepositIntent {
    pub amount: Amount,
    pub currency: Currency,
    pub source: BankAccount,
    pub proof_image: String,
}

/// A validated withdrawal
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WithdrawalIntent {
    pub amount: Amount,
    pub currency: Currency,
    pub recipient: BankAccount,
}

impl DepositRequest {
    pub fn validate(&self) -> Result<DepositIntent> {
        check_length("senderBankAccountNumber", &self.sender_bank_account_number)?;
        check_length("senderBankName", &self.sender_bank_name)?;
        let amount = Amount::new(self.added_balance)?;
        let currency = Currency::parse(&self.currency)?;
        if !image_url_pattern().is_match(&self.transfer_proof_img) {
            return Err(Error::validation("transferProofImg is not a valid image url"));
        }

        Ok(DepositIntent {
            amount,
            currency,
            source: BankAccount::new(&self.sender_bank_account_number, &self.sender_bank_name),
            proof_image: self.transfer_proof_img.clone(),
        })
    }
}

impl WithdrawalRequest {
    pub fn validate(&self) -> Result<WithdrawalIntent> {
        check_length("recipientBankAccountNumber", &self.recipient_bank_account_number)?;
        check_length("recipientBankName", &self.recipient_bank_name)?;
        let amount = Amount::new(self.balances)?;
        let currency = Currency::parse(&self.from_currency)?;

        Ok(WithdrawalIntent {
            amount,
            currency,
            recipient: BankAccount::new(
                &self.recipient_bank_account_number,
                &self.recipient_bank_name,
            ),
        })
    }
}
