//! Per-currency balance domain model

use serde::{Deserialize, Serialize};

use super::currency::Currency;

/// Current aggregate amount of one currency held by a user
///
/// There is exactly one balance per (user, currency). The value is in minor
/// units and is never negative.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Balance {
    pub user_id: String,
    pub currency: Currency,
    pub balance: i64,
}

impl Balance {
    pub fn new(user_id: impl Into<String>, currency: Currency, balance: i64) -> Self {
        Self {
            user_id: user_id.into(),
            currency,
            balance,
        }
    }
}
