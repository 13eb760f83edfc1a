//! Positive monetary amount in minor units

use std::fmt;

use serde::{Deserialize, Serialize};

use super::result::{Error, Result};

/// A strictly positive amount in minor currency units
///
/// Deposits and withdrawals both carry an `Amount`; the sign of the
/// resulting balance delta is decided by the operation, never by the caller.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "i64", into = "i64")]
pub struct Amount(i64);

impl Amount {
    pub fn new(value: i64) -> Result<Self> {
        if value <= 0 {
            return Err(Error::validation(format!(
                "amount must be greater than zero, got {}",
                value
            )));
        }
        Ok(Self(value))
    }

    pub fn value(self) -> i64 {
        self.0
    }

    /// Balance delta for an inbound movement
    pub fn inbound(self) -> i64 {
        self.0
    }

    /// Balance delta for an outbound movement
    pub fn outbound(self) -> i64 {
        -self.0
    }
}

impl TryFrom<i64> for Amount {
    type Error = Error;

    fn try_from(value: i64) -> Result<Self> {
        Self::new(value)
    }
}

impl From<Amount> for i64 {
    fn from(value: Amount) -> Self {
        value.0
    }
}

impl fmt::Display for Amount {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rejects_zero_and_negative() {
        assert!(Amount::new(0).is_err());
        assert!(Amount::new(-5).is_err());
    }

    #[test]
    fn test_direction_signs() {
        let amount = Amount::new(150).unwrap();
        assert_eq!(amount.inbound(), 150);
        assert_eq!(amount.outbound(), -150);
    }
}
