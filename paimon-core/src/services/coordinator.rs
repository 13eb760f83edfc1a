//! Transaction coordinator - deposits and withdrawals as single units of work
//!
//! Each operation applies the balance delta and appends the ledger entry in
//! one storage transaction. A write-write conflict with a concurrent unit on
//! the same balance row aborts the whole unit, which is then re-run from the
//! start with a fresh identifier.

use std::sync::Arc;
use std::thread;
use std::time::Duration;

use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::domain::result::{Error, OutcomeStatus, Result};
use crate::domain::{Currency, DepositIntent, NewLedgerEntry, WithdrawalIntent};
use crate::ports::{BalanceStore, IdGenerator, Storage, TransactionLedger, UnitOfWork};

/// Bounded retry for units aborted by a storage conflict
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Total attempts including the first one
    pub max_attempts: u32,
    pub initial_delay: Duration,
    pub max_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 10,
            initial_delay: Duration::from_millis(5),
            max_delay: Duration::from_millis(200),
        }
    }
}

impl RetryPolicy {
    /// Delay before retry number `retry` (0-based)
    ///
    /// Doubles from `initial_delay`, capped at `max_delay`, then drawn
    /// uniformly from the upper half so contending callers spread out.
    pub fn backoff(&self, retry: u32) -> Duration {
        let initial = self.initial_delay.as_micros() as u64;
        let cap = self.max_delay.as_micros() as u64;
        let ceiling = initial.saturating_mul(1u64 << retry.min(20)).min(cap);
        if ceiling == 0 {
            return Duration::ZERO;
        }
        let micros = rand::thread_rng().gen_range(ceiling / 2..=ceiling);
        Duration::from_micros(micros)
    }
}

/// Proof of a committed movement
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TransactionReceipt {
    pub transaction_id: String,
    pub currency: Currency,
    /// Balance of `currency` right after the movement
    pub balance: i64,
}

/// Coordinates balance mutations with ledger appends
pub struct TransactionCoordinator<S: Storage> {
    storage: Arc<S>,
    ids: Arc<dyn IdGenerator>,
    retry: RetryPolicy,
}

impl<S: Storage> TransactionCoordinator<S> {
    pub fn new(storage: Arc<S>, ids: Arc<dyn IdGenerator>, retry: RetryPolicy) -> Self {
        Self { storage, ids, retry }
    }

    /// Credit `intent.amount` to the user and record where it came from
    pub fn deposit(&self, user_id: &str, intent: &DepositIntent) -> Result<TransactionReceipt> {
        let receipt = self.with_retry("deposit", user_id, || {
            let unit = self.storage.begin()?;
            let balance = unit.apply_delta(user_id, &intent.currency, intent.amount.inbound())?;
            let entry = NewLedgerEntry::deposit(
                self.ids.generate(),
                user_id,
                intent.amount,
                intent.currency.clone(),
                intent.source.clone(),
                intent.proof_image.clone(),
            );
            let transaction_id = unit.append(&entry)?;
            unit.commit()?;
            Ok(TransactionReceipt {
                transaction_id,
                currency: intent.currency.clone(),
                balance,
            })
        })?;

        tracing::info!(
            user_id,
            currency = %receipt.currency,
            amount = intent.amount.value(),
            transaction_id = %receipt.transaction_id,
            "deposit committed"
        );
        Ok(receipt)
    }

    /// Debit `intent.amount` from the user, or fail with `InsufficientFunds`
    /// leaving both balance and history untouched
    pub fn withdraw(&self, user_id: &str, intent: &WithdrawalIntent) -> Result<TransactionReceipt> {
        let outcome = self.with_retry("withdraw", user_id, || {
            let unit = self.storage.begin()?;
            // InsufficientFunds returns here and the unit rolls back on drop
            let balance = unit.apply_delta(user_id, &intent.currency, intent.amount.outbound())?;
            let entry = NewLedgerEntry::withdrawal(
                self.ids.generate(),
                user_id,
                intent.amount,
                intent.currency.clone(),
                intent.recipient.clone(),
            );
            let transaction_id = unit.append(&entry)?;
            unit.commit()?;
            Ok(TransactionReceipt {
                transaction_id,
                currency: intent.currency.clone(),
                balance,
            })
        });

        match &outcome {
            Ok(receipt) => tracing::info!(
                user_id,
                currency = %receipt.currency,
                amount = intent.amount.value(),
                transaction_id = %receipt.transaction_id,
                "withdrawal committed"
            ),
            Err(Error::InsufficientFunds { .. }) => tracing::info!(
                user_id,
                currency = %intent.currency,
                amount = intent.amount.value(),
                "withdrawal rejected: insufficient funds"
            ),
            Err(_) => {}
        }
        outcome
    }

    fn with_retry<T>(
        &self,
        operation: &'static str,
        user_id: &str,
        mut attempt: impl FnMut() -> Result<T>,
    ) -> Result<T> {
        let max_attempts = self.retry.max_attempts.max(1);
        let mut tries = 0;
        loop {
            tries += 1;
            match attempt() {
                Err(e) if e.is_retryable() && tries < max_attempts => {
                    let delay = self.retry.backoff(tries - 1);
                    tracing::debug!(
                        operation,
                        user_id,
                        attempt = tries,
                        delay_us = delay.as_micros() as u64,
                        error = %e,
                        "retrying after storage conflict"
                    );
                    thread::sleep(delay);
                }
                Err(e) => {
                    if e.is_retryable() {
                        tracing::warn!(
                            operation,
                            user_id,
                            attempts = tries,
                            error = %e,
                            "giving up after storage conflicts"
                        );
                    } else if e.status() == OutcomeStatus::Internal {
                        tracing::error!(operation, user_id, error = %e, "unit of work failed");
                    }
                    return Err(e);
                }
                Ok(value) => return Ok(value),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::duckdb::DuckDbRepository;
    use crate::adapters::id::RandomIdGenerator;
    use crate::domain::{Amount, BankAccount};

    fn coordinator() -> TransactionCoordinator<DuckDbRepository> {
        let repo = DuckDbRepository::open_in_memory().unwrap();
        repo.ensure_schema().unwrap();
        TransactionCoordinator::new(
            Arc::new(repo),
            Arc::new(RandomIdGenerator::default()),
            RetryPolicy::default(),
        )
    }

    fn deposit_of(amount: i64) -> DepositIntent {
        DepositIntent {
            amount: Amount::new(amount).unwrap(),
            currency: Currency::parse("USD").unwrap(),
            source: BankAccount::new("1234567890", "Bank Central"),
            proof_image: "https://img.example.com/proof.png".to_string(),
        }
    }

    fn withdrawal_of(amount: i64) -> WithdrawalIntent {
        WithdrawalIntent {
            amount: Amount::new(amount).unwrap(),
            currency: Currency::parse("USD").unwrap(),
            recipient: BankAccount::new("9876543210", "Bank Mandiri"),
        }
    }

    #[test]
    fn test_backoff_is_capped_and_jittered() {
        let policy = RetryPolicy {
            max_attempts: 5,
            initial_delay: Duration::from_millis(10),
            max_delay: Duration::from_millis(40),
        };
        for _ in 0..100 {
            let first = policy.backoff(0);
            assert!(first >= Duration::from_millis(5) && first <= Duration::from_millis(10));
            let late = policy.backoff(10);
            assert!(late >= Duration::from_millis(20) && late <= Duration::from_millis(40));
        }
    }

    #[test]
    fn test_zero_delay_policy() {
        let policy = RetryPolicy {
            max_attempts: 3,
            initial_delay: Duration::ZERO,
            max_delay: Duration::ZERO,
        };
        assert_eq!(policy.backoff(4), Duration::ZERO);
    }

    #[test]
    fn test_deposit_returns_new_balance() {
        let coordinator = coordinator();
        let first = coordinator.deposit("u1", &deposit_of(100)).unwrap();
        let second = coordinator.deposit("u1", &deposit_of(50)).unwrap();
        assert_eq!(first.balance, 100);
        assert_eq!(second.balance, 150);
        assert_ne!(first.transaction_id, second.transaction_id);
    }

    #[test]
    fn test_withdraw_rejected_leaves_state() {
        let coordinator = coordinator();
        coordinator.deposit("u1", &deposit_of(100)).unwrap();

        let err = coordinator.withdraw("u1", &withdrawal_of(200)).unwrap_err();
        assert!(matches!(err, Error::InsufficientFunds { requested: 200, .. }));

        let receipt = coordinator.withdraw("u1", &withdrawal_of(100)).unwrap();
        assert_eq!(receipt.balance, 0);
    }

    #[test]
    fn test_withdraw_without_balance_row() {
        let coordinator = coordinator();
        assert!(matches!(
            coordinator.withdraw("nobody", &withdrawal_of(1)),
            Err(Error::InsufficientFunds { .. })
        ));
    }

    #[test]
    fn test_conflicts_are_retried_until_success() {
        let coordinator = coordinator();
        let mut calls = 0;
        let value = coordinator
            .with_retry("test", "u1", || {
                calls += 1;
                if calls < 3 {
                    Err(Error::Conflict("Conflict on update!".into()))
                } else {
                    Ok(calls)
                }
            })
            .unwrap();
        assert_eq!(value, 3);
    }

    #[test]
    fn test_retries_are_bounded() {
        let coordinator = coordinator();
        let mut calls = 0;
        let result: Result<()> = coordinator.with_retry("test", "u1", || {
            calls += 1;
            Err(Error::Conflict("Conflict on update!".into()))
        });
        assert!(matches!(result, Err(Error::Conflict(_))));
        assert_eq!(calls, RetryPolicy::default().max_attempts);
    }

    #[test]
    fn test_non_conflict_errors_are_not_retried() {
        let coordinator = coordinator();
        let mut calls = 0;
        let result: Result<()> = coordinator.with_retry("test", "u1", || {
            calls += 1;
            Err(Error::database("boom"))
        });
        assert!(result.is_err());
        assert_eq!(calls, 1);
    }
}
