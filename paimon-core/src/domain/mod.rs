//! Core domain entities
//!
//! All business entities are defined here. These are pure data structures
//! with validation logic - no I/O or external dependencies.

mod amount;
mod balance;
mod currency;
pub mod request;
pub mod result;
mod transaction;

pub use amount::Amount;
pub use balance::Balance;
pub use currency::Currency;
pub use request::{DepositIntent, DepositRequest, WithdrawalIntent, WithdrawalRequest};
pub use transaction::{BankAccount, Direction, LedgerEntry, NewLedgerEntry};
