//! Storage ports - balance store, transaction ledger and the unit of work

use crate::domain::result::Result;
use crate::domain::{Balance, Currency, LedgerEntry, NewLedgerEntry};

/// A page of results plus the size of the full matching set
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Page<T> {
    pub items: Vec<T>,
    pub limit: u32,
    pub offset: u32,
    pub total: u64,
}

/// Per-(user, currency) aggregate balances
pub trait BalanceStore {
    /// Atomically add `delta` to the balance, creating the row on first deposit
    ///
    /// The non-negativity check and the write are one storage statement.
    /// Returns the new balance, or `Error::InsufficientFunds` when the result
    /// would be negative (including a negative delta against a missing row);
    /// in that case nothing was written.
    fn apply_delta(&self, user_id: &str, currency: &Currency, delta: i64) -> Result<i64>;

    /// All balances of a user, largest first, currency code as tie-break
    fn list_balances(&self, user_id: &str) -> Result<Vec<Balance>>;
}

/// Append-only journal of signed movements
pub trait TransactionLedger {
    /// Persist the entry as given and return its identifier
    fn append(&self, entry: &NewLedgerEntry) -> Result<String>;

    /// Most recent entries first; `total` counts every entry of the user
    fn list_by_user(&self, user_id: &str, limit: u32, offset: u32) -> Result<Page<LedgerEntry>>;
}

/// One atomic unit spanning balance mutations and ledger appends
///
/// Dropping a unit without calling `commit` rolls back everything it did.
pub trait UnitOfWork: BalanceStore + TransactionLedger {
    fn commit(self) -> Result<()>;
}

/// Transactional storage handle owned by the process wiring
pub trait Storage: Send + Sync {
    type Unit<'a>: UnitOfWork
    where
        Self: 'a;

    /// Open a new unit of work; blocks until a connection is available
    fn begin(&self) -> Result<Self::Unit<'_>>;
}
