//! DuckDB repository implementation
//!
//! One database instance is shared by every unit of work. Each unit checks a
//! connection out of a small idle pool (connections are `try_clone`s of the
//! root connection), runs `BEGIN TRANSACTION`, and either commits or rolls
//! back when dropped. DuckDB's MVCC turns a concurrent write to the same
//! balance row into a conflict error, which surfaces as `Error::Conflict`.

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::thread;
use std::time::Duration;

use chrono::{DateTime, Utc};
use duckdb::{params, Connection};

use crate::domain::result::{Error, Result};
use crate::domain::{Balance, BankAccount, Currency, LedgerEntry, NewLedgerEntry};
use crate::ports::{BalanceStore, Page, Storage, TransactionLedger, UnitOfWork};
use crate::services::{MigrationResult, MigrationService};

/// Maximum number of retries when database file is locked
const MAX_RETRIES: u32 = 5;

/// Initial retry delay in milliseconds (doubles each retry: 50, 100, 200, 400, 800ms)
const INITIAL_RETRY_DELAY_MS: u64 = 50;

/// Idle connections kept around after a unit of work finishes
const MAX_IDLE_CONNECTIONS: usize = 16;

/// Check if an error message indicates a file locking issue that should be retried
fn is_retryable_error(err_msg: &str) -> bool {
    let lower = err_msg.to_lowercase();
    // Windows error messages
    lower.contains("being used by another process")
        || lower.contains("cannot access the file")
        // Unix/macOS error messages
        || lower.contains("resource temporarily unavailable")
        || lower.contains("database is locked")
        || lower.contains("file is already open")
}

/// Check if an error message is a write-write conflict between transactions
///
/// DuckDB reports these as "Conflict on update!", "Conflict on tuple deletion!"
/// or "write-write conflict", depending on the statement.
fn is_conflict_error(err_msg: &str) -> bool {
    err_msg.to_lowercase().contains("conflict")
}

impl From<duckdb::Error> for Error {
    fn from(err: duckdb::Error) -> Self {
        let msg = err.to_string();
        if is_conflict_error(&msg) {
            Error::Conflict(msg)
        } else {
            Error::Database(msg)
        }
    }
}

/// Classify a failed write to `user_balances`
///
/// The CHECK (balance >= 0) constraint is a backstop behind the conditional
/// update; if it ever fires it means the same thing the condition does. A
/// duplicate key from the upsert can only be a concurrent first deposit for
/// the same pair, which is resolved by re-running the unit.
fn balance_write_error(err: duckdb::Error, currency: &Currency, delta: i64) -> Error {
    let msg = err.to_string();
    let lower = msg.to_lowercase();
    if lower.contains("check constraint") {
        Error::insufficient_funds(currency.as_str(), delta.saturating_abs())
    } else if lower.contains("duplicate") {
        Error::Conflict(msg)
    } else {
        err.into()
    }
}

/// Classify a failed COMMIT
///
/// Unique-key violations are checked at commit time, so two units that both
/// created the same balance row only collide here. Any commit the engine
/// refuses leaves nothing written and the unit can be re-run as a whole.
fn commit_error(err: duckdb::Error) -> Error {
    let msg = err.to_string();
    let lower = msg.to_lowercase();
    if is_conflict_error(&msg) || lower.contains("duplicate") || lower.contains("failed to commit")
    {
        Error::Conflict(msg)
    } else {
        Error::Database(msg)
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    // Neither guarded value can be left half-updated by a panicking holder.
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

fn from_micros(micros: i64) -> Result<DateTime<Utc>> {
    DateTime::from_timestamp_micros(micros)
        .ok_or_else(|| Error::database(format!("invalid timestamp: {}", micros)))
}

/// DuckDB repository implementation
pub struct DuckDbRepository {
    root: Mutex<Connection>,
    idle: Mutex<Vec<Connection>>,
    /// Last timestamp handed out, in microseconds since the epoch
    last_stamp: AtomicI64,
    db_path: Option<PathBuf>,
}

impl DuckDbRepository {
    /// Open (or create) a database file
    ///
    /// Includes retry logic with exponential backoff for file locking errors,
    /// which occur when another process (e.g. a second CLI invocation) holds
    /// the database file.
    pub fn new(db_path: &Path) -> Result<Self> {
        let mut last_error = None;

        for attempt in 0..MAX_RETRIES {
            match Self::try_open_connection(Some(db_path)) {
                Ok(conn) => return Ok(Self::from_connection(conn, Some(db_path.to_path_buf()))),
                Err(e) => {
                    let err_msg = e.to_string();
                    if is_retryable_error(&err_msg) && attempt < MAX_RETRIES - 1 {
                        // Exponential backoff: 50ms, 100ms, 200ms, 400ms
                        let delay =
                            Duration::from_millis(INITIAL_RETRY_DELAY_MS * 2u64.pow(attempt));
                        tracing::warn!(
                            delay_ms = delay.as_millis() as u64,
                            attempt = attempt + 1,
                            max_attempts = MAX_RETRIES,
                            error = %err_msg,
                            "database busy, retrying"
                        );
                        thread::sleep(delay);
                        last_error = Some(e);
                        continue;
                    }
                    // Non-retryable error or max retries reached
                    return Err(e.into());
                }
            }
        }

        // Should only reach here if all retries failed
        Err(last_error.map(Error::from).unwrap_or_else(|| {
            Error::database(format!("Failed to open database after {} retries", MAX_RETRIES))
        }))
    }

    /// Open a private in-memory database (all units share it)
    pub fn open_in_memory() -> Result<Self> {
        let conn = Self::try_open_connection(None)?;
        Ok(Self::from_connection(conn, None))
    }

    fn from_connection(conn: Connection, db_path: Option<PathBuf>) -> Self {
        Self {
            root: Mutex::new(conn),
            idle: Mutex::new(Vec::new()),
            last_stamp: AtomicI64::new(0),
            db_path,
        }
    }

    fn try_open_connection(db_path: Option<&Path>) -> duckdb::Result<Connection> {
        // Extension autoloading stays off: the ledger needs nothing beyond core SQL
        let config = duckdb::Config::default().enable_autoload_extension(false)?;
        match db_path {
            Some(path) => Connection::open_with_flags(path, config),
            None => Connection::open_in_memory_with_flags(config),
        }
    }

    /// Path of the database file, `None` for in-memory databases
    pub fn db_path(&self) -> Option<&Path> {
        self.db_path.as_deref()
    }

    /// Run database migrations using the MigrationService
    ///
    /// Returns the migration result showing what was applied.
    pub fn run_migrations(&self) -> Result<MigrationResult> {
        let conn = lock(&self.root);
        let migration_service = MigrationService::new(&conn);
        migration_service.run_pending()
    }

    /// Embedded migrations not yet recorded in this database
    pub fn pending_migrations(&self) -> Result<Vec<String>> {
        let conn = lock(&self.root);
        MigrationService::new(&conn).get_pending()
    }

    /// Ensure database schema exists (runs pending migrations)
    pub fn ensure_schema(&self) -> Result<()> {
        let result = self.run_migrations()?;
        if !result.applied.is_empty() {
            tracing::info!(applied = ?result.applied, "applied migrations");
        }
        self.seed_clock()
    }

    /// Start the row clock after the newest stored entry so creation times
    /// keep increasing across restarts and wall-clock steps backwards.
    fn seed_clock(&self) -> Result<()> {
        let conn = lock(&self.root);
        let newest: Option<i64> =
            conn.query_row("SELECT MAX(created_at) FROM user_transactions", [], |row| row.get(0))?;
        if let Some(newest) = newest {
            self.last_stamp.fetch_max(newest, Ordering::AcqRel);
        }
        Ok(())
    }

    /// Next creation timestamp, strictly greater than every previous one
    fn next_stamp(&self) -> i64 {
        let now = Utc::now().timestamp_micros();
        let previous = self
            .last_stamp
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |last| {
                Some(now.max(last + 1))
            })
            .unwrap_or_else(|last| last);
        now.max(previous + 1)
    }

    fn checkout(&self) -> Result<Connection> {
        if let Some(conn) = lock(&self.idle).pop() {
            return Ok(conn);
        }
        Ok(lock(&self.root).try_clone()?)
    }

    fn checkin(&self, conn: Connection) {
        let mut idle = lock(&self.idle);
        if idle.len() < MAX_IDLE_CONNECTIONS {
            idle.push(conn);
        }
    }
}

impl Storage for DuckDbRepository {
    type Unit<'a> = DuckDbUnit<'a>;

    fn begin(&self) -> Result<DuckDbUnit<'_>> {
        let conn = self.checkout()?;
        conn.execute_batch("BEGIN TRANSACTION")?;
        Ok(DuckDbUnit {
            repo: self,
            conn: Some(conn),
        })
    }
}

/// One open DuckDB transaction on a pooled connection
pub struct DuckDbUnit<'a> {
    repo: &'a DuckDbRepository,
    conn: Option<Connection>,
}

impl DuckDbUnit<'_> {
    fn conn(&self) -> Result<&Connection> {
        self.conn
            .as_ref()
            .ok_or_else(|| Error::database("unit of work is already finished"))
    }

    // === Reconciliation queries ===

    /// Balances that differ from the sum of their ledger entries
    ///
    /// Each item is (user_id, currency, balance, ledger_sum).
    pub fn check_balance_mismatches(&self) -> Result<Vec<(String, String, i64, i64)>> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare(
            "SELECT b.user_id, b.currency, b.balance,
                    CAST(COALESCE(SUM(t.amount), 0) AS BIGINT) AS ledger_sum
             FROM user_balances b
             LEFT JOIN user_transactions t
                    ON t.user_id = b.user_id AND t.currency = b.currency
             GROUP BY b.user_id, b.currency, b.balance
             HAVING b.balance <> COALESCE(SUM(t.amount), 0)
             ORDER BY b.user_id, b.currency",
        )?;
        let rows = stmt
            .query_map([], |row| Ok((row.get(0)?, row.get(1)?, row.get(2)?, row.get(3)?)))?
            .collect::<duckdb::Result<Vec<_>>>()?;
        Ok(rows)
    }

    /// Balances below zero, as (user_id, currency, balance)
    pub fn check_negative_balances(&self) -> Result<Vec<(String, String, i64)>> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare(
            "SELECT user_id, currency, balance FROM user_balances
             WHERE balance < 0 ORDER BY user_id, currency",
        )?;
        let rows = stmt
            .query_map([], |row| Ok((row.get(0)?, row.get(1)?, row.get(2)?)))?
            .collect::<duckdb::Result<Vec<_>>>()?;
        Ok(rows)
    }

    /// Ledger entries whose (user, currency) has no balance row
    pub fn check_orphaned_entries(&self) -> Result<Vec<(String, String, String)>> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare(
            "SELECT t.transaction_id, t.user_id, t.currency
             FROM user_transactions t
             LEFT JOIN user_balances b
                    ON b.user_id = t.user_id AND b.currency = t.currency
             WHERE b.user_id IS NULL
             ORDER BY t.seq",
        )?;
        let rows = stmt
            .query_map([], |row| Ok((row.get(0)?, row.get(1)?, row.get(2)?)))?
            .collect::<duckdb::Result<Vec<_>>>()?;
        Ok(rows)
    }

    /// Identifiers of entries that moved no money
    pub fn check_zero_amount_entries(&self) -> Result<Vec<String>> {
        let conn = self.conn()?;
        let mut stmt = conn
            .prepare("SELECT transaction_id FROM user_transactions WHERE amount = 0 ORDER BY seq")?;
        let rows = stmt
            .query_map([], |row| row.get(0))?
            .collect::<duckdb::Result<Vec<String>>>()?;
        Ok(rows)
    }

    pub fn get_transaction_count(&self) -> Result<i64> {
        let conn = self.conn()?;
        Ok(conn.query_row("SELECT COUNT(*) FROM user_transactions", [], |row| row.get(0))?)
    }

    pub fn get_balance_count(&self) -> Result<i64> {
        let conn = self.conn()?;
        Ok(conn.query_row("SELECT COUNT(*) FROM user_balances", [], |row| row.get(0))?)
    }
}

impl BalanceStore for DuckDbUnit<'_> {
    fn apply_delta(&self, user_id: &str, currency: &Currency, delta: i64) -> Result<i64> {
        if delta == 0 {
            return Err(Error::validation("balance delta must be non-zero"));
        }
        let conn = self.conn()?;
        let now = self.repo.next_stamp();

        if delta > 0 {
            conn.execute(
                "INSERT INTO user_balances (user_id, currency, balance, created_at, updated_at)
                 VALUES (?, ?, ?, ?, ?)
                 ON CONFLICT (user_id, currency) DO UPDATE SET
                    balance = balance + EXCLUDED.balance,
                    updated_at = EXCLUDED.updated_at",
                params![user_id, currency.as_str(), delta, now, now],
            )
            .map_err(|e| balance_write_error(e, currency, delta))?;
        } else {
            // Condition and write in one statement: no row is touched unless
            // the result stays non-negative.
            let changed = conn
                .execute(
                    "UPDATE user_balances
                     SET balance = balance + ?, updated_at = ?
                     WHERE user_id = ? AND currency = ? AND balance + ? >= 0",
                    params![delta, now, user_id, currency.as_str(), delta],
                )
                .map_err(|e| balance_write_error(e, currency, delta))?;
            if changed == 0 {
                return Err(Error::insufficient_funds(currency.as_str(), -delta));
            }
        }

        let balance = conn.query_row(
            "SELECT balance FROM user_balances WHERE user_id = ? AND currency = ?",
            params![user_id, currency.as_str()],
            |row| row.get(0),
        )?;
        Ok(balance)
    }

    fn list_balances(&self, user_id: &str) -> Result<Vec<Balance>> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare(
            "SELECT currency, balance FROM user_balances
             WHERE user_id = ?
             ORDER BY balance DESC, currency ASC",
        )?;
        let rows = stmt
            .query_map([user_id], |row| {
                Ok((row.get::<_, String>(0)?, row.get::<_, i64>(1)?))
            })?
            .collect::<duckdb::Result<Vec<_>>>()?;

        rows.into_iter()
            .map(|(currency, balance)| {
                Ok(Balance::new(user_id, Currency::parse(&currency)?, balance))
            })
            .collect()
    }
}

impl TransactionLedger for DuckDbUnit<'_> {
    fn append(&self, entry: &NewLedgerEntry) -> Result<String> {
        let conn = self.conn()?;
        let created_at = self.repo.next_stamp();
        conn.execute(
            "INSERT INTO user_transactions (transaction_id, user_id, amount, currency,
                                            bank_account_number, bank_name, image_url, created_at)
             VALUES (?, ?, ?, ?, ?, ?, ?, ?)",
            params![
                entry.transaction_id,
                entry.user_id,
                entry.amount,
                entry.currency.as_str(),
                entry.counterparty.bank_account_number,
                entry.counterparty.bank_name,
                entry.proof_image,
                created_at,
            ],
        )?;
        Ok(entry.transaction_id.clone())
    }

    fn list_by_user(&self, user_id: &str, limit: u32, offset: u32) -> Result<Page<LedgerEntry>> {
        let conn = self.conn()?;
        // Same transaction as the page below, so both see one snapshot
        let total: i64 = conn.query_row(
            "SELECT COUNT(*) FROM user_transactions WHERE user_id = ?",
            [user_id],
            |row| row.get(0),
        )?;

        let mut items = Vec::new();
        if limit > 0 {
            let mut stmt = conn.prepare(
                "SELECT transaction_id, amount, currency, bank_account_number, bank_name,
                        image_url, created_at
                 FROM user_transactions
                 WHERE user_id = ?
                 ORDER BY created_at DESC, seq DESC
                 LIMIT ? OFFSET ?",
            )?;
            let rows = stmt
                .query_map(params![user_id, limit as i64, offset as i64], |row| {
                    Ok(EntryRow {
                        transaction_id: row.get(0)?,
                        amount: row.get(1)?,
                        currency: row.get(2)?,
                        bank_account_number: row.get(3)?,
                        bank_name: row.get(4)?,
                        image_url: row.get(5)?,
                        created_at: row.get(6)?,
                    })
                })?
                .collect::<duckdb::Result<Vec<_>>>()?;

            for row in rows {
                items.push(row.into_entry(user_id)?);
            }
        }

        Ok(Page {
            items,
            limit,
            offset,
            total: total.max(0) as u64,
        })
    }
}

impl UnitOfWork for DuckDbUnit<'_> {
    fn commit(mut self) -> Result<()> {
        let conn = self
            .conn
            .take()
            .ok_or_else(|| Error::database("unit of work is already finished"))?;
        match conn.execute_batch("COMMIT") {
            Ok(()) => {
                self.repo.checkin(conn);
                Ok(())
            }
            Err(e) => {
                // The engine has already aborted the transaction. Issuing a
                // ROLLBACK on top of that invalidates the database, so the
                // connection is dropped as is and never pooled again.
                tracing::debug!(error = %e, "commit failed, discarding connection");
                drop(conn);
                Err(commit_error(e))
            }
        }
    }
}

impl Drop for DuckDbUnit<'_> {
    fn drop(&mut self) {
        let Some(conn) = self.conn.take() else {
            return;
        };
        if let Err(e) = conn.execute_batch("ROLLBACK") {
            tracing::debug!(error = %e, "rollback failed, discarding connection");
            return;
        }
        self.repo.checkin(conn);
    }
}

/// Raw `user_transactions` row
struct EntryRow {
    transaction_id: String,
    amount: i64,
    currency: String,
    bank_account_number: String,
    bank_name: String,
    image_url: Option<String>,
    created_at: i64,
}

impl EntryRow {
    fn into_entry(self, user_id: &str) -> Result<LedgerEntry> {
        Ok(LedgerEntry {
            transaction_id: self.transaction_id,
            user_id: user_id.to_string(),
            amount: self.amount,
            currency: Currency::parse(&self.currency)?,
            counterparty: BankAccount::new(self.bank_account_number, self.bank_name),
            proof_image: self.image_url,
            created_at: from_micros(self.created_at)?,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn repo() -> DuckDbRepository {
        let repo = DuckDbRepository::open_in_memory().unwrap();
        repo.ensure_schema().unwrap();
        repo
    }

    fn usd() -> Currency {
        Currency::parse("USD").unwrap()
    }

    fn entry(id: &str, amount: i64) -> NewLedgerEntry {
        NewLedgerEntry {
            transaction_id: id.to_string(),
            user_id: "u1".to_string(),
            amount,
            currency: usd(),
            counterparty: BankAccount::new("1234567", "Bank Central"),
            proof_image: None,
        }
    }

    #[test]
    fn test_conflict_classification() {
        assert!(is_conflict_error("TransactionContext Error: Conflict on update!"));
        assert!(is_conflict_error("TransactionContext Error: Catalog write-write conflict"));
        assert!(!is_conflict_error("Constraint Error: NOT NULL constraint failed"));
    }

    #[test]
    fn test_retryable_error_detection() {
        assert!(is_retryable_error(
            "IO Error: Could not set lock on file: Resource temporarily unavailable"
        ));
        assert!(!is_retryable_error("Catalog Error: Table does not exist"));
    }

    #[test]
    fn test_upsert_creates_then_increments() {
        let repo = repo();
        let unit = repo.begin().unwrap();
        assert_eq!(unit.apply_delta("u1", &usd(), 100).unwrap(), 100);
        assert_eq!(unit.apply_delta("u1", &usd(), 50).unwrap(), 150);
        unit.commit().unwrap();

        let unit = repo.begin().unwrap();
        let balances = unit.list_balances("u1").unwrap();
        assert_eq!(balances, vec![Balance::new("u1", usd(), 150)]);
    }

    #[test]
    fn test_negative_delta_on_missing_row_is_insufficient() {
        let repo = repo();
        let unit = repo.begin().unwrap();
        let err = unit.apply_delta("u1", &usd(), -1).unwrap_err();
        assert!(matches!(err, Error::InsufficientFunds { requested: 1, .. }));
        assert!(unit.list_balances("u1").unwrap().is_empty());
    }

    #[test]
    fn test_conditional_decrement_rejects_overdraw() {
        let repo = repo();
        let unit = repo.begin().unwrap();
        unit.apply_delta("u1", &usd(), 100).unwrap();
        assert!(matches!(
            unit.apply_delta("u1", &usd(), -101),
            Err(Error::InsufficientFunds { .. })
        ));
        assert_eq!(unit.apply_delta("u1", &usd(), -100).unwrap(), 0);
    }

    #[test]
    fn test_zero_delta_is_rejected() {
        let repo = repo();
        let unit = repo.begin().unwrap();
        assert!(matches!(
            unit.apply_delta("u1", &usd(), 0),
            Err(Error::Validation(_))
        ));
    }

    #[test]
    fn test_dropped_unit_rolls_back() {
        let repo = repo();
        {
            let unit = repo.begin().unwrap();
            unit.apply_delta("u1", &usd(), 100).unwrap();
            unit.append(&entry("tx1", 100)).unwrap();
        }

        let unit = repo.begin().unwrap();
        assert!(unit.list_balances("u1").unwrap().is_empty());
        assert_eq!(unit.list_by_user("u1", 10, 0).unwrap().total, 0);
    }

    #[test]
    fn test_append_rejects_duplicate_and_empty_ids() {
        let repo = repo();
        let unit = repo.begin().unwrap();
        unit.append(&entry("tx1", 10)).unwrap();
        unit.commit().unwrap();

        let unit = repo.begin().unwrap();
        assert!(unit.append(&entry("tx1", 10)).is_err());
        drop(unit);

        let unit = repo.begin().unwrap();
        assert!(unit.append(&entry("", 10)).is_err());
    }

    #[test]
    fn test_racing_first_deposits_leave_database_usable() {
        let repo = repo();
        let first = repo.begin().unwrap();
        let second = repo.begin().unwrap();

        first.apply_delta("u1", &usd(), 10).unwrap();
        let second_write = second.apply_delta("u1", &usd(), 20);
        first.commit().unwrap();

        // The loser sees the collision either at the write or at commit,
        // and both are reported as a retryable conflict.
        let outcome = second_write.and_then(|_| second.commit());
        match outcome {
            Err(e) => assert!(e.is_retryable(), "expected a conflict, got {:?}", e),
            Ok(()) => panic!("second creator of the same balance row must not commit"),
        }

        // Re-running the losing unit succeeds on the same repository
        let retry = repo.begin().unwrap();
        assert_eq!(retry.apply_delta("u1", &usd(), 20).unwrap(), 30);
        retry.commit().unwrap();

        let unit = repo.begin().unwrap();
        assert_eq!(unit.list_balances("u1").unwrap(), vec![Balance::new("u1", usd(), 30)]);
    }

    #[test]
    fn test_stamps_strictly_increase() {
        let repo = repo();
        let stamps: Vec<i64> = (0..1000).map(|_| repo.next_stamp()).collect();
        assert!(stamps.windows(2).all(|w| w[0] < w[1]));
    }

    #[test]
    fn test_list_by_user_orders_newest_first_with_total() {
        let repo = repo();
        let unit = repo.begin().unwrap();
        for i in 1..=5 {
            unit.append(&entry(&format!("tx{}", i), i)).unwrap();
        }
        unit.commit().unwrap();

        let unit = repo.begin().unwrap();
        let page = unit.list_by_user("u1", 2, 1).unwrap();
        assert_eq!(page.total, 5);
        let ids: Vec<&str> = page.items.iter().map(|e| e.transaction_id.as_str()).collect();
        assert_eq!(ids, vec!["tx4", "tx3"]);

        let empty = unit.list_by_user("u1", 0, 0).unwrap();
        assert!(empty.items.is_empty());
        assert_eq!(empty.total, 5);

        let past_end = unit.list_by_user("u1", 10, 50).unwrap();
        assert!(past_end.items.is_empty());
        assert_eq!(past_end.total, 5);
    }
}
