//! Paimon Core - multi-currency balance ledger
//!
//! This crate implements the core domain logic following hexagonal architecture:
//!
//! - **domain**: Core business entities (Balance, LedgerEntry, requests, errors)
//! - **ports**: Trait definitions for external dependencies (Storage, IdGenerator)
//! - **services**: Business logic orchestration
//! - **adapters**: Concrete implementations (DuckDB, random ids)

pub mod adapters;
pub mod config;
pub mod domain;
pub mod migrations;
pub mod ports;
pub mod services;

use std::path::Path;
use std::sync::Arc;

use adapters::duckdb::DuckDbRepository;
use adapters::id::RandomIdGenerator;
use config::{Config, DATABASE_FILE};
use domain::result::Result;
use ports::IdGenerator;
use services::*;

// Re-export commonly used types at crate root
pub use domain::result::{Error, OperationResult, OutcomeStatus, Pagination};
pub use domain::{Balance, BankAccount, Currency, DepositRequest, LedgerEntry, WithdrawalRequest};
pub use services::{BalanceView, TransactionReceipt, TransactionView};

/// Main context for Paimon operations
///
/// This is the primary entry point for all business logic. It holds
/// the storage handle, configuration, and all services.
pub struct PaimonContext {
    pub config: Config,
    pub repository: Arc<DuckDbRepository>,
    pub coordinator: TransactionCoordinator<DuckDbRepository>,
    pub query_service: QueryService<DuckDbRepository>,
    pub doctor_service: DoctorService,
}

impl PaimonContext {
    /// Open (or create) the ledger in `data_dir`
    pub fn new(data_dir: &Path) -> Result<Self> {
        std::fs::create_dir_all(data_dir)?;
        let config = Config::load(data_dir)?;
        let repository = Arc::new(DuckDbRepository::new(&data_dir.join(DATABASE_FILE))?);
        Self::with_repository(config, repository)
    }

    /// Private in-memory ledger with default settings
    pub fn in_memory() -> Result<Self> {
        let repository = Arc::new(DuckDbRepository::open_in_memory()?);
        Self::with_repository(Config::default(), repository)
    }

    fn with_repository(config: Config, repository: Arc<DuckDbRepository>) -> Result<Self> {
        repository.ensure_schema()?;

        let ids: Arc<dyn IdGenerator> = Arc::new(RandomIdGenerator::new(config.id_length));
        let coordinator =
            TransactionCoordinator::new(Arc::clone(&repository), ids, config.retry_policy());
        let query_service = QueryService::new(Arc::clone(&repository));
        let doctor_service = DoctorService::new(Arc::clone(&repository));

        Ok(Self {
            config,
            repository,
            coordinator,
            query_service,
            doctor_service,
        })
    }

    /// Validate and apply a deposit request
    pub fn deposit(
        &self,
        user_id: &str,
        request: &DepositRequest,
    ) -> OperationResult<TransactionReceipt> {
        request
            .validate()
            .and_then(|intent| self.coordinator.deposit(user_id, &intent))
            .into()
    }

    /// Validate and apply a withdrawal request
    pub fn withdraw(
        &self,
        user_id: &str,
        request: &WithdrawalRequest,
    ) -> OperationResult<TransactionReceipt> {
        request
            .validate()
            .and_then(|intent| self.coordinator.withdraw(user_id, &intent))
            .into()
    }
}
