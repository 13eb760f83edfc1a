//! Service layer - business logic orchestration
//!
//! Services coordinate domain logic and port interactions. Each service
//! focuses on a specific use case or feature area.

mod coordinator;
mod doctor;
pub mod migration;
mod query;

pub use coordinator::{RetryPolicy, TransactionCoordinator, TransactionReceipt};
pub use doctor::{CheckResult, DoctorResult, DoctorService, DoctorSummary};
pub use migration::{MigrationResult, MigrationService};
pub use query::{BalanceView, Counterparty, QueryService, TransactionView};
