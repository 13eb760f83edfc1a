//! Adapter implementations
//!
//! Adapters implement the port traits with concrete technologies:
//! - DuckDB for the Storage / UnitOfWork ports
//! - Thread-local RNG for the IdGenerator port

pub mod duckdb;
pub mod id;
