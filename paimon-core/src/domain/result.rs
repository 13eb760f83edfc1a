//! Result and error types for the core library

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Core library error type
#[derive(Error, Debug)]
pub enum Error {
    /// A withdrawal would drive the balance below zero
    #[error("Insufficient funds: cannot withdraw {requested} {currency}")]
    InsufficientFunds { currency: String, requested: i64 },

    #[error("Database error: {0}")]
    Database(String),

    /// Write-write conflict with a concurrent unit of work; safe to retry the whole unit
    #[error("Storage conflict: {0}")]
    Conflict(String),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl Error {
    /// Create a database error
    pub fn database(msg: impl Into<String>) -> Self {
        Self::Database(msg.into())
    }

    /// Create a validation error
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }

    /// Create an insufficient funds error
    pub fn insufficient_funds(currency: impl Into<String>, requested: i64) -> Self {
        Self::InsufficientFunds {
            currency: currency.into(),
            requested,
        }
    }

    /// Whether the failed unit of work may be re-run as a whole
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Conflict(_))
    }

    /// Outcome status the caller sees for this error
    pub fn status(&self) -> OutcomeStatus {
        match self {
            Self::InsufficientFunds { .. } => OutcomeStatus::InsufficientFunds,
            _ => OutcomeStatus::Internal,
        }
    }
}

/// Core library result type
pub type Result<T> = std::result::Result<T, Error>;

/// Terminal outcome of a core operation, mapped to transport codes by the caller
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OutcomeStatus {
    Success,
    InsufficientFunds,
    Internal,
}

/// Pagination metadata for list operations
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Pagination {
    pub limit: u32,
    pub offset: u32,
    pub total: u64,
}

/// Operation result handed to the outer layer
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OperationResult<T> {
    pub status: OutcomeStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<T>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub meta: Option<Pagination>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl<T> OperationResult<T> {
    /// Create a successful result
    pub fn ok(data: T) -> Self {
        Self {
            status: OutcomeStatus::Success,
            message: None,
            data: Some(data),
            meta: None,
            error: None,
        }
    }

    /// Create a successful result with pagination metadata
    pub fn ok_with_meta(data: T, meta: Pagination) -> Self {
        Self {
            meta: Some(meta),
            ..Self::ok(data)
        }
    }

    /// Create a failed result from a core error
    pub fn fail(error: &Error) -> Self {
        let message = match error {
            Error::InsufficientFunds { .. } => "Not enough balance",
            Error::Validation(_) => "Invalid request",
            _ => "Internal server error",
        };
        Self {
            status: error.status(),
            message: Some(message.to_string()),
            data: None,
            meta: None,
            error: Some(error.to_string()),
        }
    }

    pub fn is_success(&self) -> bool {
        self.status == OutcomeStatus::Success
    }
}

impl<T> From<Result<T>> for OperationResult<T> {
    fn from(result: Result<T>) -> Self {
        match result {
            Ok(data) => Self::ok(data),
            Err(e) => Self::fail(&e),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_operation_result_ok() {
        let result: OperationResult<i32> = OperationResult::ok(42);
        assert!(result.is_success());
        assert_eq!(result.data, Some(42));
        assert!(result.error.is_none());
        assert!(result.meta.is_none());
    }

    #[test]
    fn test_insufficient_funds_maps_to_its_own_status() {
        let err: Result<i32> = Err(Error::insufficient_funds("USD", 200));
        let result: OperationResult<i32> = err.into();
        assert_eq!(result.status, OutcomeStatus::InsufficientFunds);
        assert!(result.data.is_none());
        assert!(result.error.unwrap().contains("200 USD"));
    }

    #[test]
    fn test_infrastructure_errors_are_internal() {
        for err in [
            Error::database("disk full"),
            Error::Conflict("Conflict on update!".into()),
            Error::validation("bad input"),
        ] {
            assert_eq!(err.status(), OutcomeStatus::Internal);
        }
        assert!(Error::Conflict("x".into()).is_retryable());
        assert!(!Error::database("x").is_retryable());
    }

    #[test]
    fn test_failure_messages_name_the_cause() {
        let invalid: OperationResult<i32> = OperationResult::fail(&Error::validation("bad input"));
        assert_eq!(invalid.status, OutcomeStatus::Internal);
        assert_eq!(invalid.message.as_deref(), Some("Invalid request"));
        assert_eq!(invalid.error.as_deref(), Some("Validation error: bad input"));

        let broken: OperationResult<i32> = OperationResult::fail(&Error::database("disk full"));
        assert_eq!(broken.message.as_deref(), Some("Internal server error"));
    }

    #[test]
    fn test_status_serializes_snake_case() {
        let json = serde_json::to_string(&OutcomeStatus::InsufficientFunds).unwrap();
        assert_eq!(json, "\"insufficient_funds\"");
    }
}
