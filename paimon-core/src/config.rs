//! Configuration management
//!
//! Settings live in `<data dir>/settings.json`:
//! ```json
//! {
//!   "ledger": { "maxRetries": 10, "retryDelayMs": 5, "maxRetryDelayMs": 200, "idLength": 16 }
//! }
//! ```
//! Keys outside the `ledger` section are ignored.

use std::path::Path;
use std::time::Duration;

use serde::Deserialize;

use crate::adapters::id::DEFAULT_ID_LENGTH;
use crate::domain::result::{Error, Result};
use crate::services::RetryPolicy;

/// Name of the settings file inside the data directory
pub const SETTINGS_FILE: &str = "settings.json";

/// Name of the database file inside the data directory
pub const DATABASE_FILE: &str = "paimon.duckdb";

/// Raw settings.json structure
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SettingsFile {
    #[serde(default)]
    ledger: LedgerSettings,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct LedgerSettings {
    #[serde(default)]
    max_retries: Option<u32>,
    #[serde(default)]
    retry_delay_ms: Option<u64>,
    #[serde(default)]
    max_retry_delay_ms: Option<u64>,
    #[serde(default)]
    id_length: Option<usize>,
}

/// Paimon configuration (resolved view of settings plus environment)
#[derive(Debug, Clone)]
pub struct Config {
    /// Total attempts per operation when storage reports a conflict
    pub max_retries: u32,
    pub retry_delay_ms: u64,
    pub max_retry_delay_ms: u64,
    pub id_length: usize,
}

impl Default for Config {
    fn default() -> Self {
        let retry = RetryPolicy::default();
        Self {
            max_retries: retry.max_attempts,
            retry_delay_ms: retry.initial_delay.as_millis() as u64,
            max_retry_delay_ms: retry.max_delay.as_millis() as u64,
            id_length: DEFAULT_ID_LENGTH,
        }
    }
}

impl Config {
    /// Load config from the data directory
    ///
    /// A missing file yields defaults. `PAIMON_MAX_RETRIES` overrides
    /// `ledger.maxRetries`.
    pub fn load(data_dir: &Path) -> Result<Self> {
        let raw = read_settings(data_dir)?;
        let defaults = Self::default();

        let max_retries = match std::env::var("PAIMON_MAX_RETRIES") {
            Ok(value) => value.trim().parse::<u32>().map_err(|_| {
                Error::Config(format!(
                    "PAIMON_MAX_RETRIES must be a positive integer, got {:?}",
                    value
                ))
            })?,
            Err(_) => raw.ledger.max_retries.unwrap_or(defaults.max_retries),
        };

        let config = Self {
            max_retries,
            retry_delay_ms: raw.ledger.retry_delay_ms.unwrap_or(defaults.retry_delay_ms),
            max_retry_delay_ms: raw
                .ledger
                .max_retry_delay_ms
                .unwrap_or(defaults.max_retry_delay_ms),
            id_length: raw.ledger.id_length.unwrap_or(defaults.id_length),
        };
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<()> {
        if self.max_retries == 0 {
            return Err(Error::Config("ledger.maxRetries must be at least 1".into()));
        }
        if self.retry_delay_ms > self.max_retry_delay_ms {
            return Err(Error::Config(
                "ledger.retryDelayMs must not exceed ledger.maxRetryDelayMs".into(),
            ));
        }
        if !(8..=64).contains(&self.id_length) {
            return Err(Error::Config("ledger.idLength must be between 8 and 64".into()));
        }
        Ok(())
    }

    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy {
            max_attempts: self.max_retries,
            initial_delay: Duration::from_millis(self.retry_delay_ms),
            max_delay: Duration::from_millis(self.max_retry_delay_ms),
        }
    }
}

fn read_settings(data_dir: &Path) -> Result<SettingsFile> {
    let settings_path = data_dir.join(SETTINGS_FILE);
    if !settings_path.exists() {
        return Ok(SettingsFile::default());
    }
    let content = std::fs::read_to_string(&settings_path)?;
    serde_json::from_str(&content)
        .map_err(|e| Error::Config(format!("{}: {}", settings_path.display(), e)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_defaults_without_file() {
        let dir = TempDir::new().unwrap();
        let config = Config::load(dir.path()).unwrap();
        assert_eq!(config.id_length, DEFAULT_ID_LENGTH);
        assert_eq!(config.retry_policy(), RetryPolicy::default());
    }

    #[test]
    fn test_reads_ledger_section() {
        let dir = TempDir::new().unwrap();
        std::fs::write(
            dir.path().join(SETTINGS_FILE),
            r#"{"ledger": {"retryDelayMs": 1, "maxRetryDelayMs": 50, "idLength": 24}}"#,
        )
        .unwrap();

        let config = Config::load(dir.path()).unwrap();
        assert_eq!(config.id_length, 24);
        assert_eq!(config.retry_policy().max_delay, Duration::from_millis(50));
    }

    #[test]
    fn test_rejects_invalid_values() {
        let dir = TempDir::new().unwrap();
        std::fs::write(dir.path().join(SETTINGS_FILE), r#"{"ledger": {"idLength": 2}}"#).unwrap();
        assert!(matches!(Config::load(dir.path()), Err(Error::Config(_))));

        std::fs::write(dir.path().join(SETTINGS_FILE), "not json").unwrap();
        assert!(matches!(Config::load(dir.path()), Err(Error::Config(_))));
    }

    #[test]
    fn test_ignores_other_sections() {
        let dir = TempDir::new().unwrap();
        std::fs::write(
            dir.path().join(SETTINGS_FILE),
            r#"{"theme": "dark", "ledger": {"note": "x", "idLength": 12}}"#,
        )
        .unwrap();
        assert_eq!(Config::load(dir.path()).unwrap().id_length, 12);
    }
}
