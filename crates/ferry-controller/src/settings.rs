//! Controller settings
//!
//! Loaded from TOML; every field has a default so an empty file is valid.

use crate::logging::LogFormat;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Settings error
#[derive(Debug, thiserror::Error)]
pub enum SettingsError {
    /// File could not be read
    #[error("read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// File is not valid settings TOML
    #[error("parse {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },

    /// Value out of range
    #[error("invalid setting: {0}")]
    Invalid(String),
}

/// Controller settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    /// Requeue delay after a failed pass
    pub fast_requeue_ms: u64,
    /// Requeue delay while dependencies or inventory are not ready
    pub slow_requeue_ms: u64,
    /// Concurrent reconcile workers
    pub workers: usize,
    pub log_format: LogFormat,
    pub inventory: InventorySettings,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            fast_requeue_ms: 500,
            slow_requeue_ms: 3000,
            workers: 4,
            log_format: LogFormat::Pretty,
            inventory: InventorySettings::default(),
        }
    }
}

impl Settings {
    /// Create default settings
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Load settings from a TOML file
    ///
    /// # Errors
    /// Returns `SettingsError` if the file cannot be read, does not parse, or
    /// holds an out-of-range value.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, SettingsError> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path).map_err(|source| SettingsError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let settings: Self = toml::from_str(&raw).map_err(|source| SettingsError::Parse {
            path: path.to_path_buf(),
            source,
        })?;
        settings.validate()?;
        Ok(settings)
    }

    /// Check value ranges
    ///
    /// # Errors
    /// `SettingsError::Invalid` when `workers` is zero.
    pub fn validate(&self) -> Result<(), SettingsError> {
        if self.workers == 0 {
            return Err(SettingsError::Invalid("workers must be at least 1".to_string()));
        }
        Ok(())
    }

    /// With fast requeue delay
    #[inline]
    #[must_use]
    pub fn with_fast_requeue(mut self, delay: Duration) -> Self {
        self.fast_requeue_ms = millis(delay);
        self
    }

    /// With slow requeue delay
    #[inline]
    #[must_use]
    pub fn with_slow_requeue(mut self, delay: Duration) -> Self {
        self.slow_requeue_ms = millis(delay);
        self
    }

    /// With worker count
    #[inline]
    #[must_use]
    pub fn with_workers(mut self, workers: usize) -> Self {
        self.workers = workers;
        self
    }

    /// With log format
    #[inline]
    #[must_use]
    pub fn with_log_format(mut self, format: LogFormat) -> Self {
        self.log_format = format;
        self
    }

    #[inline]
    #[must_use]
    pub fn fast_requeue(&self) -> Duration {
        Duration::from_millis(self.fast_requeue_ms)
    }

    #[inline]
    #[must_use]
    pub fn slow_requeue(&self) -> Duration {
        Duration::from_millis(self.slow_requeue_ms)
    }
}

fn millis(delay: Duration) -> u64 {
    u64::try_from(delay.as_millis()).unwrap_or(u64::MAX)
}

/// Inventory service settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct InventorySettings {
    /// Base URL; no inventory lookups when unset
    pub url: Option<String>,
    pub user: Option<String>,
    pub password: Option<String>,
    /// PEM CA bundle path
    pub cacert: Option<PathBuf>,
    pub timeout_secs: u64,
}

impl Default for InventorySettings {
    fn default() -> Self {
        Self {
            url: None,
            user: None,
            password: None,
            cacert: None,
            timeout_secs: 10,
        }
    }
}

impl InventorySettings {
    #[inline]
    #[must_use]
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use std::io::Write;

    #[test]
    fn defaults_match_requeue_policy() {
        let settings = Settings::new();
        assert_eq!(settings.fast_requeue(), Duration::from_millis(500));
        assert_eq!(settings.slow_requeue(), Duration::from_secs(3));
        assert_eq!(settings.workers, 4);
        assert_eq!(settings.inventory.timeout(), Duration::from_secs(10));
    }

    #[test]
    fn load_partial_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(
            file,
            "workers = 2\nlog_format = \"json\"\n[inventory]\nurl = \"https://inventory\""
        )
        .unwrap();

        let settings = Settings::load(file.path()).unwrap();
        assert_eq!(settings.workers, 2);
        assert_eq!(settings.log_format, LogFormat::Json);
        assert_eq!(settings.inventory.url.as_deref(), Some("https://inventory"));
        assert_eq!(settings.fast_requeue_ms, 500);
    }

    #[test]
    fn zero_workers_rejected() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "workers = 0").unwrap();
        assert!(matches!(
            Settings::load(file.path()),
            Err(SettingsError::Invalid(_))
        ));
    }

    #[test]
    fn missing_file_is_io_error() {
        assert!(matches!(
            Settings::load("/nonexistent/ferry.toml"),
            Err(SettingsError::Io { .. })
        ));
    }

    #[test]
    fn builders_override() {
        let settings = Settings::new()
            .with_fast_requeue(Duration::from_millis(10))
            .with_slow_requeue(Duration::from_millis(20))
            .with_workers(1);
        assert_eq!(settings.fast_requeue_ms, 10);
        assert_eq!(settings.slow_requeue_ms, 20);
        assert_eq!(settings.workers, 1);
    }
}
