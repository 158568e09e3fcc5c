// Copyright 2025 Lorelog (https://github.com/lorelog)
//
// This program is free software: you can redistribute it and/or modify
// it under the terms of the GNU Affero General Public License as published by
// the Free Software Foundation, either version 3 of the License, or
// (at your option) any later version.
//
// This program is distributed in the hope that it will be useful,
// but WITHOUT ANY WARRANTY; without even the implied warranty of
// MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE. See the
// GNU Affero General Public License for more details.
//
// You should have received a copy of the GNU Affero General Public License
// along with this program. If not, see <https://www.gnu.org/licenses/>.

//! Watcher configuration
//!
//! Deserializable from TOML with per-field defaults so a partial config
//! file works. A malformed file or an impossible value is surfaced as a
//! config error before the poll loop starts; config problems are the only
//! fatal error class in the subsystem.

use crate::error::{LorelogError, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Default poll interval between tailer passes.
pub const DEFAULT_POLL_INTERVAL_MS: u64 = 1_000;

/// Default event buffer capacity; sized for a multi-hour session at a
/// typical journal rate of well under one event per second.
pub const DEFAULT_BUFFER_CAPACITY: usize = 8_192;

/// Default backfill lookback window.
pub const DEFAULT_BACKFILL_WINDOW_HOURS: u64 = 24;

/// Configuration for the journal watcher.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WatchConfig {
    /// Directory containing the append-only journal files.
    /// Required before the tailer can start; everything else has defaults.
    pub journal_dir: Option<PathBuf>,

    /// Milliseconds the poll loop sleeps between passes.
    #[serde(default = "default_poll_interval_ms")]
    pub poll_interval_ms: u64,

    /// Maximum events held in the in-memory buffer.
    #[serde(default = "default_buffer_capacity")]
    pub buffer_capacity: usize,

    /// Hours of historical journal files replayed on startup.
    #[serde(default = "default_backfill_window_hours")]
    pub backfill_window_hours: u64,

    /// Optional path for persisting file positions across restarts.
    /// `None` means every start performs a fresh backfill.
    #[serde(default)]
    pub position_ledger: Option<PathBuf>,
}

fn default_poll_interval_ms() -> u64 {
    DEFAULT_POLL_INTERVAL_MS
}

fn default_buffer_capacity() -> usize {
    DEFAULT_BUFFER_CAPACITY
}

fn default_backfill_window_hours() -> u64 {
    DEFAULT_BACKFILL_WINDOW_HOURS
}

impl Default for WatchConfig {
    fn default() -> Self {
        Self {
            journal_dir: None,
            poll_interval_ms: DEFAULT_POLL_INTERVAL_MS,
            buffer_capacity: DEFAULT_BUFFER_CAPACITY,
            backfill_window_hours: DEFAULT_BACKFILL_WINDOW_HOURS,
            position_ledger: None,
        }
    }
}

impl WatchConfig {
    /// Config pointed at a journal directory, defaults elsewhere.
    pub fn for_dir(dir: impl Into<PathBuf>) -> Self {
        Self {
            journal_dir: Some(dir.into()),
            ..Self::default()
        }
    }

    /// Load and validate a TOML config file.
    pub fn from_toml_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path)?;
        let config: WatchConfig = toml::from_str(&text)
            .map_err(|e| LorelogError::config_at(path, e))?;
        config.validate()?;
        Ok(config)
    }

    /// Check invariants that would otherwise wedge the poll loop.
    pub fn validate(&self) -> Result<()> {
        if self.poll_interval_ms == 0 {
            return Err(LorelogError::Config(
                "poll_interval_ms must be greater than zero".to_string(),
            ));
        }
        if self.buffer_capacity == 0 {
            return Err(LorelogError::Config(
                "buffer_capacity must be greater than zero".to_string(),
            ));
        }
        Ok(())
    }

    /// The journal directory, or the only fatal startup error.
    pub fn journal_dir(&self) -> Result<&Path> {
        self.journal_dir
            .as_deref()
            .ok_or(LorelogError::NoJournalDirectory)
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    /// The backfill lookback as a duration, saturating rather than
    /// overflowing on absurd (but deserializable) hour counts.
    pub fn backfill_window(&self) -> Duration {
        Duration::from_secs(self.backfill_window_hours.saturating_mul(3_600))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_defaults() {
        let config = WatchConfig::default();
        assert_eq!(config.poll_interval_ms, DEFAULT_POLL_INTERVAL_MS);
        assert_eq!(config.buffer_capacity, DEFAULT_BUFFER_CAPACITY);
        assert!(config.journal_dir.is_none());
        assert!(config.position_ledger.is_none());
    }

    #[test]
    fn test_partial_toml_fills_defaults() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "journal_dir = \"/tmp/journals\"").unwrap();
        writeln!(file, "poll_interval_ms = 250").unwrap();
        let config = WatchConfig::from_toml_file(file.path()).unwrap();
        assert_eq!(config.journal_dir.unwrap(), PathBuf::from("/tmp/journals"));
        assert_eq!(config.poll_interval_ms, 250);
        assert_eq!(config.buffer_capacity, DEFAULT_BUFFER_CAPACITY);
    }

    #[test]
    fn test_malformed_toml_is_config_error() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "journal_dir = [not toml").unwrap();
        let err = WatchConfig::from_toml_file(file.path()).unwrap_err();
        assert!(matches!(err, LorelogError::Config(_)));
    }

    #[test]
    fn test_zero_capacity_rejected() {
        let config = WatchConfig {
            buffer_capacity: 0,
            ..WatchConfig::default()
        };
        assert!(matches!(config.validate(), Err(LorelogError::Config(_))));
    }

    #[test]
    fn test_backfill_window_saturates_on_huge_values() {
        let config = WatchConfig {
            backfill_window_hours: u64::MAX,
            ..WatchConfig::default()
        };
        assert_eq!(config.backfill_window(), Duration::from_secs(u64::MAX));
    }

    #[test]
    fn test_missing_journal_dir_is_fatal_class() {
        let config = WatchConfig::default();
        assert!(matches!(
            config.journal_dir(),
            Err(LorelogError::NoJournalDirectory)
        ));
    }
}
