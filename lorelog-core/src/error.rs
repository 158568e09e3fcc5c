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

//! Lorelog error types

use std::path::Path;
use thiserror::Error;

/// Result type for lorelog operations
pub type Result<T> = std::result::Result<T, LorelogError>;

/// Errors that can occur across the ingestion subsystem.
///
/// Per-record problems (malformed lines, unknown type tags, failed
/// validation) are deliberately *not* represented here: those are absorbed
/// into [`crate::record::DecodeFailure`] records or validity flags on the
/// event itself and never propagate out of the poll loop.
#[derive(Debug, Error)]
pub enum LorelogError {
    /// Configuration problem detected before the poll loop starts.
    /// This is the only class of error that is allowed to be fatal.
    #[error("Configuration error: {0}")]
    Config(String),

    /// The watched journal directory was never configured.
    #[error("No journal directory configured")]
    NoJournalDirectory,

    /// IO error while reading a journal file or the position ledger.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization error (position ledger, config round-trips).
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// The tailer thread could not be joined cleanly on shutdown.
    #[error("Tailer thread panicked")]
    TailerPanicked,
}

impl LorelogError {
    /// Build a config error from a path plus a reason.
    pub fn config_at(path: &Path, reason: impl std::fmt::Display) -> Self {
        LorelogError::Config(format!("{}: {}", path.display(), reason))
    }
}

/// Structured error payload for the query surface.
///
/// Returned to callers that pass an unsupported category or otherwise
/// malformed query input. Queries against an empty store are *not* errors;
/// they return empty results.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum QueryError {
    /// The requested category is not in the closed category set.
    #[error("Unknown category '{got}', expected one of: {expected}")]
    UnknownCategory { got: String, expected: String },

    /// A query limit of zero would always return nothing.
    #[error("Query limit must be greater than zero")]
    ZeroLimit,

    /// The time range is inverted (end before start).
    #[error("Invalid time range: end {end} is before start {start}")]
    InvalidTimeRange { start: String, end: String },
}
