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

//! Lorelog Core
//!
//! Data model and stateless pipeline stages for the journal ingestion
//! subsystem: raw/decoded records, the decode step, the closed category
//! taxonomy, the classifier, configuration, and error types.

pub mod category;
pub mod classify;
pub mod config;
pub mod error;
pub mod event;
pub mod record;

pub use category::{category_for_tag, EventCategory};
pub use classify::classify;
pub use config::{
    WatchConfig, DEFAULT_BACKFILL_WINDOW_HOURS, DEFAULT_BUFFER_CAPACITY, DEFAULT_POLL_INTERVAL_MS,
};
pub use error::{LorelogError, QueryError, Result};
pub use event::ClassifiedEvent;
pub use record::{decode_line, DecodeFailure, DecodedRecord, RawRecord};
