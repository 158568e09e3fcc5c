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

//! Lorelog Tailer
//!
//! Incremental, rotation-aware ingestion of an append-only journal
//! directory: file discovery and ordering, identity-based rotation
//! detection, byte-offset tracking with partial-line safety, startup
//! backfill, and the background poll loop that feeds the store.

pub mod discover;
pub mod position;
pub mod reader;
pub mod tailer;

pub use discover::{discover, select_active, JournalFile};
pub use position::{FileIdentity, FilePosition, PositionLedger};
pub use reader::{read_new_lines, ReadBatch};
pub use tailer::{JournalTailer, TailerHandle};
