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

//! Lorelog Store
//!
//! The in-memory, event-sourced side of the subsystem: a bounded,
//! time-ordered buffer of classified events, the live state projection
//! folded from the stream, and the concurrently-queryable store handle
//! that wraps both behind one reader/writer lock.

pub mod buffer;
pub mod projection;
pub mod store;

pub use buffer::EventBuffer;
pub use projection::{LocationState, SessionMarker, StateProjection};
pub use store::{LoreStore, StoreStatistics};
