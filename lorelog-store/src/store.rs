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

//! Shared store handle
//!
//! [`LoreStore`] is the one shared mutable resource of the subsystem: the
//! event buffer plus the state projection behind a single reader/writer
//! lock. The tailer thread is the sole writer; its critical section is one
//! buffer append plus one projection apply. Query callers take read locks
//! and receive clones, so they never observe a torn view and never block
//! the writer beyond that section.
//!
//! The store is an explicitly constructed instance shared by `Arc` handle.
//! There is no process-wide singleton.

use crate::buffer::EventBuffer;
use crate::projection::StateProjection;
use chrono::{DateTime, Duration, Utc};
use lorelog_core::{ClassifiedEvent, DecodeFailure, EventCategory, QueryError, WatchConfig};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, VecDeque};

/// How many recent decode failures are kept for inspection.
const FAILURE_HISTORY: usize = 64;

/// Occupancy and lifetime counters for the store.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoreStatistics {
    /// Events ingested since start (or the last `clear`).
    pub total_events: u64,
    /// Lifetime counts per category, not just buffer-resident events.
    pub by_category: BTreeMap<String, u64>,
    /// Lines that could not be decoded.
    pub decode_failures: u64,
    /// Events kept but flagged invalid by classification.
    pub invalid_events: u64,
    /// Events currently resident in the buffer.
    pub buffer_len: usize,
    pub buffer_capacity: usize,
    /// Events dropped by capacity eviction.
    pub evicted: u64,
    /// Timestamp of the newest ingested event.
    pub last_event_at: Option<DateTime<Utc>>,
}

struct StoreInner {
    buffer: EventBuffer,
    projection: StateProjection,
    total_events: u64,
    by_category: BTreeMap<EventCategory, u64>,
    invalid_events: u64,
    decode_failures: u64,
    recent_failures: VecDeque<DecodeFailure>,
    last_event_at: Option<DateTime<Utc>>,
}

impl StoreInner {
    fn new(capacity: usize) -> Self {
        Self {
            buffer: EventBuffer::new(capacity),
            projection: StateProjection::new(),
            total_events: 0,
            by_category: BTreeMap::new(),
            invalid_events: 0,
            decode_failures: 0,
            recent_failures: VecDeque::new(),
            last_event_at: None,
        }
    }
}

/// Event-sourced state store over the journal stream.
pub struct LoreStore {
    inner: RwLock<StoreInner>,
}

impl LoreStore {
    /// Store with the given buffer capacity.
    pub fn new(capacity: usize) -> Self {
        Self {
            inner: RwLock::new(StoreInner::new(capacity)),
        }
    }

    /// Store sized from configuration.
    pub fn with_config(config: &WatchConfig) -> Self {
        Self::new(config.buffer_capacity)
    }

    // --- writer path (tailer thread only) ---

    /// Ingest one classified event: append to the buffer and fold into the
    /// projection, in one short critical section.
    pub fn ingest(&self, event: ClassifiedEvent) {
        let mut inner = self.inner.write();
        inner.total_events += 1;
        *inner.by_category.entry(event.category).or_insert(0) += 1;
        if !event.valid {
            inner.invalid_events += 1;
        }
        inner.last_event_at = Some(event.timestamp);
        inner.projection.apply(&event);
        inner.buffer.append(event);
    }

    /// Record a line that failed to decode. Failures are data, not errors.
    pub fn record_decode_failure(&self, failure: DecodeFailure) {
        tracing::warn!(
            source = %failure.source.display(),
            offset = failure.offset,
            reason = %failure.reason,
            "journal line failed to decode"
        );
        let mut inner = self.inner.write();
        inner.decode_failures += 1;
        if inner.recent_failures.len() >= FAILURE_HISTORY {
            inner.recent_failures.pop_front();
        }
        inner.recent_failures.push_back(failure);
    }

    // --- read path (any thread) ---

    /// Events from the last `window`, in buffer order.
    pub fn recent_events(&self, window: Duration) -> Vec<ClassifiedEvent> {
        let end = Utc::now();
        let start = end - window;
        self.inner.read().buffer.query_time_range(start, end)
    }

    /// Events in `[start, end]`, in buffer order.
    pub fn events_in_range(
        &self,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<Vec<ClassifiedEvent>, QueryError> {
        if end < start {
            return Err(QueryError::InvalidTimeRange {
                start: start.to_rfc3339(),
                end: end.to_rfc3339(),
            });
        }
        Ok(self.inner.read().buffer.query_time_range(start, end))
    }

    /// The most recent `limit` events with the given type tag. Any tag is
    /// accepted; a tag the buffer has never seen yields an empty list.
    pub fn events_by_type(
        &self,
        event_type: &str,
        limit: usize,
    ) -> Result<Vec<ClassifiedEvent>, QueryError> {
        if limit == 0 {
            return Err(QueryError::ZeroLimit);
        }
        Ok(self.inner.read().buffer.query_by_type(event_type, limit))
    }

    /// The most recent `limit` events in a category.
    pub fn events_by_category(
        &self,
        category: EventCategory,
        limit: usize,
    ) -> Result<Vec<ClassifiedEvent>, QueryError> {
        if limit == 0 {
            return Err(QueryError::ZeroLimit);
        }
        Ok(self.inner.read().buffer.query_by_category(category, limit))
    }

    /// Category query with a caller-supplied name; an unsupported name is
    /// reported as a structured error, never a null result.
    pub fn events_by_category_name(
        &self,
        category: &str,
        limit: usize,
    ) -> Result<Vec<ClassifiedEvent>, QueryError> {
        self.events_by_category(category.parse()?, limit)
    }

    /// Copy-on-read snapshot of the projected state.
    pub fn current_state(&self) -> StateProjection {
        self.inner.read().projection.clone()
    }

    /// Recent decode failures, oldest first.
    pub fn recent_decode_failures(&self) -> Vec<DecodeFailure> {
        self.inner.read().recent_failures.iter().cloned().collect()
    }

    /// Current occupancy and lifetime counters.
    pub fn statistics(&self) -> StoreStatistics {
        let inner = self.inner.read();
        StoreStatistics {
            total_events: inner.total_events,
            by_category: inner
                .by_category
                .iter()
                .map(|(cat, n)| (cat.to_string(), *n))
                .collect(),
            decode_failures: inner.decode_failures,
            invalid_events: inner.invalid_events,
            buffer_len: inner.buffer.len(),
            buffer_capacity: inner.buffer.capacity(),
            evicted: inner.buffer.evicted(),
            last_event_at: inner.last_event_at,
        }
    }

    /// Reset the buffer, projection, and counters. On-disk journal files
    /// and the tailer's file positions are untouched. Returns the number
    /// of buffered events dropped.
    pub fn clear(&self) -> usize {
        let mut inner = self.inner.write();
        let capacity = inner.buffer.capacity();
        let cleared = inner.buffer.len();
        *inner = StoreInner::new(capacity);
        tracing::info!(cleared, "store cleared");
        cleared
    }
}
