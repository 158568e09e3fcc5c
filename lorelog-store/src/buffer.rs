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

//! Bounded, time-ordered event buffer
//!
//! Structural order is insertion order, which equals journal arrival order.
//! Under normal operation that is also non-decreasing by source timestamp;
//! a malformed record with an out-of-order timestamp breaks chronological
//! ordering but never structural ordering, so range queries filter rather
//! than binary-search.
//!
//! The buffer itself is not synchronized; [`crate::store::LoreStore`] wraps
//! it in the subsystem's single reader/writer lock.

use chrono::{DateTime, Utc};
use lorelog_core::{ClassifiedEvent, EventCategory};
use std::collections::VecDeque;

/// Capacity-bounded ring of classified events, oldest first.
#[derive(Debug)]
pub struct EventBuffer {
    events: VecDeque<ClassifiedEvent>,
    capacity: usize,
    evicted: u64,
}

impl EventBuffer {
    /// Create a buffer holding at most `capacity` events.
    pub fn new(capacity: usize) -> Self {
        // A zero capacity would make every append evict its own insert;
        // config validation rejects it, this is the backstop.
        let capacity = capacity.max(1);
        Self {
            events: VecDeque::with_capacity(capacity.min(1024)),
            capacity,
            evicted: 0,
        }
    }

    /// Append one event, evicting exactly enough oldest entries (at most
    /// one, since appends are unit) to stay within capacity.
    pub fn append(&mut self, event: ClassifiedEvent) {
        while self.events.len() >= self.capacity {
            self.evict_oldest();
        }
        self.events.push_back(event);
    }

    /// Drop the single oldest event, if any.
    pub fn evict_oldest(&mut self) -> Option<ClassifiedEvent> {
        let evicted = self.events.pop_front();
        if evicted.is_some() {
            self.evicted += 1;
        }
        evicted
    }

    /// Events whose timestamps fall in `[start, end]`, in buffer order.
    pub fn query_time_range(
        &self,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Vec<ClassifiedEvent> {
        self.events
            .iter()
            .filter(|e| e.timestamp >= start && e.timestamp <= end)
            .cloned()
            .collect()
    }

    /// The most recent `limit` events with the given type tag, returned in
    /// buffer order (oldest of the matches first).
    pub fn query_by_type(&self, event_type: &str, limit: usize) -> Vec<ClassifiedEvent> {
        self.query_recent_matching(limit, |e| e.event_type == event_type)
    }

    /// The most recent `limit` events in the given category, in buffer order.
    pub fn query_by_category(&self, category: EventCategory, limit: usize) -> Vec<ClassifiedEvent> {
        self.query_recent_matching(limit, |e| e.category == category)
    }

    fn query_recent_matching<F>(&self, limit: usize, pred: F) -> Vec<ClassifiedEvent>
    where
        F: Fn(&ClassifiedEvent) -> bool,
    {
        let mut out: Vec<ClassifiedEvent> = self
            .events
            .iter()
            .rev()
            .filter(|e| pred(e))
            .take(limit)
            .cloned()
            .collect();
        out.reverse();
        out
    }

    /// Remove everything; returns the number of events dropped.
    pub fn clear(&mut self) -> usize {
        let n = self.events.len();
        self.events.clear();
        n
    }

    pub fn iter(&self) -> impl Iterator<Item = &ClassifiedEvent> {
        self.events.iter()
    }

    pub fn len(&self) -> usize {
        self.events.len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Lifetime count of capacity evictions.
    pub fn evicted(&self) -> u64 {
        self.evicted
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use serde_json::Map;

    fn event(seq: i64, tag: &str) -> ClassifiedEvent {
        let timestamp = Utc.with_ymd_and_hms(2026, 8, 1, 10, 0, 0).unwrap()
            + chrono::Duration::seconds(seq);
        ClassifiedEvent {
            id: seq as u64,
            timestamp,
            event_type: tag.to_string(),
            category: lorelog_core::category_for_tag(tag),
            summary: format!("{tag} #{seq}"),
            key_fields: Map::new(),
            valid: true,
            validation_errors: Vec::new(),
        }
    }

    #[test]
    fn test_append_preserves_insertion_order() {
        let mut buf = EventBuffer::new(16);
        for i in 0..5 {
            buf.append(event(i, "jump"));
        }
        let seqs: Vec<u64> = buf.iter().map(|e| e.id).collect();
        assert_eq!(seqs, vec![0, 1, 2, 3, 4]);
    }

    #[test]
    fn test_eviction_bound_holds_exactly_capacity() {
        let mut buf = EventBuffer::new(3);
        for i in 0..10 {
            buf.append(event(i, "jump"));
        }
        assert_eq!(buf.len(), 3);
        assert_eq!(buf.evicted(), 7);
        let seqs: Vec<u64> = buf.iter().map(|e| e.id).collect();
        assert_eq!(seqs, vec![7, 8, 9], "the most recent entries survive");
    }

    #[test]
    fn test_query_by_type_keeps_most_recent_in_time_order() {
        let mut buf = EventBuffer::new(16);
        for i in 0..6 {
            buf.append(event(i, if i % 2 == 0 { "jump" } else { "dock" }));
        }
        let jumps = buf.query_by_type("jump", 2);
        let seqs: Vec<u64> = jumps.iter().map(|e| e.id).collect();
        assert_eq!(seqs, vec![2, 4], "limit keeps the most recent, ordered oldest first");
    }

    #[test]
    fn test_query_by_category() {
        let mut buf = EventBuffer::new(16);
        buf.append(event(0, "jump"));
        buf.append(event(1, "bounty"));
        buf.append(event(2, "dock"));
        let travel = buf.query_by_category(EventCategory::Travel, 10);
        assert_eq!(travel.len(), 2);
        assert_eq!(buf.query_by_category(EventCategory::Social, 10).len(), 0);
    }

    #[test]
    fn test_time_range_is_inclusive() {
        let mut buf = EventBuffer::new(16);
        for i in 0..5 {
            buf.append(event(i, "jump"));
        }
        let start = event(1, "jump").timestamp;
        let end = event(3, "jump").timestamp;
        let seqs: Vec<u64> = buf
            .query_time_range(start, end)
            .iter()
            .map(|e| e.id)
            .collect();
        assert_eq!(seqs, vec![1, 2, 3]);
    }

    #[test]
    fn test_out_of_order_timestamp_keeps_structural_order() {
        let mut buf = EventBuffer::new(16);
        buf.append(event(5, "jump"));
        buf.append(event(1, "jump")); // malformed clock, arrives later
        buf.append(event(6, "jump"));
        let seqs: Vec<u64> = buf.iter().map(|e| e.id).collect();
        assert_eq!(seqs, vec![5, 1, 6]);
    }

    #[test]
    fn test_clear_reports_count() {
        let mut buf = EventBuffer::new(16);
        for i in 0..4 {
            buf.append(event(i, "jump"));
        }
        assert_eq!(buf.clear(), 4);
        assert!(buf.is_empty());
    }

    #[test]
    fn test_empty_queries_return_empty() {
        let buf = EventBuffer::new(4);
        assert!(buf.query_by_type("jump", 10).is_empty());
        assert!(buf
            .query_time_range(Utc::now() - chrono::Duration::hours(1), Utc::now())
            .is_empty());
    }

    proptest::proptest! {
        // For any capacity and append count, occupancy is exactly
        // min(appends, capacity) and the survivors are the newest.
        #[test]
        fn prop_eviction_bound(capacity in 1usize..64, appends in 0usize..200) {
            let mut buf = EventBuffer::new(capacity);
            for i in 0..appends {
                buf.append(event(i as i64, "jump"));
            }
            proptest::prop_assert_eq!(buf.len(), appends.min(capacity));
            let oldest = buf.iter().next().map(|e| e.id);
            if let Some(id) = oldest {
                proptest::prop_assert_eq!(id, appends.saturating_sub(capacity) as u64);
            }
        }
    }
}
