/*
    Copyright © 2023, ParallelChain Lab
    Licensed under the Apache License, Version 2.0: http://www.apache.org/licenses/LICENSE-2.0
*/

//! A bounded, FIFO-evicting ring of recent mutation events.
//!
//! The history exists to serve watchers that subscribe with a `since_index` in the past: before a
//! watcher is registered for future notifications, the hub scans the ring for an already-applied
//! event the watcher would have matched. The scan is linear in the retained history, which is
//! acceptable because it only runs on the cold catch-up path.

use std::collections::VecDeque;

use crate::events::Event;
use crate::types::basic::LogIndex;
use crate::types::path;

pub struct EventHistory {
    events: VecDeque<Event>,
    capacity: usize,
}

impl EventHistory {
    pub(crate) fn new(capacity: usize) -> EventHistory {
        EventHistory {
            events: VecDeque::with_capacity(capacity),
            capacity,
        }
    }

    /// Appends an event, evicting the oldest retained one once the ring is full.
    pub(crate) fn add(&mut self, event: Event) {
        if self.capacity == 0 {
            return;
        }
        if self.events.len() == self.capacity {
            self.events.pop_front();
        }
        self.events.push_back(event);
    }

    /// The oldest retained event with `index >= since` affecting `watch_path`: exactly that path
    /// for non-recursive watches, any segment-aligned descendant for recursive ones.
    pub(crate) fn scan(&self, watch_path: &str, recursive: bool, since: LogIndex) -> Option<&Event> {
        self.events.iter().find(|event| {
            event.index >= since && matches(watch_path, recursive, &event.path)
        })
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

    #[cfg(test)]
    pub(crate) fn iter(&self) -> impl Iterator<Item = &Event> {
        self.events.iter()
    }
}

fn matches(watch_path: &str, recursive: bool, event_path: &str) -> bool {
    if recursive {
        path::is_segment_prefix(watch_path, event_path)
    } else {
        watch_path == event_path
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::EventKind;
    use crate::types::basic::Term;

    fn event(path: &str, index: u64) -> Event {
        Event::new(
            EventKind::Create,
            path.to_string(),
            LogIndex::new(index),
            Term::new(0),
        )
    }

    // Fill a ring of capacity 100 with 200 events and check that the first 100 were evicted.
    #[test]
    fn ring_evicts_oldest_first() {
        let mut history = EventHistory::new(100);
        for i in 0..200 {
            history.add(event("/foo", i));
        }

        assert_eq!(history.len(), 100);
        let mut expected = 100;
        for retained in history.iter() {
            assert_eq!(retained.index.int(), expected);
            expected += 1;
        }
    }

    #[test]
    fn scan_finds_oldest_matching_event() {
        let mut history = EventHistory::new(100);
        history.add(event("/foo", 1));
        history.add(event("/foo/bar", 2));
        history.add(event("/foo/foo", 3));
        history.add(event("/foo/bar/bar", 4));
        history.add(event("/foo/foo/foo", 5));

        assert_eq!(history.scan("/foo", true, LogIndex::new(1)).unwrap().index.int(), 1);
        assert_eq!(history.scan("/foo/bar", true, LogIndex::new(1)).unwrap().index.int(), 2);
        assert_eq!(history.scan("/foo/bar", true, LogIndex::new(3)).unwrap().index.int(), 4);
        assert!(history.scan("/foo/bar", true, LogIndex::new(6)).is_none());
    }

    #[test]
    fn scan_respects_recursion_and_segment_alignment() {
        let mut history = EventHistory::new(100);
        history.add(event("/foo/bar", 1));
        history.add(event("/foobar", 2));

        // Non-recursive watches match the exact path only.
        assert!(history.scan("/foo", false, LogIndex::new(1)).is_none());
        // "/foo" is not a segment-aligned prefix of "/foobar".
        assert_eq!(history.scan("/foo", true, LogIndex::new(1)).unwrap().index.int(), 1);
        assert_eq!(history.scan("/foobar", false, LogIndex::new(1)).unwrap().index.int(), 2);
    }
}
