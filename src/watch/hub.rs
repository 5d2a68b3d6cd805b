/*
    Copyright © 2023, ParallelChain Lab
    Licensed under the Apache License, Version 2.0: http://www.apache.org/licenses/LICENSE-2.0
*/

//! Registry of active watchers and the fan-out that feeds them.
//!
//! ## Fire-once delivery
//!
//! A [`Watcher`] is a fire-once subscription: it either receives exactly one event or is cancelled.
//! Delivery happens over a bounded channel of capacity one via a non-blocking send, so a consumer
//! can never stall the mutation path. A watcher whose channel cannot accept is silently
//! deregistered; multi-event consumers are synthesized by re-subscribing with
//! `since_index = last_delivered + 1`, using the [event history](super::history::EventHistory) to
//! close the gap.
//!
//! ## Matching
//!
//! Watchers are keyed by their canonical watch path. When an event is notified, the hub walks the
//! ancestor chain of the event's path; recursive watchers fire at any ancestor, non-recursive
//! watchers only when registered on the event's exact path. During recursive deletions the store
//! fans out one synthetic notification per removed descendant, with the delivered event's path
//! rewritten to the descendant; those notifications are not recorded in history.

use std::collections::HashMap;
use std::sync::mpsc::{sync_channel, Receiver, SyncSender};
use std::sync::Weak;
use std::time::Duration;

use crate::events::Event;
use crate::store::tree::Shared;
use crate::types::basic::LogIndex;
use crate::types::path;

use super::history::EventHistory;

pub(crate) struct WatcherHub {
    history: EventHistory,
    watchers: HashMap<String, Vec<HubEntry>>,
    next_id: u64,
}

struct HubEntry {
    id: u64,
    recursive: bool,
    sender: SyncSender<Event>,
}

impl WatcherHub {
    pub(crate) fn new(history_capacity: usize) -> WatcherHub {
        WatcherHub {
            history: EventHistory::new(history_capacity),
            watchers: HashMap::new(),
            next_id: 0,
        }
    }

    /// Opens a subscription on `watch_path`.
    ///
    /// With a non-zero `since`, the history is scanned first; a hit is delivered immediately and
    /// the watcher is returned unregistered (its one event is already in the channel). Otherwise
    /// the watcher is registered for the next matching notification, and the returned registration
    /// id can be used to cancel it.
    pub(crate) fn watch(
        &mut self,
        watch_path: String,
        recursive: bool,
        since: LogIndex,
    ) -> (Receiver<Event>, Option<u64>) {
        let (sender, receiver) = sync_channel(1);

        if since.int() > 0 {
            if let Some(missed) = self.history.scan(&watch_path, recursive, since) {
                let _ = sender.try_send(missed.clone());
                return (receiver, None);
            }
        }

        let id = self.next_id;
        self.next_id += 1;
        self.watchers
            .entry(watch_path)
            .or_default()
            .push(HubEntry { id, recursive, sender });
        (receiver, Some(id))
    }

    /// Records a committed mutation in history and fans it out to matching watchers.
    pub(crate) fn notify(&mut self, event: &Event) {
        self.history.add(event.clone());
        self.fan_out(event);
    }

    /// Fans out one synthetic notification for a descendant removed by a recursive deletion. The
    /// delivered event carries the descendant's path and the original event's kind; history is not
    /// touched.
    pub(crate) fn notify_removal(&mut self, event: &Event, removed_path: &str) {
        let mut scoped = event.clone();
        scoped.path = removed_path.to_string();
        self.fan_out(&scoped);
    }

    fn fan_out(&mut self, event: &Event) {
        let event_path = event.path.clone();
        for ancestor in path::ancestors(&event_path) {
            self.deliver(ancestor, event);
        }
    }

    fn deliver(&mut self, watch_path: &str, event: &Event) {
        let Some(entries) = self.watchers.get_mut(watch_path) else {
            return;
        };
        let exact = watch_path == event.path;
        entries.retain(|entry| {
            if !(entry.recursive || exact) {
                return true;
            }
            // Fire-once: the watcher is deregistered whether the send lands or the consumer's
            // channel cannot accept it.
            if entry.sender.try_send(event.clone()).is_err() {
                log::debug!("watcher {} on {} dropped its event", entry.id, watch_path);
            }
            false
        });
        if entries.is_empty() {
            self.watchers.remove(watch_path);
        }
    }

    /// Deregisters a watcher. Unknown registrations, e.g. already-fired watchers, are a no-op.
    pub(crate) fn remove(&mut self, watch_path: &str, id: u64) {
        if let Some(entries) = self.watchers.get_mut(watch_path) {
            entries.retain(|entry| entry.id != id);
            if entries.is_empty() {
                self.watchers.remove(watch_path);
            }
        }
    }

    /// Drops every registered watcher and all retained history. Used on restore; watchers observe
    /// the reset as a disconnected channel.
    pub(crate) fn reset(&mut self) {
        self.watchers.clear();
        self.history = EventHistory::new(self.history.capacity());
    }
}

/// A fire-once subscription to events affecting a path, handed out by
/// [`KeyTree::watch`](crate::store::tree::KeyTree::watch).
pub struct Watcher {
    watch_path: String,
    registration: Option<u64>,
    receiver: Receiver<Event>,
    store: Weak<Shared>,
}

impl Watcher {
    pub(crate) fn new(
        watch_path: String,
        registration: Option<u64>,
        receiver: Receiver<Event>,
        store: Weak<Shared>,
    ) -> Watcher {
        Watcher {
            watch_path,
            registration,
            receiver,
            store,
        }
    }

    /// The canonical path this watcher was opened on.
    pub fn watch_path(&self) -> &str {
        &self.watch_path
    }

    /// The delivered event, if one has arrived.
    pub fn try_recv(&self) -> Option<Event> {
        self.receiver.try_recv().ok()
    }

    /// Blocks until the event arrives or `timeout` elapses.
    pub fn recv_timeout(&self, timeout: Duration) -> Option<Event> {
        self.receiver.recv_timeout(timeout).ok()
    }

    /// Deregisters the watcher. Cancelling after delivery, or cancelling a watcher that was served
    /// straight from history, is a no-op.
    pub fn cancel(&self) {
        let Some(id) = self.registration else {
            return;
        };
        if let Some(store) = self.store.upgrade() {
            let mut state = store.state.lock().unwrap();
            state.hub.remove(&self.watch_path, id);
        }
    }
}
