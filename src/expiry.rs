/*
    Copyright © 2023, ParallelChain Lab
    Licensed under the Apache License, Version 2.0: http://www.apache.org/licenses/LICENSE-2.0
*/

//! The timer machinery behind node expiration.
//!
//! Every TTL-bearing node owns one logical timer. Rather than a waiter task per node, all timers
//! are multiplexed through a single thread draining a min-heap ordered by due instant. Cancellation
//! is lazy: re-arming or cancelling bumps the node's generation token, turning the old heap entry
//! into a tombstone that is discarded when it pops.
//!
//! The thread never holds the heap lock while it touches the tree. When an entry comes due it is
//! popped, the heap lock is released, and the entry is handed to
//! [`Shared::apply_expiry`](crate::store::tree::Shared::apply_expiry), which re-acquires the tree
//! lock and re-validates the node's identity, generation and due instant before removing anything.
//! A firing that lost a race against an update or delete is therefore a silent no-op.
//!
//! The thread is joined when the owning store is dropped, after a shutdown flag is raised through
//! the queue.

use std::cmp::Reverse;
use std::collections::BinaryHeap;
use std::sync::{Arc, Condvar, Mutex, Weak};
use std::thread::{self, JoinHandle};
use std::time::Duration;

use crate::environment::Clock;
use crate::store::node::NodeId;
use crate::store::tree::Shared;
use crate::types::basic::Timestamp;

/// One armed timer. `generation` ties the entry to a specific arming of a specific node; a node
/// whose generation has moved on treats the entry as a tombstone.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub(crate) struct TimerEntry {
    pub(crate) due: Timestamp,
    pub(crate) generation: u64,
    pub(crate) node: NodeId,
}

pub(crate) struct TimerQueue {
    inner: Mutex<TimerQueueInner>,
    wakeup: Condvar,
}

struct TimerQueueInner {
    heap: BinaryHeap<Reverse<TimerEntry>>,
    shutdown: bool,
}

impl TimerQueue {
    pub(crate) fn new() -> TimerQueue {
        TimerQueue {
            inner: Mutex::new(TimerQueueInner {
                heap: BinaryHeap::new(),
                shutdown: false,
            }),
            wakeup: Condvar::new(),
        }
    }

    /// Queues an armed timer. Always called with the tree lock held, so arming is ordered with
    /// respect to the mutation that set the node's expiration.
    pub(crate) fn arm(&self, entry: TimerEntry) {
        let mut inner = self.inner.lock().unwrap();
        inner.heap.push(Reverse(entry));
        self.wakeup.notify_all();
    }

    /// Discards every queued entry. Used on restore, where the surviving nodes re-arm from scratch.
    pub(crate) fn clear(&self) {
        let mut inner = self.inner.lock().unwrap();
        inner.heap.clear();
    }

    pub(crate) fn shutdown(&self) {
        let mut inner = self.inner.lock().unwrap();
        inner.shutdown = true;
        self.wakeup.notify_all();
    }
}

/// Owns the timer thread; joined on drop of the store.
pub(crate) struct Expirer {
    handle: Option<JoinHandle<()>>,
}

impl Expirer {
    pub(crate) fn start(
        queue: Arc<TimerQueue>,
        store: Weak<Shared>,
        clock: Arc<dyn Clock>,
    ) -> Expirer {
        let handle = thread::spawn(move || run_timer_loop(queue, store, clock));
        Expirer {
            handle: Some(handle),
        }
    }

    pub(crate) fn join(&mut self) {
        if let Some(handle) = self.handle.take() {
            let _ = handle.join();
        }
    }
}

fn run_timer_loop(queue: Arc<TimerQueue>, store: Weak<Shared>, clock: Arc<dyn Clock>) {
    loop {
        let due_entry = {
            let mut inner = queue.inner.lock().unwrap();
            loop {
                if inner.shutdown {
                    return;
                }
                let now = clock.now();
                let next = inner.heap.peek().map(|queued| queued.0);
                match next {
                    None => {
                        inner = queue.wakeup.wait(inner).unwrap();
                    }
                    Some(entry) if entry.due > now => {
                        let wait = entry.due.saturating_since(now).max(Duration::from_millis(1));
                        inner = queue.wakeup.wait_timeout(inner, wait).unwrap().0;
                    }
                    Some(_) => {
                        break inner.heap.pop().unwrap().0;
                    }
                }
            }
        };

        match store.upgrade() {
            Some(shared) => shared.apply_expiry(due_entry),
            None => return,
        }
    }
}
