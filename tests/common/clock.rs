use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use keytree_rs::{Clock, Timestamp};

/// A clock that only moves when a test tells it to.
pub(crate) struct ManualClock {
    now_millis: AtomicU64,
}

impl ManualClock {
    pub(crate) fn new(start_millis: u64) -> Arc<ManualClock> {
        Arc::new(ManualClock {
            now_millis: AtomicU64::new(start_millis),
        })
    }

    pub(crate) fn advance(&self, millis: u64) {
        self.now_millis.fetch_add(millis, Ordering::SeqCst);
    }
}

impl Clock for ManualClock {
    fn now(&self) -> Timestamp {
        Timestamp::new(self.now_millis.load(Ordering::SeqCst))
    }
}
