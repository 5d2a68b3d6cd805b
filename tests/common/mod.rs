pub(crate) mod clock;

pub(crate) mod identity;

pub(crate) mod logging;

use keytree_rs::{KeyTree, LogIndex, StoreConfig, Term};

/// A store with the default configuration: system clock, static `admin` identity, history of 1000.
pub(crate) fn new_store() -> KeyTree {
    KeyTree::new(StoreConfig::default())
}

pub(crate) fn index(int: u64) -> LogIndex {
    LogIndex::new(int)
}

pub(crate) fn term(int: u64) -> Term {
    Term::new(int)
}
