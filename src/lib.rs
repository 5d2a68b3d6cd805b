/*
    Copyright © 2023, ParallelChain Lab
    Licensed under the Apache License, Version 2.0: http://www.apache.org/licenses/LICENSE-2.0
*/

//! KeyTree-rs is the in-memory hierarchical key-value store that backs a replicated
//! configuration and coordination service.
//!
//! Clients identify data by slash-delimited paths; each path either holds a value (a file node) or
//! contains children (a directory node). Every mutation produces an ordered [event](events::Event),
//! is subject to per-node access control resolved against grants stored under `/ACL`, may carry a
//! time-to-live, and is observable by registered [watchers](watch::hub::Watcher). The replication layer feeds a monotonically
//! increasing (index, term) pair into every operation; the store is deterministic, so independent
//! replicas applying the same operation sequence reach byte-identical state.
//!
//! The replication layer consumes the store through [`KeyTree`]: `get`, `create`, `create_dir`,
//! `update`, `compare_and_swap`, `delete`, `watch`, `save` and `restore`. Consensus, transport and
//! durability live outside this crate; the only environment inputs are the injected
//! [clock](environment::Clock) and [identity hook](environment::IdentityProvider).

pub mod config;

pub mod environment;

pub mod errors;

pub mod events;

pub(crate) mod expiry;

pub mod logging;

pub mod store;

pub mod types;

pub mod watch;

pub mod wire;

// Re-exports
pub use config::StoreConfig;
pub use environment::{Clock, IdentityProvider, StaticIdentity, SystemClock};
pub use errors::StoreError;
pub use events::{ChildInfo, Event, EventKind};
pub use store::snapshot::SnapshotError;
pub use store::tree::KeyTree;
pub use types::basic::{LogIndex, Term, Timestamp};
pub use watch::hub::Watcher;
