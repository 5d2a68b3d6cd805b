/*
    Copyright © 2023, ParallelChain Lab
    Licensed under the Apache License, Version 2.0: http://www.apache.org/licenses/LICENSE-2.0
*/

//! Records that describe a single applied operation.
//!
//! ## The event struct
//!
//! Every operation the store applies, reads included, produces exactly one [`Event`]. An event names
//! the [kind](EventKind) of operation, the canonical path it affected, the value transition it
//! caused, and the ([`LogIndex`], [`Term`]) pair the replication layer assigned to the operation.
//! TTL-bearing mutations additionally carry the absolute expiration and the remaining whole seconds.
//!
//! Events are immutable once emitted. Mutation events are recorded in the bounded
//! [event history](crate::watch::history::EventHistory) and fanned out to
//! [watchers](crate::watch::hub::Watcher); read events are only returned to the caller.
//!
//! ## Directory listings
//!
//! A read of a directory populates [`children`](Event::children) with one [`ChildInfo`] per
//! non-hidden child. Non-recursive reads mark child directories with `dir == true` but leave their
//! nested lists empty; recursive reads nest the whole subtree. Listings are in insertion order
//! unless the caller asked for a sorted read, in which case every level is sorted lexicographically
//! by key.

use crate::types::basic::{LogIndex, Term, Timestamp};

/// The operation an [`Event`] records.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum EventKind {
    Get,
    Create,
    Update,
    Delete,
    CompareAndSwap,
    Expire,
}

/// Immutable record of one applied operation.
#[derive(Clone, Debug, PartialEq)]
pub struct Event {
    pub kind: EventKind,
    /// Canonical path of the affected node.
    pub path: String,
    /// The node's value after the operation, where one applies.
    pub value: Option<String>,
    /// The node's value before the operation, for mutations of existing files.
    pub prev_value: Option<String>,
    /// Whether the affected node is a directory.
    pub dir: bool,
    /// Listing snapshot for directory reads; empty otherwise.
    pub children: Vec<ChildInfo>,
    /// Log position of the operation that produced this event.
    pub index: LogIndex,
    pub term: Term,
    /// Absolute instant at which the node self-deletes, when it carries a TTL.
    pub expiration: Option<Timestamp>,
    /// Remaining whole seconds until expiration at the time the event was produced.
    pub ttl: Option<i64>,
}

impl Event {
    /// A bare event of the given kind; value, listing and TTL fields start out unset.
    pub(crate) fn new(kind: EventKind, path: String, index: LogIndex, term: Term) -> Event {
        Event {
            kind,
            path,
            value: None,
            prev_value: None,
            dir: false,
            children: Vec::new(),
            index,
            term,
            expiration: None,
            ttl: None,
        }
    }
}

/// One entry of a directory listing snapshot.
#[derive(Clone, Debug, PartialEq)]
pub struct ChildInfo {
    /// Canonical path of the child.
    pub key: String,
    /// The child's value, for files.
    pub value: Option<String>,
    pub dir: bool,
    /// Nested listing, populated only for recursive reads of child directories.
    pub children: Vec<ChildInfo>,
}
