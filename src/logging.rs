/*
    Copyright © 2023, ParallelChain Lab
    Licensed under the Apache License, Version 2.0: http://www.apache.org/licenses/LICENSE-2.0
*/

//! Log lines for applied operations.
//!
//! The store logs through the [log](https://docs.rs/log/latest/log/) crate. To get these messages
//! printed onto a terminal or into a file, set up a
//! [logging implementation](https://docs.rs/log/latest/log/#available-logging-implementations).
//!
//! Log messages are CSVs with at least three values: the operation name in PascalCase (defined in
//! this module as constants), the log index of the operation, and the affected path. Mutations log
//! at `info`; reads and internal housekeeping (stale timer firings, dropped watchers, restore
//! summaries) log at `debug`.

use crate::events::{Event, EventKind};

// Names of each operation in PascalCase for printing:
pub const GET: &str = "Get";
pub const CREATE: &str = "Create";
pub const UPDATE: &str = "Update";
pub const DELETE: &str = "Delete";
pub const COMPARE_AND_SWAP: &str = "CompareAndSwap";
pub const EXPIRE: &str = "Expire";

/// The PascalCase name of an event's operation.
pub const fn kind_name(kind: EventKind) -> &'static str {
    match kind {
        EventKind::Get => GET,
        EventKind::Create => CREATE,
        EventKind::Update => UPDATE,
        EventKind::Delete => DELETE,
        EventKind::CompareAndSwap => COMPARE_AND_SWAP,
        EventKind::Expire => EXPIRE,
    }
}

/// Logs a committed mutation event.
pub(crate) fn log_applied(event: &Event) {
    log::info!(
        "{}, {}, {}, {}",
        kind_name(event.kind),
        event.index.int(),
        event.term.int(),
        event.path
    )
}
