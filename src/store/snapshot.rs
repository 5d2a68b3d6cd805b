/*
    Copyright © 2023, ParallelChain Lab
    Licensed under the Apache License, Version 2.0: http://www.apache.org/licenses/LICENSE-2.0
*/

//! The portable snapshot representation of the tree.
//!
//! Each node serializes into a record carrying its path, value, kind, ACL tag, expiration and
//! (index, term) stamps, with its children nested as a list inside the record. Parent references
//! and timer handles are deliberately absent: nesting already encodes containment, so parents are
//! re-derived on restore and timers are re-armed from the surviving expirations. Serialization is
//! Borsh, which keeps the byte representation deterministic across replicas.

use borsh::{BorshDeserialize, BorshSerialize};
use std::fmt::{self, Display, Formatter};

use crate::expiry::TimerQueue;
use crate::types::basic::{LogIndex, Term, Timestamp};
use crate::types::path;

use super::node::{Node, NodeId};
use super::tree::State;

/// A serialized store: the whole tree plus the (index, term) of the last applied operation.
#[derive(BorshDeserialize, BorshSerialize)]
pub(crate) struct Snapshot {
    pub(crate) index: LogIndex,
    pub(crate) term: Term,
    pub(crate) root: SnapshotNode,
}

/// One node's record. `value` is `None` exactly when `dir` is set.
#[derive(BorshDeserialize, BorshSerialize)]
pub(crate) struct SnapshotNode {
    pub(crate) path: String,
    pub(crate) value: Option<String>,
    pub(crate) dir: bool,
    pub(crate) acl: String,
    pub(crate) expire_at: Option<Timestamp>,
    pub(crate) created_index: LogIndex,
    pub(crate) created_term: Term,
    pub(crate) modified_index: LogIndex,
    pub(crate) modified_term: Term,
    pub(crate) children: Vec<SnapshotNode>,
}

impl Snapshot {
    pub(crate) fn capture(state: &State) -> Snapshot {
        Snapshot {
            index: state.index,
            term: state.term,
            root: capture_node(state, state.root),
        }
    }
}

fn capture_node(state: &State, id: NodeId) -> SnapshotNode {
    let node = state.arena.get(id);
    SnapshotNode {
        path: node.path.clone(),
        value: node.value().map(String::from),
        dir: node.is_dir(),
        acl: node.acl.clone(),
        expire_at: node.expire_at,
        created_index: node.created_index,
        created_term: node.created_term,
        modified_index: node.modified_index,
        modified_term: node.modified_term,
        children: node
            .children()
            .map(|children| {
                children
                    .values()
                    .map(|&child| capture_node(state, child))
                    .collect()
            })
            .unwrap_or_default(),
    }
}

impl State {
    /// Replaces the tree with a snapshot's contents. Nodes whose expiration has already passed are
    /// dropped together with their subtrees; the rest re-arm their timers. Watchers and cached
    /// permissions do not survive a rebuild.
    pub(crate) fn rebuild(&mut self, snapshot: Snapshot, now: Timestamp, timers: &TimerQueue) {
        self.arena.clear();
        self.perm_cache.clear();
        self.hub.reset();
        self.index = snapshot.index;
        self.term = snapshot.term;

        let mut dropped = 0u64;
        self.root = self
            .restore_node(snapshot.root, None, now, timers, &mut dropped)
            .expect("the root of a snapshot is permanent");
        if dropped > 0 {
            log::debug!(
                "Restore, {}, dropped {} already-expired nodes",
                self.index.int(),
                dropped
            );
        }
    }

    fn restore_node(
        &mut self,
        record: SnapshotNode,
        parent: Option<NodeId>,
        now: Timestamp,
        timers: &TimerQueue,
        dropped: &mut u64,
    ) -> Option<NodeId> {
        if let Some(due) = record.expire_at {
            if due <= now {
                *dropped += 1;
                return None;
            }
        }

        let mut node = if record.dir {
            Node::new_directory(
                record.path,
                record.created_index,
                record.created_term,
                parent,
                record.acl,
            )
        } else {
            Node::new_file(
                record.path,
                record.value.unwrap_or_default(),
                record.created_index,
                record.created_term,
                parent,
                record.acl,
            )
        };
        node.modified_index = record.modified_index;
        node.modified_term = record.modified_term;
        let id = self.arena.insert(node);

        if let Some(due) = record.expire_at {
            self.arm_timer(timers, id, due);
        }

        for child_record in record.children {
            let name = path::last_segment(&child_record.path).to_string();
            if let Some(child) = self.restore_node(child_record, Some(id), now, timers, dropped) {
                self.arena
                    .get_mut(id)
                    .children_mut()
                    .expect("a snapshot record with children describes a directory")
                    .insert(name, child);
            }
        }
        Some(id)
    }
}

/// Error rebuilding a store from snapshot bytes.
#[derive(Debug)]
pub enum SnapshotError {
    Decode(std::io::Error),
}

impl Display for SnapshotError {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            SnapshotError::Decode(source) => write!(f, "snapshot bytes did not decode: {}", source),
        }
    }
}

impl std::error::Error for SnapshotError {}
