/*
    Copyright © 2023, ParallelChain Lab
    Licensed under the Apache License, Version 2.0: http://www.apache.org/licenses/LICENSE-2.0
*/

//! The arena of file and directory nodes making up the hierarchical key space.
//!
//! Nodes reference one another by [`NodeId`] index into a slab instead of by owned pointers, which
//! removes the parent/child reference cycle entirely: parents name their children through an
//! insertion-ordered map, children carry their parent's id, and neither holds the other. Freed
//! slots are recycled through a free list so ids stay dense; anything that must survive slot reuse
//! (the expiration timers) carries a generation token on top of the id.

use indexmap::IndexMap;

use crate::types::basic::{LogIndex, Term, Timestamp};
use crate::types::path;

/// Index of a node in the arena.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub(crate) struct NodeId(usize);

/// What a node is. A node never switches kind over its lifetime.
pub(crate) enum NodeKind {
    File {
        value: String,
    },
    Directory {
        /// Child name (last path segment) to child node, in insertion order.
        children: IndexMap<String, NodeId>,
    },
}

pub(crate) struct Node {
    /// Canonical absolute path; the only form ever stored.
    pub(crate) path: String,
    pub(crate) kind: NodeKind,
    /// The containing directory; `None` only for the root.
    pub(crate) parent: Option<NodeId>,
    /// Name of the ACL entry governing this node; empty means unrestricted.
    pub(crate) acl: String,
    pub(crate) created_index: LogIndex,
    pub(crate) created_term: Term,
    /// Log position of the last write to this node's value or TTL. Child mutations leave it
    /// untouched.
    pub(crate) modified_index: LogIndex,
    pub(crate) modified_term: Term,
    /// Absolute instant of self-deletion; `None` means permanent.
    pub(crate) expire_at: Option<Timestamp>,
    /// Generation of the currently armed timer, when one exists.
    pub(crate) timer_generation: Option<u64>,
}

impl Node {
    pub(crate) fn new_file(
        path: String,
        value: String,
        index: LogIndex,
        term: Term,
        parent: Option<NodeId>,
        acl: String,
    ) -> Node {
        Node {
            path,
            kind: NodeKind::File { value },
            parent,
            acl,
            created_index: index,
            created_term: term,
            modified_index: index,
            modified_term: term,
            expire_at: None,
            timer_generation: None,
        }
    }

    pub(crate) fn new_directory(
        path: String,
        index: LogIndex,
        term: Term,
        parent: Option<NodeId>,
        acl: String,
    ) -> Node {
        Node {
            path,
            kind: NodeKind::Directory {
                children: IndexMap::new(),
            },
            parent,
            acl,
            created_index: index,
            created_term: term,
            modified_index: index,
            modified_term: term,
            expire_at: None,
            timer_generation: None,
        }
    }

    pub(crate) fn is_dir(&self) -> bool {
        matches!(self.kind, NodeKind::Directory { .. })
    }

    pub(crate) fn is_hidden(&self) -> bool {
        path::is_hidden(&self.path)
    }

    /// The node's value; `None` for directories.
    pub(crate) fn value(&self) -> Option<&str> {
        match &self.kind {
            NodeKind::File { value } => Some(value),
            NodeKind::Directory { .. } => None,
        }
    }

    /// The node's children; `None` for files.
    pub(crate) fn children(&self) -> Option<&IndexMap<String, NodeId>> {
        match &self.kind {
            NodeKind::Directory { children } => Some(children),
            NodeKind::File { .. } => None,
        }
    }

    pub(crate) fn children_mut(&mut self) -> Option<&mut IndexMap<String, NodeId>> {
        match &mut self.kind {
            NodeKind::Directory { children } => Some(children),
            NodeKind::File { .. } => None,
        }
    }
}

/// Slab of nodes with a free list. Lookups through a dangling id are an invariant violation and
/// terminate the process; the expiry path, which can legitimately race slot reuse, goes through
/// [`try_get`](NodeArena::try_get) instead.
pub(crate) struct NodeArena {
    slots: Vec<Option<Node>>,
    free: Vec<usize>,
}

impl NodeArena {
    pub(crate) fn new() -> NodeArena {
        NodeArena {
            slots: Vec::new(),
            free: Vec::new(),
        }
    }

    pub(crate) fn insert(&mut self, node: Node) -> NodeId {
        match self.free.pop() {
            Some(slot) => {
                self.slots[slot] = Some(node);
                NodeId(slot)
            }
            None => {
                self.slots.push(Some(node));
                NodeId(self.slots.len() - 1)
            }
        }
    }

    pub(crate) fn get(&self, id: NodeId) -> &Node {
        self.slots[id.0]
            .as_ref()
            .expect("node arena slot is empty: the tree referenced a removed node")
    }

    pub(crate) fn get_mut(&mut self, id: NodeId) -> &mut Node {
        self.slots[id.0]
            .as_mut()
            .expect("node arena slot is empty: the tree referenced a removed node")
    }

    pub(crate) fn try_get(&self, id: NodeId) -> Option<&Node> {
        self.slots.get(id.0).and_then(|slot| slot.as_ref())
    }

    pub(crate) fn remove(&mut self, id: NodeId) -> Node {
        let node = self.slots[id.0]
            .take()
            .expect("node arena slot is empty: the tree removed a node twice");
        self.free.push(id.0);
        node
    }

    pub(crate) fn clear(&mut self) {
        self.slots.clear();
        self.free.clear();
    }
}
