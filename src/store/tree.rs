/*
    Copyright © 2023, ParallelChain Lab
    Licensed under the Apache License, Version 2.0: http://www.apache.org/licenses/LICENSE-2.0
*/

//! The [`KeyTree`]: the public façade over the hierarchical key space.
//!
//! ## Operations
//!
//! The replication layer consumes the store as a library through [`get`](KeyTree::get),
//! [`create`](KeyTree::create), [`create_dir`](KeyTree::create_dir), [`update`](KeyTree::update),
//! [`compare_and_swap`](KeyTree::compare_and_swap), [`delete`](KeyTree::delete),
//! [`watch`](KeyTree::watch), [`save`](KeyTree::save) and [`restore`](KeyTree::restore). Each
//! applied operation carries the ([`LogIndex`], [`Term`]) pair the replication layer assigned to
//! it; the store records the pair before doing anything else, reads included, so every event it
//! emits is tagged with the operation that produced it.
//!
//! Operations return an [`Event`] or a typed [`StoreError`]; they never panic across the API
//! boundary. Determinism is the contract: independent replicas applying the same operation
//! sequence reach byte-identical state.
//!
//! ## Locking
//!
//! Operations are delivered sequentially by the replication layer and applied under one exclusive
//! lock covering the whole tree, the watcher hub and the event history. Watcher delivery is a
//! non-blocking bounded send, so nothing inside the lock ever waits on a consumer. The expiration
//! timer thread mutates the tree only through [`Shared::apply_expiry`], which takes the same lock.

use std::sync::{Arc, Mutex, MutexGuard};

use crate::config::StoreConfig;
use crate::environment::{Clock, IdentityProvider};
use crate::errors::StoreError;
use crate::events::{ChildInfo, Event, EventKind};
use crate::expiry::{Expirer, TimerEntry, TimerQueue};
use crate::logging;
use crate::types::basic::{LogIndex, Term, Timestamp};
use crate::types::path;
use crate::watch::hub::{Watcher, WatcherHub};

use super::acl;
use super::node::{Node, NodeArena, NodeId, NodeKind};
use super::snapshot::{Snapshot, SnapshotError};

/// The in-memory hierarchical key-value store.
///
/// Dropping the store shuts down and joins its timer thread.
pub struct KeyTree {
    shared: Arc<Shared>,
    expirer: Expirer,
}

/// State shared between the store handle and the timer thread.
pub(crate) struct Shared {
    pub(crate) state: Mutex<State>,
    pub(crate) timers: Arc<TimerQueue>,
    pub(crate) clock: Arc<dyn Clock>,
    pub(crate) identity: Arc<dyn IdentityProvider>,
}

/// Everything guarded by the tree lock.
pub(crate) struct State {
    pub(crate) arena: NodeArena,
    pub(crate) root: NodeId,
    pub(crate) index: LogIndex,
    pub(crate) term: Term,
    pub(crate) hub: WatcherHub,
    pub(crate) perm_cache: std::collections::HashMap<(String, char, String), bool>,
    /// Source of timer generation tokens; strictly increasing over the store's lifetime.
    pub(crate) timer_generation: u64,
}

impl KeyTree {
    pub fn new(config: StoreConfig) -> KeyTree {
        let timers = Arc::new(TimerQueue::new());

        let mut arena = NodeArena::new();
        let root = arena.insert(Node::new_directory(
            String::from("/"),
            LogIndex::new(0),
            Term::new(0),
            None,
            String::new(),
        ));

        let shared = Arc::new(Shared {
            state: Mutex::new(State {
                arena,
                root,
                index: LogIndex::new(0),
                term: Term::new(0),
                hub: WatcherHub::new(config.history_capacity),
                perm_cache: std::collections::HashMap::new(),
                timer_generation: 0,
            }),
            timers: Arc::clone(&timers),
            clock: Arc::clone(&config.clock),
            identity: Arc::clone(&config.identity),
        });

        let expirer = Expirer::start(timers, Arc::downgrade(&shared), config.clock);

        KeyTree { shared, expirer }
    }

    /// Reads the node at `path`.
    ///
    /// For a file the returned event carries the value; for a directory it carries a listing
    /// snapshot with hidden children omitted, sorted lexicographically per level when `sorted` is
    /// set, and nested all the way down when `recursive` is set. Requires `r` permission on the
    /// target and, for recursive reads, on every visited descendant. Reads never mutate the tree
    /// and never arm timers.
    pub fn get(
        &self,
        node_path: &str,
        recursive: bool,
        sorted: bool,
        index: LogIndex,
        term: Term,
    ) -> Result<Event, StoreError> {
        let canonical = path::normalize(node_path)?;
        let user = self.shared.identity.current_user();

        let mut state = self.lock_state();
        state.advance(index, term);
        let id = state.lookup(&canonical)?;
        state.has_perm(id, "r", recursive, &user)?;

        let node = state.arena.get(id);
        let mut event = Event::new(EventKind::Get, canonical, index, term);
        if node.is_dir() {
            event.dir = true;
            event.children = state.list_children(id, recursive, sorted);
        } else {
            event.value = node.value().map(String::from);
        }
        log::debug!("{}, {}, {}, {}", logging::GET, index.int(), term.int(), event.path);
        Ok(event)
    }

    /// Creates a file (non-empty `value`) or a directory (empty `value`) at `path`.
    ///
    /// Missing intermediate directories are created permanent, inheriting their parent's ACL and
    /// stamped with this operation's index and term. Requires `w` permission against the closest
    /// existing ancestor, since that ancestor's ACL is what the auto-created directories inherit.
    /// Fails with [`StoreError::NodeExists`] if the full path already resolves and
    /// [`StoreError::NotDir`] if a file sits on the way.
    pub fn create(
        &self,
        node_path: &str,
        value: &str,
        expire_at: Option<Timestamp>,
        index: LogIndex,
        term: Term,
    ) -> Result<Event, StoreError> {
        let canonical = path::normalize(node_path)?;
        let user = self.shared.identity.current_user();
        let now = self.shared.clock.now();

        let mut state = self.lock_state();
        state.advance(index, term);

        match state.lookup(&canonical) {
            Ok(_) => {
                return Err(StoreError::NodeExists { path: canonical });
            }
            Err(StoreError::KeyNotFound { .. }) => {}
            Err(walk_error) => return Err(walk_error),
        }

        state.has_perm_on_parent(&canonical, "w", &user)?;

        let parent = state.build_directories(&canonical, index, term);
        let parent_node = state.arena.get(parent);
        let inherited_acl = parent_node.acl.clone();
        let name = path::last_segment(&canonical).to_string();

        let node = if value.is_empty() {
            Node::new_directory(canonical.clone(), index, term, Some(parent), inherited_acl)
        } else {
            Node::new_file(
                canonical.clone(),
                value.to_string(),
                index,
                term,
                Some(parent),
                inherited_acl,
            )
        };
        let id = state.arena.insert(node);
        state
            .arena
            .get_mut(parent)
            .children_mut()
            .expect("the closest existing ancestor of a created node is a directory")
            .insert(name, id);

        let mut event = Event::new(EventKind::Create, canonical, index, term);
        if value.is_empty() {
            event.dir = true;
        } else {
            event.value = Some(value.to_string());
        }

        if let Some(due) = expire_at {
            state.arm_timer(&self.shared.timers, id, due);
            event.expiration = Some(due);
            event.ttl = Some(due.seconds_until(now));
        }

        state.committed(&event);
        Ok(event)
    }

    /// [`create`](KeyTree::create) with an empty value.
    pub fn create_dir(
        &self,
        node_path: &str,
        expire_at: Option<Timestamp>,
        index: LogIndex,
        term: Term,
    ) -> Result<Event, StoreError> {
        self.create(node_path, "", expire_at, index, term)
    }

    /// Updates the value and/or TTL of the node at `path`, which must already exist.
    ///
    /// Directories accept only TTL changes; supplying a non-empty value for one fails with
    /// [`StoreError::NotFile`]. For files the value is replaced only when the supplied value is
    /// non-empty. Either way a successful update bumps the node's modified index and term, cancels
    /// any armed timer, and arms a fresh one iff `expire_at` is set. Requires `w` permission on the
    /// target.
    pub fn update(
        &self,
        node_path: &str,
        value: &str,
        expire_at: Option<Timestamp>,
        index: LogIndex,
        term: Term,
    ) -> Result<Event, StoreError> {
        let canonical = path::normalize(node_path)?;
        // The root is permanent and never deleted, so it cannot take a TTL.
        if canonical == "/" && expire_at.is_some() {
            return Err(StoreError::DirNotEmpty { path: canonical });
        }
        let user = self.shared.identity.current_user();
        let now = self.shared.clock.now();

        let mut state = self.lock_state();
        state.advance(index, term);
        let id = state.lookup(&canonical)?;
        state.has_perm(id, "w", false, &user)?;

        let node = state.arena.get(id);
        let mut event = Event::new(EventKind::Update, canonical.clone(), index, term);
        if node.is_dir() {
            if !value.is_empty() {
                return Err(StoreError::NotFile { path: canonical });
            }
            event.dir = true;
        } else {
            event.prev_value = node.value().map(String::from);
            if !value.is_empty() {
                event.value = Some(value.to_string());
            }
        }

        state.write_node(id, value, index, term);
        state.cancel_timer(id);
        if let Some(due) = expire_at {
            state.arm_timer(&self.shared.timers, id, due);
            event.expiration = Some(due);
            event.ttl = Some(due.seconds_until(now));
        }

        state.committed(&event);
        Ok(event)
    }

    /// Atomic conditional update of the file at `path`.
    ///
    /// The guard matches when the supplied `prev_value` equals the stored value and/or the supplied
    /// `prev_index` equals the stored modified index. An empty `prev_value` and a zero `prev_index`
    /// each mean "don't care", but at least one guard must be supplied; when both are, both must
    /// match. A mismatch fails with [`StoreError::CompareFailed`] carrying `[requested/actual]`
    /// pairs. On success this behaves like [`update`](KeyTree::update). Requires `rw` permission on
    /// the target and fails with [`StoreError::NotFile`] on directories.
    pub fn compare_and_swap(
        &self,
        node_path: &str,
        prev_value: &str,
        prev_index: LogIndex,
        value: &str,
        expire_at: Option<Timestamp>,
        index: LogIndex,
        term: Term,
    ) -> Result<Event, StoreError> {
        let canonical = path::normalize(node_path)?;
        let user = self.shared.identity.current_user();
        let now = self.shared.clock.now();

        let mut state = self.lock_state();
        state.advance(index, term);
        let id = state.lookup(&canonical)?;

        let node = state.arena.get(id);
        if node.is_dir() {
            return Err(StoreError::NotFile { path: canonical });
        }
        state.has_perm(id, "rw", false, &user)?;

        let node = state.arena.get(id);
        let current_value = node
            .value()
            .expect("compare-and-swap target is a file")
            .to_string();
        let current_index = node.modified_index;

        let value_guard = !prev_value.is_empty();
        let index_guard = prev_index.int() != 0;
        let matched = match (value_guard, index_guard) {
            (false, false) => false,
            (true, false) => prev_value == current_value,
            (false, true) => prev_index == current_index,
            (true, true) => prev_value == current_value && prev_index == current_index,
        };
        if !matched {
            let cause = format!(
                "[{}/{}] [{}/{}]",
                prev_value,
                current_value,
                prev_index.int(),
                current_index.int()
            );
            return Err(StoreError::CompareFailed { cause });
        }

        let mut event = Event::new(EventKind::CompareAndSwap, canonical, index, term);
        event.prev_value = Some(current_value);
        if !value.is_empty() {
            event.value = Some(value.to_string());
        }

        state.write_node(id, value, index, term);
        state.cancel_timer(id);
        if let Some(due) = expire_at {
            state.arm_timer(&self.shared.timers, id, due);
            event.expiration = Some(due);
            event.ttl = Some(due.seconds_until(now));
        }

        state.committed(&event);
        Ok(event)
    }

    /// Deletes the node at `path`.
    ///
    /// Directories with children require `recursive`; the root is never deleted. Removal is
    /// post-order: every descendant's timer is cancelled as it detaches, and each removed
    /// descendant fans out one synthetic notification scoped to its own path, so recursive watchers
    /// observe every removal. The returned event describes the top-level node and is the only one
    /// recorded in history. Requires `w` permission on the parent and, for recursive deletes, on
    /// the subtree root as well.
    pub fn delete(
        &self,
        node_path: &str,
        recursive: bool,
        index: LogIndex,
        term: Term,
    ) -> Result<Event, StoreError> {
        let canonical = path::normalize(node_path)?;
        if canonical == "/" {
            return Err(StoreError::DirNotEmpty { path: canonical });
        }
        let user = self.shared.identity.current_user();

        let mut state = self.lock_state();
        state.advance(index, term);
        let id = state.lookup(&canonical)?;

        let parent = state
            .arena
            .get(id)
            .parent
            .expect("a non-root node has a parent");
        state.has_perm(parent, "w", false, &user)?;
        if recursive {
            state.has_perm(id, "w", false, &user)?;
        }

        let node = state.arena.get(id);
        let mut event = Event::new(EventKind::Delete, canonical.clone(), index, term);
        if node.is_dir() {
            let occupied = node
                .children()
                .map(|children| !children.is_empty())
                .unwrap_or(false);
            if occupied && !recursive {
                return Err(StoreError::DirNotEmpty { path: canonical });
            }
            event.dir = true;
        } else {
            event.prev_value = node.value().map(String::from);
        }

        state.remove_subtree(id, &event);
        state.committed(&event);
        Ok(event)
    }

    /// Opens a fire-once subscription to events affecting `path` (or, with `recursive`, its whole
    /// subtree). A non-zero `since` first scans the event history; a hit is delivered immediately.
    /// Watching does not count as an applied operation and leaves the store's index untouched.
    pub fn watch(
        &self,
        node_path: &str,
        recursive: bool,
        since: LogIndex,
    ) -> Result<Watcher, StoreError> {
        let canonical = path::normalize(node_path)?;
        let mut state = self.lock_state();
        let (receiver, registration) = state.hub.watch(canonical.clone(), recursive, since);
        Ok(Watcher::new(
            canonical,
            registration,
            receiver,
            Arc::downgrade(&self.shared),
        ))
    }

    /// Serializes the whole tree and the current (index, term) into a portable snapshot. Timer
    /// handles, parent references and watcher state are not part of the snapshot; they are
    /// reconstructed on [`restore`](KeyTree::restore).
    pub fn save(&self) -> Vec<u8> {
        let state = self.lock_state();
        let snapshot = Snapshot::capture(&state);
        borsh::to_vec(&snapshot).expect("an in-memory snapshot serializes without error")
    }

    /// Replaces the store's contents with a snapshot produced by [`save`](KeyTree::save).
    ///
    /// Nodes whose expiration already passed are dropped, timers are re-armed for the surviving
    /// TTL-bearing nodes, and the watcher hub is reset empty; watchers registered before the
    /// restore observe a disconnected channel.
    pub fn restore(&self, bytes: &[u8]) -> Result<(), SnapshotError> {
        let snapshot: Snapshot = borsh::from_slice(bytes).map_err(SnapshotError::Decode)?;
        let now = self.shared.clock.now();

        let mut state = self.lock_state();
        self.shared.timers.clear();
        state.rebuild(snapshot, now, &self.shared.timers);
        Ok(())
    }

    /// Assigns the ACL entry name governing the node at `path`.
    ///
    /// Administrative: no event is emitted and the store's (index, term) is untouched.
    pub fn set_acl(&self, node_path: &str, acl: &str) -> Result<(), StoreError> {
        let canonical = path::normalize(node_path)?;
        let mut state = self.lock_state();
        let id = state.lookup(&canonical)?;
        state.arena.get_mut(id).acl = acl.to_string();
        state.perm_cache.clear();
        Ok(())
    }

    /// The (index, term) of the most recently applied operation.
    pub fn current_index(&self) -> (LogIndex, Term) {
        let state = self.lock_state();
        (state.index, state.term)
    }

    fn lock_state(&self) -> MutexGuard<'_, State> {
        self.shared.state.lock().unwrap()
    }
}

impl Drop for KeyTree {
    fn drop(&mut self) {
        self.shared.timers.shutdown();
        self.expirer.join();
    }
}

impl Shared {
    /// Applies a fired timer: if the node still exists, still carries this entry's generation and
    /// still expires at this entry's instant, its subtree is removed with kind
    /// [`Expire`](EventKind::Expire) at the store's current (index, term). Stale firings are
    /// silent no-ops.
    pub(crate) fn apply_expiry(&self, entry: TimerEntry) {
        let mut state = self.state.lock().unwrap();

        let still_armed = state.arena.try_get(entry.node).is_some_and(|node| {
            node.timer_generation == Some(entry.generation) && node.expire_at == Some(entry.due)
        });
        if !still_armed {
            log::debug!("{}, stale timer firing skipped", logging::EXPIRE);
            return;
        }

        let node = state.arena.get(entry.node);
        let mut event = Event::new(EventKind::Expire, node.path.clone(), state.index, state.term);
        if node.is_dir() {
            event.dir = true;
        } else {
            event.prev_value = node.value().map(String::from);
        }

        state.remove_subtree(entry.node, &event);
        state.committed(&event);
    }
}

impl State {
    /// Records the (index, term) the replication layer assigned to the operation being applied.
    pub(crate) fn advance(&mut self, index: LogIndex, term: Term) {
        self.index = index;
        self.term = term;
    }

    /// Resolves a canonical path to a node, failing with [`StoreError::KeyNotFound`] on a missing
    /// segment and [`StoreError::NotDir`] when a file sits on the way.
    pub(crate) fn lookup(&self, canonical: &str) -> Result<NodeId, StoreError> {
        let mut current = self.root;
        for segment in path::segments(canonical) {
            let node = self.arena.get(current);
            let children = match &node.kind {
                NodeKind::Directory { children } => children,
                NodeKind::File { .. } => {
                    return Err(StoreError::NotDir {
                        path: node.path.clone(),
                    })
                }
            };
            match children.get(segment) {
                Some(&child) => current = child,
                None => {
                    return Err(StoreError::KeyNotFound {
                        path: path::join(&node.path, segment),
                    })
                }
            }
        }
        Ok(current)
    }

    /// Walks the directory portion of `canonical`, creating missing intermediate directories as
    /// permanent nodes that inherit their parent's ACL, and returns the direct parent.
    ///
    /// The caller has already established that no file sits on the walk.
    fn build_directories(&mut self, canonical: &str, index: LogIndex, term: Term) -> NodeId {
        let mut current = self.root;
        for segment in path::segments(path::parent(canonical)) {
            let current_node = self.arena.get(current);
            if let Some(&existing) = current_node
                .children()
                .expect("intermediate segments of a creation path are directories")
                .get(segment)
            {
                current = existing;
                continue;
            }

            let dir_path = path::join(&current_node.path, segment);
            let inherited_acl = current_node.acl.clone();
            let segment = segment.to_string();
            let id = self.arena.insert(Node::new_directory(
                dir_path,
                index,
                term,
                Some(current),
                inherited_acl,
            ));
            self.arena
                .get_mut(current)
                .children_mut()
                .expect("intermediate segments of a creation path are directories")
                .insert(segment, id);
            current = id;
        }
        current
    }

    /// Listing snapshot of a directory's non-hidden children.
    fn list_children(&self, id: NodeId, recursive: bool, sorted: bool) -> Vec<ChildInfo> {
        let node = self.arena.get(id);
        let children = match node.children() {
            Some(children) => children,
            None => return Vec::new(),
        };

        let mut listing = Vec::with_capacity(children.len());
        for &child_id in children.values() {
            let child = self.arena.get(child_id);
            if child.is_hidden() {
                continue;
            }
            listing.push(ChildInfo {
                key: child.path.clone(),
                value: child.value().map(String::from),
                dir: child.is_dir(),
                children: if recursive && child.is_dir() {
                    self.list_children(child_id, recursive, sorted)
                } else {
                    Vec::new()
                },
            });
        }
        if sorted {
            listing.sort_by(|a, b| a.key.cmp(&b.key));
        }
        listing
    }

    /// Applies a value write to a file (non-empty `value` only) and bumps the modified stamp.
    fn write_node(&mut self, id: NodeId, value: &str, index: LogIndex, term: Term) {
        let node = self.arena.get_mut(id);
        if let NodeKind::File { value: stored } = &mut node.kind {
            if !value.is_empty() {
                *stored = value.to_string();
            }
        }
        node.modified_index = index;
        node.modified_term = term;
    }

    pub(crate) fn arm_timer(&mut self, timers: &TimerQueue, id: NodeId, due: Timestamp) {
        self.timer_generation += 1;
        let generation = self.timer_generation;
        let node = self.arena.get_mut(id);
        node.expire_at = Some(due);
        node.timer_generation = Some(generation);
        timers.arm(TimerEntry {
            due,
            generation,
            node: id,
        });
    }

    /// Makes the node permanent again. The queued heap entry, if any, becomes a tombstone that the
    /// timer thread discards when it pops.
    fn cancel_timer(&mut self, id: NodeId) {
        let node = self.arena.get_mut(id);
        node.expire_at = None;
        node.timer_generation = None;
    }

    /// Post-order removal of a subtree. Descendants fan out synthetic notifications scoped to
    /// their own paths; the top-level node's event is recorded by the caller through
    /// [`committed`](State::committed).
    pub(crate) fn remove_subtree(&mut self, top: NodeId, event: &Event) {
        self.remove_node(top, event, true);
    }

    fn remove_node(&mut self, id: NodeId, event: &Event, is_top: bool) {
        let child_ids: Vec<NodeId> = self
            .arena
            .get(id)
            .children()
            .map(|children| children.values().copied().collect())
            .unwrap_or_default();
        for child in child_ids {
            self.remove_node(child, event, false);
        }

        self.cancel_timer(id);
        let node = self.arena.remove(id);
        if let Some(parent) = node.parent {
            if let Some(children) = self.arena.get_mut(parent).children_mut() {
                children.shift_remove(path::last_segment(&node.path));
            }
        }
        if !is_top {
            self.hub.notify_removal(event, &node.path);
        }
    }

    /// Commits an applied mutation: invalidates cached permissions when the mutation touched the
    /// ACL subtree, records the event in history, fans it out to watchers, and logs it.
    pub(crate) fn committed(&mut self, event: &Event) {
        if path::is_segment_prefix(acl::ACL_ROOT, &event.path) {
            self.perm_cache.clear();
        }
        self.hub.notify(event);
        logging::log_applied(event);
    }
}
