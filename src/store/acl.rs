/*
    Copyright © 2023, ParallelChain Lab
    Licensed under the Apache License, Version 2.0: http://www.apache.org/licenses/LICENSE-2.0
*/

//! Access control checks, expressed as a convention over the tree itself.
//!
//! An ACL entry name resolves to the subtree at `/ACL/<name>/`: for each permission character
//! (conventionally `r`, `w`, `c`) and each user, the presence of a node at
//! `/ACL/<name>/<char>/<user>` grants that permission to that user. Storing grants as ordinary
//! tree data means the replication machinery and snapshots cover them for free; the cost is that
//! permission checks are reentrant reads against the same tree, which is why resolved checks are
//! cached per `(entry, permission, user)` and the cache is invalidated by any mutation under
//! `/ACL`.
//!
//! A node whose ACL tag is empty has no entry assigned and is unrestricted; this is the root's
//! initial state, so a fresh tree accepts everything until an operator wires `/ACL` up and tags
//! nodes with [`set_acl`](super::tree::KeyTree::set_acl).
//!
//! The checks themselves bypass access control: grant lookups are internal reads that neither
//! recurse into further checks nor move the store's (index, term).

use crate::errors::StoreError;
use crate::types::path;

use super::node::NodeId;
use super::tree::State;

/// The subtree holding permission grants.
pub(crate) const ACL_ROOT: &str = "/ACL";

impl State {
    /// Checks that `user` holds every permission character in `perms` under the ACL entry named
    /// `acl`. An empty entry name grants everything.
    pub(crate) fn check_perm(
        &mut self,
        acl: &str,
        perms: &str,
        user: &str,
    ) -> Result<(), StoreError> {
        if acl.is_empty() {
            return Ok(());
        }
        for perm in perms.chars() {
            if !self.perm_granted(acl, perm, user) {
                return Err(StoreError::PermissionDenied {
                    cause: perms.to_string(),
                });
            }
        }
        Ok(())
    }

    fn perm_granted(&mut self, acl: &str, perm: char, user: &str) -> bool {
        let key = (acl.to_string(), perm, user.to_string());
        if let Some(&cached) = self.perm_cache.get(&key) {
            return cached;
        }
        let grant_path = format!("{}/{}/{}/{}", ACL_ROOT, acl, perm, user);
        let granted = self.lookup(&grant_path).is_ok();
        self.perm_cache.insert(key, granted);
        granted
    }

    /// Checks the node's own ACL and, when `recursive`, the ACL of every non-hidden descendant.
    pub(crate) fn has_perm(
        &mut self,
        id: NodeId,
        perms: &str,
        recursive: bool,
        user: &str,
    ) -> Result<(), StoreError> {
        let acl = self.arena.get(id).acl.clone();
        self.check_perm(&acl, perms, user)?;

        if recursive {
            let child_ids: Vec<NodeId> = match self.arena.get(id).children() {
                Some(children) => children.values().copied().collect(),
                None => return Ok(()),
            };
            for child in child_ids {
                if self.arena.get(child).is_hidden() {
                    continue;
                }
                self.has_perm(child, perms, true, user)?;
            }
        }
        Ok(())
    }

    /// Checks `perms` against the ACL of the last existing ancestor of `canonical`: the direct
    /// parent when the whole parent chain exists, otherwise the node at which the walk first came
    /// up short. Auto-created directories inherit that ancestor's ACL, so it is the one that
    /// governs creations below it.
    pub(crate) fn has_perm_on_parent(
        &mut self,
        canonical: &str,
        perms: &str,
        user: &str,
    ) -> Result<(), StoreError> {
        let mut current = self.root;
        for segment in path::segments(path::parent(canonical)) {
            let node = self.arena.get(current);
            let next = node
                .children()
                .and_then(|children| children.get(segment).copied());
            match next {
                Some(child) => current = child,
                None => break,
            }
        }
        let acl = self.arena.get(current).acl.clone();
        self.check_perm(&acl, perms, user)
    }
}
