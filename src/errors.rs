/*
    Copyright © 2023, ParallelChain Lab
    Licensed under the Apache License, Version 2.0: http://www.apache.org/licenses/LICENSE-2.0
*/

//! Errors returned by the store's public operations.
//!
//! Every operation returns either an event or one of these enumerated errors; nothing panics across
//! the API boundary. Each variant carries a stable numeric [code](StoreError::code) that the
//! client-facing gateway surfaces verbatim. The codes are part of the replicated contract: replicas
//! applying the same operation sequence must fail with the same code, so they never change between
//! releases.

use std::fmt::{self, Display, Formatter};

/// Error returned by a store operation, alongside a `None` event.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum StoreError {
    /// The path, or one of its intermediate segments, does not exist.
    KeyNotFound { path: String },
    /// A compare-and-swap guard did not match. The cause carries `[requested/actual]` pairs for
    /// the value and the modified index.
    CompareFailed { cause: String },
    /// Creation target already exists.
    NodeExists { path: String },
    /// The operation requires a file but the path resolves to a directory.
    NotFile { path: String },
    /// An intermediate segment of the path exists but is a file.
    NotDir { path: String },
    /// Non-recursive deletion of a non-empty directory, or any deletion of the root.
    DirNotEmpty { path: String },
    /// The caller's user lacks one of the required permission characters.
    PermissionDenied { cause: String },
    /// The supplied path cannot be canonicalized.
    BadPath { path: String },
}

impl StoreError {
    /// The fixed numeric code surfaced at the client boundary.
    pub const fn code(&self) -> u32 {
        match self {
            StoreError::KeyNotFound { .. } => 100,
            StoreError::CompareFailed { .. } => 101,
            StoreError::NodeExists { .. } => 102,
            StoreError::NotFile { .. } => 104,
            StoreError::NotDir { .. } => 105,
            StoreError::DirNotEmpty { .. } => 106,
            StoreError::PermissionDenied { .. } => 107,
            StoreError::BadPath { .. } => 200,
        }
    }
}

impl Display for StoreError {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            StoreError::KeyNotFound { path } => write!(f, "key not found: {}", path),
            StoreError::CompareFailed { cause } => write!(f, "compare failed: {}", cause),
            StoreError::NodeExists { path } => write!(f, "node already exists: {}", path),
            StoreError::NotFile { path } => write!(f, "not a file: {}", path),
            StoreError::NotDir { path } => write!(f, "not a directory: {}", path),
            StoreError::DirNotEmpty { path } => write!(f, "directory not empty: {}", path),
            StoreError::PermissionDenied { cause } => write!(f, "permission denied: {}", cause),
            StoreError::BadPath { path } => write!(f, "bad path: {}", path),
        }
    }
}

impl std::error::Error for StoreError {}
