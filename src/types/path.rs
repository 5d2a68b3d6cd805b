/*
    Copyright © 2023, ParallelChain Lab
    Licensed under the Apache License, Version 2.0: http://www.apache.org/licenses/LICENSE-2.0
*/

//! Canonicalization of and computations over slash-delimited key paths.
//!
//! Every path accepted at the public API boundary is normalized by [`normalize`] before the store
//! looks at it: the canonical form is absolute, has no empty, `.` or `..` segments, and carries no
//! trailing slash unless it is the root itself. Canonical paths are the only form stored in nodes or
//! referenced by events, which is what lets prefix matching and watcher fan-out work on plain string
//! comparisons.

use crate::errors::StoreError;

/// Canonicalize an externally supplied path.
///
/// A leading `/` is implied if missing, repeated slashes collapse, `.` segments disappear, and `..`
/// segments pop the previous segment without ever escaping above the root. Paths containing null
/// bytes, and the empty string, are rejected with [`StoreError::BadPath`].
pub fn normalize(path: &str) -> Result<String, StoreError> {
    if path.is_empty() || path.contains('\0') {
        return Err(StoreError::BadPath {
            path: path.to_string(),
        });
    }

    let mut stack: Vec<&str> = Vec::new();
    for segment in path.split('/') {
        match segment {
            "" | "." => continue,
            ".." => {
                stack.pop();
            }
            other => stack.push(other),
        }
    }

    if stack.is_empty() {
        return Ok(String::from("/"));
    }

    let mut canonical = String::with_capacity(path.len());
    for segment in stack {
        canonical.push('/');
        canonical.push_str(segment);
    }
    Ok(canonical)
}

/// The canonical path of the directory containing `path`. The parent of the root is the root.
pub(crate) fn parent(path: &str) -> &str {
    match path.rfind('/') {
        Some(0) | None => "/",
        Some(position) => &path[..position],
    }
}

/// The last segment of a canonical path. Empty for the root.
pub(crate) fn last_segment(path: &str) -> &str {
    match path.rfind('/') {
        Some(position) => &path[position + 1..],
        None => path,
    }
}

/// Whether the node at `path` is hidden, i.e. its last segment starts with `_`.
pub(crate) fn is_hidden(path: &str) -> bool {
    last_segment(path).starts_with('_')
}

/// Join a canonical directory path and a child name.
pub(crate) fn join(dir: &str, name: &str) -> String {
    if dir == "/" {
        format!("/{}", name)
    } else {
        format!("{}/{}", dir, name)
    }
}

/// The non-empty segments of a canonical path, in order. Empty for the root.
pub(crate) fn segments(path: &str) -> impl Iterator<Item = &str> {
    path.split('/').filter(|segment| !segment.is_empty())
}

/// Segment-aligned prefix containment: `prefix` contains `path` iff they are equal or `path`
/// continues `prefix` at a segment boundary. `/foo` contains `/foo/bar` but not `/foobar`; the root
/// contains everything.
pub(crate) fn is_segment_prefix(prefix: &str, path: &str) -> bool {
    if prefix == "/" {
        return true;
    }
    match path.strip_prefix(prefix) {
        Some(rest) => rest.is_empty() || rest.starts_with('/'),
        None => false,
    }
}

/// Every canonical prefix of `path` from the root down to `path` itself.
///
/// `/a/b` yields `/`, `/a`, `/a/b`. The root yields only itself.
pub(crate) fn ancestors(path: &str) -> Vec<&str> {
    let mut chain = vec!["/"];
    if path == "/" {
        return chain;
    }
    for (position, byte) in path.bytes().enumerate().skip(1) {
        if byte == b'/' {
            chain.push(&path[..position]);
        }
    }
    chain.push(path);
    chain
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normalize_canonicalizes() {
        assert_eq!(normalize("/").unwrap(), "/");
        assert_eq!(normalize("foo").unwrap(), "/foo");
        assert_eq!(normalize("/foo/").unwrap(), "/foo");
        assert_eq!(normalize("//foo///bar").unwrap(), "/foo/bar");
        assert_eq!(normalize("/foo/./bar").unwrap(), "/foo/bar");
        assert_eq!(normalize("/foo/../bar").unwrap(), "/bar");
        assert_eq!(normalize("/../../foo").unwrap(), "/foo");
        assert_eq!(normalize("/foo/..").unwrap(), "/");
    }

    #[test]
    fn normalize_rejects_invalid() {
        assert!(matches!(normalize(""), Err(StoreError::BadPath { .. })));
        assert!(matches!(normalize("/fo\0o"), Err(StoreError::BadPath { .. })));
    }

    #[test]
    fn parent_and_last_segment() {
        assert_eq!(parent("/foo/bar"), "/foo");
        assert_eq!(parent("/foo"), "/");
        assert_eq!(parent("/"), "/");
        assert_eq!(last_segment("/foo/bar"), "bar");
        assert_eq!(last_segment("/"), "");
    }

    #[test]
    fn segment_prefix_is_alignment_aware() {
        assert!(is_segment_prefix("/foo", "/foo"));
        assert!(is_segment_prefix("/foo", "/foo/bar"));
        assert!(!is_segment_prefix("/foo", "/foobar"));
        assert!(is_segment_prefix("/", "/anything/at/all"));
    }

    #[test]
    fn ancestor_chain() {
        assert_eq!(ancestors("/"), vec!["/"]);
        assert_eq!(ancestors("/a/b/c"), vec!["/", "/a", "/a/b", "/a/b/c"]);
    }

    #[test]
    fn hidden_names() {
        assert!(is_hidden("/foo/_bar"));
        assert!(!is_hidden("/foo/bar"));
        assert!(!is_hidden("/_foo/bar"));
    }
}
