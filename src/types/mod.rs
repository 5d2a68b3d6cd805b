//! Types used across multiple components of the store.
//!
//! [`basic`] holds the inert newtypes that tag operations and instants, while [`path`] holds the
//! canonical path representation that the rest of the crate computes with.

pub mod basic;

pub mod path;
