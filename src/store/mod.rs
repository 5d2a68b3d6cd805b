//! The hierarchical node tree and the operations façade over it.

pub(crate) mod acl;

pub(crate) mod node;

pub mod snapshot;

pub mod tree;
