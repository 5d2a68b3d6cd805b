/*
    Copyright © 2023, ParallelChain Lab
    Licensed under the Apache License, Version 2.0: http://www.apache.org/licenses/LICENSE-2.0
*/

//! Configuration as specified by the operator, consumed when constructing a
//! [`KeyTree`](crate::store::tree::KeyTree).

use std::sync::Arc;

use crate::environment::{Clock, IdentityProvider, StaticIdentity, SystemClock};

/// How many recent events the watcher hub retains for catch-up when no capacity is configured.
pub const DEFAULT_HISTORY_CAPACITY: usize = 1000;

/// The user that access control checks run against when no identity hook is configured.
pub const DEFAULT_USER: &str = "admin";

#[derive(Clone)]
pub struct StoreConfig {
    /// Capacity of the bounded event history backing watcher catch-up.
    pub history_capacity: usize,
    /// Source of the current instant; drives expirations.
    pub clock: Arc<dyn Clock>,
    /// Hook naming the user on whose behalf operations run.
    pub identity: Arc<dyn IdentityProvider>,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            history_capacity: DEFAULT_HISTORY_CAPACITY,
            clock: Arc::new(SystemClock),
            identity: Arc::new(StaticIdentity::new(DEFAULT_USER)),
        }
    }
}
