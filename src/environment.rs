/*
    Copyright © 2023, ParallelChain Lab
    Licensed under the Apache License, Version 2.0: http://www.apache.org/licenses/LICENSE-2.0
*/

//! Environment inputs injected into the store at construction.
//!
//! The store itself is deterministic: replicas applying the same operation sequence must reach
//! byte-identical state. The two places the outside world leaks in, the wall clock and the identity
//! of the caller, are therefore modelled as pluggable traits so that deployments can wire in the
//! real environment while tests substitute controlled implementations.
//!
//! [`Clock`] feeds expirations; [`IdentityProvider`] names the user that access control checks run
//! against. In a deployment the identity is typically derived from the transport, e.g. the common
//! name of a TLS client certificate.

use std::time::{SystemTime, UNIX_EPOCH};

use crate::types::basic::Timestamp;

/// Source of the current instant.
pub trait Clock: Send + Sync {
    fn now(&self) -> Timestamp;
}

/// The process wall clock.
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> Timestamp {
        let since_epoch = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .expect("system clock is set before the Unix Epoch");
        Timestamp::new(since_epoch.as_millis() as u64)
    }
}

/// Names the user on whose behalf the current operation runs.
pub trait IdentityProvider: Send + Sync {
    fn current_user(&self) -> String;
}

/// An identity hook that always answers with the same user name.
pub struct StaticIdentity {
    user: String,
}

impl StaticIdentity {
    pub fn new(user: &str) -> Self {
        Self {
            user: user.to_string(),
        }
    }
}

impl IdentityProvider for StaticIdentity {
    fn current_user(&self) -> String {
        self.user.clone()
    }
}
