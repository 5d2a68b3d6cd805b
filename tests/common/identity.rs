use std::sync::{Arc, Mutex};

use keytree_rs::IdentityProvider;

/// An identity hook whose answer a test can change mid-run, standing in for e.g. different TLS
/// client certificates on different connections.
pub(crate) struct SwitchableIdentity {
    user: Mutex<String>,
}

impl SwitchableIdentity {
    pub(crate) fn new(user: &str) -> Arc<SwitchableIdentity> {
        Arc::new(SwitchableIdentity {
            user: Mutex::new(user.to_string()),
        })
    }

    pub(crate) fn switch(&self, user: &str) {
        *self.user.lock().unwrap() = user.to_string();
    }
}

impl IdentityProvider for SwitchableIdentity {
    fn current_user(&self) -> String {
        self.user.lock().unwrap().clone()
    }
}
