use crate::models::SessionIdentity;
use std::sync::Arc;
use tokio::sync::watch;

/// Process-wide holder of the signed-in identity. Created once by the hub and
/// handed to every component that needs the current user.
#[derive(Debug, Clone)]
pub struct SessionContext {
    sender: Arc<watch::Sender<Option<SessionIdentity>>>,
}

impl Default for SessionContext {
    fn default() -> Self {
        Self::new()
    }
}

impl SessionContext {
    pub fn new() -> Self {
        let (sender, _receiver) = watch::channel(None);
        Self {
            sender: Arc::new(sender),
        }
    }

    pub fn sign_in(&self, identity: SessionIdentity) {
        tracing::info!(uid = %identity.uid, "session signed in");
        self.sender.send_replace(Some(identity));
    }

    pub fn sign_out(&self) {
        if let Some(previous) = self.sender.send_replace(None) {
            tracing::info!(uid = %previous.uid, "session signed out");
        }
    }

    pub fn current(&self) -> Option<SessionIdentity> {
        self.sender.borrow().clone()
    }

    pub fn uid(&self) -> Option<String> {
        self.sender.borrow().as_ref().map(|identity| identity.uid.clone())
    }

    /// Identity-change stream; the receiver sees the current value first.
    pub fn subscribe(&self) -> watch::Receiver<Option<SessionIdentity>> {
        self.sender.subscribe()
    }
}
