use std::sync::Arc;
use tokio::sync::watch;

use super::WhitelistConfig;

/// Read-only configuration captured once per authorization decision.
#[derive(Debug, Clone, Default)]
pub struct AuthzSnapshot {
    pub whitelist: WhitelistConfig,
    pub user_info_url: String,
}

/// Holder of the current snapshot. Reloads swap the whole `Arc`, so a
/// request that already captured a snapshot never sees a partial update.
#[derive(Clone)]
pub struct ConfigHandle {
    tx: Arc<watch::Sender<Arc<AuthzSnapshot>>>,
}

impl ConfigHandle {
    pub fn new(snapshot: AuthzSnapshot) -> Self {
        let (tx, _rx) = watch::channel(Arc::new(snapshot));
        Self { tx: Arc::new(tx) }
    }

    pub fn snapshot(&self) -> Arc<AuthzSnapshot> {
        self.tx.borrow().clone()
    }

    pub fn reload(&self, snapshot: AuthzSnapshot) {
        self.tx.send_replace(Arc::new(snapshot));
        tracing::info!("Authorization configuration reloaded");
    }

    pub fn subscribe(&self) -> watch::Receiver<Arc<AuthzSnapshot>> {
        self.tx.subscribe()
    }
}
