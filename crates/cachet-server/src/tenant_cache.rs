//! Process-wide cache of active tenant hashes.
//!
//! Empty on cold start, populated lazily on first validation, cleared on
//! every mutation of the tenant set so the next check rebuilds from disk.
//! A stale entry can only ever be a false negative for a just-created
//! tenant, never a false positive for a deleted one (deletion invalidates
//! before responding).

use std::collections::HashSet;
use std::sync::Arc;

use tokio::sync::RwLock;
use tracing::debug;

#[derive(Clone, Default)]
pub struct TenantCache {
    tenants: Arc<RwLock<HashSet<String>>>,
}

impl TenantCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn is_empty(&self) -> bool {
        self.tenants.read().await.is_empty()
    }

    pub async fn contains(&self, tenant: &str) -> bool {
        self.tenants.read().await.contains(tenant)
    }

    pub async fn populate<I>(&self, entries: I)
    where
        I: IntoIterator<Item = String>,
    {
        let mut tenants = self.tenants.write().await;
        tenants.extend(entries);
        debug!(count = tenants.len(), "Tenant cache populated");
    }

    /// Clear the cache, forcing the next validation to rebuild from
    /// persisted state.
    pub async fn invalidate(&self) {
        self.tenants.write().await.clear();
        debug!("Tenant cache invalidated");
    }
}
