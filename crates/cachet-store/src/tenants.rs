//! Tenant directory: the set of tenants and, per tenant, the set of
//! entrypoints.
//!
//! A tenant is created "pending" by the provisioning tool and becomes
//! active when its owner completes the setup flow, which records the
//! tenant's public key and first entrypoint. Active means: present in the
//! tenant set and absent from the pending set.

use std::collections::BTreeMap;

use tokio::fs;
use tracing::{debug, info};

use crate::error::{Result, StoreError};
use crate::layout::validate_id;
use crate::store::Store;

impl Store {
    /// Tenants that are present and no longer pending.
    pub async fn active_tenants(&self) -> Result<Vec<String>> {
        let tenants = self.list_dir(&self.layout.tenants_dir()).await?;
        let pending = self.list_dir(&self.layout.pending_dir()).await?;

        Ok(tenants
            .into_iter()
            .filter(|t| !pending.contains(t))
            .collect())
    }

    /// Every tenant directory, pending included.
    pub async fn all_tenants(&self) -> Result<Vec<String>> {
        self.list_dir(&self.layout.tenants_dir()).await
    }

    pub async fn tenant_pending(&self, tenant: &str) -> Result<bool> {
        validate_id(tenant)?;
        Ok(self.path_exists(&self.layout.pending_marker(tenant)).await)
    }

    pub async fn tenant_pk(&self, tenant: &str) -> Result<String> {
        validate_id(tenant)?;
        self.read_text(&self.layout.tenant_key_file(tenant)).await
    }

    pub async fn instance_owner_pk(&self) -> Result<String> {
        self.read_text(&self.layout.owner_key_file()).await
    }

    /// Record the deployment operator's public key (provisioning tool).
    pub async fn set_instance_owner(&self, pk: &str) -> Result<()> {
        validate_id(pk)?;
        fs::write(self.layout.owner_key_file(), pk).await?;
        info!("Instance owner key recorded");
        Ok(())
    }

    /// Register a tenant in the pending state (provisioning tool).
    pub async fn create_pending_tenant(&self, tenant: &str) -> Result<()> {
        validate_id(tenant)?;

        let tenant_dir = self.layout.tenant_dir(tenant);
        if self.path_exists(&tenant_dir).await {
            return Err(StoreError::Conflict(format!(
                "tenant {tenant} already exists"
            )));
        }

        fs::create_dir_all(self.layout.entrypoints_dir(tenant)).await?;
        fs::write(self.layout.pending_marker(tenant), "").await?;

        info!(tenant = %tenant, "Created pending tenant");
        Ok(())
    }

    /// Remove a tenant, its entrypoints and conversations, its pending
    /// marker and its inter-tenant conversation. Idempotent.
    pub async fn delete_tenant(&self, tenant: &str) -> Result<()> {
        validate_id(tenant)?;

        if let Ok(pk) = self.tenant_pk(tenant).await {
            if validate_id(&pk).is_ok() {
                self.remove_dir_idempotent(&self.layout.inter_conversation_dir(&pk))
                    .await?;
            }
        }

        self.remove_dir_idempotent(&self.layout.tenant_dir(tenant))
            .await?;
        self.remove_file_idempotent(&self.layout.pending_marker(tenant))
            .await?;

        info!(tenant = %tenant, "Deleted tenant");
        Ok(())
    }

    /// Complete the setup flow for a pending tenant: record its public
    /// key, clear the pending marker, open its inter-tenant conversation
    /// (with the sealed tenant name for the instance owner) and create its
    /// first entrypoint.
    pub async fn create_tenant(
        &self,
        tenant: &str,
        tenant_pk: &str,
        sealed_tenant_name: &str,
        entrypoint: &str,
        sealed_entrypoint_label: &str,
    ) -> Result<()> {
        validate_id(tenant)?;
        validate_id(tenant_pk)?;

        if !self.tenant_pending(tenant).await? {
            return Err(StoreError::TenantNotPending);
        }

        fs::write(self.layout.tenant_key_file(tenant), tenant_pk).await?;
        self.remove_file_idempotent(&self.layout.pending_marker(tenant))
            .await?;

        fs::create_dir_all(self.layout.inter_conversation_dir(tenant_pk)).await?;
        fs::write(self.layout.inter_info_file(tenant_pk), sealed_tenant_name).await?;

        self.create_entrypoint(tenant, entrypoint, sealed_entrypoint_label)
            .await?;

        info!(tenant = %tenant, "Tenant activated");
        Ok(())
    }

    /// Create an entrypoint under a tenant. Fails if an entrypoint with
    /// the same hash already exists.
    pub async fn create_entrypoint(
        &self,
        tenant: &str,
        entrypoint: &str,
        sealed_label: &str,
    ) -> Result<()> {
        validate_id(tenant)?;
        validate_id(entrypoint)?;

        if self.entrypoint_exists(tenant, entrypoint).await? {
            return Err(StoreError::Conflict(format!(
                "entrypoint {entrypoint} already exists"
            )));
        }

        fs::create_dir_all(self.layout.conversations_dir(tenant, entrypoint)).await?;
        fs::write(
            self.layout.entrypoint_info_file(tenant, entrypoint),
            sealed_label,
        )
        .await?;

        debug!(tenant = %tenant, entrypoint = %entrypoint, "Created entrypoint");
        Ok(())
    }

    /// Remove an entrypoint and every conversation nested under it.
    /// Succeeds when the entrypoint is already absent.
    pub async fn delete_entrypoint(&self, tenant: &str, entrypoint: &str) -> Result<()> {
        validate_id(tenant)?;
        validate_id(entrypoint)?;

        self.remove_dir_idempotent(&self.layout.entrypoint_dir(tenant, entrypoint))
            .await?;

        debug!(tenant = %tenant, entrypoint = %entrypoint, "Deleted entrypoint");
        Ok(())
    }

    pub async fn entrypoint_exists(&self, tenant: &str, entrypoint: &str) -> Result<bool> {
        validate_id(tenant)?;
        validate_id(entrypoint)?;
        Ok(self
            .path_exists(&self.layout.entrypoint_dir(tenant, entrypoint))
            .await)
    }

    /// Map of entrypoint hash to its sealed label.
    pub async fn tenant_entrypoints(&self, tenant: &str) -> Result<BTreeMap<String, String>> {
        validate_id(tenant)?;

        let mut entrypoints = BTreeMap::new();
        for entrypoint in self.list_dir(&self.layout.entrypoints_dir(tenant)).await? {
            let sealed = self
                .read_text(&self.layout.entrypoint_info_file(tenant, &entrypoint))
                .await?;
            entrypoints.insert(entrypoint, sealed);
        }
        Ok(entrypoints)
    }
}

#[cfg(test)]
mod tests {
    use tempfile::TempDir;

    use super::*;

    async fn test_store() -> (Store, TempDir) {
        let dir = TempDir::new().unwrap();
        let store = Store::open(dir.path().to_path_buf()).await.unwrap();
        (store, dir)
    }

    fn tenant_hash() -> String {
        cachet_shared::crypto::hash_id("Acme Corp")
    }

    fn ep_hash() -> String {
        cachet_shared::crypto::hash_id("general")
    }

    fn pk() -> String {
        "ab".repeat(32)
    }

    #[tokio::test]
    async fn test_pending_lifecycle() {
        let (store, _dir) = test_store().await;
        let tenant = tenant_hash();

        store.create_pending_tenant(&tenant).await.unwrap();
        assert!(store.tenant_pending(&tenant).await.unwrap());
        assert!(store.active_tenants().await.unwrap().is_empty());

        store
            .create_tenant(&tenant, &pk(), "73656e74", &ep_hash(), "6c6162")
            .await
            .unwrap();

        assert!(!store.tenant_pending(&tenant).await.unwrap());
        assert_eq!(store.active_tenants().await.unwrap(), vec![tenant.clone()]);
        assert_eq!(store.tenant_pk(&tenant).await.unwrap(), pk());
        assert!(store.entrypoint_exists(&tenant, &ep_hash()).await.unwrap());
    }

    #[tokio::test]
    async fn test_create_tenant_requires_pending() {
        let (store, _dir) = test_store().await;
        let tenant = tenant_hash();

        let result = store
            .create_tenant(&tenant, &pk(), "00", &ep_hash(), "00")
            .await;
        assert!(matches!(result, Err(StoreError::TenantNotPending)));
    }

    #[tokio::test]
    async fn test_create_pending_twice_conflicts() {
        let (store, _dir) = test_store().await;
        let tenant = tenant_hash();

        store.create_pending_tenant(&tenant).await.unwrap();
        assert!(matches!(
            store.create_pending_tenant(&tenant).await,
            Err(StoreError::Conflict(_))
        ));
    }

    #[tokio::test]
    async fn test_entrypoint_conflict_and_idempotent_delete() {
        let (store, _dir) = test_store().await;
        let tenant = tenant_hash();

        store.create_pending_tenant(&tenant).await.unwrap();
        store
            .create_tenant(&tenant, &pk(), "00", &ep_hash(), "00")
            .await
            .unwrap();

        assert!(matches!(
            store.create_entrypoint(&tenant, &ep_hash(), "00").await,
            Err(StoreError::Conflict(_))
        ));

        store.delete_entrypoint(&tenant, &ep_hash()).await.unwrap();
        assert!(!store.entrypoint_exists(&tenant, &ep_hash()).await.unwrap());
        // absent target is not an error
        store.delete_entrypoint(&tenant, &ep_hash()).await.unwrap();
    }

    #[tokio::test]
    async fn test_tenant_entrypoints_map() {
        let (store, _dir) = test_store().await;
        let tenant = tenant_hash();
        let second = cachet_shared::crypto::hash_id("sales");

        store.create_pending_tenant(&tenant).await.unwrap();
        store
            .create_tenant(&tenant, &pk(), "00", &ep_hash(), "aa11")
            .await
            .unwrap();
        store.create_entrypoint(&tenant, &second, "bb22").await.unwrap();

        let map = store.tenant_entrypoints(&tenant).await.unwrap();
        assert_eq!(map.len(), 2);
        assert_eq!(map.get(&ep_hash()).unwrap(), "aa11");
        assert_eq!(map.get(&second).unwrap(), "bb22");
    }

    #[tokio::test]
    async fn test_delete_tenant_removes_inter_tenant_convo() {
        let (store, _dir) = test_store().await;
        let tenant = tenant_hash();

        store.create_pending_tenant(&tenant).await.unwrap();
        store
            .create_tenant(&tenant, &pk(), "00", &ep_hash(), "00")
            .await
            .unwrap();
        assert_eq!(
            store.inter_tenant_conversation_ids().await.unwrap(),
            vec![pk()]
        );

        store.delete_tenant(&tenant).await.unwrap();
        assert!(store.active_tenants().await.unwrap().is_empty());
        assert!(store
            .inter_tenant_conversation_ids()
            .await
            .unwrap()
            .is_empty());

        // idempotent
        store.delete_tenant(&tenant).await.unwrap();
    }

    #[tokio::test]
    async fn test_instance_owner_key() {
        let (store, _dir) = test_store().await;
        assert!(matches!(
            store.instance_owner_pk().await,
            Err(StoreError::NotFound)
        ));

        store.set_instance_owner(&pk()).await.unwrap();
        assert_eq!(store.instance_owner_pk().await.unwrap(), pk());
    }

    #[tokio::test]
    async fn test_traversal_rejected() {
        let (store, _dir) = test_store().await;
        assert!(matches!(
            store.tenant_pk("../inter-tenant/owner").await,
            Err(StoreError::InvalidId(_))
        ));
    }
}
