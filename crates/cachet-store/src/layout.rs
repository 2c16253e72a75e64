//! On-disk layout of the store.
//!
//! ```text
//! <root>/tenants/<tenantHash>/key
//! <root>/tenants/<tenantHash>/entrypoints/<epHash>/info
//! <root>/tenants/<tenantHash>/entrypoints/<epHash>/conversations/<convoId>/<msgHash>
//! <root>/pending-tenants/<tenantHash>
//! <root>/inter-tenant/owner
//! <root>/inter-tenant/conversations/<tenantPk>/info
//! <root>/inter-tenant/conversations/<tenantPk>/<msgHash>
//! ```
//!
//! Every variable path component is an externally supplied identifier
//! (label hash, public key, content hash, all lowercase hex).  They must go
//! through [`validate_id`] before being joined onto the root.

use std::path::{Path, PathBuf};

use crate::error::StoreError;

/// Name of the metadata file inside entrypoint and inter-tenant
/// conversation directories; never a valid message hash.
pub const INFO_FILE: &str = "info";

/// Suffix of in-flight writes, filtered out of directory listings.
pub const TMP_SUFFIX: &str = ".tmp";

/// Reject anything that is not plain lowercase hex of a sane length.
/// This is the path-traversal defense: a valid id can never contain a
/// separator, a dot, or anything else the filesystem would interpret.
pub fn validate_id(id: &str) -> Result<(), StoreError> {
    if id.is_empty() || id.len() > 128 {
        return Err(StoreError::InvalidId(format!(
            "bad length {} for identifier",
            id.len()
        )));
    }
    if !id
        .bytes()
        .all(|b| b.is_ascii_digit() || (b'a'..=b'f').contains(&b))
    {
        return Err(StoreError::InvalidId(
            "identifier must be lowercase hex".to_string(),
        ));
    }
    Ok(())
}

#[derive(Debug, Clone)]
pub struct Layout {
    root: PathBuf,
}

impl Layout {
    pub fn new(root: PathBuf) -> Self {
        Self { root }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn tenants_dir(&self) -> PathBuf {
        self.root.join("tenants")
    }

    pub fn tenant_dir(&self, tenant: &str) -> PathBuf {
        self.tenants_dir().join(tenant)
    }

    pub fn tenant_key_file(&self, tenant: &str) -> PathBuf {
        self.tenant_dir(tenant).join("key")
    }

    pub fn entrypoints_dir(&self, tenant: &str) -> PathBuf {
        self.tenant_dir(tenant).join("entrypoints")
    }

    pub fn entrypoint_dir(&self, tenant: &str, entrypoint: &str) -> PathBuf {
        self.entrypoints_dir(tenant).join(entrypoint)
    }

    pub fn entrypoint_info_file(&self, tenant: &str, entrypoint: &str) -> PathBuf {
        self.entrypoint_dir(tenant, entrypoint).join(INFO_FILE)
    }

    pub fn conversations_dir(&self, tenant: &str, entrypoint: &str) -> PathBuf {
        self.entrypoint_dir(tenant, entrypoint).join("conversations")
    }

    pub fn conversation_dir(&self, tenant: &str, entrypoint: &str, convo: &str) -> PathBuf {
        self.conversations_dir(tenant, entrypoint).join(convo)
    }

    pub fn pending_dir(&self) -> PathBuf {
        self.root.join("pending-tenants")
    }

    pub fn pending_marker(&self, tenant: &str) -> PathBuf {
        self.pending_dir().join(tenant)
    }

    pub fn inter_tenant_dir(&self) -> PathBuf {
        self.root.join("inter-tenant")
    }

    pub fn owner_key_file(&self) -> PathBuf {
        self.inter_tenant_dir().join("owner")
    }

    pub fn inter_conversations_dir(&self) -> PathBuf {
        self.inter_tenant_dir().join("conversations")
    }

    pub fn inter_conversation_dir(&self, convo: &str) -> PathBuf {
        self.inter_conversations_dir().join(convo)
    }

    pub fn inter_info_file(&self, convo: &str) -> PathBuf {
        self.inter_conversation_dir(convo).join(INFO_FILE)
    }
}
