//! The conversation store: content-addressed message persistence and
//! retrieval.
//!
//! A message's storage key is the BLAKE3 hash of its own stamped record,
//! so writing the same logical message twice is a no-op and concurrent
//! writers need no coordination: identical writes converge on one file,
//! distinct writes land under distinct keys.  Writes go through a unique
//! temp file and an atomic rename, so a half-written record is never
//! visible as a readable message.

use std::path::Path;

use chrono::Utc;
use tokio::fs;
use tracing::debug;
use uuid::Uuid;

use cachet_shared::protocol::{
    apply_size_threshold, latest_message, DraftMessage, StoredMessage,
};

use crate::error::{Result, StoreError};
use crate::layout::{validate_id, INFO_FILE, TMP_SUFFIX};
use crate::models::{EntrypointConversations, InterTenantConversation};
use crate::store::Store;

/// Where a message belongs, resolved from its conversation key.
///
/// A declared key that matches an existing inter-tenant conversation id
/// routes to the inter-tenant channel; everything else is ordinary traffic
/// under the requesting tenant and entrypoint.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Namespace {
    Ordinary { tenant: String, entrypoint: String },
    InterTenant { conversation: String },
}

impl Store {
    pub async fn resolve_namespace(
        &self,
        tenant: &str,
        entrypoint: &str,
        conversation_key: &str,
    ) -> Result<Namespace> {
        validate_id(tenant)?;
        validate_id(entrypoint)?;
        validate_id(conversation_key)?;

        let inter_dir = self.layout.inter_conversation_dir(conversation_key);
        if self.path_exists(&inter_dir).await {
            Ok(Namespace::InterTenant {
                conversation: conversation_key.to_string(),
            })
        } else {
            Ok(Namespace::Ordinary {
                tenant: tenant.to_string(),
                entrypoint: entrypoint.to_string(),
            })
        }
    }

    /// Stamp and persist a message, routing to the inter-tenant namespace
    /// when its declared conversation key names one. Returns the stored
    /// record including the server-assigned timestamp.
    pub async fn store_message(
        &self,
        tenant: &str,
        entrypoint: &str,
        draft: DraftMessage,
    ) -> Result<StoredMessage> {
        self.store_message_at(tenant, entrypoint, draft, Utc::now().timestamp_millis())
            .await
    }

    /// Persist directly into the inter-tenant channel (setup flow).
    pub async fn store_inter_tenant_message(&self, draft: DraftMessage) -> Result<StoredMessage> {
        validate_id(&draft.k)?;
        let dir = self.layout.inter_conversation_dir(&draft.k);
        let stamped = draft.stamp(Utc::now().timestamp_millis());
        self.write_message(&dir, &stamped).await?;
        Ok(stamped)
    }

    pub(crate) async fn store_message_at(
        &self,
        tenant: &str,
        entrypoint: &str,
        draft: DraftMessage,
        t: i64,
    ) -> Result<StoredMessage> {
        let namespace = self
            .resolve_namespace(tenant, entrypoint, &draft.k)
            .await?;

        let dir = match &namespace {
            Namespace::Ordinary { tenant, entrypoint } => {
                self.layout.conversation_dir(tenant, entrypoint, &draft.k)
            }
            Namespace::InterTenant { conversation } => {
                self.layout.inter_conversation_dir(conversation)
            }
        };

        let stamped = draft.stamp(t);
        self.write_message(&dir, &stamped).await?;
        Ok(stamped)
    }

    async fn write_message(&self, dir: &Path, msg: &StoredMessage) -> Result<()> {
        let bytes = msg.canonical_bytes()?;
        let hash = cachet_shared::crypto::hash_hex(&bytes);

        // Tolerate racing writers creating the same conversation directory.
        fs::create_dir_all(dir).await?;

        let final_path = dir.join(&hash);
        if self.path_exists(&final_path).await {
            debug!(hash = %hash, "Message already stored, idempotent write");
            return Ok(());
        }

        // Unique temp name per writer, then atomic rename; racers renaming
        // the same content to the same final name are equivalent.
        let tmp_path = dir.join(format!("{hash}.{}{TMP_SUFFIX}", Uuid::new_v4().simple()));
        fs::write(&tmp_path, &bytes).await?;
        fs::rename(&tmp_path, &final_path).await?;

        debug!(hash = %hash, size = bytes.len(), "Stored message");
        Ok(())
    }

    pub async fn conversation_ids(&self, tenant: &str, entrypoint: &str) -> Result<Vec<String>> {
        validate_id(tenant)?;
        validate_id(entrypoint)?;
        self.list_dir(&self.layout.conversations_dir(tenant, entrypoint))
            .await
    }

    /// All messages of a conversation with `t > after`, unordered. A
    /// missing conversation directory reads as no messages yet.
    pub async fn conversation_messages(
        &self,
        tenant: &str,
        entrypoint: &str,
        conversation: &str,
        after: i64,
    ) -> Result<Vec<StoredMessage>> {
        validate_id(tenant)?;
        validate_id(entrypoint)?;
        validate_id(conversation)?;

        self.read_messages_in(
            &self.layout.conversation_dir(tenant, entrypoint, conversation),
            after,
        )
        .await
    }

    /// Like [`Self::conversation_messages`], with oversized ciphertexts
    /// replaced by their byte-length placeholder (list read path).
    pub async fn conversation_messages_elided(
        &self,
        tenant: &str,
        entrypoint: &str,
        conversation: &str,
        after: i64,
    ) -> Result<Vec<StoredMessage>> {
        Ok(self
            .conversation_messages(tenant, entrypoint, conversation, after)
            .await?
            .into_iter()
            .map(apply_size_threshold)
            .collect())
    }

    /// Single-message lookup by nonce: the one read path that always
    /// returns the full, un-elided ciphertext.
    pub async fn message_by_nonce(
        &self,
        tenant: &str,
        entrypoint: &str,
        conversation: &str,
        nonce: &str,
    ) -> Result<StoredMessage> {
        let messages = self
            .conversation_messages(tenant, entrypoint, conversation, 0)
            .await?;

        messages
            .into_iter()
            .find(|msg| msg.n == nonce)
            .ok_or(StoreError::NotFound)
    }

    /// The single newest message of a conversation, elided; `None` when
    /// the conversation has no messages.
    pub async fn latest_conversation_message(
        &self,
        tenant: &str,
        entrypoint: &str,
        conversation: &str,
    ) -> Result<Option<StoredMessage>> {
        let messages = self
            .conversation_messages(tenant, entrypoint, conversation, 0)
            .await?;

        Ok(latest_message(&messages)
            .cloned()
            .map(apply_size_threshold))
    }

    /// Every entrypoint of a tenant with its sealed label and the ids of
    /// all conversations nested under it.
    pub async fn all_tenant_conversations(
        &self,
        tenant: &str,
    ) -> Result<Vec<EntrypointConversations>> {
        validate_id(tenant)?;

        let mut result = Vec::new();
        for entrypoint in self.list_dir(&self.layout.entrypoints_dir(tenant)).await? {
            let ep_id = self
                .read_text(&self.layout.entrypoint_info_file(tenant, &entrypoint))
                .await?;
            let convos = self.conversation_ids(tenant, &entrypoint).await?;
            result.push(EntrypointConversations {
                entrypoint_hash: entrypoint,
                ep_id,
                convos,
            });
        }
        Ok(result)
    }

    pub async fn inter_tenant_conversation_ids(&self) -> Result<Vec<String>> {
        self.list_dir(&self.layout.inter_conversations_dir()).await
    }

    /// One inter-tenant conversation: its sealed tenant name, the instance
    /// owner key it peers with, and its messages after the cursor.
    pub async fn inter_tenant_conversation(
        &self,
        conversation: &str,
        after: i64,
        elide: bool,
    ) -> Result<InterTenantConversation> {
        validate_id(conversation)?;

        let sealed_name = self
            .read_text(&self.layout.inter_info_file(conversation))
            .await?;
        let owner_pk = self.instance_owner_pk().await?;

        let mut messages = self
            .read_messages_in(&self.layout.inter_conversation_dir(conversation), after)
            .await?;
        if elide {
            messages = messages.into_iter().map(apply_size_threshold).collect();
        }

        Ok(InterTenantConversation {
            id: conversation.to_string(),
            io: owner_pk,
            ti: sealed_name,
            messages,
        })
    }

    pub async fn all_inter_tenant_conversations(
        &self,
        after: i64,
        elide: bool,
    ) -> Result<Vec<InterTenantConversation>> {
        let mut convos = Vec::new();
        for id in self.inter_tenant_conversation_ids().await? {
            convos.push(self.inter_tenant_conversation(&id, after, elide).await?);
        }
        Ok(convos)
    }

    async fn read_messages_in(&self, dir: &Path, after: i64) -> Result<Vec<StoredMessage>> {
        let mut messages = Vec::new();
        for name in self.list_dir(dir).await? {
            if name == INFO_FILE || name.ends_with(TMP_SUFFIX) {
                continue;
            }
            let bytes = fs::read(dir.join(&name)).await?;
            let msg: StoredMessage = serde_json::from_slice(&bytes)?;
            if msg.t > after {
                messages.push(msg);
            }
        }
        Ok(messages)
    }
}
