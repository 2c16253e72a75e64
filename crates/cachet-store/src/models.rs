use serde::Serialize;

use cachet_shared::protocol::StoredMessage;

/// One conversation as returned to clients.
#[derive(Debug, Clone, Serialize)]
pub struct ConversationView {
    pub id: String,
    #[serde(rename = "epId", skip_serializing_if = "Option::is_none")]
    pub entrypoint_label: Option<String>,
    pub messages: Vec<StoredMessage>,
}

impl ConversationView {
    pub fn empty(id: String) -> Self {
        Self {
            id,
            entrypoint_label: None,
            messages: Vec::new(),
        }
    }
}

/// An inter-tenant conversation, keyed by the tenant's public key.
///
/// `io` is the instance owner's public key (so the client knows which key
/// the channel peers with); `ti` is the tenant's plaintext name sealed to
/// the instance owner, only readable by them.
#[derive(Debug, Clone, Serialize)]
pub struct InterTenantConversation {
    pub id: String,
    pub io: String,
    pub ti: String,
    pub messages: Vec<StoredMessage>,
}

/// All conversation ids under one entrypoint, with its sealed label.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EntrypointConversations {
    pub entrypoint_hash: String,
    /// Sealed entrypoint label, decryptable only by the tenant keypair.
    pub ep_id: String,
    pub convos: Vec<String>,
}

/// Either kind of conversation, serialized by shape.
#[derive(Debug, Clone, Serialize)]
#[serde(untagged)]
pub enum ConvoPayload {
    Ordinary(ConversationView),
    InterTenant(InterTenantConversation),
}
