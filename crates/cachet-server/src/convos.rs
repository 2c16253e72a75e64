//! Conversation read and write routes.
//!
//! List and summary reads apply the size-threshold transform so inbox
//! views stay cheap regardless of attachment size; the single
//! message-by-nonce lookup is the one path returning full ciphertext.

use axum::{
    extract::{Path, Query, State},
    http::HeaderMap,
    Json,
};
use serde::Deserialize;
use tracing::debug;

use cachet_shared::protocol::{latest_message, DraftMessage, StoredMessage};
use cachet_store::{ConversationView, ConvoPayload, InterTenantConversation};

use crate::api::{require_admin, require_auth, require_session, validate_entrypoint, AppState};
use crate::error::ServerError;
use crate::handshake::SidQuery;
use crate::session::Session;

#[derive(Deserialize)]
pub struct ConvoQuery {
    pub sid: Option<String>,
    pub after: Option<i64>,
}

#[derive(Deserialize)]
pub struct SubmitBody {
    #[serde(rename = "encryptedMessage")]
    pub encrypted_message: DraftMessage,
    /// Admin replies target the entrypoint the conversation lives under.
    #[serde(rename = "epHash", default)]
    pub ep_hash: Option<String>,
}

/// The inter-tenant conversations visible to this session: all of them
/// for the instance owner, only the tenant's own otherwise.
async fn visible_inter_tenant(
    state: &AppState,
    session: &Session,
    after: i64,
    elide: bool,
) -> Result<Vec<InterTenantConversation>, ServerError> {
    if session.instance_owner {
        Ok(state
            .store
            .all_inter_tenant_conversations(after, elide)
            .await?)
    } else {
        let pk = session.pk.as_deref().ok_or(ServerError::Unauthorized)?;
        Ok(vec![
            state.store.inter_tenant_conversation(pk, after, elide).await?,
        ])
    }
}

/// One summary per conversation across every entrypoint, plus the
/// relevant inter-tenant entries, each reduced to its single newest
/// message. O(conversations), never loads full histories.
pub async fn latest_summaries(
    Path((tenant_id, entrypoint_id)): Path<(String, String)>,
    Query(query): Query<SidQuery>,
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Result<Json<Vec<ConvoPayload>>, ServerError> {
    let scope = validate_entrypoint(&state, &tenant_id, &entrypoint_id).await?;
    let (_, session) = require_session(&state, &headers, query.sid.as_deref()).await?;
    require_auth(&session, &headers)?;
    require_admin(&session)?;

    let mut summaries = Vec::new();

    for ep in state.store.all_tenant_conversations(&scope.tenant).await? {
        for convo_id in &ep.convos {
            let latest = state
                .store
                .latest_conversation_message(&scope.tenant, &ep.entrypoint_hash, convo_id)
                .await?;
            // skip conversations that have no messages yet
            if let Some(message) = latest {
                summaries.push(ConvoPayload::Ordinary(ConversationView {
                    id: convo_id.clone(),
                    entrypoint_label: Some(ep.ep_id.clone()),
                    messages: vec![message],
                }));
            }
        }
    }

    for mut convo in visible_inter_tenant(&state, &session, 0, true).await? {
        convo.messages = latest_message(&convo.messages).cloned().into_iter().collect();
        summaries.push(ConvoPayload::InterTenant(convo));
    }

    debug!(count = summaries.len(), "Built inbox summary");
    Ok(Json(summaries))
}

/// Full (elided) history of one conversation after a cursor. Admins see
/// any conversation of the tenant plus their inter-tenant channel;
/// visitors see their own, an absent one reading as empty.
pub async fn conversation(
    Path((tenant_id, entrypoint_id, convo_id)): Path<(String, String, String)>,
    Query(query): Query<ConvoQuery>,
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Result<Json<ConvoPayload>, ServerError> {
    let scope = validate_entrypoint(&state, &tenant_id, &entrypoint_id).await?;
    let (_, session) = require_session(&state, &headers, query.sid.as_deref()).await?;
    require_auth(&session, &headers)?;

    let after = query.after.unwrap_or(0);

    if session.admin {
        for ep in state.store.all_tenant_conversations(&scope.tenant).await? {
            if ep.convos.contains(&convo_id) {
                let messages = state
                    .store
                    .conversation_messages_elided(
                        &scope.tenant,
                        &ep.entrypoint_hash,
                        &convo_id,
                        after,
                    )
                    .await?;
                return Ok(Json(ConvoPayload::Ordinary(ConversationView {
                    id: convo_id,
                    entrypoint_label: Some(ep.ep_id),
                    messages,
                })));
            }
        }

        let convo = visible_inter_tenant(&state, &session, after, true)
            .await?
            .into_iter()
            .find(|c| c.id == convo_id)
            .ok_or(ServerError::NotFound)?;
        return Ok(Json(ConvoPayload::InterTenant(convo)));
    }

    let known = state
        .store
        .conversation_ids(&scope.tenant, &scope.entrypoint)
        .await?;
    if !known.contains(&convo_id) {
        // parent scope exists, so this is "no conversation yet"
        return Ok(Json(ConvoPayload::Ordinary(ConversationView::empty(
            convo_id,
        ))));
    }

    let messages = state
        .store
        .conversation_messages_elided(&scope.tenant, &scope.entrypoint, &convo_id, after)
        .await?;

    Ok(Json(ConvoPayload::Ordinary(ConversationView {
        id: convo_id,
        entrypoint_label: None,
        messages,
    })))
}

/// Materialize one elided message: always the full, un-elided ciphertext.
pub async fn message_by_nonce(
    Path((tenant_id, entrypoint_id, convo_id, nonce)): Path<(String, String, String, String)>,
    Query(query): Query<SidQuery>,
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Result<Json<ConvoPayload>, ServerError> {
    let scope = validate_entrypoint(&state, &tenant_id, &entrypoint_id).await?;
    let (_, session) = require_session(&state, &headers, query.sid.as_deref()).await?;
    require_auth(&session, &headers)?;

    if session.admin {
        for ep in state.store.all_tenant_conversations(&scope.tenant).await? {
            if ep.convos.contains(&convo_id) {
                let message = state
                    .store
                    .message_by_nonce(&scope.tenant, &ep.entrypoint_hash, &convo_id, &nonce)
                    .await?;
                return Ok(Json(ConvoPayload::Ordinary(ConversationView {
                    id: convo_id,
                    entrypoint_label: Some(ep.ep_id),
                    messages: vec![message],
                })));
            }
        }

        let convo = visible_inter_tenant(&state, &session, 0, false)
            .await?
            .into_iter()
            .find(|c| c.id == convo_id)
            .ok_or(ServerError::NotFound)?;
        return Ok(Json(ConvoPayload::InterTenant(convo)));
    }

    let known = state
        .store
        .conversation_ids(&scope.tenant, &scope.entrypoint)
        .await?;
    if !known.contains(&convo_id) {
        return Ok(Json(ConvoPayload::Ordinary(ConversationView::empty(
            convo_id,
        ))));
    }

    let message = state
        .store
        .message_by_nonce(&scope.tenant, &scope.entrypoint, &convo_id, &nonce)
        .await?;

    Ok(Json(ConvoPayload::Ordinary(ConversationView {
        id: convo_id,
        entrypoint_label: None,
        messages: vec![message],
    })))
}

/// Append a message. The store stamps the receipt time and routes to the
/// inter-tenant namespace when the declared conversation key names one.
pub async fn submit_message(
    Path((tenant_id, entrypoint_id)): Path<(String, String)>,
    Query(query): Query<SidQuery>,
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(body): Json<SubmitBody>,
) -> Result<Json<StoredMessage>, ServerError> {
    let scope = validate_entrypoint(&state, &tenant_id, &entrypoint_id).await?;
    let (_, session) = require_session(&state, &headers, query.sid.as_deref()).await?;
    require_auth(&session, &headers)?;

    // An admin reply may target another entrypoint, but only one that
    // exists: writing under an unknown hash would leave a label-less
    // entrypoint directory behind.
    let target_entrypoint = match body.ep_hash {
        Some(ep_hash) if session.admin => {
            if !state.store.entrypoint_exists(&scope.tenant, &ep_hash).await? {
                return Err(ServerError::NotFound);
            }
            ep_hash
        }
        _ => scope.entrypoint,
    };

    let stored = state
        .store
        .store_message(&scope.tenant, &target_entrypoint, body.encrypted_message)
        .await?;

    debug!(t = stored.t, "Stored message");
    Ok(Json(stored))
}
