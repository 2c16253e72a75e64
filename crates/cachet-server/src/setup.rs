//! Tenant setup flow.
//!
//! A pending tenant (provisioned out-of-band) is activated in one POST:
//! the tenant's freshly derived public key is recorded, its name is
//! sealed to the instance owner for the directory, its first entrypoint
//! label is sealed to its own key, and the setup message opens the
//! inter-tenant conversation. The GET half hands out the session and
//! CSRF token the POST must echo.

use axum::{
    extract::{Path, Query, State},
    http::HeaderMap,
    Json,
};
use serde::{Deserialize, Serialize};
use tracing::info;

use cachet_shared::crypto::{hash_id, parse_public_key_hex, random_token, seal};
use cachet_shared::protocol::DraftMessage;
use cachet_store::StoreError;

use crate::api::require_session;
use crate::api::AppState;
use crate::error::ServerError;
use crate::handshake::SidQuery;

#[derive(Serialize)]
pub struct SetupContext {
    pub tenant: String,
    pub sid: String,
    #[serde(rename = "csrfToken")]
    pub csrf_token: String,
    #[serde(rename = "instanceOwnerPk")]
    pub instance_owner_pk: String,
}

#[derive(Deserialize)]
pub struct SetupBody {
    /// First message of the tenant's inter-tenant conversation; its `k`
    /// is the tenant's public key.
    pub msg: DraftMessage,
    /// Label of the tenant's first entrypoint.
    pub entrypoint: String,
}

/// Start the setup flow for a pending tenant: a fresh session, a CSRF
/// token bound to it, and the instance owner key the client seals the
/// tenant name to.
pub async fn setup_start(
    Path(tenant_id): Path<String>,
    State(state): State<AppState>,
) -> Result<Json<SetupContext>, ServerError> {
    let tenant = hash_id(&tenant_id);
    if !state.store.tenant_pending(&tenant).await? {
        return Err(ServerError::NotFound);
    }

    let instance_owner_pk = match state.store.instance_owner_pk().await {
        Ok(pk) => pk,
        Err(StoreError::NotFound) => {
            return Err(ServerError::Internal(
                "instance owner key not provisioned".to_string(),
            ))
        }
        Err(e) => return Err(e.into()),
    };

    let sid = state.sessions.create().await;
    let csrf_token = random_token();
    state
        .sessions
        .update(&sid, |session| {
            session.csrf_token = Some(csrf_token.clone())
        })
        .await;

    info!(tenant = %tenant, "Setup flow started");
    Ok(Json(SetupContext {
        tenant: tenant_id,
        sid,
        csrf_token,
        instance_owner_pk,
    }))
}

/// Activate a pending tenant. Requires the CSRF token from the matching
/// GET; responds with the path of the tenant's new inbox.
pub async fn setup_submit(
    Path(tenant_id): Path<String>,
    Query(query): Query<SidQuery>,
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(body): Json<SetupBody>,
) -> Result<String, ServerError> {
    let (_, session) = require_session(&state, &headers, query.sid.as_deref()).await?;

    let supplied_csrf = headers.get("csrf").and_then(|v| v.to_str().ok());
    if supplied_csrf.is_none() || session.csrf_token.as_deref() != supplied_csrf {
        return Err(ServerError::BadRequest("csrf token mismatch".to_string()));
    }

    let tenant = hash_id(&tenant_id);
    if !state.store.tenant_pending(&tenant).await? {
        return Err(ServerError::NotFound);
    }

    let owner_pk = parse_public_key_hex(&state.store.instance_owner_pk().await?)?;
    let sealed_tenant_name = seal(tenant_id.trim().as_bytes(), &owner_pk)?;

    let tenant_pk = parse_public_key_hex(&body.msg.k)?;
    let sealed_label = seal(body.entrypoint.trim().as_bytes(), &tenant_pk)?;
    let entrypoint_hash = hash_id(&body.entrypoint);

    state
        .store
        .create_tenant(
            &tenant,
            &body.msg.k,
            &hex::encode(sealed_tenant_name),
            &entrypoint_hash,
            &hex::encode(sealed_label),
        )
        .await?;
    state.tenant_cache.invalidate().await;

    state.store.store_inter_tenant_message(body.msg).await?;

    info!(tenant = %tenant, "Tenant setup complete");
    Ok(format!("/{}/{}", tenant_id, body.entrypoint))
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use axum::http::HeaderValue;
    use tempfile::TempDir;

    use cachet_store::Store;

    use crate::captcha::MathCaptcha;
    use crate::config::ServerConfig;
    use crate::session::SessionStore;
    use crate::tenant_cache::TenantCache;

    use super::*;

    const TENANT: &str = "newco";

    fn tenant_pk() -> String {
        "ab".repeat(32)
    }

    async fn pending_state() -> (AppState, TempDir) {
        let dir = TempDir::new().unwrap();
        let store = Store::open(dir.path().to_path_buf()).await.unwrap();

        store.set_instance_owner(&"0f".repeat(32)).await.unwrap();
        store.create_pending_tenant(&hash_id(TENANT)).await.unwrap();

        let state = AppState {
            store,
            sessions: SessionStore::new(),
            tenant_cache: TenantCache::new(),
            captcha: Arc::new(MathCaptcha),
            config: Arc::new(ServerConfig::default()),
        };
        (state, dir)
    }

    fn setup_body() -> SetupBody {
        SetupBody {
            msg: DraftMessage {
                k: tenant_pk(),
                n: "cd".repeat(24),
                m: "aabb".to_string(),
                f: None,
            },
            entrypoint: "Contact".to_string(),
        }
    }

    fn submit_headers(sid: &str, csrf: &str) -> HeaderMap {
        let mut headers = HeaderMap::new();
        headers.insert("sid", HeaderValue::from_str(sid).unwrap());
        headers.insert("csrf", HeaderValue::from_str(csrf).unwrap());
        headers
    }

    #[tokio::test]
    async fn test_full_setup_flow_activates_tenant() {
        let (state, _dir) = pending_state().await;

        let Json(context) = setup_start(
            Path(TENANT.to_string()),
            State(state.clone()),
        )
        .await
        .unwrap();
        assert_eq!(context.tenant, TENANT);
        assert_eq!(context.instance_owner_pk, "0f".repeat(32));

        let path = setup_submit(
            Path(TENANT.to_string()),
            Query(SidQuery { sid: None }),
            State(state.clone()),
            submit_headers(&context.sid, &context.csrf_token),
            Json(setup_body()),
        )
        .await
        .unwrap();
        assert_eq!(path, "/newco/Contact");

        let tenant = hash_id(TENANT);
        assert!(!state.store.tenant_pending(&tenant).await.unwrap());
        assert_eq!(state.store.tenant_pk(&tenant).await.unwrap(), tenant_pk());
        assert!(state
            .store
            .entrypoint_exists(&tenant, &hash_id("Contact"))
            .await
            .unwrap());

        // the setup message opened the inter-tenant conversation
        let convo = state
            .store
            .inter_tenant_conversation(&tenant_pk(), 0, false)
            .await
            .unwrap();
        assert_eq!(convo.messages.len(), 1);
    }

    #[tokio::test]
    async fn test_submit_rejects_wrong_csrf() {
        let (state, _dir) = pending_state().await;

        let Json(context) = setup_start(
            Path(TENANT.to_string()),
            State(state.clone()),
        )
        .await
        .unwrap();

        let result = setup_submit(
            Path(TENANT.to_string()),
            Query(SidQuery { sid: None }),
            State(state.clone()),
            submit_headers(&context.sid, "not-the-token"),
            Json(setup_body()),
        )
        .await;
        assert!(matches!(result, Err(ServerError::BadRequest(_))));
        assert!(state
            .store
            .tenant_pending(&hash_id(TENANT))
            .await
            .unwrap());
    }

    #[tokio::test]
    async fn test_start_requires_pending_tenant() {
        let (state, _dir) = pending_state().await;

        let result = setup_start(Path("unknown".to_string()), State(state)).await;
        assert!(matches!(result, Err(ServerError::NotFound)));
    }
}
