//! The anonymous handshake: captcha issuance, one-shot captcha
//! validation with sealed bearer-token minting, and role resolution by
//! public-key comparison.
//!
//! The server authenticates "a human solved this challenge" exactly once;
//! afterwards it authorizes by requiring the minted token verbatim on
//! every request. No password is ever stored: the token is returned
//! sealed to the caller's public key, so only the holder of the matching
//! secret key can present it in the clear.

use axum::{
    extract::{Path, Query, State},
    http::{header, HeaderMap, HeaderValue},
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use cachet_shared::crypto::{parse_public_key_hex, random_token, seal};
use cachet_store::StoreError;

use crate::api::{require_auth, require_session, validate_entrypoint, AppState};
use crate::error::ServerError;

#[derive(Serialize)]
pub struct SessionResponse {
    pub sid: String,
}

#[derive(Deserialize)]
pub struct SidQuery {
    pub sid: Option<String>,
}

#[derive(Deserialize)]
pub struct AuthQuery {
    pub sid: Option<String>,
    pub captcha: Option<String>,
    #[serde(rename = "clientPublic")]
    pub client_public: String,
}

#[derive(Deserialize)]
pub struct PkQuery {
    pub sid: Option<String>,
    #[serde(rename = "clientPublic")]
    pub client_public: String,
}

/// Bootstrap a browser session for a valid tenant/entrypoint pair.
pub async fn new_session(
    Path((tenant_id, entrypoint_id)): Path<(String, String)>,
    State(state): State<AppState>,
) -> Result<Json<SessionResponse>, ServerError> {
    validate_entrypoint(&state, &tenant_id, &entrypoint_id).await?;

    let sid = state.sessions.create().await;
    debug!(tenant = %tenant_id, "New session");

    Ok(Json(SessionResponse { sid }))
}

/// Issue a challenge, overwriting any prior pending answer: only the most
/// recent challenge is valid.
pub async fn captcha(
    Path((tenant_id, entrypoint_id)): Path<(String, String)>,
    Query(query): Query<SidQuery>,
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Result<Response, ServerError> {
    validate_entrypoint(&state, &tenant_id, &entrypoint_id).await?;
    let (sid, _) = require_session(&state, &headers, query.sid.as_deref()).await?;

    let challenge = state.captcha.generate();
    state
        .sessions
        .update(&sid, |session| session.captcha = Some(challenge.answer))
        .await;

    Ok((
        [(header::CONTENT_TYPE, "image/svg+xml")],
        challenge.svg,
    )
        .into_response())
}

/// Validate the solved captcha (single-use) and mint a bearer token
/// sealed to the caller's public key.
pub async fn authenticate(
    Path((tenant_id, entrypoint_id)): Path<(String, String)>,
    Query(query): Query<AuthQuery>,
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Result<Json<String>, ServerError> {
    validate_entrypoint(&state, &tenant_id, &entrypoint_id).await?;
    let (sid, _) = require_session(&state, &headers, query.sid.as_deref()).await?;

    // The pending answer is consumed whether or not this attempt succeeds,
    // so a challenge can never be guessed against twice.
    let expected = state
        .sessions
        .take_captcha(&sid)
        .await
        .ok_or(ServerError::CaptchaMismatch)?;
    let supplied = query.captcha.ok_or(ServerError::CaptchaMismatch)?;

    if supplied != expected {
        info!("Captcha mismatch");
        return Err(ServerError::CaptchaMismatch);
    }

    let token = random_token();
    let token_bytes = hex::decode(&token)
        .map_err(|e| ServerError::Internal(format!("token encoding: {e}")))?;

    state
        .sessions
        .update(&sid, |session| session.auth_token = Some(token))
        .await;

    let recipient = parse_public_key_hex(&query.client_public)?;
    let sealed = seal(&token_bytes, &recipient)?;

    debug!("Issued bearer token");
    Ok(Json(hex::encode(sealed)))
}

/// Reveal the tenant's public key and resolve the caller's role.
///
/// The role is recomputed from the raw key comparison on every call; the
/// bearer token alone does not encode it. `admin` iff the caller's key
/// equals the tenant key; instance ownership is additionally signalled
/// out-of-band via the `role` response header.
pub async fn tenant_public_key(
    Path((tenant_id, entrypoint_id)): Path<(String, String)>,
    Query(query): Query<PkQuery>,
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Result<Response, ServerError> {
    let scope = validate_entrypoint(&state, &tenant_id, &entrypoint_id).await?;
    let (sid, session) = require_session(&state, &headers, query.sid.as_deref()).await?;
    require_auth(&session, &headers)?;

    let tenant_pk = state.store.tenant_pk(&scope.tenant).await?;

    let admin = query.client_public == tenant_pk;
    let owner_pk = match state.store.instance_owner_pk().await {
        Ok(pk) => Some(pk),
        Err(StoreError::NotFound) => None,
        Err(e) => return Err(e.into()),
    };
    let instance_owner = admin && owner_pk.as_deref() == Some(query.client_public.as_str());

    state
        .sessions
        .update(&sid, |s| {
            s.admin = admin;
            s.instance_owner = instance_owner;
            s.pk = admin.then(|| tenant_pk.clone());
        })
        .await;

    if instance_owner {
        info!("Instance owner resolved");
    }

    let mut response = Json(tenant_pk).into_response();
    if instance_owner {
        response
            .headers_mut()
            .insert("role", HeaderValue::from_static("instanceOwner"));
    }
    Ok(response)
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use tempfile::TempDir;

    use cachet_shared::crypto::hash_id;
    use cachet_store::Store;

    use crate::captcha::MathCaptcha;
    use crate::config::ServerConfig;
    use crate::error::ServerError;
    use crate::session::SessionStore;
    use crate::tenant_cache::TenantCache;

    use super::*;

    const TENANT: &str = "acme";
    const EP: &str = "general";

    fn tenant_pk() -> String {
        "ab".repeat(32)
    }

    fn owner_pk() -> String {
        "0f".repeat(32)
    }

    async fn test_state() -> (AppState, TempDir) {
        let dir = TempDir::new().unwrap();
        let store = Store::open(dir.path().to_path_buf()).await.unwrap();

        let tenant = hash_id(TENANT);
        let ep = hash_id(EP);
        store.set_instance_owner(&owner_pk()).await.unwrap();
        store.create_pending_tenant(&tenant).await.unwrap();
        store
            .create_tenant(&tenant, &tenant_pk(), "7365616c6564", &ep, "6c6162656c")
            .await
            .unwrap();

        let state = AppState {
            store,
            sessions: SessionStore::new(),
            tenant_cache: TenantCache::new(),
            captcha: Arc::new(MathCaptcha),
            config: Arc::new(ServerConfig::default()),
        };
        (state, dir)
    }

    fn sid_headers(sid: &str) -> HeaderMap {
        let mut headers = HeaderMap::new();
        headers.insert("sid", HeaderValue::from_str(sid).unwrap());
        headers
    }

    async fn attempt(
        state: &AppState,
        sid: &str,
        answer: &str,
    ) -> Result<Json<String>, ServerError> {
        authenticate(
            Path((TENANT.to_string(), EP.to_string())),
            Query(AuthQuery {
                sid: None,
                captcha: Some(answer.to_string()),
                client_public: "12".repeat(32),
            }),
            State(state.clone()),
            sid_headers(sid),
        )
        .await
    }

    #[tokio::test]
    async fn test_failed_attempt_consumes_challenge() {
        let (state, _dir) = test_state().await;
        let sid = state.sessions.create().await;
        state
            .sessions
            .update(&sid, |s| s.captcha = Some("7".to_string()))
            .await;

        let wrong = attempt(&state, &sid, "8").await;
        assert!(matches!(wrong, Err(ServerError::CaptchaMismatch)));

        // the right answer no longer helps: the challenge is spent
        let right = attempt(&state, &sid, "7").await;
        assert!(matches!(right, Err(ServerError::CaptchaMismatch)));

        let session = state.sessions.get(&sid).await.unwrap();
        assert!(session.captcha.is_none());
        assert!(session.auth_token.is_none());
    }

    #[tokio::test]
    async fn test_correct_answer_mints_sealed_token() {
        let (state, _dir) = test_state().await;
        let sid = state.sessions.create().await;
        state
            .sessions
            .update(&sid, |s| s.captcha = Some("7".to_string()))
            .await;

        let Json(sealed_hex) = attempt(&state, &sid, "7").await.unwrap();
        // sealed wire = epk(32) + nonce(24) + ciphertext, hex-encoded
        let sealed = hex::decode(&sealed_hex).unwrap();
        assert!(sealed.len() > 32 + 24);

        let session = state.sessions.get(&sid).await.unwrap();
        let token = session.auth_token.unwrap();
        assert_eq!(token.len(), 64);
        assert!(session.captcha.is_none());
    }

    async fn resolve_role(state: &AppState, client_public: &str) -> (String, Response) {
        let sid = state.sessions.create().await;
        state
            .sessions
            .update(&sid, |s| s.auth_token = Some("deadbeef".to_string()))
            .await;

        let mut headers = sid_headers(&sid);
        headers.insert("authorization", HeaderValue::from_static("deadbeef"));

        let response = tenant_public_key(
            Path((TENANT.to_string(), EP.to_string())),
            Query(PkQuery {
                sid: None,
                client_public: client_public.to_string(),
            }),
            State(state.clone()),
            headers,
        )
        .await
        .unwrap();
        (sid, response)
    }

    #[tokio::test]
    async fn test_visitor_key_is_not_admin() {
        let (state, _dir) = test_state().await;

        let (sid, response) = resolve_role(&state, &"12".repeat(32)).await;
        assert!(response.headers().get("role").is_none());

        let session = state.sessions.get(&sid).await.unwrap();
        assert!(!session.admin);
        assert!(!session.instance_owner);
        assert!(session.pk.is_none());
    }

    #[tokio::test]
    async fn test_tenant_key_is_admin_but_not_owner() {
        let (state, _dir) = test_state().await;

        let (sid, response) = resolve_role(&state, &tenant_pk()).await;
        assert!(response.headers().get("role").is_none());

        let session = state.sessions.get(&sid).await.unwrap();
        assert!(session.admin);
        assert!(!session.instance_owner);
        assert_eq!(session.pk.as_deref(), Some(tenant_pk().as_str()));
    }

    #[tokio::test]
    async fn test_owner_running_own_tenant_gets_role_header() {
        let (state, _dir) = test_state().await;
        // degenerate deployment: the instance owner is also the tenant
        state.store.set_instance_owner(&tenant_pk()).await.unwrap();

        let (sid, response) = resolve_role(&state, &tenant_pk()).await;
        assert_eq!(
            response.headers().get("role").unwrap(),
            &HeaderValue::from_static("instanceOwner")
        );

        let session = state.sessions.get(&sid).await.unwrap();
        assert!(session.admin);
        assert!(session.instance_owner);
    }
}
