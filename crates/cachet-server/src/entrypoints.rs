//! Entrypoint directory management.
//!
//! Labels are sealed to the tenant key before they touch disk, so the
//! store only ever sees the hash and an opaque ciphertext. Every handler
//! responds with the full post-state map so the caller never needs a
//! follow-up read.

use std::collections::BTreeMap;

use axum::{
    extract::{Path, Query, State},
    http::{HeaderMap, StatusCode},
    Json,
};
use serde::Deserialize;
use tracing::info;

use cachet_shared::crypto::{hash_id, parse_public_key_hex, seal};

use crate::api::{require_admin, require_auth, require_session, validate_entrypoint, AppState};
use crate::error::ServerError;
use crate::handshake::SidQuery;

#[derive(Deserialize)]
pub struct EntrypointBody {
    /// Human-readable label; hashed for routing, sealed for storage.
    pub entrypoint: String,
}

/// Map of entrypoint hash to sealed label.
pub async fn list(
    Path((tenant_id, entrypoint_id)): Path<(String, String)>,
    Query(query): Query<SidQuery>,
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Result<Json<BTreeMap<String, String>>, ServerError> {
    let scope = validate_entrypoint(&state, &tenant_id, &entrypoint_id).await?;
    let (_, session) = require_session(&state, &headers, query.sid.as_deref()).await?;
    require_auth(&session, &headers)?;

    let entrypoints = state.store.tenant_entrypoints(&scope.tenant).await?;
    Ok(Json(entrypoints))
}

/// Create an entrypoint from its label. The label is sealed to the
/// tenant's stored public key, never to anything the caller supplies.
pub async fn create(
    Path((tenant_id, entrypoint_id)): Path<(String, String)>,
    Query(query): Query<SidQuery>,
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(body): Json<EntrypointBody>,
) -> Result<(StatusCode, Json<BTreeMap<String, String>>), ServerError> {
    let scope = validate_entrypoint(&state, &tenant_id, &entrypoint_id).await?;
    let (_, session) = require_session(&state, &headers, query.sid.as_deref()).await?;
    require_auth(&session, &headers)?;
    require_admin(&session)?;

    let entrypoint_hash = hash_id(&body.entrypoint);

    let tenant_pk = state.store.tenant_pk(&scope.tenant).await?;
    let recipient = parse_public_key_hex(&tenant_pk)?;
    let sealed_label = seal(body.entrypoint.trim().as_bytes(), &recipient)?;

    state
        .store
        .create_entrypoint(&scope.tenant, &entrypoint_hash, &hex::encode(sealed_label))
        .await?;
    info!(entrypoint = %entrypoint_hash, "Entrypoint created");

    let entrypoints = state.store.tenant_entrypoints(&scope.tenant).await?;
    Ok((StatusCode::CREATED, Json(entrypoints)))
}

/// Delete an entrypoint and its conversations. Deleting an absent
/// entrypoint succeeds.
pub async fn remove(
    Path((tenant_id, entrypoint_id)): Path<(String, String)>,
    Query(query): Query<SidQuery>,
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(body): Json<EntrypointBody>,
) -> Result<Json<BTreeMap<String, String>>, ServerError> {
    let scope = validate_entrypoint(&state, &tenant_id, &entrypoint_id).await?;
    let (_, session) = require_session(&state, &headers, query.sid.as_deref()).await?;
    require_auth(&session, &headers)?;
    require_admin(&session)?;

    let entrypoint_hash = hash_id(&body.entrypoint);
    state
        .store
        .delete_entrypoint(&scope.tenant, &entrypoint_hash)
        .await?;
    info!(entrypoint = %entrypoint_hash, "Entrypoint deleted");

    let entrypoints = state.store.tenant_entrypoints(&scope.tenant).await?;
    Ok(Json(entrypoints))
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

    const TENANT: &str = "acme";
    const EP: &str = "general";

    async fn test_state() -> (AppState, TempDir) {
        let dir = TempDir::new().unwrap();
        let store = Store::open(dir.path().to_path_buf()).await.unwrap();

        let tenant = hash_id(TENANT);
        let ep = hash_id(EP);
        store.set_instance_owner(&"0f".repeat(32)).await.unwrap();
        store.create_pending_tenant(&tenant).await.unwrap();
        store
            .create_tenant(&tenant, &"ab".repeat(32), "7365616c6564", &ep, "6c6162656c")
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

    async fn authed_session(state: &AppState, admin: bool) -> HeaderMap {
        let sid = state.sessions.create().await;
        state
            .sessions
            .update(&sid, |s| {
                s.auth_token = Some("deadbeef".to_string());
                s.admin = admin;
            })
            .await;

        let mut headers = HeaderMap::new();
        headers.insert("sid", HeaderValue::from_str(&sid).unwrap());
        headers.insert("authorization", HeaderValue::from_static("deadbeef"));
        headers
    }

    fn sid_query() -> Query<SidQuery> {
        Query(SidQuery { sid: None })
    }

    #[tokio::test]
    async fn test_create_list_remove_lifecycle() {
        let (state, _dir) = test_state().await;
        let headers = authed_session(&state, true).await;
        let sales_hash = hash_id("Sales");

        let (status, Json(after_create)) = create(
            Path((TENANT.to_string(), EP.to_string())),
            sid_query(),
            State(state.clone()),
            headers.clone(),
            Json(EntrypointBody {
                entrypoint: "Sales".to_string(),
            }),
        )
        .await
        .unwrap();
        assert_eq!(status, StatusCode::CREATED);
        assert_eq!(after_create.len(), 2);
        // sealed label stored under the normalized hash
        assert!(after_create.contains_key(&sales_hash));

        let Json(listed) = list(
            Path((TENANT.to_string(), EP.to_string())),
            sid_query(),
            State(state.clone()),
            headers.clone(),
        )
        .await
        .unwrap();
        assert_eq!(listed, after_create);

        let Json(after_remove) = remove(
            Path((TENANT.to_string(), EP.to_string())),
            sid_query(),
            State(state),
            headers,
            Json(EntrypointBody {
                entrypoint: "Sales".to_string(),
            }),
        )
        .await
        .unwrap();
        assert_eq!(after_remove.len(), 1);
        assert!(!after_remove.contains_key(&sales_hash));
    }

    #[tokio::test]
    async fn test_duplicate_create_conflicts() {
        let (state, _dir) = test_state().await;
        let headers = authed_session(&state, true).await;

        let result = create(
            Path((TENANT.to_string(), EP.to_string())),
            sid_query(),
            State(state),
            headers,
            Json(EntrypointBody {
                entrypoint: EP.to_string(),
            }),
        )
        .await;
        assert!(matches!(
            result,
            Err(ServerError::Store(cachet_store::StoreError::Conflict(_)))
        ));
    }

    #[tokio::test]
    async fn test_management_is_admin_only() {
        let (state, _dir) = test_state().await;
        let headers = authed_session(&state, false).await;

        let result = create(
            Path((TENANT.to_string(), EP.to_string())),
            sid_query(),
            State(state),
            headers,
            Json(EntrypointBody {
                entrypoint: "Sales".to_string(),
            }),
        )
        .await;
        assert!(matches!(result, Err(ServerError::Forbidden(_))));
    }
}
