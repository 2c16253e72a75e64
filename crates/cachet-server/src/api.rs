//! Router, shared state and the request guards every handler goes
//! through: entrypoint validation (before any session state is touched),
//! session lookup, and the constant-time bearer-token check.

use std::sync::Arc;

use axum::{
    extract::DefaultBodyLimit,
    http::{HeaderMap, Method},
    routing::{get, post},
    Json, Router,
};
use serde::Serialize;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::{debug, info};

use cachet_shared::crypto::hash_id;
use cachet_store::Store;

use crate::captcha::CaptchaGenerator;
use crate::config::ServerConfig;
use crate::convos;
use crate::entrypoints;
use crate::error::ServerError;
use crate::handshake;
use crate::session::{Session, SessionStore};
use crate::setup;
use crate::tenant_cache::TenantCache;

#[derive(Clone)]
pub struct AppState {
    pub store: Store,
    pub sessions: SessionStore,
    pub tenant_cache: TenantCache,
    pub captcha: Arc<dyn CaptchaGenerator>,
    pub config: Arc<ServerConfig>,
}

pub fn build_router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([Method::GET, Method::POST, Method::PUT, Method::DELETE])
        .allow_headers(Any);

    Router::new()
        .route("/health", get(health_check))
        .route(
            "/new/{tenant}",
            get(setup::setup_start).post(setup::setup_submit),
        )
        .route("/{tenant}/{entrypoint}/session", get(handshake::new_session))
        .route("/{tenant}/{entrypoint}/captcha", get(handshake::captcha))
        .route("/{tenant}/{entrypoint}/auth", get(handshake::authenticate))
        .route("/{tenant}/{entrypoint}/pk", get(handshake::tenant_public_key))
        .route(
            "/{tenant}/{entrypoint}/convos/latest",
            get(convos::latest_summaries),
        )
        .route(
            "/{tenant}/{entrypoint}/convos/{convo_id}",
            get(convos::conversation),
        )
        .route(
            "/{tenant}/{entrypoint}/convos/{convo_id}/message/{nonce}",
            get(convos::message_by_nonce),
        )
        .route("/{tenant}/{entrypoint}/message", post(convos::submit_message))
        .route(
            "/{tenant}/{entrypoint}/entrypoint",
            get(entrypoints::list)
                .put(entrypoints::create)
                .delete(entrypoints::remove),
        )
        .layer(DefaultBodyLimit::max(11 * 1024 * 1024))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Bind and run the HTTP server. Blocks until the listener fails.
pub async fn serve(state: AppState, addr: std::net::SocketAddr) -> anyhow::Result<()> {
    let router = build_router(state);
    let listener = tokio::net::TcpListener::bind(addr).await?;
    info!(%addr, "HTTP API listening");
    axum::serve(listener, router).await?;
    Ok(())
}

#[derive(Serialize)]
struct HealthResponse {
    status: &'static str,
    name: String,
    version: &'static str,
}

async fn health_check(
    axum::extract::State(state): axum::extract::State<AppState>,
) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        name: state.config.instance_name.clone(),
        version: env!("CARGO_PKG_VERSION"),
    })
}

/// The hashed routing identifiers of a validated request.
pub(crate) struct Scope {
    pub tenant: String,
    pub entrypoint: String,
}

/// Hash the route identifiers and check them against the tenant cache and
/// the entrypoint set. Runs before any session state is touched, so a
/// probe against an unknown tenant learns nothing.
pub(crate) async fn validate_entrypoint(
    state: &AppState,
    tenant_id: &str,
    entrypoint_id: &str,
) -> Result<Scope, ServerError> {
    if state.tenant_cache.is_empty().await {
        let active = state.store.active_tenants().await?;
        debug!(count = active.len(), "Loaded active tenants from disk");
        state.tenant_cache.populate(active).await;
    }

    let tenant = hash_id(tenant_id);
    let entrypoint = hash_id(entrypoint_id);

    if !state.tenant_cache.contains(&tenant).await
        || !state.store.entrypoint_exists(&tenant, &entrypoint).await?
    {
        return Err(ServerError::NotFound);
    }

    Ok(Scope { tenant, entrypoint })
}

/// Resolve the caller's session from the `sid` header (or query fallback).
pub(crate) async fn require_session(
    state: &AppState,
    headers: &HeaderMap,
    query_sid: Option<&str>,
) -> Result<(String, Session), ServerError> {
    let sid = headers
        .get("sid")
        .and_then(|v| v.to_str().ok())
        .or(query_sid)
        .ok_or(ServerError::NotFound)?;

    match state.sessions.get(sid).await {
        Some(session) => Ok((sid.to_string(), session)),
        None => {
            info!("Unknown session");
            Err(ServerError::NotFound)
        }
    }
}

/// Require the exact bearer token issued during the handshake.
pub(crate) fn require_auth(session: &Session, headers: &HeaderMap) -> Result<(), ServerError> {
    let supplied = headers
        .get("authorization")
        .and_then(|v| v.to_str().ok())
        .unwrap_or("");

    let Some(expected) = session.auth_token.as_deref() else {
        return Err(ServerError::Unauthorized);
    };

    // Constant-time comparison to prevent timing attacks on the token.
    use subtle::ConstantTimeEq;
    if supplied.len() != expected.len()
        || supplied.as_bytes().ct_eq(expected.as_bytes()).unwrap_u8() != 1
    {
        return Err(ServerError::Unauthorized);
    }

    Ok(())
}

/// Admin-only operations: listing all conversations, managing entrypoints.
pub(crate) fn require_admin(session: &Session) -> Result<(), ServerError> {
    if !session.admin {
        return Err(ServerError::Forbidden(
            "admin-only operation".to_string(),
        ));
    }
    Ok(())
}
