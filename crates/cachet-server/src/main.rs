//! # cachet-server
//!
//! Anonymous contact-form messaging server.
//!
//! This binary provides:
//! - **Multi-tenant routing** over hashed tenant and entrypoint names, so
//!   the on-disk directory never learns who it hosts
//! - **Captcha handshake** minting bearer tokens sealed to the caller's
//!   public key (no accounts, no passwords stored)
//! - **End-to-end encrypted message store**: every payload is ciphertext
//!   before it reaches this process
//! - **REST API** (axum) for the session handshake, conversation reads
//!   with size-threshold elision, message submission and entrypoint
//!   management
//! - **Tenant setup flow** activating pre-provisioned tenants and opening
//!   their channel to the instance owner

mod api;
mod captcha;
mod config;
mod convos;
mod entrypoints;
mod error;
mod handshake;
mod session;
mod setup;
mod tenant_cache;

use std::sync::Arc;

use tracing::info;
use tracing_subscriber::EnvFilter;

use cachet_store::Store;

use crate::api::AppState;
use crate::captcha::MathCaptcha;
use crate::config::ServerConfig;
use crate::session::SessionStore;
use crate::tenant_cache::TenantCache;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // -----------------------------------------------------------------------
    // 1. Initialize tracing (respects RUST_LOG env var)
    // -----------------------------------------------------------------------
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("info,cachet_server=debug")),
        )
        .init();

    info!("Starting Cachet server v{}", env!("CARGO_PKG_VERSION"));

    // -----------------------------------------------------------------------
    // 2. Load configuration
    // -----------------------------------------------------------------------
    let config = ServerConfig::from_env();
    info!(?config, "Loaded configuration");

    // -----------------------------------------------------------------------
    // 3. Initialize subsystems
    // -----------------------------------------------------------------------

    // Store (creates base directories if missing)
    let store = Store::open(config.data_dir.clone()).await?;

    let app_state = AppState {
        store,
        sessions: SessionStore::new(),
        tenant_cache: TenantCache::new(),
        captcha: Arc::new(MathCaptcha),
        config: Arc::new(config.clone()),
    };

    // -----------------------------------------------------------------------
    // 4. Run the HTTP API server (blocks until shutdown)
    // -----------------------------------------------------------------------
    tokio::select! {
        result = api::serve(app_state, config.http_addr) => {
            if let Err(e) = result {
                tracing::error!(error = %e, "HTTP server failed");
                return Err(e);
            }
        }
        _ = tokio::signal::ctrl_c() => {
            info!("Received Ctrl+C, shutting down");
        }
    }

    Ok(())
}
