//! In-memory session state, keyed by an opaque session id.
//!
//! A session carries the pending captcha answer, the issued bearer token
//! and the role resolved from key comparison. Pure memory manipulation
//! behind a tokio `RwLock`; sessions live until process restart.

use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::RwLock;
use uuid::Uuid;

#[derive(Debug, Clone, Default)]
pub struct Session {
    /// Expected answer of the most recent captcha; single-use.
    pub captcha: Option<String>,
    /// Bearer token (hex) issued after a solved captcha.
    pub auth_token: Option<String>,
    /// CSRF token for the tenant setup flow.
    pub csrf_token: Option<String>,
    /// Caller public key matches the tenant public key.
    pub admin: bool,
    /// Caller public key matches the instance owner public key.
    pub instance_owner: bool,
    /// Caller public key, recorded once the role is resolved.
    pub pk: Option<String>,
}

#[derive(Clone, Default)]
pub struct SessionStore {
    sessions: Arc<RwLock<HashMap<String, Session>>>,
}

impl SessionStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a fresh session and return its id.
    pub async fn create(&self) -> String {
        let sid = Uuid::new_v4().simple().to_string();
        self.sessions
            .write()
            .await
            .insert(sid.clone(), Session::default());
        sid
    }

    pub async fn get(&self, sid: &str) -> Option<Session> {
        self.sessions.read().await.get(sid).cloned()
    }

    /// Mutate a session in place; returns false for an unknown id.
    pub async fn update<F>(&self, sid: &str, f: F) -> bool
    where
        F: FnOnce(&mut Session),
    {
        match self.sessions.write().await.get_mut(sid) {
            Some(session) => {
                f(session);
                true
            }
            None => false,
        }
    }

    /// Remove and return the pending captcha answer. Called on every
    /// authentication attempt, so one challenge can never be tried twice.
    pub async fn take_captcha(&self, sid: &str) -> Option<String> {
        self.sessions
            .write()
            .await
            .get_mut(sid)
            .and_then(|session| session.captcha.take())
    }
}
