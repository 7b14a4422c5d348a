//! The session context: one shared handle holding the signed-in state,
//! passed down to whoever needs a token instead of living as ambient
//! global state. Token rotation and sign-out are published over a watch
//! channel so the UI observes them as notifications rather than being
//! mutated from arbitrary call sites.

use std::sync::Arc;

use log::{info, warn};
use serde::{Deserialize, Serialize};
use tokio::sync::{watch, RwLock};

use crate::error::AuthResult;
use crate::identity::{IdentityClient, SignIn, TokenGrant};
use crate::store::{SessionStore, StoredToken};

/// Identity fields consumed from the provider; nothing else of the
/// provider's user record is kept.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Profile {
    pub uid: String,
    pub email: String,
    pub display_name: String,
    #[serde(default)]
    pub photo_url: Option<String>,
}

impl Profile {
    /// Single-character avatar fallback, display name first, then email.
    pub fn initial(&self) -> char {
        self.display_name
            .chars()
            .next()
            .or_else(|| self.email.chars().next())
            .map(|c| c.to_ascii_uppercase())
            .unwrap_or('?')
    }
}

#[derive(Debug, Clone)]
struct SessionState {
    profile: Profile,
    token: StoredToken,
}

/// Shared session handle. Cheap to clone; all clones see the same state.
#[derive(Clone)]
pub struct SessionContext {
    identity: IdentityClient,
    store: SessionStore,
    state: Arc<RwLock<Option<SessionState>>>,
    notify: watch::Sender<Option<Profile>>,
}

impl SessionContext {
    pub fn new(identity: IdentityClient, store: SessionStore) -> Self {
        let (notify, _) = watch::channel(None);
        Self {
            identity,
            store,
            state: Arc::new(RwLock::new(None)),
            notify,
        }
    }

    /// Observe the current profile; `None` means signed out. Every token
    /// rotation re-publishes the value so subscribers can re-read state.
    pub fn subscribe(&self) -> watch::Receiver<Option<Profile>> {
        self.notify.subscribe()
    }

    pub fn identity(&self) -> &IdentityClient {
        &self.identity
    }

    pub async fn profile(&self) -> Option<Profile> {
        self.state.read().await.as_ref().map(|s| s.profile.clone())
    }

    /// Eager restore from disk on startup. A malformed store has already
    /// been cleared by the store itself; the result is simply "signed out".
    pub async fn restore(&self) -> AuthResult<Option<Profile>> {
        let Some((profile, token)) = self.store.load()? else {
            return Ok(None);
        };

        info!("Restored session for {}", profile.email);
        let mut state = self.state.write().await;
        *state = Some(SessionState {
            profile: profile.clone(),
            token,
        });
        drop(state);
        let _ = self.notify.send(Some(profile.clone()));
        Ok(Some(profile))
    }

    /// Finish a sign-in: persist profile and token, publish the new state.
    pub async fn complete_sign_in(&self, sign_in: SignIn) -> AuthResult<Profile> {
        let token = stored_from_grant(&sign_in.grant, None);
        self.store.save_profile(&sign_in.profile)?;
        self.store.save_token(&token)?;

        let mut state = self.state.write().await;
        *state = Some(SessionState {
            profile: sign_in.profile.clone(),
            token,
        });
        drop(state);

        info!("Signed in as {}", sign_in.profile.email);
        let _ = self.notify.send(Some(sign_in.profile.clone()));
        Ok(sign_in.profile)
    }

    /// Sign out: revoke the refresh token when the provider supports it,
    /// then clear disk and memory.
    pub async fn sign_out(&self) {
        let refresh_token = {
            let state = self.state.read().await;
            state
                .as_ref()
                .and_then(|s| s.token.refresh_token.clone())
        };
        if let Some(refresh_token) = refresh_token {
            if let Err(e) = self.identity.revoke(&refresh_token).await {
                warn!("Token revoke failed: {}", e);
            }
        }
        self.clear().await;
    }

    /// Drop the session entirely: disk (token + profile) and memory, and
    /// notify subscribers. Also the terminal state of an unrecoverable
    /// authorization failure.
    pub async fn clear(&self) {
        if let Err(e) = self.store.clear() {
            warn!("Failed to clear session store: {}", e);
        }
        let mut state = self.state.write().await;
        *state = None;
        drop(state);
        let _ = self.notify.send(None);
    }

    /// Resolve a bearer token for an outgoing request.
    ///
    /// Prefers the live session (refreshing when forced or stale), falls
    /// back to the last persisted token, and returns `None` when neither
    /// path yields one — callers send the request unauthenticated.
    pub async fn authorization_token(&self, force_refresh: bool) -> Option<String> {
        if let Some(token) = self.live_token(force_refresh).await {
            return Some(token);
        }
        self.store.cached_token().map(|t| t.token)
    }

    async fn live_token(&self, force_refresh: bool) -> Option<String> {
        let (current, refresh_token) = {
            let state = self.state.read().await;
            let session = state.as_ref()?;
            (session.token.clone(), session.token.refresh_token.clone())
        };

        if !force_refresh && current.is_fresh() {
            return Some(current.token);
        }

        let refresh_token = refresh_token?;
        match self.identity.refresh(&refresh_token).await {
            Ok(grant) => {
                let rotated = stored_from_grant(&grant, Some(refresh_token));
                if let Err(e) = self.store.save_token(&rotated) {
                    warn!("Failed to persist rotated token: {}", e);
                }

                let mut state = self.state.write().await;
                let profile = match state.as_mut() {
                    Some(session) => {
                        session.token = rotated.clone();
                        Some(session.profile.clone())
                    }
                    None => None,
                };
                drop(state);

                // Rotation notification; same profile, fresh token.
                let _ = self.notify.send(profile);
                Some(rotated.token)
            }
            Err(e) => {
                warn!("Token refresh failed: {}", e);
                None
            }
        }
    }
}

/// Providers may or may not rotate the refresh token with each grant; keep
/// the old one when they do not.
fn stored_from_grant(grant: &TokenGrant, previous_refresh: Option<String>) -> StoredToken {
    let now = std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs();
    StoredToken {
        token: grant.id_token.clone(),
        refresh_token: grant.refresh_token.clone().or(previous_refresh),
        expires_at: now + grant.expires_in,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::identity::IdentityEndpoints;
    use tempfile::TempDir;

    fn context(dir: &TempDir, base_url: &str) -> SessionContext {
        let identity = IdentityClient::new(IdentityEndpoints {
            client_id: "sprig-test".to_string(),
            device_authorization_url: format!("{}/oauth/device/code", base_url),
            token_url: format!("{}/oauth/token", base_url),
            revoke_url: None,
        });
        SessionContext::new(identity, SessionStore::new(dir.path()))
    }

    fn profile() -> Profile {
        Profile {
            uid: "uid-1".to_string(),
            email: "ada@example.com".to_string(),
            display_name: "Ada".to_string(),
            photo_url: None,
        }
    }

    #[tokio::test]
    async fn test_no_session_yields_no_token_silently() {
        let dir = TempDir::new().unwrap();
        let ctx = context(&dir, "http://127.0.0.1:1");
        assert!(ctx.authorization_token(false).await.is_none());
        assert!(ctx.authorization_token(true).await.is_none());
    }

    #[tokio::test]
    async fn test_falls_back_to_persisted_token_without_live_session() {
        let dir = TempDir::new().unwrap();
        let store = SessionStore::new(dir.path());
        store
            .save_token(&StoredToken {
                token: "persisted".to_string(),
                refresh_token: None,
                expires_at: 0,
            })
            .unwrap();

        let ctx = context(&dir, "http://127.0.0.1:1");
        assert_eq!(
            ctx.authorization_token(false).await.as_deref(),
            Some("persisted")
        );
    }

    #[tokio::test]
    async fn test_restore_requires_both_files() {
        let dir = TempDir::new().unwrap();
        let store = SessionStore::new(dir.path());
        store.save_profile(&profile()).unwrap();

        let ctx = context(&dir, "http://127.0.0.1:1");
        assert!(ctx.restore().await.unwrap().is_none());
        assert!(ctx.profile().await.is_none());
    }

    #[tokio::test]
    async fn test_forced_refresh_rotates_and_persists() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("POST", "/oauth/token")
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(r#"{"id_token": "rotated", "expires_in": 3600}"#)
            .create_async()
            .await;

        let dir = TempDir::new().unwrap();
        let store = SessionStore::new(dir.path());
        store.save_profile(&profile()).unwrap();
        store
            .save_token(&StoredToken {
                token: "old".to_string(),
                refresh_token: Some("refresh-1".to_string()),
                expires_at: u64::MAX,
            })
            .unwrap();

        let ctx = context(&dir, &server.url());
        ctx.restore().await.unwrap();

        // Fresh token is reused without hitting the provider.
        assert_eq!(ctx.authorization_token(false).await.as_deref(), Some("old"));

        // Forced path rotates, persists, and keeps the old refresh token.
        assert_eq!(
            ctx.authorization_token(true).await.as_deref(),
            Some("rotated")
        );
        let cached = store.cached_token().unwrap();
        assert_eq!(cached.token, "rotated");
        assert_eq!(cached.refresh_token.as_deref(), Some("refresh-1"));
    }

    #[tokio::test]
    async fn test_clear_notifies_subscribers() {
        let dir = TempDir::new().unwrap();
        let store = SessionStore::new(dir.path());
        store.save_profile(&profile()).unwrap();
        store
            .save_token(&StoredToken {
                token: "tok".to_string(),
                refresh_token: None,
                expires_at: u64::MAX,
            })
            .unwrap();

        let ctx = context(&dir, "http://127.0.0.1:1");
        let mut rx = ctx.subscribe();
        ctx.restore().await.unwrap();
        rx.changed().await.unwrap();
        assert!(rx.borrow().is_some());

        ctx.clear().await;
        rx.changed().await.unwrap();
        assert!(rx.borrow().is_none());
        assert!(store.load().unwrap().is_none());
    }
}
