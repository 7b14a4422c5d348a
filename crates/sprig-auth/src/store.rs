//! On-disk session persistence.
//!
//! Two files under the storage dir (default `~/.sprig`): `profile.json`
//! with the signed-in user record and `token.json` with the bearer and
//! refresh tokens. They are written and cleared together; a restore needs
//! both. A file that fails to parse is treated as "no session" and the
//! store is wiped so the next start is clean.

use std::path::PathBuf;

use log::warn;
use serde::{Deserialize, Serialize};

use crate::error::AuthResult;
use crate::session::Profile;

const PROFILE_FILE: &str = "profile.json";
const TOKEN_FILE: &str = "token.json";

/// Persisted bearer token plus the refresh token needed to rotate it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoredToken {
    pub token: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub refresh_token: Option<String>,
    /// Unix seconds.
    pub expires_at: u64,
}

impl StoredToken {
    /// Still usable without a refresh? Considered stale five minutes before
    /// actual expiry.
    pub fn is_fresh(&self) -> bool {
        self.expires_at > now_unix() + 300
    }

    pub fn remaining_seconds(&self) -> i64 {
        self.expires_at as i64 - now_unix() as i64
    }
}

fn now_unix() -> u64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs()
}

#[derive(Debug, Clone)]
pub struct SessionStore {
    dir: PathBuf,
}

impl SessionStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    /// Default store location under the home directory.
    pub fn default_dir() -> PathBuf {
        dirs::home_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join(".sprig")
    }

    fn profile_path(&self) -> PathBuf {
        self.dir.join(PROFILE_FILE)
    }

    fn token_path(&self) -> PathBuf {
        self.dir.join(TOKEN_FILE)
    }

    /// Load the persisted session. Returns `None` when either file is
    /// missing. An unparseable file clears the whole store and also returns
    /// `None` — a broken record must never keep the client from reaching
    /// the sign-in screen.
    pub fn load(&self) -> AuthResult<Option<(Profile, StoredToken)>> {
        let profile_path = self.profile_path();
        let token_path = self.token_path();
        if !profile_path.exists() || !token_path.exists() {
            return Ok(None);
        }

        let profile = std::fs::read_to_string(&profile_path)?;
        let token = std::fs::read_to_string(&token_path)?;
        match (
            serde_json::from_str::<Profile>(&profile),
            serde_json::from_str::<StoredToken>(&token),
        ) {
            (Ok(profile), Ok(token)) => Ok(Some((profile, token))),
            (profile, token) => {
                let err = profile.err().or(token.err());
                warn!(
                    "Persisted session is malformed ({}), clearing store",
                    err.map(|e| e.to_string()).unwrap_or_default()
                );
                self.clear()?;
                Ok(None)
            }
        }
    }

    /// Last persisted bearer token, usable even when the profile is gone.
    /// This is the fallback path of the token provider.
    pub fn cached_token(&self) -> Option<StoredToken> {
        let content = std::fs::read_to_string(self.token_path()).ok()?;
        serde_json::from_str(&content).ok()
    }

    pub fn save_profile(&self, profile: &Profile) -> AuthResult<()> {
        self.write_json(&self.profile_path(), profile)
    }

    pub fn save_token(&self, token: &StoredToken) -> AuthResult<()> {
        self.write_json(&self.token_path(), token)
    }

    fn write_json<T: Serialize>(&self, path: &PathBuf, value: &T) -> AuthResult<()> {
        std::fs::create_dir_all(&self.dir)?;
        let content = serde_json::to_string_pretty(value)?;
        std::fs::write(path, content)?;

        // Tokens are credentials; keep them private (Unix only).
        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            let perms = std::fs::Permissions::from_mode(0o600);
            let _ = std::fs::set_permissions(path, perms);
        }

        Ok(())
    }

    /// Remove both files. Missing files are fine.
    pub fn clear(&self) -> AuthResult<()> {
        for path in [self.profile_path(), self.token_path()] {
            if path.exists() {
                std::fs::remove_file(&path)?;
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn profile() -> Profile {
        Profile {
            uid: "uid-1".to_string(),
            email: "ada@example.com".to_string(),
            display_name: "Ada".to_string(),
            photo_url: None,
        }
    }

    fn token(expires_in: u64) -> StoredToken {
        StoredToken {
            token: "tok".to_string(),
            refresh_token: Some("refresh".to_string()),
            expires_at: now_unix() + expires_in,
        }
    }

    #[test]
    fn test_roundtrip() {
        let dir = TempDir::new().unwrap();
        let store = SessionStore::new(dir.path());

        store.save_profile(&profile()).unwrap();
        store.save_token(&token(3600)).unwrap();

        let (loaded_profile, loaded_token) = store.load().unwrap().unwrap();
        assert_eq!(loaded_profile.uid, "uid-1");
        assert_eq!(loaded_token.token, "tok");
    }

    #[test]
    fn test_missing_files_is_no_session() {
        let dir = TempDir::new().unwrap();
        let store = SessionStore::new(dir.path());
        assert!(store.load().unwrap().is_none());

        // Only one of the two files is not a restorable session either.
        store.save_token(&token(3600)).unwrap();
        assert!(store.load().unwrap().is_none());
        // But the token is still available as a fallback credential.
        assert!(store.cached_token().is_some());
    }

    #[test]
    fn test_malformed_profile_clears_store() {
        let dir = TempDir::new().unwrap();
        let store = SessionStore::new(dir.path());
        store.save_token(&token(3600)).unwrap();
        std::fs::write(dir.path().join(PROFILE_FILE), "{not json").unwrap();

        assert!(store.load().unwrap().is_none());
        assert!(!dir.path().join(PROFILE_FILE).exists());
        assert!(!dir.path().join(TOKEN_FILE).exists());
    }

    #[test]
    fn test_clear_removes_both_files() {
        let dir = TempDir::new().unwrap();
        let store = SessionStore::new(dir.path());
        store.save_profile(&profile()).unwrap();
        store.save_token(&token(3600)).unwrap();

        store.clear().unwrap();
        assert!(store.load().unwrap().is_none());
        assert!(store.cached_token().is_none());
    }

    #[test]
    fn test_token_freshness() {
        // Expires in an hour: fresh.
        assert!(token(3600).is_fresh());
        // Expires in a minute: inside the refresh buffer.
        assert!(!token(60).is_fresh());
    }
}
