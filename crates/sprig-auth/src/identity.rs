//! Identity provider client.
//!
//! The provider is opaque to the rest of the client: sign-in is an OAuth
//! device-code flow (the terminal equivalent of a browser popup), refresh
//! is a `refresh_token` grant against the same token endpoint, and both
//! return a short-lived bearer token. Only the returned identity fields
//! and tokens are consumed here.

use log::debug;
use reqwest::Client;
use serde::Deserialize;
use tokio::time::{sleep, Duration};

use crate::error::{AuthError, AuthResult};
use crate::session::Profile;

/// Provider endpoints, usually taken from the config file.
#[derive(Debug, Clone)]
pub struct IdentityEndpoints {
    pub client_id: String,
    pub device_authorization_url: String,
    pub token_url: String,
    pub revoke_url: Option<String>,
}

/// Device authorization handed to the user: open the URI, type the code.
#[derive(Debug, Clone, Deserialize)]
pub struct DeviceAuthorization {
    pub device_code: String,
    pub user_code: String,
    pub verification_uri: String,
    #[serde(rename = "expires_in")]
    pub expires_in: u64,
    pub interval: u64,
}

/// A completed sign-in: who the user is plus their first token.
#[derive(Debug, Clone)]
pub struct SignIn {
    pub profile: Profile,
    pub grant: TokenGrant,
}

/// Token material returned by the token endpoint.
#[derive(Debug, Clone)]
pub struct TokenGrant {
    pub id_token: String,
    pub refresh_token: Option<String>,
    pub expires_in: u64,
}

/// Raw token endpoint response; carries either a grant or an OAuth error.
#[derive(Debug, Deserialize)]
struct TokenResponse {
    id_token: Option<String>,
    refresh_token: Option<String>,
    expires_in: Option<u64>,
    #[serde(default)]
    profile: Option<Profile>,
    error: Option<String>,
    #[serde(rename = "error_description")]
    error_description: Option<String>,
}

#[derive(Debug, Clone)]
pub struct IdentityClient {
    endpoints: IdentityEndpoints,
    http: Client,
}

impl IdentityClient {
    pub fn new(endpoints: IdentityEndpoints) -> Self {
        Self {
            endpoints,
            http: Client::new(),
        }
    }

    /// Start the device-code flow.
    pub async fn begin_sign_in(&self) -> AuthResult<DeviceAuthorization> {
        let params = [
            ("client_id", self.endpoints.client_id.as_str()),
            ("scope", "openid email profile"),
        ];

        let response = self
            .http
            .post(&self.endpoints.device_authorization_url)
            .header("Accept", "application/json")
            .form(&params)
            .send()
            .await
            .map_err(|e| AuthError::Network(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            return Err(AuthError::SignIn(format!(
                "Device code request failed: HTTP {} - {}",
                status, text
            )));
        }

        response
            .json()
            .await
            .map_err(|e| AuthError::SignIn(format!("JSON parse error: {}", e)))
    }

    /// Poll the token endpoint until the user authorizes the device code.
    ///
    /// Handles the standard pending/slow-down responses and gives up when
    /// the code expires or the user denies access.
    pub async fn poll_sign_in(&self, device: &DeviceAuthorization) -> AuthResult<SignIn> {
        let params = [
            ("client_id", self.endpoints.client_id.as_str()),
            ("device_code", device.device_code.as_str()),
            ("grant_type", "urn:ietf:params:oauth:grant-type:device_code"),
        ];

        let start = std::time::Instant::now();
        let max_duration = Duration::from_secs(device.expires_in);
        let poll_interval = Duration::from_secs(device.interval.max(5)); // Minimum 5 seconds

        loop {
            if start.elapsed() > max_duration {
                return Err(AuthError::DeviceCodeExpired);
            }

            let response = self
                .http
                .post(&self.endpoints.token_url)
                .header("Accept", "application/json")
                .form(&params)
                .send()
                .await
                .map_err(|e| AuthError::Network(e.to_string()))?;

            let token_response: TokenResponse = response
                .json()
                .await
                .map_err(|e| AuthError::SignIn(format!("JSON parse error: {}", e)))?;

            if let Some(id_token) = token_response.id_token {
                let profile = token_response
                    .profile
                    .ok_or_else(|| AuthError::SignIn("Token response carried no profile".to_string()))?;
                return Ok(SignIn {
                    profile,
                    grant: TokenGrant {
                        id_token,
                        refresh_token: token_response.refresh_token,
                        expires_in: token_response.expires_in.unwrap_or(3600),
                    },
                });
            }

            if let Some(error) = token_response.error {
                match error.as_str() {
                    "authorization_pending" => {
                        debug!("Authorization pending, polling again");
                    }
                    "slow_down" => {
                        debug!("Server requested slower polling");
                        sleep(Duration::from_secs(device.interval + 5)).await;
                        continue;
                    }
                    "expired_token" => {
                        return Err(AuthError::DeviceCodeExpired);
                    }
                    "access_denied" => {
                        return Err(AuthError::AccessDenied);
                    }
                    _ => {
                        let desc = token_response.error_description.unwrap_or_default();
                        return Err(AuthError::SignIn(format!("{} - {}", error, desc)));
                    }
                }
            }

            sleep(poll_interval).await;
        }
    }

    /// Exchange a refresh token for a rotated bearer token.
    pub async fn refresh(&self, refresh_token: &str) -> AuthResult<TokenGrant> {
        let params = [
            ("client_id", self.endpoints.client_id.as_str()),
            ("refresh_token", refresh_token),
            ("grant_type", "refresh_token"),
        ];

        let response = self
            .http
            .post(&self.endpoints.token_url)
            .header("Accept", "application/json")
            .form(&params)
            .send()
            .await
            .map_err(|e| AuthError::Network(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            return Err(AuthError::Refresh(format!("HTTP {} - {}", status, text)));
        }

        let token_response: TokenResponse = response
            .json()
            .await
            .map_err(|e| AuthError::Refresh(format!("JSON parse error: {}", e)))?;

        match token_response.id_token {
            Some(id_token) => Ok(TokenGrant {
                id_token,
                refresh_token: token_response.refresh_token,
                expires_in: token_response.expires_in.unwrap_or(3600),
            }),
            None => {
                let error = token_response.error.unwrap_or_default();
                let desc = token_response.error_description.unwrap_or_default();
                Err(AuthError::Refresh(format!("{} - {}", error, desc)))
            }
        }
    }

    /// Best-effort revoke; providers without a revoke endpoint are fine.
    pub async fn revoke(&self, refresh_token: &str) -> AuthResult<()> {
        let Some(revoke_url) = self.endpoints.revoke_url.as_deref() else {
            return Ok(());
        };

        let params = [
            ("client_id", self.endpoints.client_id.as_str()),
            ("token", refresh_token),
        ];

        self.http
            .post(revoke_url)
            .form(&params)
            .send()
            .await
            .map_err(|e| AuthError::Network(e.to_string()))?;

        Ok(())
    }
}
