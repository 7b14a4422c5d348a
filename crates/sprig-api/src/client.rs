use log::{debug, warn};
use reqwest::{Client, Method, Response, StatusCode};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::json;
use std::time::Duration;

use sprig_auth::SessionContext;
use sprig_core::Entry;

use crate::error::{ApiError, ApiResult};

/// Client for the entry API.
#[derive(Clone)]
pub struct EntryClient {
    base_url: String,
    http: Client,
    session: SessionContext,
}

/// Response to entry creation; the backend echoes the classified entry.
#[derive(Debug, Clone, Deserialize)]
pub struct CreateEntryResponse {
    pub success: bool,
    #[serde(default)]
    pub task: Option<Entry>,
}

#[derive(Debug, Deserialize)]
struct StatusResponse {
    #[serde(default)]
    success: bool,
}

impl EntryClient {
    pub fn new(base_url: &str, timeout_seconds: u64, session: SessionContext) -> ApiResult<Self> {
        let http = Client::builder()
            .timeout(Duration::from_secs(timeout_seconds))
            .build()?;
        Ok(Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            http,
            session,
        })
    }

    pub async fn health_check(&self) -> bool {
        match self
            .http
            .get(format!("{}/api/health", self.base_url))
            .send()
            .await
        {
            Ok(response) => response.status().is_success(),
            Err(_) => false,
        }
    }

    /// Submit a natural-language entry for classification and storage.
    pub async fn create_entry(&self, text: &str) -> ApiResult<CreateEntryResponse> {
        let response = self
            .request(Method::POST, "/api/tasks", Some(json!({ "text": text })))
            .await?;
        decode(response).await
    }

    /// Fetch the full entry collection.
    pub async fn list_entries(&self) -> ApiResult<Vec<Entry>> {
        let response = self.request(Method::GET, "/api/tasks", None).await?;
        decode(response).await
    }

    /// Semantic search over stored entries; results come back ranked by
    /// relevance with a similarity score.
    pub async fn search(&self, query: &str) -> ApiResult<Vec<Entry>> {
        let response = self
            .request(Method::POST, "/api/search", Some(json!({ "query": query })))
            .await?;
        decode(response).await
    }

    pub async fn delete_entry(&self, id: &str) -> ApiResult<()> {
        let path = format!("/api/tasks/{}", id);
        let response = self.request(Method::DELETE, &path, None).await?;
        let _: StatusResponse = decode(response).await?;
        Ok(())
    }

    /// Dispatch a request with the bearer token attached, applying the
    /// retry-once policy on 401.
    ///
    /// The `retried` flag is local to this dispatch and set exactly once,
    /// so the loop body runs at most twice; a second 401 (or a failed
    /// forced refresh) clears the persisted session and surfaces the
    /// authorization failure.
    async fn request(
        &self,
        method: Method,
        path: &str,
        body: Option<serde_json::Value>,
    ) -> ApiResult<Response> {
        let mut token = self.session.authorization_token(false).await;
        if token.is_none() {
            debug!("No bearer token available; sending {} {} unauthenticated", method, path);
        }

        let mut retried = false;
        loop {
            let url = format!("{}{}", self.base_url, path);
            let mut builder = self.http.request(method.clone(), &url);
            if let Some(token) = token.as_deref() {
                builder = builder.bearer_auth(token);
            }
            if let Some(body) = body.as_ref() {
                builder = builder.json(body);
            }

            let response = builder.send().await?;
            if response.status() != StatusCode::UNAUTHORIZED {
                return Ok(response);
            }

            if !retried {
                retried = true;
                warn!("{} {} returned 401, forcing a token refresh", method, path);
                if let Some(fresh) = self.session.authorization_token(true).await {
                    token = Some(fresh);
                    continue;
                }
            }

            // No token to retry with, or the resend failed as well; this
            // session is not coming back.
            warn!("{} {} unauthorized after refresh, clearing session", method, path);
            self.session.clear().await;
            return Err(ApiError::Unauthorized);
        }
    }
}

async fn decode<T: DeserializeOwned>(response: Response) -> ApiResult<T> {
    let status = response.status();
    if !status.is_success() {
        let body = response.text().await.unwrap_or_default();
        return Err(ApiError::Api {
            status: status.as_u16(),
            message: extract_detail(&body),
        });
    }
    Ok(response.json().await?)
}

/// Backend errors arrive as `{"detail": "..."}`; fall back to the raw body.
fn extract_detail(body: &str) -> String {
    serde_json::from_str::<serde_json::Value>(body)
        .ok()
        .and_then(|v| v.get("detail").and_then(|d| d.as_str()).map(String::from))
        .unwrap_or_else(|| body.to_string())
}
