use std::path::PathBuf;

use async_trait::async_trait;
use chrono::Utc;
use reqwest::Client;
use serde::Deserialize;
use tokio::sync::Mutex;

use crate::{config, spotify::TokenProvider, types::Token};

/// Refresh this many seconds before the upstream considers the token expired.
const EXPIRY_MARGIN_SECS: u64 = 240;

#[derive(Debug, Deserialize)]
struct RefreshResponse {
    access_token: String,
    #[serde(default)]
    refresh_token: Option<String>,
    #[serde(default)]
    scope: Option<String>,
    #[serde(default = "default_expires_in")]
    expires_in: u64,
}

fn default_expires_in() -> u64 {
    3600
}

/// Holds the session token and keeps it fresh through the refresh-token grant.
pub struct TokenManager {
    token: Mutex<Token>,
    client: Client,
}

impl TokenManager {
    pub fn new(token: Token) -> Self {
        TokenManager {
            token: Mutex::new(token),
            client: Client::new(),
        }
    }

    /// Loads the token stored in `<data_local_dir>/sporlytics/cache/token.json`.
    pub async fn load() -> Result<Self, String> {
        let path = Self::token_path();
        let content = async_fs::read_to_string(&path)
            .await
            .map_err(|e| format!("{}: {e}", path.display()))?;
        let token: Token = serde_json::from_str(&content).map_err(|e| e.to_string())?;
        Ok(Self::new(token))
    }

    /// Returns the access token, refreshing it first when it is about to expire.
    ///
    /// A failed refresh keeps the old token; the upstream will answer with 401 once it is
    /// really expired, which then surfaces as a request to sign in again.
    pub async fn get_valid_token(&self) -> String {
        let mut token = self.token.lock().await;
        if is_expired(&token, Utc::now().timestamp() as u64) {
            match self.refresh_token(&token).await {
                Ok(fresh) => {
                    *token = fresh;
                    if let Err(e) = Self::write(&token).await {
                        tracing::warn!(error = %e, "failed to persist refreshed token");
                    }
                }
                Err(e) => tracing::warn!(error = %e, "token refresh failed"),
            }
        }

        token.access_token.clone()
    }

    async fn refresh_token(&self, token: &Token) -> Result<Token, String> {
        if token.refresh_token.is_empty() {
            return Err("no refresh token stored".to_string());
        }
        let client_id = config::spotify_client_id()
            .ok_or_else(|| "SPOTIFY_API_AUTH_CLIENT_ID is not set".to_string())?;

        let res = self
            .client
            .post(config::spotify_apitoken_url())
            .form(&[
                ("grant_type", "refresh_token"),
                ("refresh_token", token.refresh_token.as_str()),
                ("client_id", client_id.as_str()),
            ])
            .send()
            .await
            .map_err(|e| e.to_string())?
            .error_for_status()
            .map_err(|e| e.to_string())?;

        let refreshed: RefreshResponse = res.json().await.map_err(|e| e.to_string())?;
        tracing::debug!("session token refreshed");

        Ok(Token {
            access_token: refreshed.access_token,
            // the grant may omit the refresh token, the old one then stays valid
            refresh_token: refreshed
                .refresh_token
                .unwrap_or_else(|| token.refresh_token.clone()),
            scope: refreshed.scope.unwrap_or_else(|| token.scope.clone()),
            expires_in: refreshed.expires_in,
            obtained_at: Utc::now().timestamp() as u64,
        })
    }

    async fn write(token: &Token) -> Result<(), String> {
        let path = Self::token_path();
        if let Some(parent) = path.parent() {
            async_fs::create_dir_all(parent)
                .await
                .map_err(|e| e.to_string())?;
        }

        let json = serde_json::to_string_pretty(token).map_err(|e| e.to_string())?;
        async_fs::write(path, json).await.map_err(|e| e.to_string())
    }

    fn token_path() -> PathBuf {
        let mut path = config::app_dir();
        path.push("cache/token.json");
        path
    }
}

#[async_trait]
impl TokenProvider for TokenManager {
    async fn bearer_token(&self) -> Result<String, String> {
        let token = self.get_valid_token().await;
        if token.is_empty() {
            return Err("stored token has no access token".to_string());
        }
        Ok(token)
    }
}

fn is_expired(token: &Token, now: u64) -> bool {
    now + EXPIRY_MARGIN_SECS >= token.obtained_at + token.expires_in
}
