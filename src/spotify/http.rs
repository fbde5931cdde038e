use std::{sync::Arc, time::Duration};

use async_trait::async_trait;
use reqwest::{Client, header::RETRY_AFTER};

use crate::{
    error::TransportError,
    gateway::{ApiResponse, Upstream},
};

/// Supplies a currently valid bearer token for the upstream API.
#[async_trait]
pub trait TokenProvider: Send + Sync {
    async fn bearer_token(&self) -> Result<String, String>;
}

/// Fixed token, e.g. taken from `SPOTIFY_ACCESS_TOKEN`.
pub struct StaticToken(String);

impl StaticToken {
    pub fn new(token: impl Into<String>) -> Self {
        Self(token.into())
    }
}

#[async_trait]
impl TokenProvider for StaticToken {
    async fn bearer_token(&self) -> Result<String, String> {
        if self.0.is_empty() {
            return Err("access token is empty".to_string());
        }
        Ok(self.0.clone())
    }
}

/// reqwest backed transport for the gateway.
pub struct HttpUpstream {
    client: Client,
    base_url: String,
    tokens: Arc<dyn TokenProvider>,
}

impl HttpUpstream {
    pub fn new(base_url: impl Into<String>, tokens: Arc<dyn TokenProvider>) -> Result<Self, reqwest::Error> {
        let client = Client::builder()
            .user_agent(concat!(env!("CARGO_PKG_NAME"), "/", env!("CARGO_PKG_VERSION")))
            .connect_timeout(Duration::from_secs(10))
            .timeout(Duration::from_secs(30))
            .build()?;

        Ok(Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            tokens,
        })
    }
}

#[async_trait]
impl Upstream for HttpUpstream {
    async fn send(&self, path: &str) -> Result<ApiResponse, TransportError> {
        let token = self
            .tokens
            .bearer_token()
            .await
            .map_err(TransportError::MissingCredentials)?;

        let url = format!("{}{}", self.base_url, path);
        let response = self
            .client
            .get(&url)
            .bearer_auth(token)
            .send()
            .await
            .map_err(|e| TransportError::Network(e.to_string()))?;

        let status = response.status().as_u16();
        let retry_after = parse_retry_after(
            response
                .headers()
                .get(RETRY_AFTER)
                .and_then(|value| value.to_str().ok()),
        );
        let body = response
            .text()
            .await
            .map_err(|e| TransportError::Network(e.to_string()))?;

        Ok(ApiResponse {
            status,
            retry_after,
            body,
        })
    }
}

/// `Retry-After` in delta seconds. HTTP dates are not used by the upstream and ignored.
pub fn parse_retry_after(value: Option<&str>) -> Option<Duration> {
    value?.trim().parse::<u64>().ok().map(Duration::from_secs)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn retry_after_seconds() {
        assert_eq!(parse_retry_after(Some("7")), Some(Duration::from_secs(7)));
        assert_eq!(parse_retry_after(Some(" 12 ")), Some(Duration::from_secs(12)));
        assert_eq!(parse_retry_after(Some("Wed, 21 Oct 2015 07:28:00 GMT")), None);
        assert_eq!(parse_retry_after(None), None);
    }

    #[tokio::test]
    async fn empty_static_token_is_rejected() {
        assert!(StaticToken::new("").bearer_token().await.is_err());
        assert_eq!(StaticToken::new("abc").bearer_token().await.unwrap(), "abc");
    }
}
