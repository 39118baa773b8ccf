//! Token exchange client.
//!
//! HTTP client for the SSO server. Trades the signed-in user's identity token
//! for a token scoped to another site, which that site then uses to sign in.

use crate::config::AuthConfig;
use crate::error::ExchangeError;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::{debug, instrument, warn};
use url::Url;

/// Response of `GET <base>/sso`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SsoResponse {
    /// Token scoped to the requested site.
    #[serde(default)]
    pub token: Option<String>,
}

/// Normalize a server origin into the versioned API base URL.
///
/// - no `api` path segment: `/api/v1` is appended
/// - an `api` segment without a version after it: `/v1` is appended
/// - already versioned: unchanged
///
/// The result never ends in a slash.
pub fn api_base_url(server: &str) -> Result<Url, ExchangeError> {
    let mut url = Url::parse(server).map_err(|e| ExchangeError::InvalidServerUrl {
        url: server.to_string(),
        message: e.to_string(),
    })?;

    let mut segments: Vec<String> = url
        .path_segments()
        .map(|s| s.filter(|seg| !seg.is_empty()).map(str::to_string).collect())
        .unwrap_or_default();

    match segments.iter().position(|seg| seg == "api") {
        None => {
            segments.push("api".to_string());
            segments.push("v1".to_string());
        }
        Some(api) => {
            if !segments[api + 1..].iter().any(|seg| is_version(seg)) {
                segments.push("v1".to_string());
            }
        }
    }

    url.set_path(&segments.join("/"));
    url.set_query(None);
    url.set_fragment(None);
    Ok(url)
}

fn is_version(segment: &str) -> bool {
    segment
        .strip_prefix('v')
        .is_some_and(|n| !n.is_empty() && n.chars().all(|c| c.is_ascii_digit()))
}

/// SSO token exchange client.
#[derive(Debug, Clone)]
pub struct TokenExchangeClient {
    /// HTTP client instance.
    client: Client,

    /// Versioned API base URL.
    base_url: Url,
}

impl TokenExchangeClient {
    /// Create a client for a server origin.
    pub fn new(server: &str) -> Result<Self, ExchangeError> {
        Ok(Self {
            client: Client::new(),
            base_url: api_base_url(server)?,
        })
    }

    /// Create a client for the configured login server.
    pub fn from_config(config: &AuthConfig) -> Result<Self, ExchangeError> {
        Self::new(config.login_server())
    }

    /// The versioned API base URL.
    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    /// URL of the exchange endpoint for `scope`.
    pub fn exchange_url(&self, scope: &str) -> Url {
        let mut url = self.base_url.clone();
        if let Ok(mut segments) = url.path_segments_mut() {
            segments.pop_if_empty().push("sso");
        }
        url.query_pairs_mut().append_pair("scope", scope);
        url
    }

    /// Exchange `token` for a token scoped to `scope`.
    ///
    /// Not retried; a failure is returned as is.
    #[instrument(skip(self, token), fields(base_url = %self.base_url))]
    pub async fn exchange(&self, token: &str, scope: &str) -> Result<String, ExchangeError> {
        debug!("Exchanging token for scope {}", scope);

        let response = self
            .client
            .get(self.exchange_url(scope))
            .header("Authorization", format!("Bearer {}", token))
            .header("Content-Type", "application/json")
            .send()
            .await?;

        self.handle_response(response).await
    }

    /// Check status and extract the scoped token.
    async fn handle_response(&self, response: reqwest::Response) -> Result<String, ExchangeError> {
        let status = response.status();

        if !status.is_success() {
            let message = status
                .canonical_reason()
                .unwrap_or("Unknown error")
                .to_string();
            warn!("SSO API error ({}): {}", status.as_u16(), message);
            return Err(ExchangeError::ApiError {
                status: status.as_u16(),
                message,
            });
        }

        let body: SsoResponse = response.json().await.map_err(|e| {
            warn!("Unreadable SSO response: {}", e);
            ExchangeError::MissingToken
        })?;

        body.token
            .filter(|token| !token.is_empty())
            .ok_or(ExchangeError::MissingToken)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn base(server: &str) -> String {
        api_base_url(server).unwrap().to_string()
    }

    #[test]
    fn test_bare_origin_gets_api_v1() {
        assert_eq!(base("https://kortexa.ai"), "https://kortexa.ai/api/v1");
        assert_eq!(base("https://kortexa.ai/"), "https://kortexa.ai/api/v1");
        assert_eq!(base("http://127.0.0.1:8080"), "http://127.0.0.1:8080/api/v1");
    }

    #[test]
    fn test_prefix_path_is_kept() {
        assert_eq!(base("https://example.com/auth/"), "https://example.com/auth/api/v1");
    }

    #[test]
    fn test_unversioned_api_gets_v1() {
        assert_eq!(base("https://example.com/api"), "https://example.com/api/v1");
        assert_eq!(base("https://example.com/api/"), "https://example.com/api/v1");
    }

    #[test]
    fn test_versioned_api_is_unchanged() {
        assert_eq!(base("https://example.com/api/v1"), "https://example.com/api/v1");
        assert_eq!(base("https://example.com/api/v2/"), "https://example.com/api/v2");
    }

    #[test]
    fn test_invalid_server() {
        assert!(matches!(
            api_base_url("kortexa.ai"),
            Err(ExchangeError::InvalidServerUrl { .. })
        ));
    }

    #[test]
    fn test_exchange_url() {
        let client = TokenExchangeClient::new("https://login.example.com").unwrap();
        assert_eq!(
            client.exchange_url("app.example.com").as_str(),
            "https://login.example.com/api/v1/sso?scope=app.example.com"
        );
    }

    #[test]
    fn test_default_server_from_config() {
        let client = TokenExchangeClient::from_config(&AuthConfig::default()).unwrap();
        assert_eq!(client.base_url().as_str(), "https://kortexa.ai/api/v1");
    }

    #[test]
    fn test_version_segments() {
        assert!(is_version("v1"));
        assert!(is_version("v12"));
        assert!(!is_version("v"));
        assert!(!is_version("vx"));
        assert!(!is_version("1"));
    }
}
