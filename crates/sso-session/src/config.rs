//! Session configuration.
//!
//! Construction-time settings for a mounted session: where consumer pages
//! send users to log in, which server exchanges tokens for provider pages, and
//! whether anonymous access is allowed. Configuration can be built in code or
//! loaded from environment variables.

use serde::{Deserialize, Serialize};
use thiserror::Error;
use url::Url;

/// Token exchange server used when none is configured.
pub const DEFAULT_LOGIN_SERVER: &str = "https://kortexa.ai";

/// Configuration errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Invalid configuration value.
    #[error("Invalid configuration value for {key}: {message}")]
    InvalidValue {
        /// Configuration key.
        key: String,
        /// Error message.
        message: String,
    },
}

/// Session configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AuthConfig {
    /// SSO login page consumer pages redirect to.
    #[serde(default)]
    pub login_redirect: Option<String>,

    /// Origin of the token exchange server for provider pages.
    #[serde(default)]
    pub login_server: Option<String>,

    /// Whether pages may be used without signing in.
    #[serde(default)]
    pub allow_anonymous: bool,
}

impl AuthConfig {
    /// Create an empty configuration (standalone, default login server).
    pub fn new() -> Self {
        Self::default()
    }

    /// Load configuration from environment variables.
    ///
    /// Environment variables:
    /// - `SSO_LOGIN_REDIRECT`: SSO login page for consumer mode
    /// - `SSO_LOGIN_SERVER`: token exchange server (default: https://kortexa.ai)
    /// - `SSO_ALLOW_ANONYMOUS`: allow anonymous access (default: false)
    pub fn from_env() -> Self {
        Self {
            login_redirect: std::env::var("SSO_LOGIN_REDIRECT").ok(),
            login_server: std::env::var("SSO_LOGIN_SERVER").ok(),
            allow_anonymous: std::env::var("SSO_ALLOW_ANONYMOUS")
                .map(|s| s == "true" || s == "1")
                .unwrap_or(false),
        }
    }

    /// Set the SSO login page.
    pub fn with_login_redirect(mut self, url: impl Into<String>) -> Self {
        self.login_redirect = Some(url.into());
        self
    }

    /// Set the token exchange server.
    pub fn with_login_server(mut self, url: impl Into<String>) -> Self {
        self.login_server = Some(url.into());
        self
    }

    /// Allow or forbid anonymous access.
    pub fn with_allow_anonymous(mut self, allow: bool) -> Self {
        self.allow_anonymous = allow;
        self
    }

    /// The SSO login page, if one is configured.
    ///
    /// Blank values count as not configured.
    pub fn login_redirect(&self) -> Option<&str> {
        self.login_redirect
            .as_deref()
            .map(str::trim)
            .filter(|s| !s.is_empty())
    }

    /// The token exchange server, falling back to [`DEFAULT_LOGIN_SERVER`].
    pub fn login_server(&self) -> &str {
        self.login_server
            .as_deref()
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .unwrap_or(DEFAULT_LOGIN_SERVER)
    }

    /// Validate that configured URLs parse.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if let Some(redirect) = self.login_redirect() {
            Url::parse(redirect).map_err(|e| ConfigError::InvalidValue {
                key: "login_redirect".to_string(),
                message: e.to_string(),
            })?;
        }

        Url::parse(self.login_server()).map_err(|e| ConfigError::InvalidValue {
            key: "login_server".to_string(),
            message: e.to_string(),
        })?;

        Ok(())
    }
}
