//! Error types for session operations
//!
//! This module defines the errors surfaced by session actions, the sign-in
//! transition and the token exchange.

use crate::mode::AuthMode;
use sso_identity::IdentityError;
use thiserror::Error;

/// Token exchange error types.
#[derive(Debug, Error)]
pub enum ExchangeError {
    /// HTTP request failed before a response arrived.
    #[error("HTTP request failed: {0}")]
    RequestFailed(#[from] reqwest::Error),

    /// The login server answered with a non-success status.
    #[error("API call failed ({status}): {message}")]
    ApiError {
        /// HTTP status code.
        status: u16,
        /// Status text or response body.
        message: String,
    },

    /// The response body had no token.
    #[error("Invalid token response from SSO server")]
    MissingToken,

    /// The login server origin is not a valid URL.
    #[error("Invalid login server URL {url}: {message}")]
    InvalidServerUrl {
        /// Configured origin.
        url: String,
        /// Parse error.
        message: String,
    },
}

impl ExchangeError {
    /// HTTP status, when the server answered.
    pub fn status(&self) -> Option<u16> {
        match self {
            ExchangeError::ApiError { status, .. } => Some(*status),
            ExchangeError::RequestFailed(e) => e.status().map(|s| s.as_u16()),
            _ => None,
        }
    }
}

/// Session error types.
#[derive(Debug, Error)]
pub enum AuthError {
    /// Action invoked in a mode that forbids it.
    #[error("{action} not available in {mode} mode")]
    Mode {
        /// Action name
        action: &'static str,
        /// Current mode
        mode: AuthMode,
    },

    /// Token exchange failed during the provider hand-off.
    #[error("Token exchange failed")]
    Exchange(#[source] ExchangeError),

    /// Linking a pending credential to the new principal failed.
    #[error("Failed to link pending credential")]
    Link(#[source] IdentityError),

    /// Sign-in with the SSO token from the URL failed.
    #[error("SSO token sign-in failed")]
    SsoToken(#[source] IdentityError),

    /// `link()` called with no pending credential.
    #[error("No link credential pending")]
    NoLinkCredential,

    /// Provider cannot be used for this action.
    #[error("Invalid provider: {0}")]
    InvalidProvider(String),

    /// Missing or malformed configuration (return URL, redirect target).
    #[error("Configuration error: {0}")]
    Config(String),

    /// Identity SDK error.
    #[error(transparent)]
    Identity(#[from] IdentityError),
}

/// Result type for session operations.
pub type AuthResult<T> = Result<T, AuthError>;

impl AuthError {
    /// Whether this error aborts the sign-in transition.
    ///
    /// Fatal errors raised from the auth-state listener have no caller and are
    /// delivered to the host's unhandled-error channel.
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            AuthError::Exchange(_) | AuthError::Link(_) | AuthError::Config(_)
        )
    }

    /// Get error code for presentation.
    pub fn error_code(&self) -> &'static str {
        match self {
            AuthError::Mode { .. } => "MODE_ERROR",
            AuthError::Exchange(_) => "EXCHANGE_ERROR",
            AuthError::Link(_) => "LINK_ERROR",
            AuthError::SsoToken(_) => "SSO_TOKEN_ERROR",
            AuthError::NoLinkCredential => "STATE_ERROR",
            AuthError::InvalidProvider(_) => "INVALID_PROVIDER",
            AuthError::Config(_) => "CONFIG_ERROR",
            AuthError::Identity(_) => "IDENTITY_ERROR",
        }
    }

    pub(crate) fn mode(action: &'static str, mode: AuthMode) -> Self {
        AuthError::Mode { action, mode }
    }
}
