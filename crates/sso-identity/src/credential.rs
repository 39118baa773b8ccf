//! Provider credentials and account conflicts
//!
//! When a popup sign-in fails because the email already belongs to another
//! provider, the SDK returns the attempted credential and the provider(s) the
//! account is verified with inside the error's custom data. This module parses
//! that payload once into an [`AccountConflict`].
//!
//! The payload shape is:
//!
//! ```json
//! {
//!   "email": "ada@example.com",
//!   "_tokenResponse": {
//!     "oauthIdToken": "...",
//!     "oauthAccessToken": "...",
//!     "oauthTokenSecret": "...",
//!     "verifiedProvider": ["google.com"]
//!   }
//! }
//! ```

use crate::provider::SignInProvider;
use serde::{Deserialize, Serialize};

/// A provider credential waiting to be linked to an existing account.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct PendingCredential {
    /// Provider that issued the credential
    pub provider: SignInProvider,

    /// OIDC id token
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id_token: Option<String>,

    /// OAuth access token
    #[serde(skip_serializing_if = "Option::is_none")]
    pub access_token: Option<String>,

    /// OAuth 1.0a token secret (Twitter / X)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub secret: Option<String>,
}

impl PendingCredential {
    /// Create an empty credential for a provider.
    pub fn new(provider: SignInProvider) -> Self {
        Self {
            provider,
            id_token: None,
            access_token: None,
            secret: None,
        }
    }

    /// Set the id token.
    pub fn with_id_token(mut self, token: impl Into<String>) -> Self {
        self.id_token = Some(token.into());
        self
    }

    /// Set the access token.
    pub fn with_access_token(mut self, token: impl Into<String>) -> Self {
        self.access_token = Some(token.into());
        self
    }

    /// Set the token secret.
    pub fn with_secret(mut self, secret: impl Into<String>) -> Self {
        self.secret = Some(secret.into());
        self
    }

    /// Whether the credential carries enough material to be linked.
    ///
    /// Twitter credentials need both an access token and a secret; other
    /// OAuth providers need an id token or an access token.
    pub fn is_usable(&self) -> bool {
        if !self.provider.supports_popup() {
            return false;
        }
        if self.provider.uses_token_secret() {
            return self.access_token.is_some() && self.secret.is_some();
        }
        self.id_token.is_some() || self.access_token.is_some()
    }
}

/// An email already registered with a different provider.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct AccountConflict {
    /// Credential from the attempted sign-in
    pub credential: PendingCredential,

    /// Provider the existing account is verified with
    pub verified_provider: SignInProvider,

    /// Email shared by both accounts
    #[serde(skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct TokenResponse {
    #[serde(default)]
    oauth_id_token: Option<String>,
    #[serde(default)]
    oauth_access_token: Option<String>,
    #[serde(default)]
    oauth_token_secret: Option<String>,
    #[serde(default)]
    verified_provider: Vec<String>,
    #[serde(default)]
    email: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct ConflictPayload {
    #[serde(default)]
    email: Option<String>,
    #[serde(default, rename = "_tokenResponse")]
    token_response: Option<TokenResponse>,
}

impl AccountConflict {
    /// Parse a conflict from the SDK error payload.
    ///
    /// Returns `None` unless both a usable credential for `attempted` and a
    /// popup-capable verified provider can be recovered.
    pub fn from_error_payload(
        attempted: SignInProvider,
        payload: &serde_json::Value,
    ) -> Option<Self> {
        let payload: ConflictPayload = serde_json::from_value(payload.clone()).ok()?;
        let response = payload.token_response?;

        let mut credential = PendingCredential::new(attempted);
        credential.id_token = response.oauth_id_token;
        credential.access_token = response.oauth_access_token;
        if attempted.uses_token_secret() {
            credential.secret = response.oauth_token_secret;
        }
        if !credential.is_usable() {
            return None;
        }

        let verified_provider = response
            .verified_provider
            .first()
            .and_then(|id| SignInProvider::parse(id))
            .filter(|p| p.supports_popup())?;

        Some(Self {
            credential,
            verified_provider,
            email: payload.email.or(response.email),
        })
    }

    /// Whether a signed-in email can be the target of this link.
    ///
    /// Unknown emails on either side are treated as a match.
    pub fn matches_email(&self, email: Option<&str>) -> bool {
        match (self.email.as_deref(), email) {
            (Some(expected), Some(actual)) => expected.eq_ignore_ascii_case(actual),
            _ => true,
        }
    }
}
