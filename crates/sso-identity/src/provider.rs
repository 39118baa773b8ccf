//! Sign-in provider catalogue
//!
//! A closed set of sign-in methods. Interactive (popup) providers and
//! credential-only methods share one type; callers ask
//! [`SignInProvider::supports_popup`] instead of checking a lookup table.

use serde::{Deserialize, Serialize};

/// Supported sign-in providers.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum SignInProvider {
    /// Google
    Google,
    /// GitHub
    GitHub,
    /// Twitter / X
    Twitter,
    /// Email and password
    Password,
}

impl SignInProvider {
    /// All providers, interactive ones first.
    pub const ALL: [SignInProvider; 4] = [
        SignInProvider::Google,
        SignInProvider::GitHub,
        SignInProvider::Twitter,
        SignInProvider::Password,
    ];

    /// Get the short name.
    pub fn as_str(&self) -> &'static str {
        match self {
            SignInProvider::Google => "google",
            SignInProvider::GitHub => "github",
            SignInProvider::Twitter => "twitter",
            SignInProvider::Password => "email",
        }
    }

    /// Provider id as reported by the identity SDK.
    pub fn provider_id(&self) -> &'static str {
        match self {
            SignInProvider::Google => "google.com",
            SignInProvider::GitHub => "github.com",
            SignInProvider::Twitter => "twitter.com",
            SignInProvider::Password => "password",
        }
    }

    /// Parse from a short name or an SDK provider id.
    pub fn parse(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "google" | "google.com" => Some(SignInProvider::Google),
            "github" | "github.com" => Some(SignInProvider::GitHub),
            "twitter" | "twitter.com" | "x" | "x.com" => Some(SignInProvider::Twitter),
            "email" | "password" => Some(SignInProvider::Password),
            _ => None,
        }
    }

    /// Whether the provider signs in through an interactive popup.
    pub fn supports_popup(&self) -> bool {
        !matches!(self, SignInProvider::Password)
    }

    /// Whether credentials from this provider carry a token secret (OAuth 1.0a).
    pub fn uses_token_secret(&self) -> bool {
        matches!(self, SignInProvider::Twitter)
    }

    /// Custom parameters sent with the popup request.
    pub fn custom_parameters(&self) -> Vec<(&'static str, &'static str)> {
        match self {
            SignInProvider::Google => vec![("prompt", "select_account")],
            _ => vec![],
        }
    }

    /// Providers that can be offered as popup buttons.
    pub fn popup_providers() -> impl Iterator<Item = SignInProvider> {
        Self::ALL.into_iter().filter(|p| p.supports_popup())
    }
}

impl std::fmt::Display for SignInProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}
