//! # SSO Session
//!
//! This crate provides client-side authentication orchestration for Kortexa
//! web apps: one login page signs the user in and hands a scoped token to the
//! app that sent them.
//!
//! ## Overview
//!
//! The sso-session crate handles:
//! - **Modes**: every page is `standalone`, `sso-provider` or `sso-consumer`,
//!   decided once from its URL
//! - **Token exchange**: trading an identity token for one scoped to another
//!   site's host
//! - **Session state**: a single writer state machine fed by the identity SDK,
//!   user actions and the consumer's inbound token
//! - **Redirects**: provider hand-off back to the consumer, consumer redirect
//!   to the login page
//! - **Context**: a mounted [`AuthProvider`] and the [`AuthContext`] handed to
//!   components
//!
//! ## Usage
//!
//! ```rust,no_run
//! use sso_identity::MemoryIdentity;
//! use sso_session::{AuthConfig, AuthProvider, AuthView, MemoryLocation};
//! use std::sync::Arc;
//!
//! async fn example() {
//!     let config = AuthConfig::from_env();
//!     let location = MemoryLocation::parse("https://app.example.com/").unwrap();
//!
//!     let provider = AuthProvider::mount(
//!         config,
//!         Arc::new(MemoryIdentity::new()),
//!         Arc::new(location),
//!     )
//!     .await
//!     .unwrap();
//!
//!     let auth = provider.context();
//!     auth.wait_until_loaded().await;
//!     if auth.view() == AuthView::Login && auth.login_with_sso().is_err() {
//!         auth.login();
//!     }
//! }
//! ```
//!
//! ## URL parameters
//!
//! - `returnUrl`: the page is an SSO provider and returns there when signed in
//! - `token`: the page is an SSO consumer and signs in with this token once
//! - `no_sso`: stay standalone even if a login redirect is configured
//!
//! ## Errors
//!
//! Actions return [`AuthError`]. Failures of the sign-in transition itself
//! (token exchange, credential linking) are delivered through
//! [`AuthProvider::next_error`] since no action is waiting on them.

pub mod config;
pub mod context;
pub mod error;
pub mod exchange;
pub mod location;
pub mod machine;
pub mod mode;
pub mod redirect;
pub mod session;

// Re-export main types
pub use config::{AuthConfig, ConfigError, DEFAULT_LOGIN_SERVER};
pub use context::{AuthContext, AuthProvider, CONTEXT_LABEL_PREFIX};
pub use error::{AuthError, AuthResult, ExchangeError};
pub use exchange::{api_base_url, SsoResponse, TokenExchangeClient};
pub use location::{Location, MemoryLocation};
pub use machine::SessionMachine;
pub use mode::{AuthMode, NO_SSO_PARAM, RETURN_URL_PARAM, TOKEN_PARAM};
pub use redirect::RedirectOrchestrator;
pub use session::{AuthView, Session};

// Identity types that appear in this crate's API
pub use sso_identity::{AccountConflict, IdentityClient, SignInProvider, UserRef};
