//! # SSO Identity
//!
//! This crate defines the contract between the SSO session layer and the
//! identity SDK that actually verifies credentials.
//!
//! ## Overview
//!
//! The sso-identity crate handles:
//! - **Clients**: the [`IdentityClient`] trait every SDK binding implements
//! - **Users**: opaque signed-in principals that can mint bearer tokens
//! - **Providers**: the closed set of sign-in methods
//! - **Credentials**: pending provider credentials and typed account conflicts
//! - **Subscriptions**: ordered auth-state change delivery, released on drop
//!
//! ## Features
//!
//! - `memory` (default): in-memory backend ([`MemoryIdentity`]) for tests and
//!   hosts without a browser SDK
//!
//! ## Usage
//!
//! ```rust,no_run
//! use sso_identity::{IdentityClient, MemoryIdentity, SignInProvider};
//!
//! async fn example() {
//!     let identity = MemoryIdentity::new();
//!     let mut subscription = identity.subscribe().await.unwrap();
//!
//!     identity.sign_in_with_popup(SignInProvider::Google).await.unwrap();
//!
//!     // Initial (signed out) state, then the sign-in
//!     assert!(subscription.next().await.unwrap().is_none());
//!     assert!(subscription.next().await.unwrap().is_some());
//! }
//! ```
//!
//! ## Account conflicts
//!
//! When a popup sign-in finds the email registered with another provider,
//! bindings parse the SDK payload once with
//! [`AccountConflict::from_error_payload`] and report it inside
//! [`IdentityError::AccountExistsWithDifferentCredential`].

pub mod client;
pub mod credential;
pub mod error;
#[cfg(feature = "memory")]
pub mod memory;
pub mod provider;
pub mod subscription;
pub mod user;

// Re-export main types
pub use client::IdentityClient;
pub use credential::{AccountConflict, PendingCredential};
pub use error::{IdentityError, IdentityResult};
pub use provider::SignInProvider;
pub use subscription::{AuthStateChange, AuthStateSubscription};
pub use user::{User, UserRef};

#[cfg(feature = "memory")]
pub use memory::{IdentityStats, MemoryIdentity, MemoryUser, PopupOutcome};
