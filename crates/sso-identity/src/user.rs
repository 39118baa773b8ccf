//! Signed-in principals

use crate::credential::PendingCredential;
use crate::error::IdentityResult;
use crate::provider::SignInProvider;
use async_trait::async_trait;
use std::sync::Arc;

/// Shared handle to a signed-in user.
pub type UserRef = Arc<dyn User>;

/// A principal signed in through the identity SDK.
///
/// The session layer treats users as opaque: it only asks for a bearer token
/// and, when an account merge is pending, links a credential.
#[async_trait]
pub trait User: Send + Sync + std::fmt::Debug {
    /// Stable user id.
    fn uid(&self) -> &str;

    /// Email address, if the provider shared one.
    fn email(&self) -> Option<&str>;

    /// Display name.
    fn display_name(&self) -> Option<&str> {
        None
    }

    /// Providers currently linked to this user.
    async fn providers(&self) -> Vec<SignInProvider>;

    /// Fetch a bearer id token for this user.
    async fn id_token(&self) -> IdentityResult<String>;

    /// Link a provider credential to this user.
    async fn link_with_credential(&self, credential: &PendingCredential) -> IdentityResult<()>;
}
