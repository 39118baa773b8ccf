//! Identity SDK binding contract

use crate::error::IdentityResult;
use crate::provider::SignInProvider;
use crate::subscription::AuthStateSubscription;
use crate::user::UserRef;
use async_trait::async_trait;

/// Trait for identity SDK bindings.
///
/// Sign-in methods resolve once the SDK has accepted the credentials; the
/// resulting state change is also delivered to every subscription, which is
/// what the session layer reacts to.
#[async_trait]
pub trait IdentityClient: Send + Sync {
    /// Subscribe to auth-state changes.
    ///
    /// The current state is delivered first.
    async fn subscribe(&self) -> IdentityResult<AuthStateSubscription>;

    /// Interactive popup sign-in with a provider.
    ///
    /// An account conflict is reported as
    /// [`IdentityError::AccountExistsWithDifferentCredential`](crate::IdentityError::AccountExistsWithDifferentCredential)
    /// with the conflict already parsed when recoverable.
    async fn sign_in_with_popup(&self, provider: SignInProvider) -> IdentityResult<UserRef>;

    /// Email and password sign-in.
    async fn sign_in_with_email_and_password(
        &self,
        email: &str,
        password: &str,
    ) -> IdentityResult<UserRef>;

    /// Sign in with a custom token minted by the SSO server.
    async fn sign_in_with_custom_token(&self, token: &str) -> IdentityResult<UserRef>;

    /// Sign out the current user.
    async fn sign_out(&self) -> IdentityResult<()>;

    /// The currently signed-in user, if any.
    async fn current_user(&self) -> Option<UserRef>;
}
