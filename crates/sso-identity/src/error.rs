//! Error types for identity SDK operations
//!
//! Raw SDK failures are translated into [`IdentityError`] once, at the binding
//! layer, so session code never inspects error payloads itself.

use crate::credential::AccountConflict;
use crate::provider::SignInProvider;
use thiserror::Error;

/// Identity SDK error types.
///
/// These cover every failure the session layer can receive from the identity
/// SDK: interactive sign-in, credential sign-in, custom tokens, linking and
/// token refresh.
#[derive(Debug, Clone, Error)]
pub enum IdentityError {
    /// The email is already registered with a different provider.
    ///
    /// `conflict` is present only when the binding could recover both the
    /// attempted credential and a verified alternate provider from the raw
    /// SDK error.
    #[error("Account exists with different credential ({attempted})")]
    AccountExistsWithDifferentCredential {
        /// Provider the user tried to sign in with
        attempted: SignInProvider,
        /// Parsed conflict details, if recoverable
        conflict: Option<Box<AccountConflict>>,
    },

    /// Wrong email or password
    #[error("Invalid credentials")]
    InvalidCredentials,

    /// No account exists for the given email
    #[error("User not found: {0}")]
    UserNotFound(String),

    /// Custom token was rejected
    #[error("Invalid custom token")]
    InvalidCustomToken,

    /// The user closed the popup before completing sign-in
    #[error("Popup closed by user")]
    PopupClosed,

    /// The provider cannot be used for interactive sign-in
    #[error("Provider does not support popup sign-in: {0}")]
    UnsupportedProvider(SignInProvider),

    /// The credential is already linked to an account
    #[error("Credential already in use for {0}")]
    CredentialAlreadyInUse(SignInProvider),

    /// The user is no longer signed in
    #[error("User signed out")]
    UserSignedOut,

    /// Network failure talking to the identity backend
    #[error("Network error: {0}")]
    Network(String),

    /// Any other SDK error, kept with its SDK code
    #[error("Identity SDK error ({code}): {message}")]
    Sdk {
        /// SDK error code, e.g. `auth/internal-error`
        code: String,
        /// Human-readable message
        message: String,
    },
}

/// Result type for identity SDK operations.
pub type IdentityResult<T> = Result<T, IdentityError>;

impl IdentityError {
    /// SDK-style error code for this error.
    pub fn code(&self) -> &str {
        match self {
            IdentityError::AccountExistsWithDifferentCredential { .. } => {
                "auth/account-exists-with-different-credential"
            }
            IdentityError::InvalidCredentials => "auth/invalid-credential",
            IdentityError::UserNotFound(_) => "auth/user-not-found",
            IdentityError::InvalidCustomToken => "auth/invalid-custom-token",
            IdentityError::PopupClosed => "auth/popup-closed-by-user",
            IdentityError::UnsupportedProvider(_) => "auth/operation-not-supported-in-this-environment",
            IdentityError::CredentialAlreadyInUse(_) => "auth/credential-already-in-use",
            IdentityError::UserSignedOut => "auth/user-signed-out",
            IdentityError::Network(_) => "auth/network-request-failed",
            IdentityError::Sdk { code, .. } => code.as_str(),
        }
    }

    /// Parsed account conflict, if this is a recoverable conflict error.
    pub fn account_conflict(&self) -> Option<&AccountConflict> {
        match self {
            IdentityError::AccountExistsWithDifferentCredential {
                conflict: Some(conflict),
                ..
            } => Some(&**conflict),
            _ => None,
        }
    }

    /// Whether the user dismissed the interaction themselves.
    pub fn is_user_cancelled(&self) -> bool {
        matches!(self, IdentityError::PopupClosed)
    }
}
