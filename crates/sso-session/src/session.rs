//! Session state
//!
//! One [`Session`] exists per mounted page. Consumers only ever see clones of
//! it; the state machine is its single writer.

use crate::mode::AuthMode;
use sso_identity::{AccountConflict, UserRef};

/// Snapshot of the page's authentication state.
#[derive(Debug, Clone)]
pub struct Session {
    /// Signed-in principal
    pub identity: Option<UserRef>,

    /// Bearer token of the principal, empty when signed out
    pub token: String,

    /// True until the first definitive sign-in/sign-out resolution
    pub loading: bool,

    /// Mode of the page, fixed at mount
    pub mode: AuthMode,

    /// Whether the page may be used without signing in
    pub allow_anonymous: bool,

    /// The login UI was explicitly requested
    pub force_login: bool,

    /// Credential waiting to be linked after an account conflict
    pub link_credential: Option<AccountConflict>,
}

/// What the presentation layer should show for a session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthView {
    /// Auth state not resolved yet
    Loading,
    /// An account merge is pending; offer linking
    Link,
    /// Show the login form
    Login,
    /// Show the application
    Content,
}

impl Session {
    /// Initial state of a freshly mounted page.
    pub fn new(mode: AuthMode, allow_anonymous: bool) -> Self {
        Self {
            identity: None,
            token: String::new(),
            loading: true,
            mode,
            allow_anonymous,
            force_login: false,
            link_credential: None,
        }
    }

    /// Whether a principal is signed in.
    pub fn is_authenticated(&self) -> bool {
        self.identity.is_some()
    }

    /// Email of the signed-in principal.
    pub fn email(&self) -> Option<&str> {
        self.identity.as_ref().and_then(|user| user.email())
    }

    /// Derive the view to present.
    pub fn view(&self) -> AuthView {
        if self.loading {
            return AuthView::Loading;
        }
        if self.link_credential.is_some() {
            return AuthView::Link;
        }
        if self.identity.is_some() {
            return AuthView::Content;
        }
        if !self.allow_anonymous || self.force_login {
            AuthView::Login
        } else {
            AuthView::Content
        }
    }
}
