//! Session state machine
//!
//! The machine is the only writer of the [`Session`]. It reacts to auth-state
//! changes reported by the identity SDK, to explicit user actions and, on
//! consumer pages, to the one-time sign-in with the token from the URL.
//!
//! Every write is a field-level merge through [`watch::Sender::send_modify`],
//! so an action and a callback transition running at the same time only ever
//! overwrite the fields they own.

use crate::config::AuthConfig;
use crate::error::{AuthError, AuthResult};
use crate::exchange::TokenExchangeClient;
use crate::location::Location;
use crate::mode::{query_param, without_query_param, AuthMode, TOKEN_PARAM};
use crate::redirect::RedirectOrchestrator;
use crate::session::Session;
use sso_identity::{AuthStateChange, IdentityClient, SignInProvider, UserRef};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use tokio::sync::watch;
use tracing::{debug, error, info, instrument, warn};

/// Drives a page's [`Session`].
pub struct SessionMachine {
    identity: Arc<dyn IdentityClient>,
    location: Arc<dyn Location>,
    redirect: RedirectOrchestrator,
    mode: AuthMode,
    state: watch::Sender<Session>,
    /// Inbound URL token, taken by the first consumption attempt
    sso_token: Mutex<Option<String>>,
    /// Set until the inbound token has been consumed or has failed
    sso_token_pending: AtomicBool,
    alive: AtomicBool,
}

impl std::fmt::Debug for SessionMachine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionMachine")
            .field("mode", &self.mode)
            .field("redirect", &self.redirect)
            .field("alive", &self.is_alive())
            .finish_non_exhaustive()
    }
}

impl SessionMachine {
    /// Create the machine for the page at `location`.
    ///
    /// The mode is resolved here, once.
    pub fn new(
        config: &AuthConfig,
        identity: Arc<dyn IdentityClient>,
        location: Arc<dyn Location>,
    ) -> AuthResult<Self> {
        let href = location.href();
        let mode = AuthMode::resolve(&href, config.login_redirect().is_some());

        let exchange = TokenExchangeClient::from_config(config)
            .map_err(|e| AuthError::Config(e.to_string()))?;
        let redirect = RedirectOrchestrator::new(
            exchange,
            location.clone(),
            config.login_redirect().map(str::to_string),
        );

        let sso_token = match mode {
            AuthMode::SsoConsumer => {
                query_param(&href, TOKEN_PARAM).filter(|token| !token.is_empty())
            }
            _ => None,
        };
        let (state, _) = watch::channel(Session::new(mode, config.allow_anonymous));

        debug!(%mode, sso_token = sso_token.is_some(), "Session machine created");

        Ok(Self {
            identity,
            location,
            redirect,
            mode,
            state,
            sso_token_pending: AtomicBool::new(sso_token.is_some()),
            sso_token: Mutex::new(sso_token),
            alive: AtomicBool::new(true),
        })
    }

    /// Mode of the page.
    pub fn mode(&self) -> AuthMode {
        self.mode
    }

    /// Current session snapshot.
    pub fn session(&self) -> Session {
        self.state.borrow().clone()
    }

    /// Receiver that observes every session update.
    pub fn watch(&self) -> watch::Receiver<Session> {
        self.state.subscribe()
    }

    /// Whether auth-state changes are still processed.
    pub fn is_alive(&self) -> bool {
        self.alive.load(Ordering::SeqCst)
    }

    /// Stop processing auth-state changes; later ones are dropped.
    pub fn shutdown(&self) {
        if self.alive.swap(false, Ordering::SeqCst) {
            debug!(mode = %self.mode, "Session machine shut down");
        }
    }

    /// Whether an inbound URL token is still waiting to be consumed.
    pub fn sso_token_pending(&self) -> bool {
        self.sso_token_pending.load(Ordering::SeqCst)
    }

    /// React to an auth-state change reported by the identity SDK.
    ///
    /// Errors have no caller to return to when this runs from the listener;
    /// the context forwards them to the host.
    pub async fn handle_auth_state(&self, change: AuthStateChange) -> AuthResult<()> {
        if !self.is_alive() {
            debug!("Dropping auth-state change after shutdown");
            return Ok(());
        }

        match change {
            Some(user) => self.signed_in(user).await,
            None => {
                self.signed_out();
                Ok(())
            }
        }
    }

    #[instrument(skip_all, fields(mode = %self.mode, uid = %user.uid()))]
    async fn signed_in(&self, user: UserRef) -> AuthResult<()> {
        let pending = self.state.borrow().link_credential.clone();

        if let Some(conflict) = pending {
            if conflict.matches_email(user.email()) {
                if let Err(e) = user.link_with_credential(&conflict.credential).await {
                    self.state.send_modify(|session| {
                        session.link_credential = None;
                        session.loading = false;
                    });
                    return Err(AuthError::Link(e));
                }
                info!(provider = %conflict.credential.provider, "Linked pending credential");
            } else {
                warn!(
                    provider = %conflict.credential.provider,
                    "Signed-in email does not match pending credential, discarding it"
                );
            }
        }

        let token = user.id_token().await?;

        self.state.send_modify(|session| {
            session.identity = Some(user);
            session.token = token.clone();
            session.loading = false;
            session.force_login = false;
            session.link_credential = None;
        });
        info!("Signed in");

        if self.mode == AuthMode::SsoProvider {
            self.redirect.hand_off(&token).await?;
        }

        Ok(())
    }

    fn signed_out(&self) {
        let consumer = self.mode == AuthMode::SsoConsumer;
        let mut pending = false;

        // Read under the state lock so a finished consumption is never undone.
        self.state.send_modify(|session| {
            pending = consumer && self.sso_token_pending();
            session.identity = None;
            session.token.clear();
            session.loading = pending;
            session.force_login = false;
        });
        debug!(mode = %self.mode, pending, "Signed out");
    }

    /// Sign in with the token from the URL of a consumer page.
    ///
    /// Runs at most once per page. Failures are logged and end loading; they
    /// are never returned. Returns whether a sign-in happened.
    pub async fn consume_sso_token(&self) -> bool {
        let token = self
            .sso_token
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        let Some(token) = token else {
            return false;
        };

        match self.identity.sign_in_with_custom_token(&token).await {
            Ok(_) => {
                let scrubbed = without_query_param(&self.location.href(), TOKEN_PARAM);
                self.location.replace_state(scrubbed);
                self.sso_token_pending.store(false, Ordering::SeqCst);
                self.state.send_modify(|session| session.loading = false);
                info!("Signed in with SSO token");
                true
            }
            Err(cause) => {
                error!(
                    code = cause.code(),
                    cause = %cause,
                    "{}",
                    AuthError::SsoToken(cause.clone())
                );
                self.sso_token_pending.store(false, Ordering::SeqCst);
                self.state.send_modify(|session| {
                    session.loading = false;
                    session.force_login = false;
                    session.link_credential = None;
                });
                false
            }
        }
    }

    /// Ask the presentation layer for the login UI.
    pub fn login(&self) {
        self.state.send_modify(|session| {
            session.force_login = true;
            session.link_credential = None;
        });
    }

    /// Send the user to the SSO login page.
    pub fn login_with_sso(&self) -> AuthResult<()> {
        if self.mode != AuthMode::SsoConsumer {
            return Err(AuthError::mode("SSO login", self.mode));
        }

        self.redirect.redirect_to_login()?;
        Ok(())
    }

    /// Interactive sign-in with `provider`.
    ///
    /// An account conflict the SDK could parse is stored for [`link`](Self::link)
    /// and reported as success.
    #[instrument(skip(self), fields(mode = %self.mode))]
    pub async fn login_with_provider(&self, provider: SignInProvider) -> AuthResult<()> {
        if self.mode == AuthMode::SsoConsumer {
            return Err(AuthError::mode("Provider login", self.mode));
        }
        if !provider.supports_popup() {
            return Err(AuthError::InvalidProvider(provider.to_string()));
        }

        match self.identity.sign_in_with_popup(provider).await {
            Ok(_) => Ok(()),
            Err(e) => {
                if let Some(conflict) = e.account_conflict() {
                    info!(
                        verified_provider = %conflict.verified_provider,
                        "Account exists with another provider, link pending"
                    );
                    let conflict = conflict.clone();
                    self.state
                        .send_modify(|session| session.link_credential = Some(conflict));
                    return Ok(());
                }

                self.state.send_modify(|session| session.link_credential = None);
                Err(e.into())
            }
        }
    }

    /// Sign in with an email and password.
    #[instrument(skip(self, password), fields(mode = %self.mode))]
    pub async fn login_with_email_and_password(
        &self,
        email: &str,
        password: &str,
    ) -> AuthResult<()> {
        if self.mode == AuthMode::SsoConsumer {
            return Err(AuthError::mode("Email login", self.mode));
        }

        self.identity
            .sign_in_with_email_and_password(email, password)
            .await?;
        Ok(())
    }

    /// Sign in with the verified provider of the pending conflict.
    ///
    /// The resulting sign-in links the pending credential.
    #[instrument(skip(self), fields(mode = %self.mode))]
    pub async fn link(&self) -> AuthResult<()> {
        let pending = self.state.borrow().link_credential.clone();
        let conflict = pending.ok_or(AuthError::NoLinkCredential)?;

        if let Err(e) = self
            .identity
            .sign_in_with_popup(conflict.verified_provider)
            .await
        {
            self.state.send_modify(|session| session.link_credential = None);
            return Err(e.into());
        }

        Ok(())
    }

    /// Sign out.
    ///
    /// Identity and token are cleared by the resulting auth-state change.
    pub async fn logout(&self) -> AuthResult<()> {
        let result = self.identity.sign_out().await;

        self.state.send_modify(|session| {
            session.force_login = false;
            session.link_credential = None;
        });
        result.map_err(AuthError::from)
    }

    /// Dismiss the login UI and any pending link.
    pub fn clear_force_login(&self) {
        self.state.send_modify(|session| {
            session.force_login = false;
            session.link_credential = None;
        });
    }
}
