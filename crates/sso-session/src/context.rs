//! Context exposure
//!
//! [`AuthProvider`] is the mounted session of a page: it owns the state
//! machine, the identity SDK subscription and the background tasks that feed
//! it. Components receive an [`AuthContext`], a cheap clone that reads session
//! snapshots and invokes the bound actions.
//!
//! Unmounting (or dropping the provider) stops the listener and releases the
//! SDK subscription.

use crate::config::AuthConfig;
use crate::error::{AuthError, AuthResult};
use crate::location::Location;
use crate::machine::SessionMachine;
use crate::mode::AuthMode;
use crate::session::{AuthView, Session};
use sso_identity::{AccountConflict, AuthStateSubscription, IdentityClient, SignInProvider, UserRef};
use std::sync::Arc;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tracing::{debug, error, info};

/// Prefix of the context label.
pub const CONTEXT_LABEL_PREFIX: &str = "kortexa.ai:auth";

/// A mounted session.
///
/// Fatal errors from the sign-in transition (token exchange, linking,
/// configuration) have no caller when they happen inside the auth-state
/// listener. They are logged and delivered through [`next_error`](Self::next_error).
pub struct AuthProvider {
    machine: Arc<SessionMachine>,
    listener: Option<JoinHandle<()>>,
    consumer: Option<JoinHandle<()>>,
    errors: mpsc::UnboundedReceiver<AuthError>,
}

impl std::fmt::Debug for AuthProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AuthProvider")
            .field("machine", &self.machine)
            .finish_non_exhaustive()
    }
}

impl AuthProvider {
    /// Mount a session for the page at `location`.
    ///
    /// Resolves the mode, subscribes to the identity SDK and, on consumer
    /// pages carrying a `token`, starts signing in with it. Must be called
    /// within a tokio runtime.
    pub async fn mount(
        config: AuthConfig,
        identity: Arc<dyn IdentityClient>,
        location: Arc<dyn Location>,
    ) -> AuthResult<Self> {
        config
            .validate()
            .map_err(|e| AuthError::Config(e.to_string()))?;

        let machine = Arc::new(SessionMachine::new(&config, identity.clone(), location)?);
        let subscription = identity.subscribe().await?;
        let (error_tx, errors) = mpsc::unbounded_channel();

        let listener = tokio::spawn(listen(machine.clone(), subscription, error_tx));

        let consumer = machine.sso_token_pending().then(|| {
            let machine = machine.clone();
            tokio::spawn(async move {
                machine.consume_sso_token().await;
            })
        });

        info!(mode = %machine.mode(), "Auth provider mounted");

        Ok(Self {
            machine,
            listener: Some(listener),
            consumer,
            errors,
        })
    }

    /// Context handed to components.
    pub fn context(&self) -> AuthContext {
        AuthContext {
            machine: self.machine.clone(),
            receiver: self.machine.watch(),
        }
    }

    /// Mode of the page.
    pub fn mode(&self) -> AuthMode {
        self.machine.mode()
    }

    /// Wait for the next unhandled error from the auth-state listener.
    ///
    /// Returns `None` once the listener has stopped and every error has been
    /// received.
    pub async fn next_error(&mut self) -> Option<AuthError> {
        self.errors.recv().await
    }

    /// Take an unhandled error if one is queued.
    pub fn try_next_error(&mut self) -> Option<AuthError> {
        self.errors.try_recv().ok()
    }

    /// Tear down the session and wait for the background tasks to stop.
    ///
    /// Once this returns the SDK subscription is released.
    pub async fn unmount(mut self) {
        self.machine.shutdown();

        for task in [self.listener.take(), self.consumer.take()].into_iter().flatten() {
            task.abort();
            let _ = task.await;
        }
        info!(mode = %self.machine.mode(), "Auth provider unmounted");
    }
}

impl Drop for AuthProvider {
    fn drop(&mut self) {
        self.machine.shutdown();
        for task in [self.listener.take(), self.consumer.take()].into_iter().flatten() {
            task.abort();
        }
    }
}

/// Process auth-state changes one at a time, in delivery order.
async fn listen(
    machine: Arc<SessionMachine>,
    mut subscription: AuthStateSubscription,
    errors: mpsc::UnboundedSender<AuthError>,
) {
    debug!(subscription = %subscription.id, "Auth-state listener started");

    while let Some(change) = subscription.next().await {
        if !machine.is_alive() {
            break;
        }

        if let Err(e) = machine.handle_auth_state(change).await {
            error!(code = e.error_code(), error = %e, "Unhandled auth-state error");
            let _ = errors.send(e);
        }
    }

    debug!(subscription = %subscription.id, "Auth-state listener stopped");
    subscription.unsubscribe();
}

/// Read access to the session plus the bound actions.
#[derive(Debug, Clone)]
pub struct AuthContext {
    machine: Arc<SessionMachine>,
    receiver: watch::Receiver<Session>,
}

impl AuthContext {
    /// Current session snapshot.
    pub fn session(&self) -> Session {
        self.receiver.borrow().clone()
    }

    /// A receiver observing every session update.
    pub fn watch(&self) -> watch::Receiver<Session> {
        self.machine.watch()
    }

    /// Signed-in principal.
    pub fn identity(&self) -> Option<UserRef> {
        self.receiver.borrow().identity.clone()
    }

    /// Bearer token, empty when signed out.
    pub fn token(&self) -> String {
        self.receiver.borrow().token.clone()
    }

    /// Whether the auth state is still unresolved.
    pub fn loading(&self) -> bool {
        self.receiver.borrow().loading
    }

    /// Mode of the page.
    pub fn mode(&self) -> AuthMode {
        self.machine.mode()
    }

    /// Whether the page may be used without signing in.
    pub fn allow_anonymous(&self) -> bool {
        self.receiver.borrow().allow_anonymous
    }

    /// Whether the login UI was explicitly requested.
    pub fn force_login(&self) -> bool {
        self.receiver.borrow().force_login
    }

    /// Account conflict waiting to be linked.
    pub fn link_credential(&self) -> Option<AccountConflict> {
        self.receiver.borrow().link_credential.clone()
    }

    /// Whether a principal is signed in.
    pub fn is_authenticated(&self) -> bool {
        self.receiver.borrow().is_authenticated()
    }

    /// What the presentation layer should show.
    pub fn view(&self) -> AuthView {
        self.receiver.borrow().view()
    }

    /// Debug label, e.g. `kortexa.ai:auth:sso-consumer`.
    pub fn label(&self) -> String {
        format!("{}:{}", CONTEXT_LABEL_PREFIX, self.mode())
    }

    /// Wait until the first sign-in/sign-out resolution.
    pub async fn wait_until_loaded(&self) -> Session {
        let mut receiver = self.machine.watch();
        let session = match receiver.wait_for(|session| !session.loading).await {
            Ok(session) => session.clone(),
            Err(_) => self.session(),
        };
        session
    }

    /// Wait for the next session update and return it.
    pub async fn changed(&mut self) -> Session {
        // The sender lives as long as the machine this context holds.
        let _ = self.receiver.changed().await;
        self.receiver.borrow_and_update().clone()
    }

    /// Show the login UI.
    pub fn login(&self) {
        self.machine.login();
    }

    /// Go to the SSO login page (consumer pages only).
    pub fn login_with_sso(&self) -> AuthResult<()> {
        self.machine.login_with_sso()
    }

    /// Interactive sign-in with `provider` (not on consumer pages).
    pub async fn login_with_provider(&self, provider: SignInProvider) -> AuthResult<()> {
        self.machine.login_with_provider(provider).await
    }

    /// Interactive sign-in with a provider given by name, e.g. `"github"`.
    pub async fn login_with_provider_name(&self, name: &str) -> AuthResult<()> {
        let provider =
            SignInProvider::parse(name).ok_or_else(|| AuthError::InvalidProvider(name.to_string()))?;
        self.login_with_provider(provider).await
    }

    /// Email and password sign-in (not on consumer pages).
    pub async fn login_with_email_and_password(
        &self,
        email: &str,
        password: &str,
    ) -> AuthResult<()> {
        self.machine
            .login_with_email_and_password(email, password)
            .await
    }

    /// Resolve a pending account conflict by signing in with the verified
    /// provider.
    pub async fn link(&self) -> AuthResult<()> {
        self.machine.link().await
    }

    /// Sign out; identity and token clear once the SDK reports it.
    pub async fn logout(&self) -> AuthResult<()> {
        self.machine.logout().await
    }

    /// Dismiss the login UI and any pending link.
    pub fn clear_force_login(&self) {
        self.machine.clear_force_login();
    }
}
