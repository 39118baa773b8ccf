//! In-memory identity backend
//!
//! A self-contained [`IdentityClient`] for tests, demos and hosts without a
//! browser identity SDK. It keeps accounts, the current user and the
//! subscriber list in process memory and delivers every state change to all
//! live subscriptions in order.
//!
//! Popup sign-ins have no real UI here; their result is scripted with
//! [`MemoryIdentity::queue_popup`].

use crate::client::IdentityClient;
use crate::credential::{AccountConflict, PendingCredential};
use crate::error::{IdentityError, IdentityResult};
use crate::provider::SignInProvider;
use crate::subscription::{AuthStateChange, AuthStateSubscription};
use crate::user::{User, UserRef};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rand::Rng;
use sha2::{Digest, Sha256};
use std::collections::{HashMap, VecDeque};
use std::sync::Arc;
use tokio::sync::{mpsc, Mutex, RwLock};
use tracing::{debug, info};
use uuid::Uuid;

/// Scripted result of the next popup sign-in.
#[derive(Debug, Clone)]
pub enum PopupOutcome {
    /// The user completes the popup as this email
    SignIn {
        /// Account email
        email: String,
    },
    /// The email is already registered with `verified_provider`
    Conflict {
        /// Account email
        email: String,
        /// Provider the existing account is verified with
        verified_provider: SignInProvider,
    },
    /// The SDK returns an account conflict with this raw custom-data payload
    ConflictPayload(serde_json::Value),
    /// The user closes the popup
    Cancel,
    /// The SDK fails with this error
    Fail(IdentityError),
}

/// Identity backend statistics.
#[derive(Debug, Clone, Default)]
pub struct IdentityStats {
    /// Popup sign-in attempts
    pub popup_sign_ins: u64,
    /// Email/password sign-in attempts
    pub password_sign_ins: u64,
    /// Custom-token sign-in attempts
    pub custom_token_sign_ins: u64,
    /// Sign-outs
    pub sign_outs: u64,
    /// Successful credential links
    pub links: u64,
    /// Subscriptions handed out
    pub subscriptions: u64,
}

impl IdentityStats {
    /// Total sign-in attempts of any kind.
    pub fn sign_in_attempts(&self) -> u64 {
        self.popup_sign_ins + self.password_sign_ins + self.custom_token_sign_ins
    }
}

/// A user account held by [`MemoryIdentity`].
#[derive(Debug)]
pub struct MemoryUser {
    uid: String,
    email: Option<String>,
    display_name: Option<String>,
    password_hash: Option<String>,
    id_token: String,
    providers: RwLock<Vec<SignInProvider>>,
    created_at: DateTime<Utc>,
    last_sign_in_at: RwLock<Option<DateTime<Utc>>>,
    stats: Arc<RwLock<IdentityStats>>,
}

impl MemoryUser {
    /// When the account was created.
    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    /// When the account last signed in.
    pub async fn last_sign_in_at(&self) -> Option<DateTime<Utc>> {
        *self.last_sign_in_at.read().await
    }

    fn verify_password(&self, password: &str) -> bool {
        self.password_hash
            .as_deref()
            .is_some_and(|hash| hash == hash_password(&self.uid, password))
    }
}

#[async_trait]
impl User for MemoryUser {
    fn uid(&self) -> &str {
        &self.uid
    }

    fn email(&self) -> Option<&str> {
        self.email.as_deref()
    }

    fn display_name(&self) -> Option<&str> {
        self.display_name.as_deref()
    }

    async fn providers(&self) -> Vec<SignInProvider> {
        self.providers.read().await.clone()
    }

    async fn id_token(&self) -> IdentityResult<String> {
        Ok(self.id_token.clone())
    }

    async fn link_with_credential(&self, credential: &PendingCredential) -> IdentityResult<()> {
        if !credential.is_usable() {
            return Err(IdentityError::InvalidCredentials);
        }

        let mut providers = self.providers.write().await;
        if providers.contains(&credential.provider) {
            return Err(IdentityError::CredentialAlreadyInUse(credential.provider));
        }
        providers.push(credential.provider);

        self.stats.write().await.links += 1;
        info!(uid = %self.uid, provider = %credential.provider, "Linked credential");
        Ok(())
    }
}

/// In-memory identity backend.
#[derive(Clone)]
pub struct MemoryIdentity {
    /// Accounts keyed by lowercase email
    accounts: Arc<RwLock<HashMap<String, Arc<MemoryUser>>>>,
    /// Signed-in user
    current: Arc<RwLock<Option<Arc<MemoryUser>>>>,
    /// Live subscribers
    subscribers: Arc<Mutex<Vec<mpsc::UnboundedSender<AuthStateChange>>>>,
    /// Minted custom tokens and the email they sign in as
    custom_tokens: Arc<RwLock<HashMap<String, String>>>,
    /// Scripted popup results
    popup_outcomes: Arc<Mutex<VecDeque<PopupOutcome>>>,
    /// Statistics
    stats: Arc<RwLock<IdentityStats>>,
}

impl std::fmt::Debug for MemoryIdentity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MemoryIdentity").finish_non_exhaustive()
    }
}

impl Default for MemoryIdentity {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryIdentity {
    /// Create an empty backend with nobody signed in.
    pub fn new() -> Self {
        Self {
            accounts: Arc::new(RwLock::new(HashMap::new())),
            current: Arc::new(RwLock::new(None)),
            subscribers: Arc::new(Mutex::new(Vec::new())),
            custom_tokens: Arc::new(RwLock::new(HashMap::new())),
            popup_outcomes: Arc::new(Mutex::new(VecDeque::new())),
            stats: Arc::new(RwLock::new(IdentityStats::default())),
        }
    }

    /// Register an email/password account.
    pub async fn create_user(&self, email: &str, password: &str) -> IdentityResult<UserRef> {
        let key = email.to_lowercase();
        let mut accounts = self.accounts.write().await;
        if accounts.contains_key(&key) {
            return Err(IdentityError::Sdk {
                code: "auth/email-already-in-use".to_string(),
                message: format!("{email} is already registered"),
            });
        }

        let user = self.new_user(email, Some(password), SignInProvider::Password);
        accounts.insert(key, user.clone());
        Ok(user as UserRef)
    }

    /// Look up an account by email.
    pub async fn user(&self, email: &str) -> Option<Arc<MemoryUser>> {
        self.accounts.read().await.get(&email.to_lowercase()).cloned()
    }

    /// Mint a custom token that signs in as `email`.
    pub async fn mint_custom_token(&self, email: &str) -> String {
        let token = random_token(48);
        self.custom_tokens
            .write()
            .await
            .insert(token.clone(), email.to_string());
        token
    }

    /// Script the result of the next popup sign-in.
    pub async fn queue_popup(&self, outcome: PopupOutcome) {
        self.popup_outcomes.lock().await.push_back(outcome);
    }

    /// Sign in as `email` without any interaction, as when the SDK restores
    /// a persisted session.
    pub async fn restore_session(&self, email: &str) -> UserRef {
        let user = self
            .get_or_create(email, SignInProvider::Password)
            .await;
        self.complete_sign_in(user.clone()).await;
        user
    }

    /// Get backend statistics.
    pub async fn stats(&self) -> IdentityStats {
        self.stats.read().await.clone()
    }

    /// Number of subscriptions still open.
    pub async fn active_subscriptions(&self) -> usize {
        let mut subscribers = self.subscribers.lock().await;
        subscribers.retain(|sender| !sender.is_closed());
        subscribers.len()
    }

    fn new_user(
        &self,
        email: &str,
        password: Option<&str>,
        provider: SignInProvider,
    ) -> Arc<MemoryUser> {
        let uid = Uuid::now_v7().to_string();
        let password_hash = password.map(|p| hash_password(&uid, p));
        let display_name = email.split('@').next().map(str::to_string);

        Arc::new(MemoryUser {
            uid,
            email: Some(email.to_string()),
            display_name,
            password_hash,
            id_token: random_token(64),
            providers: RwLock::new(vec![provider]),
            created_at: Utc::now(),
            last_sign_in_at: RwLock::new(None),
            stats: self.stats.clone(),
        })
    }

    async fn get_or_create(&self, email: &str, provider: SignInProvider) -> Arc<MemoryUser> {
        let mut accounts = self.accounts.write().await;
        accounts
            .entry(email.to_lowercase())
            .or_insert_with(|| self.new_user(email, None, provider))
            .clone()
    }

    async fn complete_sign_in(&self, user: Arc<MemoryUser>) {
        *user.last_sign_in_at.write().await = Some(Utc::now());
        *self.current.write().await = Some(user.clone());
        debug!(uid = %user.uid, "User signed in");
        self.emit(Some(user as UserRef)).await;
    }

    async fn emit(&self, change: AuthStateChange) {
        let mut subscribers = self.subscribers.lock().await;
        subscribers.retain(|sender| sender.send(change.clone()).is_ok());
    }

    fn conflict_payload(
        attempted: SignInProvider,
        email: &str,
        verified_provider: SignInProvider,
    ) -> serde_json::Value {
        let mut token_response = serde_json::json!({
            "oauthAccessToken": format!("memory-{}-access", attempted.as_str()),
            "verifiedProvider": [verified_provider.provider_id()],
        });
        if attempted.uses_token_secret() {
            token_response["oauthTokenSecret"] =
                serde_json::Value::String(format!("memory-{}-secret", attempted.as_str()));
        } else {
            token_response["oauthIdToken"] =
                serde_json::Value::String(format!("memory-{}-id", attempted.as_str()));
        }

        serde_json::json!({
            "email": email,
            "_tokenResponse": token_response,
        })
    }
}

#[async_trait]
impl IdentityClient for MemoryIdentity {
    async fn subscribe(&self) -> IdentityResult<AuthStateSubscription> {
        let (sender, subscription) = AuthStateSubscription::channel();

        // Initial state and registration must be atomic with respect to emit().
        let mut subscribers = self.subscribers.lock().await;
        let current = self.current.read().await.clone().map(|u| u as UserRef);
        let _ = sender.send(current);
        subscribers.push(sender);

        self.stats.write().await.subscriptions += 1;
        Ok(subscription)
    }

    async fn sign_in_with_popup(&self, provider: SignInProvider) -> IdentityResult<UserRef> {
        self.stats.write().await.popup_sign_ins += 1;

        if !provider.supports_popup() {
            return Err(IdentityError::UnsupportedProvider(provider));
        }

        let outcome = self
            .popup_outcomes
            .lock()
            .await
            .pop_front()
            .unwrap_or_else(|| PopupOutcome::SignIn {
                email: format!("{}.user@example.com", provider.as_str()),
            });

        match outcome {
            PopupOutcome::SignIn { email } => {
                let user = self.get_or_create(&email, provider).await;
                self.complete_sign_in(user.clone()).await;
                Ok(user as UserRef)
            }
            PopupOutcome::Conflict {
                email,
                verified_provider,
            } => {
                let payload = Self::conflict_payload(provider, &email, verified_provider);
                Err(IdentityError::AccountExistsWithDifferentCredential {
                    attempted: provider,
                    conflict: AccountConflict::from_error_payload(provider, &payload).map(Box::new),
                })
            }
            PopupOutcome::ConflictPayload(payload) => {
                Err(IdentityError::AccountExistsWithDifferentCredential {
                    attempted: provider,
                    conflict: AccountConflict::from_error_payload(provider, &payload).map(Box::new),
                })
            }
            PopupOutcome::Cancel => Err(IdentityError::PopupClosed),
            PopupOutcome::Fail(error) => Err(error),
        }
    }

    async fn sign_in_with_email_and_password(
        &self,
        email: &str,
        password: &str,
    ) -> IdentityResult<UserRef> {
        self.stats.write().await.password_sign_ins += 1;

        let user = self
            .user(email)
            .await
            .ok_or_else(|| IdentityError::UserNotFound(email.to_string()))?;
        if !user.verify_password(password) {
            return Err(IdentityError::InvalidCredentials);
        }

        self.complete_sign_in(user.clone()).await;
        Ok(user as UserRef)
    }

    async fn sign_in_with_custom_token(&self, token: &str) -> IdentityResult<UserRef> {
        self.stats.write().await.custom_token_sign_ins += 1;

        let email = self
            .custom_tokens
            .read()
            .await
            .get(token)
            .cloned()
            .ok_or(IdentityError::InvalidCustomToken)?;

        let user = self.get_or_create(&email, SignInProvider::Password).await;
        self.complete_sign_in(user.clone()).await;
        Ok(user as UserRef)
    }

    async fn sign_out(&self) -> IdentityResult<()> {
        self.stats.write().await.sign_outs += 1;
        *self.current.write().await = None;
        debug!("User signed out");
        self.emit(None).await;
        Ok(())
    }

    async fn current_user(&self) -> Option<UserRef> {
        self.current.read().await.clone().map(|u| u as UserRef)
    }
}

fn hash_password(salt: &str, password: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(salt.as_bytes());
    hasher.update(b":");
    hasher.update(password.as_bytes());
    base64::Engine::encode(
        &base64::engine::general_purpose::STANDARD_NO_PAD,
        hasher.finalize(),
    )
}

fn random_token(len: usize) -> String {
    rand::thread_rng()
        .sample_iter(&rand::distributions::Alphanumeric)
        .take(len)
        .map(char::from)
        .collect()
}
