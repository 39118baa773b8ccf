//! End-to-end tests for the SSO provider and consumer flows.
//!
//! The login server is simulated with wiremock; the identity SDK and the
//! browser location are the in-memory backends. Each test mounts a page and
//! drives it the way a user would.
//!
//! Flows:
//! 1. provider: sign in, exchange the token, return to the consumer
//! 2. consumer: sign in with the inbound token, scrub it from the URL
//! 3. actions: mode checks, logout, linking after an account conflict

use sso_identity::{IdentityClient, MemoryIdentity, PopupOutcome, SignInProvider};
use sso_session::{
    AuthConfig, AuthContext, AuthError, AuthMode, AuthProvider, AuthView, ExchangeError,
    Location, MemoryLocation, Session,
};
use std::error::Error as _;
use std::sync::Arc;
use std::time::Duration;
use url::Url;
use wiremock::matchers::{header, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

const RETURN_URL: &str = "https://app.example.com/cb";

/// A mounted page with in-memory SDK and location.
struct TestPage {
    provider: AuthProvider,
    identity: MemoryIdentity,
    location: MemoryLocation,
}

impl TestPage {
    async fn mount(href: &str, config: AuthConfig) -> Self {
        Self::mount_with(MemoryIdentity::new(), href, config).await
    }

    async fn mount_with(identity: MemoryIdentity, href: &str, config: AuthConfig) -> Self {
        let location = MemoryLocation::parse(href).unwrap();
        let provider = AuthProvider::mount(
            config,
            Arc::new(identity.clone()),
            Arc::new(location.clone()),
        )
        .await
        .unwrap();

        Self {
            provider,
            identity,
            location,
        }
    }

    fn context(&self) -> AuthContext {
        self.provider.context()
    }

    /// Wait for the first navigation away from the page.
    async fn navigation(&self) -> Url {
        tokio::time::timeout(Duration::from_secs(5), async {
            loop {
                if let Some(url) = self.location.navigations().first() {
                    return url.clone();
                }
                tokio::time::sleep(Duration::from_millis(10)).await;
            }
        })
        .await
        .expect("page never navigated")
    }

    async fn next_error(&mut self) -> AuthError {
        tokio::time::timeout(Duration::from_secs(5), self.provider.next_error())
            .await
            .expect("no unhandled error")
            .expect("error channel closed")
    }
}

/// Wait until the session satisfies `predicate`.
async fn wait_for(context: &AuthContext, predicate: impl FnMut(&Session) -> bool) -> Session {
    let mut receiver = context.watch();
    let session = tokio::time::timeout(Duration::from_secs(5), receiver.wait_for(predicate))
        .await
        .expect("session never reached the expected state")
        .unwrap()
        .clone();
    session
}

fn provider_href() -> String {
    format!(
        "https://login.example.com/?returnUrl={}",
        urlencoding::encode(RETURN_URL)
    )
}

fn provider_config(server: &MockServer) -> AuthConfig {
    AuthConfig::new().with_login_server(server.uri())
}

fn consumer_config() -> AuthConfig {
    AuthConfig::new().with_login_redirect("https://login.example.com/")
}

// ============================================================================
// Provider flow
// ============================================================================

#[tokio::test]
async fn test_provider_hands_off_scoped_token() {
    let server = MockServer::start().await;
    let identity = MemoryIdentity::new();
    let user = identity.create_user("ada@example.com", "secret").await.unwrap();
    let id_token = user.id_token().await.unwrap();

    Mock::given(method("GET"))
        .and(path("/api/v1/sso"))
        .and(query_param("scope", "app.example.com"))
        .and(header("Authorization", format!("Bearer {id_token}").as_str()))
        .and(header("Content-Type", "application/json"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "token": "X"
        })))
        .expect(1)
        .mount(&server)
        .await;

    let page = TestPage::mount_with(identity, &provider_href(), provider_config(&server)).await;
    let context = page.context();
    assert_eq!(context.mode(), AuthMode::SsoProvider);

    context
        .login_with_email_and_password("ada@example.com", "secret")
        .await
        .unwrap();

    let target = page.navigation().await;
    assert_eq!(target.as_str(), "https://app.example.com/cb?token=X");

    // Exactly once
    tokio::time::sleep(Duration::from_millis(100)).await;
    assert_eq!(page.location.navigations().len(), 1);

    let session = context.session();
    assert!(session.is_authenticated());
    assert_eq!(session.token, id_token);
}

#[tokio::test]
async fn test_provider_bounces_restored_session() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/v1/sso"))
        .and(query_param("scope", "app.example.com"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "token": "scoped"
        })))
        .expect(1)
        .mount(&server)
        .await;

    let identity = MemoryIdentity::new();
    identity.restore_session("ada@example.com").await;

    let href = format!(
        "https://login.example.com/?returnUrl={}",
        urlencoding::encode("https://app.example.com/cb?token=stale&tab=2")
    );
    let page = TestPage::mount_with(identity, &href, provider_config(&server)).await;

    let target = page.navigation().await;
    assert_eq!(target.as_str(), "https://app.example.com/cb?tab=2&token=scoped");
}

#[tokio::test]
async fn test_provider_exchange_failure_keeps_local_sign_in() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/v1/sso"))
        .respond_with(ResponseTemplate::new(500))
        .mount(&server)
        .await;

    let mut page = TestPage::mount(&provider_href(), provider_config(&server)).await;
    let context = page.context();

    context
        .login_with_provider(SignInProvider::Google)
        .await
        .unwrap();

    let err = page.next_error().await;
    assert!(err.is_fatal());
    assert_eq!(err.to_string(), "Token exchange failed");
    assert!(err.source().unwrap().to_string().contains("500"));
    match err {
        AuthError::Exchange(inner) => assert_eq!(inner.status(), Some(500)),
        other => panic!("expected exchange error, got {other:?}"),
    }

    let session = context.session();
    assert_eq!(session.email(), Some("google.user@example.com"));
    assert!(!session.token.is_empty());
    assert!(page.location.navigations().is_empty());
}

#[tokio::test]
async fn test_provider_response_without_token() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/v1/sso"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({})))
        .mount(&server)
        .await;

    let mut page = TestPage::mount(&provider_href(), provider_config(&server)).await;
    page.context()
        .login_with_provider(SignInProvider::GitHub)
        .await
        .unwrap();

    let err = page.next_error().await;
    assert!(matches!(err, AuthError::Exchange(ExchangeError::MissingToken)));
    assert!(page.location.navigations().is_empty());
}

#[tokio::test]
async fn test_provider_invalid_return_url() {
    let mut page = TestPage::mount(
        "https://login.example.com/?returnUrl=not-a-url",
        AuthConfig::new(),
    )
    .await;
    assert_eq!(page.context().mode(), AuthMode::SsoProvider);

    page.context()
        .login_with_provider(SignInProvider::Google)
        .await
        .unwrap();

    let err = page.next_error().await;
    assert!(matches!(err, AuthError::Config(_)));
    assert!(page.location.navigations().is_empty());
}

#[tokio::test]
async fn test_sso_login_rejected_outside_consumer_mode() {
    let page = TestPage::mount(&provider_href(), AuthConfig::new()).await;

    let err = page.context().login_with_sso().unwrap_err();
    assert!(matches!(
        err,
        AuthError::Mode {
            mode: AuthMode::SsoProvider,
            ..
        }
    ));
    assert!(page.location.navigations().is_empty());
}

// ============================================================================
// Consumer flow
// ============================================================================

#[tokio::test]
async fn test_consumer_consumes_token_once() {
    let identity = MemoryIdentity::new();
    let token = identity.mint_custom_token("ada@example.com").await;
    let href = format!("https://app.example.com/?tab=2&token={token}");

    let page = TestPage::mount_with(identity.clone(), &href, consumer_config()).await;
    let context = page.context();
    assert_eq!(context.mode(), AuthMode::SsoConsumer);

    let session = wait_for(&context, |s| s.is_authenticated() && !s.loading).await;
    assert_eq!(session.email(), Some("ada@example.com"));

    // Scrubbed in place, other parameters kept
    assert_eq!(page.location.href().as_str(), "https://app.example.com/?tab=2");
    assert_eq!(page.location.replacements().len(), 1);
    assert!(page.location.navigations().is_empty());

    // A reload of the scrubbed URL never replays the token
    page.provider.unmount().await;
    let reloaded = TestPage::mount_with(
        identity.clone(),
        page.location.href().as_str(),
        consumer_config(),
    )
    .await;
    wait_for(&reloaded.context(), |s| !s.loading).await;
    assert_eq!(identity.stats().await.custom_token_sign_ins, 1);
}

#[tokio::test]
async fn test_consumer_token_failure_is_recovered() {
    let mut page = TestPage::mount("https://app.example.com/?token=bogus", consumer_config()).await;
    let context = page.context();

    let session = wait_for(&context, |s| !s.loading).await;
    assert!(!session.is_authenticated());
    assert!(!session.force_login);
    assert_eq!(context.view(), AuthView::Login);

    // Logged, not propagated
    assert!(page.provider.try_next_error().is_none());
    assert!(page.location.replacements().is_empty());
}

#[tokio::test]
async fn test_consumer_redirects_to_login() {
    let page = TestPage::mount("https://app.example.com/notes?id=7", consumer_config()).await;

    page.context().login_with_sso().unwrap();

    let target = page.navigation().await;
    assert_eq!(
        target.as_str(),
        "https://login.example.com/?returnUrl=https%3A%2F%2Fapp.example.com%2Fnotes%3Fid%3D7"
    );
}

#[tokio::test]
async fn test_consumer_rejects_direct_sign_in() {
    let page = TestPage::mount("https://app.example.com/", consumer_config()).await;
    let context = page.context();

    let err = context
        .login_with_provider(SignInProvider::Google)
        .await
        .unwrap_err();
    assert_eq!(err.error_code(), "MODE_ERROR");

    let err = context
        .login_with_email_and_password("ada@example.com", "secret")
        .await
        .unwrap_err();
    assert!(matches!(err, AuthError::Mode { .. }));

    assert_eq!(page.identity.stats().await.sign_in_attempts(), 0);
}

#[tokio::test]
async fn test_no_sso_stays_standalone() {
    let page = TestPage::mount("https://app.example.com/?no_sso=1", consumer_config()).await;
    assert_eq!(page.context().mode(), AuthMode::Standalone);
    assert_eq!(page.context().label(), "kortexa.ai:auth:standalone");
}

// ============================================================================
// Actions
// ============================================================================

#[tokio::test]
async fn test_logout_resets_session() {
    let identity = MemoryIdentity::new();
    identity.restore_session("ada@example.com").await;
    let page = TestPage::mount_with(identity, "https://app.example.com/", AuthConfig::new()).await;
    let context = page.context();
    wait_for(&context, |s| s.is_authenticated()).await;

    context.login();
    context.logout().await.unwrap();

    let session = wait_for(&context, |s| s.identity.is_none()).await;
    assert!(session.token.is_empty());
    assert!(!session.force_login);
    assert!(session.link_credential.is_none());
    assert!(page.identity.current_user().await.is_none());
}

#[tokio::test]
async fn test_clear_force_login_keeps_identity() {
    let identity = MemoryIdentity::new();
    identity.restore_session("ada@example.com").await;
    let page = TestPage::mount_with(
        identity,
        "https://app.example.com/",
        AuthConfig::new().with_allow_anonymous(true),
    )
    .await;
    let context = page.context();
    let before = wait_for(&context, |s| s.is_authenticated()).await;

    context.login();
    assert!(context.force_login());
    context.clear_force_login();

    let after = context.session();
    assert!(!after.force_login);
    assert_eq!(after.token, before.token);
    assert_eq!(after.email(), before.email());
}

#[tokio::test]
async fn test_account_conflict_is_linked() {
    let page = TestPage::mount("https://app.example.com/", AuthConfig::new()).await;
    let context = page.context();
    wait_for(&context, |s| !s.loading).await;

    page.identity
        .queue_popup(PopupOutcome::Conflict {
            email: "ada@example.com".to_string(),
            verified_provider: SignInProvider::Google,
        })
        .await;
    page.identity
        .queue_popup(PopupOutcome::SignIn {
            email: "ada@example.com".to_string(),
        })
        .await;

    context
        .login_with_provider(SignInProvider::GitHub)
        .await
        .unwrap();
    assert_eq!(context.view(), AuthView::Link);
    let conflict = context.link_credential().unwrap();
    assert_eq!(conflict.verified_provider, SignInProvider::Google);

    context.link().await.unwrap();

    let session = wait_for(&context, |s| s.is_authenticated()).await;
    assert!(session.link_credential.is_none());
    assert_eq!(context.view(), AuthView::Content);

    let user = session.identity.unwrap();
    let providers = user.providers().await;
    assert!(providers.contains(&SignInProvider::Google));
    assert!(providers.contains(&SignInProvider::GitHub));
    assert_eq!(page.identity.stats().await.links, 1);
}

#[tokio::test]
async fn test_link_without_conflict() {
    let page = TestPage::mount("https://app.example.com/", AuthConfig::new()).await;

    let err = page.context().link().await.unwrap_err();
    assert!(matches!(err, AuthError::NoLinkCredential));
    assert_eq!(err.error_code(), "STATE_ERROR");
}
