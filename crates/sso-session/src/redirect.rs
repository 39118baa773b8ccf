//! Cross-domain redirects
//!
//! Provider pages hand the user back to the consumer that sent them, with a
//! token scoped to the consumer's host. Consumer pages send the user to the
//! SSO login page with their own URL as the way back.

use crate::error::{AuthError, AuthResult};
use crate::exchange::TokenExchangeClient;
use crate::location::Location;
use crate::mode::{query_param, RETURN_URL_PARAM, TOKEN_PARAM};
use std::sync::Arc;
use tracing::{info, instrument};
use url::Url;

/// Drives the outbound redirects of provider and consumer pages.
#[derive(Clone)]
pub struct RedirectOrchestrator {
    exchange: TokenExchangeClient,
    location: Arc<dyn Location>,
    login_redirect: Option<String>,
}

impl std::fmt::Debug for RedirectOrchestrator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RedirectOrchestrator")
            .field("exchange", &self.exchange)
            .field("login_redirect", &self.login_redirect)
            .finish()
    }
}

impl RedirectOrchestrator {
    /// Create an orchestrator.
    pub fn new(
        exchange: TokenExchangeClient,
        location: Arc<dyn Location>,
        login_redirect: Option<String>,
    ) -> Self {
        Self {
            exchange,
            location,
            login_redirect,
        }
    }

    /// The consumer callback URL carried by this page.
    pub fn return_url(&self) -> AuthResult<Url> {
        let raw = query_param(&self.location.href(), RETURN_URL_PARAM)
            .ok_or_else(|| AuthError::Config("Return URL not found".to_string()))?;

        Url::parse(&raw).map_err(|e| AuthError::Config(format!("Invalid return URL {raw}: {e}")))
    }

    /// Exchange `token` for one scoped to the return URL's host and navigate
    /// there with it.
    ///
    /// Navigates at most once; on failure nothing happens.
    #[instrument(skip_all)]
    pub async fn hand_off(&self, token: &str) -> AuthResult<Url> {
        let return_url = self.return_url()?;
        let scope = return_url
            .host_str()
            .ok_or_else(|| AuthError::Config(format!("Return URL has no host: {return_url}")))?
            .to_string();

        let scoped = self
            .exchange
            .exchange(token, &scope)
            .await
            .map_err(AuthError::Exchange)?;

        let target = with_token(&return_url, &scoped);
        info!(%scope, "Returning to SSO consumer");
        self.location.assign(target.clone());
        Ok(target)
    }

    /// Navigate to the SSO login page with this page as the return URL.
    pub fn redirect_to_login(&self) -> AuthResult<Url> {
        let login = self
            .login_redirect
            .as_deref()
            .ok_or_else(|| AuthError::Config("Login redirect not configured".to_string()))?;

        let current = self.location.href();
        let separator = if login.contains('?') { '&' } else { '?' };
        let raw = format!(
            "{login}{separator}{RETURN_URL_PARAM}={}",
            urlencoding::encode(current.as_str())
        );
        let target = Url::parse(&raw)
            .map_err(|e| AuthError::Config(format!("Invalid login redirect {login}: {e}")))?;

        info!(%target, "Redirecting to SSO login");
        self.location.assign(target.clone());
        Ok(target)
    }
}

/// `url` with its `token` parameter set to `token`.
fn with_token(url: &Url, token: &str) -> Url {
    let mut target = crate::mode::without_query_param(url, TOKEN_PARAM);
    target.query_pairs_mut().append_pair(TOKEN_PARAM, token);
    target
}
