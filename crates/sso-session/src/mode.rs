//! Mode resolution
//!
//! A page plays exactly one role for its whole lifetime, decided from its URL
//! before anything else happens.

use serde::{Deserialize, Serialize};
use url::Url;

/// Query parameter carrying the consumer's callback URL.
pub const RETURN_URL_PARAM: &str = "returnUrl";

/// Query parameter carrying an inbound SSO token.
pub const TOKEN_PARAM: &str = "token";

/// Query parameter that suppresses automatic consumer mode.
pub const NO_SSO_PARAM: &str = "no_sso";

/// Authentication mode of a page.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "kebab-case")]
pub enum AuthMode {
    /// Direct sign-in on this page
    Standalone,
    /// Signs the user in and issues scoped tokens to a return URL
    SsoProvider,
    /// Receives tokens from an SSO provider
    SsoConsumer,
}

impl AuthMode {
    /// Get the string representation.
    pub fn as_str(&self) -> &'static str {
        match self {
            AuthMode::Standalone => "standalone",
            AuthMode::SsoProvider => "sso-provider",
            AuthMode::SsoConsumer => "sso-consumer",
        }
    }

    /// Resolve the mode of a page.
    ///
    /// Precedence:
    /// 1. `returnUrl` present: provider
    /// 2. `token` present: consumer
    /// 3. login redirect configured and no `no_sso`: consumer
    /// 4. otherwise standalone
    pub fn resolve(page: &Url, has_login_redirect: bool) -> Self {
        let has = |name: &str| page.query_pairs().any(|(key, _)| key == name);

        if has(RETURN_URL_PARAM) {
            AuthMode::SsoProvider
        } else if has(TOKEN_PARAM) {
            AuthMode::SsoConsumer
        } else if has_login_redirect && !has(NO_SSO_PARAM) {
            AuthMode::SsoConsumer
        } else {
            AuthMode::Standalone
        }
    }
}

impl std::fmt::Display for AuthMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// First value of a query parameter.
pub fn query_param(page: &Url, name: &str) -> Option<String> {
    page.query_pairs()
        .find(|(key, _)| key == name)
        .map(|(_, value)| value.into_owned())
}

/// `page` with every `name` parameter removed.
///
/// Other parameters and the fragment are kept; an emptied query is dropped
/// entirely.
pub fn without_query_param(page: &Url, name: &str) -> Url {
    let kept: Vec<(String, String)> = page
        .query_pairs()
        .filter(|(key, _)| key != name)
        .map(|(key, value)| (key.into_owned(), value.into_owned()))
        .collect();

    let mut url = page.clone();
    if kept.is_empty() {
        url.set_query(None);
    } else {
        url.query_pairs_mut().clear().extend_pairs(kept);
    }
    url
}

#[cfg(test)]
mod tests {
    use super::*;

    fn page(query: &str) -> Url {
        Url::parse(&format!("https://app.example.com/{query}")).unwrap()
    }

    #[test]
    fn test_return_url_selects_provider() {
        let url = page("?returnUrl=https://other.example.com/cb");
        assert_eq!(AuthMode::resolve(&url, false), AuthMode::SsoProvider);
        assert_eq!(AuthMode::resolve(&url, true), AuthMode::SsoProvider);
    }

    #[test]
    fn test_return_url_wins_over_token() {
        let url = page("?token=abc&returnUrl=https://other.example.com/cb");
        assert_eq!(AuthMode::resolve(&url, false), AuthMode::SsoProvider);
        assert_eq!(AuthMode::resolve(&url, true), AuthMode::SsoProvider);
    }

    #[test]
    fn test_token_selects_consumer() {
        let url = page("?token=abc");
        assert_eq!(AuthMode::resolve(&url, false), AuthMode::SsoConsumer);

        // An explicit token beats the no_sso override
        let url = page("?token=abc&no_sso=true");
        assert_eq!(AuthMode::resolve(&url, true), AuthMode::SsoConsumer);
    }

    #[test]
    fn test_login_redirect_selects_consumer() {
        assert_eq!(AuthMode::resolve(&page(""), true), AuthMode::SsoConsumer);
    }

    #[test]
    fn test_no_sso_keeps_standalone() {
        let url = page("?no_sso=true");
        assert_eq!(AuthMode::resolve(&url, true), AuthMode::Standalone);

        let url = page("?no_sso");
        assert_eq!(AuthMode::resolve(&url, true), AuthMode::Standalone);
    }

    #[test]
    fn test_plain_page_is_standalone() {
        assert_eq!(AuthMode::resolve(&page(""), false), AuthMode::Standalone);
        assert_eq!(AuthMode::resolve(&page("?foo=bar"), false), AuthMode::Standalone);
    }

    #[test]
    fn test_mode_serialization() {
        assert_eq!(
            serde_json::to_string(&AuthMode::SsoProvider).unwrap(),
            "\"sso-provider\""
        );
        assert_eq!(AuthMode::SsoConsumer.to_string(), "sso-consumer");
    }

    #[test]
    fn test_query_param() {
        let url = page("?returnUrl=https%3A%2F%2Fother.example.com%2Fcb%3Fa%3D1");
        assert_eq!(
            query_param(&url, RETURN_URL_PARAM).as_deref(),
            Some("https://other.example.com/cb?a=1")
        );
        assert_eq!(query_param(&url, TOKEN_PARAM), None);
    }

    #[test]
    fn test_without_query_param() {
        let url = Url::parse("http://test.com/?token=custom-token").unwrap();
        assert_eq!(without_query_param(&url, TOKEN_PARAM).as_str(), "http://test.com/");

        let url = Url::parse("http://test.com/page?tab=2&token=abc#top").unwrap();
        assert_eq!(
            without_query_param(&url, TOKEN_PARAM).as_str(),
            "http://test.com/page?tab=2#top"
        );
    }
}
