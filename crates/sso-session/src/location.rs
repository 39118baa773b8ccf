//! Page location
//!
//! The session layer reads the page URL and either navigates away or rewrites
//! the URL in place. Hosts provide a [`Location`] backed by the browser;
//! [`MemoryLocation`] records everything for tests and headless hosts.

use std::sync::{Arc, Mutex, PoisonError};
use tracing::debug;
use url::Url;

/// Access to the current page URL.
pub trait Location: Send + Sync {
    /// Current page URL.
    fn href(&self) -> Url;

    /// Navigate away to `url`.
    fn assign(&self, url: Url);

    /// Replace the current URL without navigating or reloading.
    fn replace_state(&self, url: Url);
}

#[derive(Debug)]
struct MemoryLocationState {
    href: Url,
    navigations: Vec<Url>,
    replacements: Vec<Url>,
}

/// In-memory location that records navigations and history replacements.
///
/// Navigation is recorded but does not change `href`; a real browser would
/// unload the page.
#[derive(Debug, Clone)]
pub struct MemoryLocation {
    state: Arc<Mutex<MemoryLocationState>>,
}

impl MemoryLocation {
    /// Create a location at `href`.
    pub fn new(href: Url) -> Self {
        Self {
            state: Arc::new(Mutex::new(MemoryLocationState {
                href,
                navigations: Vec::new(),
                replacements: Vec::new(),
            })),
        }
    }

    /// Parse `href` and create a location there.
    pub fn parse(href: &str) -> Result<Self, url::ParseError> {
        Ok(Self::new(Url::parse(href)?))
    }

    /// URLs passed to [`Location::assign`], in order.
    pub fn navigations(&self) -> Vec<Url> {
        self.lock().navigations.clone()
    }

    /// URLs passed to [`Location::replace_state`], in order.
    pub fn replacements(&self) -> Vec<Url> {
        self.lock().replacements.clone()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, MemoryLocationState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl Location for MemoryLocation {
    fn href(&self) -> Url {
        self.lock().href.clone()
    }

    fn assign(&self, url: Url) {
        debug!(%url, "Navigating");
        self.lock().navigations.push(url);
    }

    fn replace_state(&self, url: Url) {
        debug!(%url, "Replacing history state");
        let mut state = self.lock();
        state.href = url.clone();
        state.replacements.push(url);
    }
}
