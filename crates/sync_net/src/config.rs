//! Client configuration.

/// Default API base URL.
pub const DEFAULT_API_URL: &str = "http://localhost:8000/api";

/// The environment variable used to override the API base URL.
pub const API_URL_ENV: &str = "SYNC_API_URL";

/// The environment variable holding a `Cookie:`-style string from which the
/// CSRF token is captured.
pub const COOKIE_ENV: &str = "SYNC_COOKIE";

/// Name of the anti-forgery cookie.
pub const CSRF_COOKIE: &str = "csrftoken";

/// Configuration for a [`RestClient`](crate::RestClient).
#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// Base URL all resource paths are joined onto.
    pub base_url: String,
    /// Anti-forgery token sent as `X-CSRFToken`, captured once at startup.
    pub csrf_token: Option<String>,
}

impl ClientConfig {
    /// Create a config for the given base URL with no CSRF token.
    #[must_use]
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            csrf_token: None,
        }
    }

    /// Build a config from `SYNC_API_URL` and `SYNC_COOKIE`, falling back to
    /// [`DEFAULT_API_URL`] and no token.
    #[must_use]
    pub fn from_env() -> Self {
        let base_url = std::env::var(API_URL_ENV).unwrap_or_else(|_| DEFAULT_API_URL.to_string());
        let csrf_token = std::env::var(COOKIE_ENV)
            .ok()
            .and_then(|cookies| csrf_from_cookie(&cookies));
        Self {
            base_url,
            csrf_token,
        }
    }

    /// Set the CSRF token explicitly.
    #[must_use]
    pub fn with_csrf_token(mut self, token: impl Into<String>) -> Self {
        self.csrf_token = Some(token.into());
        self
    }

    /// Capture the CSRF token from a `Cookie:`-style string, if present.
    #[must_use]
    pub fn with_cookies(mut self, cookies: &str) -> Self {
        if let Some(token) = csrf_from_cookie(cookies) {
            self.csrf_token = Some(token);
        }
        self
    }
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self::new(DEFAULT_API_URL)
    }
}

/// Extract the `csrftoken` value from a `name=value; name=value` cookie string.
///
/// Returns `None` when the cookie is missing or empty.
#[must_use]
pub fn csrf_from_cookie(cookies: &str) -> Option<String> {
    cookies
        .split(';')
        .filter_map(|pair| pair.split_once('='))
        .find(|(name, _)| name.trim() == CSRF_COOKIE)
        .map(|(_, value)| value.trim().to_string())
        .filter(|value| !value.is_empty())
}
