//! Remote resource client.
//!
//! [`ResourceApi`] is the contract the coordinator relies on: four resource
//! operations, each resolving to an [`Envelope`]. [`RestClient`] implements it
//! over `reqwest` with session cookies, a JSON content type, and the CSRF
//! token captured at construction.

use async_trait::async_trait;
use reqwest::Method;
use reqwest::header::{CONTENT_TYPE, HeaderMap, HeaderName, HeaderValue};
use serde_json::Value;
use tracing::{debug, info, warn};

use crate::config::ClientConfig;
use crate::endpoints;
use crate::envelope::Envelope;
use crate::error::NetError;
use crate::query::Query;

/// Header carrying the anti-forgery token (`X-CSRFToken`).
pub const CSRF_HEADER: &str = "x-csrftoken";

/// Resource operations against the REST backend.
///
/// Implementations never fail: transport and HTTP errors come back as
/// [`Envelope::Error`].
#[async_trait]
pub trait ResourceApi: Send + Sync {
    /// `GET {collection}/?{query}`.
    async fn list(&self, collection: &str, attrs: &Query) -> Envelope;

    /// `GET {collection}/{id}/`.
    async fn get(&self, collection: &str, id: u64) -> Envelope;

    /// `PATCH {collection}/{id}/` with only the changed fields.
    async fn patch(&self, collection: &str, id: u64, partial: &Value) -> Envelope;

    /// `POST {collection}/` creating a new entity.
    async fn post(&self, collection: &str, body: &Value) -> Envelope;
}

/// `reqwest`-backed [`ResourceApi`].
#[derive(Debug, Clone)]
pub struct RestClient {
    /// The underlying HTTP client, carrying default headers and the cookie jar.
    http: reqwest::Client,
    /// Base URL, without trailing slash.
    base_url: String,
}

impl RestClient {
    /// Build a client from the given configuration.
    ///
    /// # Errors
    ///
    /// Returns [`NetError`] if the base URL is not absolute, the CSRF token is
    /// not a valid header value, or the HTTP client cannot be built.
    pub fn new(config: &ClientConfig) -> Result<Self, NetError> {
        let base_url = config.base_url.trim_end_matches('/').to_string();
        if !(base_url.starts_with("http://") || base_url.starts_with("https://")) {
            return Err(NetError::InvalidBaseUrl(config.base_url.clone()));
        }

        let mut headers = HeaderMap::new();
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        if let Some(token) = &config.csrf_token {
            let value = HeaderValue::from_str(token).map_err(|source| NetError::InvalidHeader {
                name: CSRF_HEADER,
                source,
            })?;
            headers.insert(HeaderName::from_static(CSRF_HEADER), value);
        }

        let http = reqwest::Client::builder()
            .default_headers(headers)
            .cookie_store(true)
            .build()?;

        info!(
            base_url = %base_url,
            csrf = config.csrf_token.is_some(),
            "resource client ready"
        );
        Ok(Self { http, base_url })
    }

    /// Returns the base URL requests are made against.
    #[must_use]
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Log in with username and password, establishing a session cookie.
    pub async fn login(&self, username: &str, password: &str) -> Envelope {
        let body = serde_json::json!({ "username": username, "password": password });
        let url = endpoints::join(&self.base_url, endpoints::AUTH_LOGIN);
        self.send(Method::POST, url, Some(&body)).await
    }

    /// End the current session.
    pub async fn logout(&self) -> Envelope {
        let url = endpoints::join(&self.base_url, endpoints::AUTH_LOGOUT);
        self.send(Method::POST, url, None).await
    }

    /// Fetch the currently authenticated user.
    pub async fn user(&self) -> Envelope {
        let url = endpoints::join(&self.base_url, endpoints::AUTH_USER);
        self.send(Method::GET, url, None).await
    }

    async fn send(&self, method: Method, url: String, body: Option<&Value>) -> Envelope {
        debug!(%method, url = %url, "request");
        let mut request = self.http.request(method.clone(), &url);
        if let Some(body) = body {
            request = request.json(body);
        }

        let response = match request.send().await {
            Ok(response) => response,
            Err(err) => {
                warn!(%method, url = %url, error = %err, "request failed");
                return Envelope::transport(err);
            }
        };

        let status = response.status().as_u16();
        let envelope = match response.bytes().await {
            Ok(bytes) => Envelope::normalize(status, &url, &bytes),
            Err(err) => Envelope::transport(err),
        };
        debug!(%method, url = %url, status, ok = envelope.is_ok(), "response");
        envelope
    }
}

#[async_trait]
impl ResourceApi for RestClient {
    async fn list(&self, collection: &str, attrs: &Query) -> Envelope {
        let url = endpoints::query_url(&self.base_url, collection, attrs);
        self.send(Method::GET, url, None).await
    }

    async fn get(&self, collection: &str, id: u64) -> Envelope {
        let url = endpoints::entity_url(&self.base_url, collection, id);
        self.send(Method::GET, url, None).await
    }

    async fn patch(&self, collection: &str, id: u64, partial: &Value) -> Envelope {
        let url = endpoints::entity_url(&self.base_url, collection, id);
        self.send(Method::PATCH, url, Some(partial)).await
    }

    async fn post(&self, collection: &str, body: &Value) -> Envelope {
        let url = endpoints::collection_url(&self.base_url, collection);
        self.send(Method::POST, url, Some(body)).await
    }
}
