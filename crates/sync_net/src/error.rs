//! Network-layer error types.

/// Errors that can occur while building a [`RestClient`](crate::RestClient).
///
/// Requests themselves never fail with this type: every request outcome is
/// normalized into an [`Envelope`](crate::Envelope).
#[derive(Debug, thiserror::Error)]
pub enum NetError {
    /// The configured base URL is not an absolute `http(s)` URL.
    #[error("invalid base URL: {0}")]
    InvalidBaseUrl(String),

    /// A configured header value contains characters not allowed in HTTP headers.
    #[error("invalid header value for {name}")]
    InvalidHeader {
        /// Header name.
        name: &'static str,
        /// Underlying parse error.
        #[source]
        source: reqwest::header::InvalidHeaderValue,
    },

    /// The HTTP client could not be constructed.
    #[error("HTTP client error: {0}")]
    Client(#[from] reqwest::Error),
}
