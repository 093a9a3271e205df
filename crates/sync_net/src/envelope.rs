//! The normalized outcome of every remote call.
//!
//! A request never fails at the type level: it resolves to an [`Envelope`]
//! holding exactly one of a [`Reply`] (2xx) or a [`Failure`]. Callers branch
//! on the envelope shape.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Wire key carrying the HTTP status in the merged JSON shape.
pub const STATUS_KEY: &str = "HTTPstatus";

/// Wire key carrying the request URL in the merged JSON shape.
pub const URL_KEY: &str = "url";

/// A parsed HTTP response.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Reply {
    /// HTTP status code.
    pub status: u16,
    /// The URL that was requested.
    pub url: String,
    /// Parsed JSON body.
    pub data: Value,
}

impl Reply {
    /// The body merged with `HTTPstatus` and `url`. Body keys win on conflict.
    /// Non-object bodies are nested under `data`.
    #[must_use]
    pub fn merged(&self) -> Value {
        let mut out = Map::new();
        out.insert(STATUS_KEY.to_string(), Value::from(self.status));
        out.insert(URL_KEY.to_string(), Value::from(self.url.clone()));
        match &self.data {
            Value::Object(fields) => {
                for (key, value) in fields {
                    out.insert(key.clone(), value.clone());
                }
            }
            other => {
                out.insert("data".to_string(), other.clone());
            }
        }
        Value::Object(out)
    }
}

/// Why a remote call did not produce a successful reply.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, thiserror::Error)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Failure {
    /// Network error or unparseable body. The cause is not distinguished further.
    #[error("transport failure: {message}")]
    Transport {
        /// Display form of the underlying error.
        message: String,
    },

    /// The server answered with a non-2xx status.
    #[error("HTTP {} from {}", .0.status, .0.url)]
    Api(Reply),
}

impl Failure {
    /// HTTP status of an API failure; `None` for transport failures.
    #[must_use]
    pub fn status(&self) -> Option<u16> {
        match self {
            Self::Transport { .. } => None,
            Self::Api(reply) => Some(reply.status),
        }
    }

    /// JSON payload as exposed on the `error` branch.
    #[must_use]
    pub fn to_json(&self) -> Value {
        match self {
            Self::Transport { message } => serde_json::json!({ "message": message }),
            Self::Api(reply) => reply.merged(),
        }
    }
}

/// Outcome of a remote call: exactly one of `response` or `error`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Envelope {
    /// 2xx reply.
    Response(Reply),
    /// Transport or API failure.
    Error(Failure),
}

impl Envelope {
    /// Build an envelope from a raw HTTP status and body.
    ///
    /// A body that is not valid JSON yields a transport failure regardless of
    /// status, matching a failed `json()` parse on the response.
    #[must_use]
    pub fn normalize(status: u16, url: &str, body: &[u8]) -> Self {
        let data: Value = match serde_json::from_slice(body) {
            Ok(data) => data,
            Err(err) => return Self::transport(err),
        };
        let reply = Reply {
            status,
            url: url.to_string(),
            data,
        };
        if (200..300).contains(&status) {
            Self::Response(reply)
        } else {
            Self::Error(Failure::Api(reply))
        }
    }

    /// Wrap a transport-level error.
    #[must_use]
    pub fn transport(err: impl std::fmt::Display) -> Self {
        Self::Error(Failure::Transport {
            message: err.to_string(),
        })
    }

    /// Returns the reply if the call succeeded.
    #[must_use]
    pub fn response(&self) -> Option<&Reply> {
        match self {
            Self::Response(reply) => Some(reply),
            Self::Error(_) => None,
        }
    }

    /// Returns the failure if the call did not succeed.
    #[must_use]
    pub fn error(&self) -> Option<&Failure> {
        match self {
            Self::Response(_) => None,
            Self::Error(failure) => Some(failure),
        }
    }

    /// Returns `true` for a 2xx reply.
    #[must_use]
    pub fn is_ok(&self) -> bool {
        matches!(self, Self::Response(_))
    }

    /// Convert into a `Result` for `?`-style handling.
    pub fn into_result(self) -> Result<Reply, Failure> {
        match self {
            Self::Response(reply) => Ok(reply),
            Self::Error(failure) => Err(failure),
        }
    }

    /// The merged wire shape: `{"response": {...}}` or `{"error": {...}}`.
    #[must_use]
    pub fn to_json(&self) -> Value {
        match self {
            Self::Response(reply) => serde_json::json!({ "response": reply.merged() }),
            Self::Error(failure) => serde_json::json!({ "error": failure.to_json() }),
        }
    }
}
