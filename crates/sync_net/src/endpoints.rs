//! REST endpoint layout.
//!
//! Every resource lives under a base URL (default `/api`). Collection and
//! entity URLs always end with a trailing slash, as the backend expects.

use crate::query::{Query, encode};

// ── Auth endpoints ──────────────────────────────────────────────────────────

/// Session login. `POST`.
pub const AUTH_LOGIN: &str = "rest-auth/login/";

/// Session logout. `POST`.
pub const AUTH_LOGOUT: &str = "rest-auth/logout/";

/// Current user. `GET`.
pub const AUTH_USER: &str = "rest-auth/user/";

// ── Resource URL builders ───────────────────────────────────────────────────

/// Join a path onto the base URL.
///
/// `{base}/{path}`
#[must_use]
pub fn join(base: &str, path: &str) -> String {
    format!("{}/{}", base.trim_end_matches('/'), path.trim_start_matches('/'))
}

/// Build the URL of a collection.
///
/// `{base}/{collection}/`
#[must_use]
pub fn collection_url(base: &str, collection: &str) -> String {
    join(base, &format!("{collection}/"))
}

/// Build the URL of a collection query. The `?` suffix is omitted when the
/// encoded query is empty.
///
/// `{base}/{collection}/?{query}`
#[must_use]
pub fn query_url(base: &str, collection: &str, attrs: &Query) -> String {
    let url = collection_url(base, collection);
    let query = encode(attrs);
    if query.is_empty() {
        url
    } else {
        format!("{url}?{query}")
    }
}

/// Build the URL of a single entity.
///
/// `{base}/{collection}/{id}/`
#[must_use]
pub fn entity_url(base: &str, collection: &str, id: u64) -> String {
    join(base, &format!("{collection}/{id}/"))
}
