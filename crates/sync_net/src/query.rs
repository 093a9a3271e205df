//! Canonical URL query-string encoding.
//!
//! A [`Query`] is an insertion-ordered mapping of attribute name to
//! [`QueryValue`]. [`encode`] turns it into the query string appended to
//! collection URLs. Entries keep insertion order, so callers that need stable
//! URLs must build the query in a canonical order.

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

/// Attribute mapping sent with list requests.
pub type Query = IndexMap<String, QueryValue>;

/// A single query attribute value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum QueryValue {
    /// Absent value; always omitted.
    Null,
    /// Boolean flag.
    Bool(bool),
    /// Integer value.
    Int(i64),
    /// Floating point value.
    Float(f64),
    /// Free text.
    Text(String),
    /// List of values, joined with `,`.
    List(Vec<QueryValue>),
}

impl QueryValue {
    /// Returns `true` for values that are dropped from the query string:
    /// null, `false`, zero, NaN and the empty string. Lists are never falsy,
    /// even when empty.
    #[must_use]
    pub fn is_falsy(&self) -> bool {
        match self {
            Self::Null => true,
            Self::Bool(b) => !b,
            Self::Int(n) => *n == 0,
            Self::Float(f) => *f == 0.0 || f.is_nan(),
            Self::Text(s) => s.is_empty(),
            Self::List(_) => false,
        }
    }

    /// Plain string form, as used when joining list items.
    fn plain(&self) -> String {
        match self {
            Self::Null => String::new(),
            Self::Bool(b) => b.to_string(),
            Self::Int(n) => n.to_string(),
            Self::Float(f) => f.to_string(),
            Self::Text(s) => s.clone(),
            Self::List(items) => join(items),
        }
    }
}

impl From<&str> for QueryValue {
    fn from(value: &str) -> Self {
        Self::Text(value.to_string())
    }
}

impl From<String> for QueryValue {
    fn from(value: String) -> Self {
        Self::Text(value)
    }
}

impl From<bool> for QueryValue {
    fn from(value: bool) -> Self {
        Self::Bool(value)
    }
}

impl From<i64> for QueryValue {
    fn from(value: i64) -> Self {
        Self::Int(value)
    }
}

impl From<i32> for QueryValue {
    fn from(value: i32) -> Self {
        Self::Int(i64::from(value))
    }
}

impl From<f64> for QueryValue {
    fn from(value: f64) -> Self {
        Self::Float(value)
    }
}

impl<T: Into<QueryValue>> From<Vec<T>> for QueryValue {
    fn from(values: Vec<T>) -> Self {
        Self::List(values.into_iter().map(Into::into).collect())
    }
}

impl<T: Into<QueryValue>> From<Option<T>> for QueryValue {
    fn from(value: Option<T>) -> Self {
        value.map_or(Self::Null, Into::into)
    }
}

/// Encode an attribute mapping into a URL query string.
///
/// - falsy values are omitted entirely (see [`QueryValue::is_falsy`]);
/// - lists are joined with `,` and the joined string is not re-encoded;
/// - scalars have whitespace runs collapsed to one space, then are
///   percent-encoded.
///
/// Entries are joined with `&` in insertion order.
#[must_use]
pub fn encode(attrs: &Query) -> String {
    attrs
        .iter()
        .filter_map(|(key, value)| pair(key, value))
        .collect::<Vec<_>>()
        .join("&")
}

fn pair(key: &str, value: &QueryValue) -> Option<String> {
    if value.is_falsy() {
        return None;
    }
    let rendered = match value {
        QueryValue::List(items) => join(items),
        scalar => clean(&scalar.plain()),
    };
    Some(format!("{key}={rendered}"))
}

fn join(items: &[QueryValue]) -> String {
    items
        .iter()
        .map(QueryValue::plain)
        .collect::<Vec<_>>()
        .join(",")
}

fn clean(raw: &str) -> String {
    let mut collapsed = String::with_capacity(raw.len());
    let mut in_space = false;
    for ch in raw.chars() {
        if ch.is_whitespace() {
            if !in_space {
                collapsed.push(' ');
            }
            in_space = true;
        } else {
            collapsed.push(ch);
            in_space = false;
        }
    }
    urlencoding::encode(&collapsed).into_owned()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn query(entries: Vec<(&str, QueryValue)>) -> Query {
        entries
            .into_iter()
            .map(|(k, v)| (k.to_string(), v))
            .collect()
    }

    #[test]
    fn test_encode_mixed_attrs() {
        let attrs = query(vec![
            ("a", "x y".into()),
            ("b", vec![1, 2].into()),
            ("c", QueryValue::Null),
        ]);
        assert_eq!(encode(&attrs), "a=x%20y&b=1,2");
    }

    #[test]
    fn test_encode_empty_query() {
        assert_eq!(encode(&Query::new()), "");
    }

    #[test]
    fn test_falsy_values_omitted() {
        let attrs = query(vec![
            ("flag", false.into()),
            ("count", 0.into()),
            ("name", "".into()),
            ("search", "kept".into()),
        ]);
        assert_eq!(encode(&attrs), "search=kept");
    }

    #[test]
    fn test_empty_list_is_kept() {
        let attrs = query(vec![("status", QueryValue::List(Vec::new()))]);
        assert_eq!(encode(&attrs), "status=");
    }

    #[test]
    fn test_whitespace_runs_collapse() {
        let attrs = query(vec![("search", "  two\t\nwords ".into())]);
        assert_eq!(encode(&attrs), "search=%20two%20words%20");
    }

    #[test]
    fn test_list_items_not_reencoded() {
        let attrs = query(vec![("tags", vec!["a b", "c&d"].into())]);
        assert_eq!(encode(&attrs), "tags=a b,c&d");
    }

    #[test]
    fn test_insertion_order_preserved() {
        let attrs = query(vec![("z", 1.into()), ("a", 2.into()), ("m", true.into())]);
        assert_eq!(encode(&attrs), "z=1&a=2&m=true");
    }

    #[test]
    fn test_query_from_json() {
        let attrs: Query =
            serde_json::from_str(r#"{"year": 2018, "status": [1, 3], "q": null}"#).unwrap();
        assert_eq!(attrs["year"], QueryValue::Int(2018));
        assert_eq!(encode(&attrs), "year=2018&status=1,3");
    }
}
