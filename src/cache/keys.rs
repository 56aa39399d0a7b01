//! Page cache keys.

use std::fmt;

use axum::http::Uri;

/// Identifies one rendered page: request path plus normalised query.
///
/// Query pairs are sorted so `?a=1&page=2` and `?page=2&a=1` share an entry.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct PageKey {
    path: String,
    query: String,
}

impl PageKey {
    pub fn new(path: impl Into<String>, query: Option<&str>) -> Self {
        Self {
            path: path.into(),
            query: normalize_query(query.unwrap_or("")),
        }
    }

    pub fn from_uri(uri: &Uri) -> Self {
        Self::new(uri.path(), uri.query())
    }

    pub fn path(&self) -> &str {
        &self.path
    }

    pub fn query(&self) -> &str {
        &self.query
    }
}

impl fmt::Display for PageKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.query.is_empty() {
            f.write_str(&self.path)
        } else {
            write!(f, "{}?{}", self.path, self.query)
        }
    }
}

fn normalize_query(raw: &str) -> String {
    let mut pairs: Vec<(String, String)> = url::form_urlencoded::parse(raw.as_bytes())
        .into_owned()
        .collect();
    pairs.sort();
    url::form_urlencoded::Serializer::new(String::new())
        .extend_pairs(pairs)
        .finish()
}
