//! Compiled route patterns.

use std::collections::BTreeMap;

use regex::Regex;

/// Named parameters captured by a match, decoded and non-empty.
pub type RouteParams = BTreeMap<String, String>;

/// A route string compiled for matching.
#[derive(Debug, Clone)]
pub struct RoutePattern {
    route: String,
    regex: Regex,
    pathname: String,
    score: i64,
    dynamic: bool,
    params: Vec<String>,
}

impl RoutePattern {
    pub(super) fn new(
        route: String,
        regex: Regex,
        pathname: String,
        score: i64,
        dynamic: bool,
        params: Vec<String>,
    ) -> Self {
        Self {
            route,
            regex,
            pathname,
            score,
            dynamic,
            params,
        }
    }

    /// Route string this pattern was compiled from (`/blog/[slug]`).
    #[inline]
    pub fn route(&self) -> &str {
        &self.route
    }

    /// URLPattern-style pathname (`/blog/:slug`).
    #[inline]
    pub fn pathname(&self) -> &str {
        &self.pathname
    }

    #[inline]
    pub fn score(&self) -> i64 {
        self.score
    }

    #[inline]
    pub fn dynamic(&self) -> bool {
        self.dynamic
    }

    /// Parameter names in declaration order.
    pub fn params(&self) -> &[String] {
        &self.params
    }

    /// Source of the compiled regular expression.
    pub fn source(&self) -> &str {
        self.regex.as_str()
    }

    /// Whether `pathname` matches. `pathname` must be decoded and carry no
    /// query string or fragment.
    #[inline]
    pub fn test(&self, pathname: &str) -> bool {
        self.regex.is_match(pathname)
    }

    /// Match `pathname` and collect its parameters.
    pub fn exec(&self, pathname: &str) -> Option<RouteParams> {
        let captures = self.regex.captures(pathname)?;
        Some(
            self.params
                .iter()
                .filter_map(|name| {
                    let value = captures.name(name)?.as_str();
                    (!value.is_empty()).then(|| (name.clone(), value.to_string()))
                })
                .collect(),
        )
    }
}

impl PartialEq for RoutePattern {
    fn eq(&self, other: &Self) -> bool {
        self.route == other.route && self.regex.as_str() == other.regex.as_str()
    }
}

impl Eq for RoutePattern {}
