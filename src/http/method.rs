//! HTTP methods recognised as module exports.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// HTTP request method.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum HttpMethod {
    Get,
    Head,
    Post,
    Put,
    Patch,
    Delete,
    Options,
}

impl HttpMethod {
    pub const ALL: [Self; 7] = [
        Self::Get,
        Self::Head,
        Self::Post,
        Self::Put,
        Self::Patch,
        Self::Delete,
        Self::Options,
    ];

    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Get => "GET",
            Self::Head => "HEAD",
            Self::Post => "POST",
            Self::Put => "PUT",
            Self::Patch => "PATCH",
            Self::Delete => "DELETE",
            Self::Options => "OPTIONS",
        }
    }

    /// Method named by a module export, if the export is one.
    ///
    /// Exports must be spelled exactly in upper case (`GET`, not `get`).
    pub fn from_export(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|m| m.as_str() == name)
    }

    /// Methods exported by a module, sorted and deduplicated.
    pub fn from_exports<'a>(exports: impl IntoIterator<Item = &'a str>) -> Vec<Self> {
        let mut methods: Vec<_> = exports.into_iter().filter_map(Self::from_export).collect();
        methods.sort_unstable();
        methods.dedup();
        methods
    }
}

impl fmt::Display for HttpMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for HttpMethod {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let upper = s.to_ascii_uppercase();
        Self::from_export(&upper).ok_or_else(|| format!("unsupported http method `{s}`"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_export() {
        assert_eq!(HttpMethod::from_export("GET"), Some(HttpMethod::Get));
        assert_eq!(HttpMethod::from_export("get"), None);
        assert_eq!(HttpMethod::from_export("staticLoader"), None);
    }

    #[test]
    fn test_from_exports_filters_and_sorts() {
        let methods = HttpMethod::from_exports(["POST", "default", "GET", "POST", "EDGE"]);
        assert_eq!(methods, vec![HttpMethod::Get, HttpMethod::Post]);
    }

    #[test]
    fn test_from_str() {
        assert_eq!("delete".parse::<HttpMethod>(), Ok(HttpMethod::Delete));
        assert!("TRACE".parse::<HttpMethod>().is_err());
    }
}
