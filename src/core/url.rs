//! URL paths.
//!
//! - Internal representation: always decoded (human-readable)
//! - Browser boundary: decode on input, encode on output
//!
//! Route patterns match decoded pathnames, so every path entering the
//! dispatcher or the crawler goes through [`UrlPath`] first.

use std::borrow::Borrow;
use std::sync::{Arc, LazyLock};

use percent_encoding::{AsciiSet, CONTROLS, percent_decode_str, utf8_percent_encode};
use serde::{Deserialize, Serialize};
use url::Url;

/// Characters escaped when a decoded path goes back to the browser.
const PATH_SEGMENT: &AsciiSet = &CONTROLS
    .add(b' ')
    .add(b'"')
    .add(b'#')
    .add(b'%')
    .add(b'<')
    .add(b'>')
    .add(b'?')
    .add(b'`')
    .add(b'{')
    .add(b'}');

static BASE: LazyLock<Url> = LazyLock::new(|| Url::parse("http://x").unwrap());

/// Decoded URL pathname.
///
/// Invariants:
/// - Always decoded (no percent-encoding)
/// - Always starts with `/`
/// - Never carries a query string or fragment
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct UrlPath(Arc<str>);

impl UrlPath {
    /// Create from a browser URL or link target (decode percent-encoding,
    /// strip query string and fragment). Relative paths resolve against `/`.
    pub fn from_browser(encoded: &str) -> Self {
        let path = match BASE.join(encoded.trim()) {
            Ok(parsed) => parsed.path().to_string(),
            Err(_) => encoded.split(['?', '#']).next().unwrap_or(encoded).to_string(),
        };
        Self::from_decoded(&decode(&path))
    }

    /// Create from an already decoded path. Adds a leading slash if missing.
    pub fn from_decoded(decoded: &str) -> Self {
        let trimmed = decoded.trim();
        if trimmed.is_empty() {
            return Self(Arc::from("/"));
        }
        if trimmed.starts_with('/') {
            Self(Arc::from(trimmed))
        } else {
            Self(Arc::from(format!("/{trimmed}")))
        }
    }

    /// Resolve a file-relative link against the page at `self`.
    pub fn join(&self, link: &str) -> Option<Self> {
        let base = BASE.join(&self.to_encoded()).ok()?;
        let joined = base.join(link).ok()?;
        Some(Self::from_decoded(&decode(joined.path())))
    }

    #[inline]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Encode for the browser.
    pub fn to_encoded(&self) -> String {
        utf8_percent_encode(&self.0, PATH_SEGMENT).to_string()
    }

    /// Whether the last segment looks like a file (`/feed.xml`).
    pub fn is_file(&self) -> bool {
        self.0
            .rsplit('/')
            .next()
            .is_some_and(|last| last.contains('.'))
    }

    /// Apply the trailing-slash policy and strip `index.html`.
    ///
    /// `/a/index.html` and `/a.html` become `/a/` (or `/a` without trailing
    /// slashes). Other file paths are left alone.
    pub fn normalize(&self, trailing_slash: bool) -> Self {
        self.normalize_with(trailing_slash, true)
    }

    /// [`normalize`](Self::normalize) for a path known to address a page:
    /// a dot in the last segment is part of the page name (`/v/1.2/`).
    pub fn normalize_page(&self, trailing_slash: bool) -> Self {
        self.normalize_with(trailing_slash, false)
    }

    fn normalize_with(&self, trailing_slash: bool, keep_files: bool) -> Self {
        let path = self.as_str();
        let stem = if let Some(stem) = path.strip_suffix("/index.html") {
            stem
        } else if let Some(stem) = path.strip_suffix(".html") {
            stem
        } else if keep_files && self.is_file() {
            return self.clone();
        } else {
            path.trim_end_matches('/')
        };

        if stem.is_empty() {
            Self(Arc::from("/"))
        } else if trailing_slash {
            Self(Arc::from(format!("{stem}/")))
        } else {
            Self(Arc::from(stem))
        }
    }

    /// Output file for this page, relative to the output directory.
    ///
    /// `/` -> `index.html`, `/a/` -> `a/index.html`, `/a` -> `a.html`.
    pub fn to_output_filename(&self) -> String {
        let path = self.0.trim_start_matches('/');
        if path.is_empty() {
            "index.html".to_string()
        } else if self.is_file() {
            path.to_string()
        } else if path.ends_with('/') {
            format!("{path}index.html")
        } else {
            format!("{path}.html")
        }
    }

    /// Output file for a page whose last segment is a page name even when it
    /// contains a dot: `/v/1.2` -> `v/1.2.html`.
    pub fn to_page_filename(&self) -> String {
        let path = self.0.trim_start_matches('/');
        if path.is_empty() {
            "index.html".to_string()
        } else if path.ends_with('/') {
            format!("{path}index.html")
        } else {
            format!("{path}.html")
        }
    }

    /// Get parent URL path.
    ///
    /// `/posts/hello/` -> `/posts/`, `/posts/` -> `/`, `/` -> `None`
    pub fn parent(&self) -> Option<Self> {
        let trimmed = self.0.trim_end_matches('/');
        if trimmed.is_empty() {
            return None;
        }
        match trimmed.rfind('/') {
            Some(0) | None => Some(Self(Arc::from("/"))),
            Some(idx) => Some(Self(Arc::from(format!("{}/", &trimmed[..idx])))),
        }
    }
}

/// Percent-decode `path`, keeping it as-is when it is not valid UTF-8.
pub fn decode(path: &str) -> String {
    percent_decode_str(path)
        .decode_utf8()
        .map(|s| s.into_owned())
        .unwrap_or_else(|_| path.to_string())
}

impl std::fmt::Display for UrlPath {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl Default for UrlPath {
    fn default() -> Self {
        Self(Arc::from("/"))
    }
}

impl AsRef<str> for UrlPath {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl Borrow<str> for UrlPath {
    fn borrow(&self) -> &str {
        &self.0
    }
}

impl From<&str> for UrlPath {
    fn from(s: &str) -> Self {
        Self::from_decoded(s)
    }
}

impl PartialEq<&str> for UrlPath {
    fn eq(&self, other: &&str) -> bool {
        self.0.as_ref() == *other
    }
}

impl Serialize for UrlPath {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        self.0.serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for UrlPath {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        Ok(Self::from_decoded(&s))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_browser_decodes() {
        assert_eq!(UrlPath::from_browser("/posts/%E4%B8%AD%E6%96%87/").as_str(), "/posts/中文/");
        assert_eq!(UrlPath::from_browser("/posts/hello%20world").as_str(), "/posts/hello world");
        assert_eq!(UrlPath::from_browser("/posts/%FF/").as_str(), "/posts/%FF/");
    }

    #[test]
    fn test_from_browser_strips_query_and_fragment() {
        assert_eq!(UrlPath::from_browser("/posts/hello?v=1#top").as_str(), "/posts/hello");
        assert_eq!(UrlPath::from_browser("?v=1").as_str(), "/");
        assert_eq!(UrlPath::from_browser("").as_str(), "/");
    }

    #[test]
    fn test_join() {
        let page = UrlPath::from_decoded("/blog/post/");
        assert_eq!(page.join("../about/").unwrap().as_str(), "/blog/about/");
        assert_eq!(page.join("next").unwrap().as_str(), "/blog/post/next");

        let page = UrlPath::from_decoded("/blog/post");
        assert_eq!(page.join("next").unwrap().as_str(), "/blog/next");
    }

    #[test]
    fn test_normalize_trailing_slash() {
        let n = |p: &str| UrlPath::from_decoded(p).normalize(true);
        assert_eq!(n("/").as_str(), "/");
        assert_eq!(n("/index.html").as_str(), "/");
        assert_eq!(n("/about").as_str(), "/about/");
        assert_eq!(n("/about/index.html").as_str(), "/about/");
        assert_eq!(n("/about.html").as_str(), "/about/");
        assert_eq!(n("/feed.xml").as_str(), "/feed.xml");
    }

    #[test]
    fn test_normalize_no_trailing_slash() {
        let n = |p: &str| UrlPath::from_decoded(p).normalize(false);
        assert_eq!(n("/").as_str(), "/");
        assert_eq!(n("/about/").as_str(), "/about");
        assert_eq!(n("/about/index.html").as_str(), "/about");
    }

    #[test]
    fn test_output_filename() {
        let f = |p: &str| UrlPath::from_decoded(p).to_output_filename();
        assert_eq!(f("/"), "index.html");
        assert_eq!(f("/about/"), "about/index.html");
        assert_eq!(f("/about"), "about.html");
        assert_eq!(f("/feed.xml"), "feed.xml");
    }

    #[test]
    fn test_page_with_dot() {
        let path = UrlPath::from_decoded("/x/v1.2");
        assert_eq!(path.normalize(true).as_str(), "/x/v1.2");
        assert_eq!(path.normalize_page(true).as_str(), "/x/v1.2/");
        assert_eq!(path.normalize_page(false).as_str(), "/x/v1.2");
        assert_eq!(UrlPath::from_decoded("/x/v1.2.html").normalize_page(true).as_str(), "/x/v1.2/");
        assert_eq!(path.to_output_filename(), "x/v1.2");
        assert_eq!(path.to_page_filename(), "x/v1.2.html");
        assert_eq!(UrlPath::from_decoded("/x/v1.2/").to_page_filename(), "x/v1.2/index.html");
        assert_eq!(UrlPath::default().to_page_filename(), "index.html");
    }

    #[test]
    fn test_to_encoded() {
        assert_eq!(UrlPath::from_decoded("/posts/中文/").to_encoded(), "/posts/%E4%B8%AD%E6%96%87/");
        assert_eq!(UrlPath::from_decoded("/a b").to_encoded(), "/a%20b");
    }

    #[test]
    fn test_parent() {
        assert_eq!(
            UrlPath::from_decoded("/posts/hello/").parent(),
            Some(UrlPath::from_decoded("/posts/"))
        );
        assert_eq!(UrlPath::from_decoded("/posts/").parent(), Some(UrlPath::default()));
        assert_eq!(UrlPath::default().parent(), None);
    }

    #[test]
    fn test_hash_identity() {
        use rustc_hash::FxHashSet;

        let mut set = FxHashSet::default();
        set.insert(UrlPath::from_browser("/posts/hello/?a=1"));
        set.insert(UrlPath::from_browser("/posts/hello/?a=2"));
        assert_eq!(set.len(), 1);
    }
}
