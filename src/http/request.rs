//! Incoming requests as seen by loaders and handlers.

use std::collections::BTreeMap;

use anyhow::{Context, Result};
use serde::de::DeserializeOwned;
use url::Url;

use super::HttpMethod;
use crate::routing::RouteParams;

/// Origin used when a request only carries a path.
pub const LOCAL_ORIGIN: &str = "http://localhost";

/// An HTTP request.
#[derive(Debug, Clone)]
pub struct Request {
    pub method: HttpMethod,
    pub url: Url,
    /// Header names are stored lowercased.
    pub headers: BTreeMap<String, String>,
    /// Route parameters, filled in once the request is matched.
    pub params: RouteParams,
    pub body: Vec<u8>,
}

impl Request {
    pub fn new(method: HttpMethod, url: Url) -> Self {
        Self {
            method,
            url,
            headers: BTreeMap::new(),
            params: RouteParams::new(),
            body: Vec::new(),
        }
    }

    /// Build a request from a path (with optional query), resolved against
    /// [`LOCAL_ORIGIN`].
    pub fn from_path(method: HttpMethod, path: &str) -> Result<Self> {
        let url = Url::parse(LOCAL_ORIGIN)
            .and_then(|base| base.join(path))
            .with_context(|| format!("invalid request path `{path}`"))?;
        Ok(Self::new(method, url))
    }

    pub fn get(path: &str) -> Result<Self> {
        Self::from_path(HttpMethod::Get, path)
    }

    pub fn with_header(mut self, name: &str, value: &str) -> Self {
        self.headers.insert(name.to_ascii_lowercase(), value.to_string());
        self
    }

    pub fn with_body(mut self, body: impl Into<Vec<u8>>) -> Self {
        self.body = body.into();
        self
    }

    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .get(&name.to_ascii_lowercase())
            .map(String::as_str)
    }

    /// Whether the `Accept` header lists `mime` (or has no preference).
    pub fn accepts(&self, mime: &str) -> bool {
        self.header("accept").is_none_or(|accept| {
            accept
                .split(',')
                .map(|part| part.split(';').next().unwrap_or("").trim())
                .any(|part| part == mime || part == "*/*")
        })
    }

    /// Percent-encoded pathname.
    #[inline]
    pub fn pathname(&self) -> &str {
        self.url.path()
    }

    pub fn query(&self, key: &str) -> Option<String> {
        self.url
            .query_pairs()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.into_owned())
    }

    /// Deserialize the body as JSON.
    pub fn json<T: DeserializeOwned>(&self) -> Result<T> {
        serde_json::from_slice(&self.body).context("request body is not valid JSON")
    }

    pub fn text(&self) -> String {
        String::from_utf8_lossy(&self.body).into_owned()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_path() {
        let req = Request::get("/blog/post?page=2#top").unwrap();
        assert_eq!(req.pathname(), "/blog/post");
        assert_eq!(req.query("page").as_deref(), Some("2"));
        assert_eq!(req.method, HttpMethod::Get);
    }

    #[test]
    fn test_headers_are_case_insensitive() {
        let req = Request::get("/").unwrap().with_header("Content-Type", "text/plain");
        assert_eq!(req.header("content-type"), Some("text/plain"));
        assert_eq!(req.header("CONTENT-TYPE"), Some("text/plain"));
    }

    #[test]
    fn test_accepts() {
        let req = Request::get("/").unwrap();
        assert!(req.accepts("text/html"));

        let req = req.with_header("accept", "application/json, text/plain;q=0.9");
        assert!(req.accepts("application/json"));
        assert!(req.accepts("text/plain"));
        assert!(!req.accepts("text/html"));
    }

    #[test]
    fn test_json_body() {
        let req = Request::from_path(HttpMethod::Post, "/api")
            .unwrap()
            .with_body(r#"{"a":1}"#);
        let value: serde_json::Value = req.json().unwrap();
        assert_eq!(value["a"], 1);
    }
}
