//! Responses produced by the dispatcher, loaders and handlers.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::{HttpError, HttpMethod};

/// Status codes accepted for redirects.
pub const REDIRECT_STATUSES: [u16; 5] = [301, 302, 303, 307, 308];

pub const JSON_CONTENT_TYPE: &str = "application/json; charset=utf-8";
pub const HTML_CONTENT_TYPE: &str = "text/html; charset=utf-8";
pub const TEXT_CONTENT_TYPE: &str = "text/plain; charset=utf-8";

/// Redirect declared by a loader.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Redirect {
    pub path: String,
    #[serde(default = "default_redirect_status")]
    pub status: u16,
}

const fn default_redirect_status() -> u16 {
    302
}

impl Redirect {
    /// Redirect to `path` with `status`, rejecting non-redirect statuses.
    pub fn new(path: impl Into<String>, status: u16) -> Result<Self, HttpError> {
        if !REDIRECT_STATUSES.contains(&status) {
            return Err(HttpError::new(
                500,
                format!("invalid redirect status {status}"),
            ));
        }
        Ok(Self {
            path: path.into(),
            status,
        })
    }

    /// `302 Found` redirect.
    pub fn found(path: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            status: default_redirect_status(),
        }
    }
}

/// An HTTP response.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Response {
    pub status: u16,
    pub headers: Vec<(String, String)>,
    pub body: Vec<u8>,
}

impl Response {
    pub fn new(status: u16) -> Self {
        Self {
            status,
            headers: Vec::new(),
            body: Vec::new(),
        }
    }

    /// `application/json` response.
    pub fn json(value: &Value, status: u16) -> Self {
        Self::new(status)
            .with_header("Content-Type", JSON_CONTENT_TYPE)
            .with_body(value.to_string())
    }

    pub fn html(body: impl Into<Vec<u8>>, status: u16) -> Self {
        Self::new(status)
            .with_header("Content-Type", HTML_CONTENT_TYPE)
            .with_body(body)
    }

    pub fn text(body: impl Into<Vec<u8>>, status: u16) -> Self {
        Self::new(status)
            .with_header("Content-Type", TEXT_CONTENT_TYPE)
            .with_body(body)
    }

    pub fn redirect(redirect: &Redirect) -> Self {
        Self::new(redirect.status).with_header("Location", &redirect.path)
    }

    pub fn not_found() -> Self {
        Self::text("404 not found", 404)
    }

    /// `405` listing the methods the route does support.
    pub fn method_not_allowed(allowed: &[HttpMethod]) -> Self {
        let allow = allowed
            .iter()
            .map(|m| m.as_str())
            .collect::<Vec<_>>()
            .join(", ");
        Self::text("405 method not allowed", 405).with_header("Allow", &allow)
    }

    /// Set a header, replacing any existing value with the same name.
    pub fn with_header(mut self, name: &str, value: &str) -> Self {
        self.headers.retain(|(n, _)| !n.eq_ignore_ascii_case(name));
        self.headers.push((name.to_string(), value.to_string()));
        self
    }

    pub fn with_body(mut self, body: impl Into<Vec<u8>>) -> Self {
        self.body = body.into();
        self
    }

    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(n, _)| n.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    pub fn is_redirect(&self) -> bool {
        REDIRECT_STATUSES.contains(&self.status)
    }

    pub fn text_body(&self) -> String {
        String::from_utf8_lossy(&self.body).into_owned()
    }
}
