//! HTTP errors raised by loaders and handlers.

use serde_json::{Value, json};
use thiserror::Error;

use super::Response;

/// An error carrying the status it should be answered with.
///
/// Return it (wrapped in `anyhow::Error`) from a loader or handler to escape
/// with a specific status. Any other error becomes a `500`.
#[derive(Debug, Clone, Error, PartialEq)]
#[error("{status} {message}")]
pub struct HttpError {
    pub status: u16,
    pub message: String,
    pub data: Option<Value>,
}

impl HttpError {
    pub fn new(status: u16, message: impl Into<String>) -> Self {
        Self {
            status,
            message: message.into(),
            data: None,
        }
    }

    pub fn with_data(mut self, data: Value) -> Self {
        self.data = Some(data);
        self
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        Self::new(404, message)
    }

    /// JSON body `{"error": {"message", "data"}}`.
    pub fn to_response(&self) -> Response {
        let mut error = json!({ "message": self.message });
        if let Some(data) = &self.data {
            error["data"] = data.clone();
        }
        Response::json(&json!({ "error": error }), self.status)
    }
}

/// `400` unless `value` is `Some`.
pub fn invariant<T>(value: Option<T>, message: &str) -> Result<T, HttpError> {
    value.ok_or_else(|| HttpError::new(400, message))
}

/// `422` unless `condition` holds.
pub fn validate(condition: bool, message: &str) -> Result<(), HttpError> {
    if condition {
        Ok(())
    } else {
        Err(HttpError::new(422, message))
    }
}

/// Turn any loader or handler error into a response.
///
/// Details of unexpected errors stay on the server side.
pub fn handle_error(error: &anyhow::Error) -> Response {
    match error.downcast_ref::<HttpError>() {
        Some(http) => http.to_response(),
        None => Response::json(
            &json!({ "error": { "message": "internal server error" } }),
            500,
        ),
    }
}
