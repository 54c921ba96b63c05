//! HTTP surface shared by the dispatcher, loaders and the dev server.

mod error;
mod method;
mod request;
mod response;

pub use error::{HttpError, handle_error, invariant, validate};
pub use method::HttpMethod;
pub use request::{LOCAL_ORIGIN, Request};
pub use response::{
    HTML_CONTENT_TYPE, JSON_CONTENT_TYPE, REDIRECT_STATUSES, Redirect, Response,
    TEXT_CONTENT_TYPE,
};
