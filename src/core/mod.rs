//! Core types - pure abstractions shared across the codebase.

mod link;
mod state;
mod url;

pub use link::{LinkKind, is_external_link};
pub use state::{
    is_serving, is_shutdown, register_server, set_serving, setup_shutdown_handler,
};
pub use url::{UrlPath, decode};
