//! File-system routing.
//!
//! - [`file`]: route files and their roles
//! - [`matcher`]: route template grammar, matchers and scoring
//! - [`pattern`]: compiled patterns used at match time
//! - [`table`]: the live, score-ordered route table
//! - [`scan`]: discovering route files on disk

pub mod file;
pub mod matcher;
pub mod pattern;
pub mod scan;
pub mod table;

pub use file::{RouteFile, RouteKind};
pub use matcher::{RouteMatcher, RouteMatchers, compile};
pub use pattern::{RouteParams, RoutePattern};
pub use scan::RouteGlobs;
pub use table::{AppRoute, AppRoutes, ListenerId, RouteEvent, RouteSlot, branch};

use thiserror::Error;

/// Errors raised while compiling routes or mutating the route table.
///
/// These are configuration errors: a missing page is never a `RouteError`.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum RouteError {
    #[error("unknown route matcher `{matcher}` in `{route}`")]
    UnknownMatcher { matcher: String, route: String },

    #[error("invalid route segment `{segment}` in `{route}`")]
    InvalidSegment { segment: String, route: String },

    #[error("invalid parameter name `{name}` in `{route}`")]
    InvalidParam { name: String, route: String },

    #[error("invalid pattern for route matcher `{name}`: {message}")]
    InvalidMatcher { name: String, message: String },

    #[error("route `{route}` does not compile: {message}")]
    Pattern { route: String, message: String },

    #[error("route `{route}` already has a {kind} file: {existing} (ignoring {incoming})")]
    DuplicateSlot {
        route: String,
        kind: RouteKind,
        existing: String,
        incoming: String,
    },
}
