//! Command-line interface module.

mod args;
pub mod build;
pub mod routes;
pub mod serve;

pub use args::{BuildArgs, Cli, Commands, RoutesStyle};
