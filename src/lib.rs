//! Vessel - file-system routing, static builds and deployment adapters for
//! multi-framework web apps.
//!
//! ```text
//! app/ ──scan──► AppRoutes ──► ServerManifest ──► Dispatcher ◄── dev server
//!                    │                                 │
//!                    └──────► ClientManifest           └──► crawl ──► BuildAdapter
//! ```

pub mod adapter;
pub mod build;
pub mod cli;
pub mod config;
pub mod core;
pub mod dispatch;
pub mod generator;
pub mod http;
pub mod logger;
pub mod manifest;
pub mod module;
pub mod render;
pub mod routing;
pub mod utils;
