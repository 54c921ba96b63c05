//! Build adapters: turning [`BuildData`] into deployable output.
//!
//! Every deployment target implements [`BuildAdapter`]. The lifecycle is
//! driven by [`build_app`](crate::build::build_app):
//!
//! ```text
//! start_rendering_pages ──► crawl ──► finish_rendering_pages ──► write ──► close
//! ```
//!
//! Adapters compose by delegation: [`VercelAdapter`] runs a
//! [`StaticAdapter`] into its static directory, then adds routing config
//! and one function per http route.

mod static_site;
mod vercel;

pub use static_site::StaticAdapter;
pub use vercel::VercelAdapter;

use std::path::Path;
use std::sync::Arc;
use std::time::{Duration, Instant};

use anyhow::Result;

use crate::build::log::{log_bad_links, log_routes};
use crate::build::{BuildData, StaticRender};
use crate::config::{AdapterKind, VesselConfig};
use crate::dispatch::{DocumentTables, page_document};
use crate::logger::format_duration;
use crate::manifest::{ClientManifest, ServerManifest};
use crate::utils::fs::{OutputFile, write_files};

/// What every adapter hook receives.
#[derive(Debug, Clone)]
pub struct AdapterContext {
    pub config: VesselConfig,
    pub server: Arc<ServerManifest>,
    pub client: ClientManifest,
    started: Instant,
}

impl AdapterContext {
    pub fn new(
        config: &VesselConfig,
        server: Arc<ServerManifest>,
        client: ClientManifest,
        started: Instant,
    ) -> Self {
        Self {
            config: config.clone(),
            server,
            client,
            started,
        }
    }

    /// Time since the build started.
    pub fn elapsed(&self) -> Duration {
        self.started.elapsed()
    }

    /// Full HTML document for a statically rendered page.
    ///
    /// The site-wide redirect and data-hash tables go into every document so
    /// the client router can resolve them without a round trip.
    pub fn page_html(&self, render: &StaticRender, data: &BuildData) -> String {
        let redirects = data.redirect_table();
        page_document(
            &self.server.document,
            &render.output,
            &render.static_data,
            DocumentTables {
                redirects: Some(&redirects),
                data_hashes: Some(&data.static_data_ids),
                trailing_slash: self.server.trailing_slash,
            },
        )
    }

    /// Write `files` under `out_dir` in parallel.
    pub fn write_files(&self, out_dir: &Path, files: &[OutputFile]) -> Result<usize> {
        write_files(out_dir, files)
    }
}

/// A deployment target.
///
/// `write` must leave the same output for the same [`BuildData`] no matter
/// how often it runs. `close` only reports.
pub trait BuildAdapter: Send {
    /// Log prefix.
    fn name(&self) -> &'static str;

    fn start_rendering_pages(&mut self, ctx: &AdapterContext) {
        crate::debug!(self.name(); "rendering pages from {}", ctx.config.routes.entries.join(", "));
    }

    fn finish_rendering_pages(&mut self, ctx: &AdapterContext, data: &BuildData) {
        crate::debug!(
            self.name();
            "rendered {} pages in {}",
            data.static_renders.len(),
            format_duration(ctx.elapsed())
        );
    }

    fn write(&self, ctx: &AdapterContext, data: &BuildData) -> Result<()>;

    /// Report bad links, the route log and the build time.
    fn close(&self, ctx: &AdapterContext, data: &BuildData) -> Result<()> {
        log_bad_links(data);
        log_routes(data, ctx.config.routes.log, ctx.config.routes.log_level);
        crate::log!(self.name(); "build complete in {}", format_duration(ctx.elapsed()));
        Ok(())
    }
}

/// Adapter for `kind`, writing under the configured output locations.
pub fn create_adapter(kind: AdapterKind, config: &VesselConfig) -> Box<dyn BuildAdapter> {
    match kind {
        AdapterKind::Static => Box::new(StaticAdapter::new(config.build_dir())),
        AdapterKind::Vercel => Box::new(VercelAdapter::new(config.get_root())),
    }
}
