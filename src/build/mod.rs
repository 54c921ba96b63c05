//! Static build orchestration.
//!
//! A build snapshots the route table into manifests, crawls every reachable
//! page from the configured entries, and hands the collected [`BuildData`] to
//! a [`BuildAdapter`] that writes the deployable output.
//!
//! ```text
//! AppRoutes ──► ClientManifest + ServerManifest ──► Dispatcher
//!                                                      │
//!                          entries ──► crawl ◄─────────┘
//!                                        │
//!                                        ▼
//!                                    BuildData ──► adapter.write / close
//! ```

mod crawl;
mod links;
pub mod log;

pub use crawl::crawl;
pub use links::{extract_links, resolve_link};

use std::collections::{BTreeMap, BTreeSet};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Instant;

use anyhow::{Context, Result};

use crate::adapter::{AdapterContext, BuildAdapter};
use crate::config::VesselConfig;
use crate::core::UrlPath;
use crate::dispatch::{Dispatcher, StaticDataEntry};
use crate::http::Redirect;
use crate::manifest::{
    ClientManifest, DocumentManifest, ServerManifest, hash_asset_id, static_data_filename,
};
use crate::render::{RenderOutput, Renderer, escape_html, read_document_template};
use crate::routing::{AppRoute, AppRoutes};
use crate::utils::hash::fingerprint;

/// Crawl settings.
#[derive(Debug, Clone)]
pub struct BuildOptions {
    /// Pathnames the crawl starts from.
    pub entries: Vec<String>,
    /// Pages rendered at once.
    pub concurrency: usize,
    pub trailing_slash: bool,
    /// Links resolving to a file in here are assets, not pages.
    pub public_dir: Option<PathBuf>,
}

impl Default for BuildOptions {
    fn default() -> Self {
        Self {
            entries: vec!["/".into()],
            concurrency: 4,
            trailing_slash: true,
            public_dir: None,
        }
    }
}

impl BuildOptions {
    pub fn from_config(config: &VesselConfig) -> Self {
        Self {
            entries: config.routes.entries.clone(),
            concurrency: config.build.concurrency.max(1),
            trailing_slash: config.routes.trailing_slash,
            public_dir: Some(config.public_dir().to_path_buf()),
        }
    }
}

// ============================================================================
// Build data
// ============================================================================

/// A page rendered at build time.
#[derive(Debug, Clone)]
pub struct StaticRender {
    /// Output path relative to the output directory.
    pub filename: String,
    pub route_id: String,
    pub pathname: UrlPath,
    pub output: RenderOutput,
    /// Loader payloads embedded into the page.
    pub static_data: Vec<StaticDataEntry>,
}

impl StaticRender {
    pub fn data_asset_ids(&self) -> impl Iterator<Item = &str> {
        self.static_data.iter().map(|entry| entry.asset_id.as_str())
    }
}

/// A loader-declared redirect, written as an HTML stub.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StaticRedirect {
    pub from: String,
    pub to: String,
    pub status: u16,
    pub filename: String,
    pub html: String,
}

/// A crawled link that no page answers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BadLink {
    pub pathname: String,
    pub reason: String,
    /// Route of the page the link was found on. `None` for entries.
    pub referrer: Option<String>,
}

/// One deduplicated static data file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StaticDataFile {
    pub content_hash: String,
    pub filename: String,
    pub serialized: String,
}

/// Everything a crawl produced. Maps are ordered so output is deterministic.
#[derive(Debug, Clone, Default)]
pub struct BuildData {
    /// Statically rendered pathname to route id.
    pub links: BTreeMap<String, String>,
    pub static_renders: BTreeMap<String, StaticRender>,
    pub static_redirects: BTreeMap<String, StaticRedirect>,
    pub bad_links: BTreeMap<String, BadLink>,
    /// Content hash to data file.
    pub static_data: BTreeMap<String, StaticDataFile>,
    /// Asset id hash to content hash.
    pub static_data_ids: BTreeMap<String, String>,
    /// Route id to pathname pattern of pages rendered per request.
    pub server_pages: BTreeMap<String, String>,
    /// Route id to pathname pattern of http routes.
    pub server_endpoints: BTreeMap<String, String>,
    /// Route ids of http routes deployed to an edge runtime.
    pub edge_routes: BTreeSet<String>,
}

impl BuildData {
    /// Record a payload, sharing the file with identical content.
    pub fn insert_static_data(&mut self, entry: &StaticDataEntry) -> Result<()> {
        let serialized = serde_json::to_string(&entry.data)
            .with_context(|| format!("failed to serialize static data `{}`", entry.asset_id))?;
        let content_hash = fingerprint(&serialized);
        self.static_data_ids
            .insert(hash_asset_id(&entry.asset_id), content_hash.clone());
        self.static_data
            .entry(content_hash.clone())
            .or_insert_with(|| StaticDataFile {
                filename: static_data_filename(&content_hash),
                content_hash,
                serialized,
            });
        Ok(())
    }

    /// Record a static redirect from the page at `from`, stored as `filename`.
    pub fn insert_redirect(&mut self, from: &UrlPath, filename: String, redirect: &Redirect) {
        self.static_redirects.insert(
            from.as_str().to_string(),
            StaticRedirect {
                from: from.as_str().to_string(),
                to: redirect.path.clone(),
                status: redirect.status,
                filename,
                html: redirect_html(&redirect.path),
            },
        );
    }

    /// Pathname to redirect, as embedded in documents.
    pub fn redirect_table(&self) -> BTreeMap<String, Redirect> {
        self.static_redirects
            .values()
            .map(|r| {
                (
                    r.from.clone(),
                    Redirect {
                        path: r.to.clone(),
                        status: r.status,
                    },
                )
            })
            .collect()
    }

    pub fn is_empty(&self) -> bool {
        self.static_renders.is_empty()
            && self.static_redirects.is_empty()
            && self.server_pages.is_empty()
            && self.server_endpoints.is_empty()
    }
}

/// Meta-refresh page sent to clients and crawlers that hit a static redirect.
pub fn redirect_html(to: &str) -> String {
    let to = escape_html(to);
    format!(
        "<!DOCTYPE html>\n<html>\n  <head>\n    <meta http-equiv=\"refresh\" content=\"0;url={to}\" />\n    <link rel=\"canonical\" href=\"{to}\" />\n  </head>\n  <body>\n    <p>Redirecting to <a href=\"{to}\">{to}</a></p>\n  </body>\n</html>\n"
    )
}

// ============================================================================
// Orchestration
// ============================================================================

/// Server and client manifests for a route snapshot.
///
/// `dev` defers http method resolution to request time.
pub async fn build_manifests(
    config: &VesselConfig,
    snapshot: Vec<Arc<AppRoute>>,
    dev: bool,
) -> Result<(ServerManifest, ClientManifest)> {
    let mut client = ClientManifest::new(&snapshot);
    client.resolve_fetch(&snapshot).await?;

    let document = DocumentManifest {
        entry: config.build.client_entry.clone(),
        template: read_document_template(config.app.template.as_deref())?,
        stylesheet: config.build.stylesheet.clone(),
    };
    let server = ServerManifest::build(snapshot, document, dev)
        .await?
        .with_base_url(config.app.base_path())
        .with_trailing_slash(config.routes.trailing_slash);
    Ok((server, client))
}

/// Snapshot `routes`, crawl, then run the adapter lifecycle.
pub async fn build_app(
    config: &VesselConfig,
    routes: &AppRoutes,
    renderer: Arc<dyn Renderer>,
    adapter: &mut dyn BuildAdapter,
) -> Result<BuildData> {
    let started = Instant::now();
    let (server, client) = build_manifests(config, routes.snapshot(), false).await?;
    let dispatcher = Arc::new(Dispatcher::new(Arc::new(server), renderer));

    let ctx = AdapterContext::new(config, dispatcher.manifest().clone(), client, started);
    adapter.start_rendering_pages(&ctx);
    let data = crawl(dispatcher, &BuildOptions::from_config(config)).await?;
    adapter.finish_rendering_pages(&ctx, &data);

    adapter.write(&ctx, &data)?;
    adapter.close(&ctx, &data)?;
    Ok(data)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_static_data_dedup() {
        let mut data = BuildData::default();
        for id in ["/a~page~/a/", "/b~page~/b/"] {
            data.insert_static_data(&StaticDataEntry {
                asset_id: id.into(),
                data: json!({"title": "same"}),
            })
            .unwrap();
        }
        assert_eq!(data.static_data.len(), 1);
        assert_eq!(data.static_data_ids.len(), 2);

        let file = data.static_data.values().next().unwrap();
        assert_eq!(file.serialized, r#"{"title":"same"}"#);
        assert_eq!(file.filename, format!("_immutable/data/{}.json", file.content_hash));
        assert!(data.static_data_ids.values().all(|h| *h == file.content_hash));
    }

    #[test]
    fn test_insert_redirect() {
        let mut data = BuildData::default();
        let from = UrlPath::from_decoded("/old/");
        data.insert_redirect(&from, from.to_page_filename(), &Redirect::new("/new/", 301).unwrap());

        let redirect = &data.static_redirects["/old/"];
        assert_eq!(redirect.to, "/new/");
        assert_eq!(redirect.status, 301);
        assert_eq!(redirect.filename, "old/index.html");
        assert!(redirect.html.contains(r#"content="0;url=/new/""#));
        assert_eq!(data.redirect_table()["/old/"].status, 301);
    }
}
