//! Client manifest.
//!
//! The client router receives routes as `[id, pathname, score]` triples plus a
//! flat list of loaders, one per populated client slot, in table order and
//! slot order (layout, error, page). A route's flags tell the router how many
//! loaders it owns, so loaders are matched back positionally instead of by
//! name. `fetch` lists the loader indices whose module exports a server loader.

use std::sync::Arc;

use anyhow::Result;
use serde::{Deserialize, Serialize};

use crate::routing::{AppRoute, RouteKind};

/// Route descriptor as the client sees it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClientRoute {
    /// `[id, pathname, score]`.
    pub path: (String, String, i64),
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub layout: Option<u8>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<u8>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub page: Option<u8>,
}

impl ClientRoute {
    fn has(&self, kind: RouteKind) -> bool {
        match kind {
            RouteKind::Layout => self.layout.is_some(),
            RouteKind::Error => self.error.is_some(),
            RouteKind::Page => self.page.is_some(),
            RouteKind::Http => false,
        }
    }
}

/// The virtual manifest module's default export.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClientManifest {
    /// Import specifiers, `/`-rooted and relative to the app directory.
    pub loaders: Vec<String>,
    pub fetch: Vec<usize>,
    pub routes: Vec<ClientRoute>,
}

impl ClientManifest {
    /// Build from routes in table order. `fetch` stays empty until
    /// [`resolve_fetch`](Self::resolve_fetch) runs.
    pub fn new(routes: &[Arc<AppRoute>]) -> Self {
        let mut manifest = Self::default();
        for route in routes.iter().filter(|r| r.client) {
            let flag = |kind| route.has(kind).then_some(1);
            manifest.routes.push(ClientRoute {
                path: (route.id.clone(), route.pathname().to_string(), route.score()),
                layout: flag(RouteKind::Layout),
                error: flag(RouteKind::Error),
                page: flag(RouteKind::Page),
            });
            for kind in route.client_kinds() {
                if let Some(slot) = route.slot(kind) {
                    manifest.loaders.push(format!("/{}", slot.file.relative));
                }
            }
        }
        manifest
    }

    /// Load every client module and record which ones are fetchable.
    ///
    /// `routes` must be the same slice the manifest was built from.
    pub async fn resolve_fetch(&mut self, routes: &[Arc<AppRoute>]) -> Result<()> {
        let mut fetch = Vec::new();
        let slots = routes
            .iter()
            .filter(|r| r.client)
            .flat_map(|r| r.client_kinds().filter_map(|kind| r.slot(kind)).collect::<Vec<_>>());
        for (index, slot) in slots.enumerate() {
            if slot.module.get().await?.is_fetchable() {
                fetch.push(index);
            }
        }
        self.fetch = fetch;
        Ok(())
    }

    /// `(id, pathname, score)` triples in manifest order.
    pub fn triples(&self) -> Vec<(String, String, i64)> {
        self.routes.iter().map(|r| r.path.clone()).collect()
    }

    /// Loader specifiers owned by the route at `index`.
    pub fn loaders_of(&self, index: usize) -> &[String] {
        let owned = |r: &ClientRoute| RouteKind::CLIENT.iter().filter(|&&k| r.has(k)).count();
        let start: usize = self.routes[..index.min(self.routes.len())]
            .iter()
            .map(owned)
            .sum();
        let len = self.routes.get(index).map_or(0, owned);
        &self.loaders[start.min(self.loaders.len())..(start + len).min(self.loaders.len())]
    }

    pub fn to_json(&self) -> String {
        serde_json::to_string_pretty(self).unwrap_or_default()
    }

    /// ES module source: loaders become dynamic imports.
    pub fn to_module(&self) -> String {
        let loaders = self
            .loaders
            .iter()
            .map(|spec| format!("    () => import({})", serde_json::Value::from(spec.as_str())))
            .collect::<Vec<_>>()
            .join(",\n");
        let fetch = serde_json::to_string(&self.fetch).unwrap_or_default();
        let routes = serde_json::to_string_pretty(&self.routes).unwrap_or_default();
        format!("export default {{\n  loaders: [\n{loaders}\n  ],\n  fetch: {fetch},\n  routes: {routes}\n}};\n")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::module::{MemoryModuleLoader, RouteModule};
    use crate::http::Response;
    use crate::routing::{AppRoutes, RouteFile, RouteMatchers};
    use std::path::Path;

    fn table(loader: Arc<MemoryModuleLoader>) -> AppRoutes {
        let mut routes = AppRoutes::new(RouteMatchers::new(), loader);
        let app = Path::new("/app");
        for (rel, kind) in [
            ("layout.html", RouteKind::Layout),
            ("page.html", RouteKind::Page),
            ("blog/[slug]/page.md", RouteKind::Page),
            ("blog/error.html", RouteKind::Error),
            ("blog/layout.html", RouteKind::Layout),
            ("api/http.toml", RouteKind::Http),
        ] {
            routes.add(RouteFile::from_relative(app, rel, kind)).unwrap();
        }
        routes
    }

    #[test]
    fn test_manifest_shape() {
        let routes = table(Arc::new(MemoryModuleLoader::new()));
        let manifest = ClientManifest::new(&routes.snapshot());

        // http-only routes never reach the client
        assert_eq!(manifest.routes.len(), 3);
        assert_eq!(manifest.loaders.len(), 5);
        assert!(!manifest.loaders.iter().any(|l| l.contains("http.toml")));

        let blog = manifest.routes.iter().position(|r| r.path.0 == "/blog").unwrap();
        assert_eq!(
            manifest.loaders_of(blog),
            &["/blog/layout.html".to_string(), "/blog/error.html".to_string()]
        );
    }

    #[test]
    fn test_round_trip_preserves_order() {
        let routes = table(Arc::new(MemoryModuleLoader::new()));
        let snapshot = routes.snapshot();
        let manifest = ClientManifest::new(&snapshot);

        let parsed: ClientManifest = serde_json::from_str(&manifest.to_json()).unwrap();
        let expected: Vec<_> = routes
            .filter_client_routes()
            .iter()
            .map(|r| (r.id.clone(), r.pathname().to_string(), r.score()))
            .collect();
        assert_eq!(parsed.triples(), expected);
        assert_eq!(parsed, manifest);
    }

    #[tokio::test]
    async fn test_resolve_fetch() {
        let loader = Arc::new(MemoryModuleLoader::new());
        for rel in ["layout.html", "page.html", "blog/error.html", "blog/layout.html"] {
            loader.insert(rel, RouteModule::new().with_template(""));
        }
        loader.insert(
            "blog/[slug]/page.md",
            RouteModule::new()
                .with_template("")
                .with_server_loader(|_| async { Ok(Response::new(200)) }),
        );

        let routes = table(loader);
        let snapshot = routes.snapshot();
        let mut manifest = ClientManifest::new(&snapshot);
        manifest.resolve_fetch(&snapshot).await.unwrap();

        assert_eq!(manifest.fetch.len(), 1);
        assert_eq!(manifest.loaders[manifest.fetch[0]], "/blog/[slug]/page.md");
    }

    #[test]
    fn test_to_module() {
        let routes = table(Arc::new(MemoryModuleLoader::new()));
        let module = ClientManifest::new(&routes.snapshot()).to_module();
        assert!(module.starts_with("export default {"));
        assert!(module.contains(r#"() => import("/page.html")"#));
        assert!(module.contains("fetch: []"));
    }
}
