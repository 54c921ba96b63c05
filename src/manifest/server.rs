//! Server manifest: the route snapshot plus what the dispatcher needs to
//! answer requests without consulting the live table.

use std::sync::Arc;

use anyhow::Result;

use super::StaticDataManifest;
use crate::core::UrlPath;
use crate::http::HttpMethod;
use crate::routing::{AppRoute, RouteKind, RouteParams, branch};

/// Document settings shared by every rendered page.
#[derive(Debug, Clone, Default)]
pub struct DocumentManifest {
    /// Client entry module, `/`-rooted.
    pub entry: String,
    /// HTML template with the `<!--@vessel/...-->` placeholders.
    pub template: String,
    pub stylesheet: Option<String>,
}

/// An http route and the methods it answers.
#[derive(Debug, Clone)]
pub struct ServerHttpRoute {
    pub route: Arc<AppRoute>,
    pub methods: Vec<HttpMethod>,
}

#[derive(Debug, Clone)]
pub struct ServerManifest {
    pub base_url: String,
    pub trailing_slash: bool,
    pub document: DocumentManifest,
    /// Route snapshot in table order.
    pub routes: Vec<Arc<AppRoute>>,
    /// Http routes in table order.
    pub http: Vec<ServerHttpRoute>,
    pub static_data: StaticDataManifest,
}

impl ServerManifest {
    /// Snapshot `routes`, loading http modules to find their methods.
    ///
    /// In dev mode modules may change between requests, so every method is
    /// allowed and resolution happens per request instead.
    pub async fn build(
        routes: Vec<Arc<AppRoute>>,
        document: DocumentManifest,
        dev: bool,
    ) -> Result<Self> {
        let mut http = Vec::new();
        for route in routes.iter().filter(|r| r.has(RouteKind::Http)) {
            let methods = match (&route.http, dev) {
                (Some(slot), false) => slot.module.get().await?.methods(),
                _ => HttpMethod::ALL.to_vec(),
            };
            http.push(ServerHttpRoute {
                route: route.clone(),
                methods,
            });
        }

        Ok(Self {
            base_url: "/".to_string(),
            trailing_slash: true,
            document,
            routes,
            http,
            static_data: StaticDataManifest::default(),
        })
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    pub fn with_trailing_slash(mut self, trailing_slash: bool) -> Self {
        self.trailing_slash = trailing_slash;
        self
    }

    pub fn with_static_data(mut self, static_data: StaticDataManifest) -> Self {
        self.static_data = static_data;
        self
    }

    /// First route exposing `kind` that matches `pathname`.
    pub fn match_route(&self, pathname: &str, kind: RouteKind) -> Option<(Arc<AppRoute>, RouteParams)> {
        self.routes
            .iter()
            .filter(|r| r.has(kind))
            .find_map(|r| r.exec(pathname).map(|params| (r.clone(), params)))
    }

    /// Apply the trailing-slash policy to a page pathname. A dot in the last
    /// segment marks a file only when the matching page route names that
    /// file literally (`/feed.xml`), not when a parameter holds it (`/v/1.2`).
    pub fn normalize_pathname(&self, pathname: &UrlPath, trailing_slash: bool) -> UrlPath {
        let normalized = pathname.normalize(trailing_slash);
        if !normalized.is_file() {
            return normalized;
        }
        match self.match_route(normalized.as_str(), RouteKind::Page) {
            Some((route, _)) if !route.names_file() => pathname.normalize_page(trailing_slash),
            _ => normalized,
        }
    }

    /// First http route matching `pathname`, with its allowed methods.
    pub fn match_http(&self, pathname: &str) -> Option<(&ServerHttpRoute, RouteParams)> {
        self.http
            .iter()
            .find_map(|h| h.route.exec(pathname).map(|params| (h, params)))
    }

    pub fn get(&self, id: &str) -> Option<&Arc<AppRoute>> {
        self.routes.iter().find(|r| r.id == id)
    }

    pub fn branch(&self, route: &AppRoute) -> Vec<Arc<AppRoute>> {
        branch(&self.routes, route)
    }

    /// Deepest route whose directory could own `pathname`, judged by the
    /// static prefix of each route id.
    pub fn nearest(&self, pathname: &str) -> Option<Arc<AppRoute>> {
        self.routes
            .iter()
            .filter(|r| pathname_within(&r.id, pathname))
            .max_by_key(|r| r.depth())
            .cloned()
    }

    /// Nearest error slot for `pathname`, searching up the branch.
    pub fn nearest_error(&self, pathname: &str) -> Option<Arc<AppRoute>> {
        let route = self.nearest(pathname)?;
        self.branch(&route)
            .into_iter()
            .rev()
            .find(|r| r.has(RouteKind::Error))
    }
}

/// Whether `pathname` lies below the static part of route `id`.
fn pathname_within(id: &str, pathname: &str) -> bool {
    let prefix: Vec<&str> = id
        .split('/')
        .filter(|s| !s.is_empty() && !(s.starts_with('(') && s.ends_with(')')))
        .take_while(|s| !s.contains('['))
        .collect();
    let segments: Vec<&str> = pathname.split('/').filter(|s| !s.is_empty()).collect();
    segments.len() >= prefix.len() && prefix.iter().zip(&segments).all(|(a, b)| a == b)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::http::Response;
    use crate::module::{MemoryModuleLoader, RouteModule};
    use crate::routing::{AppRoutes, RouteFile, RouteMatchers};
    use std::path::Path;

    fn table() -> AppRoutes {
        let loader = MemoryModuleLoader::new();
        loader.insert(
            "api/[id]/http.toml",
            RouteModule::new()
                .with_handler(HttpMethod::Get, |_| async { Ok(Response::new(200)) })
                .with_handler(HttpMethod::Delete, |_| async { Ok(Response::new(204)) }),
        );
        let mut routes = AppRoutes::new(RouteMatchers::new(), Arc::new(loader));
        for (rel, kind) in [
            ("page.html", RouteKind::Page),
            ("error.html", RouteKind::Error),
            ("blog/page.html", RouteKind::Page),
            ("blog/error.html", RouteKind::Error),
            ("blog/[slug]/page.html", RouteKind::Page),
            ("api/[id]/http.toml", RouteKind::Http),
        ] {
            routes
                .add(RouteFile::from_relative(Path::new("/app"), rel, kind))
                .unwrap();
        }
        routes
    }

    #[tokio::test]
    async fn test_build_resolves_methods() {
        let routes = table();
        let manifest = ServerManifest::build(routes.snapshot(), DocumentManifest::default(), false)
            .await
            .unwrap();
        assert_eq!(manifest.http.len(), 1);
        assert_eq!(manifest.http[0].methods, vec![HttpMethod::Get, HttpMethod::Delete]);

        let dev = ServerManifest::build(routes.snapshot(), DocumentManifest::default(), true)
            .await
            .unwrap();
        assert_eq!(dev.http[0].methods, HttpMethod::ALL.to_vec());
    }

    #[tokio::test]
    async fn test_match_and_nearest_error() {
        let manifest = ServerManifest::build(table().snapshot(), DocumentManifest::default(), true)
            .await
            .unwrap();

        let (route, params) = manifest.match_route("/blog/hello/", RouteKind::Page).unwrap();
        assert_eq!(route.id, "/blog/[slug]");
        assert_eq!(params.get("slug").map(String::as_str), Some("hello"));

        let (http, params) = manifest.match_http("/api/7").unwrap();
        assert_eq!(http.route.id, "/api/[id]");
        assert_eq!(params.get("id").map(String::as_str), Some("7"));

        assert_eq!(manifest.nearest_error("/blog/a/b/c").unwrap().id, "/blog");
        assert_eq!(manifest.nearest_error("/missing").unwrap().id, "/");
    }

    #[test]
    fn test_pathname_within() {
        assert!(pathname_within("/", "/anything"));
        assert!(pathname_within("/blog/[slug]", "/blog/x/y"));
        assert!(pathname_within("/(site)/blog", "/blog"));
        assert!(!pathname_within("/blog", "/about"));
    }
}
