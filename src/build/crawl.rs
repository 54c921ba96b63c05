//! Breadth-first crawl over reachable pages.
//!
//! Rendering fans out over a `JoinSet` bounded by the configured
//! concurrency. The frontier lives on the coordinating task only, so the
//! visited check and insert happen in one step and no link renders twice.

use std::collections::VecDeque;
use std::path::Path;
use std::sync::Arc;

use anyhow::{Context, Result};
use rustc_hash::FxHashSet;
use tokio::task::JoinSet;

use super::{BadLink, BuildData, BuildOptions, StaticRender, extract_links, resolve_link};
use crate::core::UrlPath;
use crate::dispatch::{Dispatcher, PageOutcome, RenderMode, page_url};
use crate::routing::{AppRoute, RouteKind};

/// Prefix of bundler output; never a page.
const IMMUTABLE_PREFIX: &str = "/_immutable/";

/// Pending pathnames plus every pathname ever enqueued.
#[derive(Debug, Default)]
struct Frontier {
    visited: FxHashSet<UrlPath>,
    queue: VecDeque<(UrlPath, Option<String>)>,
}

impl Frontier {
    /// Enqueue `pathname` unless it was seen before. `referrer` is the route
    /// id of the page linking to it.
    fn push(&mut self, pathname: UrlPath, referrer: Option<String>) -> bool {
        if !self.visited.insert(pathname.clone()) {
            return false;
        }
        self.queue.push_back((pathname, referrer));
        true
    }
}

/// Render every page reachable from the entries and the static page routes.
///
/// A loader error aborts the crawl. A link nothing answers is recorded as a
/// bad link and the crawl continues.
pub async fn crawl(dispatcher: Arc<Dispatcher>, options: &BuildOptions) -> Result<BuildData> {
    let manifest = dispatcher.manifest().clone();
    let trailing_slash = options.trailing_slash;
    let mut data = BuildData::default();
    let mut frontier = Frontier::default();

    for entry in &options.entries {
        let entry = UrlPath::from_browser(entry);
        frontier.push(manifest.normalize_pathname(&entry, trailing_slash), None);
    }
    for route in manifest
        .routes
        .iter()
        .filter(|r| r.has(RouteKind::Page) && !r.dynamic())
    {
        let pathname = UrlPath::from_decoded(route.pathname());
        frontier.push(manifest.normalize_pathname(&pathname, trailing_slash), None);
    }
    crate::debug!("build"; "crawling from {} seeds", frontier.queue.len());

    let concurrency = options.concurrency.max(1);
    let mut tasks = JoinSet::new();
    loop {
        while tasks.len() < concurrency {
            let Some((pathname, referrer)) = frontier.queue.pop_front() else {
                break;
            };
            let dispatcher = dispatcher.clone();
            tasks.spawn(async move {
                let outcome = render(&dispatcher, &pathname).await;
                (pathname, referrer, outcome)
            });
        }

        let Some(joined) = tasks.join_next().await else {
            break;
        };
        let (pathname, referrer, outcome) = joined.context("render task panicked")?;
        let outcome = outcome.with_context(|| format!("failed to render `{pathname}`"))?;

        match outcome {
            PageOutcome::Rendered(page) => {
                for link in extract_links(&page.output.html, &pathname) {
                    if is_asset(&link, options.public_dir.as_deref()) {
                        continue;
                    }
                    frontier.push(
                        manifest.normalize_pathname(&link, trailing_slash),
                        Some(page.route.id.clone()),
                    );
                }
                for entry in &page.static_data {
                    data.insert_static_data(entry)?;
                }
                data.links
                    .insert(pathname.as_str().to_string(), page.route.id.clone());
                data.static_renders.insert(
                    pathname.as_str().to_string(),
                    StaticRender {
                        filename: page_filename(&page.route, &pathname),
                        route_id: page.route.id.clone(),
                        pathname: pathname.clone(),
                        output: page.output,
                        static_data: page.static_data,
                    },
                );
            }
            PageOutcome::Redirect { route, redirect } => {
                if let Some(target) = resolve_link(&redirect.path, &pathname)
                    && !is_asset(&target, options.public_dir.as_deref())
                {
                    frontier.push(
                        manifest.normalize_pathname(&target, trailing_slash),
                        Some(route.id.clone()),
                    );
                }
                data.insert_redirect(&pathname, page_filename(&route, &pathname), &redirect);
            }
            PageOutcome::Server(route) => {
                data.server_pages
                    .insert(route.id.clone(), route.pathname().to_string());
            }
            PageOutcome::NotFound => {
                if manifest.match_http(pathname.as_str()).is_some() {
                    continue;
                }
                crate::debug!("build"; "bad link {} (from {:?})", pathname, referrer);
                data.bad_links.insert(
                    pathname.as_str().to_string(),
                    BadLink {
                        pathname: pathname.as_str().to_string(),
                        reason: "no matching page route".into(),
                        referrer,
                    },
                );
            }
        }
    }

    for http in &manifest.http {
        let route = &http.route;
        data.server_endpoints
            .insert(route.id.clone(), route.pathname().to_string());
        if let Some(slot) = &route.http
            && slot.module.get().await?.is_edge()
        {
            data.edge_routes.insert(route.id.clone());
        }
    }

    Ok(data)
}

fn page_filename(route: &AppRoute, pathname: &UrlPath) -> String {
    if route.names_file() {
        pathname.to_output_filename()
    } else {
        pathname.to_page_filename()
    }
}

async fn render(dispatcher: &Dispatcher, pathname: &UrlPath) -> Result<PageOutcome> {
    let url = page_url(pathname)?;
    dispatcher
        .render_page(&url, pathname, RenderMode::Static)
        .await
}

/// Links to bundler output or to files under `public/` are not crawled.
fn is_asset(link: &UrlPath, public_dir: Option<&Path>) -> bool {
    if link.as_str().starts_with(IMMUTABLE_PREFIX) {
        return true;
    }
    public_dir.is_some_and(|dir| {
        let relative = link.as_str().trim_start_matches('/');
        !relative.is_empty() && dir.join(relative).is_file()
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::http::{Redirect, Response};
    use crate::manifest::{DocumentManifest, ServerManifest};
    use crate::module::{MemoryModuleLoader, RouteModule, StaticLoaderOutput};
    use crate::render::{DEFAULT_DOCUMENT, TemplateRenderer};
    use crate::routing::{AppRoutes, RouteFile, RouteMatchers};
    use serde_json::json;
    use tempfile::TempDir;

    async fn dispatcher(loader: MemoryModuleLoader, files: &[(&str, RouteKind)]) -> Arc<Dispatcher> {
        let app = Path::new("/app");
        let mut routes = AppRoutes::new(RouteMatchers::new(), Arc::new(loader));
        for (relative, kind) in files {
            routes.add(RouteFile::from_relative(app, relative, *kind)).unwrap();
        }
        let document = DocumentManifest {
            entry: "/_immutable/entry.js".into(),
            template: DEFAULT_DOCUMENT.into(),
            stylesheet: None,
        };
        let manifest = ServerManifest::build(routes.snapshot(), document, false)
            .await
            .unwrap();
        Arc::new(Dispatcher::new(Arc::new(manifest), Arc::new(TemplateRenderer)))
    }

    fn options() -> BuildOptions {
        BuildOptions {
            entries: vec!["/".into()],
            concurrency: 2,
            trailing_slash: true,
            public_dir: None,
        }
    }

    #[tokio::test]
    async fn test_crawl_follows_links() {
        let loader = MemoryModuleLoader::new();
        loader.insert(
            "page.html",
            RouteModule::new().with_template(r#"<a href="/blog/hello">post</a><a href="/about/">about</a>"#),
        );
        loader.insert("about/page.html", RouteModule::new().with_template("<p>about</p>"));
        loader.insert(
            "blog/[slug]/page.html",
            RouteModule::new().with_template("<h1>{{ params.slug }}</h1><a href=\"../\">back</a>"),
        );
        let dispatcher = dispatcher(
            loader,
            &[
                ("page.html", RouteKind::Page),
                ("about/page.html", RouteKind::Page),
                ("blog/[slug]/page.html", RouteKind::Page),
            ],
        )
        .await;

        let data = crawl(dispatcher, &options()).await.unwrap();
        let rendered: Vec<_> = data.static_renders.keys().cloned().collect();
        assert_eq!(rendered, vec!["/", "/about/", "/blog/hello/"]);
        assert_eq!(data.static_renders["/blog/hello/"].filename, "blog/hello/index.html");
        assert_eq!(data.links["/blog/hello/"], "/blog/[slug]");
        // `../` from /blog/hello/ is /blog/, which nothing answers
        assert_eq!(data.bad_links["/blog/"].referrer.as_deref(), Some("/blog/[slug]"));
    }

    #[tokio::test]
    async fn test_crawl_records_redirect() {
        let loader = MemoryModuleLoader::new();
        loader.insert("page.html", RouteModule::new().with_template(r#"<a href="/old">old</a>"#));
        loader.insert(
            "old/page.html",
            RouteModule::new()
                .with_template("unused")
                .with_static_loader(|_| async {
                    Ok(StaticLoaderOutput::redirect(Redirect::new("/new", 301)?))
                }),
        );
        loader.insert("new/page.html", RouteModule::new().with_template("new"));
        let dispatcher = dispatcher(
            loader,
            &[
                ("page.html", RouteKind::Page),
                ("old/page.html", RouteKind::Page),
                ("new/page.html", RouteKind::Page),
            ],
        )
        .await;

        let mut options = options();
        options.trailing_slash = false;
        let data = crawl(dispatcher, &options).await.unwrap();

        let redirect = &data.static_redirects["/old"];
        assert_eq!(redirect.from, "/old");
        assert_eq!(redirect.to, "/new");
        assert_eq!(redirect.status, 301);
        assert!(!data.static_renders.contains_key("/old"));
        assert!(data.static_renders.contains_key("/new"));
    }

    #[tokio::test]
    async fn test_crawl_dotted_param_is_a_page() {
        let loader = || {
            let loader = MemoryModuleLoader::new();
            loader.insert(
                "page.html",
                RouteModule::new().with_template(r#"<a href="/x/v1.2">v1.2</a>"#),
            );
            loader.insert("x/[v]/page.html", RouteModule::new().with_template("{{ params.v }}"));
            loader.insert("feed.xml/page.html", RouteModule::new().with_template("<rss></rss>"));
            loader
        };
        let files = [
            ("page.html", RouteKind::Page),
            ("x/[v]/page.html", RouteKind::Page),
            ("feed.xml/page.html", RouteKind::Page),
        ];

        let mut options = options();
        options.trailing_slash = false;
        let data = crawl(dispatcher(loader(), &files).await, &options).await.unwrap();
        assert_eq!(data.static_renders["/x/v1.2"].filename, "x/v1.2.html");
        assert_eq!(data.static_renders["/feed.xml"].filename, "feed.xml");

        let data = crawl(dispatcher(loader(), &files).await, &self::options()).await.unwrap();
        assert_eq!(data.static_renders["/x/v1.2/"].filename, "x/v1.2/index.html");
        assert!(!data.static_renders.contains_key("/x/v1.2"));
        assert_eq!(data.static_renders["/feed.xml"].filename, "feed.xml");
    }

    #[tokio::test]
    async fn test_crawl_bad_link_does_not_abort() {
        let loader = MemoryModuleLoader::new();
        loader.insert(
            "page.html",
            RouteModule::new().with_template(r#"<a href="/missing">x</a><a href="/api/ping">api</a>"#),
        );
        loader.insert(
            "api/ping/http.toml",
            RouteModule::new().with_handler(crate::http::HttpMethod::Get, |_| async {
                Ok(Response::text("pong", 200))
            }),
        );
        let dispatcher = dispatcher(
            loader,
            &[("page.html", RouteKind::Page), ("api/ping/http.toml", RouteKind::Http)],
        )
        .await;

        let data = crawl(dispatcher, &options()).await.unwrap();
        let bad = &data.bad_links["/missing/"];
        assert_eq!(bad.referrer.as_deref(), Some("/"));
        assert!(!data.bad_links.contains_key("/api/ping/"));
        assert_eq!(data.server_endpoints["/api/ping"], "/api/ping");
        assert!(data.static_renders.contains_key("/"));
    }

    #[tokio::test]
    async fn test_crawl_dedups_static_data() {
        let loader = MemoryModuleLoader::new();
        let same = || {
            RouteModule::new()
                .with_template("{{ data.title }}")
                .with_static_loader(|_| async { Ok(StaticLoaderOutput::data(json!({"title": "same"}))) })
        };
        loader.insert("a/page.html", same());
        loader.insert("b/page.html", same());
        let dispatcher = dispatcher(
            loader,
            &[("a/page.html", RouteKind::Page), ("b/page.html", RouteKind::Page)],
        )
        .await;

        let mut options = options();
        options.entries = vec!["/a/".into()];
        let data = crawl(dispatcher, &options).await.unwrap();
        assert_eq!(data.static_renders.len(), 2);
        assert_eq!(data.static_data.len(), 1);
        assert_eq!(data.static_data_ids.len(), 2);
    }

    #[tokio::test]
    async fn test_crawl_loader_error_aborts() {
        let loader = MemoryModuleLoader::new();
        loader.insert(
            "page.html",
            RouteModule::new()
                .with_template("live")
                .with_server_loader(|_| async { Ok(Response::json(&json!({}), 200)) }),
        );
        loader.insert(
            "broken/page.html",
            RouteModule::new()
                .with_template("x")
                .with_static_loader(|_| async { anyhow::bail!("database offline") }),
        );
        let files = [("page.html", RouteKind::Page), ("broken/page.html", RouteKind::Page)];

        let mut options = options();
        options.entries.clear();
        let err = crawl(dispatcher(loader, &files).await, &options)
            .await
            .unwrap_err();
        assert!(format!("{err:#}").contains("database offline"));
    }

    #[tokio::test]
    async fn test_crawl_server_page() {
        let loader = MemoryModuleLoader::new();
        loader.insert(
            "page.html",
            RouteModule::new()
                .with_template("live")
                .with_server_loader(|_| async { Ok(Response::json(&json!({}), 200)) }),
        );
        let dispatcher = dispatcher(loader, &[("page.html", RouteKind::Page)]).await;
        let data = crawl(dispatcher, &options()).await.unwrap();
        assert!(data.static_renders.is_empty());
        assert_eq!(data.server_pages["/"], "/");
    }

    #[test]
    fn test_is_asset() {
        let dir = TempDir::new().unwrap();
        std::fs::write(dir.path().join("robots.txt"), "").unwrap();
        assert!(is_asset(&UrlPath::from_decoded("/robots.txt"), Some(dir.path())));
        assert!(is_asset(&UrlPath::from_decoded("/_immutable/app.js"), None));
        assert!(!is_asset(&UrlPath::from_decoded("/"), Some(dir.path())));
        assert!(!is_asset(&UrlPath::from_decoded("/about/"), Some(dir.path())));
    }

    #[test]
    fn test_frontier_dedups() {
        let mut frontier = Frontier::default();
        assert!(frontier.push(UrlPath::from_decoded("/a/"), None));
        assert!(!frontier.push(UrlPath::from_decoded("/a/"), Some("/".into())));
        assert_eq!(frontier.queue.len(), 1);
    }
}
