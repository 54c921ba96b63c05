//! Request dispatcher.
//!
//! Per request:
//! 1. Normalize the pathname (`index.html`, trailing-slash policy)
//! 2. Match page routes (or http routes, for API calls) in score order
//! 3. Run layout and page loaders root-first; a redirect short-circuits
//! 4. Render the document, or invoke the http handler
//!
//! Loader and handler errors never escape [`Dispatcher::handle`]: they are
//! turned into error responses.

mod document;
mod page;

pub use document::{
    DATA_HASH_GLOBAL, DocumentTables, REDIRECTS_GLOBAL, STATIC_DATA_GLOBAL, TRAILING_SLASH_GLOBAL,
    json_script, page_document,
};
pub use page::{PageOutcome, RenderMode, RenderedPage, StaticDataEntry, page_url};

use std::sync::Arc;

use anyhow::Result;

use crate::core::UrlPath;
use crate::http::{HttpError, HttpMethod, Redirect, Request, Response, handle_error};
use crate::manifest::ServerManifest;
use crate::render::Renderer;
use crate::routing::RouteKind;

/// Header naming the route whose server loader the client wants to call.
///
/// The value is a route id, optionally followed by `~layout` to address the
/// layout slot instead of the page.
pub const DATA_HEADER: &str = "x-vessel-data";

pub struct Dispatcher {
    manifest: Arc<ServerManifest>,
    renderer: Arc<dyn Renderer>,
}

impl Dispatcher {
    pub fn new(manifest: Arc<ServerManifest>, renderer: Arc<dyn Renderer>) -> Self {
        Self { manifest, renderer }
    }

    pub fn manifest(&self) -> &Arc<ServerManifest> {
        &self.manifest
    }

    /// Answer `req`. Never fails: errors become JSON error responses.
    pub async fn handle(&self, req: Request) -> Response {
        match self.dispatch(req).await {
            Ok(res) => res,
            Err(err) => {
                if err.downcast_ref::<HttpError>().is_none() {
                    crate::log!("error"; "{:#}", err);
                }
                handle_error(&err)
            }
        }
    }

    async fn dispatch(&self, mut req: Request) -> Result<Response> {
        let path = UrlPath::from_browser(req.pathname());

        if let Some(target) = req.header(DATA_HEADER).map(str::to_string)
            && req.accepts("application/json")
        {
            return self.server_data(&target, &path, req).await;
        }

        let page_request =
            matches!(req.method, HttpMethod::Get | HttpMethod::Head) && req.accepts("text/html");

        if page_request {
            let normalized = self
                .manifest
                .normalize_pathname(&path, self.manifest.trailing_slash);
            if normalized != path
                && self
                    .manifest
                    .match_route(normalized.as_str(), RouteKind::Page)
                    .is_some()
            {
                let location = match req.url.query() {
                    Some(query) => format!("{}?{query}", normalized.to_encoded()),
                    None => normalized.to_encoded(),
                };
                return Ok(Response::redirect(&Redirect::new(location, 301)?));
            }

            if let Some(res) = self.page_response(&req, &path).await? {
                return Ok(res);
            }
            if let Some(res) = self.http_response(&mut req, &path).await? {
                return Ok(res);
            }
        } else {
            if let Some(res) = self.http_response(&mut req, &path).await? {
                return Ok(res);
            }
            if let Some(res) = self.page_response(&req, &path).await? {
                return Ok(res);
            }
        }

        self.not_found(&req, &path).await
    }

    async fn page_response(&self, req: &Request, path: &UrlPath) -> Result<Option<Response>> {
        match self
            .render_page(&req.url, path, RenderMode::Request(req))
            .await?
        {
            PageOutcome::Rendered(page) => {
                let html = page_document(
                    &self.manifest.document,
                    &page.output,
                    &page.static_data,
                    self.tables(),
                );
                Ok(Some(Response::html(html, 200)))
            }
            PageOutcome::Redirect { redirect, .. } => Ok(Some(Response::redirect(&redirect))),
            PageOutcome::Server(_) | PageOutcome::NotFound => Ok(None),
        }
    }

    async fn http_response(&self, req: &mut Request, path: &UrlPath) -> Result<Option<Response>> {
        let Some((http, params)) = self.manifest.match_http(path.as_str()) else {
            return Ok(None);
        };

        let method = req.method;
        let allows = |methods: &[HttpMethod]| {
            methods.contains(&method)
                || (method == HttpMethod::Head && methods.contains(&HttpMethod::Get))
        };
        if !allows(&http.methods) {
            return Ok(Some(Response::method_not_allowed(&http.methods)));
        }

        let module = page::load(&http.route, RouteKind::Http).await?;
        let handler = module.handlers.get(&method).or_else(|| {
            (method == HttpMethod::Head)
                .then(|| module.handlers.get(&HttpMethod::Get))
                .flatten()
        });
        let Some(handler) = handler else {
            return Ok(Some(Response::method_not_allowed(&module.methods())));
        };

        req.params = params;
        let mut res = handler(req.clone()).await?;
        if method == HttpMethod::Head {
            res.body.clear();
        }
        Ok(Some(res))
    }

    /// Call a fetchable slot's server loader directly.
    async fn server_data(&self, target: &str, path: &UrlPath, mut req: Request) -> Result<Response> {
        let (id, kind) = match target.rsplit_once('~') {
            Some((id, "layout")) => (id, RouteKind::Layout),
            _ => (target, RouteKind::Page),
        };
        let route = self
            .manifest
            .get(id)
            .filter(|r| r.has(kind))
            .ok_or_else(|| HttpError::not_found(format!("no {kind} at route `{id}`")))?
            .clone();

        let module = page::load(&route, kind).await?;
        let loader = module
            .server_loader
            .as_ref()
            .ok_or_else(|| HttpError::not_found(format!("route `{id}` has no server loader")))?;

        req.params = route.exec(path.as_str()).unwrap_or_default();
        loader(req).await
    }

    async fn not_found(&self, req: &Request, path: &UrlPath) -> Result<Response> {
        if req.accepts("text/html")
            && let Some(output) = self.render_error(&req.url, path, 404, "not found").await?
        {
            let html = page_document(&self.manifest.document, &output, &[], self.tables());
            return Ok(Response::html(html, 404));
        }
        Ok(Response::not_found())
    }

    fn tables(&self) -> DocumentTables<'_> {
        DocumentTables {
            redirects: None,
            data_hashes: Some(&self.manifest.static_data.client_hash_record),
            trailing_slash: self.manifest.trailing_slash,
        }
    }
}
