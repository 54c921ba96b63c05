//! Route modules: what a route file exports once loaded.
//!
//! A [`RouteModule`] is the compiled form of one route file. Page, layout and
//! error modules carry markup plus optional static/server loaders; http
//! modules carry one handler per method. Modules are loaded on demand through
//! a [`ModuleLoader`] and memoized per role slot by [`LazyModule`].

mod file;
mod lazy;

pub use file::{FileModuleLoader, HttpEndpoint, HttpFile, read_front_matter};
pub use lazy::{LazyModule, MemoryModuleLoader, ModuleLoader};

use std::collections::BTreeMap;
use std::fmt;
use std::future::Future;
use std::sync::Arc;

use anyhow::Result;
use futures::FutureExt;
use futures::future::BoxFuture;
use serde_json::Value;
use url::Url;

use crate::http::{HttpMethod, Redirect, Request, Response};
use crate::routing::{RouteKind, RouteParams};

/// Export name of the build-time loader.
pub const STATIC_LOADER_EXPORT: &str = "staticLoader";
/// Export name of the per-request loader.
pub const SERVER_LOADER_EXPORT: &str = "serverLoader";
/// Export flag for routes that deploy to an edge runtime.
pub const EDGE_EXPORT: &str = "EDGE";

/// What a static loader sees.
#[derive(Debug, Clone)]
pub struct LoaderInput {
    pub url: Url,
    /// Decoded pathname being loaded.
    pub pathname: String,
    pub params: RouteParams,
    pub route_id: String,
    pub kind: RouteKind,
}

/// What a static loader returns.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct StaticLoaderOutput {
    pub data: Option<Value>,
    pub redirect: Option<Redirect>,
}

impl StaticLoaderOutput {
    pub fn data(data: Value) -> Self {
        Self {
            data: Some(data),
            redirect: None,
        }
    }

    pub fn redirect(redirect: Redirect) -> Self {
        Self {
            data: None,
            redirect: Some(redirect),
        }
    }
}

pub type StaticLoader =
    Arc<dyn Fn(LoaderInput) -> BoxFuture<'static, Result<StaticLoaderOutput>> + Send + Sync>;

/// Per-request loader or http handler.
pub type RequestHandler = Arc<dyn Fn(Request) -> BoxFuture<'static, Result<Response>> + Send + Sync>;

/// A loaded route file.
#[derive(Clone, Default)]
pub struct RouteModule {
    /// Names exported by the module, in declaration order.
    pub exports: Vec<String>,
    pub static_loader: Option<StaticLoader>,
    pub server_loader: Option<RequestHandler>,
    pub handlers: BTreeMap<HttpMethod, RequestHandler>,
    /// Markup rendered for page, layout and error modules.
    pub template: Option<String>,
}

impl RouteModule {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_template(mut self, template: impl Into<String>) -> Self {
        self.template = Some(template.into());
        self.export("default");
        self
    }

    pub fn with_static_loader<F, Fut>(mut self, loader: F) -> Self
    where
        F: Fn(LoaderInput) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<StaticLoaderOutput>> + Send + 'static,
    {
        self.static_loader = Some(Arc::new(move |input| loader(input).boxed()));
        self.export(STATIC_LOADER_EXPORT);
        self
    }

    pub fn with_server_loader<F, Fut>(mut self, loader: F) -> Self
    where
        F: Fn(Request) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<Response>> + Send + 'static,
    {
        self.server_loader = Some(Arc::new(move |req| loader(req).boxed()));
        self.export(SERVER_LOADER_EXPORT);
        self
    }

    pub fn with_handler<F, Fut>(mut self, method: HttpMethod, handler: F) -> Self
    where
        F: Fn(Request) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<Response>> + Send + 'static,
    {
        self.handlers
            .insert(method, Arc::new(move |req| handler(req).boxed()));
        self.export(method.as_str());
        self
    }

    pub fn with_export(mut self, name: &str) -> Self {
        self.export(name);
        self
    }

    fn export(&mut self, name: &str) {
        if !self.exports.iter().any(|e| e == name) {
            self.exports.push(name.to_string());
        }
    }

    pub fn exports(&self, name: &str) -> bool {
        self.exports.iter().any(|e| e == name)
    }

    /// Whether the client may fetch this module's data per request.
    #[inline]
    pub fn is_fetchable(&self) -> bool {
        self.exports(SERVER_LOADER_EXPORT)
    }

    #[inline]
    pub fn is_edge(&self) -> bool {
        self.exports(EDGE_EXPORT)
    }

    /// HTTP methods found among the exports.
    pub fn methods(&self) -> Vec<HttpMethod> {
        HttpMethod::from_exports(self.exports.iter().map(String::as_str))
    }
}

impl fmt::Debug for RouteModule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RouteModule")
            .field("exports", &self.exports)
            .field("template", &self.template.as_ref().map(String::len))
            .finish_non_exhaustive()
    }
}
