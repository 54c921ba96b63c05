//! Page resolution: match, run loaders down the layout branch, render.

use std::sync::Arc;

use anyhow::{Context, Result};
use serde_json::{Value, json};
use url::Url;

use super::Dispatcher;
use crate::core::UrlPath;
use crate::http::{HttpError, LOCAL_ORIGIN, Redirect, Request};
use crate::manifest::static_data_asset_id;
use crate::module::{LoaderInput, RouteModule};
use crate::render::{RenderInput, RenderLayer, RenderOutput};
use crate::routing::{AppRoute, RouteKind, RouteParams};

/// How loaders are run.
#[derive(Debug, Clone, Copy)]
pub enum RenderMode<'a> {
    /// Build time: only static loaders; pages needing a server loader are
    /// reported as [`PageOutcome::Server`].
    Static,
    /// Serving `request`: server loaders run too.
    Request(&'a Request),
}

/// One static loader payload, keyed by `{route id}~{kind}~{pathname}`.
#[derive(Debug, Clone, PartialEq)]
pub struct StaticDataEntry {
    pub asset_id: String,
    pub data: Value,
}

#[derive(Debug, Clone)]
pub struct RenderedPage {
    pub route: Arc<AppRoute>,
    pub pathname: UrlPath,
    pub params: RouteParams,
    pub output: RenderOutput,
    pub static_data: Vec<StaticDataEntry>,
}

#[derive(Debug, Clone)]
pub enum PageOutcome {
    Rendered(RenderedPage),
    /// A loader declared a redirect; later loaders did not run.
    Redirect {
        route: Arc<AppRoute>,
        redirect: Redirect,
    },
    /// The page is rendered per request.
    Server(Arc<AppRoute>),
    NotFound,
}

enum Loaded {
    Layer(RenderLayer, Option<StaticDataEntry>),
    Redirect(Redirect),
}

/// Absolute URL for a decoded pathname.
pub fn page_url(pathname: &UrlPath) -> Result<Url> {
    Url::parse(LOCAL_ORIGIN)
        .and_then(|base| base.join(&pathname.to_encoded()))
        .with_context(|| format!("invalid pathname `{pathname}`"))
}

impl Dispatcher {
    /// Resolve and render the page at `pathname`.
    ///
    /// Loader errors propagate; a missing route is [`PageOutcome::NotFound`].
    pub async fn render_page(
        &self,
        url: &Url,
        pathname: &UrlPath,
        mode: RenderMode<'_>,
    ) -> Result<PageOutcome> {
        let Some((route, params)) = self
            .manifest
            .match_route(pathname.as_str(), RouteKind::Page)
        else {
            return Ok(PageOutcome::NotFound);
        };

        let mut slots: Vec<(Arc<AppRoute>, RouteKind)> = self
            .manifest
            .branch(&route)
            .into_iter()
            .filter(|r| r.has(RouteKind::Layout))
            .map(|r| (r, RouteKind::Layout))
            .collect();
        slots.push((route.clone(), RouteKind::Page));

        let mut modules = Vec::with_capacity(slots.len());
        for (owner, kind) in &slots {
            modules.push(load(owner, *kind).await?);
        }
        if matches!(mode, RenderMode::Static) && modules.iter().any(|m| m.is_fetchable()) {
            return Ok(PageOutcome::Server(route));
        }

        let mut layers = Vec::with_capacity(slots.len());
        let mut static_data = Vec::new();
        for ((owner, kind), module) in slots.into_iter().zip(modules) {
            let loaded = self
                .run_loader(&owner, kind, module, url, pathname, &params, mode)
                .await
                .with_context(|| format!("{kind} loader of `{}` failed", owner.id))?;
            match loaded {
                Loaded::Layer(layer, entry) => {
                    layers.push(layer);
                    static_data.extend(entry);
                }
                Loaded::Redirect(redirect) => {
                    return Ok(PageOutcome::Redirect { route, redirect });
                }
            }
        }

        let output = self.renderer.render(&RenderInput {
            url,
            params: &params,
            layers: &layers,
        })?;

        Ok(PageOutcome::Rendered(RenderedPage {
            route,
            pathname: pathname.clone(),
            params,
            output,
            static_data,
        }))
    }

    /// Render the nearest error slot for `pathname`, if there is one.
    pub async fn render_error(
        &self,
        url: &Url,
        pathname: &UrlPath,
        status: u16,
        message: &str,
    ) -> Result<Option<RenderOutput>> {
        let Some(route) = self.manifest.nearest_error(pathname.as_str()) else {
            return Ok(None);
        };

        let mut layers = Vec::new();
        for owner in self.manifest.branch(&route) {
            if owner.has(RouteKind::Layout) {
                layers.push(RenderLayer {
                    route_id: owner.id.clone(),
                    kind: RouteKind::Layout,
                    module: load(&owner, RouteKind::Layout).await?,
                    data: Value::Null,
                });
            }
        }
        layers.push(RenderLayer {
            route_id: route.id.clone(),
            kind: RouteKind::Error,
            module: load(&route, RouteKind::Error).await?,
            data: json!({ "status": status, "message": message }),
        });

        let params = RouteParams::new();
        self.renderer
            .render(&RenderInput {
                url,
                params: &params,
                layers: &layers,
            })
            .map(Some)
    }

    #[allow(clippy::too_many_arguments)]
    async fn run_loader(
        &self,
        route: &AppRoute,
        kind: RouteKind,
        module: Arc<RouteModule>,
        url: &Url,
        pathname: &UrlPath,
        params: &RouteParams,
        mode: RenderMode<'_>,
    ) -> Result<Loaded> {
        let asset_id = static_data_asset_id(&route.id, kind, pathname.as_str());
        let mut data = Value::Null;
        let mut entry = None;

        if let Some(precomputed) = self.manifest.static_data.loader(&asset_id) {
            data = precomputed().await?;
            entry = Some(StaticDataEntry {
                asset_id,
                data: data.clone(),
            });
        } else if let Some(loader) = &module.static_loader {
            let output = loader(LoaderInput {
                url: url.clone(),
                pathname: pathname.to_string(),
                params: params.clone(),
                route_id: route.id.clone(),
                kind,
            })
            .await?;
            if let Some(redirect) = output.redirect {
                return Ok(Loaded::Redirect(redirect));
            }
            if let Some(value) = output.data {
                data = value;
                entry = Some(StaticDataEntry {
                    asset_id,
                    data: data.clone(),
                });
            }
        } else if let (Some(loader), RenderMode::Request(req)) = (&module.server_loader, mode) {
            let mut req = req.clone();
            req.params = params.clone();
            let res = loader(req).await?;
            if res.is_redirect() {
                let location = res.header("location").unwrap_or("/");
                return Ok(Loaded::Redirect(Redirect::new(location, res.status)?));
            }
            if res.status >= 400 {
                return Err(HttpError::new(res.status, res.text_body()).into());
            }
            if !res.body.is_empty() {
                data = serde_json::from_slice(&res.body)
                    .context("server loader did not return JSON")?;
            }
        }

        Ok(Loaded::Layer(
            RenderLayer {
                route_id: route.id.clone(),
                kind,
                module,
                data,
            },
            entry,
        ))
    }
}

/// Module in `route`'s `kind` slot.
pub(super) async fn load(route: &AppRoute, kind: RouteKind) -> Result<Arc<RouteModule>> {
    let slot = route
        .slot(kind)
        .with_context(|| format!("route `{}` has no {kind}", route.id))?;
    slot.module.get().await
}
