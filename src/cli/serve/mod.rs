//! Development server.
//!
//! Requests are answered by a [`Dispatcher`] over the live route table.
//! When the watcher reports route file changes, the table is updated in
//! place, the manifests are rebuilt, and HMR events are queued for the
//! client.
//!
//! # Virtual endpoints
//!
//! | Path                          | Method | Answer                      |
//! |-------------------------------|--------|-----------------------------|
//! | `/:virtual/vessel/manifest`   | GET    | client manifest JSON        |
//! | `/:virtual/vessel/hmr`        | GET    | pending HMR events (drained) |
//! | `/:virtual/vessel/hmr`        | POST   | acknowledge an HMR event    |

mod hmr;
mod lifecycle;
mod response;
mod watch;

pub use hmr::{HmrEvent, HmrQueue};
pub use watch::{ChangeKind, Debouncer};

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result, bail};
use crossbeam::channel;
use parking_lot::RwLock;
use tiny_http::{Method, Server};
use tokio::runtime::Handle;

use crate::build::build_manifests;
use crate::config::VesselConfig;
use crate::core::{register_server, set_serving};
use crate::dispatch::Dispatcher;
use crate::http::Response;
use crate::logger::{status_error, status_success, status_warning};
use crate::manifest::ClientManifest;
use crate::module::{FileModuleLoader, read_front_matter};
use crate::render::TemplateRenderer;
use crate::routing::{AppRoutes, RouteEvent, RouteFile, RouteGlobs, RouteKind};
use crate::utils::plural::plural_count;

/// Prefix of the endpoints the dev server answers itself.
pub const VIRTUAL_PREFIX: &str = "/:virtual/vessel/";

const REQUEST_THREADS: usize = 4;

/// Dispatcher and client manifest for one route table snapshot.
struct DevApp {
    dispatcher: Arc<Dispatcher>,
    client: ClientManifest,
}

pub struct DevServer {
    config: VesselConfig,
    globs: RouteGlobs,
    routes: RwLock<AppRoutes>,
    app: RwLock<DevApp>,
    hmr: Arc<HmrQueue>,
    runtime: Handle,
}

impl DevServer {
    /// Scan the app directory and build the first snapshot.
    ///
    /// Files that cannot join the table are reported and skipped, so one
    /// bad file does not keep the server from starting.
    pub fn new(config: VesselConfig, runtime: Handle) -> Result<Self> {
        let app_dir = config.app_dir();
        if !app_dir.is_dir() {
            bail!(
                "app directory `{}` not found",
                config.root_relative(app_dir).display()
            );
        }

        let globs = config.routes.globs()?;
        let mut routes = AppRoutes::new(config.routes.matchers()?, Arc::new(FileModuleLoader));
        for file in globs.scan(app_dir) {
            let relative = file.relative.clone();
            if let Err(e) = routes.add(file) {
                crate::log!("routes"; "skipping {}: {}", relative, e);
            }
        }
        crate::log!("routes"; "{}", plural_count(routes.len(), "route"));

        let hmr = Arc::new(HmrQueue::default());
        let queue = Arc::clone(&hmr);
        routes.subscribe(move |event, route| {
            match event {
                RouteEvent::Added => crate::debug!("routes"; "updated {}", route.id),
                RouteEvent::Removed if route.is_empty() => {
                    crate::log!("routes"; "removed {}", route.id)
                }
                RouteEvent::Removed => crate::debug!("routes"; "updated {}", route.id),
            }
            queue.push(HmrEvent::RouteChange {
                id: route.id.clone(),
            });
        });

        let app = Self::snapshot(&config, &routes, &runtime)?;
        Ok(Self {
            config,
            globs,
            routes: RwLock::new(routes),
            app: RwLock::new(app),
            hmr,
            runtime,
        })
    }

    fn snapshot(config: &VesselConfig, routes: &AppRoutes, runtime: &Handle) -> Result<DevApp> {
        let (server, client) = runtime.block_on(build_manifests(config, routes.snapshot(), true))?;
        let dispatcher = Dispatcher::new(Arc::new(server), Arc::new(TemplateRenderer));
        Ok(DevApp {
            dispatcher: Arc::new(dispatcher),
            client,
        })
    }

    pub fn config(&self) -> &VesselConfig {
        &self.config
    }

    pub fn hmr(&self) -> &HmrQueue {
        &self.hmr
    }

    pub fn dispatcher(&self) -> Arc<Dispatcher> {
        Arc::clone(&self.app.read().dispatcher)
    }

    pub fn client_manifest_json(&self) -> String {
        self.app.read().client.to_json()
    }

    /// Rebuild the manifests from the current route table.
    pub fn rebuild(&self) -> Result<()> {
        let app = Self::snapshot(&self.config, &self.routes.read(), &self.runtime)?;
        *self.app.write() = app;
        Ok(())
    }

    // ========================================================================
    // file changes
    // ========================================================================

    /// Apply debounced file changes to the route table, then rebuild.
    ///
    /// Removals go first, so a file renamed within one route frees its slot
    /// before the new name claims it. A created or modified path that is
    /// already gone counts as removed.
    pub fn apply_changes(&self, changes: &[(PathBuf, ChangeKind)]) {
        let (removed, updated): (Vec<_>, Vec<_>) = changes
            .iter()
            .map(|(path, kind)| match kind {
                ChangeKind::Created | ChangeKind::Modified if !path.exists() => {
                    (path, ChangeKind::Removed)
                }
                _ => (path, *kind),
            })
            .partition(|(_, kind)| *kind == ChangeKind::Removed);

        let mut touched = 0;
        for (path, kind) in removed.into_iter().chain(updated) {
            let applied = if self.config.app.template.as_deref() == Some(path.as_path()) {
                crate::debug!("watch"; "document template {}", kind.label());
                true
            } else {
                match kind {
                    ChangeKind::Created | ChangeKind::Modified => self.update_file(path, kind),
                    ChangeKind::Removed => self.remove_path(path),
                }
            };
            touched += usize::from(applied);
        }
        if touched == 0 {
            return;
        }

        match self.rebuild() {
            Ok(()) => status_success(&format!("{} updated", plural_count(touched, "file"))),
            Err(e) => status_error("failed to rebuild manifests", &format!("{e:#}")),
        }
    }

    fn update_file(&self, path: &Path, kind: ChangeKind) -> bool {
        let Some(file) = self.globs.route_file(self.config.app_dir(), path) else {
            return false;
        };
        crate::debug!("watch"; "{} {}", kind.label(), file.relative);

        if kind == ChangeKind::Modified && file.extension().as_deref() == Some("md") {
            match read_front_matter(&file.path) {
                Ok(meta) => self.hmr.push(HmrEvent::MdMeta {
                    file_path: file.relative.clone(),
                    kind: file.kind,
                    meta,
                }),
                Err(e) => status_warning(&format!("{e:#}")),
            }
        }

        let relative = file.relative.clone();
        match self.routes.write().add(file) {
            Ok(_) => true,
            Err(e) => {
                status_warning(&format!("skipping {relative}: {e}"));
                false
            }
        }
    }

    /// Drop the route file at `path`, or every route file under it when a
    /// whole directory went away.
    fn remove_path(&self, path: &Path) -> bool {
        let mut routes = self.routes.write();
        let files: Vec<RouteFile> = routes
            .iter()
            .flat_map(|route| {
                RouteKind::ALL
                    .into_iter()
                    .filter_map(move |kind| route.slot(kind).map(|slot| slot.file.clone()))
            })
            .filter(|file| file.path.starts_with(path))
            .collect();

        for file in &files {
            crate::debug!("watch"; "removed {}", file.relative);
            routes.remove(file);
        }
        !files.is_empty()
    }
}

// ============================================================================
// request loop
// ============================================================================

/// Run the dev server until Ctrl+C.
pub fn serve(config: VesselConfig, runtime: Handle) -> Result<()> {
    let watch = config.serve.watch;
    let (interface, port) = (config.serve.interface, config.serve.port);
    let dev = Arc::new(DevServer::new(config, runtime)?);

    let (server, addr) = lifecycle::bind_with_retry(interface, port)?;
    let server = Arc::new(server);
    let (shutdown_tx, shutdown_rx) = channel::unbounded();
    register_server(Arc::clone(&server), shutdown_tx);

    let watcher = if watch {
        match watch::spawn_watcher(Arc::clone(&dev), shutdown_rx) {
            Ok(handle) => Some(handle),
            Err(e) => {
                crate::log!("watch"; "{:#}", e);
                None
            }
        }
    } else {
        None
    };

    crate::log!("serve"; "http://{}", addr);
    set_serving();
    run_request_loop(&server, &dev)?;
    lifecycle::wait_for_shutdown(watcher);
    Ok(())
}

fn run_request_loop(server: &Server, dev: &Arc<DevServer>) -> Result<()> {
    let pool = rayon::ThreadPoolBuilder::new()
        .num_threads(REQUEST_THREADS)
        .build()
        .context("failed to create request thread pool")?;

    for request in server.incoming_requests() {
        let dev = Arc::clone(dev);
        pool.spawn(move || {
            if let Err(e) = handle_request(request, &dev) {
                crate::log!("serve"; "request error: {e}");
            }
        });
    }
    Ok(())
}

fn handle_request(mut request: tiny_http::Request, dev: &DevServer) -> Result<()> {
    if crate::core::is_shutdown() || !crate::core::is_serving() {
        return response::send_unavailable(request);
    }

    let path = request
        .url()
        .split(['?', '#'])
        .next()
        .unwrap_or_default()
        .to_string();
    if let Some(name) = path.strip_prefix(VIRTUAL_PREFIX) {
        return handle_virtual(request, name, dev);
    }

    let method = request.method().clone();
    if matches!(method, Method::Get | Method::Head)
        && let Some(file) = response::resolve_file(dev.config.public_dir(), request.url())
    {
        return response::send_file(request, &file);
    }

    let req = response::read_request(&mut request)?;
    let res = dev.runtime.block_on(dev.dispatcher().handle(req));
    crate::debug!("serve"; "{} {} {}", method, request.url(), res.status);
    response::send(request, res)
}

fn handle_virtual(mut request: tiny_http::Request, name: &str, dev: &DevServer) -> Result<()> {
    match (request.method(), name) {
        (Method::Get, "manifest") => {
            let res = Response::new(200)
                .with_header("Content-Type", crate::utils::mime::JSON)
                .with_body(dev.client_manifest_json());
            response::send(request, res)
        }
        (Method::Get, "hmr") => response::send_json(request, &dev.hmr.drain(), 200),
        (Method::Post, "hmr") => {
            let req = response::read_request(&mut request)?;
            match req.json::<HmrEvent>() {
                Ok(HmrEvent::RouteChange { id }) => {
                    crate::debug!("hmr"; "client reloaded {}", id);
                    response::send(request, Response::new(204))
                }
                Ok(HmrEvent::MdMeta { file_path, .. }) => {
                    crate::debug!("hmr"; "client updated {}", file_path);
                    response::send(request, Response::new(204))
                }
                Err(e) => response::send(request, Response::text(format!("{e:#}"), 400)),
            }
        }
        _ => response::send(request, Response::not_found()),
    }
}
