//! Module loading and per-slot memoization.

use std::fmt;
use std::sync::Arc;

use anyhow::{Result, anyhow};
use futures::future::BoxFuture;
use parking_lot::RwLock;
use rustc_hash::FxHashMap;
use tokio::sync::OnceCell;

use super::RouteModule;
use crate::routing::RouteFile;

/// Produces the [`RouteModule`] for a route file.
pub trait ModuleLoader: Send + Sync {
    fn load<'a>(&'a self, file: &'a RouteFile) -> BoxFuture<'a, Result<RouteModule>>;
}

/// Deferred, memoized module for one role slot.
///
/// Clones share the same cell, so the underlying loader runs at most once
/// successfully per slot. A failed load is not cached and will be retried.
#[derive(Clone)]
pub struct LazyModule {
    file: RouteFile,
    loader: Arc<dyn ModuleLoader>,
    cell: Arc<OnceCell<Arc<RouteModule>>>,
}

impl LazyModule {
    pub fn new(file: RouteFile, loader: Arc<dyn ModuleLoader>) -> Self {
        Self {
            file,
            loader,
            cell: Arc::new(OnceCell::new()),
        }
    }

    pub fn file(&self) -> &RouteFile {
        &self.file
    }

    /// Load the module, or return the cached one.
    pub async fn get(&self) -> Result<Arc<RouteModule>> {
        self.cell
            .get_or_try_init(|| async {
                self.loader.load(&self.file).await.map(Arc::new)
            })
            .await
            .cloned()
    }

    /// The module if it has already been loaded.
    pub fn loaded(&self) -> Option<Arc<RouteModule>> {
        self.cell.get().cloned()
    }
}

impl fmt::Debug for LazyModule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LazyModule")
            .field("file", &self.file.relative)
            .field("loaded", &self.cell.initialized())
            .finish()
    }
}

/// Loader backed by modules registered in memory, keyed by app-relative path.
///
/// Lets route modules be written in Rust instead of files on disk; anything
/// not registered falls through to `fallback` when one is set.
#[derive(Default)]
pub struct MemoryModuleLoader {
    modules: RwLock<FxHashMap<String, RouteModule>>,
    fallback: Option<Arc<dyn ModuleLoader>>,
}

impl MemoryModuleLoader {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_fallback(fallback: Arc<dyn ModuleLoader>) -> Self {
        Self {
            modules: RwLock::default(),
            fallback: Some(fallback),
        }
    }

    /// Register `module` for the file at `relative` (e.g. `blog/[slug]/page.md`).
    pub fn insert(&self, relative: &str, module: RouteModule) {
        self.modules
            .write()
            .insert(relative.trim_start_matches('/').to_string(), module);
    }
}

impl ModuleLoader for MemoryModuleLoader {
    fn load<'a>(&'a self, file: &'a RouteFile) -> BoxFuture<'a, Result<RouteModule>> {
        Box::pin(async move {
            let registered = self.modules.read().get(&file.relative).cloned();
            match (registered, &self.fallback) {
                (Some(module), _) => Ok(module),
                (None, Some(fallback)) => fallback.load(file).await,
                (None, None) => Err(anyhow!("no module registered for `{}`", file.relative)),
            }
        })
    }
}
