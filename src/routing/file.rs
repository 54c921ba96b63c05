//! Route files and their roles.
//!
//! A [`RouteFile`] is one physical file that contributes a single role
//! (layout, page, error or http) to the directory that contains it.

use std::fmt;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

/// Role a file plays inside its route directory.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RouteKind {
    Layout,
    Page,
    Error,
    Http,
}

impl RouteKind {
    /// All kinds, in slot order.
    pub const ALL: [Self; 4] = [Self::Layout, Self::Error, Self::Page, Self::Http];

    /// Kinds that are rendered on the client.
    pub const CLIENT: [Self; 3] = [Self::Layout, Self::Error, Self::Page];

    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Layout => "layout",
            Self::Page => "page",
            Self::Error => "error",
            Self::Http => "http",
        }
    }

    /// Whether a file of this kind makes its route client-facing.
    #[inline]
    pub const fn is_client(self) -> bool {
        !matches!(self, Self::Http)
    }
}

impl fmt::Display for RouteKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One source file attached to a route directory.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct RouteFile {
    /// Absolute path on disk.
    pub path: PathBuf,
    /// Path relative to the app directory, `/`-separated (`blog/[slug]/page.md`).
    pub relative: String,
    /// Route string of the owning directory (`/blog/[slug]`, `/` for the app root).
    pub route: String,
    pub kind: RouteKind,
}

impl RouteFile {
    /// Describe `path` as a route file of `kind` under `app_dir`.
    ///
    /// Returns `None` when `path` is not inside `app_dir`.
    pub fn new(app_dir: &Path, path: &Path, kind: RouteKind) -> Option<Self> {
        let relative = path.strip_prefix(app_dir).ok()?;
        let relative = relative
            .components()
            .map(|c| c.as_os_str().to_string_lossy())
            .collect::<Vec<_>>()
            .join("/");
        if relative.is_empty() {
            return None;
        }

        let route = route_of(&relative);
        Some(Self {
            path: path.to_path_buf(),
            relative,
            route,
            kind,
        })
    }

    /// Build a file from an app-relative path (mostly useful in tests and
    /// for virtual files).
    pub fn from_relative(app_dir: &Path, relative: &str, kind: RouteKind) -> Self {
        let relative = relative.trim_start_matches('/').to_string();
        Self {
            path: app_dir.join(&relative),
            route: route_of(&relative),
            relative,
            kind,
        }
    }

    /// Final path component.
    pub fn file_name(&self) -> &str {
        self.relative.rsplit('/').next().unwrap_or(&self.relative)
    }

    /// Lowercased extension, if any.
    pub fn extension(&self) -> Option<String> {
        self.path
            .extension()
            .map(|ext| ext.to_string_lossy().to_ascii_lowercase())
    }
}

/// Route string of the directory holding `relative`.
fn route_of(relative: &str) -> String {
    match relative.rsplit_once('/') {
        Some((dir, _)) => format!("/{dir}"),
        None => "/".to_string(),
    }
}
