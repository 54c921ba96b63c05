//! `[app]` section configuration.
//!
//! # Example
//!
//! ```toml
//! [app]
//! dir = "app"                 # Route files (pages, layouts, errors, http)
//! public = "public"           # Copied verbatim into the output
//! build = "build"             # Output directory
//! base_url = "/"              # Prefix for every URL the app serves
//! template = "index.html"     # Optional document template
//! ```

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::config::{ConfigDiagnostics, FieldPath};

/// Project directory layout.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    /// Project root, relative to the config file.
    pub root: PathBuf,
    /// App directory containing route files.
    pub dir: PathBuf,
    /// Static files served and copied as-is.
    pub public: PathBuf,
    /// Build output directory.
    pub build: PathBuf,
    pub base_url: String,
    /// HTML document template. The built-in document is used when unset.
    pub template: Option<PathBuf>,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            root: ".".into(),
            dir: "app".into(),
            public: "public".into(),
            build: "build".into(),
            base_url: "/".into(),
            template: None,
        }
    }
}

impl AppConfig {
    pub(crate) fn validate(&self, diag: &mut ConfigDiagnostics) {
        if !self.base_url.starts_with('/') {
            diag.error_with_hint(
                FieldPath::new("app.base_url"),
                format!("`{}` is not an absolute path", self.base_url),
                "use a path such as \"/\" or \"/docs/\"",
            );
        }
    }

    /// Base URL with exactly one trailing slash.
    pub fn base_path(&self) -> String {
        format!("{}/", self.base_url.trim_end_matches('/'))
    }
}
