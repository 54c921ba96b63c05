//! `[build]` section configuration.
//!
//! # Example
//!
//! ```toml
//! [build]
//! adapter = "static"                   # static | vercel
//! concurrency = 8                      # Pages rendered at once
//! client_entry = "/_immutable/entry.js"
//! stylesheet = "/_immutable/app.css"
//!
//! [build.sitemap]
//! enable = true
//! origin = "https://example.com"
//! changefreq = "weekly"
//! priority = 0.7
//! exclude = ["/drafts/**"]
//!
//! [build.vercel]
//! runtime = "nodejs20.x"
//! max_duration = 10
//! regions = ["iad1"]
//! spa_fallback = false
//! ```

use clap::ValueEnum;
use serde::{Deserialize, Serialize};

use crate::config::{ConfigDiagnostics, FieldPath};

/// Deployment target that writes the build output.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum AdapterKind {
    #[default]
    Static,
    Vercel,
}

impl AdapterKind {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Static => "static",
            Self::Vercel => "vercel",
        }
    }
}

/// Build settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BuildConfig {
    pub adapter: AdapterKind,
    /// Upper bound on pages rendered concurrently during the crawl.
    pub concurrency: usize,
    /// Client entry module injected into every page.
    pub client_entry: String,
    /// Stylesheet linked from every page.
    pub stylesheet: Option<String>,
    pub sitemap: SitemapConfig,
    pub vercel: VercelConfig,
}

impl Default for BuildConfig {
    fn default() -> Self {
        Self {
            adapter: AdapterKind::default(),
            concurrency: default_concurrency(),
            client_entry: "/_immutable/entry.js".into(),
            stylesheet: None,
            sitemap: SitemapConfig::default(),
            vercel: VercelConfig::default(),
        }
    }
}

fn default_concurrency() -> usize {
    std::thread::available_parallelism().map_or(4, |n| n.get())
}

impl BuildConfig {
    pub(crate) fn validate(&self, diag: &mut ConfigDiagnostics) {
        if self.concurrency == 0 {
            diag.error(
                FieldPath::new("build.concurrency"),
                "must be greater than 0",
            );
        }
        if !self.client_entry.starts_with('/') {
            diag.error(
                FieldPath::new("build.client_entry"),
                format!("`{}` must start with `/`", self.client_entry),
            );
        }
        self.sitemap.validate(diag);
    }
}

// ============================================================================
// [build.sitemap]
// ============================================================================

/// Sitemap generation.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SitemapConfig {
    pub enable: bool,
    /// Absolute origin prefixed to every `<loc>`.
    pub origin: Option<String>,
    /// Output path, relative to the build directory.
    pub filename: String,
    pub changefreq: Option<String>,
    pub priority: Option<f32>,
    /// Pathname globs to include. Empty includes every static page.
    pub include: Vec<String>,
    pub exclude: Vec<String>,
}

impl Default for SitemapConfig {
    fn default() -> Self {
        Self {
            enable: false,
            origin: None,
            filename: "sitemap.xml".into(),
            changefreq: None,
            priority: None,
            include: Vec::new(),
            exclude: Vec::new(),
        }
    }
}

const CHANGEFREQ: &[&str] = &[
    "always", "hourly", "daily", "weekly", "monthly", "yearly", "never",
];

impl SitemapConfig {
    fn validate(&self, diag: &mut ConfigDiagnostics) {
        if !self.enable {
            return;
        }
        match &self.origin {
            None => diag.error_with_hint(
                FieldPath::new("build.sitemap.origin"),
                "required when the sitemap is enabled",
                "set it to your site's origin, e.g. \"https://example.com\"",
            ),
            Some(origin) if url::Url::parse(origin).is_err() => diag.error(
                FieldPath::new("build.sitemap.origin"),
                format!("`{origin}` is not a valid URL"),
            ),
            Some(_) => {}
        }
        if let Some(freq) = &self.changefreq
            && !CHANGEFREQ.contains(&freq.as_str())
        {
            diag.error_with_hint(
                FieldPath::new("build.sitemap.changefreq"),
                format!("unknown value `{freq}`"),
                CHANGEFREQ.join(", "),
            );
        }
        if let Some(priority) = self.priority
            && !(0.0..=1.0).contains(&priority)
        {
            diag.error(
                FieldPath::new("build.sitemap.priority"),
                "must be between 0.0 and 1.0",
            );
        }
        for glob in self.include.iter().chain(&self.exclude) {
            if glob::Pattern::new(glob).is_err() {
                diag.error(
                    FieldPath::new("build.sitemap"),
                    format!("invalid glob `{glob}`"),
                );
            }
        }
    }
}

// ============================================================================
// [build.vercel]
// ============================================================================

/// Vercel Build Output API settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct VercelConfig {
    /// Runtime for serverless functions.
    pub runtime: String,
    /// Runtime for routes that export `edge = true`.
    pub edge_runtime: String,
    /// Serverless function timeout in seconds.
    pub max_duration: Option<u32>,
    pub regions: Vec<String>,
    /// Route unmatched requests to `/index.html`.
    pub spa_fallback: bool,
}

impl Default for VercelConfig {
    fn default() -> Self {
        Self {
            runtime: "nodejs20.x".into(),
            edge_runtime: "edge".into(),
            max_duration: None,
            regions: Vec::new(),
            spa_fallback: false,
        }
    }
}
