//! `[routes]` section configuration.
//!
//! # Example
//!
//! ```toml
//! [routes]
//! entries = ["/", "/blog/"]   # Crawl starting points
//! trailing_slash = true       # `/about/` instead of `/about`
//! log = "tree"                # none | list | tree
//! log_level = "warn"          # info | warn | error
//!
//! [[routes.matchers]]
//! name = "int"
//! pattern = '\d+'
//!
//! [routes.pages]
//! include = ["**/page.md"]
//! exclude = ["drafts/**", '/(^|/)_/']
//! ```

use serde::{Deserialize, Serialize};

use crate::config::{ConfigDiagnostics, FieldPath};
use crate::routing::{RouteError, RouteGlobs, RouteKind, RouteMatchers};

/// How the route report is printed when a build finishes.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RouteLogStyle {
    None,
    List,
    #[default]
    Tree,
}

/// How much the route report includes.
///
/// - `info`: every static page, redirect and bad link
/// - `warn`: redirects and bad links
/// - `error`: bad links only
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RouteLogLevel {
    Info,
    #[default]
    Warn,
    Error,
}

/// A named regex substituted for `[name]` placeholders in route paths.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MatcherConfig {
    pub name: String,
    pub pattern: String,
}

/// Include/exclude rules for one route role, relative to the app directory.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RouteGlobConfig {
    /// Globs. Empty keeps the built-in defaults.
    pub include: Vec<String>,
    /// Globs, or regexes written as `/.../`.
    pub exclude: Vec<String>,
}

/// Routing settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RoutesConfig {
    /// Pathnames the build crawl starts from.
    pub entries: Vec<String>,
    pub trailing_slash: bool,
    pub log: RouteLogStyle,
    pub log_level: RouteLogLevel,
    pub matchers: Vec<MatcherConfig>,
    pub pages: RouteGlobConfig,
    pub layouts: RouteGlobConfig,
    pub errors: RouteGlobConfig,
    pub http: RouteGlobConfig,
}

impl Default for RoutesConfig {
    fn default() -> Self {
        Self {
            entries: vec!["/".into()],
            trailing_slash: true,
            log: RouteLogStyle::default(),
            log_level: RouteLogLevel::default(),
            matchers: Vec::new(),
            pages: RouteGlobConfig::default(),
            layouts: RouteGlobConfig::default(),
            errors: RouteGlobConfig::default(),
            http: RouteGlobConfig::default(),
        }
    }
}

impl RoutesConfig {
    pub fn glob_config(&self, kind: RouteKind) -> &RouteGlobConfig {
        match kind {
            RouteKind::Page => &self.pages,
            RouteKind::Layout => &self.layouts,
            RouteKind::Error => &self.errors,
            RouteKind::Http => &self.http,
        }
    }

    /// Compiled include/exclude rules for every role.
    pub fn globs(&self) -> anyhow::Result<RouteGlobs> {
        let mut globs = RouteGlobs::default();
        for kind in RouteKind::ALL {
            let rules = self.glob_config(kind);
            globs.set(kind, &rules.include, &rules.exclude)?;
        }
        Ok(globs)
    }

    /// Compiled matcher set.
    pub fn matchers(&self) -> Result<RouteMatchers, RouteError> {
        let mut matchers = RouteMatchers::new();
        for matcher in &self.matchers {
            matchers.push(&matcher.name, &matcher.pattern)?;
        }
        Ok(matchers)
    }

    pub(crate) fn validate(&self, diag: &mut ConfigDiagnostics) {
        if self.entries.is_empty() {
            diag.error_with_hint(
                FieldPath::new("routes.entries"),
                "no crawl entries",
                "add at least \"/\"",
            );
        }
        for entry in &self.entries {
            if !entry.starts_with('/') {
                diag.error(
                    FieldPath::new("routes.entries"),
                    format!("entry `{entry}` must start with `/`"),
                );
            }
        }

        if let Err(e) = self.matchers() {
            diag.error(FieldPath::new("routes.matchers"), e.to_string());
        }

        if let Err(e) = self.globs() {
            diag.error(FieldPath::new("routes"), format!("{e:#}"));
        }
    }
}
