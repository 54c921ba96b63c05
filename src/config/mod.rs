//! Project configuration for `vessel.toml`.
//!
//! # Module Structure
//!
//! ```text
//! config/
//! ├── section/       # Configuration section definitions
//! │   ├── app        # [app]
//! │   ├── build      # [build], [build.sitemap], [build.vercel]
//! │   ├── routes     # [routes]
//! │   └── serve      # [serve]
//! ├── types/         # ConfigError, ConfigDiagnostics, FieldPath
//! └── mod.rs         # VesselConfig (this file)
//! ```
//!
//! A missing config file is not an error: every field has a default, so an
//! `app/` directory next to the working directory is a complete project.

pub mod section;
pub mod types;
mod util;

use util::{extract_url_path, find_config_file, normalize_path};

pub use section::{
    AdapterKind, AppConfig, BuildConfig, MatcherConfig, RouteGlobConfig, RouteLogLevel,
    RouteLogStyle, RoutesConfig, ServeConfig, SitemapConfig, VercelConfig,
};
pub use types::{ConfigDiagnostic, ConfigDiagnostics, ConfigError, FieldPath};

use crate::cli::{BuildArgs, Cli, Commands};
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::{
    fs,
    path::{Path, PathBuf},
};

// ============================================================================
// root configuration
// ============================================================================

/// Root configuration structure representing vessel.toml
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct VesselConfig {
    /// Absolute path to the config file (internal use only)
    #[serde(skip)]
    pub config_path: PathBuf,

    /// Absolute project root (internal use only)
    #[serde(skip)]
    pub root: PathBuf,

    #[serde(default)]
    pub app: AppConfig,

    #[serde(default)]
    pub routes: RoutesConfig,

    #[serde(default)]
    pub build: BuildConfig,

    #[serde(default)]
    pub serve: ServeConfig,
}

impl VesselConfig {
    /// Load configuration for the given CLI invocation.
    ///
    /// With `--root`, the config is looked up inside that directory only;
    /// otherwise it is searched upward from the working directory.
    pub fn load(cli: &Cli) -> Result<Self> {
        let cwd = std::env::current_dir().context("Failed to get current working directory")?;

        let config_path = match &cli.root {
            Some(root) => Some(normalize_path(root).join(&cli.config)).filter(|p| p.exists()),
            None => find_config_file(&cli.config),
        };

        let mut config = match &config_path {
            Some(path) => Self::from_path(path)?,
            None => {
                crate::debug!("config"; "no {} found, using defaults", cli.config.display());
                Self::default()
            }
        };

        let base = match (&config_path, &cli.root) {
            (Some(path), _) => path.parent().map(Path::to_path_buf).unwrap_or_default(),
            (None, Some(root)) => root.clone(),
            (None, None) => cwd.clone(),
        };
        config.config_path = config_path.unwrap_or_else(|| base.join(&cli.config));
        config.finalize(&base, cli);
        config.validate()?;
        Ok(config)
    }

    /// Config rooted at `root` with defaults everywhere, as if no file existed.
    pub fn with_root(root: &Path) -> Self {
        let mut config = Self::default();
        config.normalize_paths(root);
        config
    }

    /// Load configuration from file path with unknown field detection.
    pub fn from_path(path: &Path) -> Result<Self> {
        let content =
            fs::read_to_string(path).map_err(|err| ConfigError::Io(path.to_path_buf(), err))?;

        let (config, ignored) = Self::parse_with_ignored(&content)?;
        if !ignored.is_empty() {
            Self::print_unknown_fields_warning(&ignored, path);
        }
        Ok(config)
    }

    /// Parse TOML content, collecting any unknown fields.
    fn parse_with_ignored(content: &str) -> Result<(Self, Vec<String>)> {
        let mut ignored = Vec::new();
        let deserializer = toml::Deserializer::new(content);
        let config = serde_ignored::deserialize(deserializer, |path: serde_ignored::Path| {
            ignored.push(path.to_string());
        })
        .map_err(ConfigError::Toml)?;
        Ok((config, ignored))
    }

    fn print_unknown_fields_warning(fields: &[String], path: &Path) {
        let display_path = path
            .file_name()
            .map(|n| n.to_string_lossy())
            .unwrap_or_else(|| path.to_string_lossy());
        crate::log!("warn"; "unknown fields in {}, ignoring:", display_path);
        for field in fields {
            eprintln!("- {field}");
        }
    }

    fn finalize(&mut self, base: &Path, cli: &Cli) {
        let root = base.join(&self.app.root);
        self.normalize_paths(&root);
        self.apply_command_options(cli);
        self.sync_base_url();
    }

    /// Accept a full URL as `base_url` and keep only its path.
    fn sync_base_url(&mut self) {
        if let Some(path) = extract_url_path(&self.app.base_url) {
            self.app.base_url = if path.is_empty() {
                "/".into()
            } else {
                format!("/{path}/")
            };
        }
    }

    // ========================================================================
    // paths
    // ========================================================================

    pub fn get_root(&self) -> &Path {
        &self.root
    }

    /// Join a path with the root directory.
    pub fn root_join(&self, path: impl AsRef<Path>) -> PathBuf {
        self.root.join(path)
    }

    /// Get path relative to the project root
    pub fn root_relative(&self, path: impl AsRef<Path>) -> PathBuf {
        path.as_ref()
            .strip_prefix(&self.root)
            .map(Path::to_path_buf)
            .unwrap_or_else(|_| path.as_ref().to_path_buf())
    }

    pub fn app_dir(&self) -> &Path {
        &self.app.dir
    }

    pub fn public_dir(&self) -> &Path {
        &self.app.public
    }

    pub fn build_dir(&self) -> &Path {
        &self.app.build
    }

    /// Normalize all paths relative to the project root.
    fn normalize_paths(&mut self, root: &Path) {
        let root = normalize_path(root);
        self.app.dir = normalize_path(&root.join(&self.app.dir));
        self.app.public = normalize_path(&root.join(&self.app.public));
        self.app.build = normalize_path(&root.join(&self.app.build));
        if let Some(template) = self.app.template.take() {
            self.app.template = Some(normalize_path(&root.join(template)));
        }
        self.root = root;
    }

    // ========================================================================
    // cli configuration updates
    // ========================================================================

    fn apply_command_options(&mut self, cli: &Cli) {
        crate::logger::set_verbose(cli.verbose);
        match &cli.command {
            Commands::Build { build_args } => self.apply_build_args(build_args),
            Commands::Dev {
                interface,
                port,
                watch,
            } => {
                Self::update_option(&mut self.serve.interface, interface.as_ref());
                Self::update_option(&mut self.serve.port, port.as_ref());
                Self::update_option(&mut self.serve.watch, watch.as_ref());
            }
            Commands::Routes { .. } => {}
        }
    }

    pub fn apply_build_args(&mut self, args: &BuildArgs) {
        Self::update_option(&mut self.build.adapter, args.adapter.as_ref());
        Self::update_option(&mut self.build.concurrency, args.concurrency.as_ref());
        if args.no_trailing_slash {
            self.routes.trailing_slash = false;
        }
    }

    /// Update config option if CLI value is provided.
    fn update_option<T: Clone>(config_option: &mut T, cli_option: Option<&T>) {
        if let Some(option) = cli_option {
            *config_option = option.clone();
        }
    }

    // ========================================================================
    // validation
    // ========================================================================

    /// Validate every section, reporting all errors at once.
    pub fn validate(&self) -> Result<()> {
        let mut diag = ConfigDiagnostics::new();
        self.app.validate(&mut diag);
        self.routes.validate(&mut diag);
        self.build.validate(&mut diag);

        if let Some(template) = &self.app.template
            && !template.is_file()
        {
            diag.error(
                FieldPath::new("app.template"),
                format!("`{}` does not exist", self.root_relative(template).display()),
            );
        }

        diag.into_result()
            .map_err(|e| ConfigError::Diagnostics(e).into())
    }
}

// ============================================================================
// Test Helpers (available to all modules via `use crate::config::test_*`)
// ============================================================================

/// Parse config, panicking on unknown fields to catch typos in tests.
#[cfg(test)]
pub fn test_parse_config(content: &str) -> VesselConfig {
    let (parsed, ignored) = VesselConfig::parse_with_ignored(content).unwrap();
    assert!(
        ignored.is_empty(),
        "test config has unknown fields: {:?}",
        ignored
    );
    parsed
}

// ============================================================================
// tests
// ============================================================================
