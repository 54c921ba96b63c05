//! Discovering route files in the app directory.
//!
//! Each role has include globs and exclude rules, all relative to the app
//! directory. An exclude rule is a glob, or a regex when written `/.../`.

use std::path::Path;

use anyhow::{Context, Result};
use glob::{MatchOptions, Pattern};
use jwalk::WalkDir;
use regex::Regex;

use super::{RouteFile, RouteKind};

const MATCH_OPTIONS: MatchOptions = MatchOptions {
    case_sensitive: true,
    require_literal_separator: true,
    require_literal_leading_dot: false,
};

/// Directories never scanned for routes.
const IGNORED_DIRS: &[&str] = &["node_modules", ".git", ".vessel"];

/// Default include globs per role.
pub fn default_includes(kind: RouteKind) -> &'static [&'static str] {
    match kind {
        RouteKind::Page => &["**/page.html", "**/page.md"],
        RouteKind::Layout => &["**/layout.html", "**/layout.md"],
        RouteKind::Error => &["**/error.html", "**/error.md"],
        RouteKind::Http => &["**/http.toml"],
    }
}

#[derive(Debug, Clone)]
enum Exclude {
    Glob(Pattern),
    Regex(Regex),
}

impl Exclude {
    fn parse(rule: &str) -> Result<Self> {
        match rule.strip_prefix('/').and_then(|r| r.strip_suffix('/')) {
            Some(re) if !re.is_empty() => Regex::new(re)
                .map(Self::Regex)
                .with_context(|| format!("invalid exclude regex `{rule}`")),
            _ => Pattern::new(rule)
                .map(Self::Glob)
                .with_context(|| format!("invalid exclude glob `{rule}`")),
        }
    }

    fn matches(&self, relative: &str) -> bool {
        match self {
            Self::Glob(pattern) => pattern.matches_with(relative, MATCH_OPTIONS),
            Self::Regex(re) => re.is_match(relative),
        }
    }
}

#[derive(Debug, Clone)]
struct RoleRules {
    kind: RouteKind,
    include: Vec<Pattern>,
    exclude: Vec<Exclude>,
}

/// Include/exclude rules for all four roles.
#[derive(Debug, Clone)]
pub struct RouteGlobs {
    rules: Vec<RoleRules>,
}

impl Default for RouteGlobs {
    fn default() -> Self {
        let rules = RouteKind::ALL
            .into_iter()
            .map(|kind| RoleRules {
                kind,
                include: default_includes(kind)
                    .iter()
                    .filter_map(|glob| Pattern::new(glob).ok())
                    .collect(),
                exclude: Vec::new(),
            })
            .collect();
        Self { rules }
    }
}

impl RouteGlobs {
    /// Replace the rules for `kind`. Empty `include` keeps the defaults.
    pub fn set(&mut self, kind: RouteKind, include: &[String], exclude: &[String]) -> Result<()> {
        let include = if include.is_empty() {
            default_includes(kind)
                .iter()
                .map(|glob| Pattern::new(glob))
                .collect::<Result<Vec<_>, _>>()?
        } else {
            include
                .iter()
                .map(|glob| {
                    Pattern::new(glob).with_context(|| format!("invalid {kind} include glob `{glob}`"))
                })
                .collect::<Result<Vec<_>>>()?
        };
        let exclude = exclude
            .iter()
            .map(|rule| Exclude::parse(rule))
            .collect::<Result<Vec<_>>>()?;

        if let Some(rules) = self.rules.iter_mut().find(|r| r.kind == kind) {
            rules.include = include;
            rules.exclude = exclude;
        }
        Ok(())
    }

    /// Role of the file at app-relative path `relative`, if it is a route file.
    pub fn classify(&self, relative: &str) -> Option<RouteKind> {
        self.rules
            .iter()
            .find(|rules| {
                rules
                    .include
                    .iter()
                    .any(|p| p.matches_with(relative, MATCH_OPTIONS))
                    && !rules.exclude.iter().any(|e| e.matches(relative))
            })
            .map(|rules| rules.kind)
    }

    /// Route file for an absolute `path`, if it is one.
    pub fn route_file(&self, app_dir: &Path, path: &Path) -> Option<RouteFile> {
        let relative = path.strip_prefix(app_dir).ok()?;
        let relative = relative.to_string_lossy().replace('\\', "/");
        if relative
            .split('/')
            .any(|segment| IGNORED_DIRS.contains(&segment))
        {
            return None;
        }
        let kind = self.classify(&relative)?;
        RouteFile::new(app_dir, path, kind)
    }

    /// Every route file under `app_dir`, sorted by relative path.
    pub fn scan(&self, app_dir: &Path) -> Vec<RouteFile> {
        let mut files: Vec<_> = WalkDir::new(app_dir)
            .into_iter()
            .filter_map(Result::ok)
            .filter(|e| e.file_type().is_file())
            .filter_map(|e| self.route_file(app_dir, &e.path()))
            .collect();
        files.sort_by(|a, b| a.relative.cmp(&b.relative));
        files
    }
}
