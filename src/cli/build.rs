//! `vessel build`: scan, crawl, and hand the result to the adapter.

use std::sync::Arc;

use anyhow::{Context, Result, bail};

use crate::adapter::create_adapter;
use crate::build::{BuildData, build_app};
use crate::config::VesselConfig;
use crate::module::FileModuleLoader;
use crate::render::TemplateRenderer;
use crate::routing::AppRoutes;
use crate::utils::plural::plural_count;

/// Scan the app directory into a fresh route table.
///
/// A file that cannot join the table (e.g. a second page in one directory)
/// fails the scan.
pub fn load_routes(config: &VesselConfig) -> Result<AppRoutes> {
    let app_dir = config.app_dir();
    if !app_dir.is_dir() {
        bail!(
            "app directory `{}` not found",
            config.root_relative(app_dir).display()
        );
    }

    let globs = config.routes.globs()?;
    let matchers = config.routes.matchers()?;
    let mut routes = AppRoutes::new(matchers, Arc::new(FileModuleLoader));

    let files = globs.scan(app_dir);
    crate::debug!("routes"; "found {}", plural_count(files.len(), "route file"));
    for file in files {
        let relative = file.relative.clone();
        routes
            .add(file)
            .with_context(|| format!("failed to add route file `{relative}`"))?;
    }
    Ok(routes)
}

/// Build the app with the configured adapter.
pub async fn build(config: &VesselConfig) -> Result<BuildData> {
    let routes = load_routes(config)?;
    if routes.is_empty() {
        bail!(
            "no route files in `{}`",
            config.root_relative(config.app_dir()).display()
        );
    }

    let mut adapter = create_adapter(config.build.adapter, config);
    crate::log!(
        "build";
        "{} with the {} adapter",
        plural_count(routes.len(), "route"),
        config.build.adapter.as_str()
    );
    build_app(config, &routes, Arc::new(TemplateRenderer), adapter.as_mut()).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::RouteLogStyle;
    use std::fs;
    use tempfile::TempDir;

    fn write(dir: &TempDir, relative: &str, content: &str) {
        let path = dir.path().join(relative);
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(path, content).unwrap();
    }

    #[test]
    fn test_load_routes() {
        let dir = TempDir::new().unwrap();
        write(&dir, "app/page.md", "# Home");
        write(&dir, "app/blog/[slug]/page.html", "<p>post</p>");
        write(&dir, "app/api/http.toml", "[GET]\nbody = \"ok\"\n");

        let config = VesselConfig::with_root(dir.path());
        let routes = load_routes(&config).unwrap();
        let ids: Vec<_> = routes.iter().map(|r| r.id.as_str()).collect();
        assert_eq!(ids, vec!["/blog/[slug]", "/api", "/"]);
    }

    #[test]
    fn test_load_routes_missing_app_dir() {
        let dir = TempDir::new().unwrap();
        let config = VesselConfig::with_root(dir.path());
        let err = load_routes(&config).err().unwrap();
        assert!(err.to_string().contains("not found"));
    }

    #[test]
    fn test_load_routes_duplicate_slot() {
        let dir = TempDir::new().unwrap();
        write(&dir, "app/page.md", "# Home");
        write(&dir, "app/page.html", "<p>home</p>");

        let config = VesselConfig::with_root(dir.path());
        assert!(load_routes(&config).is_err());
    }

    #[tokio::test]
    async fn test_build_static() {
        let dir = TempDir::new().unwrap();
        write(&dir, "app/page.md", "# Home\n\nRead [about](/about/).");
        write(&dir, "app/about/page.md", "# About");

        let mut config = VesselConfig::with_root(dir.path());
        config.routes.log = RouteLogStyle::None;
        let data = build(&config).await.unwrap();

        assert_eq!(data.static_renders.len(), 2);
        assert!(config.build_dir().join("index.html").is_file());
        assert!(config.build_dir().join("about/index.html").is_file());
    }
}
