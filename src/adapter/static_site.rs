//! Plain static-file output.
//!
//! ```text
//! build/
//! ├── index.html, about/index.html, ...   # static pages
//! ├── old/index.html                      # redirect stubs
//! ├── _immutable/data/{hash}.json         # static data
//! ├── _immutable/manifest.json            # client manifest
//! ├── sitemap.xml                         # [build.sitemap]
//! └── ...                                 # public/ copied verbatim
//! ```

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use rayon::prelude::*;

use super::{AdapterContext, BuildAdapter};
use crate::build::BuildData;
use crate::generator::sitemap::build_sitemap;
use crate::logger::ProgressLine;
use crate::utils::fs::{OutputFile, copy_dir, write_file};
use crate::utils::plural::plural_count;

/// Client manifest location inside the output directory.
pub const MANIFEST_FILENAME: &str = "_immutable/manifest.json";

/// Writes pages, redirects and data files into `out_dir`.
#[derive(Debug, Clone)]
pub struct StaticAdapter {
    out_dir: PathBuf,
}

/// Output grouped the way the progress line counts it.
struct StaticOutput {
    pages: Vec<OutputFile>,
    redirects: Vec<OutputFile>,
    data: Vec<OutputFile>,
    extra: Vec<OutputFile>,
}

impl StaticAdapter {
    pub fn new(out_dir: impl Into<PathBuf>) -> Self {
        Self {
            out_dir: out_dir.into(),
        }
    }

    pub fn out_dir(&self) -> &Path {
        &self.out_dir
    }

    fn collect(&self, ctx: &AdapterContext, data: &BuildData) -> Result<StaticOutput> {
        let pages = data
            .static_renders
            .values()
            .map(|render| OutputFile::new(&render.filename, ctx.page_html(render, data)))
            .collect();

        let redirects = data
            .static_redirects
            .values()
            .map(|redirect| OutputFile::new(&redirect.filename, redirect.html.as_str()))
            .collect();

        let static_data = data
            .static_data
            .values()
            .map(|file| OutputFile::new(&file.filename, file.serialized.as_str()))
            .collect();

        let mut extra = vec![OutputFile::new(MANIFEST_FILENAME, ctx.client.to_json())];
        if let Some(sitemap) =
            build_sitemap(&ctx.config.build.sitemap, &ctx.server.base_url, data)?
        {
            extra.push(sitemap);
        }

        Ok(StaticOutput {
            pages,
            redirects,
            data: static_data,
            extra,
        })
    }
}

impl BuildAdapter for StaticAdapter {
    fn name(&self) -> &'static str {
        "static"
    }

    fn write(&self, ctx: &AdapterContext, data: &BuildData) -> Result<()> {
        let output = self.collect(ctx, data)?;
        fs::create_dir_all(&self.out_dir)
            .with_context(|| format!("failed to create {}", self.out_dir.display()))?;

        // Public files first so generated output wins on conflicts.
        let copied = copy_dir(ctx.config.public_dir(), &self.out_dir)?;
        crate::debug!("static"; "copied {}", plural_count(copied, "public file"));

        let progress = ProgressLine::new(&[
            ("pages", output.pages.len()),
            ("redirects", output.redirects.len()),
            ("data", output.data.len()),
        ]);
        let files: Vec<(&str, &OutputFile)> = [
            ("pages", &output.pages),
            ("redirects", &output.redirects),
            ("data", &output.data),
        ]
        .into_iter()
        .flat_map(|(name, files)| files.iter().map(move |file| (name, file)))
        .collect();
        let written = files.par_iter().try_for_each(|(name, file)| -> Result<()> {
            write_file(&self.out_dir.join(&file.filename), &file.content)?;
            progress.inc(name);
            Ok(())
        });
        progress.finish();
        written?;

        ctx.write_files(&self.out_dir, &output.extra)?;

        crate::debug!(
            "static";
            "wrote {}, {} and {} to {}",
            plural_count(output.pages.len(), "page"),
            plural_count(output.redirects.len(), "redirect"),
            plural_count(output.data.len(), "data file"),
            self.out_dir.display()
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapter::tests::{project, run};
    use crate::dispatch::{DATA_HASH_GLOBAL, REDIRECTS_GLOBAL};
    use jwalk::WalkDir;
    use std::collections::BTreeMap;
    use tempfile::TempDir;

    fn snapshot(dir: &Path) -> BTreeMap<PathBuf, Vec<u8>> {
        WalkDir::new(dir)
            .into_iter()
            .filter_map(Result::ok)
            .filter(|e| e.file_type().is_file())
            .map(|e| (e.path(), fs::read(e.path()).unwrap()))
            .collect()
    }

    fn site(dir: &TempDir) -> (crate::config::VesselConfig, crate::routing::AppRoutes) {
        project(
            dir,
            &[
                (
                    "page.html",
                    "+++\n[data]\ntitle = \"Home\"\n+++\n<h1>{{ data.title }}</h1><a href=\"/about/\">about</a><a href=\"/old/\">old</a>",
                ),
                (
                    "about/page.html",
                    "+++\n[data]\ntitle = \"Home\"\n+++\n<p>about</p>",
                ),
                ("old/page.html", "+++\n[redirect]\nto = \"/about/\"\nstatus = 301\n+++\n"),
            ],
        )
    }

    #[tokio::test]
    async fn test_static_write() {
        let dir = TempDir::new().unwrap();
        let (config, routes) = site(&dir);
        fs::create_dir_all(config.public_dir()).unwrap();
        fs::write(config.public_dir().join("robots.txt"), "User-agent: *").unwrap();

        let mut adapter = StaticAdapter::new(config.build_dir());
        let data = run(&config, &routes, &mut adapter).await;
        let out = config.build_dir();

        let index = fs::read_to_string(out.join("index.html")).unwrap();
        assert!(index.contains("<h1>Home</h1>"));
        assert!(index.contains(REDIRECTS_GLOBAL));
        assert!(index.contains(DATA_HASH_GLOBAL));
        assert!(out.join("about/index.html").is_file());

        let stub = fs::read_to_string(out.join("old/index.html")).unwrap();
        assert!(stub.contains(r#"content="0;url=/about/""#));

        // Both pages carry the same payload, so one data file is shared.
        assert_eq!(data.static_data.len(), 1);
        let file = data.static_data.values().next().unwrap();
        assert_eq!(
            fs::read_to_string(out.join(&file.filename)).unwrap(),
            r#"{"title":"Home"}"#
        );

        assert!(out.join(MANIFEST_FILENAME).is_file());
        assert_eq!(
            fs::read_to_string(out.join("robots.txt")).unwrap(),
            "User-agent: *"
        );
        assert!(!out.join("sitemap.xml").exists());
    }

    #[tokio::test]
    async fn test_static_write_is_idempotent() {
        let dir = TempDir::new().unwrap();
        let (config, routes) = site(&dir);

        let mut adapter = StaticAdapter::new(config.build_dir());
        let first_data = run(&config, &routes, &mut adapter).await;
        let first = snapshot(config.build_dir());

        let mut adapter = StaticAdapter::new(config.build_dir());
        let second_data = run(&config, &routes, &mut adapter).await;
        let second = snapshot(config.build_dir());

        assert_eq!(first_data.static_data_ids, second_data.static_data_ids);
        assert!(!first.is_empty());
        assert_eq!(first, second);
    }

    #[tokio::test]
    async fn test_static_write_sitemap() {
        let dir = TempDir::new().unwrap();
        let (mut config, routes) = site(&dir);
        config.build.sitemap.enable = true;
        config.build.sitemap.origin = Some("https://example.com".into());

        let mut adapter = StaticAdapter::new(config.build_dir());
        run(&config, &routes, &mut adapter).await;

        let xml = fs::read_to_string(config.build_dir().join("sitemap.xml")).unwrap();
        assert!(xml.contains("<loc>https://example.com/</loc>"));
        assert!(xml.contains("<loc>https://example.com/about/</loc>"));
        assert!(!xml.contains("/old/"));
    }
}
