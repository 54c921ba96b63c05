//! Sitemap generation.
//!
//! Lists every statically rendered page for search engine indexing.
//!
//! # Sitemap Format
//!
//! ```xml
//! <?xml version="1.0" encoding="UTF-8"?>
//! <urlset xmlns="http://www.sitemaps.org/schemas/sitemap/0.9">
//!   <url>
//!     <loc>https://example.com/</loc>
//!     <changefreq>weekly</changefreq>
//!     <priority>0.7</priority>
//!   </url>
//! </urlset>
//! ```

use std::borrow::Cow;

use anyhow::{Context, Result};
use glob::Pattern;

use crate::build::BuildData;
use crate::config::SitemapConfig;
use crate::utils::fs::OutputFile;

const SITEMAP_NS: &str = "http://www.sitemaps.org/schemas/sitemap/0.9";

/// Sitemap file for `data`, or `None` when disabled.
///
/// `base_path` is the app's base URL path, prefixed to every pathname.
pub fn build_sitemap(
    config: &SitemapConfig,
    base_path: &str,
    data: &BuildData,
) -> Result<Option<OutputFile>> {
    if !config.enable {
        return Ok(None);
    }
    let sitemap = Sitemap::build(config, base_path, data)?;
    Ok(Some(OutputFile::new(
        config.filename.trim_start_matches('/'),
        sitemap.into_xml(),
    )))
}

struct Sitemap {
    urls: Vec<UrlEntry>,
}

struct UrlEntry {
    loc: String,
    changefreq: Option<String>,
    priority: Option<f32>,
}

fn compile(globs: &[String]) -> Result<Vec<Pattern>> {
    globs
        .iter()
        .map(|glob| Pattern::new(glob).with_context(|| format!("invalid sitemap glob `{glob}`")))
        .collect()
}

impl Sitemap {
    fn build(config: &SitemapConfig, base_path: &str, data: &BuildData) -> Result<Self> {
        let include = compile(&config.include)?;
        let exclude = compile(&config.exclude)?;
        let origin = config
            .origin
            .as_deref()
            .unwrap_or_default()
            .trim_end_matches('/');
        let base = base_path.trim_end_matches('/');

        let urls = data
            .static_renders
            .values()
            .filter(|render| {
                let pathname = render.pathname.as_str();
                (include.is_empty() || include.iter().any(|p| p.matches(pathname)))
                    && !exclude.iter().any(|p| p.matches(pathname))
            })
            .map(|render| UrlEntry {
                loc: format!("{origin}{base}{}", render.pathname.to_encoded()),
                changefreq: config.changefreq.clone(),
                priority: config.priority,
            })
            .collect();

        Ok(Self { urls })
    }

    fn into_xml(self) -> String {
        let mut xml = String::with_capacity(4096);

        xml.push_str("<?xml version=\"1.0\" encoding=\"UTF-8\"?>\n");
        xml.push_str("<urlset xmlns=\"");
        xml.push_str(SITEMAP_NS);
        xml.push_str("\">\n");

        for entry in self.urls {
            xml.push_str("  <url>\n    <loc>");
            xml.push_str(&escape_xml(&entry.loc));
            xml.push_str("</loc>\n");
            if let Some(changefreq) = entry.changefreq {
                xml.push_str("    <changefreq>");
                xml.push_str(&escape_xml(&changefreq));
                xml.push_str("</changefreq>\n");
            }
            if let Some(priority) = entry.priority {
                xml.push_str(&format!("    <priority>{priority:.1}</priority>\n"));
            }
            xml.push_str("  </url>\n");
        }

        xml.push_str("</urlset>\n");
        xml
    }
}

/// Escape special XML characters.
fn escape_xml(s: &str) -> Cow<'_, str> {
    if !s.contains(['&', '<', '>', '"', '\'']) {
        return Cow::Borrowed(s);
    }

    Cow::Owned(
        s.replace('&', "&amp;")
            .replace('<', "&lt;")
            .replace('>', "&gt;")
            .replace('"', "&quot;")
            .replace('\'', "&apos;"),
    )
}
