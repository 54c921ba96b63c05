//! Anchor extraction from rendered pages.

use crate::core::{LinkKind, UrlPath};

/// Internal link targets of every `<a href>` in `html`, resolved against the
/// page at `base`. External, fragment-only and unparsable links are dropped;
/// query strings and fragments are stripped.
pub fn extract_links(html: &str, base: &UrlPath) -> Vec<UrlPath> {
    let Ok(dom) = tl::parse(html, tl::ParserOptions::default()) else {
        return Vec::new();
    };

    let mut links = Vec::new();
    for node in dom.nodes() {
        let Some(tag) = node.as_tag() else {
            continue;
        };
        if !tag.name().as_utf8_str().eq_ignore_ascii_case("a") {
            continue;
        }
        let Some(Some(href)) = tag.attributes().get("href") else {
            continue;
        };
        let href = href.as_utf8_str().replace("&amp;", "&");
        if let Some(link) = resolve_link(href.trim(), base) {
            links.push(link);
        }
    }
    links
}

/// Resolve one `href` against `base`, or `None` if it leaves the site.
pub fn resolve_link(href: &str, base: &UrlPath) -> Option<UrlPath> {
    if href.is_empty() {
        return None;
    }
    match LinkKind::parse(href) {
        LinkKind::SiteRoot(link) => Some(UrlPath::from_browser(link)),
        LinkKind::FileRelative(link) => base.join(link),
        LinkKind::External(_) | LinkKind::Fragment(_) => None,
    }
}
