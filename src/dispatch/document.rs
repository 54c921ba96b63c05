//! Composing the final HTML document for a rendered page.
//!
//! Tables the client router needs are embedded as globals holding
//! double-JSON-encoded strings (`JSON.parse("...")`), which parse faster
//! than object literals.

use std::collections::BTreeMap;

use serde::Serialize;
use serde_json::Value;

use super::StaticDataEntry;
use crate::http::Redirect;
use crate::manifest::DocumentManifest;
use crate::render::{RenderOutput, compose_document, escape_html};

pub const STATIC_DATA_GLOBAL: &str = "__VSL_STATIC_DATA__";
pub const REDIRECTS_GLOBAL: &str = "__VSL_STATIC_REDIRECTS_MAP__";
pub const DATA_HASH_GLOBAL: &str = "__VSL_STATIC_DATA_HASH_MAP__";
pub const TRAILING_SLASH_GLOBAL: &str = "__VSL_TRAILING_SLASH__";

/// Site-wide tables embedded in every document.
#[derive(Debug, Clone, Copy)]
pub struct DocumentTables<'a> {
    /// Pathname to redirect.
    pub redirects: Option<&'a BTreeMap<String, Redirect>>,
    /// Static data id hash to content hash.
    pub data_hashes: Option<&'a BTreeMap<String, String>>,
    pub trailing_slash: bool,
}

impl Default for DocumentTables<'_> {
    fn default() -> Self {
        Self {
            redirects: None,
            data_hashes: None,
            trailing_slash: true,
        }
    }
}

/// Fill `document.template` with the page's head, markup and scripts.
pub fn page_document(
    document: &DocumentManifest,
    output: &RenderOutput,
    static_data: &[StaticDataEntry],
    tables: DocumentTables<'_>,
) -> String {
    compose_document(
        &document.template,
        &head_tags(document, output),
        &output.html,
        &body_tags(document, static_data, tables),
    )
}

fn head_tags(document: &DocumentManifest, output: &RenderOutput) -> String {
    let mut tags = Vec::new();
    if let Some(stylesheet) = &document.stylesheet {
        tags.push(format!(
            r#"<link rel="stylesheet" href="{}">"#,
            escape_html(stylesheet)
        ));
    }
    if !output.css.is_empty() {
        tags.push(format!("<style>{}</style>", output.css));
    }
    if !document.entry.is_empty() {
        tags.push(format!(
            r#"<link rel="modulepreload" href="{}">"#,
            escape_html(&document.entry)
        ));
    }
    if !output.head.is_empty() {
        tags.push(output.head.clone());
    }
    tags.join("\n")
}

fn body_tags(
    document: &DocumentManifest,
    static_data: &[StaticDataEntry],
    tables: DocumentTables<'_>,
) -> String {
    let mut tags = Vec::new();

    if let Some(redirects) = tables.redirects.filter(|r| !r.is_empty()) {
        tags.push(json_script(REDIRECTS_GLOBAL, redirects));
    }
    if let Some(hashes) = tables.data_hashes.filter(|h| !h.is_empty()) {
        tags.push(json_script(DATA_HASH_GLOBAL, hashes));
    }

    let data: serde_json::Map<String, Value> = static_data
        .iter()
        .map(|entry| (entry.asset_id.clone(), entry.data.clone()))
        .collect();
    tags.push(json_script(STATIC_DATA_GLOBAL, &data));

    if !tables.trailing_slash {
        tags.push(format!("<script>{TRAILING_SLASH_GLOBAL} = false;</script>"));
    }
    if !document.entry.is_empty() {
        tags.push(format!(
            r#"<script type="module" src="{}" defer></script>"#,
            escape_html(&document.entry)
        ));
    }
    tags.join("\n")
}

/// `<script>NAME = JSON.parse("...")</script>`.
pub fn json_script<T: Serialize + ?Sized>(name: &str, value: &T) -> String {
    let json = serde_json::to_string(value).unwrap_or_else(|_| "null".to_string());
    let literal = serde_json::to_string(&json)
        .unwrap_or_default()
        .replace("</", "<\\/");
    format!("<script>{name} = JSON.parse({literal})</script>")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::render::DEFAULT_DOCUMENT;
    use serde_json::json;

    fn document() -> DocumentManifest {
        DocumentManifest {
            entry: "/_immutable/entry.js".into(),
            template: DEFAULT_DOCUMENT.into(),
            stylesheet: Some("/style.css".into()),
        }
    }

    #[test]
    fn test_json_script_double_encodes() {
        let script = json_script("X", &json!({"a": "</script>"}));
        assert_eq!(
            script,
            r#"<script>X = JSON.parse("{\"a\":\"<\/script>\"}")</script>"#
        );
    }

    #[test]
    fn test_page_document_order() {
        let output = RenderOutput {
            html: "<h1>Hi</h1>".into(),
            head: "<title>Hi</title>".into(),
            css: String::new(),
        };
        let data = vec![StaticDataEntry {
            asset_id: "/~page~/".into(),
            data: json!({"a": 1}),
        }];
        let mut redirects = BTreeMap::new();
        redirects.insert("/old/".to_string(), Redirect::found("/new/"));
        let mut hashes = BTreeMap::new();
        hashes.insert("idhash".to_string(), "contenthash".to_string());

        let html = page_document(
            &document(),
            &output,
            &data,
            DocumentTables {
                redirects: Some(&redirects),
                data_hashes: Some(&hashes),
                trailing_slash: false,
            },
        );

        let order = [
            r#"<link rel="stylesheet" href="/style.css">"#,
            "<title>Hi</title>",
            "<h1>Hi</h1>",
            REDIRECTS_GLOBAL,
            DATA_HASH_GLOBAL,
            STATIC_DATA_GLOBAL,
            "__VSL_TRAILING_SLASH__ = false;",
            r#"<script type="module" src="/_immutable/entry.js" defer></script>"#,
        ];
        let positions: Vec<_> = order.iter().map(|needle| html.find(needle).unwrap()).collect();
        assert!(positions.windows(2).all(|w| w[0] < w[1]), "{positions:?}");
    }

    #[test]
    fn test_page_document_omits_empty_tables() {
        let html = page_document(&document(), &RenderOutput::default(), &[], DocumentTables::default());
        assert!(!html.contains(REDIRECTS_GLOBAL));
        assert!(!html.contains(TRAILING_SLASH_GLOBAL));
        assert!(html.contains(r#"__VSL_STATIC_DATA__ = JSON.parse("{}")"#));
    }
}
