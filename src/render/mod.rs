//! Rendering route modules into HTML.
//!
//! The UI framework is pluggable through [`Renderer`]. The built-in
//! [`TemplateRenderer`] treats module templates as HTML with `{{ params.* }}`
//! and `{{ data.* }}` placeholders, nesting each layer inside the
//! `<!--@vessel/slot-->` of the layer above it.

mod document;

pub use document::{
    APP_PLACEHOLDER, BODY_PLACEHOLDER, DEFAULT_DOCUMENT, HEAD_PLACEHOLDER, compose_document,
    read_document_template,
};

use std::sync::{Arc, LazyLock};

use anyhow::Result;
use regex::{Captures, Regex};
use serde_json::Value;
use url::Url;

use crate::module::RouteModule;
use crate::routing::{RouteKind, RouteParams};

/// Where a layout places its children.
pub const SLOT_PLACEHOLDER: &str = "<!--@vessel/slot-->";

/// One loaded module in the render stack.
#[derive(Debug, Clone)]
pub struct RenderLayer {
    pub route_id: String,
    pub kind: RouteKind,
    pub module: Arc<RouteModule>,
    /// Loader data for this layer, `null` when there is none.
    pub data: Value,
}

/// Everything a renderer needs for one document.
#[derive(Debug)]
pub struct RenderInput<'a> {
    pub url: &'a Url,
    pub params: &'a RouteParams,
    /// Layouts from the root down, then the page (or error) module last.
    pub layers: &'a [RenderLayer],
}

/// Markup produced for one document.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RenderOutput {
    pub html: String,
    pub head: String,
    pub css: String,
}

/// Server-side renderer for a UI framework.
pub trait Renderer: Send + Sync {
    fn render(&self, input: &RenderInput<'_>) -> Result<RenderOutput>;
}

/// Built-in string template renderer.
#[derive(Debug, Default, Clone, Copy)]
pub struct TemplateRenderer;

impl Renderer for TemplateRenderer {
    fn render(&self, input: &RenderInput<'_>) -> Result<RenderOutput> {
        let params = serde_json::to_value(input.params)?;
        let mut html = String::new();

        for layer in input.layers.iter().rev() {
            let template = layer.module.template.as_deref().unwrap_or(SLOT_PLACEHOLDER);
            let own = interpolate(template, &params, &layer.data);
            html = if own.contains(SLOT_PLACEHOLDER) {
                own.replacen(SLOT_PLACEHOLDER, &html, 1)
            } else if html.is_empty() {
                own
            } else {
                format!("{own}\n{html}")
            };
        }

        let head = input
            .layers
            .iter()
            .rev()
            .find_map(|layer| layer.data.get("title").and_then(Value::as_str))
            .map(|title| format!("<title>{}</title>", escape_html(title)))
            .unwrap_or_default();

        Ok(RenderOutput {
            html,
            head,
            css: String::new(),
        })
    }
}

static PLACEHOLDER: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\{\{\s*(params|data)((?:\.[A-Za-z0-9_\-]+)*)\s*\}\}").unwrap()
});

/// Replace `{{ params.x }}` and `{{ data.a.b }}` placeholders.
///
/// Strings are HTML-escaped, other values are written as JSON, and missing
/// values render as nothing.
pub fn interpolate(template: &str, params: &Value, data: &Value) -> String {
    PLACEHOLDER
        .replace_all(template, |caps: &Captures<'_>| {
            let root = if &caps[1] == "params" { params } else { data };
            let value = caps[2]
                .split('.')
                .filter(|key| !key.is_empty())
                .try_fold(root, |value, key| match value {
                    Value::Array(items) => key.parse::<usize>().ok().and_then(|i| items.get(i)),
                    _ => value.get(key),
                });
            match value {
                Some(Value::String(s)) => escape_html(s),
                Some(Value::Null) | None => String::new(),
                Some(other) => escape_html(&other.to_string()),
            }
        })
        .into_owned()
}

/// Escape text for HTML content and attribute values.
pub fn escape_html(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for c in s.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            _ => out.push(c),
        }
    }
    out
}
