//! The HTML document every page is rendered into.

use std::fs;
use std::path::Path;

use anyhow::{Context, Result};

pub const HEAD_PLACEHOLDER: &str = "<!--@vessel/head-->";
pub const APP_PLACEHOLDER: &str = "<!--@vessel/app-->";
pub const BODY_PLACEHOLDER: &str = "<!--@vessel/body-->";

/// Document used when the app has no `index.html`.
pub const DEFAULT_DOCUMENT: &str = r#"<!DOCTYPE html>
<html lang="en-US">
  <head>
    <meta charset="utf-8" />
    <meta name="viewport" content="width=device-width,initial-scale=1" />
    <meta name="generator" content="vessel@{{ version }}" />
    <!--@vessel/head-->
  </head>
  <body>
    <div id="app"><!--@vessel/app--></div>
    <!--@vessel/body-->
  </body>
</html>
"#;

/// Read the document template at `path`, falling back to [`DEFAULT_DOCUMENT`]
/// when it does not exist.
pub fn read_document_template(path: Option<&Path>) -> Result<String> {
    let html = match path {
        Some(path) if path.exists() => fs::read_to_string(path)
            .with_context(|| format!("failed to read document template {}", path.display()))?,
        _ => DEFAULT_DOCUMENT.to_string(),
    };
    Ok(html.replace("{{ version }}", env!("CARGO_PKG_VERSION")))
}

/// Substitute the three document placeholders.
pub fn compose_document(template: &str, head: &str, app: &str, body: &str) -> String {
    template
        .replacen(HEAD_PLACEHOLDER, head, 1)
        .replacen(APP_PLACEHOLDER, app, 1)
        .replacen(BODY_PLACEHOLDER, body, 1)
}
