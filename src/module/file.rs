//! Built-in loader for route files on disk.
//!
//! Page, layout and error files are `.html` or `.md`, optionally starting
//! with a `+++` TOML front matter block:
//!
//! ```text
//! +++
//! server = false          # true: rendered per request, [data] served by serverLoader
//!
//! [data]                  # static data, exposed as {{ data.* }}
//! title = "Hello"
//!
//! [redirect]              # static redirect
//! to = "/new"
//! status = 301
//! +++
//! # {{ data.title }}
//! ```
//!
//! Http files are TOML with one table per method:
//!
//! ```text
//! edge = true
//!
//! [GET]
//! json = { hello = "world" }
//!
//! [POST]
//! status = 201
//! body = "created {{ params.id }}"
//! headers = { x-powered-by = "vessel" }
//! ```

use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

use anyhow::{Context, Result};
use futures::future::BoxFuture;
use pulldown_cmark::{Options, Parser};
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};

use super::{EDGE_EXPORT, ModuleLoader, RouteModule, StaticLoaderOutput};
use crate::http::{HttpMethod, JSON_CONTENT_TYPE, Redirect, Request, Response, TEXT_CONTENT_TYPE};
use crate::render::interpolate;
use crate::routing::{RouteFile, RouteKind};

const FRONT_MATTER_FENCE: &str = "+++";

/// Loads route modules from `.html`, `.md` and `.toml` files.
#[derive(Debug, Default, Clone, Copy)]
pub struct FileModuleLoader;

impl ModuleLoader for FileModuleLoader {
    fn load<'a>(&'a self, file: &'a RouteFile) -> BoxFuture<'a, Result<RouteModule>> {
        Box::pin(async move {
            match file.kind {
                RouteKind::Http => load_http(&file.path),
                _ => load_markup(&file.path, file.extension().as_deref() == Some("md")),
            }
        })
    }
}

// ============================================================================
// Markup files
// ============================================================================

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct FrontMatter {
    server: bool,
    data: Option<toml::Table>,
    redirect: Option<FrontMatterRedirect>,
}

#[derive(Debug, Deserialize)]
struct FrontMatterRedirect {
    to: String,
    #[serde(default = "default_redirect_status")]
    status: u16,
}

const fn default_redirect_status() -> u16 {
    302
}

fn load_markup(path: &Path, markdown: bool) -> Result<RouteModule> {
    let source = fs::read_to_string(path)
        .with_context(|| format!("failed to read {}", path.display()))?;
    let (front, body) = split_front_matter(&source);

    let front: FrontMatter = match front {
        Some(front) => toml::from_str(front)
            .with_context(|| format!("invalid front matter in {}", path.display()))?,
        None => FrontMatter::default(),
    };

    let template = if markdown {
        render_markdown(body)
    } else {
        body.to_string()
    };
    let mut module = RouteModule::new().with_template(template);

    let data = front
        .data
        .map(serde_json::to_value)
        .transpose()
        .context("front matter data is not representable as JSON")?;

    let redirect = front
        .redirect
        .map(|r| Redirect::new(r.to, r.status))
        .transpose()
        .with_context(|| format!("invalid redirect in {}", path.display()))?;

    if front.server {
        let data = data.unwrap_or_else(|| json!({}));
        module = module.with_server_loader(move |_: Request| {
            let body = data.clone();
            async move { Ok(Response::json(&body, 200)) }
        });
    } else if data.is_some() || redirect.is_some() {
        let output = StaticLoaderOutput { data, redirect };
        module = module.with_static_loader(move |_| {
            let output = output.clone();
            async move { Ok(output) }
        });
    }

    Ok(module)
}

/// Split `+++` front matter from the body.
fn split_front_matter(source: &str) -> (Option<&str>, &str) {
    let source = source.trim_start_matches('\u{feff}');
    let Some(rest) = source
        .strip_prefix(FRONT_MATTER_FENCE)
        .and_then(|rest| rest.strip_prefix('\n').or_else(|| rest.strip_prefix("\r\n")))
    else {
        return (None, source);
    };

    let mut offset = 0;
    for line in rest.split_inclusive('\n') {
        if line.trim_end() == FRONT_MATTER_FENCE {
            return (Some(&rest[..offset]), &rest[offset + line.len()..]);
        }
        offset += line.len();
    }
    (None, source)
}

/// Front matter of the markup file at `path` as JSON, `{}` when it has none.
pub fn read_front_matter(path: &Path) -> Result<Value> {
    let source = fs::read_to_string(path)
        .with_context(|| format!("failed to read {}", path.display()))?;
    let Some(front) = split_front_matter(&source).0 else {
        return Ok(json!({}));
    };
    let table: toml::Table = toml::from_str(front)
        .with_context(|| format!("invalid front matter in {}", path.display()))?;
    Ok(serde_json::to_value(table)?)
}

/// CommonMark with tables, footnotes, strikethrough and task lists. Raw
/// HTML passes through untouched.
fn render_markdown(body: &str) -> String {
    let mut options = Options::empty();
    options.insert(Options::ENABLE_TABLES);
    options.insert(Options::ENABLE_FOOTNOTES);
    options.insert(Options::ENABLE_STRIKETHROUGH);
    options.insert(Options::ENABLE_TASKLISTS);

    let mut html = String::with_capacity(body.len() * 3 / 2);
    pulldown_cmark::html::push_html(&mut html, Parser::new_ext(body, options));
    html.truncate(html.trim_end().len());
    html
}

// ============================================================================
// Http files
// ============================================================================

/// Parsed http route file.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct HttpFile {
    #[serde(default)]
    pub edge: bool,
    #[serde(flatten)]
    pub endpoints: BTreeMap<HttpMethod, HttpEndpoint>,
}

/// Static response for one method.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HttpEndpoint {
    #[serde(default = "default_status")]
    pub status: u16,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub body: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub json: Option<Value>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub headers: BTreeMap<String, String>,
}

const fn default_status() -> u16 {
    200
}

impl HttpFile {
    pub fn read(path: &Path) -> Result<Self> {
        let source = fs::read_to_string(path)
            .with_context(|| format!("failed to read {}", path.display()))?;
        toml::from_str(&source).with_context(|| format!("invalid http file {}", path.display()))
    }
}

impl HttpEndpoint {
    /// Build the response for `req`, substituting `{{ params.* }}` in the body.
    pub fn respond(&self, req: &Request) -> Response {
        let params = serde_json::to_value(&req.params).unwrap_or_default();
        let mut res = match (&self.json, &self.body) {
            (Some(value), _) => Response::json(value, self.status),
            (None, Some(body)) => {
                Response::text(interpolate(body, &params, &Value::Null), self.status)
            }
            (None, None) => Response::new(self.status),
        };
        for (name, value) in &self.headers {
            res = res.with_header(name, value);
        }
        if res.header("content-type").is_none() && !res.body.is_empty() {
            let content_type = if self.json.is_some() {
                JSON_CONTENT_TYPE
            } else {
                TEXT_CONTENT_TYPE
            };
            res = res.with_header("Content-Type", content_type);
        }
        res
    }
}

fn load_http(path: &Path) -> Result<RouteModule> {
    let file = HttpFile::read(path)?;
    let mut module = RouteModule::new();
    for (method, endpoint) in file.endpoints {
        module = module.with_handler(method, move |req: Request| {
            let res = endpoint.respond(&req);
            async move { Ok(res) }
        });
    }
    if file.edge {
        module = module.with_export(EDGE_EXPORT);
    }
    Ok(module)
}
