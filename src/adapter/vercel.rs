//! Vercel Build Output API (v3).
//!
//! ```text
//! .vercel/output/
//! ├── config.json                      # routes + overrides
//! ├── static/                          # StaticAdapter output
//! └── functions/
//!     └── api/[id].func/
//!         ├── index.json               # route pattern, methods, responses
//!         ├── index.js                 # answers from index.json
//!         ├── package.json             # {"type":"module"}
//!         └── .vc-config.json          # runtime, allowed methods
//! ```

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::Serialize;
use serde_json::{Value, json};

use super::{AdapterContext, BuildAdapter, StaticAdapter};
use crate::build::BuildData;
use crate::config::VercelConfig;
use crate::core::{LinkKind, UrlPath};
use crate::http::HttpMethod;
use crate::manifest::ServerHttpRoute;
use crate::module::{HttpEndpoint, HttpFile};
use crate::utils::fs::OutputFile;
use crate::utils::plural::plural_count;

/// Output root, relative to the project root.
pub const OUTPUT_DIR: &str = ".vercel/output";

const IMMUTABLE_CACHE_CONTROL: &str = "public, immutable, max-age=31536000";

/// Static output plus one function per http route.
#[derive(Debug, Clone)]
pub struct VercelAdapter {
    output: PathBuf,
    static_site: StaticAdapter,
}

impl VercelAdapter {
    pub fn new(root: &Path) -> Self {
        let output = root.join(OUTPUT_DIR);
        Self {
            static_site: StaticAdapter::new(output.join("static")),
            output,
        }
    }

    pub fn output_dir(&self) -> &Path {
        &self.output
    }
}

impl BuildAdapter for VercelAdapter {
    fn name(&self) -> &'static str {
        "vercel"
    }

    fn write(&self, ctx: &AdapterContext, data: &BuildData) -> Result<()> {
        if self.output.exists() {
            fs::remove_dir_all(&self.output)
                .with_context(|| format!("failed to clean {}", self.output.display()))?;
        }
        self.static_site.write(ctx, data)?;

        let vercel = &ctx.config.build.vercel;
        let functions: Vec<&ServerHttpRoute> = ctx
            .server
            .http
            .iter()
            .filter(|http| data.server_endpoints.contains_key(&http.route.id))
            .filter(|http| {
                let answers = !http.methods.is_empty();
                if !answers {
                    crate::debug!("vercel"; "{} exports no methods, skipping function", http.route.id);
                }
                answers
            })
            .collect();

        if !vercel.spa_fallback {
            for (id, pattern) in &data.server_pages {
                crate::log!("warn"; "server page {id} ({pattern}) has no function, enable build.vercel.spa_fallback to serve it client-side");
            }
        }

        let mut files = vec![OutputFile::new(
            "config.json",
            serde_json::to_string_pretty(&output_config(ctx, data, &functions))?,
        )];
        for http in &functions {
            let edge = data.edge_routes.contains(&http.route.id);
            files.extend(function_files(http, edge, vercel)?);
        }
        ctx.write_files(&self.output, &files)?;

        crate::log!(
            "vercel";
            "wrote {} to {}",
            plural_count(functions.len(), "function"),
            ctx.config.root_relative(&self.output).display()
        );
        Ok(())
    }
}

// ============================================================================
// config.json
// ============================================================================

#[derive(Debug, Serialize)]
struct OutputConfig {
    version: u8,
    routes: Vec<Value>,
    overrides: BTreeMap<String, Override>,
}

#[derive(Debug, Serialize)]
struct Override {
    path: String,
}

fn output_config(
    ctx: &AdapterContext,
    data: &BuildData,
    functions: &[&ServerHttpRoute],
) -> OutputConfig {
    let mut routes = vec![trailing_slash_route(ctx.server.trailing_slash)];

    for redirect in data.static_redirects.values() {
        routes.push(json!({
            "src": redirect_source(&redirect.from),
            "headers": { "Location": redirect_location(&redirect.to, ctx.server.trailing_slash) },
            "status": redirect.status,
        }));
    }

    routes.push(json!({
        "src": "/_immutable/.+",
        "headers": { "cache-control": IMMUTABLE_CACHE_CONTROL },
        "continue": true,
    }));
    routes.push(json!({ "handle": "filesystem" }));

    for http in functions {
        routes.push(json!({
            "src": pcre_source(http.route.pattern.source()),
            "dest": format!("/{}", function_name(&http.route.id)),
        }));
    }

    if ctx.config.build.vercel.spa_fallback {
        routes.push(json!({ "src": "/(.*)", "dest": "/index.html" }));
    }

    let overrides = data
        .static_renders
        .values()
        .filter(|render| render.filename != "index.html")
        .map(|render| {
            let path = render.pathname.as_str().trim_start_matches('/').to_string();
            (render.filename.clone(), Override { path })
        })
        .collect();

    OutputConfig {
        version: 3,
        routes,
        overrides,
    }
}

/// Redirect that enforces the trailing-slash policy for page URLs.
fn trailing_slash_route(trailing_slash: bool) -> Value {
    if trailing_slash {
        json!({
            "src": "^/((?:[^/]+/)*[^/\\.]+)$",
            "headers": { "Location": "/$1/" },
            "status": 308,
        })
    } else {
        json!({
            "src": "^/(.*)\\/$",
            "headers": { "Location": "/$1" },
            "status": 308,
        })
    }
}

/// `/old/` also matches `/old`.
fn redirect_source(from: &str) -> String {
    let escaped = regex::escape(from);
    match escaped.strip_suffix('/') {
        Some(stem) if !stem.is_empty() => format!("^{stem}/?$"),
        _ => format!("^{escaped}$"),
    }
}

/// Internal redirect targets follow the trailing-slash policy of page URLs.
fn redirect_location(to: &str, trailing_slash: bool) -> String {
    if matches!(LinkKind::parse(to), LinkKind::SiteRoot(_)) {
        let (path, suffix) = to.split_at(to.find(['?', '#']).unwrap_or(to.len()));
        format!("{}{suffix}", UrlPath::from_decoded(path).normalize_page(trailing_slash))
    } else {
        to.to_string()
    }
}

/// Route regex in the named-group syntax PCRE and JavaScript accept.
fn pcre_source(source: &str) -> String {
    source.replace("(?P<", "(?<")
}

/// Function path for a route id: `/api/[id]` -> `api/[id]`, `/` -> `index`.
fn function_name(route_id: &str) -> &str {
    match route_id.trim_matches('/') {
        "" => "index",
        name => name,
    }
}

// ============================================================================
// functions
// ============================================================================

/// Serialized http route, read by the generated `index.js`.
#[derive(Debug, Serialize)]
struct FunctionRoute<'a> {
    route: &'a str,
    pattern: String,
    methods: &'a [HttpMethod],
    edge: bool,
    endpoints: BTreeMap<HttpMethod, HttpEndpoint>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct VcConfig<'a> {
    runtime: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    handler: Option<&'static str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    entrypoint: Option<&'static str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    max_duration: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    launcher_type: Option<&'static str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    should_add_helpers: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    should_add_sourcemap_support: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    regions: Option<&'a [String]>,
    allowed_methods: &'a [HttpMethod],
}

impl<'a> VcConfig<'a> {
    fn node(config: &'a VercelConfig, methods: &'a [HttpMethod]) -> Self {
        Self {
            runtime: &config.runtime,
            handler: Some("index.js"),
            entrypoint: None,
            max_duration: config.max_duration,
            launcher_type: Some("Nodejs"),
            should_add_helpers: Some(true),
            should_add_sourcemap_support: Some(true),
            regions: regions(config),
            allowed_methods: methods,
        }
    }

    fn edge(config: &'a VercelConfig, methods: &'a [HttpMethod]) -> Self {
        Self {
            runtime: &config.edge_runtime,
            handler: None,
            entrypoint: Some("index.js"),
            max_duration: None,
            launcher_type: None,
            should_add_helpers: None,
            should_add_sourcemap_support: None,
            regions: regions(config),
            allowed_methods: methods,
        }
    }
}

fn regions(config: &VercelConfig) -> Option<&[String]> {
    (!config.regions.is_empty()).then_some(config.regions.as_slice())
}

/// Endpoints of a file-backed http route. Routes registered in code have
/// nothing to serialize.
fn read_endpoints(http: &ServerHttpRoute) -> Result<BTreeMap<HttpMethod, HttpEndpoint>> {
    let Some(slot) = &http.route.http else {
        return Ok(BTreeMap::new());
    };
    if slot.file.extension().as_deref() != Some("toml") || !slot.file.path.is_file() {
        crate::debug!("vercel"; "{} is not a file route, function has no responses", http.route.id);
        return Ok(BTreeMap::new());
    }
    Ok(HttpFile::read(&slot.file.path)?.endpoints)
}

fn function_files(
    http: &ServerHttpRoute,
    edge: bool,
    config: &VercelConfig,
) -> Result<Vec<OutputFile>> {
    let dir = format!("functions/{}.func", function_name(&http.route.id));
    let route = FunctionRoute {
        route: &http.route.id,
        pattern: pcre_source(http.route.pattern.source()),
        methods: &http.methods,
        edge,
        endpoints: read_endpoints(http)?,
    };
    let vc_config = if edge {
        VcConfig::edge(config, &http.methods)
    } else {
        VcConfig::node(config, &http.methods)
    };

    Ok(vec![
        OutputFile::new(
            format!("{dir}/index.json"),
            serde_json::to_string_pretty(&route)?,
        ),
        OutputFile::new(format!("{dir}/index.js"), function_source(edge)),
        OutputFile::new(format!("{dir}/package.json"), "{\n  \"type\": \"module\"\n}\n"),
        OutputFile::new(
            format!("{dir}/.vc-config.json"),
            serde_json::to_string_pretty(&vc_config)?,
        ),
    ])
}

const FUNCTION_RUNTIME: &str = r#"const route = await loadRoute();
const pattern = new RegExp(route.pattern);

function hasHeader(headers, name) {
  return Object.keys(headers).some((key) => key.toLowerCase() === name);
}

function respond(method, pathname) {
  const endpoint = route.endpoints[method] ?? (method === 'HEAD' ? route.endpoints.GET : undefined);
  if (!endpoint) {
    return { status: 405, headers: { Allow: route.methods.join(', ') }, body: '' };
  }
  const params = pathname.match(pattern)?.groups ?? {};
  const headers = { ...(endpoint.headers ?? {}) };
  let body = '';
  if (endpoint.json !== undefined) {
    body = JSON.stringify(endpoint.json);
    if (!hasHeader(headers, 'content-type')) headers['content-type'] = 'application/json; charset=utf-8';
  } else if (endpoint.body !== undefined) {
    body = endpoint.body.replace(/\{\{\s*params\.(\w+)\s*\}\}/g, (_, name) => params[name] ?? '');
    if (!hasHeader(headers, 'content-type')) headers['content-type'] = 'text/plain; charset=utf-8';
  }
  return { status: endpoint.status, headers, body };
}
"#;

const NODE_ENTRY: &str = r#"import { readFile } from 'node:fs/promises';

async function loadRoute() {
  return JSON.parse(await readFile(new URL('./index.json', import.meta.url), 'utf8'));
}

export default function handler(req, res) {
  const { pathname } = new URL(req.url, 'http://localhost');
  const { status, headers, body } = respond(req.method, decodeURIComponent(pathname));
  res.writeHead(status, headers);
  res.end(req.method === 'HEAD' ? undefined : body);
}
"#;

const EDGE_ENTRY: &str = r#"import manifest from './index.json' with { type: 'json' };

async function loadRoute() {
  return manifest;
}

export default function handler(request) {
  const { pathname } = new URL(request.url);
  const { status, headers, body } = respond(request.method, decodeURIComponent(pathname));
  return new Response(request.method === 'HEAD' ? null : body, { status, headers });
}
"#;

fn function_source(edge: bool) -> String {
    let entry = if edge { EDGE_ENTRY } else { NODE_ENTRY };
    format!("{entry}\n{FUNCTION_RUNTIME}")
}
