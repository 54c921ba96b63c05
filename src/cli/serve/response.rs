//! Conversions between `tiny_http` and the dispatcher's request/response
//! types, plus the responses the dev server answers by itself.

use std::fs;
use std::path::{Component, Path, PathBuf};

use anyhow::{Context, Result, anyhow};
use serde::Serialize;
use tiny_http::{Header, Method, StatusCode};

use crate::core::decode;
use crate::http::{HttpMethod, Request, Response};
use crate::utils::mime;

/// Read a `tiny_http` request into a dispatcher [`Request`].
pub fn read_request(request: &mut tiny_http::Request) -> Result<Request> {
    let method = to_method(request.method())
        .ok_or_else(|| anyhow!("unsupported method {}", request.method()))?;

    let mut req = Request::from_path(method, request.url())?;
    for header in request.headers() {
        req = req.with_header(header.field.as_str().as_str(), header.value.as_str());
    }

    let mut body = Vec::new();
    request
        .as_reader()
        .read_to_end(&mut body)
        .context("failed to read request body")?;
    Ok(req.with_body(body))
}

fn to_method(method: &Method) -> Option<HttpMethod> {
    Some(match method {
        Method::Get => HttpMethod::Get,
        Method::Head => HttpMethod::Head,
        Method::Post => HttpMethod::Post,
        Method::Put => HttpMethod::Put,
        Method::Patch => HttpMethod::Patch,
        Method::Delete => HttpMethod::Delete,
        Method::Options => HttpMethod::Options,
        _ => return None,
    })
}

/// Send a dispatcher [`Response`]. HEAD requests get headers only.
pub fn send(request: tiny_http::Request, res: Response) -> Result<()> {
    let head = request.method() == &Method::Head;
    let mut response = tiny_http::Response::from_data(if head { Vec::new() } else { res.body })
        .with_status_code(StatusCode(res.status));
    for (name, value) in &res.headers {
        if let Ok(header) = Header::from_bytes(name.as_bytes(), value.as_bytes()) {
            response.add_header(header);
        }
    }
    request.respond(response)?;
    Ok(())
}

pub fn send_json<T: Serialize>(request: tiny_http::Request, value: &T, status: u16) -> Result<()> {
    let body = serde_json::to_vec(value)?;
    send(
        request,
        Response::new(status)
            .with_header("Content-Type", mime::JSON)
            .with_body(body),
    )
}

/// Serve a file from disk with its MIME type.
pub fn send_file(request: tiny_http::Request, path: &Path) -> Result<()> {
    let body = fs::read(path).with_context(|| format!("failed to read {}", path.display()))?;
    send(
        request,
        Response::new(200)
            .with_header("Content-Type", mime::from_path(path))
            .with_body(body),
    )
}

/// 503 while the server is starting up or shutting down.
pub fn send_unavailable(request: tiny_http::Request) -> Result<()> {
    send(request, Response::text("503 Service Unavailable", 503))
}

/// File under `dir` addressed by `url`, if there is one.
///
/// Query strings are ignored and `..` never escapes `dir`.
pub fn resolve_file(dir: &Path, url: &str) -> Option<PathBuf> {
    let path = url.split(['?', '#']).next().unwrap_or_default();
    let decoded = decode(path);
    let relative = Path::new(decoded.trim_start_matches('/'));
    if relative
        .components()
        .any(|c| !matches!(c, Component::Normal(_)))
    {
        return None;
    }

    let candidate = dir.join(relative);
    candidate.is_file().then_some(candidate)
}
