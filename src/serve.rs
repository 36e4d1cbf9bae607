//! Development server.
//!
//! Pages are rendered on demand from the content directory; nothing is
//! written to the output directory.
//!
//! ```text
//! GET  /notes/foo/       ──► ContentMap ──► expand + render ──► 200 / 404
//! GET  /__/overlay.js    ──► built-in resources
//! GET  /css/site.css     ──► static directory
//! POST /api/<endpoint>   ──► api::handle
//! ```
//!
//! A request that fails is logged and answered with 500; the server keeps
//! running.

use crate::{
    api::{self, API_PREFIX, ApiError, ApiReply},
    content::{
        content_map::ContentMap,
        page::expand,
        render::{RenderOutput, render},
        uri::maybe_append_index_html,
    },
    embed, log,
    site::Site,
    watch::{WatchTarget, watch_for_changes_blocking},
};
use anyhow::{Context, Result, anyhow};
use parking_lot::RwLock;
use std::{
    borrow::Cow,
    fs,
    net::{IpAddr, SocketAddr},
    path::Path,
    sync::Arc,
};
use tiny_http::{Header, Method, Request, Response, Server, StatusCode};

/// Try binding to port, retry with incremented port if in use
const MAX_PORT_RETRIES: u16 = 10;

/// A response, independent of the HTTP library.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Reply {
    pub status: u16,
    pub content_type: &'static str,
    pub body: Vec<u8>,
    /// Rendered pages must never be cached.
    pub no_cache: bool,
}

impl Reply {
    fn ok(content_type: &'static str, body: impl Into<Vec<u8>>) -> Self {
        Self {
            status: 200,
            content_type,
            body: body.into(),
            no_cache: false,
        }
    }

    fn json(status: u16, value: &serde_json::Value) -> Self {
        Self {
            status,
            content_type: "application/json; charset=utf-8",
            body: value.to_string().into_bytes(),
            no_cache: true,
        }
    }

    fn not_found() -> Self {
        Self {
            status: 404,
            content_type: "text/plain; charset=utf-8",
            body: b"404 Not Found".to_vec(),
            no_cache: false,
        }
    }

    fn server_error(err: &anyhow::Error) -> Self {
        Self {
            status: 500,
            content_type: "text/plain; charset=utf-8",
            body: format!("500 Internal Server Error\n\n{err:#}").into_bytes(),
            no_cache: true,
        }
    }
}

/// Populate the content map, then serve until Ctrl+C.
pub fn serve_site(site: Site, pattern: Option<&str>) -> Result<()> {
    let site = Arc::new(site);
    let map = Arc::new(RwLock::new(ContentMap::populate(&site, pattern)?));
    if map.read().is_empty() {
        log!("warn"; "no content found in {}", site.config.build.content.display());
    } else {
        log!("content"; "{} pages", map.read().len());
    }

    let interface: IpAddr = site
        .config
        .serve
        .interface
        .parse()
        .with_context(|| format!("invalid interface `{}`", site.config.serve.interface))?;
    let (server, addr) = try_bind_port(interface, site.config.serve.port, MAX_PORT_RETRIES)?;
    let server = Arc::new(server);

    let server_for_signal = Arc::clone(&server);
    ctrlc::set_handler(move || {
        log!("serve"; "shutting down...");
        server_for_signal.unblock();
    })
    .context("Failed to set Ctrl+C handler")?;

    log!("serve"; "http://{}", addr);

    if site.config.serve.watch {
        let site = Arc::clone(&site);
        let target = WatchTarget::Serve(Arc::clone(&map));
        std::thread::spawn(move || {
            if let Err(err) = watch_for_changes_blocking(&site, &target) {
                log!("watch"; "{err:#}");
            }
        });
    }

    for request in server.incoming_requests() {
        if let Err(err) = handle_request(request, &site, &map) {
            log!("serve"; "request error: {err:#}");
        }
    }

    Ok(())
}

/// Try to bind to a port, retrying with incremented port numbers if in use.
fn try_bind_port(interface: IpAddr, base_port: u16, max_retries: u16) -> Result<(Server, SocketAddr)> {
    let mut last_error = None;
    for offset in 0..max_retries {
        let port = base_port.saturating_add(offset);
        let addr = SocketAddr::new(interface, port);

        match Server::http(addr) {
            Ok(server) => {
                if offset > 0 {
                    log!("serve"; "port {} in use, using {} instead", base_port, port);
                }
                return Ok((server, addr));
            }
            Err(err) => last_error = Some(err),
        }
    }

    Err(anyhow!(
        "Failed to bind after {} attempts (ports {}-{}): {}",
        max_retries,
        base_port,
        base_port.saturating_add(max_retries.saturating_sub(1)),
        last_error.map_or_else(|| "no attempt made".to_owned(), |err| err.to_string())
    ))
}

fn handle_request(mut request: Request, site: &Site, map: &RwLock<ContentMap>) -> Result<()> {
    let url = request.url().to_owned();
    let method = request.method().clone();
    let reply = match method {
        Method::Get | Method::Head => respond_get(site, &map.read(), &url),
        Method::Post => {
            let mut body = String::new();
            request
                .as_reader()
                .read_to_string(&mut body)
                .context("failed to read request body")?;
            respond_post(site, &map.read(), &url, &body)
        }
        _ => Reply::not_found(),
    };

    let mut response = Response::from_data(reply.body)
        .with_status_code(StatusCode(reply.status))
        .with_header(header("Content-Type", reply.content_type)?);
    if reply.no_cache {
        response = response
            .with_header(header("Cache-Control", "no-cache, no-store, must-revalidate")?)
            .with_header(header("Expires", "0")?);
    }

    request.respond(response)?;
    Ok(())
}

fn header(name: &str, value: &str) -> Result<Header> {
    Header::from_bytes(name, value).map_err(|()| anyhow!("invalid header `{name}: {value}`"))
}

/// Decode a request URL into a content path: percent-decoded, query
/// stripped, `index.html` appended to directories.
pub fn request_path(url: &str) -> String {
    let decoded = urlencoding::decode(url).unwrap_or(Cow::Borrowed(url));
    let path = decoded.split(['?', '#']).next().unwrap_or_default();
    let path = if path.starts_with('/') {
        Cow::Borrowed(path)
    } else {
        Cow::Owned(format!("/{path}"))
    };
    maybe_append_index_html(&path)
}

/// Answer a GET request; render failures become a 500 reply.
pub fn respond_get(site: &Site, map: &ContentMap, url: &str) -> Reply {
    let path = request_path(url);

    if let Some(input_uri) = map.get(&path) {
        log!("content"; "{}", path);
        return match render_page(site, &path, input_uri) {
            Ok(reply) => reply,
            Err(err) => {
                log!("error"; "{}: {:#}", path, err);
                Reply::server_error(&err)
            }
        };
    }

    if let Some(bytes) = embed::resource(&path) {
        return Reply::ok(guess_content_type(&path), bytes);
    }

    match serve_static(site, &path) {
        Ok(Some(reply)) => {
            log!(verbose "static"; "{}", path);
            reply
        }
        Ok(None) => Reply::not_found(),
        Err(err) => {
            log!("error"; "{}: {:#}", path, err);
            Reply::server_error(&err)
        }
    }
}

/// Answer a POST request to the tooling API.
pub fn respond_post(site: &Site, map: &ContentMap, url: &str, body: &str) -> Reply {
    let path = request_path(url);
    if !path.starts_with(API_PREFIX) {
        return Reply::not_found();
    }

    match api::handle(site, map, &path, body) {
        Ok(ApiReply::Json(value)) => Reply::json(200, &value),
        Ok(ApiReply::Text(text)) => Reply {
            no_cache: true,
            ..Reply::ok("text/plain; charset=utf-8", text)
        },
        Err(err) => {
            let status = match err.downcast_ref::<ApiError>() {
                Some(ApiError::UnknownEndpoint(_) | ApiError::UnknownUri(_)) => 404,
                Some(ApiError::BadRequest(_)) => 400,
                None => {
                    log!("error"; "{}: {:#}", path, err);
                    500
                }
            };
            Reply::json(status, &serde_json::json!({ "error": format!("{err:#}") }))
        }
    }
}

/// Render the page of `input_uri` whose output URI is `output_uri`.
///
/// Falls back to the first page when none matches.
fn render_page(site: &Site, output_uri: &str, input_uri: &str) -> Result<Reply> {
    let input_file = site.input_file(input_uri);

    let mut first = None;
    let mut matching = None;
    for page in expand(site, &input_file)? {
        let page = page?;
        if page.output_uri == output_uri {
            matching = Some(page);
            break;
        }
        first.get_or_insert(page);
    }
    let Some(page) = matching.or(first) else {
        return Ok(Reply::not_found());
    };

    let content_type = guess_content_type(output_uri);
    let reply = match render(site, &page)? {
        RenderOutput::Rendered(html) => Reply {
            no_cache: true,
            ..Reply::ok(content_type, html)
        },
        RenderOutput::Copy => {
            let bytes = fs::read(&input_file)
                .with_context(|| format!("Failed to read {}", input_file.display()))?;
            Reply {
                no_cache: true,
                ..Reply::ok(content_type, bytes)
            }
        }
        RenderOutput::Skip => Reply::not_found(),
    };
    Ok(reply)
}

/// Look `path` up in the static directory.
fn serve_static(site: &Site, path: &str) -> Result<Option<Reply>> {
    let relative = path.trim_start_matches('/');
    if relative.split('/').any(|segment| segment == "..") {
        return Ok(None);
    }

    let file = site.config.build.static_dir.join(relative);
    if !file.is_file() {
        return Ok(None);
    }
    let bytes = fs::read(&file).with_context(|| format!("Failed to read {}", file.display()))?;
    Ok(Some(Reply::ok(guess_content_type(path), bytes)))
}

/// Guess MIME content type from file extension.
///
/// Returns `application/octet-stream` for unknown extensions.
fn guess_content_type(path: &str) -> &'static str {
    match Path::new(path).extension().and_then(|e| e.to_str()) {
        // Web content
        Some("html" | "htm") => "text/html; charset=utf-8",
        Some("css") => "text/css; charset=utf-8",
        Some("js" | "mjs") => "application/javascript; charset=utf-8",
        Some("json") => "application/json; charset=utf-8",
        Some("xml") => "application/xml; charset=utf-8",

        // Images
        Some("svg") => "image/svg+xml",
        Some("png") => "image/png",
        Some("jpg" | "jpeg") => "image/jpeg",
        Some("gif") => "image/gif",
        Some("webp") => "image/webp",
        Some("ico") => "image/x-icon",

        // Fonts
        Some("woff") => "font/woff",
        Some("woff2") => "font/woff2",

        // Documents
        Some("pdf") => "application/pdf",
        Some("txt") => "text/plain; charset=utf-8",
        Some("md") => "text/markdown; charset=utf-8",

        _ => "application/octet-stream",
    }
}
