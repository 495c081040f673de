//! Request routing dispatch module
//!
//! Entry point for HTTP request processing: route matching, method checks,
//! dispatch and access logging.

use crate::config::AppState;
use crate::handler::{stream, videos};
use crate::http::{self, ResponseBody};
use crate::logger::{self, AccessLogEntry};
use hyper::body::Body;
use hyper::header::{HeaderValue, CONTENT_LENGTH, RANGE, SERVER, USER_AGENT};
use hyper::{Method, Request, Response, Version};
use std::convert::Infallible;
use std::error::Error;
use std::net::SocketAddr;
use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::time::Instant;

/// Prefix of the streaming route
const VIDEO_PREFIX: &str = "/video/";

/// Request context encapsulating information needed for request processing
pub struct RequestContext<'a> {
    pub path: &'a str,
    pub is_head: bool,
    pub range_header: Option<String>,
}

/// Main entry point for HTTP request handling
pub async fn handle_request<B>(
    req: Request<B>,
    state: Arc<AppState>,
    peer_addr: SocketAddr,
) -> Result<Response<ResponseBody>, Infallible>
where
    B: Body,
    B::Error: Into<Box<dyn Error + Send + Sync>>,
{
    let started = Instant::now();
    let (parts, body) = req.into_parts();

    let mut entry = AccessLogEntry::new(peer_addr, parts.method.to_string(), parts.uri.to_string());
    entry.http_version = version_label(parts.version).to_string();
    entry.range = header_string(&parts.headers, RANGE.as_str());
    entry.user_agent = header_string(&parts.headers, USER_AGENT.as_str());

    let ctx = RequestContext {
        path: parts.uri.path(),
        is_head: parts.method == Method::HEAD,
        range_header: entry.range.clone(),
    };

    let mut response = match (ctx.path, &parts.method) {
        ("/", &Method::GET | &Method::HEAD) => videos::serve_index(&state, ctx.is_head).await,
        ("/", &Method::POST) => {
            let content_length = header_string(&parts.headers, CONTENT_LENGTH.as_str())
                .and_then(|v| v.trim().parse::<u64>().ok());
            videos::submit_form(body, content_length, &state).await
        }
        ("/", method) => {
            logger::log_warning(&format!("Method not allowed on /: {method}"));
            http::build_405_response("GET, HEAD, POST")
        }
        (path, &Method::GET | &Method::HEAD) if path.starts_with(VIDEO_PREFIX) => {
            stream::serve_video(&ctx, &path[VIDEO_PREFIX.len()..], &state).await
        }
        (path, method) if path.starts_with(VIDEO_PREFIX) => {
            logger::log_warning(&format!("Method not allowed on {path}: {method}"));
            http::build_405_response("GET, HEAD")
        }
        _ => http::build_404_response(),
    };

    if let Ok(value) = HeaderValue::from_str(&state.config.http.server_name) {
        response.headers_mut().insert(SERVER, value);
    }

    if state.cached_access_log.load(Ordering::Relaxed) {
        entry.status = response.status().as_u16();
        entry.body_bytes = if ctx.is_head {
            0
        } else {
            body_length(&response)
        };
        entry.request_time_us = u64::try_from(started.elapsed().as_micros()).unwrap_or(u64::MAX);
        logger::log_access(&entry, &state.config.logging.access_log_format);
    }

    Ok(response)
}

/// Bytes in the body: exact for in-memory bodies, `Content-Length` for streamed files
fn body_length(response: &Response<ResponseBody>) -> usize {
    response
        .body()
        .size_hint()
        .exact()
        .or_else(|| {
            header_string(response.headers(), CONTENT_LENGTH.as_str())
                .and_then(|v| v.parse::<u64>().ok())
        })
        .and_then(|n| usize::try_from(n).ok())
        .unwrap_or(0)
}

fn version_label(version: Version) -> &'static str {
    match version {
        Version::HTTP_09 => "0.9",
        Version::HTTP_10 => "1.0",
        Version::HTTP_2 => "2",
        Version::HTTP_3 => "3",
        _ => "1.1",
    }
}

fn header_string(headers: &hyper::HeaderMap, name: &str) -> Option<String> {
    headers
        .get(name)
        .and_then(|v| v.to_str().ok())
        .map(ToString::to_string)
}
