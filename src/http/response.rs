//! HTTP response building module
//!
//! Builders for the status codes the server emits. None of them fail: a
//! builder error is logged and replaced by an empty response.

use http_body_util::{BodyExt, Full};
use hyper::body::Bytes;
use hyper::Response;
use std::io;

use super::range::ByteRange;

/// Body of every response: in-memory pages or a file streamed from disk
pub type ResponseBody = http_body_util::combinators::UnsyncBoxBody<Bytes, io::Error>;

/// Wrap in-memory bytes as a response body
pub fn full<T: Into<Bytes>>(chunk: T) -> ResponseBody {
    Full::new(chunk.into())
        .map_err(|never| match never {})
        .boxed_unsync()
}

/// Empty body, for HEAD responses
pub fn empty() -> ResponseBody {
    full(Bytes::new())
}

/// Content type of every partial video response
pub const PARTIAL_CONTENT_TYPE: &str = "video/mp4";

fn build_text_response(status: u16, text: &'static str) -> Response<ResponseBody> {
    Response::builder()
        .status(status)
        .header("Content-Type", "text/plain")
        .body(full(text))
        .unwrap_or_else(|e| {
            log_build_error(text, &e);
            Response::new(full(text))
        })
}

/// Build 400 Bad Request response
pub fn build_400_response(reason: &str) -> Response<ResponseBody> {
    let body = format!("400 Bad Request: {reason}");
    Response::builder()
        .status(400)
        .header("Content-Type", "text/plain")
        .body(full(body))
        .unwrap_or_else(|e| {
            log_build_error("400", &e);
            Response::new(empty())
        })
}

/// Build 404 Not Found response
pub fn build_404_response() -> Response<ResponseBody> {
    build_text_response(404, "404 Not Found")
}

/// Build 405 Method Not Allowed response
pub fn build_405_response(allow: &str) -> Response<ResponseBody> {
    Response::builder()
        .status(405)
        .header("Content-Type", "text/plain")
        .header("Allow", allow)
        .body(full("405 Method Not Allowed"))
        .unwrap_or_else(|e| {
            log_build_error("405", &e);
            Response::new(full("405 Method Not Allowed"))
        })
}

/// Build 413 Payload Too Large response
pub fn build_413_response() -> Response<ResponseBody> {
    build_text_response(413, "413 Payload Too Large")
}

/// Build 416 Range Not Satisfiable response
pub fn build_416_response(file_size: u64) -> Response<ResponseBody> {
    Response::builder()
        .status(416)
        .header("Content-Type", "text/plain")
        .header("Content-Range", format!("bytes */{file_size}"))
        .body(full("Range Not Satisfiable"))
        .unwrap_or_else(|e| {
            log_build_error("416", &e);
            Response::new(full("Range Not Satisfiable"))
        })
}

/// Build 500 Internal Server Error response
pub fn build_500_response() -> Response<ResponseBody> {
    build_text_response(500, "500 Internal Server Error")
}

/// Build generic HTML response
pub fn build_html_response(content: String) -> Response<ResponseBody> {
    let content_length = content.len();

    Response::builder()
        .status(200)
        .header("Content-Type", "text/html; charset=utf-8")
        .header("Content-Length", content_length)
        .body(full(content))
        .unwrap_or_else(|e| {
            log_build_error("HTML", &e);
            Response::new(empty())
        })
}

/// Build 200 response carrying a whole file
///
/// No range headers are attached. `body` is empty for HEAD requests while
/// `content_length` still reports the file size.
pub fn build_full_response(
    body: ResponseBody,
    content_length: u64,
    content_type: &str,
) -> Response<ResponseBody> {
    Response::builder()
        .status(200)
        .header("Content-Type", content_type)
        .header("Content-Length", content_length)
        .body(body)
        .unwrap_or_else(|e| {
            log_build_error("200", &e);
            Response::new(empty())
        })
}

/// Build 206 Partial Content response
///
/// `body` is empty for HEAD requests.
pub fn build_partial_response(body: ResponseBody, range: ByteRange, total_size: u64) -> Response<ResponseBody> {
    Response::builder()
        .status(206)
        .header("Content-Type", PARTIAL_CONTENT_TYPE)
        .header("Content-Length", range.len())
        .header("Content-Range", range.content_range(total_size))
        .header("Accept-Ranges", "bytes")
        .body(body)
        .unwrap_or_else(|e| {
            log_build_error("206", &e);
            Response::new(empty())
        })
}

fn log_build_error(status: &str, error: &hyper::http::Error) {
    crate::logger::log_error(&format!("Failed to build {status} response: {error}"));
}
