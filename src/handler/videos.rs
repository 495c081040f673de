//! Video catalog module
//!
//! Lists the video directory, renders the index and player pages and accepts
//! the playback form.

use http_body_util::{BodyExt, LengthLimitError, Limited};
use hyper::body::Body;
use hyper::Response;
use percent_encoding::{utf8_percent_encode, AsciiSet, NON_ALPHANUMERIC};
use std::error::Error;
use std::fmt::Write as _;
use std::io;
use std::path::Path;
use std::sync::Arc;
use tokio::fs;

use crate::config::AppState;
use crate::handler::stream::resolve_video_path;
use crate::http::form::PlayForm;
use crate::http::{self, mime, ResponseBody};
use crate::logger;
use crate::monitor;

/// Characters left as-is in `/video/<name>` links
const LINK_SAFE: &AsciiSet = &NON_ALPHANUMERIC
    .remove(b'.')
    .remove(b'-')
    .remove(b'_')
    .remove(b'~');

/// Sorted names of the regular, non-hidden files in `dir`
pub async fn list_videos(dir: &Path) -> io::Result<Vec<String>> {
    let mut entries = fs::read_dir(dir).await?;
    let mut names = Vec::new();

    while let Some(entry) = entries.next_entry().await? {
        let Ok(name) = entry.file_name().into_string() else {
            continue;
        };
        if name.starts_with('.') {
            continue;
        }
        if entry.file_type().await?.is_file() {
            names.push(name);
        }
    }

    names.sort();
    Ok(names)
}

/// `GET /`
pub async fn serve_index(state: &Arc<AppState>, is_head: bool) -> Response<ResponseBody> {
    let videos = match list_videos(&state.config.media.video_dir).await {
        Ok(v) => v,
        Err(e) => {
            logger::log_error(&format!(
                "Cannot list video directory '{}': {e}",
                state.config.media.video_dir.display()
            ));
            return http::build_500_response();
        }
    };

    let html = render_index(&videos, state.config.monitor.max_instances);
    with_head(http::build_html_response(html), is_head)
}

/// `POST /`
pub async fn submit_form<B>(
    body: B,
    content_length: Option<u64>,
    state: &Arc<AppState>,
) -> Response<ResponseBody>
where
    B: Body,
    B::Error: Into<Box<dyn Error + Send + Sync>>,
{
    let max_body_size = state.config.http.max_body_size;
    if content_length.is_some_and(|len| len > max_body_size) {
        logger::log_warning(&format!(
            "Request body too large: {content_length:?} bytes (max: {max_body_size})"
        ));
        return http::build_413_response();
    }

    let limit = usize::try_from(max_body_size).unwrap_or(usize::MAX);
    let bytes = match Limited::new(body, limit).collect().await {
        Ok(collected) => collected.to_bytes(),
        Err(e) if e.downcast_ref::<LengthLimitError>().is_some() => {
            logger::log_warning(&format!("Request body exceeds {max_body_size} bytes"));
            return http::build_413_response();
        }
        Err(e) => {
            logger::log_warning(&format!("Failed to read request body: {e}"));
            return http::build_400_response("unreadable body");
        }
    };

    let form = match PlayForm::parse(&bytes, state.config.monitor.max_instances) {
        Ok(form) => form,
        Err(reason) => {
            logger::log_warning(&format!("Rejected form: {reason}"));
            return http::build_400_response(&reason);
        }
    };

    let Some(path) = resolve_video_path(&state.config.media.video_dir, &form.video).await else {
        return http::build_404_response();
    };

    let message = if state.config.monitor.trigger.on_submit() {
        monitor::start_monitoring(state, &form.video, path, form.count);
        format!(
            "Monitoring started for {} with {} player(s).",
            form.video, form.count
        )
    } else {
        format!("Playing {} in {} player(s).", form.video, form.count)
    };

    http::build_html_response(render_player(&form.video, form.count, &message))
}

fn with_head(mut resp: Response<ResponseBody>, is_head: bool) -> Response<ResponseBody> {
    if is_head {
        *resp.body_mut() = http::empty();
    }
    resp
}

fn video_href(name: &str) -> String {
    format!("/video/{}", utf8_percent_encode(name, LINK_SAFE))
}

/// Escape text for HTML element content and double-quoted attributes
pub fn escape_html(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
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

/// Index page: one link per video plus the playback form
pub fn render_index(videos: &[String], max_instances: u32) -> String {
    let mut links = String::new();
    let mut options = String::new();

    for name in videos {
        let label = escape_html(name);
        let _ = writeln!(
            links,
            r#"      <li><a href="{}">{label}</a></li>"#,
            escape_html(&video_href(name))
        );
        let _ = writeln!(options, r#"        <option value="{label}">{label}</option>"#);
    }

    if videos.is_empty() {
        links.push_str("      <li>No videos found.</li>\n");
    }

    format!(
        r#"<!DOCTYPE html>
<html>
  <head>
    <meta charset="utf-8">
    <title>Video Streaming</title>
  </head>
  <body>
    <h1>Available Videos</h1>
    <ul>
{links}    </ul>
    <form method="post" action="/">
      <label for="video">Video:</label>
      <select id="video" name="video">
{options}      </select>
      <label for="count">Players:</label>
      <input id="count" name="count" type="number" min="1" max="{max_instances}" value="1">
      <button type="submit">Play</button>
    </form>
  </body>
</html>
"#
    )
}

/// Player page with `count` video elements for the same file
pub fn render_player(video: &str, count: u32, message: &str) -> String {
    let src = escape_html(&video_href(video));
    let mime = mime::content_type_for(Path::new(video));
    let mut players = String::new();
    for _ in 0..count {
        let _ = writeln!(
            players,
            r#"    <video width="320" height="240" controls autoplay muted><source src="{src}" type="{mime}"></video>"#
        );
    }

    format!(
        r#"<!DOCTYPE html>
<html>
  <head>
    <meta charset="utf-8">
    <title>{title}</title>
  </head>
  <body>
    <p>{message}</p>
{players}    <p><a href="/">Back</a></p>
  </body>
</html>
"#,
        title = escape_html(video),
        message = escape_html(message),
    )
}
