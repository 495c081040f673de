//! Video streaming module
//!
//! Serves `/video/<filename>`: whole files with 200, byte ranges with 206.
//! File bodies are streamed from disk in chunks.

use futures_util::stream;
use http_body_util::{BodyExt, StreamBody};
use hyper::body::{Bytes, Frame};
use hyper::Response;
use percent_encoding::percent_decode_str;
use std::io::{self, SeekFrom};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::fs::{self, File};
use tokio::io::{AsyncReadExt, AsyncSeekExt};

use crate::config::AppState;
use crate::handler::router::RequestContext;
use crate::http::range::{ByteRange, RangeParseResult, RangeRequest};
use crate::http::{self, mime, response, ResponseBody};
use crate::logger;
use crate::monitor;

/// Largest chunk read from disk per body frame
const CHUNK_SIZE: usize = 64 * 1024;

/// Serve one video file, starting a monitoring job for fresh playbacks
pub async fn serve_video(
    ctx: &RequestContext<'_>,
    encoded_name: &str,
    state: &Arc<AppState>,
) -> Response<ResponseBody> {
    let Ok(name) = percent_decode_str(encoded_name).decode_utf8() else {
        return http::build_404_response();
    };
    let Some(path) = resolve_video_path(&state.config.media.video_dir, &name).await else {
        return http::build_404_response();
    };

    let range_header = if state.config.http.enable_range {
        ctx.range_header.as_deref()
    } else {
        None
    };

    if state.config.monitor.trigger.on_stream() && !ctx.is_head && is_fresh_playback(range_header) {
        monitor::start_monitoring(state, &name, path.clone(), 1);
    }

    match respond(&path, range_header, ctx.is_head).await {
        Ok(resp) => resp,
        Err(e) if e.kind() == io::ErrorKind::NotFound => http::build_404_response(),
        Err(e) => {
            logger::log_error(&format!("Failed to read '{}': {e}", path.display()));
            http::build_500_response()
        }
    }
}

/// Build the response for `path` given an optional `Range` header value
///
/// I/O errors while opening the file are returned, not masked. Errors after
/// the headers are sent end the body stream.
pub async fn respond(
    path: &Path,
    range_header: Option<&str>,
    is_head: bool,
) -> io::Result<Response<ResponseBody>> {
    let size = fs::metadata(path).await?.len();

    match http::parse_range_header(range_header, size) {
        RangeParseResult::None => {
            let body = if is_head || size == 0 {
                http::empty()
            } else {
                open_range(path, ByteRange { start: 0, end: size - 1 }).await?
            };
            Ok(response::build_full_response(body, size, mime::content_type_for(path)))
        }
        RangeParseResult::Valid(range) => {
            let body = if is_head {
                http::empty()
            } else {
                open_range(path, range).await?
            };
            Ok(response::build_partial_response(body, range, size))
        }
        RangeParseResult::NotSatisfiable => Ok(http::build_416_response(size)),
    }
}

/// Stream exactly the bytes of `range`, at most `CHUNK_SIZE` per frame
///
/// A file that shrinks mid-stream ends the body with `UnexpectedEof`.
pub async fn open_range(path: &Path, range: ByteRange) -> io::Result<ResponseBody> {
    let mut file = File::open(path).await?;
    file.seek(SeekFrom::Start(range.start)).await?;

    let chunks = stream::try_unfold(file.take(range.len()), |mut reader| async move {
        let remaining = reader.limit();
        if remaining == 0 {
            return Ok(None);
        }

        let want = usize::try_from(remaining).map_or(CHUNK_SIZE, |r| r.min(CHUNK_SIZE));
        let mut buf = vec![0u8; want];
        let n = reader.read(&mut buf).await?;
        if n == 0 {
            return Err(io::Error::new(
                io::ErrorKind::UnexpectedEof,
                "file ended before the requested range",
            ));
        }
        buf.truncate(n);
        Ok::<_, io::Error>(Some((Frame::data(Bytes::from(buf)), reader)))
    });

    Ok(StreamBody::new(chunks).boxed_unsync())
}

/// Playback from the beginning, as opposed to a seek or a resumed download
fn is_fresh_playback(range_header: Option<&str>) -> bool {
    range_header.map_or(true, |h| RangeRequest::parse(h).start == 0)
}

/// Map a request file name to a file inside `video_dir`
///
/// Names with path separators or leading dots are refused, and the canonical
/// path must stay inside the directory.
pub async fn resolve_video_path(video_dir: &Path, name: &str) -> Option<PathBuf> {
    if name.is_empty() || name.starts_with('.') || name.contains(['/', '\\', '\0']) {
        logger::log_warning(&format!("Rejected video name: {name:?}"));
        return None;
    }

    let dir_canonical = match fs::canonicalize(video_dir).await {
        Ok(p) => p,
        Err(e) => {
            logger::log_warning(&format!(
                "Video directory not found or inaccessible '{}': {e}",
                video_dir.display()
            ));
            return None;
        }
    };

    // Missing files are a plain 404
    let file_canonical = fs::canonicalize(video_dir.join(name)).await.ok()?;
    if !file_canonical.starts_with(&dir_canonical) {
        logger::log_warning(&format!(
            "Path traversal attempt blocked: {name} -> {}",
            file_canonical.display()
        ));
        return None;
    }

    let metadata = fs::metadata(&file_canonical).await.ok()?;
    metadata.is_file().then_some(file_canonical)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{Config, MonitorTrigger};

    fn video_bytes(size: usize) -> Vec<u8> {
        (0..size).map(|i| u8::try_from(i % 251).unwrap()).collect()
    }

    fn write_video(dir: &Path, name: &str, size: usize) -> PathBuf {
        let path = dir.join(name);
        std::fs::write(&path, video_bytes(size)).unwrap();
        path
    }

    async fn body_of(resp: Response<ResponseBody>) -> Vec<u8> {
        resp.into_body().collect().await.unwrap().to_bytes().to_vec()
    }

    fn header(resp: &Response<ResponseBody>, name: &str) -> Option<String> {
        resp.headers()
            .get(name)
            .and_then(|v| v.to_str().ok())
            .map(ToString::to_string)
    }

    #[tokio::test]
    async fn test_closed_range() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_video(dir.path(), "clip.mp4", 1000);

        let resp = respond(&path, Some("bytes=200-299"), false).await.unwrap();
        assert_eq!(resp.status(), 206);
        assert_eq!(header(&resp, "content-range").as_deref(), Some("bytes 200-299/1000"));
        assert_eq!(header(&resp, "accept-ranges").as_deref(), Some("bytes"));
        assert_eq!(header(&resp, "content-type").as_deref(), Some("video/mp4"));

        let body = body_of(resp).await;
        assert_eq!(body.len(), 100);
        assert_eq!(body, video_bytes(1000)[200..=299].to_vec());
    }

    #[tokio::test]
    async fn test_open_range() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_video(dir.path(), "clip.mp4", 1000);

        let resp = respond(&path, Some("bytes=500-"), false).await.unwrap();
        assert_eq!(resp.status(), 206);
        assert_eq!(header(&resp, "content-range").as_deref(), Some("bytes 500-999/1000"));
        let body = body_of(resp).await;
        assert_eq!(body, video_bytes(1000)[500..].to_vec());
    }

    #[tokio::test]
    async fn test_every_valid_range_matches_file() {
        let dir = tempfile::tempdir().unwrap();
        let size = 37;
        let path = write_video(dir.path(), "small.mp4", size);
        let content = video_bytes(size);

        for start in (0..size).step_by(5) {
            for end in (start..size).step_by(7) {
                let header_value = format!("bytes={start}-{end}");
                let resp = respond(&path, Some(&header_value), false).await.unwrap();
                assert_eq!(resp.status(), 206);
                assert_eq!(
                    header(&resp, "content-range"),
                    Some(format!("bytes {start}-{end}/{size}"))
                );
                assert_eq!(body_of(resp).await, content[start..=end].to_vec());
            }
        }
    }

    #[tokio::test]
    async fn test_no_range_serves_whole_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_video(dir.path(), "clip.webm", 1000);

        let resp = respond(&path, None, false).await.unwrap();
        assert_eq!(resp.status(), 200);
        assert!(resp.headers().get("content-range").is_none());
        assert_eq!(header(&resp, "content-type").as_deref(), Some("video/webm"));
        assert_eq!(body_of(resp).await, video_bytes(1000));
    }

    #[tokio::test]
    async fn test_malformed_range_serves_from_start() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_video(dir.path(), "clip.mp4", 1000);

        let resp = respond(&path, Some("bytes=-100"), false).await.unwrap();
        assert_eq!(resp.status(), 206);
        assert_eq!(header(&resp, "content-range").as_deref(), Some("bytes 0-999/1000"));
        assert_eq!(body_of(resp).await.len(), 1000);
    }

    #[tokio::test]
    async fn test_empty_range_header_serves_whole_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_video(dir.path(), "clip.mp4", 1000);

        let resp = respond(&path, Some(""), false).await.unwrap();
        assert_eq!(resp.status(), 200);
        assert!(resp.headers().get("content-range").is_none());
        assert_eq!(body_of(resp).await.len(), 1000);
    }

    #[tokio::test]
    async fn test_large_range_streams_in_chunks() {
        let dir = tempfile::tempdir().unwrap();
        let size = 3 * CHUNK_SIZE + 123;
        let path = write_video(dir.path(), "long.mp4", size);
        let content = video_bytes(size);

        let range = ByteRange { start: 1000, end: u64::try_from(size).unwrap() - 10 };
        let mut body = open_range(&path, range).await.unwrap();
        let mut frames = 0;
        let mut streamed = Vec::new();
        while let Some(frame) = body.frame().await {
            let data = frame.unwrap().into_data().unwrap();
            assert!(data.len() <= CHUNK_SIZE);
            streamed.extend_from_slice(&data);
            frames += 1;
        }
        assert!(frames > 1);
        assert_eq!(streamed, content[1000..size - 9].to_vec());

        let resp = respond(&path, None, false).await.unwrap();
        assert_eq!(body_of(resp).await, content);
    }

    #[tokio::test]
    async fn test_empty_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_video(dir.path(), "empty.mp4", 0);

        let resp = respond(&path, None, false).await.unwrap();
        assert_eq!(resp.status(), 200);
        assert_eq!(header(&resp, "content-length").as_deref(), Some("0"));
        assert!(body_of(resp).await.is_empty());
    }

    #[tokio::test]
    async fn test_unsatisfiable_range() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_video(dir.path(), "clip.mp4", 1000);

        let resp = respond(&path, Some("bytes=5000-"), false).await.unwrap();
        assert_eq!(resp.status(), 416);
        assert_eq!(header(&resp, "content-range").as_deref(), Some("bytes */1000"));
    }

    #[tokio::test]
    async fn test_head_has_headers_without_body() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_video(dir.path(), "clip.mp4", 1000);

        let resp = respond(&path, Some("bytes=200-299"), true).await.unwrap();
        assert_eq!(resp.status(), 206);
        assert_eq!(header(&resp, "content-length").as_deref(), Some("100"));
        assert!(body_of(resp).await.is_empty());

        let resp = respond(&path, None, true).await.unwrap();
        assert_eq!(header(&resp, "content-length").as_deref(), Some("1000"));
        assert!(body_of(resp).await.is_empty());
    }

    #[tokio::test]
    async fn test_missing_file_is_an_error() {
        let err = respond(Path::new("/no/such/video.mp4"), Some("bytes=0-1"), false)
            .await
            .unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::NotFound);
    }

    #[tokio::test]
    async fn test_resolve_video_path() {
        let dir = tempfile::tempdir().unwrap();
        let videos = dir.path().join("videos");
        std::fs::create_dir(&videos).unwrap();
        write_video(&videos, "clip.mp4", 10);
        write_video(dir.path(), "secret.mp4", 10);
        std::fs::create_dir(videos.join("sub")).unwrap();

        assert!(resolve_video_path(&videos, "clip.mp4").await.is_some());
        assert!(resolve_video_path(&videos, "missing.mp4").await.is_none());
        assert!(resolve_video_path(&videos, "../secret.mp4").await.is_none());
        assert!(resolve_video_path(&videos, "..").await.is_none());
        assert!(resolve_video_path(&videos, "sub").await.is_none());
        assert!(resolve_video_path(&videos, "").await.is_none());
    }

    #[tokio::test]
    async fn test_stream_trigger_starts_on_fresh_playback_only() {
        let videos = tempfile::tempdir().unwrap();
        let out = tempfile::tempdir().unwrap();
        write_video(videos.path(), "clip.mp4", 4096);

        let mut cfg = Config::load_from("does/not/exist/vidmon").unwrap();
        cfg.media.video_dir = videos.path().to_path_buf();
        cfg.media.output_dir = out.path().to_path_buf();
        cfg.monitor.trigger = MonitorTrigger::Stream;
        cfg.monitor.fallback_duration_secs = Some(60);
        let state = Arc::new(AppState::new(&cfg));

        let serve = |range: Option<&str>, is_head: bool| {
            let ctx = RequestContext {
                path: "/video/clip.mp4",
                is_head,
                range_header: range.map(ToString::to_string),
            };
            let state = Arc::clone(&state);
            async move { serve_video(&ctx, "clip.mp4", &state).await.status() }
        };

        assert_eq!(serve(None, false).await, 200);
        assert_eq!(state.monitors.active(), 1);

        assert_eq!(serve(Some("bytes=1024-"), false).await, 206);
        assert_eq!(serve(None, true).await, 200);
        assert_eq!(state.monitors.active(), 1);

        assert_eq!(serve(Some("bytes=0-"), false).await, 206);
        assert_eq!(state.monitors.active(), 2);

        // Shutdown before the first sample: jobs end without writing
        state.signals.request_shutdown();
        tokio::time::timeout(std::time::Duration::from_secs(5), state.monitors.drain())
            .await
            .unwrap();
        assert_eq!(state.monitors.active(), 0);
    }

    #[tokio::test]
    async fn test_submit_trigger_ignores_streaming() {
        let videos = tempfile::tempdir().unwrap();
        write_video(videos.path(), "clip.mp4", 16);

        let mut cfg = Config::load_from("does/not/exist/vidmon").unwrap();
        cfg.media.video_dir = videos.path().to_path_buf();
        cfg.monitor.trigger = MonitorTrigger::Submit;
        let state = Arc::new(AppState::new(&cfg));

        let ctx = RequestContext {
            path: "/video/clip.mp4",
            is_head: false,
            range_header: None,
        };
        assert_eq!(serve_video(&ctx, "clip.mp4", &state).await.status(), 200);
        assert_eq!(state.monitors.active(), 0);
    }

    #[test]
    fn test_fresh_playback() {
        assert!(is_fresh_playback(None));
        assert!(is_fresh_playback(Some("bytes=0-")));
        assert!(is_fresh_playback(Some("garbage")));
        assert!(!is_fresh_playback(Some("bytes=1024-")));
    }
}
