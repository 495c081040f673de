// Server loop module
// Accepts connections until shutdown is requested

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;

use super::connection::accept_connection;
use crate::config;
use crate::logger;

/// How long open connections get to finish once shutdown is requested
const SHUTDOWN_GRACE: Duration = Duration::from_secs(5);

/// How often the connection counter is checked while draining
const DRAIN_POLL: Duration = Duration::from_millis(50);

/// Accept connections until the shutdown notifier fires.
///
/// Must run inside a `LocalSet`: connections are served with `spawn_local`.
/// After the listener is closed, open connections get `SHUTDOWN_GRACE` to
/// finish; connection tasks still running after that are dropped with the
/// `LocalSet`.
pub async fn start_server_loop(
    listener: TcpListener,
    state: Arc<config::AppState>,
    active_connections: Arc<AtomicUsize>,
) {
    let signals = Arc::clone(&state.signals);

    loop {
        if signals.is_shutdown_requested() {
            break;
        }

        tokio::select! {
            accept_result = listener.accept() => {
                match accept_result {
                    Ok((stream, peer_addr)) => {
                        accept_connection(stream, peer_addr, &state, &active_connections);
                    }
                    Err(e) => {
                        logger::log_error(&format!("Failed to accept connection: {e}"));
                    }
                }
            }

            () = signals.shutdown.notified() => break,
        }
    }

    drop(listener);
    drain_connections(&active_connections, SHUTDOWN_GRACE).await;
}

/// Keep polling until every connection has ended or `grace` elapses
async fn drain_connections(active_connections: &AtomicUsize, grace: Duration) {
    let deadline = tokio::time::Instant::now() + grace;

    loop {
        let open = active_connections.load(Ordering::SeqCst);
        if open == 0 {
            return;
        }
        if tokio::time::Instant::now() >= deadline {
            logger::log_warning(&format!(
                "[Shutdown] {open} connection(s) still open after {}s, closing",
                grace.as_secs()
            ));
            return;
        }
        tokio::time::sleep(DRAIN_POLL).await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use crate::server::listener::create_reusable_listener;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};

    fn test_state(video_dir: &std::path::Path) -> Arc<config::AppState> {
        let mut cfg = Config::load_from("does/not/exist/vidmon").unwrap();
        cfg.media.video_dir = video_dir.to_path_buf();
        cfg.logging.access_log = false;
        Arc::new(config::AppState::new(&cfg))
    }

    #[tokio::test]
    async fn test_serves_until_shutdown() {
        let videos = tempfile::tempdir().unwrap();
        std::fs::write(videos.path().join("clip.mp4"), vec![1u8; 1000]).unwrap();

        let state = test_state(videos.path());

        let listener = create_reusable_listener("127.0.0.1:0".parse().unwrap()).unwrap();
        let addr = listener.local_addr().unwrap();

        let local = tokio::task::LocalSet::new();
        local
            .run_until(async {
                let server = tokio::task::spawn_local(start_server_loop(
                    listener,
                    Arc::clone(&state),
                    Arc::new(AtomicUsize::new(0)),
                ));

                let mut stream = tokio::net::TcpStream::connect(addr).await.unwrap();
                stream
                    .write_all(
                        b"GET /video/clip.mp4 HTTP/1.1\r\nHost: localhost\r\n\
                          Range: bytes=200-299\r\nConnection: close\r\n\r\n",
                    )
                    .await
                    .unwrap();
                let mut raw = Vec::new();
                stream.read_to_end(&mut raw).await.unwrap();
                let text = String::from_utf8_lossy(&raw);
                assert!(text.starts_with("HTTP/1.1 206"), "got: {text}");
                assert!(text.to_ascii_lowercase().contains("content-range: bytes 200-299/1000"));

                state.signals.request_shutdown();
                tokio::time::timeout(Duration::from_secs(2), server)
                    .await
                    .unwrap()
                    .unwrap();
            })
            .await;
    }

    #[tokio::test]
    async fn test_shutdown_lets_open_connection_finish() {
        let videos = tempfile::tempdir().unwrap();
        std::fs::write(videos.path().join("clip.mp4"), vec![1u8; 1000]).unwrap();
        let state = test_state(videos.path());

        let listener = create_reusable_listener("127.0.0.1:0".parse().unwrap()).unwrap();
        let addr = listener.local_addr().unwrap();
        let active = Arc::new(AtomicUsize::new(0));

        let local = tokio::task::LocalSet::new();
        local
            .run_until(async {
                let server = tokio::task::spawn_local(start_server_loop(
                    listener,
                    Arc::clone(&state),
                    Arc::clone(&active),
                ));

                let mut stream = tokio::net::TcpStream::connect(addr).await.unwrap();
                stream.write_all(b"GET /video/clip.mp4 HTTP/1.1\r\n").await.unwrap();
                while active.load(Ordering::SeqCst) == 0 {
                    tokio::task::yield_now().await;
                }

                // Request is half sent when shutdown starts
                state.signals.request_shutdown();
                tokio::time::sleep(Duration::from_millis(100)).await;
                assert!(!server.is_finished());

                stream
                    .write_all(b"Host: localhost\r\nConnection: close\r\n\r\n")
                    .await
                    .unwrap();
                let mut raw = Vec::new();
                stream.read_to_end(&mut raw).await.unwrap();
                assert!(String::from_utf8_lossy(&raw).starts_with("HTTP/1.1 200"));

                tokio::time::timeout(Duration::from_secs(2), server)
                    .await
                    .unwrap()
                    .unwrap();
                assert_eq!(active.load(Ordering::SeqCst), 0);
            })
            .await;
    }

    #[tokio::test]
    async fn test_drain_gives_up_after_grace() {
        let active = AtomicUsize::new(1);
        let started = tokio::time::Instant::now();
        drain_connections(&active, Duration::from_millis(120)).await;
        assert!(started.elapsed() >= Duration::from_millis(120));

        let active = AtomicUsize::new(0);
        tokio::time::timeout(Duration::from_millis(20), drain_connections(&active, SHUTDOWN_GRACE))
            .await
            .unwrap();
    }
}
