//! Resource monitoring module
//!
//! Background jobs that sample CPU, memory and network usage while a video
//! plays, then write a text report and a plot to the output directory.

pub mod job;
pub mod plot;
pub mod probe;
pub mod report;
pub mod sampler;

pub use job::MonitorJob;

use std::path::PathBuf;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;
use tokio::task::JoinHandle;

use crate::config::AppState;
use crate::logger;

/// One reading of the system counters
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Sample {
    /// Seconds since the job started
    pub elapsed_secs: f64,
    pub cpu_percent: f32,
    pub memory_percent: f32,
    /// Cumulative bytes sent on all interfaces, in GB
    pub net_sent_gb: f64,
    /// Cumulative bytes received on all interfaces, in GB
    pub net_recv_gb: f64,
}

/// Running monitoring tasks, awaited on shutdown so reports get flushed
#[derive(Debug, Default)]
pub struct MonitorRegistry {
    jobs: Mutex<Vec<JoinHandle<()>>>,
}

impl MonitorRegistry {
    pub fn track(&self, handle: JoinHandle<()>) {
        let mut jobs = self.jobs.lock().unwrap_or_else(PoisonError::into_inner);
        jobs.retain(|h| !h.is_finished());
        jobs.push(handle);
    }

    pub fn active(&self) -> usize {
        let jobs = self.jobs.lock().unwrap_or_else(PoisonError::into_inner);
        jobs.iter().filter(|h| !h.is_finished()).count()
    }

    /// Wait for every tracked job to finish
    pub async fn drain(&self) {
        let handles = std::mem::take(&mut *self.jobs.lock().unwrap_or_else(PoisonError::into_inner));
        for handle in handles {
            if let Err(e) = handle.await {
                logger::log_error(&format!("Monitoring task failed: {e}"));
            }
        }
    }
}

/// Start monitoring playback of `video` in the background
///
/// The duration probe runs inside the task, so the caller never waits on it.
/// When the probe fails the configured fallback duration is used, or the job
/// is skipped.
pub fn start_monitoring(state: &Arc<AppState>, video: &str, video_path: PathBuf, instances: u32) {
    let state_clone = Arc::clone(state);
    let video = video.to_string();

    let handle = tokio::spawn(async move {
        let Some(duration) = resolve_duration(&state_clone, &video, video_path).await else {
            return;
        };

        let job = MonitorJob::new(
            &video,
            duration,
            instances,
            &state_clone.config.monitor,
            state_clone.config.media.output_dir.clone(),
        );
        job.run(Arc::clone(&state_clone.signals)).await;
    });

    state.monitors.track(handle);
}

async fn resolve_duration(state: &AppState, video: &str, video_path: PathBuf) -> Option<Duration> {
    let probed = tokio::task::spawn_blocking(move || probe::probe_duration(&video_path)).await;

    let error = match probed {
        Ok(Ok(duration)) if !duration.is_zero() => {
            logger::log_info(&format!(
                "Video duration for {video}: {:.2} seconds",
                duration.as_secs_f64()
            ));
            return Some(duration);
        }
        Ok(Ok(_)) => "video has zero duration".to_string(),
        Ok(Err(e)) => format!("cannot read duration: {e}"),
        Err(e) => format!("probe task failed: {e}"),
    };

    match state.config.monitor.fallback_duration_secs {
        Some(secs) => {
            logger::log_warning(&format!(
                "Error obtaining duration from video {video}: {error}; using {secs}s"
            ));
            Some(Duration::from_secs(secs))
        }
        None => {
            logger::log_monitor_skipped(video, &error);
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;

    fn test_state(output_dir: &std::path::Path, fallback: Option<u64>) -> Arc<AppState> {
        let mut cfg = Config::load_from("does/not/exist/vidmon").unwrap();
        cfg.media.output_dir = output_dir.to_path_buf();
        cfg.monitor.fallback_duration_secs = fallback;
        Arc::new(AppState::new(&cfg))
    }

    #[tokio::test]
    async fn test_registry_drains_jobs() {
        let registry = MonitorRegistry::default();
        let (tx, rx) = tokio::sync::oneshot::channel::<()>();
        registry.track(tokio::spawn(async move {
            let _ = rx.await;
        }));
        assert_eq!(registry.active(), 1);

        tx.send(()).unwrap();
        registry.drain().await;
        assert_eq!(registry.active(), 0);
    }

    #[tokio::test]
    async fn test_unreadable_duration_uses_fallback() {
        let dir = tempfile::tempdir().unwrap();
        let video = dir.path().join("clip.mp4");
        std::fs::write(&video, b"no boxes here").unwrap();

        let state = test_state(dir.path(), Some(3));
        let duration = resolve_duration(&state, "clip.mp4", video.clone()).await;
        assert_eq!(duration, Some(Duration::from_secs(3)));

        let state = test_state(dir.path(), None);
        assert_eq!(resolve_duration(&state, "clip.mp4", video).await, None);
    }

    #[tokio::test]
    async fn test_skipped_job_writes_nothing() {
        let out = tempfile::tempdir().unwrap();
        let state = test_state(out.path(), None);

        start_monitoring(&state, "missing.mp4", out.path().join("missing.mp4"), 1);
        state.monitors.drain().await;
        assert_eq!(std::fs::read_dir(out.path()).unwrap().count(), 0);
    }
}
