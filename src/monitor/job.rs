//! Monitoring job
//!
//! Samples system counters for the length of a video, then writes the report
//! and plot. Ends early when shutdown is requested; whatever was collected is
//! still written.

use std::path::PathBuf;
use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::{Instant, MissedTickBehavior};

use super::report::{self, Averages, ReportPaths};
use super::sampler::Sampler;
use super::{plot, Sample};
use crate::config::{MonitorConfig, ReportStyle};
use crate::logger;
use crate::server::signal::SignalHandler;

/// One monitoring run
#[derive(Debug, Clone)]
pub struct MonitorJob {
    pub video: String,
    pub duration: Duration,
    pub instances: u32,
    pub interval: Duration,
    pub style: ReportStyle,
    pub incremental: bool,
    pub output_dir: PathBuf,
}

impl MonitorJob {
    pub fn new(
        video: &str,
        duration: Duration,
        instances: u32,
        config: &MonitorConfig,
        output_dir: PathBuf,
    ) -> Self {
        Self {
            video: video.to_string(),
            duration,
            instances,
            interval: Duration::from_secs(config.interval_secs.max(1)),
            style: config.report,
            incremental: config.incremental,
            output_dir,
        }
    }

    pub fn paths(&self) -> ReportPaths {
        ReportPaths::new(&self.output_dir, &self.video, self.style)
    }

    /// Sample until the duration elapses or shutdown, then write the report
    pub async fn run(self, signals: Arc<SignalHandler>) {
        logger::log_monitor_started(&self.video, self.duration.as_secs_f64(), self.instances);

        if let Err(e) = tokio::fs::create_dir_all(&self.output_dir).await {
            logger::log_error(&format!(
                "Cannot create output directory '{}': {e}",
                self.output_dir.display()
            ));
            return;
        }

        let started = Instant::now();
        let (Some(first_tick), Some(deadline)) = (
            started.checked_add(self.interval),
            started.checked_add(self.duration),
        ) else {
            logger::log_monitor_skipped(
                &self.video,
                &format!("duration {:?} is out of range", self.duration),
            );
            return;
        };

        let samples = self.collect(&signals, started, first_tick, deadline).await;
        self.finish(samples).await;
    }

    async fn collect(
        &self,
        signals: &SignalHandler,
        started: Instant,
        first_tick: Instant,
        deadline: Instant,
    ) -> Vec<Sample> {
        let paths = self.paths();
        let mut sampler = Sampler::new();
        let mut ticker = tokio::time::interval_at(first_tick, self.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        let mut samples = Vec::new();

        loop {
            if signals.shutdown_requested.load(Ordering::SeqCst) {
                break;
            }
            tokio::select! {
                _ = ticker.tick() => {}
                () = tokio::time::sleep_until(deadline) => break,
                () = signals.shutdown.notified() => break,
            }

            let sample = sampler.sample(started.elapsed().as_secs_f64());
            logger::log_sample(
                &self.video,
                sample.elapsed_secs,
                sample.cpu_percent,
                sample.memory_percent,
            );
            if self.incremental {
                if let Err(e) = report::append_sample(&paths.text, &sample) {
                    logger::log_warning(&format!(
                        "Failed to append to '{}': {e}",
                        paths.text.display()
                    ));
                }
            }
            samples.push(sample);
        }

        samples
    }

    async fn finish(&self, samples: Vec<Sample>) {
        let Some(averages) = Averages::of(&samples) else {
            logger::log_warning(&format!(
                "[Monitor] No samples collected for {}, nothing written",
                self.video
            ));
            return;
        };

        logger::log_info(&format!(
            "[Monitor] {}: Average CPU Usage: {:.2}%, Average Memory Usage: {:.2}%",
            self.video, averages.cpu_percent, averages.memory_percent
        ));

        let paths = self.paths();
        let style = self.style;
        let video = self.video.clone();
        let written = tokio::task::spawn_blocking(move || {
            write_outputs(&paths, &video, style, &samples, &averages);
        })
        .await;

        if let Err(e) = written {
            logger::log_error(&format!("Report task for {} failed: {e}", self.video));
        }
    }
}

/// Text report then plot; a failure of one does not stop the other
fn write_outputs(
    paths: &ReportPaths,
    video: &str,
    style: ReportStyle,
    samples: &[Sample],
    averages: &Averages,
) {
    match report::write_report(&paths.text, style, samples, averages) {
        Ok(()) => logger::log_report_saved(&paths.text),
        Err(e) => logger::log_error(&format!(
            "Failed to write report '{}': {e}",
            paths.text.display()
        )),
    }

    let plotted = match style {
        ReportStyle::Samples => plot::draw_usage(&paths.plot, video, samples),
        ReportStyle::Averages => plot::draw_performance(&paths.plot, video, samples),
    };
    match plotted {
        Ok(()) => logger::log_report_saved(&paths.plot),
        Err(e) => logger::log_error(&format!(
            "Failed to draw plot '{}': {e}",
            paths.plot.display()
        )),
    }
}
