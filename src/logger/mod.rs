//! Logger module
//!
//! Logging utilities for the server:
//! - Server lifecycle logging
//! - Access logging in several formats
//! - Monitoring job progress
//! - Error and warning logging, optionally to files

mod format;
pub mod writer;

pub use format::AccessLogEntry;

use crate::config::Config;
use std::net::SocketAddr;
use std::path::Path;

/// Initialize the logger with configuration
///
/// Should be called once at application startup.
pub fn init(config: &Config) -> std::io::Result<()> {
    writer::init(
        config.logging.access_log_file.as_deref(),
        config.logging.error_log_file.as_deref(),
    )
}

fn write_info(message: &str) {
    match writer::get() {
        Some(w) => w.write_info(message),
        None => println!("{message}"),
    }
}

fn write_error(message: &str) {
    match writer::get() {
        Some(w) => w.write_error(message),
        None => eprintln!("{message}"),
    }
}

fn write_access(message: &str) {
    match writer::get() {
        Some(w) => w.write_access(message),
        None => println!("{message}"),
    }
}

pub fn log_server_start(addr: &SocketAddr, config: &Config) {
    write_info("======================================");
    write_info("Video server started successfully");
    write_info(&format!("Listening on: http://{addr}"));
    write_info(&format!("Video directory: {}", config.media.video_dir.display()));
    write_info(&format!("Output directory: {}", config.media.output_dir.display()));
    write_info(&format!(
        "Range requests: {}",
        if config.http.enable_range { "enabled" } else { "disabled" }
    ));
    write_info(&format!(
        "Monitoring: trigger={:?}, report={:?}, interval={}s",
        config.monitor.trigger, config.monitor.report, config.monitor.interval_secs
    ));
    if let Some(workers) = config.server.workers {
        write_info(&format!("Worker threads: {workers}"));
    }
    if let Some(ref path) = config.logging.access_log_file {
        write_info(&format!("Access log: {path}"));
    }
    if let Some(ref path) = config.logging.error_log_file {
        write_info(&format!("Error log: {path}"));
    }
    write_info("======================================");
}

pub fn log_info(message: &str) {
    write_info(&format!("[INFO] {message}"));
}

pub fn log_connection_accepted(peer_addr: &SocketAddr) {
    write_info(&format!("[Connection] Accepted from: {peer_addr}"));
}

pub fn log_connection_error(err: &impl std::fmt::Debug) {
    write_error(&format!("[ERROR] Failed to serve connection: {err:?}"));
}

pub fn log_error(message: &str) {
    write_error(&format!("[ERROR] {message}"));
}

pub fn log_warning(message: &str) {
    write_error(&format!("[WARN] {message}"));
}

pub fn log_access(entry: &AccessLogEntry, format: &str) {
    write_access(&entry.format(format));
}

pub fn log_monitor_started(video: &str, duration_secs: f64, instances: u32) {
    write_info(&format!(
        "[Monitor] Started for {video}: {duration_secs:.2}s, {instances} instance(s)"
    ));
}

pub fn log_monitor_skipped(video: &str, reason: &str) {
    write_error(&format!(
        "[WARN] [Monitor] Skipped for {video}: {reason}"
    ));
}

pub fn log_sample(video: &str, elapsed: f64, cpu: f32, memory: f32) {
    write_info(&format!(
        "[Monitor] {video} t={elapsed:.2}s CPU {cpu}% Memory {memory}%"
    ));
}

pub fn log_report_saved(path: &Path) {
    write_info(&format!("[Monitor] Saved {}", path.display()));
}

pub fn log_shutdown(pending_jobs: usize) {
    write_info(&format!(
        "[Shutdown] Stopped accepting connections, waiting for {pending_jobs} monitoring job(s)"
    ));
}
