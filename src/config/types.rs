// Configuration types module
// Defines all configuration-related data structures

use serde::Deserialize;
use std::path::PathBuf;

/// Main configuration structure
#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    pub server: ServerConfig,
    pub media: MediaConfig,
    pub http: HttpConfig,
    pub monitor: MonitorConfig,
    pub logging: LoggingConfig,
    pub performance: PerformanceConfig,
}

/// Server configuration
#[derive(Debug, Deserialize, Clone)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    pub workers: Option<usize>,
}

/// Source and destination directories
#[derive(Debug, Deserialize, Clone)]
pub struct MediaConfig {
    /// Directory the catalog lists and streams from
    pub video_dir: PathBuf,
    /// Directory monitoring reports and plots are written to
    pub output_dir: PathBuf,
}

/// HTTP configuration
#[derive(Debug, Deserialize, Clone)]
pub struct HttpConfig {
    pub server_name: String,
    /// Honor the `Range` request header on `/video/*`
    pub enable_range: bool,
    pub max_body_size: u64,
}

/// What starts a monitoring job
#[derive(Debug, Deserialize, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum MonitorTrigger {
    /// Form submission on `POST /`
    Submit,
    /// Fresh playback on `GET /video/*`
    Stream,
    Both,
    Off,
}

impl MonitorTrigger {
    pub const fn on_submit(self) -> bool {
        matches!(self, Self::Submit | Self::Both)
    }

    pub const fn on_stream(self) -> bool {
        matches!(self, Self::Stream | Self::Both)
    }
}

/// Shape of the report written when a job ends
#[derive(Debug, Deserialize, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ReportStyle {
    /// Every sample line followed by CPU / memory averages
    Samples,
    /// CPU, memory and network averages only
    Averages,
}

/// Monitoring configuration
#[derive(Debug, Deserialize, Clone)]
pub struct MonitorConfig {
    pub trigger: MonitorTrigger,
    pub report: ReportStyle,
    pub interval_secs: u64,
    /// Duration used when the file is neither MP4/MOV nor Matroska/WebM, or has no
    /// readable duration; `None` skips monitoring
    #[serde(default)]
    pub fallback_duration_secs: Option<u64>,
    /// Append each sample to the report as it is taken
    pub incremental: bool,
    pub max_instances: u32,
}

/// Logging configuration
#[derive(Debug, Deserialize, Clone)]
pub struct LoggingConfig {
    pub access_log: bool,
    /// Access log format (combined, common or json)
    pub access_log_format: String,
    /// Access log file path (optional, stdout if not set)
    #[serde(default)]
    pub access_log_file: Option<String>,
    /// Error log file path (optional, stderr if not set)
    #[serde(default)]
    pub error_log_file: Option<String>,
}

/// Performance configuration
#[derive(Debug, Deserialize, Clone)]
pub struct PerformanceConfig {
    /// Upper bound on the lifetime of one connection, in seconds
    pub connection_timeout: u64,
    pub keep_alive: bool,
    pub max_connections: Option<u64>,
}
