// Configuration module entry point
// Loads the static configuration and holds the shared runtime state

mod state;
mod types;

use std::net::SocketAddr;

// Re-export public types
pub use state::AppState;
pub use types::{Config, MonitorConfig, MonitorTrigger, ReportStyle};

/// Default config file (without extension)
pub const DEFAULT_CONFIG_PATH: &str = "config";

impl Config {
    /// Load configuration from the default `config.toml`
    pub fn load() -> Result<Self, config::ConfigError> {
        Self::load_from(DEFAULT_CONFIG_PATH)
    }

    /// Load configuration from specified file path (extension optional)
    ///
    /// Missing files are fine: defaults and `VIDMON__*` environment variables still apply.
    pub fn load_from(config_path: &str) -> Result<Self, config::ConfigError> {
        let settings = config::Config::builder()
            .add_source(config::File::with_name(config_path).required(false))
            .add_source(config::Environment::with_prefix("VIDMON").separator("__"))
            .set_default("server.host", "127.0.0.1")?
            .set_default("server.port", 5000)?
            .set_default("media.video_dir", "videos")?
            .set_default("media.output_dir", "output")?
            .set_default("http.server_name", "vidmon")?
            .set_default("http.enable_range", true)?
            .set_default("http.max_body_size", 65_536)?
            .set_default("monitor.trigger", "submit")?
            .set_default("monitor.report", "averages")?
            .set_default("monitor.interval_secs", 1)?
            .set_default("monitor.incremental", false)?
            .set_default("monitor.max_instances", 16)?
            .set_default("logging.access_log", true)?
            .set_default("logging.access_log_format", "combined")?
            .set_default("performance.connection_timeout", 600)?
            .set_default("performance.keep_alive", true)?
            .build()?;

        settings.try_deserialize()
    }

    pub fn get_socket_addr(&self) -> Result<SocketAddr, String> {
        format!("{}:{}", self.server.host, self.server.port)
            .parse()
            .map_err(|e| format!("Invalid address: {e}"))
    }
}
