// Application state module
// Shared by every connection and monitoring job

use std::sync::atomic::AtomicBool;
use std::sync::Arc;

use super::types::Config;
use crate::monitor::MonitorRegistry;
use crate::server::signal::SignalHandler;

/// Application state
pub struct AppState {
    pub config: Config,

    // Cached config values for fast access
    pub cached_access_log: Arc<AtomicBool>,

    /// Shutdown notifier shared with the signal task and monitoring jobs
    pub signals: Arc<SignalHandler>,

    /// Background monitoring jobs still running
    pub monitors: MonitorRegistry,
}

impl AppState {
    pub fn new(config: &Config) -> Self {
        Self {
            config: config.clone(),
            cached_access_log: Arc::new(AtomicBool::new(config.logging.access_log)),
            signals: Arc::new(SignalHandler::new()),
            monitors: MonitorRegistry::default(),
        }
    }
}
