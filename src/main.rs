use std::sync::atomic::AtomicUsize;
use std::sync::Arc;

mod config;
mod handler;
mod http;
mod logger;
mod monitor;
mod server;

fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Optional first argument: config file path without extension
    let cfg = match std::env::args().nth(1) {
        Some(path) => config::Config::load_from(&path)?,
        None => config::Config::load()?,
    };

    logger::init(&cfg)?;

    // Size the runtime from the workers setting
    let mut runtime_builder = tokio::runtime::Builder::new_multi_thread();
    runtime_builder.enable_all();

    if let Some(workers) = cfg.server.workers {
        runtime_builder.worker_threads(workers);
    }

    let runtime = runtime_builder.build()?;

    runtime.block_on(async_main(cfg))
}

async fn async_main(cfg: config::Config) -> Result<(), Box<dyn std::error::Error>> {
    let addr = cfg.get_socket_addr()?;

    tokio::fs::create_dir_all(&cfg.media.output_dir).await?;
    if !cfg.media.video_dir.is_dir() {
        logger::log_warning(&format!(
            "Video directory '{}' does not exist yet",
            cfg.media.video_dir.display()
        ));
    }

    let listener = server::create_reusable_listener(addr)?;
    let state = Arc::new(config::AppState::new(&cfg));
    let active_connections = Arc::new(AtomicUsize::new(0));

    server::signal::start_signal_handler(Arc::clone(&state.signals))?;
    logger::log_server_start(&addr, &cfg);

    // Use LocalSet for spawn_local support
    let local = tokio::task::LocalSet::new();
    local
        .run_until(server::start_server_loop(
            listener,
            Arc::clone(&state),
            active_connections,
        ))
        .await;

    // Jobs see the same shutdown flag and flush what they collected
    logger::log_shutdown(state.monitors.active());
    state.monitors.drain().await;
    logger::log_info("Server stopped");

    Ok(())
}
