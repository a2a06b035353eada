pub mod agent_core;
pub mod commands;
pub mod config;
pub mod desktop_client;
pub mod inference;
mod transport;

use std::path::Path;

use anyhow::Context;
use tracing_subscriber::fmt::writer::BoxMakeWriter;

use config::{LogFormat, RelayConfig};

/// Filter used when `RUST_LOG` is not set.
pub const DEFAULT_LOG_FILTER: &str = "desktop_relay=info,tower_http=info,warn";

/// Log file name inside `RELAY_LOG_DIR`.
const LOG_FILE_NAME: &str = "relay.log";

/// Rotated log files to keep.
const LOG_KEEP: u32 = 3;

/// Load config, install logging, and serve until Ctrl-C.
pub async fn run() -> anyhow::Result<()> {
    let config = RelayConfig::load().context("invalid relay configuration")?;
    init_tracing(&config)?;

    tracing::info!(
        version = env!("CARGO_PKG_VERSION"),
        bind = %config.bind_addr,
        agent_url = %config.agent_url,
        desktop_url = %config.desktop_url,
        agent_timeout_secs = config.agent_timeout.as_secs(),
        desktop_timeout_secs = config.desktop_timeout.as_secs(),
        pid = std::process::id(),
        "=== desktop-relay starting ==="
    );

    let state = commands::AppState::from_config(&config)?;
    let app = commands::router(state);

    let listener = tokio::net::TcpListener::bind(config.bind_addr)
        .await
        .with_context(|| format!("failed to bind {}", config.bind_addr))?;
    tracing::info!(addr = %config.bind_addr, "listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("server error")?;

    tracing::info!("desktop-relay stopped");
    Ok(())
}

async fn shutdown_signal() {
    match tokio::signal::ctrl_c().await {
        Ok(()) => tracing::info!("shutdown signal received"),
        Err(e) => tracing::error!(error = %e, "failed to listen for shutdown signal"),
    }
}

/// Install the global tracing subscriber.
///
/// Writes to stdout, or to `<log_dir>/relay.log` when a log directory is
/// configured. In the file case, existing logs are rotated first
/// (relay.log → relay.log.1 → .2 → .3) and every line is flushed as written.
pub fn init_tracing(config: &RelayConfig) -> anyhow::Result<()> {
    use tracing_subscriber::fmt;
    use tracing_subscriber::EnvFilter;

    let (writer, ansi) = match &config.log_dir {
        Some(dir) => (BoxMakeWriter::new(open_log_file(dir)?), false),
        None => (BoxMakeWriter::new(std::io::stdout), true),
    };

    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_LOG_FILTER));

    let installed = match config.log_format {
        LogFormat::Json => fmt::fmt()
            .json()
            .flatten_event(true)
            .with_current_span(false)
            .with_env_filter(filter)
            .with_writer(writer)
            .with_target(true)
            .try_init(),
        LogFormat::Pretty => fmt::fmt()
            .with_env_filter(filter)
            .with_writer(writer)
            .with_ansi(ansi)
            .with_target(true)
            .with_thread_ids(false)
            .try_init(),
    };

    installed.map_err(|e| anyhow::anyhow!("failed to install tracing subscriber: {e}"))
}

fn open_log_file(dir: &Path) -> anyhow::Result<FlushingWriter> {
    std::fs::create_dir_all(dir)
        .with_context(|| format!("failed to create log dir {}", dir.display()))?;

    let log_path = dir.join(LOG_FILE_NAME);
    rotate_log_file(&log_path, LOG_KEEP);

    let file = std::fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(&log_path)
        .with_context(|| format!("failed to open {}", log_path.display()))?;

    Ok(FlushingWriter::new(file))
}

/// Rotate log files: `relay.log` → `relay.log.1` → `.2` → … → `.{keep}`.
///
/// Oldest file beyond `keep` is deleted. Missing files in the chain are skipped.
fn rotate_log_file(base_path: &Path, keep: u32) {
    let oldest = format!("{}.{keep}", base_path.display());
    let _ = std::fs::remove_file(&oldest);

    for i in (1..keep).rev() {
        let from = format!("{}.{i}", base_path.display());
        let to = format!("{}.{}", base_path.display(), i + 1);
        let _ = std::fs::rename(&from, &to);
    }

    if base_path.exists() {
        let to = format!("{}.1", base_path.display());
        let _ = std::fs::rename(base_path, &to);
    }
}

/// File writer that flushes after every write, so a crash loses no lines.
#[derive(Clone)]
struct FlushingWriter {
    file: std::sync::Arc<std::sync::Mutex<std::fs::File>>,
}

impl FlushingWriter {
    fn new(file: std::fs::File) -> Self {
        Self {
            file: std::sync::Arc::new(std::sync::Mutex::new(file)),
        }
    }
}

impl std::io::Write for FlushingWriter {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        let mut f = self
            .file
            .lock()
            .map_err(|e| std::io::Error::other(format!("lock poisoned: {e}")))?;
        let n = std::io::Write::write(&mut *f, buf)?;
        std::io::Write::flush(&mut *f)?;
        Ok(n)
    }

    fn flush(&mut self) -> std::io::Result<()> {
        let mut f = self
            .file
            .lock()
            .map_err(|e| std::io::Error::other(format!("lock poisoned: {e}")))?;
        std::io::Write::flush(&mut *f)
    }
}

impl<'a> tracing_subscriber::fmt::MakeWriter<'a> for FlushingWriter {
    type Writer = FlushingWriter;

    fn make_writer(&'a self) -> Self::Writer {
        self.clone()
    }
}
