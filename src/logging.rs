use std::fs::File;
use std::io;
use std::path::Path;
use std::sync::Mutex;

use tracing::warn;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{fmt, EnvFilter};

/// Log to stderr and to `log_file`, which starts empty on every run.
pub fn init_logging(verbose: bool, log_file: &Path) {
    let default_level = if verbose { "debug" } else { "info" };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));

    let stderr_layer = fmt::layer().with_target(false).with_writer(std::io::stderr);

    match open_log_file(log_file) {
        Ok(file) => {
            let file_layer = fmt::layer()
                .with_target(false)
                .with_ansi(false)
                .with_writer(Mutex::new(file));
            let _ = tracing_subscriber::registry()
                .with(filter)
                .with(stderr_layer)
                .with(file_layer)
                .try_init();
        }
        Err(e) => {
            let _ = tracing_subscriber::registry()
                .with(filter)
                .with(stderr_layer)
                .try_init();
            warn!(
                path = %log_file.display(),
                error = %e,
                "Could not open log file, logging to stderr only"
            );
        }
    }
}

/// Create the diagnostics log, dropping whatever the previous run wrote.
pub(crate) fn open_log_file(path: &Path) -> io::Result<File> {
    File::create(path)
}
