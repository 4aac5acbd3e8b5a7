//! Logging and tracing configuration
//!
//! A test run can be cut short by the reboot it triggers, so besides stderr
//! every invocation also appends to `runtime/bootrun.log` under the workspace
//! root. That file is the only trace of what happened before the machine went
//! down.

use std::path::Path;
use tracing_appender::rolling::{RollingFileAppender, Rotation};
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Initialize tracing for the CLI
///
/// Logs are controlled by the `RUST_LOG` environment variable.
/// Default level is INFO for this crate, WARN for dependencies.
/// Returns false when the log file could not be set up and only stderr is used.
pub fn init(log_file: &Path) -> bool {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("bootrun=info,warn"));

    let stderr_layer = fmt::layer()
        .with_writer(std::io::stderr)
        .with_target(false)
        .with_thread_ids(false)
        .with_file(false)
        .with_line_number(false)
        .compact();

    let file_layer = open_log_file(log_file).map(|appender| {
        fmt::layer()
            .with_writer(appender)
            .with_ansi(false)
            .with_target(true)
            .with_file(true)
            .with_line_number(true)
    });
    let has_file = file_layer.is_some();

    let installed = tracing_subscriber::registry()
        .with(filter)
        .with(stderr_layer)
        .with(file_layer)
        .try_init()
        .is_ok();
    installed && has_file
}

/// Appender for `log_file`, creating its directory; `None` if either fails
fn open_log_file(log_file: &Path) -> Option<RollingFileAppender> {
    let dir = log_file.parent()?;
    let name = log_file.file_name()?;
    std::fs::create_dir_all(dir).ok()?;
    RollingFileAppender::builder()
        .rotation(Rotation::NEVER)
        .filename_prefix(name.to_string_lossy())
        .build(dir)
        .ok()
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_init_logs_to_file_once() {
        let dir = tempdir().unwrap();
        let log_file = dir.path().join("runtime").join("bootrun.log");

        assert!(init(&log_file));
        tracing::warn!("logging initialized");
        assert!(log_file.is_file());

        // A second subscriber cannot be installed
        assert!(!init(&log_file));
    }

    #[test]
    fn test_unusable_log_dir_gives_no_file() {
        let dir = tempdir().unwrap();
        let blocker = dir.path().join("runtime");
        std::fs::write(&blocker, "not a directory").unwrap();
        assert!(open_log_file(&blocker.join("bootrun.log")).is_none());
    }
}
