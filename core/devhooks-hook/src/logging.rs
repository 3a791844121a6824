//! File logging for the hook binary.
//!
//! Stdout belongs to the host (hook responses), so logs go to a daily file
//! under `~/.claude/plugins/dev-plugin/logs/`.

use std::env;
use std::path::{Path, PathBuf};

use devhooks_core::StorageConfig;

use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::EnvFilter;

const LOG_FILE_PREFIX: &str = "devhooks-hook.log";

/// Installs the global subscriber. The guard must live until exit so buffered
/// lines are flushed; `None` means logging is off (no home directory or the
/// log directory could not be created).
pub fn init() -> Option<WorkerGuard> {
    let dir = log_dir()?;
    if let Err(e) = fs_err::create_dir_all(&dir) {
        eprintln!("devhooks-hook: logging disabled: {}", e);
        return None;
    }

    let appender = tracing_appender::rolling::daily(&dir, LOG_FILE_PREFIX);
    let (writer, guard) = tracing_appender::non_blocking(appender);

    let installed = tracing_subscriber::fmt()
        .with_env_filter(filter())
        .with_writer(writer)
        .with_ansi(false)
        .with_target(false)
        .try_init();
    if installed.is_err() {
        return None;
    }
    Some(guard)
}

fn log_dir() -> Option<PathBuf> {
    // Global paths only depend on the home root.
    StorageConfig::for_project(Path::new("."))
        .ok()
        .map(|storage| storage.logs_dir())
}

fn filter() -> EnvFilter {
    let debug_enabled = env::var("DEVHOOKS_DEBUG_LOG")
        .map(|value| matches!(value.as_str(), "1" | "true" | "TRUE" | "yes" | "YES"))
        .unwrap_or(false);
    if debug_enabled {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_env("DEVHOOKS_LOG").unwrap_or_else(|_| EnvFilter::new("info"))
    }
}
