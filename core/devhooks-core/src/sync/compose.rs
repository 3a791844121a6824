//! Local collector auto-start via docker compose.
//!
//! Only used when `langfuse.auto_start` is set and the health check fails.

use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::Duration;

use fs_err as fs;
use tokio::process::Command;
use tokio::time::{sleep, timeout, Instant};

use crate::config::LangfuseConfig;
use crate::error::{Result, TrackerError};
use crate::storage::StorageConfig;

use super::langfuse::LangfuseClient;

/// How long a freshly started collector gets to report healthy.
pub const STARTUP_WAIT: Duration = Duration::from_secs(180);
const COMPOSE_UP_TIMEOUT: Duration = Duration::from_secs(30);
const HEALTH_POLL_INTERVAL: Duration = Duration::from_secs(2);

/// Finds the compose file for a local Langfuse.
///
/// An explicit `compose_path` wins if it exists. Otherwise the well-known
/// locations are searched and a file only counts if it mentions langfuse.
pub fn find_compose_file(config: &LangfuseConfig, storage: &StorageConfig) -> Option<PathBuf> {
    let configured = config.compose_path.trim();
    if !configured.is_empty() {
        let path = expand_home(configured, storage.home_dir());
        if path.exists() {
            return Some(path);
        }
        tracing::debug!(path = %path.display(), "Configured compose_path does not exist");
    }

    storage.compose_search_paths().into_iter().find(|path| {
        fs::read_to_string(path)
            .map(|content| content.to_lowercase().contains("langfuse"))
            .unwrap_or(false)
    })
}

pub(super) async fn start_collector(
    config: &LangfuseConfig,
    storage: &StorageConfig,
) -> Result<()> {
    let compose_file = find_compose_file(config, storage).ok_or_else(|| {
        TrackerError::CommandFailed {
            command: "docker compose up -d".to_string(),
            details: "no Langfuse docker-compose.yml found".to_string(),
        }
    })?;
    let workdir = compose_file
        .parent()
        .map(Path::to_path_buf)
        .unwrap_or_else(|| PathBuf::from("."));

    tracing::info!(compose = %compose_file.display(), "Starting local collector");

    match run_compose_up("docker", &["compose", "up", "-d"], &workdir).await {
        Err(TrackerError::Io { source, .. }) if source.kind() == std::io::ErrorKind::NotFound => {
            run_compose_up("docker-compose", &["up", "-d"], &workdir).await
        }
        other => other,
    }
}

async fn run_compose_up(program: &str, args: &[&str], workdir: &Path) -> Result<()> {
    let command_line = format!("{} {}", program, args.join(" "));
    let mut child = Command::new(program)
        .args(args)
        .current_dir(workdir)
        .stdin(Stdio::null())
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .kill_on_drop(true)
        .spawn()
        .map_err(|e| TrackerError::io(format!("spawning {}", command_line), e))?;

    let status = match timeout(COMPOSE_UP_TIMEOUT, child.wait()).await {
        Ok(status) => {
            status.map_err(|e| TrackerError::io(format!("waiting for {}", command_line), e))?
        }
        Err(_) => {
            return Err(TrackerError::CommandFailed {
                command: command_line,
                details: format!("no exit after {}s", COMPOSE_UP_TIMEOUT.as_secs()),
            })
        }
    };

    if status.success() {
        Ok(())
    } else {
        Err(TrackerError::CommandFailed {
            command: command_line,
            details: format!("exited with {}", status),
        })
    }
}

/// Polls the health endpoint until it answers or `wait` elapses.
pub(super) async fn wait_for_health(client: &LangfuseClient, wait: Duration) -> bool {
    let deadline = Instant::now() + wait;
    loop {
        if client.is_healthy().await {
            return true;
        }
        if Instant::now() + HEALTH_POLL_INTERVAL > deadline {
            return false;
        }
        sleep(HEALTH_POLL_INTERVAL).await;
    }
}

fn expand_home(path: &str, home: &Path) -> PathBuf {
    match path.strip_prefix("~/") {
        Some(rest) => home.join(rest),
        None if path == "~" => home.to_path_buf(),
        None => PathBuf::from(path),
    }
}
