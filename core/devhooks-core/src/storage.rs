//! Storage configuration and path management for session tracking.
//!
//! All on-disk locations are derived here from two roots: the project
//! directory (per-project observability data) and the user's home directory
//! (global plugin settings and the operational log).
//!
//! Tests use [`StorageConfig::with_roots`] to point both at temp directories.

use std::path::{Path, PathBuf};

use crate::error::{Result, TrackerError};

const PLUGIN_NAME: &str = "dev-plugin";

/// Central configuration for all session tracking paths.
#[derive(Debug, Clone)]
pub struct StorageConfig {
    /// Project being tracked (CLAUDE_PROJECT_DIR)
    project_dir: PathBuf,
    /// User home directory (default: `dirs::home_dir()`)
    home_dir: PathBuf,
}

impl StorageConfig {
    /// Uses the real home directory.
    pub fn for_project(project_dir: &Path) -> Result<Self> {
        let home_dir = dirs::home_dir().ok_or(TrackerError::HomeNotFound)?;
        Ok(Self::with_roots(project_dir.to_path_buf(), home_dir))
    }

    pub fn with_roots(project_dir: PathBuf, home_dir: PathBuf) -> Self {
        Self {
            project_dir,
            home_dir,
        }
    }

    pub fn project_dir(&self) -> &Path {
        &self.project_dir
    }

    pub fn home_dir(&self) -> &Path {
        &self.home_dir
    }

    /// Last path component of the project directory, used as the project name.
    pub fn project_name(&self) -> String {
        self.project_dir
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_else(|| self.project_dir.to_string_lossy().into_owned())
    }

    // ─────────────────────────────────────────────────────────────────────────────
    // Project Paths
    // ─────────────────────────────────────────────────────────────────────────────

    /// `<project>/.claude`
    pub fn project_claude_dir(&self) -> PathBuf {
        self.project_dir.join(".claude")
    }

    /// `<project>/.claude/observability`
    pub fn observability_dir(&self) -> PathBuf {
        self.project_claude_dir().join("observability")
    }

    /// The single current-session slot.
    pub fn current_session_file(&self) -> PathBuf {
        self.observability_dir().join("current-session.json")
    }

    /// Marker pointing at the most recently finalized session.
    pub fn last_session_file(&self) -> PathBuf {
        self.observability_dir().join("last-session.json")
    }

    /// Archive of finalized sessions, one file per session.
    pub fn archive_dir(&self) -> PathBuf {
        self.observability_dir().join("sessions")
    }

    pub fn hook_events_dir(&self) -> PathBuf {
        self.observability_dir().join("hook-events")
    }

    pub fn debug_dir(&self) -> PathBuf {
        self.observability_dir().join("debug")
    }

    pub fn project_config_yaml(&self) -> PathBuf {
        self.project_claude_dir().join(format!("{}.yaml", PLUGIN_NAME))
    }

    pub fn project_config_legacy(&self) -> PathBuf {
        self.project_claude_dir()
            .join(format!("{}.local.md", PLUGIN_NAME))
    }

    pub fn project_env_file(&self) -> PathBuf {
        self.project_claude_dir().join(".env")
    }

    // ─────────────────────────────────────────────────────────────────────────────
    // Global Paths
    // ─────────────────────────────────────────────────────────────────────────────

    /// `~/.claude/plugins/dev-plugin` - survives plugin cache wipes on update.
    pub fn global_plugin_dir(&self) -> PathBuf {
        self.home_dir
            .join(".claude")
            .join("plugins")
            .join(PLUGIN_NAME)
    }

    pub fn global_config_yaml(&self) -> PathBuf {
        self.global_plugin_dir().join(format!("{}.yaml", PLUGIN_NAME))
    }

    pub fn global_config_legacy(&self) -> PathBuf {
        self.global_plugin_dir().join("settings.local.md")
    }

    pub fn global_env_file(&self) -> PathBuf {
        self.global_plugin_dir().join(".env")
    }

    pub fn logs_dir(&self) -> PathBuf {
        self.global_plugin_dir().join("logs")
    }

    // ─────────────────────────────────────────────────────────────────────────────
    // Collector Discovery
    // ─────────────────────────────────────────────────────────────────────────────

    /// Candidate docker-compose files for a local Langfuse, in search order.
    pub fn compose_search_paths(&self) -> Vec<PathBuf> {
        vec![
            self.project_dir.join("langfuse").join("docker-compose.yml"),
            self.project_dir.join("docker-compose.yml"),
            self.home_dir.join("langfuse-docker").join("docker-compose.yml"),
            self.home_dir.join("langfuse").join("docker-compose.yml"),
            self.home_dir.join(".langfuse").join("docker-compose.yml"),
        ]
    }
}
