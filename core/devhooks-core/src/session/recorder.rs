//! Session event recorder.
//!
//! Holds no state between calls: every operation reads the current slot from
//! the [`SessionStore`], applies one event and writes it back, so each hook
//! invocation can be a fresh short-lived process.
//!
//! ```text
//! on_start         → current slot created
//! on_tool_use      → tool appended, file sets updated
//! on_prompt_submit → prompt counter bumped
//! on_stop          → summary frozen, archived, slot cleared, sync launched
//! ```
//!
//! Only `on_start` reports failure. Everything else logs and carries on,
//! because losing a tracking event must never disturb the host.

use chrono::Utc;
use ulid::Ulid;

use crate::config::PluginConfig;
use crate::error::Result;
use crate::storage::StorageConfig;
use crate::sync::SyncLauncher;

use super::store::{ArchiveOutcome, SessionStore};
use super::types::{FileOperation, Session, SessionId, SessionSummary};

pub struct Recorder {
    store: SessionStore,
    project_dir: Option<String>,
    tags: Vec<String>,
    launcher: Box<dyn SyncLauncher>,
}

impl Recorder {
    pub fn new(
        storage: &StorageConfig,
        config: &PluginConfig,
        launcher: Box<dyn SyncLauncher>,
    ) -> Self {
        Recorder {
            store: SessionStore::new(storage),
            project_dir: Some(storage.project_dir().to_string_lossy().into_owned()),
            tags: config.observability.langfuse.tags.clone(),
            launcher,
        }
    }

    pub fn store(&self) -> &SessionStore {
        &self.store
    }

    /// Starts a session under a freshly generated identifier.
    pub fn on_start(&self, project_name: &str) -> Result<SessionId> {
        self.on_start_with_id(project_name, &Ulid::new().to_string())
    }

    /// Starts a session under an identifier supplied by the host.
    ///
    /// A repeated start for the session that is already open leaves it intact.
    pub fn on_start_with_id(&self, project_name: &str, session_id: &str) -> Result<SessionId> {
        if let Some(existing) = self.store.load_current() {
            if !existing.is_finalized() && existing.session_id == session_id {
                tracing::debug!(session = %session_id, "Session already open; start ignored");
                return Ok(existing.session_id);
            }
            if !existing.is_finalized() {
                tracing::warn!(
                    replaced = %existing.session_id,
                    session = %session_id,
                    tools = existing.tools_used.len(),
                    "Replacing unfinalized session"
                );
            }
        }

        let mut session = Session::new(session_id.to_string(), project_name, Utc::now());
        session.project_dir = self.project_dir.clone();
        session.tags = self.tags.clone();
        self.store.save_current(&session)?;

        if let Err(err) = self.store.clear_finalized_marker() {
            tracing::warn!(error = %err, "Failed to clear finalized marker");
        }

        tracing::info!(session = %session_id, project = %project_name, "Session started");
        Ok(session.session_id)
    }

    pub fn on_tool_use(
        &self,
        tool_name: &str,
        success: bool,
        file_path: Option<&str>,
        operation: Option<FileOperation>,
    ) {
        let Some(mut session) = self.open_session("tool-use") else {
            return;
        };

        let file = match (file_path, operation) {
            (Some(path), Some(op)) if !path.is_empty() => Some((path, op)),
            _ => None,
        };
        session.record_tool(tool_name, success, Utc::now(), file);

        match self.store.save_current(&session) {
            Ok(()) => tracing::debug!(
                session = %session.session_id,
                tool = %tool_name,
                success,
                "Tool use recorded"
            ),
            Err(err) => {
                tracing::warn!(error = %err, tool = %tool_name, "Failed to record tool use")
            }
        }
    }

    pub fn on_prompt_submit(&self) {
        let Some(mut session) = self.open_session("prompt-submit") else {
            return;
        };
        session.record_prompt(Utc::now());
        if let Err(err) = self.store.save_current(&session) {
            tracing::warn!(error = %err, "Failed to record prompt");
        }
    }

    /// Finalizes the current session. A repeated stop returns the summary of
    /// the session it already finalized; with nothing to finalize it returns
    /// `None`.
    ///
    /// The finalized record is written back to the current slot first, and the
    /// slot is only cleared once the marker points at the archive. A stop
    /// retried after a partial failure therefore reuses the frozen summary,
    /// finds the same archive record and does not relaunch sync.
    pub fn on_stop(&self) -> Option<SessionSummary> {
        let Some(mut session) = self.store.load_current() else {
            return self.already_finalized();
        };

        let summary = session.finalize(Utc::now());
        if let Err(err) = self.store.save_current(&session) {
            tracing::warn!(
                error = %err,
                session = %session.session_id,
                "Failed to persist finalized session"
            );
        }

        let archived = match self.store.archive(&session) {
            Ok(archived) => archived,
            Err(err) => {
                tracing::warn!(
                    error = %err,
                    session = %session.session_id,
                    "Failed to archive session; leaving it current"
                );
                return Some(summary);
            }
        };
        let archive = archived.path();

        match self.store.mark_finalized(&session.session_id, archive) {
            Ok(()) => {
                if let Err(err) = self.store.clear_current() {
                    tracing::warn!(error = %err, "Failed to clear current session slot");
                }
            }
            Err(err) => tracing::warn!(
                error = %err,
                "Failed to write finalized marker; keeping finalized session current"
            ),
        }

        match &archived {
            ArchiveOutcome::Written(_) => {
                tracing::info!(
                    session = %session.session_id,
                    archive = %archive.display(),
                    total_tools = summary.total_tools,
                    duration_seconds = summary.duration_seconds,
                    "Session finalized"
                );
                self.launcher.launch(archive);
            }
            ArchiveOutcome::AlreadyArchived(_) => tracing::debug!(
                session = %session.session_id,
                archive = %archive.display(),
                "Session already archived; sync not relaunched"
            ),
        }
        Some(summary)
    }

    fn open_session(&self, event: &str) -> Option<Session> {
        match self.store.load_current() {
            Some(session) if session.is_finalized() => {
                tracing::warn!(
                    session = %session.session_id,
                    event,
                    "Session already finalized; event ignored"
                );
                None
            }
            Some(session) => Some(session),
            None => {
                tracing::warn!(event, "No current session; event ignored");
                None
            }
        }
    }

    fn already_finalized(&self) -> Option<SessionSummary> {
        let Some(marker) = self.store.last_finalized() else {
            tracing::warn!("Stop without a current session; nothing to finalize");
            return None;
        };
        match self.store.load_archived(&marker.archive) {
            Ok(session) => {
                tracing::debug!(session = %marker.session_id, "Session already finalized");
                session.summary
            }
            Err(err) => {
                tracing::warn!(
                    error = %err,
                    session = %marker.session_id,
                    "Finalized session unreadable"
                );
                None
            }
        }
    }
}
