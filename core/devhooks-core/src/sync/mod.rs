//! Best-effort remote sync of finalized sessions.
//!
//! The recorder only ever calls [`SyncLauncher::launch`], which must return
//! immediately. The actual attempt ([`sync_archive`]) runs elsewhere, normally
//! in a detached `devhooks-hook sync` process, under a bounded timeout.
//!
//! ```text
//! Pending → Attempted → Synced
//!                     → Skipped   (disabled, no credentials)
//!                     → Failed    (collector unreachable, rejected, timeout)
//! ```
//!
//! All terminal states look the same to the caller: the archive written before
//! launch is the source of truth and is never touched here.

mod compose;
mod langfuse;

use std::path::Path;
use std::time::Duration;

use crate::config::PluginConfig;
use crate::error::TrackerError;
use crate::session::{load_session_file, Session};
use crate::storage::StorageConfig;

pub use compose::find_compose_file;
pub use langfuse::{build_ingestion_batch, LangfuseClient};

/// Budget for a plain sync attempt.
pub const SYNC_TIMEOUT: Duration = Duration::from_secs(30);
/// Budget when the collector may first need to be started via docker compose.
pub const SYNC_TIMEOUT_WITH_STARTUP: Duration = Duration::from_secs(300);

/// Hands a finalized archive record to whatever performs the sync.
pub trait SyncLauncher {
    /// Must not block and must not fail.
    fn launch(&self, archive: &Path);
}

/// Launcher used when remote sync is disabled.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopLauncher;

impl SyncLauncher for NoopLauncher {
    fn launch(&self, archive: &Path) {
        tracing::debug!(archive = %archive.display(), "Remote sync disabled; archive kept locally");
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkipReason {
    Disabled,
    MissingCredentials,
    NotFinalized,
}

#[derive(Debug, Clone, PartialEq)]
pub enum SyncOutcome {
    Synced { events: usize },
    Skipped(SkipReason),
    Failed(String),
}

#[derive(Debug, Clone, PartialEq)]
pub enum SyncState {
    Pending,
    Attempted,
    Done(SyncOutcome),
}

/// Tracks one session's progress through the sync state machine.
#[derive(Debug)]
pub struct SyncAttempt {
    session_id: String,
    state: SyncState,
}

impl SyncAttempt {
    pub fn new(session_id: &str) -> Self {
        SyncAttempt {
            session_id: session_id.to_string(),
            state: SyncState::Pending,
        }
    }

    pub fn state(&self) -> &SyncState {
        &self.state
    }

    pub fn begin(&mut self) {
        if self.state == SyncState::Pending {
            self.state = SyncState::Attempted;
        }
    }

    /// Records the terminal state. Only the first outcome sticks.
    pub fn finish(&mut self, outcome: SyncOutcome) -> SyncOutcome {
        if let SyncState::Done(existing) = &self.state {
            return existing.clone();
        }
        match &outcome {
            SyncOutcome::Synced { events } => {
                tracing::info!(session = %self.session_id, events, "Session synced to collector")
            }
            SyncOutcome::Skipped(reason) => {
                tracing::debug!(session = %self.session_id, ?reason, "Session sync skipped")
            }
            SyncOutcome::Failed(error) => {
                tracing::warn!(session = %self.session_id, error = %error, "Session sync failed")
            }
        }
        self.state = SyncState::Done(outcome.clone());
        outcome
    }
}

/// Loads an archived session and syncs it within the configured time budget.
pub async fn sync_archive(
    config: &PluginConfig,
    storage: &StorageConfig,
    archive: &Path,
) -> SyncOutcome {
    let session = match load_session_file(archive) {
        Ok(session) => session,
        Err(err) => {
            let mut attempt = SyncAttempt::new("unknown");
            attempt.begin();
            return attempt.finish(SyncOutcome::Failed(err.to_string()));
        }
    };

    let budget = sync_timeout(config);
    let mut attempt = SyncAttempt::new(&session.session_id);
    attempt.begin();
    let outcome = match tokio::time::timeout(budget, try_sync(config, storage, &session)).await {
        Ok(outcome) => outcome,
        Err(_) => SyncOutcome::Failed(TrackerError::Timeout(budget.as_secs()).to_string()),
    };
    attempt.finish(outcome)
}

pub fn sync_timeout(config: &PluginConfig) -> Duration {
    if config.observability.langfuse.auto_start {
        SYNC_TIMEOUT_WITH_STARTUP
    } else {
        SYNC_TIMEOUT
    }
}

/// One best-effort attempt to forward a finalized session. Never errors.
pub async fn try_sync(
    config: &PluginConfig,
    storage: &StorageConfig,
    session: &Session,
) -> SyncOutcome {
    let langfuse = &config.observability.langfuse;

    if !config.sync_enabled() {
        return SyncOutcome::Skipped(SkipReason::Disabled);
    }
    if !langfuse.has_credentials() {
        return SyncOutcome::Skipped(SkipReason::MissingCredentials);
    }
    if !session.is_finalized() {
        return SyncOutcome::Skipped(SkipReason::NotFinalized);
    }

    let client = match LangfuseClient::new(langfuse) {
        Ok(client) => client,
        Err(err) => return SyncOutcome::Failed(err.to_string()),
    };

    if !client.is_healthy().await {
        if !langfuse.auto_start {
            return SyncOutcome::Failed(format!("collector unreachable at {}", client.base_url()));
        }
        if let Err(err) = compose::start_collector(langfuse, storage).await {
            return SyncOutcome::Failed(err.to_string());
        }
        if !compose::wait_for_health(&client, compose::STARTUP_WAIT).await {
            return SyncOutcome::Failed(format!(
                "collector at {} not healthy after startup",
                client.base_url()
            ));
        }
    }

    let batch = build_ingestion_batch(session, langfuse);
    match client.ingest(&batch).await {
        Ok(events) => SyncOutcome::Synced { events },
        Err(err) => SyncOutcome::Failed(err.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use tempfile::tempdir;

    fn finalized_session() -> Session {
        let mut session = Session::new("abc123".to_string(), "demo", Utc::now());
        session.finalize(Utc::now());
        session
    }

    fn storage(root: &Path) -> StorageConfig {
        StorageConfig::with_roots(root.join("demo"), root.join("home"))
    }

    fn enabled_config() -> PluginConfig {
        let mut config = PluginConfig::default();
        config.observability.enabled = true;
        config.observability.langfuse.enabled = true;
        config
    }

    #[test]
    fn attempt_walks_pending_attempted_done() {
        let mut attempt = SyncAttempt::new("s1");
        assert_eq!(attempt.state(), &SyncState::Pending);
        attempt.begin();
        assert_eq!(attempt.state(), &SyncState::Attempted);
        attempt.finish(SyncOutcome::Skipped(SkipReason::Disabled));
        assert_eq!(
            attempt.state(),
            &SyncState::Done(SyncOutcome::Skipped(SkipReason::Disabled))
        );
    }

    #[test]
    fn attempt_keeps_first_terminal_outcome() {
        let mut attempt = SyncAttempt::new("s1");
        attempt.begin();
        attempt.finish(SyncOutcome::Synced { events: 3 });
        let second = attempt.finish(SyncOutcome::Failed("late".to_string()));
        assert_eq!(second, SyncOutcome::Synced { events: 3 });
    }

    #[test]
    fn timeout_grows_with_auto_start() {
        let mut config = enabled_config();
        assert_eq!(sync_timeout(&config), SYNC_TIMEOUT);
        config.observability.langfuse.auto_start = true;
        assert_eq!(sync_timeout(&config), SYNC_TIMEOUT_WITH_STARTUP);
    }

    #[tokio::test]
    async fn disabled_sync_is_skipped() {
        let temp = tempdir().unwrap();
        let storage = storage(temp.path());
        let outcome = try_sync(&PluginConfig::default(), &storage, &finalized_session()).await;
        assert_eq!(outcome, SyncOutcome::Skipped(SkipReason::Disabled));
    }

    #[tokio::test]
    async fn missing_credentials_are_skipped() {
        let temp = tempdir().unwrap();
        let storage = storage(temp.path());
        let outcome = try_sync(&enabled_config(), &storage, &finalized_session()).await;
        assert_eq!(outcome, SyncOutcome::Skipped(SkipReason::MissingCredentials));
    }

    #[tokio::test]
    async fn open_session_is_not_synced() {
        let temp = tempdir().unwrap();
        let mut config = enabled_config();
        config.observability.langfuse.public_key = "pk".to_string();
        config.observability.langfuse.secret_key = "sk".to_string();
        let open = Session::new("open".to_string(), "demo", Utc::now());
        let outcome = try_sync(&config, &storage(temp.path()), &open).await;
        assert_eq!(outcome, SyncOutcome::Skipped(SkipReason::NotFinalized));
    }

    #[tokio::test]
    async fn unreadable_archive_fails_quietly() {
        let temp = tempdir().unwrap();
        let outcome = sync_archive(
            &enabled_config(),
            &storage(temp.path()),
            &temp.path().join("missing.json"),
        )
        .await;
        assert!(matches!(outcome, SyncOutcome::Failed(_)));
    }
}
