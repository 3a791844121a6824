//! Background sync process entry point.
//!
//! Runs detached from the hook that spawned it. The outcome only reaches the
//! log (and the debug log when `observability.debug` is on); the archive stays
//! the source of truth either way.

use devhooks_core::sync::sync_archive;
use devhooks_core::{load_config, EventLog, StorageConfig, SyncOutcome};
use serde_json::json;
use std::path::Path;

pub fn run(archive: &Path, project_dir: &Path) {
    match StorageConfig::for_project(project_dir) {
        Ok(storage) => {
            run_with_storage(archive, &storage);
        }
        Err(e) => tracing::warn!(error = %e, "Sync aborted"),
    }
}

fn run_with_storage(archive: &Path, storage: &StorageConfig) -> Option<SyncOutcome> {
    let config = load_config(storage);

    let runtime = match tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
    {
        Ok(runtime) => runtime,
        Err(e) => {
            tracing::warn!(error = %e, "Failed to start sync runtime");
            return None;
        }
    };

    let outcome = runtime.block_on(sync_archive(&config, storage, archive));

    let (status, detail) = match &outcome {
        SyncOutcome::Synced { events } => ("synced", json!({ "events": events })),
        SyncOutcome::Skipped(reason) => {
            ("skipped", json!({ "reason": format!("{:?}", reason) }))
        }
        SyncOutcome::Failed(reason) => ("failed", json!({ "error": reason })),
    };
    EventLog::new(storage, config.observability.debug).note(
        "langfuse sync",
        json!({
            "archive": archive.display().to_string(),
            "status": status,
            "detail": detail,
        }),
    );
    Some(outcome)
}
