//! Event handler for Claude Code hooks.
//!
//! Reads JSON from stdin, applies the event to the project's current session
//! and prints the hook response on stdout.
//!
//! ## Event Flow
//!
//! ```text
//! SessionStart     → new current session        → "Session tracking initialized"
//! PostToolUse      → tool + file sets updated   → suppressed
//! UserPromptSubmit → prompt counted             → suppressed
//! Stop             → finalized, archived, sync  → "Session complete: ..."
//! ```

use devhooks_core::{
    load_config, EventLog, HookInput, HookOutput, NoopLauncher, Recorder, StorageConfig,
    SyncLauncher, TrackerEvent,
};
use serde_json::{json, Value};
use std::env;
use std::io::{self, Read};
use std::path::PathBuf;

use crate::launcher::ProcessLauncher;

pub fn run() -> Result<(), String> {
    let mut input = String::new();
    io::stdin()
        .read_to_string(&mut input)
        .map_err(|e| format!("Failed to read stdin: {}", e))?;

    if input.trim().is_empty() {
        emit(&HookOutput::silent());
        return Ok(());
    }

    let raw: Value = match serde_json::from_str(&input) {
        Ok(raw) => raw,
        Err(e) => {
            tracing::warn!(error = %e, "Failed to parse hook input");
            emit(&HookOutput::tracker_warning(&e.to_string()));
            return Ok(());
        }
    };
    let hook_input: HookInput = match serde_json::from_value(raw.clone()) {
        Ok(hook_input) => hook_input,
        Err(e) => {
            tracing::warn!(error = %e, "Hook input has unexpected shape");
            emit(&HookOutput::tracker_warning(&e.to_string()));
            return Ok(());
        }
    };

    let project_dir = resolve_project_dir(
        env::var("CLAUDE_PROJECT_DIR").ok(),
        hook_input.cwd.as_deref(),
    );
    let storage = StorageConfig::for_project(&project_dir).map_err(String::from)?;

    let output = handle_hook_input(&hook_input, &raw, &storage);
    emit(&output);
    Ok(())
}

/// `CLAUDE_PROJECT_DIR`, then the payload's `cwd`, then the process cwd.
fn resolve_project_dir(env_dir: Option<String>, payload_cwd: Option<&str>) -> PathBuf {
    env_dir
        .as_deref()
        .into_iter()
        .chain(payload_cwd)
        .map(str::trim)
        .find(|dir| !dir.is_empty())
        .map(PathBuf::from)
        .or_else(|| env::current_dir().ok())
        .unwrap_or_else(|| PathBuf::from("."))
}

fn handle_hook_input(
    hook_input: &HookInput,
    raw: &Value,
    storage: &StorageConfig,
) -> HookOutput {
    let config = load_config(storage);
    if !config.tracking_enabled() {
        tracing::debug!(event = %hook_input.event_name(), "Tracking disabled; skipping");
        return HookOutput::silent();
    }

    let event_log = EventLog::new(storage, config.observability.debug);
    event_log.record_hook(hook_input.event_name(), raw);

    let Some(event) = hook_input.to_event() else {
        tracing::debug!(event = %hook_input.event_name(), "Untracked hook event");
        return HookOutput::silent();
    };

    let launcher: Box<dyn SyncLauncher> = if config.sync_enabled() {
        Box::new(ProcessLauncher::new(storage.project_dir()))
    } else {
        Box::new(NoopLauncher)
    };
    let recorder = Recorder::new(storage, &config, launcher);

    match event {
        TrackerEvent::Start { session_id } => {
            let project_name = storage.project_name();
            let started = match session_id {
                Some(id) => recorder.on_start_with_id(&project_name, &id),
                None => recorder.on_start(&project_name),
            };
            match started {
                Ok(id) => HookOutput::session_started(&id),
                Err(e) => {
                    tracing::warn!(error = %e, "Failed to start session");
                    event_log.note("session start failed", json!({ "error": e.to_string() }));
                    HookOutput::silent()
                }
            }
        }
        TrackerEvent::ToolUse {
            tool_name,
            success,
            file_path,
            operation,
        } => {
            recorder.on_tool_use(&tool_name, success, file_path.as_deref(), operation);
            HookOutput::silent()
        }
        TrackerEvent::PromptSubmit => {
            recorder.on_prompt_submit();
            HookOutput::silent()
        }
        TrackerEvent::Stop => {
            // Stop fires every turn; only the call that finalizes reports.
            let open_session = recorder
                .store()
                .load_current()
                .is_some_and(|session| !session.is_finalized());
            match recorder.on_stop() {
                Some(summary) if open_session => HookOutput::session_complete(&summary),
                _ => HookOutput::silent(),
            }
        }
    }
}

/// `devhooks-hook config`: effective configuration with secrets masked.
pub fn print_config(project_dir: Option<PathBuf>) -> Result<(), String> {
    let project_dir = match project_dir {
        Some(dir) => dir,
        None => resolve_project_dir(env::var("CLAUDE_PROJECT_DIR").ok(), None),
    };
    let storage = StorageConfig::for_project(&project_dir).map_err(String::from)?;
    let config = load_config(&storage).redacted();
    let json = serde_json::to_string_pretty(&config)
        .map_err(|e| format!("Failed to serialize config: {}", e))?;
    println!("{}", json);
    Ok(())
}

fn emit(output: &HookOutput) {
    match serde_json::to_string(output) {
        Ok(json) => println!("{}", json),
        Err(e) => tracing::warn!(error = %e, "Failed to serialize hook output"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use devhooks_core::SessionStore;
    use std::path::Path;
    use tempfile::tempdir;

    fn storage(root: &Path, config: &str) -> StorageConfig {
        let storage = StorageConfig::with_roots(root.join("demo"), root.join("home"));
        fs_err::create_dir_all(storage.project_claude_dir()).unwrap();
        fs_err::write(storage.project_config_yaml(), config).unwrap();
        storage
    }

    fn send(storage: &StorageConfig, payload: Value) -> HookOutput {
        let input: HookInput = serde_json::from_value(payload.clone()).unwrap();
        handle_hook_input(&input, &payload, storage)
    }

    #[test]
    fn project_dir_prefers_env_then_payload() {
        assert_eq!(
            resolve_project_dir(Some("/env/dir".into()), Some("/payload")),
            PathBuf::from("/env/dir")
        );
        assert_eq!(
            resolve_project_dir(Some("  ".into()), Some("/payload")),
            PathBuf::from("/payload")
        );
        assert_eq!(
            resolve_project_dir(None, None),
            env::current_dir().unwrap()
        );
    }

    #[test]
    fn disabled_tracking_is_silent_and_writes_nothing() {
        let temp = tempdir().unwrap();
        let storage = storage(temp.path(), "observability:\n  enabled: false\n");

        let output = send(&storage, json!({"hook_event_name": "SessionStart"}));
        assert_eq!(output, HookOutput::silent());
        assert!(!storage.current_session_file().exists());
    }

    #[test]
    fn start_then_stop_reports_once() {
        let temp = tempdir().unwrap();
        let storage = storage(temp.path(), "observability:\n  enabled: true\n");

        let started = send(
            &storage,
            json!({"hook_event_name": "SessionStart", "session_id": "0123456789abcdef"}),
        );
        assert_eq!(started, HookOutput::session_started("0123456789abcdef"));

        send(
            &storage,
            json!({"hook_event_name": "PostToolUse", "tool_name": "Edit",
                   "tool_input": {"file_path": "/demo/a.py"}}),
        );

        let stopped = send(&storage, json!({"hook_event_name": "Stop"}));
        let message = stopped.system_message.expect("stop message");
        assert!(message.starts_with("📊 Session complete: 1 tools, 1 files modified"));

        let again = send(&storage, json!({"hook_event_name": "Stop"}));
        assert_eq!(again, HookOutput::silent());
        assert_eq!(SessionStore::new(&storage).list_archived().len(), 1);
    }

    #[test]
    fn stop_on_leftover_finalized_slot_is_silent() {
        let temp = tempdir().unwrap();
        let storage = storage(temp.path(), "observability:\n  enabled: true\n");
        let store = SessionStore::new(&storage);

        send(&storage, json!({"hook_event_name": "SessionStart"}));
        send(&storage, json!({"hook_event_name": "Stop"}));
        let archive = store.list_archived().remove(0);
        store
            .save_current(&store.load_archived(&archive).unwrap())
            .unwrap();

        let again = send(&storage, json!({"hook_event_name": "Stop"}));
        assert_eq!(again, HookOutput::silent());
        assert_eq!(store.list_archived().len(), 1);
        assert!(store.load_current().is_none());
    }

    #[test]
    fn debug_mode_logs_hook_events() {
        let temp = tempdir().unwrap();
        let storage = storage(temp.path(), "observability:\n  enabled: true\n  debug: true\n");

        send(&storage, json!({"hook_event_name": "Notification", "message": "hi"}));

        let entries: Vec<_> = fs_err::read_dir(storage.hook_events_dir())
            .unwrap()
            .collect();
        assert_eq!(entries.len(), 1);
    }
}
