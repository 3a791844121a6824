//! Optional JSONL logs kept next to the session files when `observability.debug`
//! is on. Nothing here may fail a hook; write errors are only traced.

use std::io::Write;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use fs_err as fs;
use serde_json::{json, Value};

use crate::storage::StorageConfig;

pub struct EventLog {
    events_dir: PathBuf,
    debug_dir: PathBuf,
    enabled: bool,
}

impl EventLog {
    pub fn new(storage: &StorageConfig, enabled: bool) -> Self {
        EventLog {
            events_dir: storage.hook_events_dir(),
            debug_dir: storage.debug_dir(),
            enabled,
        }
    }

    /// Appends `{timestamp, event, data}` to `events-<date>.jsonl`.
    pub fn record_hook(&self, event: &str, data: &Value) {
        self.record_hook_at(event, data, Utc::now());
    }

    pub fn record_hook_at(&self, event: &str, data: &Value, at: DateTime<Utc>) {
        if !self.enabled {
            return;
        }
        let entry = json!({
            "timestamp": at.to_rfc3339(),
            "event": event,
            "data": data,
        });
        append_line(&self.events_dir, "events", at, &entry);
    }

    /// Appends a free-form note to `debug-<date>.jsonl`.
    pub fn note(&self, message: &str, context: Value) {
        if !self.enabled {
            return;
        }
        let at = Utc::now();
        let entry = json!({
            "timestamp": at.to_rfc3339(),
            "message": message,
            "context": context,
        });
        append_line(&self.debug_dir, "debug", at, &entry);
    }
}

pub fn daily_file(dir: &Path, prefix: &str, at: DateTime<Utc>) -> PathBuf {
    dir.join(format!("{}-{}.jsonl", prefix, at.format("%Y-%m-%d")))
}

fn append_line(dir: &Path, prefix: &str, at: DateTime<Utc>, entry: &Value) {
    let path = daily_file(dir, prefix, at);
    let result = fs::create_dir_all(dir).and_then(|_| {
        let mut file = fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)?;
        writeln!(file, "{}", entry)
    });
    if let Err(err) = result {
        tracing::debug!(error = %err, path = %path.display(), "Could not append event log line");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use tempfile::tempdir;

    fn storage(root: &Path) -> StorageConfig {
        StorageConfig::with_roots(root.join("project"), root.join("home"))
    }

    #[test]
    fn disabled_log_writes_nothing() {
        let temp = tempdir().unwrap();
        let storage = storage(temp.path());
        let log = EventLog::new(&storage, false);
        log.record_hook("Stop", &json!({}));
        log.note("ignored", Value::Null);
        assert!(!storage.observability_dir().exists());
    }

    #[test]
    fn hook_events_append_one_line_each() {
        let temp = tempdir().unwrap();
        let storage = storage(temp.path());
        let log = EventLog::new(&storage, true);
        let at = Utc.with_ymd_and_hms(2025, 3, 14, 9, 26, 53).unwrap();

        log.record_hook_at("SessionStart", &json!({"session_id": "s1"}), at);
        log.record_hook_at("Stop", &json!({}), at);

        let path = storage.hook_events_dir().join("events-2025-03-14.jsonl");
        let content = fs::read_to_string(&path).unwrap();
        let lines: Vec<Value> = content
            .lines()
            .map(|line| serde_json::from_str(line).unwrap())
            .collect();
        assert_eq!(lines.len(), 2);
        assert_eq!(lines[0]["event"], "SessionStart");
        assert_eq!(lines[0]["data"]["session_id"], "s1");
        assert_eq!(lines[1]["event"], "Stop");
    }

    #[test]
    fn notes_go_to_debug_dir() {
        let temp = tempdir().unwrap();
        let storage = storage(temp.path());
        let log = EventLog::new(&storage, true);
        log.note("config loaded", json!({"sync": false}));

        let path = daily_file(&storage.debug_dir(), "debug", Utc::now());
        let content = fs::read_to_string(path).unwrap();
        assert!(content.contains("config loaded"));
    }
}
