//! File-backed session persistence.
//!
//! # Layout
//!
//! ```text
//! <project>/.claude/observability/
//!   current-session.json              single in-progress session slot
//!   last-session.json                 marker: most recently finalized session
//!   sessions/session-<ts>-<id>.json   archive, one record per finalized session
//! ```
//!
//! # Defensive Reads
//!
//! The slot may be inspected or hand-edited by the user mid-session, so reads
//! treat missing, empty and corrupt files as "no session" (logged, never an
//! error).
//!
//! # Atomic Writes
//!
//! Every write goes to a temp file in the target directory and is renamed into
//! place, so a concurrent reader never sees a partial record.

use chrono::{DateTime, Duration, Utc};
use fs_err as fs;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::io::Write;
use std::path::{Path, PathBuf};
use tempfile::NamedTempFile;

use crate::error::{Result, TrackerError};
use crate::storage::StorageConfig;

use super::types::Session;

const ARCHIVE_PREFIX: &str = "session-";
const ARCHIVE_TIMESTAMP_FORMAT: &str = "%Y%m%d-%H%M%S";
// "YYYYmmdd-HHMMSS-"
const ARCHIVE_TIMESTAMP_LEN: usize = 16;
const MAX_NAME_ATTEMPTS: usize = 60;

/// Points at the archive record of the last finalized session.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FinalizedMarker {
    pub session_id: String,
    pub archive: PathBuf,
    pub finalized_at: DateTime<Utc>,
}

/// Where [`SessionStore::archive`] left the record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ArchiveOutcome {
    Written(PathBuf),
    AlreadyArchived(PathBuf),
}

impl ArchiveOutcome {
    pub fn path(&self) -> &Path {
        match self {
            ArchiveOutcome::Written(path) | ArchiveOutcome::AlreadyArchived(path) => path,
        }
    }
}

/// Owns the on-disk representation of the current session and the archive.
#[derive(Debug, Clone)]
pub struct SessionStore {
    current_file: PathBuf,
    last_file: PathBuf,
    archive_dir: PathBuf,
}

impl SessionStore {
    pub fn new(storage: &StorageConfig) -> Self {
        SessionStore {
            current_file: storage.current_session_file(),
            last_file: storage.last_session_file(),
            archive_dir: storage.archive_dir(),
        }
    }

    pub fn current_file(&self) -> &Path {
        &self.current_file
    }

    pub fn archive_dir(&self) -> &Path {
        &self.archive_dir
    }

    // MARK: - Current slot

    pub fn load_current(&self) -> Option<Session> {
        read_json_lenient(&self.current_file, "current session")
    }

    pub fn save_current(&self, session: &Session) -> Result<()> {
        write_json_atomic(&self.current_file, session)
    }

    pub fn clear_current(&self) -> Result<()> {
        remove_if_exists(&self.current_file)
    }

    // MARK: - Archive

    /// Writes the finalized session into the archive.
    ///
    /// An archive record is immutable: if this exact finalization (same
    /// session id and start time) is already archived, its path is returned
    /// untouched. A later session reusing the id gets a new file.
    pub fn archive(&self, session: &Session) -> Result<ArchiveOutcome> {
        if let Some(existing) = self.find_archive_of(session) {
            return Ok(ArchiveOutcome::AlreadyArchived(existing));
        }
        let stamp = session.ended_at.unwrap_or_else(Utc::now);
        let path = self.free_archive_path(&session.session_id, stamp);
        write_json_atomic(&path, session)?;
        Ok(ArchiveOutcome::Written(path))
    }

    /// Most recently finalized archive record for a session id.
    pub fn find_archived(&self, session_id: &str) -> Option<PathBuf> {
        self.archived_records(session_id)
            .into_iter()
            .max_by_key(|(session, _)| session.ended_at)
            .map(|(_, path)| path)
    }

    fn find_archive_of(&self, session: &Session) -> Option<PathBuf> {
        self.archived_records(&session.session_id)
            .into_iter()
            .find(|(archived, _)| archived.started_at == session.started_at)
            .map(|(_, path)| path)
    }

    /// Records whose stored id equals `session_id` exactly. File names only
    /// narrow the search, since sanitizing can map distinct ids to one name.
    fn archived_records(&self, session_id: &str) -> Vec<(Session, PathBuf)> {
        let file_id = sanitize_id(session_id);
        self.list_archived()
            .into_iter()
            .filter(|path| {
                path.file_name()
                    .and_then(|name| name.to_str())
                    .and_then(archived_id)
                    .is_some_and(|id| id == file_id)
            })
            .filter_map(|path| match load_session_file(&path) {
                Ok(session) if session.session_id == session_id => Some((session, path)),
                Ok(_) => None,
                Err(err) => {
                    tracing::debug!(error = %err, "Skipping unreadable archive record");
                    None
                }
            })
            .collect()
    }

    /// Never reuses an occupied name; the stamp moves forward a second at a
    /// time instead.
    fn free_archive_path(&self, session_id: &str, stamp: DateTime<Utc>) -> PathBuf {
        let mut stamp = stamp;
        let mut path = self.archive_dir.join(archive_file_name(session_id, stamp));
        for _ in 0..MAX_NAME_ATTEMPTS {
            if !path.exists() {
                break;
            }
            stamp += Duration::seconds(1);
            path = self.archive_dir.join(archive_file_name(session_id, stamp));
        }
        path
    }

    /// Archive records, oldest first.
    pub fn list_archived(&self) -> Vec<PathBuf> {
        let entries = match fs::read_dir(&self.archive_dir) {
            Ok(entries) => entries,
            Err(_) => return Vec::new(),
        };
        let mut paths: Vec<PathBuf> = entries
            .filter_map(|entry| entry.ok())
            .map(|entry| entry.path())
            .filter(|path| {
                path.file_name()
                    .and_then(|name| name.to_str())
                    .and_then(archived_id)
                    .is_some()
            })
            .collect();
        paths.sort();
        paths
    }

    pub fn load_archived(&self, path: &Path) -> Result<Session> {
        load_session_file(path)
    }

    // MARK: - Finalized marker

    pub fn last_finalized(&self) -> Option<FinalizedMarker> {
        read_json_lenient(&self.last_file, "finalized marker")
    }

    pub fn mark_finalized(&self, session_id: &str, archive: &Path) -> Result<()> {
        let marker = FinalizedMarker {
            session_id: session_id.to_string(),
            archive: archive.to_path_buf(),
            finalized_at: Utc::now(),
        };
        write_json_atomic(&self.last_file, &marker)
    }

    pub fn clear_finalized_marker(&self) -> Result<()> {
        remove_if_exists(&self.last_file)
    }
}

/// Reads one session record (current slot or archive) strictly.
pub fn load_session_file(path: &Path) -> Result<Session> {
    let content = fs::read_to_string(path)
        .map_err(|e| TrackerError::io(format!("reading {}", path.display()), e))?;
    serde_json::from_str(&content)
        .map_err(|e| TrackerError::json(format!("parsing {}", path.display()), e))
}

/// `session-<YYYYmmdd-HHMMSS>-<id>.json`
pub fn archive_file_name(session_id: &str, at: DateTime<Utc>) -> String {
    format!(
        "{}{}-{}.json",
        ARCHIVE_PREFIX,
        at.format(ARCHIVE_TIMESTAMP_FORMAT),
        sanitize_id(session_id)
    )
}

fn archived_id(file_name: &str) -> Option<&str> {
    let rest = file_name
        .strip_prefix(ARCHIVE_PREFIX)?
        .strip_suffix(".json")?;
    rest.get(ARCHIVE_TIMESTAMP_LEN..).filter(|id| !id.is_empty())
}

/// Session ids come from the host; keep them filesystem-safe.
fn sanitize_id(session_id: &str) -> String {
    session_id
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || c == '-' || c == '_' {
                c
            } else {
                '_'
            }
        })
        .collect()
}

fn read_json_lenient<T: DeserializeOwned>(path: &Path, what: &str) -> Option<T> {
    let content = match fs::read_to_string(path) {
        Ok(content) => content,
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => return None,
        Err(err) => {
            tracing::warn!(error = %err, what, "Failed to read store file");
            return None;
        }
    };

    if content.trim().is_empty() {
        tracing::warn!(path = %path.display(), what, "Empty store file, treating as absent");
        return None;
    }

    match serde_json::from_str(&content) {
        Ok(value) => Some(value),
        Err(err) => {
            tracing::warn!(
                path = %path.display(),
                error = %err,
                what,
                "Failed to parse store file, treating as absent"
            );
            None
        }
    }
}

fn write_json_atomic<T: Serialize>(path: &Path, value: &T) -> Result<()> {
    let unwritable = |details: String| TrackerError::StoreUnwritable {
        path: path.to_path_buf(),
        details,
    };

    let content = serde_json::to_string_pretty(value)
        .map_err(|e| unwritable(format!("Failed to serialize: {}", e)))?;

    let parent_dir = path
        .parent()
        .ok_or_else(|| unwritable("Store path has no parent directory".to_string()))?;
    fs::create_dir_all(parent_dir)
        .map_err(|e| unwritable(format!("Failed to create directory: {}", e)))?;

    let mut temp_file = NamedTempFile::new_in(parent_dir)
        .map_err(|e| unwritable(format!("Temp file error: {}", e)))?;
    temp_file
        .write_all(content.as_bytes())
        .map_err(|e| unwritable(format!("Failed to write temp file: {}", e)))?;
    temp_file
        .flush()
        .map_err(|e| unwritable(format!("Failed to flush temp file: {}", e)))?;
    temp_file
        .persist(path)
        .map_err(|e| unwritable(format!("Failed to replace file: {}", e.error)))?;

    Ok(())
}

fn remove_if_exists(path: &Path) -> Result<()> {
    match fs::remove_file(path) {
        Ok(()) => Ok(()),
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(()),
        Err(err) => Err(TrackerError::StoreUnwritable {
            path: path.to_path_buf(),
            details: format!("Failed to remove: {}", err),
        }),
    }
}
