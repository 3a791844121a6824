//! Serialized session types.
//!
//! The JSON produced here is the on-disk format of both the current-session
//! slot and the archive records.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeSet, HashSet};

pub type SessionId = String;

/// One observed tool invocation. Ordering is insertion order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolUsage {
    pub tool: String,
    pub timestamp: DateTime<Utc>,
    pub success: bool,
}

/// How a tool touched a file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FileOperation {
    Modified,
    Created,
    Deleted,
}

/// Derived counts, computed once at finalization and frozen with the record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionSummary {
    pub total_tools: u32,
    pub unique_tools: u32,
    pub files_modified: u32,
    pub files_created: u32,
    pub files_deleted: u32,
    pub errors: u32,
    #[serde(default)]
    pub prompts: u32,
    pub duration_seconds: f64,
    pub duration_minutes: f64,
}

impl SessionSummary {
    /// One-line message shown to the user by the host.
    pub fn headline(&self) -> String {
        format!(
            "📊 Session complete: {} tools, {} files modified, {}min",
            self.total_tools, self.files_modified, self.duration_minutes
        )
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Session {
    pub session_id: SessionId,
    pub project_name: String,
    #[serde(default)]
    pub project_dir: Option<String>,
    pub started_at: DateTime<Utc>,
    #[serde(default)]
    pub ended_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub tools_used: Vec<ToolUsage>,
    #[serde(default)]
    pub files_modified: BTreeSet<String>,
    #[serde(default)]
    pub files_created: BTreeSet<String>,
    #[serde(default)]
    pub files_deleted: BTreeSet<String>,
    #[serde(default)]
    pub error_count: u32,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default)]
    pub prompts_submitted: u32,
    #[serde(default)]
    pub last_prompt_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub summary: Option<SessionSummary>,
}

impl Session {
    pub fn new(session_id: SessionId, project_name: &str, started_at: DateTime<Utc>) -> Self {
        Session {
            session_id,
            project_name: project_name.to_string(),
            project_dir: None,
            started_at,
            ended_at: None,
            tools_used: Vec::new(),
            files_modified: BTreeSet::new(),
            files_created: BTreeSet::new(),
            files_deleted: BTreeSet::new(),
            error_count: 0,
            tags: Vec::new(),
            prompts_submitted: 0,
            last_prompt_at: None,
            summary: None,
        }
    }

    /// A finalized session is terminal and must not be mutated.
    pub fn is_finalized(&self) -> bool {
        self.ended_at.is_some()
    }

    pub fn record_tool(
        &mut self,
        tool: &str,
        success: bool,
        at: DateTime<Utc>,
        file: Option<(&str, FileOperation)>,
    ) {
        if self.is_finalized() {
            return;
        }
        self.tools_used.push(ToolUsage {
            tool: tool.to_string(),
            timestamp: at,
            success,
        });
        if !success {
            self.error_count += 1;
        }
        if let Some((path, operation)) = file {
            let set = match operation {
                FileOperation::Modified => &mut self.files_modified,
                FileOperation::Created => &mut self.files_created,
                FileOperation::Deleted => &mut self.files_deleted,
            };
            set.insert(path.to_string());
        }
    }

    pub fn record_prompt(&mut self, at: DateTime<Utc>) {
        if self.is_finalized() {
            return;
        }
        self.prompts_submitted += 1;
        self.last_prompt_at = Some(at);
    }

    /// Sets the end time and freezes the summary. Returns the existing summary
    /// unchanged if the session was already finalized.
    pub fn finalize(&mut self, at: DateTime<Utc>) -> SessionSummary {
        if let (Some(_), Some(summary)) = (self.ended_at, &self.summary) {
            return summary.clone();
        }
        // Clock skew must not produce an end before the start.
        let ended_at = self.ended_at.unwrap_or_else(|| at.max(self.started_at));
        self.ended_at = Some(ended_at);
        let summary = self.compute_summary(ended_at);
        self.summary = Some(summary.clone());
        summary
    }

    fn compute_summary(&self, ended_at: DateTime<Utc>) -> SessionSummary {
        let unique: HashSet<&str> = self.tools_used.iter().map(|t| t.tool.as_str()).collect();
        let duration_seconds =
            ended_at.signed_duration_since(self.started_at).num_milliseconds() as f64 / 1000.0;
        SessionSummary {
            total_tools: self.tools_used.len() as u32,
            unique_tools: unique.len() as u32,
            files_modified: self.files_modified.len() as u32,
            files_created: self.files_created.len() as u32,
            files_deleted: self.files_deleted.len() as u32,
            errors: self.error_count,
            prompts: self.prompts_submitted,
            duration_seconds,
            duration_minutes: (duration_seconds / 60.0 * 100.0).round() / 100.0,
        }
    }
}
