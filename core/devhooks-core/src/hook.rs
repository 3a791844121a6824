//! Host hook payloads.
//!
//! The host writes one JSON object per hook invocation to stdin. Fields vary
//! by event and across host versions, so everything is optional and unknown
//! fields are ignored.
//!
//! ```text
//! SessionStart     → Start
//! PostToolUse      → ToolUse
//! UserPromptSubmit → PromptSubmit
//! Stop             → Stop
//! anything else    → ignored
//! ```

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::session::{FileOperation, SessionSummary};

#[derive(Debug, Clone, Default, Deserialize)]
pub struct HookInput {
    #[serde(default)]
    pub hook_event_name: Option<String>,
    #[serde(default)]
    pub session_id: Option<String>,
    #[serde(default)]
    pub cwd: Option<String>,
    #[serde(default)]
    pub tool_name: Option<String>,
    #[serde(default)]
    pub tool_input: Option<Value>,
    #[serde(default, alias = "tool_result", alias = "result", alias = "output")]
    pub tool_response: Option<Value>,
}

/// A lifecycle event the recorder understands.
#[derive(Debug, Clone, PartialEq)]
pub enum TrackerEvent {
    Start {
        session_id: Option<String>,
    },
    ToolUse {
        tool_name: String,
        success: bool,
        file_path: Option<String>,
        operation: Option<FileOperation>,
    },
    PromptSubmit,
    Stop,
}

impl HookInput {
    pub fn event_name(&self) -> &str {
        self.hook_event_name.as_deref().unwrap_or("unknown")
    }

    pub fn to_event(&self) -> Option<TrackerEvent> {
        match self.hook_event_name.as_deref()? {
            "SessionStart" => Some(TrackerEvent::Start {
                session_id: self
                    .session_id
                    .as_ref()
                    .map(|id| id.trim().to_string())
                    .filter(|id| !id.is_empty()),
            }),
            "PostToolUse" => {
                let tool_name = self
                    .tool_name
                    .clone()
                    .filter(|name| !name.is_empty())
                    .unwrap_or_else(|| "Unknown".to_string());
                let operation = file_operation_for(&tool_name);
                let file_path = operation.and_then(|_| self.target_file_path());
                Some(TrackerEvent::ToolUse {
                    success: self.tool_succeeded(),
                    operation: file_path.as_ref().and(operation),
                    file_path,
                    tool_name,
                })
            }
            "UserPromptSubmit" => Some(TrackerEvent::PromptSubmit),
            "Stop" => Some(TrackerEvent::Stop),
            _ => None,
        }
    }

    /// A tool failed if its response is an object carrying a truthy `error`
    /// or `is_error: true`. Anything else, including no response, is success.
    pub fn tool_succeeded(&self) -> bool {
        let Some(Value::Object(response)) = &self.tool_response else {
            return true;
        };
        let error_set = response.get("error").is_some_and(is_truthy);
        let is_error = response
            .get("is_error")
            .and_then(Value::as_bool)
            .unwrap_or(false);
        !(error_set || is_error)
    }

    fn target_file_path(&self) -> Option<String> {
        let input = self.tool_input.as_ref()?;
        ["file_path", "notebook_path"]
            .iter()
            .find_map(|key| input.get(*key).and_then(Value::as_str))
            .map(str::trim)
            .filter(|path| !path.is_empty())
            .map(str::to_string)
    }
}

/// Which file set a tool's target path belongs to. Tools without a reliable
/// file target are not classified.
pub fn file_operation_for(tool_name: &str) -> Option<FileOperation> {
    match tool_name {
        "Edit" | "MultiEdit" | "NotebookEdit" => Some(FileOperation::Modified),
        "Write" => Some(FileOperation::Created),
        _ => None,
    }
}

fn is_truthy(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::String(s) => !s.is_empty(),
        Value::Number(n) => n.as_f64().is_some_and(|n| n != 0.0),
        Value::Array(items) => !items.is_empty(),
        Value::Object(map) => !map.is_empty(),
    }
}

/// JSON written to stdout for the host.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HookOutput {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub system_message: Option<String>,
    pub suppress_output: bool,
}

impl HookOutput {
    pub fn silent() -> Self {
        HookOutput {
            system_message: None,
            suppress_output: true,
        }
    }

    pub fn message(text: impl Into<String>) -> Self {
        HookOutput {
            system_message: Some(text.into()),
            suppress_output: false,
        }
    }

    pub fn session_started(session_id: &str) -> Self {
        let short: String = session_id.chars().take(8).collect();
        Self::message(format!("📊 Session tracking initialized: {}", short))
    }

    pub fn session_complete(summary: &SessionSummary) -> Self {
        Self::message(summary.headline())
    }

    pub fn tracker_warning(details: &str) -> Self {
        Self::message(format!("⚠ Observability tracker error: {}", details))
    }
}
