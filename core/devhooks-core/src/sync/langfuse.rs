//! Langfuse ingestion client.
//!
//! One finalized session becomes one `trace-create` event plus a `span-create`
//! per tool usage, posted as a single batch to `/api/public/ingestion` with
//! basic auth (public key / secret key).

use std::time::Duration;

use chrono::Utc;
use serde::Deserialize;
use serde_json::{json, Value};
use ulid::Ulid;

use crate::config::LangfuseConfig;
use crate::error::{Result, TrackerError};
use crate::session::Session;

const TRACE_NAME: &str = "claude-code-session";
const HEALTH_PATH: &str = "/api/public/health";
const INGESTION_PATH: &str = "/api/public/ingestion";
const HEALTH_TIMEOUT: Duration = Duration::from_secs(2);
const REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

#[derive(Debug, Default, Deserialize)]
struct IngestionResponse {
    #[serde(default)]
    successes: Vec<Value>,
    #[serde(default)]
    errors: Vec<Value>,
}

pub struct LangfuseClient {
    http: reqwest::Client,
    base_url: String,
    public_key: String,
    secret_key: String,
}

impl LangfuseClient {
    pub fn new(config: &LangfuseConfig) -> Result<Self> {
        let base_url = config.base_url().to_string();
        let mut builder = reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .user_agent(concat!("devhooks/", env!("CARGO_PKG_VERSION")));
        // A local collector must not be routed through an HTTP proxy.
        if is_loopback(&base_url) {
            builder = builder.no_proxy();
        }
        Ok(LangfuseClient {
            http: builder.build()?,
            base_url,
            public_key: config.public_key.clone(),
            secret_key: config.secret_key.clone(),
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Quick liveness check; any error counts as unhealthy.
    pub async fn is_healthy(&self) -> bool {
        let url = format!("{}{}", self.base_url, HEALTH_PATH);
        match self.http.get(&url).timeout(HEALTH_TIMEOUT).send().await {
            Ok(response) => response.status().is_success(),
            Err(err) => {
                tracing::debug!(error = %err, url = %url, "Collector health check failed");
                false
            }
        }
    }

    /// Posts the batch and returns the number of events accepted.
    pub async fn ingest(&self, batch: &Value) -> Result<usize> {
        let url = format!("{}{}", self.base_url, INGESTION_PATH);
        let response = self
            .http
            .post(&url)
            .basic_auth(&self.public_key, Some(&self.secret_key))
            .json(batch)
            .send()
            .await?;

        let status = response.status();
        let body = response.text().await?;
        if !status.is_success() {
            return Err(TrackerError::CollectorStatus {
                status: status.as_u16(),
                body: truncate(&body, 500),
            });
        }

        let parsed: IngestionResponse = serde_json::from_str(&body).unwrap_or_default();
        if !parsed.errors.is_empty() {
            return Err(TrackerError::CollectorStatus {
                status: status.as_u16(),
                body: truncate(&Value::Array(parsed.errors).to_string(), 500),
            });
        }

        let sent = batch
            .get("batch")
            .and_then(Value::as_array)
            .map_or(0, Vec::len);
        Ok(if parsed.successes.is_empty() {
            sent
        } else {
            parsed.successes.len()
        })
    }
}

/// Builds the ingestion payload for one finalized session.
pub fn build_ingestion_batch(session: &Session, config: &LangfuseConfig) -> Value {
    let now = Utc::now().to_rfc3339();
    let non_empty = |value: &str| (!value.trim().is_empty()).then(|| value.to_string());

    let summary = session
        .summary
        .as_ref()
        .map(|s| serde_json::to_value(s).unwrap_or(Value::Null))
        .unwrap_or(Value::Null);
    let duration_seconds = session
        .summary
        .as_ref()
        .map_or(0.0, |s| s.duration_seconds);

    let trace = json!({
        "id": Ulid::new().to_string(),
        "timestamp": now,
        "type": "trace-create",
        "body": {
            "id": session.session_id,
            "name": TRACE_NAME,
            "timestamp": session.started_at.to_rfc3339(),
            "sessionId": session.session_id,
            "userId": non_empty(&config.user_id),
            "version": non_empty(&config.version),
            "tags": session.tags,
            "metadata": {
                "project": session.project_name,
                "project_dir": session.project_dir,
                "started_at": session.started_at.to_rfc3339(),
                "ended_at": session.ended_at.map(|t| t.to_rfc3339()),
                "duration_seconds": duration_seconds,
                "summary": summary,
            },
            "input": {
                "prompts_submitted": session.prompts_submitted,
            },
            "output": {
                "files_modified": session.files_modified,
                "files_created": session.files_created,
                "files_deleted": session.files_deleted,
                "total_tools": session.tools_used.len(),
            },
        },
    });

    let mut events = Vec::with_capacity(session.tools_used.len() + 1);
    events.push(trace);
    for usage in &session.tools_used {
        let at = usage.timestamp.to_rfc3339();
        events.push(json!({
            "id": Ulid::new().to_string(),
            "timestamp": now,
            "type": "span-create",
            "body": {
                "id": Ulid::new().to_string(),
                "traceId": session.session_id,
                "name": format!("tool_{}", usage.tool),
                "startTime": at,
                "endTime": at,
                "level": if usage.success { "DEFAULT" } else { "ERROR" },
                "metadata": {
                    "success": usage.success,
                    "tool": usage.tool,
                },
            },
        }));
    }

    json!({ "batch": events })
}

fn is_loopback(base_url: &str) -> bool {
    reqwest::Url::parse(base_url)
        .ok()
        .and_then(|url| url.host_str().map(str::to_string))
        .is_some_and(|host| matches!(host.as_str(), "localhost" | "127.0.0.1" | "[::1]" | "::1"))
}

fn truncate(text: &str, max_chars: usize) -> String {
    if text.chars().count() <= max_chars {
        return text.to_string();
    }
    let cut: String = text.chars().take(max_chars).collect();
    format!("{}... (truncated)", cut)
}
