//! # devhooks-core
//!
//! Session tracking for Claude Code hooks: records what happened in one
//! coding session, summarizes it at stop, archives it under the project, and
//! optionally hands the archive to a best-effort Langfuse sync.
//!
//! ## Design Principles
//!
//! - **Never break the host**: tracking failures are logged and swallowed.
//! - **Stateless recorder**: the only state lives in `current-session.json`,
//!   so each hook invocation can be a fresh process.
//! - **Archive first**: the local archive is written before any sync is
//!   launched and is never modified by it.
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use devhooks_core::{load_config, NoopLauncher, Recorder, StorageConfig};
//!
//! let storage = StorageConfig::for_project(project_dir)?;
//! let config = load_config(&storage);
//! let recorder = Recorder::new(&storage, &config, Box::new(NoopLauncher));
//! recorder.on_start(&storage.project_name())?;
//! recorder.on_tool_use("Read", true, None, None);
//! let summary = recorder.on_stop();
//! ```

pub mod config;
pub mod error;
pub mod event_log;
pub mod hook;
pub mod session;
pub mod storage;
pub mod sync;

pub use config::{load_config, LangfuseConfig, ObservabilityConfig, PluginConfig};
pub use error::{Result, TrackerError};
pub use event_log::EventLog;
pub use hook::{HookInput, HookOutput, TrackerEvent};
pub use session::{FileOperation, Recorder, Session, SessionId, SessionStore, SessionSummary};
pub use storage::StorageConfig;
pub use sync::{NoopLauncher, SyncLauncher, SyncOutcome};
