//! Session tracking.
//!
//! ```text
//! Host hook → Recorder → SessionStore → current-session.json
//!                              └──────→ sessions/ archive → SyncLauncher
//! ```
//!
//! - [`types`]: the Session record and its summary
//! - [`store`]: single-slot current session plus the archive
//! - [`recorder`]: applies lifecycle events to the store

mod recorder;
mod store;
mod types;

pub use recorder::Recorder;
pub use store::{
    archive_file_name, load_session_file, ArchiveOutcome, FinalizedMarker, SessionStore,
};
pub use types::{FileOperation, Session, SessionId, SessionSummary, ToolUsage};
