//! devhooks-hook: CLI hook handler for dev-plugin session tracking.
//!
//! Called directly by Claude Code hooks (SessionStart, PostToolUse,
//! UserPromptSubmit, Stop) configured in the plugin's hooks.json.
//!
//! ## Subcommands
//!
//! - `handle`: Main hook handler, reads JSON from stdin
//! - `sync`: Best-effort upload of one archived session (spawned internally)
//! - `config`: Print the effective configuration with secrets masked

mod handle;
mod launcher;
mod logging;
mod sync;

use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "devhooks-hook")]
#[command(about = "dev-plugin session tracker")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Handle a hook event (reads JSON from stdin)
    Handle,

    /// Sync an archived session to Langfuse (spawned by handle on Stop)
    Sync {
        /// Archived session record
        #[arg(long)]
        archive: PathBuf,

        /// Project the session belongs to
        #[arg(long)]
        project_dir: PathBuf,
    },

    /// Print the effective configuration as JSON
    Config {
        /// Project directory (default: CLAUDE_PROJECT_DIR or the current directory)
        #[arg(long)]
        project_dir: Option<PathBuf>,
    },
}

fn main() {
    let _logging_guard = logging::init();
    let cli = Cli::parse();

    match cli.command {
        Commands::Handle => {
            // Tracking must never fail the host's hook; errors are logged and we exit 0.
            if let Err(e) = handle::run() {
                tracing::warn!(error = %e, "devhooks-hook handle failed");
            }
        }
        Commands::Sync {
            archive,
            project_dir,
        } => {
            sync::run(&archive, &project_dir);
        }
        Commands::Config { project_dir } => {
            if let Err(e) = handle::print_config(project_dir) {
                eprintln!("devhooks-hook config: {}", e);
                std::process::exit(1);
            }
        }
    }
}
