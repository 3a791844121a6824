//! Fire-and-forget sync launcher.
//!
//! Re-executes this binary as `devhooks-hook sync --archive <path>` in its own
//! session with null stdio, so the hook returns before the upload starts and
//! the host never waits on the network.

use devhooks_core::SyncLauncher;
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};

pub struct ProcessLauncher {
    project_dir: PathBuf,
}

impl ProcessLauncher {
    pub fn new(project_dir: &Path) -> Self {
        ProcessLauncher {
            project_dir: project_dir.to_path_buf(),
        }
    }

    fn command(&self, archive: &Path) -> std::io::Result<Command> {
        let exe = std::env::current_exe()?;
        let mut cmd = Command::new(exe);
        cmd.arg("sync")
            .arg("--archive")
            .arg(archive)
            .arg("--project-dir")
            .arg(&self.project_dir)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null());
        detach(&mut cmd);
        Ok(cmd)
    }
}

impl SyncLauncher for ProcessLauncher {
    fn launch(&self, archive: &Path) {
        let spawned = self.command(archive).and_then(|mut cmd| cmd.spawn());
        match spawned {
            Ok(child) => tracing::debug!(
                pid = child.id(),
                archive = %archive.display(),
                "Spawned background sync"
            ),
            Err(e) => tracing::warn!(
                error = %e,
                archive = %archive.display(),
                "Failed to spawn background sync; archive kept locally"
            ),
        }
    }
}

#[cfg(unix)]
fn detach(cmd: &mut Command) {
    use std::os::unix::process::CommandExt;

    // SAFETY: pre_exec runs between fork() and exec() in the child. setsid is
    // async-signal-safe and touches no state shared with the parent.
    unsafe {
        cmd.pre_exec(|| {
            libc::setsid();
            Ok(())
        });
    }
}

#[cfg(not(unix))]
fn detach(_cmd: &mut Command) {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn command_targets_sync_subcommand() {
        let launcher = ProcessLauncher::new(Path::new("/work/demo"));
        let cmd = launcher
            .command(Path::new("/work/demo/.claude/observability/sessions/s.json"))
            .unwrap();
        let args: Vec<String> = cmd
            .get_args()
            .map(|arg| arg.to_string_lossy().into_owned())
            .collect();
        assert_eq!(
            args,
            vec![
                "sync",
                "--archive",
                "/work/demo/.claude/observability/sessions/s.json",
                "--project-dir",
                "/work/demo",
            ]
        );
    }
}
