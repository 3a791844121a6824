use serde_json::{json, Value};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::process::{Command, Output, Stdio};
use tempfile::TempDir;

struct Workspace {
    _temp: TempDir,
    home: PathBuf,
    project: PathBuf,
}

impl Workspace {
    fn new(project_config: &str) -> Self {
        let temp = TempDir::new().expect("Failed to create temp dir");
        let home = temp.path().join("home");
        let project = temp.path().join("demo");
        std::fs::create_dir_all(&home).expect("create home");
        std::fs::create_dir_all(project.join(".claude")).expect("create project");
        std::fs::write(project.join(".claude/dev-plugin.yaml"), project_config)
            .expect("write project config");
        Workspace {
            _temp: temp,
            home,
            project,
        }
    }

    fn command(&self, args: &[&str]) -> Command {
        let mut cmd = Command::new(env!("CARGO_BIN_EXE_devhooks-hook"));
        cmd.args(args)
            .env("HOME", &self.home)
            .env("CLAUDE_PROJECT_DIR", &self.project)
            .env_remove("DEVHOOKS_LOG")
            .env_remove("DEVHOOKS_DEBUG_LOG");
        cmd
    }

    fn handle(&self, stdin: &str) -> Output {
        let mut child = self
            .command(&["handle"])
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .expect("Failed to spawn devhooks-hook");
        child
            .stdin
            .take()
            .expect("stdin")
            .write_all(stdin.as_bytes())
            .expect("write stdin");
        child.wait_with_output().expect("wait for devhooks-hook")
    }

    fn send(&self, payload: Value) -> Value {
        let output = self.handle(&payload.to_string());
        assert!(output.status.success(), "hook exited with {:?}", output.status);
        serde_json::from_slice(&output.stdout).expect("hook stdout is JSON")
    }

    fn observability_dir(&self) -> PathBuf {
        self.project.join(".claude/observability")
    }
}

fn archives(dir: &Path) -> Vec<PathBuf> {
    match std::fs::read_dir(dir) {
        Ok(entries) => entries.filter_map(|e| e.ok()).map(|e| e.path()).collect(),
        Err(_) => Vec::new(),
    }
}

#[test]
fn session_lifecycle_through_the_binary() {
    let ws = Workspace::new("observability:\n  enabled: true\n");

    let started = ws.send(json!({
        "hook_event_name": "SessionStart",
        "session_id": "cli-session-42",
        "cwd": "/somewhere/else"
    }));
    assert_eq!(started["systemMessage"], "📊 Session tracking initialized: cli-sess");
    assert_eq!(started["suppressOutput"], false);
    assert!(ws.observability_dir().join("current-session.json").exists());

    let tool = ws.send(json!({
        "hook_event_name": "PostToolUse",
        "tool_name": "Read",
        "tool_input": {"file_path": "/demo/a.py"}
    }));
    assert_eq!(tool, json!({"suppressOutput": true}));

    ws.send(json!({
        "hook_event_name": "PostToolUse",
        "tool_name": "Edit",
        "tool_input": {"file_path": "/demo/a.py"},
        "tool_response": {"filePath": "/demo/a.py"}
    }));

    let stopped = ws.send(json!({"hook_event_name": "Stop"}));
    let message = stopped["systemMessage"].as_str().expect("stop message");
    assert!(
        message.starts_with("📊 Session complete: 2 tools, 1 files modified, "),
        "{}",
        message
    );

    assert!(!ws.observability_dir().join("current-session.json").exists());
    let archived = archives(&ws.observability_dir().join("sessions"));
    assert_eq!(archived.len(), 1);

    let record: Value =
        serde_json::from_str(&std::fs::read_to_string(&archived[0]).unwrap()).unwrap();
    assert_eq!(record["session_id"], "cli-session-42");
    assert_eq!(record["project_name"], "demo");
    assert_eq!(record["summary"]["total_tools"], 2);
    assert_eq!(record["summary"]["unique_tools"], 2);
    assert_eq!(record["summary"]["files_modified"], 1);
    assert_eq!(record["summary"]["files_created"], 0);
    assert_eq!(record["summary"]["errors"], 0);

    // Stop fires again on the next turn; nothing new is archived.
    let again = ws.send(json!({"hook_event_name": "Stop"}));
    assert_eq!(again, json!({"suppressOutput": true}));
    assert_eq!(archives(&ws.observability_dir().join("sessions")).len(), 1);
}

#[test]
fn tracking_off_by_default() {
    let ws = Workspace::new("autoformat:\n  enabled: true\n");

    let started = ws.send(json!({"hook_event_name": "SessionStart"}));
    assert_eq!(started, json!({"suppressOutput": true}));
    assert!(!ws.observability_dir().exists());
}

#[test]
fn malformed_input_warns_and_exits_zero() {
    let ws = Workspace::new("observability:\n  enabled: true\n");

    let output = ws.handle("{not json");
    assert!(output.status.success());
    let response: Value = serde_json::from_slice(&output.stdout).unwrap();
    let message = response["systemMessage"].as_str().unwrap();
    assert!(message.contains("Observability tracker error"), "{}", message);
}

#[test]
fn empty_input_is_silent() {
    let ws = Workspace::new("observability:\n  enabled: true\n");

    let output = ws.handle("");
    assert!(output.status.success());
    let response: Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(response, json!({"suppressOutput": true}));
}

#[test]
fn config_subcommand_masks_secrets() {
    let ws = Workspace::new(
        "observability:\n  enabled: true\n  langfuse:\n    enabled: true\n    public_key: ${LANGFUSE_PUBLIC_KEY}\n    secret_key: sk-lf-secret\n",
    );
    std::fs::write(
        ws.project.join(".claude/.env"),
        "LANGFUSE_PUBLIC_KEY=pk-lf-from-env\n",
    )
    .unwrap();

    let output = ws
        .command(&["config"])
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .output()
        .expect("run config");
    assert!(output.status.success());

    let config: Value = serde_json::from_slice(&output.stdout).unwrap();
    let langfuse = &config["observability"]["langfuse"];
    assert_eq!(config["observability"]["enabled"], true);
    assert_eq!(langfuse["enabled"], true);
    assert_eq!(langfuse["public_key"], "***");
    assert_eq!(langfuse["secret_key"], "***");
    assert_eq!(langfuse["host"], "http://localhost:3000");
}
