//! Layered plugin configuration.
//!
//! Priority (lowest to highest):
//!
//! 1. Built-in defaults ([`PluginConfig::default`])
//! 2. Global: `~/.claude/plugins/dev-plugin/dev-plugin.yaml`
//!    (falls back to `settings.local.md` front-matter)
//! 3. Project: `<project>/.claude/dev-plugin.yaml`
//!    (falls back to `dev-plugin.local.md` front-matter)
//!
//! Layers are merged as YAML trees with [`deep_merge`], then `${VAR}`
//! references in string values are expanded from the `.env` files (global,
//! then project) and finally the process environment.
//!
//! The global location is outside the plugin cache, which the host wipes on
//! every plugin update.
//!
//! Loading never fails: a malformed layer is logged and skipped.

use fs_err as fs;
use once_cell::sync::Lazy;
use regex::{Captures, Regex};
use serde::{Deserialize, Serialize};
use serde_yaml::Value;
use std::collections::BTreeMap;
use std::env;
use std::path::Path;

use crate::error::TrackerError;
use crate::storage::StorageConfig;

const DEFAULT_LANGFUSE_HOST: &str = "http://localhost:3000";
const REDACTED: &str = "***";

static ENV_VAR_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\$\{([^}]+)\}").expect("env var pattern is valid"));

/// Effective plugin configuration. Only the sections this crate acts on are
/// typed; other sections in the files are ignored.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PluginConfig {
    pub enabled: bool,
    pub observability: ObservabilityConfig,
}

impl Default for PluginConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            observability: ObservabilityConfig::default(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct ObservabilityConfig {
    pub enabled: bool,
    pub debug: bool,
    pub langfuse: LangfuseConfig,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LangfuseConfig {
    pub enabled: bool,
    pub auto_start: bool,
    pub host: String,
    pub public_key: String,
    pub secret_key: String,
    #[serde(rename = "userId", alias = "user_id")]
    pub user_id: String,
    pub version: String,
    pub tags: Vec<String>,
    pub compose_path: String,
}

impl Default for LangfuseConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            auto_start: false,
            host: DEFAULT_LANGFUSE_HOST.to_string(),
            public_key: String::new(),
            secret_key: String::new(),
            user_id: String::new(),
            version: "1.0.0".to_string(),
            tags: Vec::new(),
            compose_path: String::new(),
        }
    }
}

impl LangfuseConfig {
    pub fn has_credentials(&self) -> bool {
        !self.public_key.trim().is_empty() && !self.secret_key.trim().is_empty()
    }

    /// Host without a trailing slash, so paths can be appended directly.
    pub fn base_url(&self) -> &str {
        let host = self.host.trim();
        let host = if host.is_empty() {
            DEFAULT_LANGFUSE_HOST
        } else {
            host
        };
        host.trim_end_matches('/')
    }
}

impl PluginConfig {
    /// Session tracking runs only when the plugin and observability are both on.
    pub fn tracking_enabled(&self) -> bool {
        self.enabled && self.observability.enabled
    }

    pub fn sync_enabled(&self) -> bool {
        self.tracking_enabled() && self.observability.langfuse.enabled
    }

    /// Copy safe to print: credentials replaced with a placeholder.
    pub fn redacted(&self) -> PluginConfig {
        let mut config = self.clone();
        let langfuse = &mut config.observability.langfuse;
        for secret in [&mut langfuse.public_key, &mut langfuse.secret_key] {
            if !secret.is_empty() {
                *secret = REDACTED.to_string();
            }
        }
        config
    }
}

// MARK: - Loading

/// Loads the effective configuration for a project.
pub fn load_config(storage: &StorageConfig) -> PluginConfig {
    let mut env_vars = load_env_file(&storage.global_env_file());
    env_vars.extend(load_env_file(&storage.project_env_file()));

    let mut merged = serde_yaml::to_value(PluginConfig::default()).unwrap_or(Value::Null);

    let layers = [
        (storage.global_config_yaml(), storage.global_config_legacy()),
        (storage.project_config_yaml(), storage.project_config_legacy()),
    ];
    for (yaml_path, legacy_path) in &layers {
        let layer = load_yaml_file(yaml_path).or_else(|| load_legacy_md_file(legacy_path));
        if let Some(layer) = layer {
            merged = deep_merge(merged, layer);
        }
    }

    expand_env_vars(&mut merged, &env_vars);

    match serde_yaml::from_value::<PluginConfig>(merged) {
        Ok(config) => config,
        Err(err) => {
            tracing::warn!(error = %err, "Merged configuration has invalid types; using defaults");
            PluginConfig::default()
        }
    }
}

/// Deep merge of two YAML trees; `overlay` wins. Mappings merge key by key,
/// everything else is replaced. A null in `overlay` leaves `base` untouched.
pub fn deep_merge(base: Value, overlay: Value) -> Value {
    match (base, overlay) {
        (Value::Mapping(mut base_map), Value::Mapping(overlay_map)) => {
            for (key, value) in overlay_map {
                if value.is_null() {
                    continue;
                }
                match base_map.get_mut(&key) {
                    Some(existing) => {
                        let current = std::mem::replace(existing, Value::Null);
                        *existing = deep_merge(current, value);
                    }
                    None => {
                        base_map.insert(key, value);
                    }
                }
            }
            Value::Mapping(base_map)
        }
        (base, Value::Null) => base,
        (_, overlay) => overlay,
    }
}

/// Expands `${VAR}` references in every string of the tree. Lookup order is
/// `env_vars` then the process environment; unknown references stay verbatim.
pub fn expand_env_vars(value: &mut Value, env_vars: &BTreeMap<String, String>) {
    match value {
        Value::String(text) => {
            if text.contains("${") {
                *text = expand_str(text, env_vars);
            }
        }
        Value::Sequence(items) => {
            for item in items {
                expand_env_vars(item, env_vars);
            }
        }
        Value::Mapping(map) => {
            for (_, item) in map.iter_mut() {
                expand_env_vars(item, env_vars);
            }
        }
        _ => {}
    }
}

fn expand_str(text: &str, env_vars: &BTreeMap<String, String>) -> String {
    ENV_VAR_RE
        .replace_all(text, |caps: &Captures| {
            let name = &caps[1];
            env_vars
                .get(name)
                .filter(|value| !value.is_empty())
                .cloned()
                .or_else(|| env::var(name).ok())
                .unwrap_or_else(|| caps[0].to_string())
        })
        .into_owned()
}

/// Parses `KEY=VALUE` lines. Blank lines and `#` comments are skipped and
/// surrounding quotes are stripped from values.
pub fn parse_env(content: &str) -> BTreeMap<String, String> {
    content
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty() && !line.starts_with('#'))
        .filter_map(|line| line.split_once('='))
        .map(|(key, value)| {
            let value = value.trim().trim_matches('"').trim_matches('\'');
            (key.trim().to_string(), value.to_string())
        })
        .collect()
}

fn load_env_file(path: &Path) -> BTreeMap<String, String> {
    if !path.exists() {
        return BTreeMap::new();
    }
    match fs::read_to_string(path) {
        Ok(content) => parse_env(&content),
        Err(err) => {
            tracing::warn!(error = %err, "Failed to load .env file");
            BTreeMap::new()
        }
    }
}

fn load_yaml_file(path: &Path) -> Option<Value> {
    if !path.exists() {
        return None;
    }
    let content = match fs::read_to_string(path) {
        Ok(content) => content,
        Err(err) => {
            tracing::warn!(error = %err, "Failed to read YAML config");
            return None;
        }
    };
    parse_layer(&content, path)
}

fn load_legacy_md_file(path: &Path) -> Option<Value> {
    if !path.exists() {
        return None;
    }
    let content = match fs::read_to_string(path) {
        Ok(content) => content,
        Err(err) => {
            tracing::warn!(error = %err, "Failed to read legacy config");
            return None;
        }
    };
    let frontmatter = extract_frontmatter(&content)?;
    tracing::warn!(
        path = %path.display(),
        "Using legacy .local.md config; migrate to dev-plugin.yaml + .env"
    );
    parse_layer(frontmatter, path)
}

fn parse_layer(content: &str, path: &Path) -> Option<Value> {
    match serde_yaml::from_str::<Value>(content) {
        Ok(Value::Null) => Some(Value::Mapping(Default::default())),
        Ok(value @ Value::Mapping(_)) => Some(value),
        Ok(_) => {
            tracing::warn!(path = %path.display(), "Config layer is not a mapping; ignoring");
            None
        }
        Err(err) => {
            let err = TrackerError::ConfigMalformed {
                path: path.to_path_buf(),
                details: err.to_string(),
            };
            tracing::warn!(error = %err, "Skipping config layer");
            None
        }
    }
}

/// Returns the YAML between a leading `---` and the next `---` (or the rest of
/// the document when unterminated).
pub fn extract_frontmatter(content: &str) -> Option<&str> {
    let rest = content.strip_prefix("---")?;
    match rest.find("---") {
        Some(end) => Some(&rest[..end]),
        None => Some(rest),
    }
}
