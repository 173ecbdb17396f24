use std::env;
use std::fs;
use std::path::Path;

use approvly_core::config::{resolve_config_path, AppConfig, LoadOptions};
use serde::Serialize;
use toml::Value;

use crate::commands::{CommandResult, Reply, EXIT_CONFIG};

#[derive(Debug, Serialize)]
struct ConfigEntry {
    key: &'static str,
    value: String,
    source: String,
}

pub fn run(options: LoadOptions) -> CommandResult {
    let config_file_path = resolve_config_path(options.config_path.as_deref());
    let overrides = overridden_keys(&options);
    let config = match AppConfig::load(options) {
        Ok(config) => config,
        Err(error) => {
            return CommandResult::failure(
                "config",
                "config_validation",
                format!("config validation failed: {error}"),
                EXIT_CONFIG,
            );
        }
    };
    let config_file_doc = load_config_file_doc(config_file_path.as_deref());
    let source = |key: &'static str, env_keys: &[&str]| {
        if overrides.contains(&key) {
            return "flag".to_string();
        }
        field_source(key, env_keys, config_file_doc.as_ref(), config_file_path.as_deref())
    };

    let entries = vec![
        ConfigEntry {
            key: "api.base_url",
            value: config.api.base_url.clone(),
            source: source("api.base_url", &["APPROVLY_API_BASE_URL"]),
        },
        ConfigEntry {
            key: "api.timeout_secs",
            value: config.api.timeout_secs.to_string(),
            source: source("api.timeout_secs", &["APPROVLY_API_TIMEOUT_SECS"]),
        },
        ConfigEntry {
            key: "api.read_retries",
            value: config.api.read_retries.to_string(),
            source: source("api.read_retries", &["APPROVLY_API_READ_RETRIES"]),
        },
        ConfigEntry {
            key: "session.path",
            value: config.session.path.display().to_string(),
            source: source("session.path", &["APPROVLY_SESSION_PATH"]),
        },
        ConfigEntry {
            key: "logging.level",
            value: config.logging.level.clone(),
            source: source("logging.level", &["APPROVLY_LOGGING_LEVEL", "APPROVLY_LOG_LEVEL"]),
        },
        ConfigEntry {
            key: "logging.format",
            value: format!("{:?}", config.logging.format).to_lowercase(),
            source: source("logging.format", &["APPROVLY_LOGGING_FORMAT", "APPROVLY_LOG_FORMAT"]),
        },
    ];

    let mut lines = vec![
        "effective config (source precedence: flag > env > file > default):".to_string(),
    ];
    lines.extend(entries.iter().map(render_line));

    CommandResult::success_with("config", Reply::new(lines.join("\n")).with_data(&entries))
}

fn overridden_keys(options: &LoadOptions) -> Vec<&'static str> {
    let overrides = &options.overrides;
    [
        ("api.base_url", overrides.api_base_url.is_some()),
        ("api.timeout_secs", overrides.api_timeout_secs.is_some()),
        ("api.read_retries", overrides.api_read_retries.is_some()),
        ("session.path", overrides.session_path.is_some()),
        ("logging.level", overrides.log_level.is_some()),
    ]
    .into_iter()
    .filter_map(|(key, set)| set.then_some(key))
    .collect()
}

fn load_config_file_doc(path: Option<&Path>) -> Option<Value> {
    let path = path?;
    let raw = fs::read_to_string(path).ok()?;
    raw.parse::<Value>().ok()
}

fn field_source(
    key_path: &str,
    env_keys: &[&str],
    config_file_doc: Option<&Value>,
    config_file_path: Option<&Path>,
) -> String {
    let env_key = env_keys.iter().copied().find(|env_key| env::var_os(env_key).is_some());
    if let Some(env_key) = env_key {
        return format!("env ({env_key})");
    }

    if let Some(doc) = config_file_doc {
        if contains_path(doc, key_path) {
            let file_path = config_file_path
                .map(|path| path.display().to_string())
                .unwrap_or_else(|| "config file".to_string());
            return format!("file ({file_path})");
        }
    }

    "default".to_string()
}

fn contains_path(root: &Value, key_path: &str) -> bool {
    let mut current = root;
    for key in key_path.split('.') {
        let Some(next) = current.get(key) else {
            return false;
        };
        current = next;
    }
    true
}

fn render_line(entry: &ConfigEntry) -> String {
    format!("- {} = {} (source: {})", entry.key, entry.value, entry.source)
}
