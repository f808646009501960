use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use ordermate_core::config::{AppConfig, LoadOptions};
use secrecy::ExposeSecret;
use toml::Value;

pub fn run() -> String {
    let config = match AppConfig::load(LoadOptions::default()) {
        Ok(config) => config,
        Err(error) => return format!("config validation failed: {error}"),
    };

    let file_path = detect_config_path();
    let file_doc = load_config_file_doc(file_path.as_deref());
    let sources = Sources { file_doc: file_doc.as_ref(), file_path: file_path.as_deref() };

    let api_key = match &config.llm.api_key {
        Some(key) => redact_key(key.expose_secret()),
        None => "<unset>".to_string(),
    };

    let fields: Vec<(&str, Option<&str>, String)> = vec![
        ("database.url", Some("ORDERMATE_DATABASE_URL"), config.database.url.clone()),
        (
            "database.max_connections",
            Some("ORDERMATE_DATABASE_MAX_CONNECTIONS"),
            config.database.max_connections.to_string(),
        ),
        (
            "database.timeout_secs",
            Some("ORDERMATE_DATABASE_TIMEOUT_SECS"),
            config.database.timeout_secs.to_string(),
        ),
        ("llm.provider", Some("ORDERMATE_LLM_PROVIDER"), config.llm.provider.as_str().to_string()),
        ("llm.model", Some("ORDERMATE_LLM_MODEL"), config.llm.model.clone()),
        (
            "llm.base_url",
            Some("ORDERMATE_LLM_BASE_URL"),
            config.llm.base_url.clone().unwrap_or_else(|| "<unset>".to_string()),
        ),
        ("llm.api_key", Some("ORDERMATE_LLM_API_KEY"), api_key),
        ("llm.timeout_secs", Some("ORDERMATE_LLM_TIMEOUT_SECS"), config.llm.timeout_secs.to_string()),
        ("llm.max_attempts", Some("ORDERMATE_LLM_MAX_ATTEMPTS"), config.llm.max_attempts.to_string()),
        ("llm.temperature", Some("ORDERMATE_LLM_TEMPERATURE"), config.llm.temperature.to_string()),
        ("llm.max_tokens", None, config.llm.max_tokens.to_string()),
        (
            "evaluation.enabled",
            Some("ORDERMATE_EVALUATION_ENABLED"),
            config.evaluation.enabled.to_string(),
        ),
        (
            "evaluation.model_judge",
            Some("ORDERMATE_EVALUATION_MODEL_JUDGE"),
            config.evaluation.model_judge.to_string(),
        ),
        ("session.ttl_secs", Some("ORDERMATE_SESSION_TTL_SECS"), config.session.ttl_secs.to_string()),
        (
            "session.sweep_interval_secs",
            Some("ORDERMATE_SESSION_SWEEP_INTERVAL_SECS"),
            config.session.sweep_interval_secs.to_string(),
        ),
        ("session.history_turns", None, config.session.history_turns.to_string()),
        (
            "orders.submit_attempts",
            Some("ORDERMATE_ORDERS_SUBMIT_ATTEMPTS"),
            config.orders.submit_attempts.to_string(),
        ),
        (
            "server.bind_address",
            Some("ORDERMATE_SERVER_BIND_ADDRESS"),
            config.server.bind_address.clone(),
        ),
        ("server.port", Some("ORDERMATE_SERVER_PORT"), config.server.port.to_string()),
        (
            "server.graceful_shutdown_secs",
            Some("ORDERMATE_SERVER_GRACEFUL_SHUTDOWN_SECS"),
            config.server.graceful_shutdown_secs.to_string(),
        ),
        ("logging.level", Some("ORDERMATE_LOGGING_LEVEL"), config.logging.level.clone()),
        ("logging.format", Some("ORDERMATE_LOGGING_FORMAT"), format!("{:?}", config.logging.format)),
    ];

    let mut lines = vec!["effective config (source precedence: env > file > default):".to_string()];
    for (key, env_key, value) in fields {
        lines.push(render_line(key, &value, sources.of(key, env_key)));
    }
    lines.join("\n")
}

struct Sources<'a> {
    file_doc: Option<&'a Value>,
    file_path: Option<&'a Path>,
}

impl Sources<'_> {
    fn of(&self, key_path: &str, env_key: Option<&str>) -> String {
        if let Some(env_key) = env_key {
            if env::var_os(env_key).is_some() {
                return format!("env ({env_key})");
            }
        }

        if self.file_doc.is_some_and(|doc| contains_path(doc, key_path)) {
            let file_path = self
                .file_path
                .map(|path| path.display().to_string())
                .unwrap_or_else(|| "config file".to_string());
            return format!("file ({file_path})");
        }

        "default".to_string()
    }
}

fn detect_config_path() -> Option<PathBuf> {
    [PathBuf::from("ordermate.toml"), PathBuf::from("config/ordermate.toml")]
        .into_iter()
        .find(|path| path.exists())
}

fn load_config_file_doc(path: Option<&Path>) -> Option<Value> {
    let raw = fs::read_to_string(path?).ok()?;
    raw.parse::<Value>().ok()
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

fn render_line(key: &str, value: &str, source: String) -> String {
    format!("- {key} = {value} (source: {source})")
}

fn redact_key(key: &str) -> String {
    let trimmed = key.trim();
    if trimmed.is_empty() {
        return "<empty>".to_string();
    }

    if let Some((prefix, _)) = trimmed.split_once('-') {
        return format!("{prefix}-***");
    }

    "<redacted>".to_string()
}
