use std::env;
use std::sync::{Mutex, OnceLock};

use ordermate_cli::commands::{config, migrate, seed, sweep};
use serde_json::Value;

const MEMORY_DB: (&str, &str) = ("ORDERMATE_DATABASE_URL", "sqlite::memory:");
/// Each pooled connection to `sqlite::memory:` sees its own database.
const ONE_CONNECTION: (&str, &str) = ("ORDERMATE_DATABASE_MAX_CONNECTIONS", "1");

#[test]
fn migrate_returns_success_with_valid_env() {
    with_env(&[MEMORY_DB, ONE_CONNECTION], || {
        let result = migrate::run();
        assert_eq!(result.exit_code, 0, "expected successful migrate run");

        let payload = parse_payload(&result.output);
        assert_eq!(payload["command"], "migrate");
        assert_eq!(payload["status"], "ok");
    });
}

#[test]
fn migrate_reports_config_failure_for_hosted_provider_without_key() {
    with_env(&[MEMORY_DB, ("ORDERMATE_LLM_PROVIDER", "anthropic")], || {
        let result = migrate::run();
        assert_eq!(result.exit_code, 2, "expected config validation failure code");

        let payload = parse_payload(&result.output);
        assert_eq!(payload["status"], "error");
        assert_eq!(payload["error_class"], "config_validation");
    });
}

#[test]
fn seed_reports_the_demo_menu() {
    with_env(&[MEMORY_DB, ONE_CONNECTION], || {
        let result = seed::run();
        assert_eq!(result.exit_code, 0, "expected seed success: {}", result.output);

        let payload = parse_payload(&result.output);
        assert_eq!(payload["command"], "seed");
        assert_eq!(payload["status"], "ok");
        assert_eq!(
            payload["message"],
            "demo tenant `demo-bistro` seeded with menu items: \
             truffle-melt-burger, smoky-bbq-chicken, loaded-fries"
        );
    });
}

#[test]
fn seed_is_idempotent_across_runs() {
    with_env(&[MEMORY_DB, ONE_CONNECTION], || {
        let first = parse_payload(&seed::run().output);
        let second = parse_payload(&seed::run().output);

        assert_eq!(first["status"], "ok");
        assert_eq!(first["message"], second["message"]);
    });
}

#[test]
fn sweep_on_a_fresh_database_removes_nothing() {
    with_env(&[MEMORY_DB, ONE_CONNECTION, ("ORDERMATE_SESSION_TTL_SECS", "60")], || {
        let result = sweep::run();
        assert_eq!(result.exit_code, 0, "expected sweep success: {}", result.output);

        let payload = parse_payload(&result.output);
        assert_eq!(payload["command"], "sweep");
        assert_eq!(payload["message"], "removed 0 session(s) idle for more than 60s");
    });
}

#[test]
fn config_redacts_the_api_key_and_attributes_env_sources() {
    with_env(
        &[
            MEMORY_DB,
            ("ORDERMATE_LLM_PROVIDER", "openai"),
            ("ORDERMATE_LLM_API_KEY", "sk-very-secret"),
        ],
        || {
            let output = config::run();

            assert!(output.contains("- llm.api_key = sk-*** (source: env (ORDERMATE_LLM_API_KEY))"));
            assert!(output.contains("- llm.provider = openai (source: env (ORDERMATE_LLM_PROVIDER))"));
            assert!(output.contains("- session.history_turns = "));
            assert!(!output.contains("very-secret"));
        },
    );
}

fn parse_payload(output: &str) -> Value {
    serde_json::from_str(output).expect("command output should be valid JSON")
}

fn with_env(vars: &[(&str, &str)], test_fn: impl FnOnce()) {
    static ENV_LOCK: OnceLock<Mutex<()>> = OnceLock::new();
    let _guard =
        ENV_LOCK.get_or_init(|| Mutex::new(())).lock().expect("env mutex should not be poisoned");

    let keys = [
        "ORDERMATE_DATABASE_URL",
        "ORDERMATE_DATABASE_MAX_CONNECTIONS",
        "ORDERMATE_DATABASE_TIMEOUT_SECS",
        "ORDERMATE_LLM_PROVIDER",
        "ORDERMATE_LLM_API_KEY",
        "ORDERMATE_LLM_BASE_URL",
        "ORDERMATE_LLM_MODEL",
        "ORDERMATE_LLM_TIMEOUT_SECS",
        "ORDERMATE_LLM_MAX_ATTEMPTS",
        "ORDERMATE_LLM_TEMPERATURE",
        "ORDERMATE_EVALUATION_ENABLED",
        "ORDERMATE_EVALUATION_MODEL_JUDGE",
        "ORDERMATE_SESSION_TTL_SECS",
        "ORDERMATE_SESSION_SWEEP_INTERVAL_SECS",
        "ORDERMATE_ORDERS_SUBMIT_ATTEMPTS",
        "ORDERMATE_SERVER_BIND_ADDRESS",
        "ORDERMATE_SERVER_PORT",
        "ORDERMATE_SERVER_GRACEFUL_SHUTDOWN_SECS",
        "ORDERMATE_LOGGING_LEVEL",
        "ORDERMATE_LOGGING_FORMAT",
        "ORDERMATE_LOG_LEVEL",
        "ORDERMATE_LOG_FORMAT",
    ];

    let previous_values: Vec<(&str, Option<String>)> =
        keys.iter().map(|key| (*key, env::var(key).ok())).collect();

    for key in &keys {
        env::remove_var(key);
    }
    for (key, value) in vars {
        env::set_var(key, value);
    }

    test_fn();

    for (key, value) in previous_values {
        if let Some(value) = value {
            env::set_var(key, value);
        } else {
            env::remove_var(key);
        }
    }
}
