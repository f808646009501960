use chrono::Duration;
use ordermate_core::ports::SessionStore;
use ordermate_db::{connect_from_config, migrations, VersionedSessionStore};

use crate::commands::{current_thread_runtime, load_config, CommandResult, StepFailure};

/// One-off removal of sessions idle for longer than `session.ttl_secs`.
pub fn run() -> CommandResult {
    let config = match load_config("sweep") {
        Ok(config) => config,
        Err(failure) => return failure,
    };
    let runtime = match current_thread_runtime("sweep") {
        Ok(runtime) => runtime,
        Err(failure) => return failure,
    };
    let ttl = Duration::seconds(i64::try_from(config.session.ttl_secs).unwrap_or(i64::MAX));

    let result = runtime.block_on(async {
        let pool = connect_from_config(&config.database)
            .await
            .map_err(|error| ("db_connectivity", error.to_string(), 4u8))?;
        migrations::run_pending(&pool)
            .await
            .map_err(|error| ("migration", error.to_string(), 5u8))?;

        let store = VersionedSessionStore::sqlite(pool.clone(), ttl);
        let removed = store
            .sweep_expired()
            .await
            .map_err(|error| ("session_sweep", error.to_string(), 6u8))?;
        pool.close().await;
        Ok::<usize, StepFailure>(removed)
    });

    match result {
        Ok(removed) => CommandResult::success(
            "sweep",
            format!("removed {removed} session(s) idle for more than {}s", config.session.ttl_secs),
        ),
        Err((error_class, message, exit_code)) => {
            CommandResult::failure("sweep", error_class, message, exit_code)
        }
    }
}
