use ordermate_db::{connect_from_config, migrations, DemoSeedDataset};

use crate::commands::{current_thread_runtime, load_config, CommandResult, StepFailure};

pub fn run() -> CommandResult {
    let config = match load_config("seed") {
        Ok(config) => config,
        Err(failure) => return failure,
    };
    let runtime = match current_thread_runtime("seed") {
        Ok(runtime) => runtime,
        Err(failure) => return failure,
    };

    let result = runtime.block_on(async {
        let pool = connect_from_config(&config.database)
            .await
            .map_err(|error| ("db_connectivity", error.to_string(), 4u8))?;
        migrations::run_pending(&pool)
            .await
            .map_err(|error| ("migration", error.to_string(), 5u8))?;

        let seeded = DemoSeedDataset::load(&pool)
            .await
            .map_err(|error| ("seed_execution", error.to_string(), 5u8))?;
        let verification = DemoSeedDataset::verify(&pool)
            .await
            .map_err(|error| ("seed_verification", error.to_string(), 6u8))?;
        pool.close().await;

        if !verification.all_present {
            return Err(("seed_verification", verification_message(&verification.checks), 6u8));
        }
        Ok::<_, StepFailure>(seeded)
    });

    match result {
        Ok(seeded) => CommandResult::success(
            "seed",
            format!(
                "demo tenant `{}` seeded with menu items: {}",
                seeded.tenant_id,
                seeded.items_seeded.join(", ")
            ),
        ),
        Err((error_class, message, exit_code)) => {
            CommandResult::failure("seed", error_class, message, exit_code)
        }
    }
}

fn verification_message(checks: &[(&str, bool)]) -> String {
    let failed =
        checks.iter().filter_map(|(check, passed)| (!passed).then_some(*check)).collect::<Vec<_>>();
    if failed.is_empty() {
        "some seed data failed to load".to_string()
    } else {
        format!("seed verification failed for checks: {}", failed.join(", "))
    }
}

#[cfg(test)]
mod tests {
    use super::verification_message;

    #[test]
    fn verification_message_names_failed_checks() {
        let checks = [("demo-tenant", true), ("demo-menu-size", false), ("loaded-fries", false)];

        assert_eq!(
            verification_message(&checks),
            "seed verification failed for checks: demo-menu-size, loaded-fries"
        );
    }

    #[test]
    fn verification_message_falls_back_when_every_check_passed() {
        let checks = [("demo-tenant", true)];

        assert_eq!(verification_message(&checks), "some seed data failed to load");
    }
}
