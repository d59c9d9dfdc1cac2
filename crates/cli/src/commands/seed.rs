use crate::commands::{connect, run_with_config, CommandFailure, CommandResult, ErrorClass};
use evisa_db::{migrations, DemoSeedDataset, SeededApplication};

pub fn run() -> CommandResult {
    let outcome = run_with_config(|config| async move {
        let pool = connect(&config).await?;

        migrations::run_pending(&pool)
            .await
            .map_err(|error| CommandFailure::new(ErrorClass::Migration, error.to_string()))?;

        let seed_result = DemoSeedDataset::load(&pool)
            .await
            .map_err(|error| CommandFailure::new(ErrorClass::SeedExecution, error.to_string()))?;

        let verification = DemoSeedDataset::verify(&pool)
            .await
            .map_err(|error| CommandFailure::new(ErrorClass::SeedVerification, error.to_string()))?;

        let run_result: Result<String, CommandFailure> = if verification.all_present {
            Ok(success_message(&seed_result.applications_seeded))
        } else {
            Err(CommandFailure::new(
                ErrorClass::SeedVerification,
                verification_failure_message(&verification.checks),
            ))
        };

        pool.close().await;
        run_result
    });

    CommandResult::from_outcome("seed", outcome)
}

fn success_message(applications: &[SeededApplication]) -> String {
    let lines: Vec<String> = applications
        .iter()
        .map(|app| format!("  - {}: {} ({})", app.application_number, app.status, app.description))
        .collect();
    format!(
        "demo dataset loaded: administrator `admin` and {} applications:\n{}",
        applications.len(),
        lines.join("\n")
    )
}

fn verification_failure_message(checks: &[(&'static str, bool)]) -> String {
    let failed_checks =
        checks.iter().filter_map(|(check, passed)| (!passed).then_some(*check)).collect::<Vec<_>>();
    if failed_checks.is_empty() {
        "Some seed data failed to load".to_string()
    } else {
        format!("Seed verification failed for checks: {}", failed_checks.join(", "))
    }
}
