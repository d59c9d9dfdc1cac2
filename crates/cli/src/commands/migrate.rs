use crate::commands::{connect, run_with_config, CommandFailure, CommandResult, ErrorClass};
use evisa_db::migrations;

pub fn run() -> CommandResult {
    let outcome = run_with_config(|config| async move {
        let pool = connect(&config).await?;
        migrations::run_pending(&pool)
            .await
            .map_err(|error| CommandFailure::new(ErrorClass::Migration, error.to_string()))?;
        let applied = migrations::applied_count(&pool)
            .await
            .map_err(|error| CommandFailure::new(ErrorClass::Migration, error.to_string()))?;
        pool.close().await;
        Ok::<_, CommandFailure>(format!(
            "applied pending migrations ({applied} recorded in schema history)"
        ))
    });

    CommandResult::from_outcome("migrate", outcome)
}
