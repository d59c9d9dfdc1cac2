use std::sync::Arc;

use evisa_core::config::{AppConfig, ConfigError};
use evisa_db::{connect_with_settings, migrations, DbPool};
use thiserror::Error;
use tracing::info;

use crate::api::AppState;
use crate::notify::{notifier_from_config, NotifyError};
use crate::pdf::VisaDocumentRenderer;
use crate::workflow::VisaWorkflow;

pub struct Application {
    pub config: AppConfig,
    pub db_pool: DbPool,
    pub state: AppState,
}

#[derive(Debug, Error)]
pub enum BootstrapError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error("database connection failed: {0}")]
    DatabaseConnect(#[source] sqlx::Error),
    #[error("database migration failed: {0}")]
    Migration(#[source] sqlx::migrate::MigrateError),
    #[error("email client setup failed: {0}")]
    Notifier(#[source] NotifyError),
}

pub async fn bootstrap_with_config(config: AppConfig) -> Result<Application, BootstrapError> {
    info!(
        event_name = "system.bootstrap.start",
        correlation_id = "bootstrap",
        "starting application bootstrap"
    );

    let db_pool = connect_with_settings(
        &config.database.url,
        config.database.max_connections,
        config.database.timeout_secs,
    )
    .await
    .map_err(BootstrapError::DatabaseConnect)?;
    info!(
        event_name = "system.bootstrap.database_connected",
        correlation_id = "bootstrap",
        "database connection established"
    );

    migrations::run_pending(&db_pool).await.map_err(BootstrapError::Migration)?;
    info!(
        event_name = "system.bootstrap.migrations_applied",
        correlation_id = "bootstrap",
        "database migrations applied"
    );

    let notifier = notifier_from_config(&config.email).map_err(BootstrapError::Notifier)?;
    let documents =
        VisaDocumentRenderer::new(&config.pdf.template_dir, &config.email.public_base_url);
    let workflow = VisaWorkflow::new(db_pool.clone(), &config, notifier);
    info!(
        event_name = "system.bootstrap.services_ready",
        correlation_id = "bootstrap",
        email_delivery = if config.email.api_key.is_some() { "resend" } else { "log_only" },
        payment_simulation = config.payment.simulate,
        "application services initialized"
    );

    let state = AppState { workflow: Arc::new(workflow), documents: Arc::new(documents) };
    Ok(Application { config, db_pool, state })
}
