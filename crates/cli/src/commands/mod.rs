pub mod doctor;
pub mod migrate;
pub mod seed;

use std::future::Future;

use evisa_core::config::{AppConfig, LoadOptions};
use evisa_db::{connect_with_settings, DbPool};
use serde::Serialize;

#[derive(Debug, Clone)]
pub struct CommandResult {
    pub exit_code: u8,
    pub output: String,
}

/// Why a database command stopped. Each class maps to one process exit code.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorClass {
    ConfigValidation,
    RuntimeInit,
    DbConnectivity,
    Migration,
    SeedExecution,
    SeedVerification,
}

impl ErrorClass {
    pub fn exit_code(self) -> u8 {
        match self {
            Self::ConfigValidation => 2,
            Self::RuntimeInit => 3,
            Self::DbConnectivity => 4,
            Self::Migration | Self::SeedExecution => 5,
            Self::SeedVerification => 6,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandFailure {
    pub class: ErrorClass,
    pub message: String,
}

impl CommandFailure {
    pub fn new(class: ErrorClass, message: impl Into<String>) -> Self {
        Self { class, message: message.into() }
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "snake_case")]
enum OutcomeStatus {
    Ok,
    Error,
}

#[derive(Debug, Serialize)]
struct CommandOutcome<'a> {
    command: &'a str,
    status: OutcomeStatus,
    error_class: Option<ErrorClass>,
    message: String,
}

impl CommandResult {
    pub fn from_outcome(command: &str, outcome: Result<String, CommandFailure>) -> Self {
        match outcome {
            Ok(message) => {
                let payload =
                    CommandOutcome { command, status: OutcomeStatus::Ok, error_class: None, message };
                Self { exit_code: 0, output: serialize_payload(&payload) }
            }
            Err(failure) => {
                let payload = CommandOutcome {
                    command,
                    status: OutcomeStatus::Error,
                    error_class: Some(failure.class),
                    message: failure.message,
                };
                Self { exit_code: failure.class.exit_code(), output: serialize_payload(&payload) }
            }
        }
    }
}

/// Loads configuration and drives `work` to completion on a single-threaded runtime.
pub(crate) fn run_with_config<T, F, Fut>(work: F) -> Result<T, CommandFailure>
where
    F: FnOnce(AppConfig) -> Fut,
    Fut: Future<Output = Result<T, CommandFailure>>,
{
    let config = AppConfig::load(LoadOptions::default()).map_err(|error| {
        CommandFailure::new(ErrorClass::ConfigValidation, format!("configuration issue: {error}"))
    })?;

    let runtime =
        tokio::runtime::Builder::new_current_thread().enable_all().build().map_err(|error| {
            CommandFailure::new(
                ErrorClass::RuntimeInit,
                format!("failed to initialize async runtime: {error}"),
            )
        })?;

    runtime.block_on(work(config))
}

pub(crate) async fn connect(config: &AppConfig) -> Result<DbPool, CommandFailure> {
    connect_with_settings(
        &config.database.url,
        config.database.max_connections,
        config.database.timeout_secs,
    )
    .await
    .map_err(|error| CommandFailure::new(ErrorClass::DbConnectivity, error.to_string()))
}

fn serialize_payload(payload: &CommandOutcome<'_>) -> String {
    serde_json::to_string(payload).unwrap_or_else(|error| {
        format!(
            "{{\"command\":\"unknown\",\"status\":\"error\",\"error_class\":\"serialization\",\"message\":\"{}\"}}",
            error.to_string().replace('\\', "\\\\").replace('"', "\\\"")
        )
    })
}
