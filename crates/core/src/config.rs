use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use rust_decimal::Decimal;
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::domain::payment::SERVICE_FEE;

#[derive(Clone, Debug)]
pub struct AppConfig {
    pub database: DatabaseConfig,
    pub server: ServerConfig,
    pub payment: PaymentConfig,
    pub email: EmailConfig,
    pub pdf: PdfConfig,
    pub logging: LoggingConfig,
}

#[derive(Clone, Debug)]
pub struct DatabaseConfig {
    pub url: String,
    pub max_connections: u32,
    pub timeout_secs: u64,
}

#[derive(Clone, Debug)]
pub struct ServerConfig {
    pub bind_address: String,
    pub port: u16,
    pub health_check_port: u16,
    pub graceful_shutdown_secs: u64,
}

#[derive(Clone, Debug)]
pub struct PaymentConfig {
    /// Confirm submitted payments automatically after `confirmation_delay_ms`.
    pub simulate: bool,
    pub confirmation_delay_ms: u64,
    pub provider: String,
    pub currency: String,
    pub service_fee: Decimal,
}

#[derive(Clone, Debug)]
pub struct EmailConfig {
    /// Resend API key. Without one, outgoing mail is logged and skipped.
    pub api_key: Option<SecretString>,
    pub from: String,
    pub public_base_url: String,
    pub api_base_url: String,
    /// Delivers every message to this address instead of the applicant.
    pub redirect_to: Option<String>,
    /// Upper bound on one provider call. Delivery runs on the request path.
    pub timeout_secs: u64,
}

#[derive(Clone, Debug)]
pub struct PdfConfig {
    pub template_dir: PathBuf,
}

#[derive(Clone, Debug)]
pub struct LoggingConfig {
    pub level: String,
    pub format: LogFormat,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LogFormat {
    Compact,
    Pretty,
    Json,
}

#[derive(Clone, Debug, Default)]
pub struct ConfigOverrides {
    pub database_url: Option<String>,
    pub log_level: Option<String>,
    pub server_port: Option<u16>,
    pub payment_simulate: Option<bool>,
    pub email_api_key: Option<String>,
}

#[derive(Clone, Debug, Default)]
pub struct LoadOptions {
    pub config_path: Option<PathBuf>,
    pub require_file: bool,
    pub overrides: ConfigOverrides,
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("could not read config file `{path}`: {source}")]
    ReadFile { path: PathBuf, source: std::io::Error },
    #[error("could not parse config file `{path}`: {source}")]
    ParseFile { path: PathBuf, source: toml::de::Error },
    #[error("required config file was not found: `{0}`")]
    MissingConfigFile(PathBuf),
    #[error("environment variable interpolation failed for `{var}`")]
    MissingEnvInterpolation { var: String },
    #[error("unterminated environment interpolation expression")]
    UnterminatedInterpolation,
    #[error("invalid environment override for `{key}`: `{value}`")]
    InvalidEnvOverride { key: String, value: String },
    #[error("configuration validation failed: {0}")]
    Validation(String),
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            database: DatabaseConfig {
                url: "sqlite://evisa.db".to_string(),
                max_connections: 5,
                timeout_secs: 30,
            },
            server: ServerConfig {
                bind_address: "127.0.0.1".to_string(),
                port: 5000,
                health_check_port: 8080,
                graceful_shutdown_secs: 15,
            },
            payment: PaymentConfig {
                simulate: true,
                confirmation_delay_ms: 2000,
                provider: "MPESA".to_string(),
                currency: "USD".to_string(),
                service_fee: SERVICE_FEE,
            },
            email: EmailConfig {
                api_key: None,
                from: "e-Visa RDC <onboarding@resend.dev>".to_string(),
                public_base_url: "http://localhost:5000".to_string(),
                api_base_url: "https://api.resend.com".to_string(),
                redirect_to: None,
                timeout_secs: 10,
            },
            pdf: PdfConfig { template_dir: PathBuf::from("templates") },
            logging: LoggingConfig { level: "info".to_string(), format: LogFormat::Compact },
        }
    }
}

fn secret_value(value: String) -> SecretString {
    value.into()
}

impl std::str::FromStr for LogFormat {
    type Err = ConfigError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "compact" => Ok(Self::Compact),
            "pretty" => Ok(Self::Pretty),
            "json" => Ok(Self::Json),
            other => Err(ConfigError::Validation(format!(
                "unsupported log format `{other}` (expected compact|pretty|json)"
            ))),
        }
    }
}

impl AppConfig {
    pub fn load(options: LoadOptions) -> Result<Self, ConfigError> {
        let mut config = Self::default();
        let maybe_path = resolve_config_path(options.config_path.as_deref());

        if let Some(path) = maybe_path {
            let patch = read_patch(&path)?;
            config.apply_patch(patch);
        } else if options.require_file {
            let expected = options.config_path.unwrap_or_else(|| PathBuf::from("evisa.toml"));
            return Err(ConfigError::MissingConfigFile(expected));
        }

        config.apply_env_overrides()?;
        config.apply_overrides(options.overrides);
        config.validate()?;

        Ok(config)
    }

    fn apply_patch(&mut self, patch: ConfigPatch) {
        if let Some(database) = patch.database {
            if let Some(url) = database.url {
                self.database.url = url;
            }
            if let Some(max_connections) = database.max_connections {
                self.database.max_connections = max_connections;
            }
            if let Some(timeout_secs) = database.timeout_secs {
                self.database.timeout_secs = timeout_secs;
            }
        }

        if let Some(server) = patch.server {
            if let Some(bind_address) = server.bind_address {
                self.server.bind_address = bind_address;
            }
            if let Some(port) = server.port {
                self.server.port = port;
            }
            if let Some(health_check_port) = server.health_check_port {
                self.server.health_check_port = health_check_port;
            }
            if let Some(graceful_shutdown_secs) = server.graceful_shutdown_secs {
                self.server.graceful_shutdown_secs = graceful_shutdown_secs;
            }
        }

        if let Some(payment) = patch.payment {
            if let Some(simulate) = payment.simulate {
                self.payment.simulate = simulate;
            }
            if let Some(confirmation_delay_ms) = payment.confirmation_delay_ms {
                self.payment.confirmation_delay_ms = confirmation_delay_ms;
            }
            if let Some(provider) = payment.provider {
                self.payment.provider = provider;
            }
            if let Some(currency) = payment.currency {
                self.payment.currency = currency;
            }
            if let Some(service_fee) = payment.service_fee {
                self.payment.service_fee = service_fee;
            }
        }

        if let Some(email) = patch.email {
            if let Some(email_api_key_value) = email.api_key {
                self.email.api_key = Some(secret_value(email_api_key_value));
            }
            if let Some(from) = email.from {
                self.email.from = from;
            }
            if let Some(public_base_url) = email.public_base_url {
                self.email.public_base_url = public_base_url;
            }
            if let Some(api_base_url) = email.api_base_url {
                self.email.api_base_url = api_base_url;
            }
            if let Some(redirect_to) = email.redirect_to {
                self.email.redirect_to = Some(redirect_to);
            }
            if let Some(timeout_secs) = email.timeout_secs {
                self.email.timeout_secs = timeout_secs;
            }
        }

        if let Some(pdf) = patch.pdf {
            if let Some(template_dir) = pdf.template_dir {
                self.pdf.template_dir = template_dir;
            }
        }

        if let Some(logging) = patch.logging {
            if let Some(level) = logging.level {
                self.logging.level = level;
            }
            if let Some(format) = logging.format {
                self.logging.format = format;
            }
        }
    }

    fn apply_env_overrides(&mut self) -> Result<(), ConfigError> {
        if let Some(value) = read_env("EVISA_DATABASE_URL") {
            self.database.url = value;
        }
        if let Some(value) = read_env("EVISA_DATABASE_MAX_CONNECTIONS") {
            self.database.max_connections = parse_u32("EVISA_DATABASE_MAX_CONNECTIONS", &value)?;
        }
        if let Some(value) = read_env("EVISA_DATABASE_TIMEOUT_SECS") {
            self.database.timeout_secs = parse_u64("EVISA_DATABASE_TIMEOUT_SECS", &value)?;
        }

        if let Some(value) = read_env("EVISA_SERVER_BIND_ADDRESS") {
            self.server.bind_address = value;
        }
        if let Some(value) = read_env("EVISA_SERVER_PORT").or_else(|| read_env("PORT")) {
            self.server.port = parse_u16("EVISA_SERVER_PORT", &value)?;
        }
        if let Some(value) = read_env("EVISA_SERVER_HEALTH_CHECK_PORT") {
            self.server.health_check_port = parse_u16("EVISA_SERVER_HEALTH_CHECK_PORT", &value)?;
        }
        if let Some(value) = read_env("EVISA_SERVER_GRACEFUL_SHUTDOWN_SECS") {
            self.server.graceful_shutdown_secs =
                parse_u64("EVISA_SERVER_GRACEFUL_SHUTDOWN_SECS", &value)?;
        }

        if let Some(value) = read_env("EVISA_PAYMENT_SIMULATE") {
            self.payment.simulate = parse_bool("EVISA_PAYMENT_SIMULATE", &value)?;
        }
        if let Some(value) = read_env("EVISA_PAYMENT_CONFIRMATION_DELAY_MS") {
            self.payment.confirmation_delay_ms =
                parse_u64("EVISA_PAYMENT_CONFIRMATION_DELAY_MS", &value)?;
        }
        if let Some(value) = read_env("EVISA_PAYMENT_PROVIDER") {
            self.payment.provider = value;
        }
        if let Some(value) = read_env("EVISA_PAYMENT_CURRENCY") {
            self.payment.currency = value;
        }
        if let Some(value) = read_env("EVISA_PAYMENT_SERVICE_FEE") {
            self.payment.service_fee = parse_decimal("EVISA_PAYMENT_SERVICE_FEE", &value)?;
        }

        let api_key = read_env("EVISA_EMAIL_API_KEY").or_else(|| read_env("RESEND_API_KEY"));
        if let Some(value) = api_key {
            self.email.api_key = Some(secret_value(value));
        }
        if let Some(value) = read_env("EVISA_EMAIL_FROM") {
            self.email.from = value;
        }
        let public_base_url =
            read_env("EVISA_EMAIL_PUBLIC_BASE_URL").or_else(|| read_env("APP_URL"));
        if let Some(value) = public_base_url {
            self.email.public_base_url = value;
        }
        if let Some(value) = read_env("EVISA_EMAIL_API_BASE_URL") {
            self.email.api_base_url = value;
        }
        if let Some(value) = read_env("EVISA_EMAIL_REDIRECT_TO") {
            self.email.redirect_to = Some(value);
        }
        if let Some(value) = read_env("EVISA_EMAIL_TIMEOUT_SECS") {
            self.email.timeout_secs = parse_u64("EVISA_EMAIL_TIMEOUT_SECS", &value)?;
        }

        if let Some(value) = read_env("EVISA_PDF_TEMPLATE_DIR") {
            self.pdf.template_dir = PathBuf::from(value);
        }

        let log_level = read_env("EVISA_LOGGING_LEVEL").or_else(|| read_env("EVISA_LOG_LEVEL"));
        if let Some(value) = log_level {
            self.logging.level = value;
        }
        let log_format = read_env("EVISA_LOGGING_FORMAT").or_else(|| read_env("EVISA_LOG_FORMAT"));
        if let Some(value) = log_format {
            self.logging.format = value.parse()?;
        }

        Ok(())
    }

    fn apply_overrides(&mut self, overrides: ConfigOverrides) {
        if let Some(database_url) = overrides.database_url {
            self.database.url = database_url;
        }
        if let Some(log_level) = overrides.log_level {
            self.logging.level = log_level;
        }
        if let Some(port) = overrides.server_port {
            self.server.port = port;
        }
        if let Some(simulate) = overrides.payment_simulate {
            self.payment.simulate = simulate;
        }
        if let Some(api_key) = overrides.email_api_key {
            self.email.api_key = Some(secret_value(api_key));
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        validate_database(&self.database)?;
        validate_server(&self.server)?;
        validate_payment(&self.payment)?;
        validate_email(&self.email)?;
        validate_logging(&self.logging)?;
        Ok(())
    }
}

fn resolve_config_path(explicit_path: Option<&Path>) -> Option<PathBuf> {
    if let Some(path) = explicit_path {
        return path.exists().then_some(path.to_path_buf());
    }

    [PathBuf::from("evisa.toml"), PathBuf::from("config/evisa.toml")]
        .into_iter()
        .find(|path| path.exists())
}

fn read_patch(path: &Path) -> Result<ConfigPatch, ConfigError> {
    let raw = fs::read_to_string(path)
        .map_err(|source| ConfigError::ReadFile { path: path.to_path_buf(), source })?;

    let interpolated = interpolate_env_vars(&raw)?;
    toml::from_str::<ConfigPatch>(&interpolated)
        .map_err(|source| ConfigError::ParseFile { path: path.to_path_buf(), source })
}

fn interpolate_env_vars(input: &str) -> Result<String, ConfigError> {
    let mut output = String::with_capacity(input.len());
    let mut chars = input.chars().peekable();

    while let Some(ch) = chars.next() {
        if ch == '$' && matches!(chars.peek(), Some('{')) {
            chars.next();
            let mut key = String::new();

            loop {
                match chars.next() {
                    Some('}') => break,
                    Some(next) => key.push(next),
                    None => return Err(ConfigError::UnterminatedInterpolation),
                }
            }

            let value = env::var(&key)
                .map_err(|_| ConfigError::MissingEnvInterpolation { var: key.clone() })?;
            output.push_str(&value);
            continue;
        }

        output.push(ch);
    }

    Ok(output)
}

fn validate_database(database: &DatabaseConfig) -> Result<(), ConfigError> {
    let url = database.url.trim();
    let sqlite_url =
        url.starts_with("sqlite://") || url.starts_with("sqlite::") || url == ":memory:";
    if !sqlite_url {
        return Err(ConfigError::Validation(
            "database.url must be a sqlite URL (`sqlite://...`, `sqlite::...`, or `:memory:`)"
                .to_string(),
        ));
    }

    if database.max_connections == 0 {
        return Err(ConfigError::Validation(
            "database.max_connections must be greater than zero".to_string(),
        ));
    }

    if database.timeout_secs == 0 || database.timeout_secs > 300 {
        return Err(ConfigError::Validation(
            "database.timeout_secs must be in range 1..=300".to_string(),
        ));
    }

    Ok(())
}

fn validate_server(server: &ServerConfig) -> Result<(), ConfigError> {
    if server.port == 0 || server.health_check_port == 0 {
        return Err(ConfigError::Validation(
            "server.port and server.health_check_port must be greater than zero".to_string(),
        ));
    }

    if server.port == server.health_check_port {
        return Err(ConfigError::Validation(
            "server.health_check_port must differ from server.port".to_string(),
        ));
    }

    if server.graceful_shutdown_secs == 0 {
        return Err(ConfigError::Validation(
            "server.graceful_shutdown_secs must be greater than zero".to_string(),
        ));
    }

    Ok(())
}

fn validate_payment(payment: &PaymentConfig) -> Result<(), ConfigError> {
    if payment.service_fee.is_sign_negative() {
        return Err(ConfigError::Validation(
            "payment.service_fee must not be negative".to_string(),
        ));
    }

    if payment.provider.trim().is_empty() || payment.currency.trim().len() != 3 {
        return Err(ConfigError::Validation(
            "payment.provider is required and payment.currency must be a 3-letter code"
                .to_string(),
        ));
    }

    Ok(())
}

fn validate_email(email: &EmailConfig) -> Result<(), ConfigError> {
    for (key, url) in
        [("email.public_base_url", &email.public_base_url), ("email.api_base_url", &email.api_base_url)]
    {
        if !url.starts_with("http://") && !url.starts_with("https://") {
            return Err(ConfigError::Validation(format!(
                "{key} must start with http:// or https://"
            )));
        }
    }

    if email.timeout_secs == 0 || email.timeout_secs > 120 {
        return Err(ConfigError::Validation(
            "email.timeout_secs must be in range 1..=120".to_string(),
        ));
    }

    if let Some(api_key) = &email.api_key {
        if api_key.expose_secret().trim().is_empty() {
            return Err(ConfigError::Validation(
                "email.api_key must not be blank when set".to_string(),
            ));
        }
    }

    if email.from.trim().is_empty() {
        return Err(ConfigError::Validation("email.from is required".to_string()));
    }

    Ok(())
}

fn validate_logging(logging: &LoggingConfig) -> Result<(), ConfigError> {
    let level = logging.level.trim().to_ascii_lowercase();
    match level.as_str() {
        "trace" | "debug" | "info" | "warn" | "error" => Ok(()),
        _ => Err(ConfigError::Validation(
            "logging.level must be one of trace|debug|info|warn|error".to_string(),
        )),
    }
}

fn read_env(key: &str) -> Option<String> {
    env::var(key).ok().filter(|value| !value.trim().is_empty())
}

fn parse_u16(key: &str, value: &str) -> Result<u16, ConfigError> {
    value.parse::<u16>().map_err(|_| ConfigError::InvalidEnvOverride {
        key: key.to_string(),
        value: value.to_string(),
    })
}

fn parse_u32(key: &str, value: &str) -> Result<u32, ConfigError> {
    value.parse::<u32>().map_err(|_| ConfigError::InvalidEnvOverride {
        key: key.to_string(),
        value: value.to_string(),
    })
}

fn parse_u64(key: &str, value: &str) -> Result<u64, ConfigError> {
    value.parse::<u64>().map_err(|_| ConfigError::InvalidEnvOverride {
        key: key.to_string(),
        value: value.to_string(),
    })
}

fn parse_bool(key: &str, value: &str) -> Result<bool, ConfigError> {
    value.parse::<bool>().map_err(|_| ConfigError::InvalidEnvOverride {
        key: key.to_string(),
        value: value.to_string(),
    })
}

fn parse_decimal(key: &str, value: &str) -> Result<Decimal, ConfigError> {
    value.trim().parse::<Decimal>().map_err(|_| ConfigError::InvalidEnvOverride {
        key: key.to_string(),
        value: value.to_string(),
    })
}

#[derive(Debug, Default, Deserialize)]
struct ConfigPatch {
    database: Option<DatabasePatch>,
    server: Option<ServerPatch>,
    payment: Option<PaymentPatch>,
    email: Option<EmailPatch>,
    pdf: Option<PdfPatch>,
    logging: Option<LoggingPatch>,
}

#[derive(Debug, Default, Deserialize)]
struct DatabasePatch {
    url: Option<String>,
    max_connections: Option<u32>,
    timeout_secs: Option<u64>,
}

#[derive(Debug, Default, Deserialize)]
struct ServerPatch {
    bind_address: Option<String>,
    port: Option<u16>,
    health_check_port: Option<u16>,
    graceful_shutdown_secs: Option<u64>,
}

#[derive(Debug, Default, Deserialize)]
struct PaymentPatch {
    simulate: Option<bool>,
    confirmation_delay_ms: Option<u64>,
    provider: Option<String>,
    currency: Option<String>,
    service_fee: Option<Decimal>,
}

#[derive(Debug, Default, Deserialize)]
struct EmailPatch {
    api_key: Option<String>,
    from: Option<String>,
    public_base_url: Option<String>,
    api_base_url: Option<String>,
    redirect_to: Option<String>,
    timeout_secs: Option<u64>,
}

#[derive(Debug, Default, Deserialize)]
struct PdfPatch {
    template_dir: Option<PathBuf>,
}

#[derive(Debug, Default, Deserialize)]
struct LoggingPatch {
    level: Option<String>,
    format: Option<LogFormat>,
}

#[cfg(test)]
mod tests {
    use std::env;
    use std::fs;
    use std::io;
    use std::sync::{Mutex, OnceLock};

    use rust_decimal::Decimal;
    use secrecy::ExposeSecret;
    use tempfile::TempDir;

    use super::{AppConfig, ConfigError, ConfigOverrides, LoadOptions, LogFormat};

    static ENV_LOCK: OnceLock<Mutex<()>> = OnceLock::new();

    fn env_lock() -> &'static Mutex<()> {
        ENV_LOCK.get_or_init(|| Mutex::new(()))
    }

    fn clear_vars(vars: &[&str]) {
        for var in vars {
            env::remove_var(var);
        }
    }

    fn ensure(condition: bool, message: &'static str) -> Result<(), String> {
        if condition {
            Ok(())
        } else {
            Err(message.to_string())
        }
    }

    #[test]
    fn defaults_load_without_file_or_env() -> Result<(), String> {
        let _guard = env_lock().lock().map_err(|_| "env lock is poisoned".to_string())?;

        let config = AppConfig::load(LoadOptions::default())
            .map_err(|err| format!("config load failed: {err}"))?;

        ensure(config.payment.simulate, "payment simulation should default to on")?;
        ensure(config.payment.confirmation_delay_ms == 2000, "default delay should be 2s")?;
        ensure(config.payment.service_fee == Decimal::new(5, 0), "default fee should be 5")?;
        ensure(config.email.api_key.is_none(), "no api key by default")?;
        ensure(
            matches!(config.logging.format, LogFormat::Compact),
            "default logging format should be compact",
        )
    }

    #[test]
    fn file_load_supports_env_interpolation() -> Result<(), String> {
        let _guard = env_lock().lock().map_err(|_| "env lock is poisoned".to_string())?;

        env::set_var("TEST_EVISA_RESEND_KEY", "re_from_env");

        let result = (|| -> Result<(), String> {
            let dir = TempDir::new().map_err(|err: io::Error| err.to_string())?;
            let path = dir.path().join("evisa.toml");
            fs::write(
                &path,
                r#"
[email]
api_key = "${TEST_EVISA_RESEND_KEY}"
public_base_url = "https://evisa.example.cd"

[payment]
service_fee = "7.50"
"#,
            )
            .map_err(|err| err.to_string())?;

            let config =
                AppConfig::load(LoadOptions { config_path: Some(path), ..LoadOptions::default() })
                    .map_err(|err| format!("config load failed: {err}"))?;

            ensure(
                config.email.api_key.as_ref().map(|key| key.expose_secret() == "re_from_env")
                    == Some(true),
                "api key should be interpolated from environment",
            )?;
            ensure(
                config.email.public_base_url == "https://evisa.example.cd",
                "public base url should come from file",
            )?;
            ensure(config.payment.service_fee == Decimal::new(750, 2), "fee should come from file")
        })();

        clear_vars(&["TEST_EVISA_RESEND_KEY"]);
        result
    }

    #[test]
    fn precedence_defaults_file_env_overrides() -> Result<(), String> {
        let _guard = env_lock().lock().map_err(|_| "env lock is poisoned".to_string())?;

        env::set_var("EVISA_DATABASE_URL", "sqlite://from-env.db");
        env::set_var("EVISA_PAYMENT_CONFIRMATION_DELAY_MS", "50");

        let result = (|| -> Result<(), String> {
            let dir = TempDir::new().map_err(|err: io::Error| err.to_string())?;
            let path = dir.path().join("evisa.toml");
            fs::write(
                &path,
                r#"
[database]
url = "sqlite://from-file.db"

[payment]
confirmation_delay_ms = 10000
simulate = true

[logging]
level = "warn"
"#,
            )
            .map_err(|err| err.to_string())?;

            let config = AppConfig::load(LoadOptions {
                config_path: Some(path),
                overrides: ConfigOverrides {
                    database_url: Some("sqlite://from-override.db".to_string()),
                    log_level: Some("debug".to_string()),
                    payment_simulate: Some(false),
                    ..ConfigOverrides::default()
                },
                ..LoadOptions::default()
            })
            .map_err(|err| format!("config load failed: {err}"))?;

            ensure(
                config.database.url == "sqlite://from-override.db",
                "override database url should win",
            )?;
            ensure(config.logging.level == "debug", "overridden log level should be debug")?;
            ensure(
                config.payment.confirmation_delay_ms == 50,
                "env delay should win over file and defaults",
            )?;
            ensure(!config.payment.simulate, "override should disable simulation")
        })();

        clear_vars(&["EVISA_DATABASE_URL", "EVISA_PAYMENT_CONFIRMATION_DELAY_MS"]);
        result
    }

    #[test]
    fn invalid_numeric_env_override_is_reported_with_key() -> Result<(), String> {
        let _guard = env_lock().lock().map_err(|_| "env lock is poisoned".to_string())?;

        env::set_var("EVISA_SERVER_PORT", "eighty");

        let result = match AppConfig::load(LoadOptions::default()) {
            Ok(_) => Err("expected env override failure".to_string()),
            Err(ConfigError::InvalidEnvOverride { key, .. }) => {
                ensure(key == "EVISA_SERVER_PORT", "error should name the variable")
            }
            Err(other) => Err(format!("unexpected error: {other}")),
        };

        clear_vars(&["EVISA_SERVER_PORT"]);
        result
    }

    #[test]
    fn validation_fails_fast_with_actionable_error() -> Result<(), String> {
        let _guard = env_lock().lock().map_err(|_| "env lock is poisoned".to_string())?;

        env::set_var("EVISA_EMAIL_PUBLIC_BASE_URL", "evisa.example.cd");

        let result = (|| -> Result<(), String> {
            let error = match AppConfig::load(LoadOptions::default()) {
                Ok(_) => {
                    return Err("expected validation failure but config load succeeded".to_string())
                }
                Err(error) => error,
            };
            let has_message = matches!(
                error,
                ConfigError::Validation(ref message) if message.contains("email.public_base_url")
            );
            ensure(has_message, "validation failure should mention email.public_base_url")
        })();

        clear_vars(&["EVISA_EMAIL_PUBLIC_BASE_URL"]);
        result
    }

    #[test]
    fn email_timeout_must_be_bounded() -> Result<(), String> {
        let _guard = env_lock().lock().map_err(|_| "env lock is poisoned".to_string())?;

        env::set_var("EVISA_EMAIL_TIMEOUT_SECS", "0");

        let result = match AppConfig::load(LoadOptions::default()) {
            Ok(_) => Err("expected a zero email timeout to be rejected".to_string()),
            Err(ConfigError::Validation(message)) => {
                ensure(message.contains("email.timeout_secs"), "error should name email.timeout_secs")
            }
            Err(other) => Err(format!("unexpected error: {other}")),
        };

        clear_vars(&["EVISA_EMAIL_TIMEOUT_SECS"]);
        result
    }

    #[test]
    fn secret_values_are_not_leaked_by_debug() -> Result<(), String> {
        let _guard = env_lock().lock().map_err(|_| "env lock is poisoned".to_string())?;

        env::set_var("EVISA_EMAIL_API_KEY", "re_secret_value");

        let result = (|| -> Result<(), String> {
            let config = AppConfig::load(LoadOptions::default())
                .map_err(|err| format!("config load failed: {err}"))?;
            let debug = format!("{config:?}");

            ensure(!debug.contains("re_secret_value"), "debug output should not contain api key")
        })();

        clear_vars(&["EVISA_EMAIL_API_KEY"]);
        result
    }
}
