use std::path::Path;

use crate::commands::CommandResult;
use evisa_core::config::{AppConfig, LoadOptions};
use evisa_db::connect_with_settings;
use serde::Serialize;

const VISA_TEMPLATE: &str = "visa/visa.html.tera";
const EMAIL_TEMPLATES: &[&str] =
    &["email/draft_created.html.tera", "email/submitted.html.tera", "email/status_changed.html.tera"];

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
enum CheckStatus {
    Pass,
    Fail,
    Skipped,
}

#[derive(Debug, Serialize)]
struct DoctorCheck {
    name: &'static str,
    status: CheckStatus,
    details: String,
}

#[derive(Debug, Serialize)]
struct DoctorReport {
    overall_status: CheckStatus,
    summary: String,
    checks: Vec<DoctorCheck>,
}

/// Exit code is 0 unless a check failed. Skipped checks do not fail the run.
pub fn run(json_output: bool) -> CommandResult {
    let report = build_report();
    let exit_code = if report.overall_status == CheckStatus::Fail { 1 } else { 0 };

    let output = if json_output {
        serde_json::to_string_pretty(&report).unwrap_or_else(|error| {
            format!(
                "{{\"overall_status\":\"fail\",\"summary\":\"doctor serialization failed\",\"error\":\"{}\"}}",
                escape_json(&error.to_string())
            )
        })
    } else {
        render_human(&report)
    };

    CommandResult { exit_code, output }
}

fn build_report() -> DoctorReport {
    let mut checks = Vec::new();

    match AppConfig::load(LoadOptions::default()) {
        Ok(config) => {
            checks.push(DoctorCheck {
                name: "config_validation",
                status: CheckStatus::Pass,
                details: "configuration loaded and validated".to_string(),
            });
            checks.push(check_email_delivery(&config));
            checks.push(check_templates(&config.pdf.template_dir));
            checks.push(check_database_connectivity(&config));
        }
        Err(error) => {
            checks.push(DoctorCheck {
                name: "config_validation",
                status: CheckStatus::Fail,
                details: error.to_string(),
            });
            for name in ["email_delivery", "templates", "database_connectivity"] {
                checks.push(DoctorCheck {
                    name,
                    status: CheckStatus::Skipped,
                    details: "skipped because configuration did not load".to_string(),
                });
            }
        }
    }

    let failed = checks.iter().any(|check| check.status == CheckStatus::Fail);
    let overall_status = if failed { CheckStatus::Fail } else { CheckStatus::Pass };
    let summary = if failed {
        "doctor: one or more readiness checks failed".to_string()
    } else {
        "doctor: all readiness checks passed".to_string()
    };

    DoctorReport { overall_status, summary, checks }
}

fn check_email_delivery(config: &AppConfig) -> DoctorCheck {
    match (&config.email.api_key, &config.email.redirect_to) {
        (Some(_), Some(redirect)) => DoctorCheck {
            name: "email_delivery",
            status: CheckStatus::Pass,
            details: format!("Resend API key configured, all mail redirected to `{redirect}`"),
        },
        (Some(_), None) => DoctorCheck {
            name: "email_delivery",
            status: CheckStatus::Pass,
            details: format!("Resend API key configured, sending as `{}`", config.email.from),
        },
        (None, _) => DoctorCheck {
            name: "email_delivery",
            status: CheckStatus::Skipped,
            details: "no email API key, applicant emails will only be logged".to_string(),
        },
    }
}

fn check_templates(template_dir: &Path) -> DoctorCheck {
    if !template_dir.is_dir() {
        return DoctorCheck {
            name: "templates",
            status: CheckStatus::Skipped,
            details: format!(
                "`{}` not found, the embedded visa template will be used",
                template_dir.display()
            ),
        };
    }

    let missing: Vec<&str> = std::iter::once(VISA_TEMPLATE)
        .chain(EMAIL_TEMPLATES.iter().copied())
        .filter(|name| !template_dir.join(name).is_file())
        .collect();

    if missing.is_empty() {
        DoctorCheck {
            name: "templates",
            status: CheckStatus::Pass,
            details: format!("visa and email templates found under `{}`", template_dir.display()),
        }
    } else {
        DoctorCheck {
            name: "templates",
            status: CheckStatus::Fail,
            details: format!("missing templates: {}", missing.join(", ")),
        }
    }
}

fn check_database_connectivity(config: &AppConfig) -> DoctorCheck {
    let runtime = match tokio::runtime::Builder::new_current_thread().enable_all().build() {
        Ok(runtime) => runtime,
        Err(error) => {
            return DoctorCheck {
                name: "database_connectivity",
                status: CheckStatus::Fail,
                details: format!("failed to initialize async runtime: {error}"),
            };
        }
    };

    let result = runtime.block_on(async {
        let pool = connect_with_settings(
            &config.database.url,
            config.database.max_connections,
            config.database.timeout_secs,
        )
        .await
        .map_err(|error| format!("failed to connect to database: {error}"))?;

        pool.close().await;
        Ok::<(), String>(())
    });

    match result {
        Ok(()) => DoctorCheck {
            name: "database_connectivity",
            status: CheckStatus::Pass,
            details: format!("connected using `{}`", config.database.url),
        },
        Err(error) => {
            DoctorCheck { name: "database_connectivity", status: CheckStatus::Fail, details: error }
        }
    }
}

fn render_human(report: &DoctorReport) -> String {
    let mut lines = Vec::new();
    lines.push(report.summary.clone());

    for check in &report.checks {
        let marker = match check.status {
            CheckStatus::Pass => "ok",
            CheckStatus::Fail => "fail",
            CheckStatus::Skipped => "skip",
        };
        lines.push(format!("- [{marker}] {}: {}", check.name, check.details));
    }

    lines.join("\n")
}

fn escape_json(value: &str) -> String {
    value.replace('\\', "\\\\").replace('"', "\\\"")
}

#[cfg(test)]
mod tests {
    use std::fs;

    use super::{check_templates, CheckStatus, EMAIL_TEMPLATES, VISA_TEMPLATE};

    #[test]
    fn missing_template_dir_is_skipped_not_failed() {
        let dir = tempfile::tempdir().expect("tempdir");

        let check = check_templates(&dir.path().join("absent"));

        assert_eq!(check.status, CheckStatus::Skipped);
    }

    #[test]
    fn partial_template_dir_names_missing_files() {
        let dir = tempfile::tempdir().expect("tempdir");
        fs::create_dir_all(dir.path().join("visa")).expect("mkdir");
        fs::write(dir.path().join(VISA_TEMPLATE), "<html></html>").expect("write");

        let check = check_templates(dir.path());

        assert_eq!(check.status, CheckStatus::Fail);
        for name in EMAIL_TEMPLATES {
            assert!(check.details.contains(name), "{}", check.details);
        }
    }

    #[test]
    fn complete_template_dir_passes() {
        let dir = tempfile::tempdir().expect("tempdir");
        for name in std::iter::once(VISA_TEMPLATE).chain(EMAIL_TEMPLATES.iter().copied()) {
            let path = dir.path().join(name);
            fs::create_dir_all(path.parent().expect("parent")).expect("mkdir");
            fs::write(path, "{{ x }}").expect("write");
        }

        assert_eq!(check_templates(dir.path()).status, CheckStatus::Pass);
    }
}
