use std::sync::Arc;

use flightdesk_core::config::{AppConfig, LoadOptions};
use flightdesk_core::secrets::provider_from_config;
use flightdesk_core::{MailCredentials, SecretProvider};
use serde::Serialize;

use super::{block_on, escape_json};

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

pub fn run(json_output: bool) -> String {
    let report = build_report();

    if json_output {
        return serde_json::to_string_pretty(&report).unwrap_or_else(|error| {
            format!(
                "{{\"overall_status\":\"fail\",\"summary\":\"doctor serialization failed\",\"error\":\"{}\"}}",
                escape_json(&error.to_string())
            )
        });
    }

    render_human(&report)
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
            checks.extend(secret_checks(&config));
        }
        Err(error) => {
            checks.push(DoctorCheck {
                name: "config_validation",
                status: CheckStatus::Fail,
                details: error.to_string(),
            });
            for name in ["search_api_key", "mail_credentials"] {
                checks.push(DoctorCheck {
                    name,
                    status: CheckStatus::Skipped,
                    details: "skipped because configuration did not load".to_string(),
                });
            }
        }
    }

    // Disabled mail is not a failure.
    let all_pass = checks.iter().all(|check| check.status != CheckStatus::Fail);
    let overall_status = if all_pass { CheckStatus::Pass } else { CheckStatus::Fail };
    let summary = if all_pass {
        "doctor: all readiness checks passed".to_string()
    } else {
        "doctor: one or more readiness checks failed".to_string()
    };

    DoctorReport { overall_status, summary, checks }
}

fn secret_checks(config: &AppConfig) -> Vec<DoctorCheck> {
    let secrets = match provider_from_config(&config.secrets) {
        Ok(secrets) => secrets,
        Err(error) => {
            return vec![
                DoctorCheck {
                    name: "search_api_key",
                    status: CheckStatus::Fail,
                    details: error.to_string(),
                },
                DoctorCheck {
                    name: "mail_credentials",
                    status: CheckStatus::Skipped,
                    details: "skipped because the secret backend is unavailable".to_string(),
                },
            ];
        }
    };

    match block_on(run_secret_checks(config, secrets)) {
        Ok(checks) => checks,
        Err(error) => {
            vec![DoctorCheck { name: "search_api_key", status: CheckStatus::Fail, details: error }]
        }
    }
}

async fn run_secret_checks(
    config: &AppConfig,
    secrets: Arc<dyn SecretProvider>,
) -> Vec<DoctorCheck> {
    let backend = secrets.backend_name();
    let search_api_key = match secrets.fetch(&config.search.api_key_secret).await {
        Ok(_) => DoctorCheck {
            name: "search_api_key",
            status: CheckStatus::Pass,
            details: format!("`{}` available from {backend}", config.search.api_key_secret),
        },
        Err(error) => DoctorCheck {
            name: "search_api_key",
            status: CheckStatus::Fail,
            details: error.to_string(),
        },
    };

    let mail_credentials = if !config.mail.enabled {
        DoctorCheck {
            name: "mail_credentials",
            status: CheckStatus::Skipped,
            details: "mail delivery is disabled".to_string(),
        }
    } else {
        let name = config.mail.credentials_secret.as_str();
        let parsed = match secrets.fetch(name).await {
            Ok(secret) => MailCredentials::from_secret(name, &secret),
            Err(error) => Err(error),
        };
        match parsed {
            Ok(credentials) => DoctorCheck {
                name: "mail_credentials",
                status: CheckStatus::Pass,
                details: format!("credentials for {} available from {backend}", credentials.email),
            },
            Err(error) => DoctorCheck {
                name: "mail_credentials",
                status: CheckStatus::Fail,
                details: error.to_string(),
            },
        }
    };

    vec![search_api_key, mail_credentials]
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
