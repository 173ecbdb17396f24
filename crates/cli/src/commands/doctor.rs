use std::sync::Arc;

use approvly_client::{ApiClient, FileSessionStore, Session, SessionStore};
use approvly_core::config::{AppConfig, LoadOptions};
use serde::Serialize;

use crate::commands::CommandResult;

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

pub fn run(options: LoadOptions, json_output: bool) -> CommandResult {
    let report = build_report(options);
    let exit_code = if report.overall_status == CheckStatus::Pass { 0 } else { 1 };

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

fn build_report(options: LoadOptions) -> DoctorReport {
    let mut checks = Vec::new();

    match AppConfig::load(options) {
        Ok(config) => {
            checks.push(DoctorCheck {
                name: "config_validation",
                status: CheckStatus::Pass,
                details: "configuration loaded and validated".to_string(),
            });
            checks.push(check_session_store(&config));
            checks.push(check_api_reachability(&config));
        }
        Err(error) => {
            checks.push(DoctorCheck {
                name: "config_validation",
                status: CheckStatus::Fail,
                details: error.to_string(),
            });
            for name in ["session_store", "api_reachability"] {
                checks.push(DoctorCheck {
                    name,
                    status: CheckStatus::Skipped,
                    details: "skipped because configuration did not load".to_string(),
                });
            }
        }
    }

    let all_pass = checks.iter().all(|check| check.status == CheckStatus::Pass);
    let overall_status = if all_pass { CheckStatus::Pass } else { CheckStatus::Fail };
    let summary = if all_pass {
        "doctor: all readiness checks passed".to_string()
    } else {
        "doctor: one or more readiness checks failed".to_string()
    };

    DoctorReport { overall_status, summary, checks }
}

/// A missing session is fine (the user is simply logged out); an unreadable one is not.
fn check_session_store(config: &AppConfig) -> DoctorCheck {
    let store = FileSessionStore::new(config.session.path.clone());
    let path = store.path().display().to_string();
    match store.load() {
        Ok(Some(_)) => DoctorCheck {
            name: "session_store",
            status: CheckStatus::Pass,
            details: format!("persisted session found at `{path}`"),
        },
        Ok(None) => DoctorCheck {
            name: "session_store",
            status: CheckStatus::Pass,
            details: format!("no persisted session at `{path}`; run `approvly login`"),
        },
        Err(error) => DoctorCheck {
            name: "session_store",
            status: CheckStatus::Fail,
            details: error.to_string(),
        },
    }
}

fn check_api_reachability(config: &AppConfig) -> DoctorCheck {
    let runtime = match tokio::runtime::Builder::new_current_thread().enable_all().build() {
        Ok(runtime) => runtime,
        Err(error) => {
            return DoctorCheck {
                name: "api_reachability",
                status: CheckStatus::Fail,
                details: format!("failed to initialize async runtime: {error}"),
            };
        }
    };

    let result = runtime.block_on(async {
        let client = ApiClient::from_config(&config.api, Arc::new(Session::in_memory()))
            .map_err(|error| error.to_string())?;
        client.probe().await.map_err(|error| format!("failed to reach api: {error}"))
    });

    match result {
        Ok(status) => DoctorCheck {
            name: "api_reachability",
            status: CheckStatus::Pass,
            details: format!("`{}` answered with status {status}", config.api.base_url),
        },
        Err(error) => {
            DoctorCheck { name: "api_reachability", status: CheckStatus::Fail, details: error }
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
