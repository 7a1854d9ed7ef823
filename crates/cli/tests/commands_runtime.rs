use std::env;
use std::fs;
use std::sync::{Mutex, OnceLock};

use flightdesk_cli::commands::search::{self, SearchArgs};
use flightdesk_cli::commands::{airports, config, doctor};
use flightdesk_core::config::{AppConfig, LoadOptions};
use rust_decimal::Decimal;
use serde_json::Value;

fn round_trip(from: &str, to: &str) -> SearchArgs {
    SearchArgs {
        from: from.to_string(),
        to: to.to_string(),
        depart: "2024-06-01".to_string(),
        return_date: Some("2024-06-10".to_string()),
        ..SearchArgs::default()
    }
}

#[test]
fn airports_lists_every_supported_city() {
    let result = airports::run(true);
    assert_eq!(result.exit_code, 0);

    let payload = parse_payload(&result.output);
    let entries = payload.as_array().expect("array of cities");
    assert_eq!(entries.len(), 26);
    assert!(entries.iter().any(|entry| entry["city"] == "Miami" && entry["code"] == "MIA"));

    let human = airports::run(false);
    assert!(human.output.starts_with("26 supported cities"));
    assert!(human.output.contains("Hong Kong"));
}

#[test]
fn search_with_unknown_city_fails_without_network() {
    with_env(&[], || {
        let result = search::run(round_trip("Atlantis", "Dubai"));

        assert_eq!(result.exit_code, 2, "lookup failures are invalid input");
        assert_eq!(result.output, "Sorry, I couldn't find airport codes for Atlantis or Dubai.");
    });
}

#[test]
fn search_json_reports_validation_outcome() {
    with_env(&[], || {
        let mut args = round_trip("Miami", "Dubai");
        args.return_date = None;
        args.json = true;

        let result = search::run(args);
        assert_eq!(result.exit_code, 2);

        let payload = parse_payload(&result.output);
        assert_eq!(payload["command"], "search");
        assert_eq!(payload["status"], "error");
        assert_eq!(payload["outcome"], "validation_error");
        assert!(payload["text"].as_str().expect("text").starts_with("For round-trip flights"));
        assert!(payload["booking_url"].is_null());
    });
}

#[test]
fn search_reports_unreachable_provider_as_upstream_failure() {
    with_env(
        &[
            ("FLIGHTDESK_SEARCH_BASE_URL", "http://127.0.0.1:1/search"),
            ("FLIGHTDESK_SEARCH_TIMEOUT_SECS", "5"),
            ("FLIGHTDESK_SECRET_SERPAPI_KEY", "cli-test-key"),
        ],
        || {
            let mut args = round_trip("New York", "London");
            args.one_way = true;
            args.budget = Some(Decimal::new(500, 0));

            let result = search::run(args);

            assert_eq!(result.exit_code, 3);
            assert!(result.output.starts_with("Sorry, I encountered an error: API request failed:"));
            assert!(!result.output.contains("cli-test-key"));
        },
    );
}

#[test]
fn search_returns_config_failure_for_invalid_backend_setup() {
    with_env(&[("FLIGHTDESK_SECRETS_BACKEND", "gcp")], || {
        let result = search::run(round_trip("Miami", "Dubai"));
        assert_eq!(result.exit_code, 2, "expected config validation failure code");

        let payload = parse_payload(&result.output);
        assert_eq!(payload["command"], "search");
        assert_eq!(payload["status"], "error");
        assert_eq!(payload["error_class"], "config_validation");
    });
}

#[test]
fn config_attributes_env_sources_and_redacts_secrets() {
    with_env(
        &[("FLIGHTDESK_SERVER_PORT", "9090"), ("FLIGHTDESK_SECRET_SERPAPI_KEY", "very-secret")],
        || {
            let output = config::run();

            assert!(output.contains("- server.port = 9090 (source: env (FLIGHTDESK_SERVER_PORT))"));
            assert!(output.contains("- search.engine = google_flights (source: default)"));
            assert!(output.contains(
                "- SERPAPI_KEY = <redacted> (source: env (FLIGHTDESK_SECRET_SERPAPI_KEY))"
            ));
            assert!(!output.contains("very-secret"));
        },
    );
}

#[test]
fn config_attributes_file_sources() {
    with_env(&[], || {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("flightdesk.toml");
        fs::write(&path, "[mail]\nenabled = true\nsender_name = \"Trip Bot\"\n").expect("write");

        let loaded = AppConfig::load(LoadOptions {
            config_path: Some(path.clone()),
            require_file: true,
            ..LoadOptions::default()
        })
        .expect("config loads");
        let output = config::render(&loaded, Some(&path));

        let expected_source = format!("(source: file ({}))", path.display());
        assert!(output.contains(&format!("- mail.sender_name = Trip Bot {expected_source}")));
        assert!(output.contains("- email-credentials = <unset>"));
    });
}

#[test]
fn doctor_passes_when_search_key_is_available() {
    with_env(&[("FLIGHTDESK_SECRET_SERPAPI_KEY", "doctor-key")], || {
        let payload = parse_payload(&doctor::run(true));

        assert_eq!(payload["overall_status"], "pass");
        let checks = payload["checks"].as_array().expect("checks");
        assert_eq!(checks[1]["name"], "search_api_key");
        assert_eq!(checks[1]["status"], "pass");
        assert_eq!(checks[2]["status"], "skipped");
    });
}

#[test]
fn doctor_fails_without_search_key() {
    with_env(&[], || {
        let output = doctor::run(false);

        assert!(output.starts_with("doctor: one or more readiness checks failed"));
        assert!(output.contains("- [fail] search_api_key"));
    });
}

#[test]
fn doctor_checks_mail_credentials_when_enabled() {
    with_env(
        &[
            ("FLIGHTDESK_MAIL_ENABLED", "true"),
            ("FLIGHTDESK_SECRET_SERPAPI_KEY", "doctor-key"),
            ("FLIGHTDESK_SECRET_EMAIL_CREDENTIALS", "{\"email\": \"\", \"password\": \"x\"}"),
        ],
        || {
            let payload = parse_payload(&doctor::run(true));

            assert_eq!(payload["overall_status"], "fail");
            assert_eq!(payload["checks"][2]["name"], "mail_credentials");
            assert_eq!(payload["checks"][2]["status"], "fail");
        },
    );
}

fn parse_payload(output: &str) -> Value {
    serde_json::from_str(output).expect("command output should be valid JSON")
}

fn with_env(vars: &[(&str, &str)], test_fn: impl FnOnce()) {
    static ENV_LOCK: OnceLock<Mutex<()>> = OnceLock::new();
    let _guard =
        ENV_LOCK.get_or_init(|| Mutex::new(())).lock().expect("env mutex should not be poisoned");

    let previous_values: Vec<(String, String)> = env::vars()
        .filter(|(key, _)| key.starts_with("FLIGHTDESK_") || key == "PORT")
        .collect();

    for (key, _) in &previous_values {
        env::remove_var(key);
    }
    for (key, value) in vars {
        env::set_var(key, value);
    }

    test_fn();

    for (key, _) in vars {
        env::remove_var(key);
    }
    for (key, value) in previous_values {
        env::set_var(key, value);
    }
}
