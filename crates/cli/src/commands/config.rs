use std::env;
use std::fs;
use std::path::Path;

use flightdesk_core::config::{resolve_config_path, AppConfig, LoadOptions, SecretBackend};
use flightdesk_core::secrets::EnvSecretProvider;
use toml::Value;

pub fn run() -> String {
    let config = match AppConfig::load(LoadOptions::default()) {
        Ok(config) => config,
        Err(error) => return format!("config validation failed: {error}"),
    };

    render(&config, resolve_config_path(None).as_deref())
}

pub fn render(config: &AppConfig, config_file_path: Option<&Path>) -> String {
    let config_file_doc = load_config_file_doc(config_file_path);
    let source = |key_path: &str, env_keys: &[&str]| {
        field_source(key_path, env_keys, config_file_doc.as_ref(), config_file_path)
    };

    let server = &config.server;
    let search = &config.search;
    let mail = &config.mail;
    let secrets = &config.secrets;
    let entries = vec![
        entry("server.bind_address", &server.bind_address, &["FLIGHTDESK_SERVER_BIND_ADDRESS"]),
        entry("server.port", server.port, &["FLIGHTDESK_SERVER_PORT", "PORT"]),
        entry("search.base_url", &search.base_url, &["FLIGHTDESK_SEARCH_BASE_URL"]),
        entry("search.engine", &search.engine, &["FLIGHTDESK_SEARCH_ENGINE"]),
        entry("search.timeout_secs", search.timeout_secs, &["FLIGHTDESK_SEARCH_TIMEOUT_SECS"]),
        entry(
            "search.api_key_secret",
            &search.api_key_secret,
            &["FLIGHTDESK_SEARCH_API_KEY_SECRET"],
        ),
        entry("mail.enabled", mail.enabled, &["FLIGHTDESK_MAIL_ENABLED"]),
        entry("mail.smtp_host", &mail.smtp_host, &["FLIGHTDESK_MAIL_SMTP_HOST"]),
        entry("mail.smtp_port", mail.smtp_port, &["FLIGHTDESK_MAIL_SMTP_PORT"]),
        entry("mail.sender_name", &mail.sender_name, &["FLIGHTDESK_MAIL_SENDER_NAME"]),
        entry(
            "mail.credentials_secret",
            &mail.credentials_secret,
            &["FLIGHTDESK_MAIL_CREDENTIALS_SECRET"],
        ),
        entry("mail.timeout_secs", mail.timeout_secs, &["FLIGHTDESK_MAIL_TIMEOUT_SECS"]),
        entry("secrets.backend", backend_name(secrets.backend), &["FLIGHTDESK_SECRETS_BACKEND"]),
        entry(
            "secrets.gcp_project",
            secrets.gcp_project.as_deref().unwrap_or("<unset>"),
            &["FLIGHTDESK_SECRETS_GCP_PROJECT"],
        ),
        entry("secrets.refresh_secs", secrets.refresh_secs, &["FLIGHTDESK_SECRETS_REFRESH_SECS"]),
        entry(
            "logging.level",
            &config.logging.level,
            &["FLIGHTDESK_LOGGING_LEVEL", "FLIGHTDESK_LOG_LEVEL"],
        ),
        entry(
            "logging.format",
            format!("{:?}", config.logging.format),
            &["FLIGHTDESK_LOGGING_FORMAT", "FLIGHTDESK_LOG_FORMAT"],
        ),
    ];

    let mut lines = vec!["effective config (source precedence: env > file > default):".to_string()];
    lines.extend(
        entries
            .into_iter()
            .map(|(key, value, env_keys)| render_line(key, &value, source(key, env_keys))),
    );

    lines.push("secret values:".to_string());
    lines.push(secret_line(config, &config.search.api_key_secret));
    if config.mail.enabled {
        lines.push(secret_line(config, &config.mail.credentials_secret));
    }

    lines.join("\n")
}

type Entry = (&'static str, String, &'static [&'static str]);

fn entry(
    key: &'static str,
    value: impl std::fmt::Display,
    env_keys: &'static [&'static str],
) -> Entry {
    (key, value.to_string(), env_keys)
}

fn backend_name(backend: SecretBackend) -> &'static str {
    match backend {
        SecretBackend::Env => "env",
        SecretBackend::Gcp => "gcp",
    }
}

fn load_config_file_doc(path: Option<&Path>) -> Option<Value> {
    let path = path?;
    let raw = fs::read_to_string(path).ok()?;
    raw.parse::<Value>().ok()
}

fn field_source(
    key_path: &str,
    env_keys: &[&str],
    config_file_doc: Option<&Value>,
    config_file_path: Option<&Path>,
) -> String {
    if let Some(env_key) = env_keys.iter().find(|key| env::var_os(key).is_some()) {
        return format!("env ({env_key})");
    }

    if let Some(doc) = config_file_doc {
        if contains_path(doc, key_path) {
            let file_path = config_file_path
                .map(|path| path.display().to_string())
                .unwrap_or_else(|| "config file".to_string());
            return format!("file ({file_path})");
        }
    }

    "default".to_string()
}

fn contains_path(root: &Value, key_path: &str) -> bool {
    let mut current = root;
    for key in key_path.split('.') {
        let Some(next) = current.get(key) else {
            return false;
        };
        current = next;
    }
    true
}

fn render_line(key: &str, value: &str, source: String) -> String {
    format!("- {key} = {value} (source: {source})")
}

/// Secret values are never printed; only where they would come from.
fn secret_line(config: &AppConfig, name: &str) -> String {
    match config.secrets.backend {
        SecretBackend::Env => {
            let env_key = EnvSecretProvider::env_key(name);
            let state = if env::var_os(&env_key).is_some() { "<redacted>" } else { "<unset>" };
            format!("- {name} = {state} (source: env ({env_key}))")
        }
        SecretBackend::Gcp => {
            let project = config.secrets.gcp_project.as_deref().unwrap_or("<unset>");
            format!("- {name} = <redacted> (source: gcp secret manager ({project}))")
        }
    }
}
