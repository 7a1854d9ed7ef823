use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;

pub const DEFAULT_CONFIG_FILE: &str = "flightdesk.toml";
pub const NESTED_CONFIG_FILE: &str = "config/flightdesk.toml";

#[derive(Clone, Debug)]
pub struct AppConfig {
    pub server: ServerConfig,
    pub search: SearchConfig,
    pub mail: MailConfig,
    pub secrets: SecretsConfig,
    pub logging: LoggingConfig,
}

#[derive(Clone, Debug)]
pub struct ServerConfig {
    pub bind_address: String,
    pub port: u16,
}

#[derive(Clone, Debug)]
pub struct SearchConfig {
    pub base_url: String,
    pub engine: String,
    pub timeout_secs: u64,
    pub api_key_secret: String,
}

#[derive(Clone, Debug)]
pub struct MailConfig {
    pub enabled: bool,
    pub smtp_host: String,
    pub smtp_port: u16,
    pub sender_name: String,
    pub credentials_secret: String,
    pub timeout_secs: u64,
}

#[derive(Clone, Debug)]
pub struct SecretsConfig {
    pub backend: SecretBackend,
    pub gcp_project: Option<String>,
    pub gcp_metadata_url: String,
    pub refresh_secs: u64,
}

#[derive(Clone, Debug)]
pub struct LoggingConfig {
    pub level: String,
    pub format: LogFormat,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SecretBackend {
    Env,
    Gcp,
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
    pub bind_address: Option<String>,
    pub port: Option<u16>,
    pub log_level: Option<String>,
    pub search_base_url: Option<String>,
    pub mail_enabled: Option<bool>,
    pub secrets_backend: Option<SecretBackend>,
    pub secrets_refresh_secs: Option<u64>,
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
            server: ServerConfig { bind_address: "127.0.0.1".to_string(), port: 8080 },
            search: SearchConfig {
                base_url: "https://serpapi.com/search".to_string(),
                engine: "google_flights".to_string(),
                timeout_secs: 30,
                api_key_secret: "SERPAPI_KEY".to_string(),
            },
            mail: MailConfig {
                enabled: false,
                smtp_host: "smtp.gmail.com".to_string(),
                smtp_port: 587,
                sender_name: "AI Travel Assistant".to_string(),
                credentials_secret: "email-credentials".to_string(),
                timeout_secs: 30,
            },
            secrets: SecretsConfig {
                backend: SecretBackend::Env,
                gcp_project: None,
                gcp_metadata_url: "http://metadata.google.internal/computeMetadata/v1"
                    .to_string(),
                refresh_secs: 300,
            },
            logging: LoggingConfig { level: "info".to_string(), format: LogFormat::Compact },
        }
    }
}

impl std::str::FromStr for SecretBackend {
    type Err = ConfigError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "env" => Ok(Self::Env),
            "gcp" => Ok(Self::Gcp),
            other => Err(ConfigError::Validation(format!(
                "unsupported secrets backend `{other}` (expected env|gcp)"
            ))),
        }
    }
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
            let expected =
                options.config_path.unwrap_or_else(|| PathBuf::from(DEFAULT_CONFIG_FILE));
            return Err(ConfigError::MissingConfigFile(expected));
        }

        config.apply_env_overrides()?;
        config.apply_overrides(options.overrides);
        config.validate()?;

        Ok(config)
    }

    fn apply_patch(&mut self, patch: ConfigPatch) {
        if let Some(server) = patch.server {
            if let Some(bind_address) = server.bind_address {
                self.server.bind_address = bind_address;
            }
            if let Some(port) = server.port {
                self.server.port = port;
            }
        }

        if let Some(search) = patch.search {
            if let Some(base_url) = search.base_url {
                self.search.base_url = base_url;
            }
            if let Some(engine) = search.engine {
                self.search.engine = engine;
            }
            if let Some(timeout_secs) = search.timeout_secs {
                self.search.timeout_secs = timeout_secs;
            }
            if let Some(api_key_secret) = search.api_key_secret {
                self.search.api_key_secret = api_key_secret;
            }
        }

        if let Some(mail) = patch.mail {
            if let Some(enabled) = mail.enabled {
                self.mail.enabled = enabled;
            }
            if let Some(smtp_host) = mail.smtp_host {
                self.mail.smtp_host = smtp_host;
            }
            if let Some(smtp_port) = mail.smtp_port {
                self.mail.smtp_port = smtp_port;
            }
            if let Some(sender_name) = mail.sender_name {
                self.mail.sender_name = sender_name;
            }
            if let Some(credentials_secret) = mail.credentials_secret {
                self.mail.credentials_secret = credentials_secret;
            }
            if let Some(timeout_secs) = mail.timeout_secs {
                self.mail.timeout_secs = timeout_secs;
            }
        }

        if let Some(secrets) = patch.secrets {
            if let Some(backend) = secrets.backend {
                self.secrets.backend = backend;
            }
            if let Some(gcp_project) = secrets.gcp_project {
                self.secrets.gcp_project = Some(gcp_project);
            }
            if let Some(gcp_metadata_url) = secrets.gcp_metadata_url {
                self.secrets.gcp_metadata_url = gcp_metadata_url;
            }
            if let Some(refresh_secs) = secrets.refresh_secs {
                self.secrets.refresh_secs = refresh_secs;
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
        if let Some(value) = read_env("FLIGHTDESK_SERVER_BIND_ADDRESS") {
            self.server.bind_address = value;
        }
        // Cloud Run and similar hosts inject the listening port as `PORT`.
        let port = read_env("FLIGHTDESK_SERVER_PORT")
            .map(|value| ("FLIGHTDESK_SERVER_PORT", value))
            .or_else(|| read_env("PORT").map(|value| ("PORT", value)));
        if let Some((key, value)) = port {
            self.server.port = parse_u16(key, &value)?;
        }

        if let Some(value) = read_env("FLIGHTDESK_SEARCH_BASE_URL") {
            self.search.base_url = value;
        }
        if let Some(value) = read_env("FLIGHTDESK_SEARCH_ENGINE") {
            self.search.engine = value;
        }
        if let Some(value) = read_env("FLIGHTDESK_SEARCH_TIMEOUT_SECS") {
            self.search.timeout_secs = parse_u64("FLIGHTDESK_SEARCH_TIMEOUT_SECS", &value)?;
        }
        if let Some(value) = read_env("FLIGHTDESK_SEARCH_API_KEY_SECRET") {
            self.search.api_key_secret = value;
        }

        if let Some(value) = read_env("FLIGHTDESK_MAIL_ENABLED") {
            self.mail.enabled = parse_bool("FLIGHTDESK_MAIL_ENABLED", &value)?;
        }
        if let Some(value) = read_env("FLIGHTDESK_MAIL_SMTP_HOST") {
            self.mail.smtp_host = value;
        }
        if let Some(value) = read_env("FLIGHTDESK_MAIL_SMTP_PORT") {
            self.mail.smtp_port = parse_u16("FLIGHTDESK_MAIL_SMTP_PORT", &value)?;
        }
        if let Some(value) = read_env("FLIGHTDESK_MAIL_SENDER_NAME") {
            self.mail.sender_name = value;
        }
        if let Some(value) = read_env("FLIGHTDESK_MAIL_CREDENTIALS_SECRET") {
            self.mail.credentials_secret = value;
        }
        if let Some(value) = read_env("FLIGHTDESK_MAIL_TIMEOUT_SECS") {
            self.mail.timeout_secs = parse_u64("FLIGHTDESK_MAIL_TIMEOUT_SECS", &value)?;
        }

        if let Some(value) = read_env("FLIGHTDESK_SECRETS_BACKEND") {
            self.secrets.backend = value.parse()?;
        }
        if let Some(value) = read_env("FLIGHTDESK_SECRETS_GCP_PROJECT") {
            self.secrets.gcp_project = Some(value);
        }
        if let Some(value) = read_env("FLIGHTDESK_SECRETS_GCP_METADATA_URL") {
            self.secrets.gcp_metadata_url = value;
        }
        if let Some(value) = read_env("FLIGHTDESK_SECRETS_REFRESH_SECS") {
            self.secrets.refresh_secs = parse_u64("FLIGHTDESK_SECRETS_REFRESH_SECS", &value)?;
        }

        let log_level =
            read_env("FLIGHTDESK_LOGGING_LEVEL").or_else(|| read_env("FLIGHTDESK_LOG_LEVEL"));
        if let Some(value) = log_level {
            self.logging.level = value;
        }
        let log_format =
            read_env("FLIGHTDESK_LOGGING_FORMAT").or_else(|| read_env("FLIGHTDESK_LOG_FORMAT"));
        if let Some(value) = log_format {
            self.logging.format = value.parse()?;
        }

        Ok(())
    }

    fn apply_overrides(&mut self, overrides: ConfigOverrides) {
        if let Some(bind_address) = overrides.bind_address {
            self.server.bind_address = bind_address;
        }
        if let Some(port) = overrides.port {
            self.server.port = port;
        }
        if let Some(log_level) = overrides.log_level {
            self.logging.level = log_level;
        }
        if let Some(search_base_url) = overrides.search_base_url {
            self.search.base_url = search_base_url;
        }
        if let Some(mail_enabled) = overrides.mail_enabled {
            self.mail.enabled = mail_enabled;
        }
        if let Some(secrets_backend) = overrides.secrets_backend {
            self.secrets.backend = secrets_backend;
        }
        if let Some(refresh_secs) = overrides.secrets_refresh_secs {
            self.secrets.refresh_secs = refresh_secs;
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        validate_server(&self.server)?;
        validate_search(&self.search)?;
        validate_mail(&self.mail)?;
        validate_secrets(&self.secrets)?;
        validate_logging(&self.logging)?;
        Ok(())
    }
}

/// Path of the config file `load` would read, if any.
pub fn resolve_config_path(explicit_path: Option<&Path>) -> Option<PathBuf> {
    if let Some(path) = explicit_path {
        return path.exists().then_some(path.to_path_buf());
    }

    [PathBuf::from(DEFAULT_CONFIG_FILE), PathBuf::from(NESTED_CONFIG_FILE)]
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

fn validate_server(server: &ServerConfig) -> Result<(), ConfigError> {
    if server.bind_address.trim().is_empty() {
        return Err(ConfigError::Validation("server.bind_address must not be empty".to_string()));
    }

    if server.port == 0 {
        return Err(ConfigError::Validation(
            "server.port must be greater than zero".to_string(),
        ));
    }

    Ok(())
}

fn validate_search(search: &SearchConfig) -> Result<(), ConfigError> {
    if !search.base_url.starts_with("http://") && !search.base_url.starts_with("https://") {
        return Err(ConfigError::Validation(
            "search.base_url must start with http:// or https://".to_string(),
        ));
    }

    if search.engine.trim().is_empty() {
        return Err(ConfigError::Validation("search.engine must not be empty".to_string()));
    }

    if search.timeout_secs == 0 || search.timeout_secs > 300 {
        return Err(ConfigError::Validation(
            "search.timeout_secs must be in range 1..=300".to_string(),
        ));
    }

    if search.api_key_secret.trim().is_empty() {
        return Err(ConfigError::Validation(
            "search.api_key_secret must name the secret holding the search API key".to_string(),
        ));
    }

    Ok(())
}

fn validate_mail(mail: &MailConfig) -> Result<(), ConfigError> {
    if !mail.enabled {
        return Ok(());
    }

    if mail.smtp_host.trim().is_empty() {
        return Err(ConfigError::Validation(
            "mail.smtp_host is required when mail.enabled is true".to_string(),
        ));
    }

    if mail.smtp_port == 0 {
        return Err(ConfigError::Validation(
            "mail.smtp_port must be greater than zero".to_string(),
        ));
    }

    if mail.credentials_secret.trim().is_empty() {
        return Err(ConfigError::Validation(
            "mail.credentials_secret must name the secret holding {email, password}".to_string(),
        ));
    }

    if mail.timeout_secs == 0 || mail.timeout_secs > 300 {
        return Err(ConfigError::Validation(
            "mail.timeout_secs must be in range 1..=300".to_string(),
        ));
    }

    Ok(())
}

fn validate_secrets(secrets: &SecretsConfig) -> Result<(), ConfigError> {
    if secrets.backend == SecretBackend::Gcp {
        let missing = secrets
            .gcp_project
            .as_ref()
            .map(|project| project.trim().is_empty())
            .unwrap_or(true);
        if missing {
            return Err(ConfigError::Validation(
                "secrets.gcp_project is required for the gcp secrets backend".to_string(),
            ));
        }

        let url = &secrets.gcp_metadata_url;
        if !url.starts_with("http://") && !url.starts_with("https://") {
            return Err(ConfigError::Validation(
                "secrets.gcp_metadata_url must start with http:// or https://".to_string(),
            ));
        }
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

#[derive(Debug, Default, Deserialize)]
struct ConfigPatch {
    server: Option<ServerPatch>,
    search: Option<SearchPatch>,
    mail: Option<MailPatch>,
    secrets: Option<SecretsPatch>,
    logging: Option<LoggingPatch>,
}

#[derive(Debug, Default, Deserialize)]
struct ServerPatch {
    bind_address: Option<String>,
    port: Option<u16>,
}

#[derive(Debug, Default, Deserialize)]
struct SearchPatch {
    base_url: Option<String>,
    engine: Option<String>,
    timeout_secs: Option<u64>,
    api_key_secret: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct MailPatch {
    enabled: Option<bool>,
    smtp_host: Option<String>,
    smtp_port: Option<u16>,
    sender_name: Option<String>,
    credentials_secret: Option<String>,
    timeout_secs: Option<u64>,
}

#[derive(Debug, Default, Deserialize)]
struct SecretsPatch {
    backend: Option<SecretBackend>,
    gcp_project: Option<String>,
    gcp_metadata_url: Option<String>,
    refresh_secs: Option<u64>,
}

#[derive(Debug, Default, Deserialize)]
struct LoggingPatch {
    level: Option<String>,
    format: Option<LogFormat>,
}
