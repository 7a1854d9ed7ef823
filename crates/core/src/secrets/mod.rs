//! Credential retrieval.
//!
//! Components receive an `Arc<dyn SecretProvider>` at construction instead of reading a
//! process-wide global. [`CachedSecretProvider`] adds an explicit expiry so rotated secrets
//! are picked up without a restart.

mod gcp;

use std::collections::HashMap;
use std::env;
use std::sync::Arc;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;
use thiserror::Error;
use tokio::sync::RwLock;
use tracing::debug;

use crate::config::{SecretBackend, SecretsConfig};

pub use gcp::GcpSecretManagerProvider;

pub const ENV_SECRET_PREFIX: &str = "FLIGHTDESK_SECRET_";

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum SecretError {
    #[error("secret `{name}` was not found")]
    NotFound { name: String },
    #[error("secret `{name}` could not be retrieved: {reason}")]
    Retrieval { name: String, reason: String },
    #[error("secret `{name}` is malformed: {reason}")]
    Malformed { name: String, reason: String },
    #[error("secret backend misconfigured: {0}")]
    Configuration(String),
}

#[async_trait]
pub trait SecretProvider: Send + Sync {
    fn backend_name(&self) -> &'static str;
    async fn fetch(&self, name: &str) -> Result<SecretString, SecretError>;
}

/// Reads `FLIGHTDESK_SECRET_<NAME>`, with the name upper-cased and every
/// non-alphanumeric character replaced by `_`.
#[derive(Clone, Debug, Default)]
pub struct EnvSecretProvider;

impl EnvSecretProvider {
    pub fn env_key(name: &str) -> String {
        let normalized: String = name
            .chars()
            .map(|ch| if ch.is_ascii_alphanumeric() { ch.to_ascii_uppercase() } else { '_' })
            .collect();
        format!("{ENV_SECRET_PREFIX}{normalized}")
    }
}

#[async_trait]
impl SecretProvider for EnvSecretProvider {
    fn backend_name(&self) -> &'static str {
        "env"
    }

    async fn fetch(&self, name: &str) -> Result<SecretString, SecretError> {
        env::var(Self::env_key(name))
            .ok()
            .filter(|value| !value.trim().is_empty())
            .map(SecretString::from)
            .ok_or_else(|| SecretError::NotFound { name: name.to_string() })
    }
}

#[derive(Clone, Debug, Default)]
pub struct InMemorySecretProvider {
    values: HashMap<String, String>,
}

impl InMemorySecretProvider {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_secret(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.values.insert(name.into(), value.into());
        self
    }
}

#[async_trait]
impl SecretProvider for InMemorySecretProvider {
    fn backend_name(&self) -> &'static str {
        "memory"
    }

    async fn fetch(&self, name: &str) -> Result<SecretString, SecretError> {
        self.values
            .get(name)
            .cloned()
            .map(SecretString::from)
            .ok_or_else(|| SecretError::NotFound { name: name.to_string() })
    }
}

struct CachedSecret {
    value: SecretString,
    fetched_at: Instant,
}

/// Keeps each secret for `ttl` after it was fetched. A zero `ttl` disables caching.
pub struct CachedSecretProvider {
    inner: Arc<dyn SecretProvider>,
    ttl: Duration,
    entries: RwLock<HashMap<String, CachedSecret>>,
}

impl CachedSecretProvider {
    pub fn new(inner: Arc<dyn SecretProvider>, ttl: Duration) -> Self {
        Self { inner, ttl, entries: RwLock::new(HashMap::new()) }
    }

    pub async fn invalidate(&self, name: &str) {
        self.entries.write().await.remove(name);
    }

    async fn cached(&self, name: &str) -> Option<SecretString> {
        let entries = self.entries.read().await;
        entries
            .get(name)
            .filter(|entry| entry.fetched_at.elapsed() < self.ttl)
            .map(|entry| entry.value.clone())
    }
}

#[async_trait]
impl SecretProvider for CachedSecretProvider {
    fn backend_name(&self) -> &'static str {
        self.inner.backend_name()
    }

    async fn fetch(&self, name: &str) -> Result<SecretString, SecretError> {
        if self.ttl.is_zero() {
            return self.inner.fetch(name).await;
        }

        if let Some(value) = self.cached(name).await {
            return Ok(value);
        }

        let value = self.inner.fetch(name).await?;
        debug!(
            event_name = "secrets.cache.refreshed",
            backend = self.inner.backend_name(),
            secret_name = name,
            "secret fetched from backend"
        );
        let entry = CachedSecret { value: value.clone(), fetched_at: Instant::now() };
        self.entries.write().await.insert(name.to_string(), entry);
        Ok(value)
    }
}

/// Builds the configured backend wrapped in the refresh cache.
pub fn provider_from_config(
    config: &SecretsConfig,
) -> Result<Arc<dyn SecretProvider>, SecretError> {
    let backend: Arc<dyn SecretProvider> = match config.backend {
        SecretBackend::Env => Arc::new(EnvSecretProvider),
        SecretBackend::Gcp => {
            let project = config.gcp_project.clone().ok_or_else(|| {
                SecretError::Configuration("secrets.gcp_project is required".to_string())
            })?;
            Arc::new(GcpSecretManagerProvider::new(project, config.gcp_metadata_url.clone()))
        }
    };

    Ok(Arc::new(CachedSecretProvider::new(backend, Duration::from_secs(config.refresh_secs))))
}

/// Login for the mail relay, stored as a `{"email": ..., "password": ...}` secret.
#[derive(Clone, Debug)]
pub struct MailCredentials {
    pub email: String,
    pub password: SecretString,
}

#[derive(Deserialize)]
struct RawMailCredentials {
    email: String,
    password: String,
}

impl MailCredentials {
    pub fn from_secret(name: &str, secret: &SecretString) -> Result<Self, SecretError> {
        let raw: RawMailCredentials = serde_json::from_str(secret.expose_secret())
            .map_err(|error| SecretError::Malformed {
                name: name.to_string(),
                reason: format!("expected {{email, password}} JSON: {error}"),
            })?;

        if raw.email.trim().is_empty() || raw.password.is_empty() {
            return Err(SecretError::Malformed {
                name: name.to_string(),
                reason: "email and password must be non-empty".to_string(),
            });
        }

        Ok(Self { email: raw.email.trim().to_string(), password: raw.password.into() })
    }
}
