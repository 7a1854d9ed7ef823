use std::sync::Arc;

use axum::Router;
use flightdesk_agent::{FulfillmentRuntime, Notifier, SerpApiClient, SmtpNotifier};
use flightdesk_core::config::{AppConfig, ConfigError, LoadOptions};
use flightdesk_core::secrets::provider_from_config;
use flightdesk_core::{ApplicationError, SearchError, SecretError};
use thiserror::Error;
use tower_http::trace::TraceLayer;
use tracing::info;

use crate::{health, webhook};

pub struct Application {
    pub config: AppConfig,
    pub router: Router,
}

#[derive(Debug, Error)]
pub enum BootstrapError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error("secret backend setup failed: {0}")]
    Secrets(#[from] SecretError),
    #[error("search client setup failed: {0}")]
    Search(#[from] SearchError),
    #[error("mail notifier setup failed: {0}")]
    Mail(#[from] ApplicationError),
}

pub fn bootstrap(options: LoadOptions) -> Result<Application, BootstrapError> {
    let config = AppConfig::load(options)?;
    bootstrap_with_config(config)
}

pub fn bootstrap_with_config(config: AppConfig) -> Result<Application, BootstrapError> {
    info!(
        event_name = "system.bootstrap.start",
        correlation_id = "bootstrap",
        "starting application bootstrap"
    );

    let secrets = provider_from_config(&config.secrets)?;
    info!(
        event_name = "system.bootstrap.secrets_ready",
        correlation_id = "bootstrap",
        backend = secrets.backend_name(),
        refresh_secs = config.secrets.refresh_secs,
        "secret provider configured"
    );

    let search = Arc::new(SerpApiClient::new(&config.search, secrets.clone())?);
    let notifier: Option<Arc<dyn Notifier>> = if config.mail.enabled {
        Some(Arc::new(SmtpNotifier::new(&config.mail, secrets.clone())?))
    } else {
        None
    };
    info!(
        event_name = "system.bootstrap.runtime_ready",
        correlation_id = "bootstrap",
        search_engine = %config.search.engine,
        mail_enabled = notifier.is_some(),
        "fulfillment runtime assembled"
    );

    let runtime = Arc::new(FulfillmentRuntime::new(search, notifier));
    let health_state = health::HealthState::new(
        secrets,
        config.search.api_key_secret.clone(),
        config.mail.enabled.then(|| config.mail.credentials_secret.clone()),
    );

    let router = webhook::router(runtime)
        .merge(health::router(health_state))
        .layer(TraceLayer::new_for_http());

    Ok(Application { config, router })
}
