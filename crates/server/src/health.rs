use std::sync::Arc;

use axum::{extract::State, http::StatusCode, routing::get, Json, Router};
use chrono::Utc;
use flightdesk_core::{MailCredentials, SecretProvider};
use serde::Serialize;

#[derive(Clone)]
pub struct HealthState {
    secrets: Arc<dyn SecretProvider>,
    search_api_key_secret: String,
    mail_credentials_secret: Option<String>,
}

impl HealthState {
    pub fn new(
        secrets: Arc<dyn SecretProvider>,
        search_api_key_secret: impl Into<String>,
        mail_credentials_secret: Option<String>,
    ) -> Self {
        Self {
            secrets,
            search_api_key_secret: search_api_key_secret.into(),
            mail_credentials_secret,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct HealthCheck {
    pub status: &'static str,
    pub detail: String,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub service: HealthCheck,
    pub search_api_key: HealthCheck,
    pub mail: HealthCheck,
    pub checked_at: String,
}

pub fn router(state: HealthState) -> Router {
    Router::new().route("/health", get(health)).with_state(state)
}

pub async fn health(State(state): State<HealthState>) -> (StatusCode, Json<HealthResponse>) {
    let search_api_key = search_key_check(&state).await;
    let mail = mail_check(&state).await;
    let ready = search_api_key.status == "ready" && mail.status != "degraded";

    let payload = HealthResponse {
        status: if ready { "ready" } else { "degraded" },
        service: HealthCheck {
            status: "ready",
            detail: "flightdesk-server runtime initialized".to_string(),
        },
        search_api_key,
        mail,
        checked_at: Utc::now().to_rfc3339(),
    };

    let status_code = if ready { StatusCode::OK } else { StatusCode::SERVICE_UNAVAILABLE };
    (status_code, Json(payload))
}

async fn search_key_check(state: &HealthState) -> HealthCheck {
    match state.secrets.fetch(&state.search_api_key_secret).await {
        Ok(_) => HealthCheck {
            status: "ready",
            detail: format!("{} secret backend returned the key", state.secrets.backend_name()),
        },
        Err(error) => HealthCheck { status: "degraded", detail: error.to_string() },
    }
}

async fn mail_check(state: &HealthState) -> HealthCheck {
    let Some(name) = state.mail_credentials_secret.as_deref() else {
        return HealthCheck { status: "disabled", detail: "mail delivery is disabled".to_string() };
    };

    let credentials = match state.secrets.fetch(name).await {
        Ok(secret) => MailCredentials::from_secret(name, &secret),
        Err(error) => Err(error),
    };
    match credentials {
        Ok(_) => HealthCheck {
            status: "ready",
            detail: format!("credentials `{name}` loaded"),
        },
        Err(error) => HealthCheck { status: "degraded", detail: error.to_string() },
    }
}
