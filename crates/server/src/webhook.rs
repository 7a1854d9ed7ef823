//! Conversational-agent fulfillment routes.
//!
//! - `POST /webhook` - fulfillment request in, `{"fulfillmentText"}` out, always HTTP 200
//! - `POST /v1/notifications/email` - emails results a client already holds

use std::sync::Arc;

use axum::{body::Bytes, extract::State, http::StatusCode, routing::post, Json, Router};
use flightdesk_agent::{FlightDetails, FulfillmentRequest, FulfillmentRuntime};
use flightdesk_core::{ApplicationError, InterfaceError, GENERIC_APOLOGY};
use serde::{Deserialize, Serialize};
use tracing::{error, info, warn};
use uuid::Uuid;

#[derive(Clone)]
pub struct WebhookState {
    runtime: Arc<FulfillmentRuntime>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WebhookResponse {
    pub fulfillment_text: String,
}

#[derive(Debug, Deserialize)]
pub struct EmailRequest {
    pub recipient: String,
    pub text: String,
    #[serde(default)]
    pub booking_url: String,
}

#[derive(Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct EmailResponse {
    pub status: String,
    pub detail: String,
}

#[derive(Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: String,
    pub correlation_id: String,
}

pub fn router(runtime: Arc<FulfillmentRuntime>) -> Router {
    Router::new()
        .route("/webhook", post(fulfill))
        .route("/v1/notifications/email", post(send_email))
        .with_state(WebhookState { runtime })
}

fn new_correlation_id() -> String {
    Uuid::new_v4().simple().to_string()
}

/// Takes the raw body so a malformed payload still gets a reply instead of axum's
/// extractor rejection.
pub async fn fulfill(State(state): State<WebhookState>, body: Bytes) -> Json<WebhookResponse> {
    let correlation_id = new_correlation_id();
    let apology = || Json(WebhookResponse { fulfillment_text: GENERIC_APOLOGY.to_string() });

    let request = match FulfillmentRequest::from_slice(&body) {
        Ok(request) => request,
        Err(error) => {
            warn!(
                event_name = "webhook.request.malformed",
                correlation_id = %correlation_id,
                error = %error,
                "fulfillment request could not be parsed"
            );
            return apology();
        }
    };

    let intent = request.intent();
    info!(
        event_name = "webhook.request.received",
        correlation_id = %correlation_id,
        trip_type = intent.trip_type.as_str(),
        departure_city = %intent.departure_city,
        destination_city = %intent.destination_city,
        "fulfillment request received"
    );

    // A panic anywhere in the pipeline surfaces as a JoinError on this task.
    let runtime = state.runtime.clone();
    let task_correlation_id = correlation_id.clone();
    let task = tokio::spawn(async move { runtime.handle(&intent, &task_correlation_id).await });

    match task.await {
        Ok(fulfillment) => {
            info!(
                event_name = "webhook.response.sent",
                correlation_id = %correlation_id,
                outcome = fulfillment.kind.as_str(),
                "fulfillment response sent"
            );
            Json(WebhookResponse { fulfillment_text: fulfillment.text })
        }
        Err(join_error) => {
            error!(
                event_name = "webhook.pipeline.aborted",
                correlation_id = %correlation_id,
                error = %join_error,
                "fulfillment pipeline terminated unexpectedly"
            );
            apology()
        }
    }
}

/// Raw body for the same reason as [`fulfill`]: a malformed payload is answered with
/// [`ErrorResponse`] like every other failure on this route.
pub async fn send_email(
    State(state): State<WebhookState>,
    body: Bytes,
) -> Result<Json<EmailResponse>, (StatusCode, Json<ErrorResponse>)> {
    let correlation_id = new_correlation_id();
    let request: EmailRequest = serde_json::from_slice(&body).map_err(|error| {
        interface_failure(
            ApplicationError::InvalidInput(format!("email request body: {error}")),
            correlation_id.clone(),
        )
    })?;
    let details = FlightDetails { text: request.text, booking_url: request.booking_url };

    match state.runtime.send_results(&request.recipient, &details, &correlation_id).await {
        Ok(()) => Ok(Json(EmailResponse {
            status: "sent".to_string(),
            detail: format!("Flight results emailed to {}.", request.recipient.trim()),
        })),
        Err(error) => Err(interface_failure(error, correlation_id)),
    }
}

fn interface_failure(
    error: ApplicationError,
    correlation_id: String,
) -> (StatusCode, Json<ErrorResponse>) {
    warn!(
        event_name = "webhook.notification.failed",
        correlation_id = %correlation_id,
        error = %error,
        "results email request failed"
    );

    let interface = error.into_interface(correlation_id);
    let status = match interface {
        InterfaceError::BadRequest { .. } => StatusCode::BAD_REQUEST,
        InterfaceError::ServiceUnavailable { .. } => StatusCode::SERVICE_UNAVAILABLE,
        InterfaceError::Internal { .. } => StatusCode::INTERNAL_SERVER_ERROR,
    };

    (
        status,
        Json(ErrorResponse {
            error: interface.user_message().to_string(),
            correlation_id: interface.correlation_id().to_string(),
        }),
    )
}
