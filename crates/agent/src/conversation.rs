//! Reads the conversational agent's fulfillment request into a [`FlightIntent`].
//!
//! Slot values are read leniently: the agent platform sends empty strings for unset
//! parameters, and some system entities arrive as objects rather than plain strings.

use std::str::FromStr;

use flightdesk_core::{ApplicationError, TripType};
use rust_decimal::prelude::FromPrimitive;
use rust_decimal::Decimal;
use serde::Deserialize;
use serde_json::Value;

#[derive(Clone, Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FulfillmentRequest {
    #[serde(default)]
    pub response_id: Option<String>,
    #[serde(default)]
    pub session: Option<String>,
    #[serde(default)]
    pub query_result: QueryResult,
}

#[derive(Clone, Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QueryResult {
    #[serde(default)]
    pub query_text: Option<String>,
    #[serde(default)]
    pub parameters: Value,
}

impl FulfillmentRequest {
    pub fn from_slice(body: &[u8]) -> Result<Self, ApplicationError> {
        serde_json::from_slice(body).map_err(|error| {
            ApplicationError::InvalidInput(format!("fulfillment request is not valid JSON: {error}"))
        })
    }

    pub fn intent(&self) -> FlightIntent {
        FlightIntent::from_parameters(&self.query_result.parameters)
    }
}

/// Everything the pipeline needs from one request, before any lookup or validation.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct FlightIntent {
    pub trip_type: TripType,
    pub departure_city: String,
    pub destination_city: String,
    pub outbound_date: String,
    pub return_date: String,
    pub budget: Option<Decimal>,
    pub notify_email: Option<String>,
}

impl FlightIntent {
    pub fn from_parameters(parameters: &Value) -> Self {
        let slot = |name: &str| parameters.get(name);

        Self {
            trip_type: TripType::from_slot(&text_slot(slot("flight_type"))),
            departure_city: text_slot(slot("departure_city")),
            destination_city: text_slot(slot("destination_city")),
            outbound_date: date_slot(slot("outbound_date")),
            return_date: date_slot(slot("return_date")),
            budget: budget_slot(slot("budget")),
            notify_email: Some(text_slot(slot("email"))).filter(|email| !email.is_empty()),
        }
    }
}

fn text_slot(value: Option<&Value>) -> String {
    match value {
        Some(Value::String(text)) => text.trim().to_string(),
        Some(Value::Number(number)) => number.to_string(),
        _ => String::new(),
    }
}

/// `sys.date` arrives as a string; date-time and period entities arrive as objects.
fn date_slot(value: Option<&Value>) -> String {
    match value {
        Some(Value::Object(fields)) => ["date_time", "startDateTime", "startDate"]
            .iter()
            .find_map(|key| fields.get(*key).and_then(Value::as_str))
            .map(|text| text.trim().to_string())
            .unwrap_or_default(),
        other => text_slot(other),
    }
}

/// `sys.unit-currency` arrives as `{"amount": 800, "currency": "USD"}`; a bare number is
/// accepted too. Anything else means no budget.
fn budget_slot(value: Option<&Value>) -> Option<Decimal> {
    let amount = match value {
        Some(Value::Object(fields)) => fields.get("amount"),
        other => other,
    };

    match amount {
        Some(Value::Number(number)) => number
            .as_i64()
            .map(Decimal::from)
            .or_else(|| number.as_f64().and_then(Decimal::from_f64)),
        Some(Value::String(text)) => Decimal::from_str(text.trim()).ok(),
        _ => None,
    }
}
