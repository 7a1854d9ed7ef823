//! Flight search against the SerpApi `google_flights` engine.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use flightdesk_core::config::SearchConfig;
use flightdesk_core::{
    duration_from_provider_value, rank_options, FlightOption, FlightQuery, Price, SearchError,
    SearchResult,
};
use flightdesk_core::{SecretProvider, TripType};
use reqwest::Client;
use secrecy::{ExposeSecret, SecretString};
use serde_json::{Map, Value};
use tracing::{debug, warn};

#[async_trait]
pub trait FlightSearchClient: Send + Sync {
    /// Ranked options for the query. An empty list means the provider answered with
    /// an empty flight list, not that the search failed.
    async fn search(&self, query: &FlightQuery) -> SearchResult;
}

pub struct SerpApiClient {
    client: Client,
    base_url: String,
    engine: String,
    api_key_secret: String,
    secrets: Arc<dyn SecretProvider>,
}

impl SerpApiClient {
    pub fn new(
        config: &SearchConfig,
        secrets: Arc<dyn SecretProvider>,
    ) -> Result<Self, SearchError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|error| SearchError::Unexpected(format!("http client setup: {error}")))?;

        Ok(Self {
            client,
            base_url: config.base_url.clone(),
            engine: config.engine.clone(),
            api_key_secret: config.api_key_secret.clone(),
            secrets,
        })
    }

    async fn api_key(&self) -> Result<SecretString, SearchError> {
        self.secrets.fetch(&self.api_key_secret).await.map_err(|error| {
            warn!(
                event_name = "search.api_key.unavailable",
                backend = self.secrets.backend_name(),
                error = %error,
                "search api key could not be loaded"
            );
            SearchError::Unexpected(error.to_string())
        })
    }
}

#[async_trait]
impl FlightSearchClient for SerpApiClient {
    async fn search(&self, query: &FlightQuery) -> SearchResult {
        let api_key = self.api_key().await?;
        let params = query_params(&self.engine, query, &api_key);

        debug!(
            event_name = "search.request.sent",
            departure = %query.departure(),
            arrival = %query.arrival(),
            trip_type = query.trip_type().as_str(),
            "querying flight provider"
        );

        // The request URL carries the api key, so it is stripped from every transport error.
        let response = self
            .client
            .get(&self.base_url)
            .query(&params)
            .send()
            .await
            .and_then(|response| response.error_for_status())
            .map_err(|error| SearchError::Transport(error.without_url().to_string()))?;

        let body: Value = response.json().await.map_err(|error| {
            SearchError::Unexpected(format!("invalid provider response: {}", error.without_url()))
        })?;

        parse_search_response(&body)
    }
}

pub fn query_params(
    engine: &str,
    query: &FlightQuery,
    api_key: &SecretString,
) -> Vec<(&'static str, String)> {
    let mut params = vec![
        ("engine", engine.to_string()),
        ("departure_id", query.departure().to_string()),
        ("arrival_id", query.arrival().to_string()),
        ("outbound_date", query.outbound_date().format("%Y-%m-%d").to_string()),
        ("currency", "USD".to_string()),
        ("hl", "en".to_string()),
        ("api_key", api_key.expose_secret().to_string()),
        ("type", query.trip_type().provider_code().to_string()),
    ];

    if let (TripType::RoundTrip, Some(return_date)) = (query.trip_type(), query.return_date()) {
        params.push(("return_date", return_date.format("%Y-%m-%d").to_string()));
    }

    params
}

/// Picks `best_flights`, falling back to `other_flights`, and ranks the normalized items.
pub fn parse_search_response(body: &Value) -> SearchResult {
    let list = ["best_flights", "other_flights"]
        .iter()
        .find_map(|key| body.get(*key).map(|list| (*key, list)));

    let Some((key, list)) = list else {
        return Err(SearchError::NoFlightList);
    };

    let items = list
        .as_array()
        .ok_or_else(|| SearchError::Unexpected(format!("`{key}` is not a list")))?;

    let options = items
        .iter()
        .map(|item| {
            item.as_object()
                .map(normalize_option)
                .ok_or_else(|| SearchError::Unexpected(format!("`{key}` entry is not an object")))
        })
        .collect::<Result<Vec<_>, _>>()?;

    Ok(rank_options(options))
}

fn normalize_option(item: &Map<String, Value>) -> FlightOption {
    FlightOption {
        airline: airline_name(item),
        price: Price::from_provider_value(item.get("price")),
        duration_minutes: duration_from_provider_value(item.get("total_duration")),
        booking_reference: item
            .get("booking_token")
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_string(),
    }
}

/// Top-level `airline` if present, otherwise the distinct carriers of the itinerary legs.
fn airline_name(item: &Map<String, Value>) -> String {
    if let Some(airline) = item.get("airline").and_then(Value::as_str) {
        return airline.to_string();
    }

    let mut carriers: Vec<&str> = Vec::new();
    for leg in item.get("flights").and_then(Value::as_array).into_iter().flatten() {
        if let Some(airline) = leg.get("airline").and_then(Value::as_str) {
            if !carriers.contains(&airline) {
                carriers.push(airline);
            }
        }
    }

    if carriers.is_empty() {
        "Unknown".to_string()
    } else {
        carriers.join(", ")
    }
}
