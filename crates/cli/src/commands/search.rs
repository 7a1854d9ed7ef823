use std::sync::Arc;

use anyhow::{Context, Result};
use flightdesk_agent::{
    FlightIntent, FulfillmentRuntime, Notifier, OutcomeKind, SerpApiClient, SmtpNotifier,
};
use flightdesk_core::config::{AppConfig, LoadOptions};
use flightdesk_core::secrets::provider_from_config;
use flightdesk_core::TripType;
use rust_decimal::Decimal;
use serde::Serialize;
use uuid::Uuid;

use super::{block_on, CommandResult, EXIT_INVALID, EXIT_UPSTREAM};

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct SearchArgs {
    pub from: String,
    pub to: String,
    pub depart: String,
    pub return_date: Option<String>,
    pub one_way: bool,
    pub budget: Option<Decimal>,
    pub email: Option<String>,
    pub json: bool,
}

impl SearchArgs {
    pub fn intent(&self) -> FlightIntent {
        FlightIntent {
            trip_type: if self.one_way { TripType::OneWay } else { TripType::RoundTrip },
            departure_city: self.from.trim().to_string(),
            destination_city: self.to.trim().to_string(),
            outbound_date: self.depart.clone(),
            return_date: self.return_date.clone().unwrap_or_default(),
            budget: self.budget,
            notify_email: self.email.clone(),
        }
    }
}

#[derive(Debug, Serialize)]
struct SearchOutput<'a> {
    command: &'static str,
    status: &'static str,
    outcome: &'static str,
    correlation_id: &'a str,
    text: &'a str,
    booking_url: Option<&'a str>,
}

pub fn run(args: SearchArgs) -> CommandResult {
    match AppConfig::load(LoadOptions::default()) {
        Ok(config) => run_with_config(&config, &args),
        Err(error) => {
            CommandResult::failure("search", "config_validation", error.to_string(), EXIT_INVALID)
        }
    }
}

pub fn run_with_config(config: &AppConfig, args: &SearchArgs) -> CommandResult {
    let runtime = match build_runtime(config) {
        Ok(runtime) => runtime,
        Err(error) => {
            return CommandResult::failure("search", "setup", format!("{error:#}"), EXIT_UPSTREAM)
        }
    };

    let intent = args.intent();
    let correlation_id = Uuid::new_v4().simple().to_string();
    let fulfillment = match block_on(runtime.handle(&intent, &correlation_id)) {
        Ok(fulfillment) => fulfillment,
        Err(error) => return CommandResult::failure("search", "runtime", error, EXIT_UPSTREAM),
    };

    let exit_code = exit_code(fulfillment.kind);
    if !args.json {
        return CommandResult::text(exit_code, fulfillment.text);
    }

    CommandResult::json(
        exit_code,
        &SearchOutput {
            command: "search",
            status: if exit_code == 0 { "ok" } else { "error" },
            outcome: fulfillment.kind.as_str(),
            correlation_id: &correlation_id,
            text: &fulfillment.text,
            booking_url: fulfillment.booking_url.as_deref(),
        },
    )
}

pub fn exit_code(kind: OutcomeKind) -> u8 {
    match kind {
        OutcomeKind::Success | OutcomeKind::NoResults => 0,
        OutcomeKind::LookupError | OutcomeKind::ValidationError => EXIT_INVALID,
        OutcomeKind::TransportError | OutcomeKind::DataError | OutcomeKind::Unexpected => {
            EXIT_UPSTREAM
        }
    }
}

fn build_runtime(config: &AppConfig) -> Result<FulfillmentRuntime> {
    let secrets = provider_from_config(&config.secrets).context("secret backend")?;
    let search = SerpApiClient::new(&config.search, secrets.clone()).context("search client")?;
    let notifier: Option<Arc<dyn Notifier>> = if config.mail.enabled {
        Some(Arc::new(SmtpNotifier::new(&config.mail, secrets).context("mail notifier")?))
    } else {
        None
    };

    Ok(FulfillmentRuntime::new(Arc::new(search), notifier))
}
