//! Flightdesk core: the flight-search domain shared by the webhook server and the CLI.
//!
//! - `airports` - city name to IATA code table
//! - `domain` - validated queries, provider flight options, price ranking
//! - `format` - reply text for the conversational agent
//! - `secrets` - injected credential providers with explicit refresh
//! - `config` - layered configuration (defaults, file, env, overrides)
//! - `errors` - application and interface error tiers

pub mod airports;
pub mod config;
pub mod domain;
pub mod errors;
pub mod format;
pub mod secrets;

pub use airports::{resolve, resolve_pair, AirportCode};
pub use domain::flight::{
    duration_from_provider_value, format_usd, rank_options, FlightOption, Price, SearchError,
    SearchResult, MAX_OPTIONS,
};
pub use domain::query::{parse_travel_date, FlightQuery, QueryError, TripType};
pub use errors::{ApplicationError, InterfaceError, GENERIC_APOLOGY};
pub use format::{booking_link, format_duration, format_response, QueryContext};
pub use secrets::{MailCredentials, SecretError, SecretProvider};
