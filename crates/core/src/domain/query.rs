use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::airports::AirportCode;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TripType {
    RoundTrip,
    OneWay,
}

impl TripType {
    /// Maps the agent's `flight_type` slot. Only an explicit one-way spelling selects a
    /// one-way search; anything else (including an empty slot) is a round trip.
    pub fn from_slot(value: &str) -> Self {
        match value.trim().to_ascii_lowercase().as_str() {
            "one-way" | "one_way" | "oneway" | "one way" => Self::OneWay,
            _ => Self::RoundTrip,
        }
    }

    /// The `type` query parameter expected by the search provider.
    pub fn provider_code(self) -> u8 {
        match self {
            Self::RoundTrip => 1,
            Self::OneWay => 2,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::RoundTrip => "round_trip",
            Self::OneWay => "one_way",
        }
    }
}

impl std::fmt::Display for TripType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum QueryError {
    #[error("outbound date is missing")]
    MissingOutboundDate,
    #[error("return date is required for round-trip flights")]
    MissingReturnDate,
    #[error("could not read travel date `{0}`")]
    InvalidDate(String),
    #[error("return date {return_date} is before outbound date {outbound_date}")]
    ReturnBeforeOutbound { outbound_date: NaiveDate, return_date: NaiveDate },
}

impl QueryError {
    pub fn user_message(&self) -> String {
        match self {
            Self::MissingOutboundDate => {
                "I need to know your departure date. When would you like to leave?".to_string()
            }
            Self::MissingReturnDate => "For round-trip flights, I need to know your return date. \
                 When would you like to return?"
                .to_string(),
            Self::InvalidDate(raw) => format!(
                "Sorry, I couldn't understand the date \"{raw}\". Could you give it as YYYY-MM-DD?"
            ),
            Self::ReturnBeforeOutbound { outbound_date, return_date } => format!(
                "Your return date ({return_date}) is before your departure date ({outbound_date}). \
                 Which dates did you mean?"
            ),
        }
    }
}

/// Reads the date portion of an ISO date or datetime. Empty input means "not supplied".
pub fn parse_travel_date(raw: &str) -> Result<Option<NaiveDate>, QueryError> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Ok(None);
    }

    // Either an ISO `T` or a space separates the date from a time of day.
    let date_part =
        trimmed.split(|c: char| c == 'T' || c.is_whitespace()).next().unwrap_or(trimmed);
    NaiveDate::parse_from_str(date_part, "%Y-%m-%d")
        .map(Some)
        .map_err(|_| QueryError::InvalidDate(trimmed.to_string()))
}

/// A validated search request. A round trip always carries a return date; a one-way
/// query never does.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct FlightQuery {
    departure: AirportCode,
    arrival: AirportCode,
    outbound_date: NaiveDate,
    return_date: Option<NaiveDate>,
    trip_type: TripType,
}

impl FlightQuery {
    pub fn new(
        departure: AirportCode,
        arrival: AirportCode,
        trip_type: TripType,
        outbound_date: NaiveDate,
        return_date: Option<NaiveDate>,
    ) -> Result<Self, QueryError> {
        let return_date = match trip_type {
            TripType::OneWay => None,
            TripType::RoundTrip => {
                let return_date = return_date.ok_or(QueryError::MissingReturnDate)?;
                if return_date < outbound_date {
                    return Err(QueryError::ReturnBeforeOutbound { outbound_date, return_date });
                }
                Some(return_date)
            }
        };

        Ok(Self { departure, arrival, outbound_date, return_date, trip_type })
    }

    pub fn departure(&self) -> AirportCode {
        self.departure
    }

    pub fn arrival(&self) -> AirportCode {
        self.arrival
    }

    pub fn outbound_date(&self) -> NaiveDate {
        self.outbound_date
    }

    pub fn return_date(&self) -> Option<NaiveDate> {
        self.return_date
    }

    pub fn trip_type(&self) -> TripType {
        self.trip_type
    }
}
