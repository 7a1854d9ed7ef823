use std::cmp::Ordering;
use std::str::FromStr;

use rust_decimal::prelude::FromPrimitive;
use rust_decimal::{Decimal, RoundingStrategy};
use serde_json::Value;
use thiserror::Error;

/// Number of options kept after ranking.
pub const MAX_OPTIONS: usize = 3;

/// Provider prices arrive as numbers, numeric strings, or not at all. They are resolved
/// once here and never re-read downstream.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Price {
    Numeric(Decimal),
    Unparseable,
}

impl Price {
    pub fn from_provider_value(value: Option<&Value>) -> Self {
        let parsed = match value {
            Some(Value::Number(number)) => number_to_decimal(number),
            Some(Value::String(raw)) => parse_decimal(raw.trim()),
            _ => None,
        };

        parsed.map(Self::Numeric).unwrap_or(Self::Unparseable)
    }

    pub fn amount(&self) -> Option<Decimal> {
        match self {
            Self::Numeric(amount) => Some(*amount),
            Self::Unparseable => None,
        }
    }

    /// Ascending by amount; unparseable prices rank after every numeric price.
    pub fn ranking_cmp(&self, other: &Self) -> Ordering {
        match (self, other) {
            (Self::Numeric(left), Self::Numeric(right)) => left.cmp(right),
            (Self::Numeric(_), Self::Unparseable) => Ordering::Less,
            (Self::Unparseable, Self::Numeric(_)) => Ordering::Greater,
            (Self::Unparseable, Self::Unparseable) => Ordering::Equal,
        }
    }
}

impl std::fmt::Display for Price {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Numeric(amount) => write!(f, "{}", format_usd(*amount)),
            Self::Unparseable => write!(f, "N/A"),
        }
    }
}

/// `$` followed by the amount with exactly two decimal places.
pub fn format_usd(amount: Decimal) -> String {
    let mut rounded = amount.round_dp_with_strategy(2, RoundingStrategy::MidpointAwayFromZero);
    rounded.rescale(2);
    format!("${rounded}")
}

fn number_to_decimal(number: &serde_json::Number) -> Option<Decimal> {
    if let Some(integer) = number.as_i64() {
        return Some(Decimal::from(integer));
    }
    if let Some(integer) = number.as_u64() {
        return Some(Decimal::from(integer));
    }
    number.as_f64().and_then(Decimal::from_f64)
}

fn parse_decimal(raw: &str) -> Option<Decimal> {
    if raw.is_empty() {
        return None;
    }
    Decimal::from_str(raw).ok().or_else(|| Decimal::from_scientific(raw).ok())
}

/// Total duration in minutes from a number or a numeric string; anything else is 0.
pub fn duration_from_provider_value(value: Option<&Value>) -> u32 {
    match value {
        Some(Value::Number(number)) => {
            number.as_u64().and_then(|minutes| u32::try_from(minutes).ok()).unwrap_or(0)
        }
        Some(Value::String(raw)) => raw.trim().parse::<u32>().unwrap_or(0),
        _ => 0,
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct FlightOption {
    pub airline: String,
    pub price: Price,
    pub duration_minutes: u32,
    pub booking_reference: String,
}

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum SearchError {
    #[error("API request failed: {0}")]
    Transport(String),
    #[error("No flights found in the response")]
    NoFlightList,
    #[error("Unexpected error: {0}")]
    Unexpected(String),
}

/// Up to [`MAX_OPTIONS`] flights in ascending price order, or the reason the search failed.
pub type SearchResult = Result<Vec<FlightOption>, SearchError>;

/// Stable ascending sort by price followed by truncation. Unparseable prices are never
/// removed explicitly; they only fall past the cutoff.
pub fn rank_options(mut options: Vec<FlightOption>) -> Vec<FlightOption> {
    options.sort_by(|left, right| left.price.ranking_cmp(&right.price));
    options.truncate(MAX_OPTIONS);
    options
}
