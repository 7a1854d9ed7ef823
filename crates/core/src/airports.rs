//! City display name to IATA airport code lookup.
//!
//! Lookups are exact and case-sensitive against the agent's city entity values. There is
//! no fuzzy matching and no geocoding fallback.

/// Three-letter IATA airport code.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct AirportCode(&'static str);

impl AirportCode {
    pub fn as_str(&self) -> &'static str {
        self.0
    }
}

impl std::fmt::Display for AirportCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.0)
    }
}

pub const CITY_CODES: &[(&str, &str)] = &[
    ("Miami", "MIA"),
    ("Dubai", "DXB"),
    ("New York", "JFK"),
    ("Los Angeles", "LAX"),
    ("London", "LHR"),
    ("Paris", "CDG"),
    ("Tokyo", "HND"),
    ("Toronto", "YYZ"),
    ("Chicago", "ORD"),
    ("San Francisco", "SFO"),
    ("Boston", "BOS"),
    ("Dallas", "DFW"),
    ("Atlanta", "ATL"),
    ("Washington", "DCA"),
    ("Seattle", "SEA"),
    ("Houston", "IAH"),
    ("Mexico City", "MEX"),
    ("Madrid", "MAD"),
    ("Barcelona", "BCN"),
    ("Berlin", "BER"),
    ("Rome", "FCO"),
    ("Amsterdam", "AMS"),
    ("Singapore", "SIN"),
    ("Hong Kong", "HKG"),
    ("Bangkok", "BKK"),
    ("Sydney", "SYD"),
];

pub fn resolve(city_name: &str) -> Option<AirportCode> {
    CITY_CODES.iter().find(|(city, _)| *city == city_name).map(|(_, code)| AirportCode(*code))
}

/// Resolves both ends of a trip. Either side missing yields `None`.
pub fn resolve_pair(
    departure_city: &str,
    destination_city: &str,
) -> Option<(AirportCode, AirportCode)> {
    Some((resolve(departure_city)?, resolve(destination_city)?))
}
