use flightdesk_core::airports::CITY_CODES;
use serde::Serialize;

use super::CommandResult;

#[derive(Debug, Serialize)]
struct AirportEntry {
    city: &'static str,
    code: &'static str,
}

pub fn run(json_output: bool) -> CommandResult {
    if json_output {
        let entries: Vec<AirportEntry> = CITY_CODES
            .iter()
            .map(|(city, code)| AirportEntry { city: *city, code: *code })
            .collect();
        return CommandResult::json(0, &entries);
    }

    let width = CITY_CODES.iter().map(|(city, _)| city.len()).max().unwrap_or(0);
    let mut lines =
        vec![format!("{} supported cities (exact, case-sensitive match):", CITY_CODES.len())];
    lines.extend(CITY_CODES.iter().map(|(city, code)| format!("- {city:<width$}  {code}")));
    CommandResult::text(0, lines.join("\n"))
}
