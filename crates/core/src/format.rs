//! Turns ranked search results into the single text block returned to the agent platform.

use rust_decimal::Decimal;

use crate::domain::flight::{format_usd, FlightOption, Price, SearchResult};
use crate::domain::query::{FlightQuery, TripType};

const BOOKING_BASE_URL: &str = "https://www.google.com/travel/flights";

/// What the user asked for, as needed to phrase the reply.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct QueryContext {
    pub departure_city: String,
    pub destination_city: String,
    pub query: FlightQuery,
    pub budget: Option<Decimal>,
}

pub fn format_response(context: &QueryContext, result: &SearchResult) -> String {
    let options = match result {
        Ok(options) => options,
        Err(error) => return format!("Sorry, I encountered an error: {error}"),
    };

    if options.is_empty() {
        return format!(
            "I couldn't find any flights from {} to {} for {}. Try different dates or cities.",
            context.departure_city,
            context.destination_city,
            context.query.outbound_date()
        );
    }

    let link = booking_link(&context.query);
    let mut text = format!(
        "I found these flights from {} to {}:",
        context.departure_city, context.destination_city
    );
    for (index, option) in options.iter().enumerate() {
        text.push_str("\n\n");
        text.push_str(&option_block(index + 1, option, &context.query, &link));
    }

    let budget = context.budget.filter(|budget| *budget > Decimal::ZERO);
    if let (Some(budget), Some(cheapest)) = (budget, options.first()) {
        if let Some(sentence) = budget_sentence(&cheapest.price, budget) {
            text.push_str("\n\n");
            text.push_str(&sentence);
        }
    }

    text
}

fn option_block(number: usize, option: &FlightOption, query: &FlightQuery, link: &str) -> String {
    let mut lines = vec![
        format!("Option {number}:"),
        format!("💰 Price: {}", option.price),
        format!("✈️ Airline: {}", option.airline),
        format!("⏱️ Duration: {}", format_duration(option.duration_minutes)),
    ];

    match (query.trip_type(), query.return_date()) {
        (TripType::RoundTrip, Some(return_date)) => {
            lines.push(format!("📅 Outbound: {}", query.outbound_date()));
            lines.push(format!("📅 Return: {return_date}"));
        }
        _ => lines.push(format!("📅 Date: {}", query.outbound_date())),
    }

    lines.push(format!("🔗 Book here: {link}"));
    lines.join("\n")
}

/// `"<h>h <m>m"`, or just `"<m>m"` when under an hour.
pub fn format_duration(total_minutes: u32) -> String {
    let hours = total_minutes / 60;
    let minutes = total_minutes % 60;
    if hours > 0 {
        format!("{hours}h {minutes}m")
    } else {
        format!("{minutes}m")
    }
}

/// Public search page for the route and dates. The same link serves every option.
pub fn booking_link(query: &FlightQuery) -> String {
    let mut link = format!(
        "{BOOKING_BASE_URL}?q=Flights%20to%20{}%20from%20{}%20on%20{}",
        query.arrival(),
        query.departure(),
        query.outbound_date()
    );
    if let (TripType::RoundTrip, Some(return_date)) = (query.trip_type(), query.return_date()) {
        link.push_str(&format!("%20return%20{return_date}"));
    }
    link
}

/// Compares the cheapest option against the budget. Nothing is said when the cheapest
/// option has no usable price.
pub fn budget_sentence(cheapest: &Price, budget: Decimal) -> Option<String> {
    let cheapest_amount = cheapest.amount()?;
    let budget_text = format_budget(budget);
    let cheapest_text = format_usd(cheapest_amount);

    if cheapest_amount <= budget {
        Some(format!(
            "✅ Good news! The cheapest flight ({cheapest_text}) is within your budget of {budget_text}."
        ))
    } else {
        Some(format!(
            "⚠️ Note: The cheapest flight ({cheapest_text}) is above your budget of {budget_text}."
        ))
    }
}

fn format_budget(budget: Decimal) -> String {
    if budget.fract().is_zero() {
        format!("${}", budget.trunc().normalize())
    } else {
        format_usd(budget)
    }
}

#[cfg(test)]
mod tests {
    use chrono::NaiveDate;
    use rust_decimal::Decimal;

    use crate::airports::resolve;
    use crate::domain::flight::{FlightOption, Price, SearchError};
    use crate::domain::query::{FlightQuery, TripType};

    use super::{booking_link, budget_sentence, format_duration, format_response, QueryContext};

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).expect("valid date")
    }

    fn round_trip_context(budget: Option<Decimal>) -> QueryContext {
        let query = FlightQuery::new(
            resolve("Miami").expect("MIA"),
            resolve("Dubai").expect("DXB"),
            TripType::RoundTrip,
            date(2024, 6, 1),
            Some(date(2024, 6, 10)),
        )
        .expect("round trip");
        QueryContext {
            departure_city: "Miami".to_string(),
            destination_city: "Dubai".to_string(),
            query,
            budget,
        }
    }

    fn one_way_context() -> QueryContext {
        let query = FlightQuery::new(
            resolve("New York").expect("JFK"),
            resolve("London").expect("LHR"),
            TripType::OneWay,
            date(2024, 7, 4),
            None,
        )
        .expect("one way");
        QueryContext {
            departure_city: "New York".to_string(),
            destination_city: "London".to_string(),
            query,
            budget: None,
        }
    }

    fn flight(airline: &str, price: i64, minutes: u32) -> FlightOption {
        FlightOption {
            airline: airline.to_string(),
            price: Price::Numeric(Decimal::new(price, 0)),
            duration_minutes: minutes,
            booking_reference: format!("token-{airline}"),
        }
    }

    #[test]
    fn duration_omits_zero_hours() {
        assert_eq!(format_duration(125), "2h 5m");
        assert_eq!(format_duration(45), "45m");
        assert_eq!(format_duration(60), "1h 0m");
        assert_eq!(format_duration(0), "0m");
    }

    #[test]
    fn booking_link_includes_return_leg_for_round_trips() {
        assert_eq!(
            booking_link(&round_trip_context(None).query),
            "https://www.google.com/travel/flights?q=Flights%20to%20DXB%20from%20MIA\
             %20on%202024-06-01%20return%202024-06-10"
        );
        assert_eq!(
            booking_link(&one_way_context().query),
            "https://www.google.com/travel/flights?q=Flights%20to%20LHR%20from%20JFK%20on%202024-07-04"
        );
    }

    #[test]
    fn budget_sentence_frames_over_and_within() {
        let budget = Decimal::new(500, 0);

        let over = budget_sentence(&Price::Numeric(Decimal::new(65_000, 2)), budget)
            .expect("over budget sentence");
        assert!(over.contains("above your budget"));
        assert!(over.contains("$650.00"));
        assert!(over.contains("$500"));

        let within = budget_sentence(&Price::Numeric(Decimal::new(4500, 1)), budget)
            .expect("within budget sentence");
        assert!(within.contains("within your budget"));
        assert!(within.contains("$450.00"));

        assert_eq!(budget_sentence(&Price::Unparseable, budget), None);
    }

    #[test]
    fn round_trip_response_lists_both_dates_per_option() {
        let context = round_trip_context(Some(Decimal::new(600, 0)));
        let result = Ok(vec![flight("Emirates", 700, 905), flight("Qatar Airways", 900, 1010)]);

        let text = format_response(&context, &result);

        assert!(text.starts_with("I found these flights from Miami to Dubai:"));
        assert_eq!(text.matches("📅 Outbound: 2024-06-01").count(), 2);
        assert_eq!(text.matches("📅 Return: 2024-06-10").count(), 2);
        assert!(text.contains("Option 1:\n💰 Price: $700.00\n✈️ Airline: Emirates\n⏱️ Duration: 15h 5m"));
        assert!(text.find("$700.00") < text.find("$900.00"));
        assert!(text.ends_with("⚠️ Note: The cheapest flight ($700.00) is above your budget of $600."));
    }

    #[test]
    fn one_way_response_shows_single_date_and_no_budget_line() {
        let context = one_way_context();
        let result = Ok(vec![flight("British Airways", 450, 45)]);

        let text = format_response(&context, &result);

        assert!(text.contains("📅 Date: 2024-07-04"));
        assert!(!text.contains("Return"));
        assert!(text.contains("⏱️ Duration: 45m"));
        assert!(!text.contains("budget"));
        assert!(text.ends_with("%20on%202024-07-04"));
    }

    #[test]
    fn zero_budget_is_ignored() {
        let context = round_trip_context(Some(Decimal::ZERO));
        let text = format_response(&context, &Ok(vec![flight("Emirates", 700, 905)]));
        assert!(!text.contains("budget"));
    }

    #[test]
    fn empty_and_failed_results_have_fixed_sentences() {
        let context = one_way_context();

        let empty = format_response(&context, &Ok(Vec::new()));
        assert_eq!(
            empty,
            "I couldn't find any flights from New York to London for 2024-07-04. \
             Try different dates or cities."
        );

        let failed =
            format_response(&context, &Err(SearchError::Transport("connection refused".into())));
        assert_eq!(failed, "Sorry, I encountered an error: API request failed: connection refused");
    }

    #[test]
    fn unparseable_price_renders_as_not_available() {
        let context = one_way_context();
        let mut option = flight("Mystery Air", 0, 90);
        option.price = Price::Unparseable;

        let text = format_response(&context, &Ok(vec![option]));

        assert!(text.contains("💰 Price: N/A"));
    }
}
