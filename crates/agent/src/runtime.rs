use std::sync::Arc;

use flightdesk_core::{
    booking_link, format_response, parse_travel_date, resolve_pair, ApplicationError,
    FlightQuery, QueryContext, QueryError, SearchError, TripType,
};
use tracing::{info, warn};

use crate::conversation::FlightIntent;
use crate::notify::{parse_recipient, FlightDetails, NotificationOutcome, Notifier};
use crate::search::FlightSearchClient;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum OutcomeKind {
    Success,
    NoResults,
    LookupError,
    ValidationError,
    TransportError,
    DataError,
    Unexpected,
}

impl OutcomeKind {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Success => "success",
            Self::NoResults => "no_results",
            Self::LookupError => "lookup_error",
            Self::ValidationError => "validation_error",
            Self::TransportError => "transport_error",
            Self::DataError => "data_error",
            Self::Unexpected => "unexpected",
        }
    }
}

/// The reply for one fulfillment request. `text` is always populated.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Fulfillment {
    pub kind: OutcomeKind,
    pub text: String,
    pub booking_url: Option<String>,
    pub notification: Option<NotificationOutcome>,
}

impl Fulfillment {
    fn from_error(kind: OutcomeKind, error: &ApplicationError) -> Self {
        Self { kind, text: error.fulfillment_text(), booking_url: None, notification: None }
    }
}

/// Runs one request through lookup, validation, search, formatting and the optional
/// results email. Every failure ends as reply text; nothing here returns an error.
pub struct FulfillmentRuntime {
    search: Arc<dyn FlightSearchClient>,
    notifier: Option<Arc<dyn Notifier>>,
}

impl FulfillmentRuntime {
    pub fn new(search: Arc<dyn FlightSearchClient>, notifier: Option<Arc<dyn Notifier>>) -> Self {
        Self { search, notifier }
    }

    pub async fn handle(&self, intent: &FlightIntent, correlation_id: &str) -> Fulfillment {
        let context = match build_context(intent) {
            Ok(context) => context,
            Err(error) => {
                let kind = match error {
                    ApplicationError::UnknownAirport { .. } => OutcomeKind::LookupError,
                    _ => OutcomeKind::ValidationError,
                };
                warn!(
                    event_name = "fulfillment.request.rejected",
                    correlation_id = %correlation_id,
                    outcome = kind.as_str(),
                    error = %error,
                    "fulfillment request rejected before search"
                );
                return Fulfillment::from_error(kind, &error);
            }
        };

        let result = self.search.search(&context.query).await;
        let text = format_response(&context, &result);
        let kind = match &result {
            Ok(options) if options.is_empty() => OutcomeKind::NoResults,
            Ok(_) => OutcomeKind::Success,
            Err(SearchError::Transport(_)) => OutcomeKind::TransportError,
            Err(SearchError::NoFlightList) => OutcomeKind::DataError,
            Err(SearchError::Unexpected(_)) => OutcomeKind::Unexpected,
        };

        info!(
            event_name = "fulfillment.search.completed",
            correlation_id = %correlation_id,
            departure = %context.query.departure(),
            arrival = %context.query.arrival(),
            trip_type = context.query.trip_type().as_str(),
            outcome = kind.as_str(),
            options = result.as_ref().map(Vec::len).unwrap_or(0),
            "flight search completed"
        );

        let mut fulfillment = Fulfillment { kind, text, booking_url: None, notification: None };
        if kind != OutcomeKind::Success {
            return fulfillment;
        }

        let booking_url = booking_link(&context.query);
        if let Some(recipient) = intent.notify_email.as_deref() {
            let details =
                FlightDetails { text: fulfillment.text.clone(), booking_url: booking_url.clone() };
            let outcome = self.notify(recipient, &details, correlation_id).await;
            fulfillment.text.push_str("\n\n");
            fulfillment.text.push_str(&notification_sentence(recipient, &outcome));
            fulfillment.notification = Some(outcome);
        }
        fulfillment.booking_url = Some(booking_url);
        fulfillment
    }

    /// Emails results a client already holds. Unlike [`Self::handle`], failures are
    /// returned so the caller can map them onto a status code.
    pub async fn send_results(
        &self,
        recipient: &str,
        details: &FlightDetails,
        correlation_id: &str,
    ) -> Result<(), ApplicationError> {
        parse_recipient(recipient)
            .map_err(|error| ApplicationError::InvalidInput(error.to_string()))?;
        if details.text.trim().is_empty() {
            return Err(ApplicationError::InvalidInput("text must not be empty".to_string()));
        }

        match self.notify(recipient, details, correlation_id).await {
            NotificationOutcome::Sent => Ok(()),
            NotificationOutcome::Failed(reason) => Err(ApplicationError::Mail(reason)),
        }
    }

    async fn notify(
        &self,
        recipient: &str,
        details: &FlightDetails,
        correlation_id: &str,
    ) -> NotificationOutcome {
        let outcome = match &self.notifier {
            Some(notifier) => notifier.notify(recipient, details).await,
            None => NotificationOutcome::Failed("mail delivery is disabled".to_string()),
        };

        info!(
            event_name = "fulfillment.notification.completed",
            correlation_id = %correlation_id,
            sent = outcome.is_sent(),
            "results email processed"
        );
        outcome
    }
}

fn build_context(intent: &FlightIntent) -> Result<QueryContext, ApplicationError> {
    let (departure, arrival) = resolve_pair(&intent.departure_city, &intent.destination_city)
        .ok_or_else(|| ApplicationError::UnknownAirport {
            departure_city: intent.departure_city.clone(),
            destination_city: intent.destination_city.clone(),
        })?;

    let outbound_date =
        parse_travel_date(&intent.outbound_date)?.ok_or(QueryError::MissingOutboundDate)?;
    let return_date = match intent.trip_type {
        TripType::RoundTrip => parse_travel_date(&intent.return_date)?,
        TripType::OneWay => None,
    };
    let query = FlightQuery::new(departure, arrival, intent.trip_type, outbound_date, return_date)?;

    Ok(QueryContext {
        departure_city: intent.departure_city.clone(),
        destination_city: intent.destination_city.clone(),
        query,
        budget: intent.budget,
    })
}

fn notification_sentence(recipient: &str, outcome: &NotificationOutcome) -> String {
    match outcome {
        NotificationOutcome::Sent => format!("📧 I've also emailed these results to {recipient}."),
        NotificationOutcome::Failed(_) => format!(
            "I couldn't email these results to {recipient}, but you can still book using the \
             links above."
        ),
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::{Arc, Mutex};

    use async_trait::async_trait;
    use flightdesk_core::{FlightOption, FlightQuery, Price, SearchError, SearchResult, TripType};
    use rust_decimal::Decimal;

    use super::{FulfillmentRuntime, OutcomeKind};
    use crate::conversation::FlightIntent;
    use crate::notify::{FlightDetails, NotificationOutcome, Notifier};
    use crate::search::FlightSearchClient;

    struct FakeSearch {
        result: SearchResult,
        calls: AtomicUsize,
        queries: Mutex<Vec<FlightQuery>>,
    }

    impl FakeSearch {
        fn returning(result: SearchResult) -> Arc<Self> {
            Arc::new(Self { result, calls: AtomicUsize::new(0), queries: Mutex::default() })
        }

        fn calls(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl FlightSearchClient for FakeSearch {
        async fn search(&self, query: &FlightQuery) -> SearchResult {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.queries.lock().expect("lock").push(query.clone());
            self.result.clone().map(flightdesk_core::rank_options)
        }
    }

    struct FakeNotifier {
        outcome: NotificationOutcome,
        sent: Mutex<Vec<(String, FlightDetails)>>,
    }

    #[async_trait]
    impl Notifier for FakeNotifier {
        async fn notify(&self, recipient: &str, details: &FlightDetails) -> NotificationOutcome {
            self.sent.lock().expect("lock").push((recipient.to_string(), details.clone()));
            self.outcome.clone()
        }
    }

    fn option(airline: &str, price: i64, minutes: u32) -> FlightOption {
        FlightOption {
            airline: airline.to_string(),
            price: Price::Numeric(Decimal::new(price, 0)),
            duration_minutes: minutes,
            booking_reference: format!("token-{airline}"),
        }
    }

    fn intent(trip_type: TripType, from: &str, to: &str) -> FlightIntent {
        FlightIntent {
            trip_type,
            departure_city: from.to_string(),
            destination_city: to.to_string(),
            outbound_date: "2024-06-01T12:00:00-04:00".to_string(),
            return_date: "2024-06-10T12:00:00-04:00".to_string(),
            budget: None,
            notify_email: None,
        }
    }

    #[tokio::test]
    async fn round_trip_lists_cheapest_first_with_both_dates() {
        let search = FakeSearch::returning(Ok(vec![
            option("Emirates", 900, 905),
            option("Qatar Airways", 700, 960),
        ]));
        let runtime = FulfillmentRuntime::new(search.clone(), None);
        let mut request = intent(TripType::RoundTrip, "Miami", "Dubai");
        request.budget = Some(Decimal::new(800, 0));

        let fulfillment = runtime.handle(&request, "req-1").await;

        assert_eq!(fulfillment.kind, OutcomeKind::Success);
        let text = &fulfillment.text;
        assert!(text.starts_with("I found these flights from Miami to Dubai:\n\nOption 1:"));
        let first = text.find("$700.00").expect("cheapest listed");
        let second = text.find("$900.00").expect("second listed");
        assert!(first < second);
        assert!(text.contains("📅 Outbound: 2024-06-01"));
        assert!(text.contains("📅 Return: 2024-06-10"));
        assert!(text.ends_with(
            "✅ Good news! The cheapest flight ($700.00) is within your budget of $800."
        ));
        assert_eq!(
            fulfillment.booking_url.as_deref(),
            Some(
                "https://www.google.com/travel/flights?q=Flights%20to%20DXB%20from%20MIA\
                 %20on%202024-06-01%20return%202024-06-10"
            )
        );
        assert_eq!(search.calls(), 1);
    }

    #[tokio::test]
    async fn one_way_with_empty_results_reports_no_flights() {
        let search = FakeSearch::returning(Ok(Vec::new()));
        let runtime = FulfillmentRuntime::new(search.clone(), None);
        let mut request = intent(TripType::OneWay, "New York", "London");
        request.outbound_date = "2024-07-04".to_string();
        request.return_date = "garbage".to_string();

        let fulfillment = runtime.handle(&request, "req-2").await;

        assert_eq!(fulfillment.kind, OutcomeKind::NoResults);
        assert_eq!(
            fulfillment.text,
            "I couldn't find any flights from New York to London for 2024-07-04. \
             Try different dates or cities."
        );
        let queries = search.queries.lock().expect("lock");
        assert_eq!(queries[0].trip_type(), TripType::OneWay);
        assert_eq!(queries[0].return_date(), None);
    }

    #[tokio::test]
    async fn unknown_city_never_reaches_search() {
        let search = FakeSearch::returning(Ok(vec![option("Delta", 300, 120)]));
        let runtime = FulfillmentRuntime::new(search.clone(), None);

        let fulfillment =
            runtime.handle(&intent(TripType::RoundTrip, "Atlantis", "Dubai"), "req-3").await;

        assert_eq!(fulfillment.kind, OutcomeKind::LookupError);
        assert_eq!(
            fulfillment.text,
            "Sorry, I couldn't find airport codes for Atlantis or Dubai."
        );
        assert_eq!(search.calls(), 0);
    }

    #[tokio::test]
    async fn round_trip_without_return_date_asks_for_it() {
        let search = FakeSearch::returning(Ok(Vec::new()));
        let runtime = FulfillmentRuntime::new(search.clone(), None);
        let mut request = intent(TripType::RoundTrip, "Miami", "Dubai");
        request.return_date = String::new();

        let fulfillment = runtime.handle(&request, "req-4").await;

        assert_eq!(fulfillment.kind, OutcomeKind::ValidationError);
        assert_eq!(
            fulfillment.text,
            "For round-trip flights, I need to know your return date. When would you like to \
             return?"
        );
        assert_eq!(search.calls(), 0);
    }

    #[tokio::test]
    async fn return_before_outbound_is_rejected() {
        let search = FakeSearch::returning(Ok(Vec::new()));
        let runtime = FulfillmentRuntime::new(search.clone(), None);
        let mut request = intent(TripType::RoundTrip, "Miami", "Dubai");
        request.return_date = "2024-05-20".to_string();

        let fulfillment = runtime.handle(&request, "req-5").await;

        assert_eq!(fulfillment.kind, OutcomeKind::ValidationError);
        assert_eq!(search.calls(), 0);
    }

    #[tokio::test]
    async fn search_failures_become_apology_text() {
        let transport = FakeSearch::returning(Err(SearchError::Transport("timed out".into())));
        let fulfillment = FulfillmentRuntime::new(transport, None)
            .handle(&intent(TripType::RoundTrip, "Miami", "Dubai"), "req-6")
            .await;
        assert_eq!(fulfillment.kind, OutcomeKind::TransportError);
        assert_eq!(
            fulfillment.text,
            "Sorry, I encountered an error: API request failed: timed out"
        );

        let missing = FakeSearch::returning(Err(SearchError::NoFlightList));
        let fulfillment = FulfillmentRuntime::new(missing, None)
            .handle(&intent(TripType::RoundTrip, "Miami", "Dubai"), "req-7")
            .await;
        assert_eq!(fulfillment.kind, OutcomeKind::DataError);
        assert_eq!(
            fulfillment.text,
            "Sorry, I encountered an error: No flights found in the response"
        );
    }

    #[tokio::test]
    async fn requested_email_is_sent_and_mentioned() {
        let search = FakeSearch::returning(Ok(vec![option("Delta", 450, 420)]));
        let notifier = Arc::new(FakeNotifier {
            outcome: NotificationOutcome::Sent,
            sent: Mutex::default(),
        });
        let runtime = FulfillmentRuntime::new(search, Some(notifier.clone()));
        let mut request = intent(TripType::OneWay, "New York", "London");
        request.notify_email = Some("traveler@example.com".to_string());

        let fulfillment = runtime.handle(&request, "req-8").await;

        assert_eq!(fulfillment.notification, Some(NotificationOutcome::Sent));
        assert!(fulfillment
            .text
            .ends_with("\n\n📧 I've also emailed these results to traveler@example.com."));
        let sent = notifier.sent.lock().expect("lock");
        assert_eq!(sent[0].0, "traveler@example.com");
        assert!(sent[0].1.text.starts_with("I found these flights from New York to London:"));
        assert!(!sent[0].1.text.contains("📧"));
    }

    #[tokio::test]
    async fn email_without_mail_delivery_still_answers() {
        let search = FakeSearch::returning(Ok(vec![option("Delta", 450, 420)]));
        let runtime = FulfillmentRuntime::new(search, None);
        let mut request = intent(TripType::OneWay, "New York", "London");
        request.notify_email = Some("traveler@example.com".to_string());

        let fulfillment = runtime.handle(&request, "req-9").await;

        assert_eq!(fulfillment.kind, OutcomeKind::Success);
        assert!(matches!(fulfillment.notification, Some(NotificationOutcome::Failed(_))));
        assert!(fulfillment.text.ends_with(
            "I couldn't email these results to traveler@example.com, but you can still book \
             using the links above."
        ));
    }

    #[tokio::test]
    async fn send_results_validates_recipient_and_reports_delivery() {
        let search = FakeSearch::returning(Ok(Vec::new()));
        let details = FlightDetails {
            text: "I found these flights".to_string(),
            booking_url: "https://www.google.com/travel/flights".to_string(),
        };

        let disabled = FulfillmentRuntime::new(search.clone(), None);
        assert!(matches!(
            disabled.send_results("not-an-address", &details, "req-10").await,
            Err(flightdesk_core::ApplicationError::InvalidInput(_))
        ));
        assert!(matches!(
            disabled.send_results("traveler@example.com", &details, "req-11").await,
            Err(flightdesk_core::ApplicationError::Mail(_))
        ));

        let notifier = Arc::new(FakeNotifier {
            outcome: NotificationOutcome::Sent,
            sent: Mutex::default(),
        });
        let enabled = FulfillmentRuntime::new(search, Some(notifier));
        let sent = enabled.send_results("traveler@example.com", &details, "req-12").await;
        assert_eq!(sent, Ok(()));
    }
}
