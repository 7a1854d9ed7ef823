use thiserror::Error;

use crate::domain::flight::SearchError;
use crate::domain::query::QueryError;
use crate::secrets::SecretError;

pub const GENERIC_APOLOGY: &str = "Sorry, I encountered an error processing your request.";

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum ApplicationError {
    #[error("no airport code for `{departure_city}` or `{destination_city}`")]
    UnknownAirport { departure_city: String, destination_city: String },
    #[error(transparent)]
    InvalidQuery(#[from] QueryError),
    #[error("invalid input: {0}")]
    InvalidInput(String),
    #[error(transparent)]
    Search(#[from] SearchError),
    #[error("mail delivery failed: {0}")]
    Mail(String),
    #[error(transparent)]
    Secret(#[from] SecretError),
    #[error("unexpected failure: {0}")]
    Unexpected(String),
}

impl ApplicationError {
    /// Text shown to the person chatting with the agent.
    pub fn fulfillment_text(&self) -> String {
        match self {
            Self::UnknownAirport { departure_city, destination_city } => format!(
                "Sorry, I couldn't find airport codes for {departure_city} or {destination_city}."
            ),
            Self::InvalidQuery(error) => error.user_message(),
            Self::InvalidInput(_) => {
                "Sorry, I couldn't understand that request. Could you rephrase it?".to_string()
            }
            Self::Search(error) => format!("Sorry, I encountered an error: {error}"),
            Self::Mail(_) => "Sorry, I wasn't able to send that email.".to_string(),
            Self::Secret(_) | Self::Unexpected(_) => GENERIC_APOLOGY.to_string(),
        }
    }
}

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum InterfaceError {
    #[error("bad request: {message}")]
    BadRequest { message: String, correlation_id: String },
    #[error("service unavailable: {message}")]
    ServiceUnavailable { message: String, correlation_id: String },
    #[error("internal error: {message}")]
    Internal { message: String, correlation_id: String },
}

impl InterfaceError {
    pub fn user_message(&self) -> &'static str {
        match self {
            Self::BadRequest { .. } => {
                "The request could not be processed. Check inputs and try again."
            }
            Self::ServiceUnavailable { .. } => {
                "The service is temporarily unavailable. Please retry shortly."
            }
            Self::Internal { .. } => "An unexpected internal error occurred.",
        }
    }

    pub fn correlation_id(&self) -> &str {
        match self {
            Self::BadRequest { correlation_id, .. }
            | Self::ServiceUnavailable { correlation_id, .. }
            | Self::Internal { correlation_id, .. } => correlation_id,
        }
    }
}

impl ApplicationError {
    pub fn into_interface(self, correlation_id: impl Into<String>) -> InterfaceError {
        let correlation_id = correlation_id.into();
        let mut mapped = InterfaceError::from(self);
        match &mut mapped {
            InterfaceError::BadRequest { correlation_id: id, .. }
            | InterfaceError::ServiceUnavailable { correlation_id: id, .. }
            | InterfaceError::Internal { correlation_id: id, .. } => *id = correlation_id,
        }
        mapped
    }
}

impl From<ApplicationError> for InterfaceError {
    fn from(value: ApplicationError) -> Self {
        let unassigned = || "unassigned".to_owned();
        match value {
            ApplicationError::UnknownAirport { .. }
            | ApplicationError::InvalidQuery(_)
            | ApplicationError::InvalidInput(_) => {
                Self::BadRequest { message: value.to_string(), correlation_id: unassigned() }
            }
            ApplicationError::Search(SearchError::Unexpected(message))
            | ApplicationError::Unexpected(message) => {
                Self::Internal { message, correlation_id: unassigned() }
            }
            ApplicationError::Search(_)
            | ApplicationError::Mail(_)
            | ApplicationError::Secret(_) => Self::ServiceUnavailable {
                message: value.to_string(),
                correlation_id: unassigned(),
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use crate::domain::flight::SearchError;
    use crate::domain::query::QueryError;
    use crate::errors::{ApplicationError, InterfaceError, GENERIC_APOLOGY};
    use crate::secrets::SecretError;

    #[test]
    fn unknown_airport_maps_to_bad_request() {
        let interface = ApplicationError::UnknownAirport {
            departure_city: "Atlantis".to_owned(),
            destination_city: "Dubai".to_owned(),
        }
        .into_interface("req-1");

        assert!(matches!(
            interface,
            InterfaceError::BadRequest {
                ref correlation_id,
                ..
            } if correlation_id == "req-1"
        ));
        assert_eq!(
            interface.user_message(),
            "The request could not be processed. Check inputs and try again."
        );
    }

    #[test]
    fn transport_and_mail_failures_map_to_service_unavailable() {
        let search = ApplicationError::from(SearchError::Transport("timed out".to_owned()))
            .into_interface("req-2");
        assert!(matches!(search, InterfaceError::ServiceUnavailable { .. }));

        let mail = ApplicationError::Mail("authentication rejected".to_owned())
            .into_interface("req-3");
        assert!(matches!(mail, InterfaceError::ServiceUnavailable { .. }));
        assert_eq!(mail.correlation_id(), "req-3");
    }

    #[test]
    fn unexpected_failures_map_to_internal() {
        let interface =
            ApplicationError::Unexpected("worker panicked".to_owned()).into_interface("req-4");

        assert!(matches!(interface, InterfaceError::Internal { .. }));
        assert_eq!(interface.user_message(), "An unexpected internal error occurred.");
    }

    #[test]
    fn fulfillment_text_never_leaks_secret_details() {
        let error = ApplicationError::from(SecretError::NotFound { name: "SERPAPI_KEY".into() });
        assert_eq!(error.fulfillment_text(), GENERIC_APOLOGY);

        let missing_return = ApplicationError::from(QueryError::MissingReturnDate);
        assert!(missing_return.fulfillment_text().starts_with("For round-trip flights"));

        let unknown = ApplicationError::UnknownAirport {
            departure_city: "Atlantis".to_owned(),
            destination_city: "Dubai".to_owned(),
        };
        assert_eq!(
            unknown.fulfillment_text(),
            "Sorry, I couldn't find airport codes for Atlantis or Dubai."
        );
    }
}
