//! Flightdesk agent: turns a conversational-agent fulfillment request into a reply.
//!
//! - `conversation` - request body and slot parsing into a `FlightIntent`
//! - `search` - `FlightSearchClient` seam and the SerpApi implementation
//! - `notify` - `Notifier` seam and the SMTP implementation
//! - `runtime` - `FulfillmentRuntime`, the lookup → validate → search → format pipeline
//!
//! # Failure policy
//!
//! The agent platform expects a reply for every turn, so the runtime converts every
//! failure into apology text instead of returning an error. Only the standalone email
//! operation (`FulfillmentRuntime::send_results`) surfaces errors to its caller.

pub mod conversation;
pub mod notify;
pub mod runtime;
pub mod search;

pub use conversation::{FlightIntent, FulfillmentRequest};
pub use notify::{FlightDetails, NotificationOutcome, Notifier, SmtpNotifier};
pub use runtime::{Fulfillment, FulfillmentRuntime, OutcomeKind};
pub use search::{FlightSearchClient, SerpApiClient};
