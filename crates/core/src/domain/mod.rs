pub mod flight;
pub mod query;
