//! HTTP data sources.

pub mod polling;

pub use polling::{PollOutcome, PollingFallback, PollingPayload, PollingRetryState};
