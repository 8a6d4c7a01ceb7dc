// Errors surfaced by the lifetime stats engine. None of these are fatal to a session.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum StatsError {
    #[error("state report is not valid JSON: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("state report is missing an `interfaces` array")]
    MissingInterfaces,

    #[error("interface entry {index} is invalid: {reason}")]
    InvalidInterface { index: usize, reason: &'static str },

    #[error("counter `{counter}` on interface `{interface}` is not an unsigned integer")]
    InvalidCounter { interface: String, counter: String },

    #[error("state report is missing `radios` or `interfaces` arrays")]
    MissingRadiosOrInterfaces,

    #[error("stats processor has no serial number; call initialize first")]
    NotInitialized,

    #[error("stats store: {0}")]
    Store(anyhow::Error),

    #[error("device session has ended")]
    SessionClosed,
}
