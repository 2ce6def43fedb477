use chrono::{DateTime, Utc};
use thiserror::Error;

#[derive(Debug, Clone, Error)]
pub enum StoreError {
    #[error("record not found")]
    NotFound,

    /// The store's (practitioner, start-time) uniqueness constraint fired.
    /// Callers treat this as "slot unavailable", not as a failure.
    #[error("slot already taken at {0}")]
    SlotTaken(DateTime<Utc>),

    #[error("invalid status transition from {from} to {to}")]
    InvalidStatusTransition { from: String, to: String },

    #[error("store unavailable: {0}")]
    Unavailable(String),
}

#[derive(Debug, Clone, Error)]
pub enum NotificationError {
    #[error("delivery failed: {0}")]
    Delivery(String),
}

#[derive(Debug, Clone, Error)]
pub enum ProviderError {
    #[error("reply provider failed: {0}")]
    Failed(String),
}
