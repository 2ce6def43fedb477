use serde::{Deserialize, Serialize};
use std::fmt;

use shared_models::ScheduleValidationError;
use shared_store::StoreError;

#[derive(Debug, Clone, thiserror::Error)]
pub enum SchedulingError {
    #[error("invalid working hours: {0}")]
    InvalidWorkingHours(#[from] ScheduleValidationError),

    #[error("invalid duration: {0}")]
    InvalidDuration(String),

    #[error(transparent)]
    Store(#[from] StoreError),
}

/// Answer to "is this exact slot bookable?".
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AvailabilityCheck {
    pub available: bool,
    pub reason: Option<String>,
}

impl AvailabilityCheck {
    pub fn available() -> Self {
        Self {
            available: true,
            reason: None,
        }
    }

    pub fn unavailable(reason: impl Into<String>) -> Self {
        Self {
            available: false,
            reason: Some(reason.into()),
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum RiskTier {
    Low,
    Medium,
    High,
}

impl fmt::Display for RiskTier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RiskTier::Low => write!(f, "low"),
            RiskTier::Medium => write!(f, "medium"),
            RiskTier::High => write!(f, "high"),
        }
    }
}

/// Advisory no-show assessment. Annotates bookings, never blocks them.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct NoShowRisk {
    pub score: u8,
    pub tier: RiskTier,
}
