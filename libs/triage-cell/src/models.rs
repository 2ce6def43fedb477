use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

use scheduling_cell::SchedulingError;
use shared_config::TriageConfig;
use shared_models::{Appointment, Patient};
use shared_store::StoreError;

#[derive(Debug, Clone, thiserror::Error)]
pub enum TriageError {
    #[error("triage entry not found: {0}")]
    NotFound(Uuid),

    #[error("invalid triage status transition from {from} to {to}")]
    InvalidStatusTransition { from: String, to: String },

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error(transparent)]
    Scheduling(#[from] SchedulingError),
}

/// Structured symptom report collected at intake.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SymptomReport {
    pub description: String,
    /// Self-reported pain on a 0-10 scale.
    pub pain_level: u8,
    pub swelling: bool,
    pub bleeding: bool,
    pub fever: bool,
    pub cannot_eat: bool,
    pub sleep_disrupted: bool,
    pub medication_ineffective: bool,
    pub duration: Option<SymptomDuration>,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum SymptomDuration {
    /// Fresh onset, often trauma.
    JustStarted,
    UnderThreeDays,
    /// Three days or more suggests an untreated infection.
    ThreeDaysOrMore,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord)]
#[serde(rename_all = "snake_case")]
pub enum TriageCategory {
    Critical,
    Urgent,
    Moderate,
    Minor,
}

impl TriageCategory {
    /// Queue ordering rank; lower sorts first.
    pub fn rank(&self) -> u8 {
        match self {
            TriageCategory::Critical => 0,
            TriageCategory::Urgent => 1,
            TriageCategory::Moderate => 2,
            TriageCategory::Minor => 3,
        }
    }

    pub fn max_wait_minutes(&self, config: &TriageConfig) -> i64 {
        match self {
            TriageCategory::Critical => config.critical_max_wait_minutes,
            TriageCategory::Urgent => config.urgent_max_wait_minutes,
            TriageCategory::Moderate => config.moderate_max_wait_minutes,
            TriageCategory::Minor => config.minor_max_wait_minutes,
        }
    }

    pub fn response_time_label(&self) -> &'static str {
        match self {
            TriageCategory::Critical => "immediate",
            TriageCategory::Urgent => "within 30 minutes",
            TriageCategory::Moderate => "within 2 hours",
            TriageCategory::Minor => "within 24 hours",
        }
    }

    /// Canned first-aid protocol handed to the patient while they wait.
    pub fn protocol(&self) -> Vec<String> {
        let steps: &[&str] = match self {
            TriageCategory::Critical => &[
                "Call emergency services (911) immediately.",
                "Do not eat, drink, or take further medication.",
                "If a tooth was knocked out, keep it moist in milk or saliva.",
            ],
            TriageCategory::Urgent => &[
                "Rinse gently with warm salt water.",
                "Apply a cold compress to the outside of the cheek.",
                "A knocked-out tooth should be kept moist; do not scrub the root.",
                "Avoid aspirin directly on the gums.",
            ],
            TriageCategory::Moderate => &[
                "Rinse with warm salt water after meals.",
                "Over-the-counter pain relief may be taken as directed.",
                "Avoid very hot, cold, or sweet food and drink.",
            ],
            TriageCategory::Minor => &[
                "Keep the area clean and monitor for changes.",
                "Use over-the-counter pain relief as directed if needed.",
            ],
        };
        steps.iter().map(|s| s.to_string()).collect()
    }
}

impl fmt::Display for TriageCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TriageCategory::Critical => write!(f, "critical"),
            TriageCategory::Urgent => write!(f, "urgent"),
            TriageCategory::Moderate => write!(f, "moderate"),
            TriageCategory::Minor => write!(f, "minor"),
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum TriageStatus {
    Queued,
    SlotFound,
    NoSlot,
    Resolved,
}

impl TriageStatus {
    pub fn can_transition_to(&self, next: &TriageStatus) -> bool {
        use TriageStatus::*;
        match (self, next) {
            // Resolved is reachable from anywhere; nothing leaves it.
            (Resolved, _) => false,
            (_, Resolved) => true,
            (Queued, SlotFound | NoSlot) => true,
            (NoSlot, SlotFound) => true,
            _ => false,
        }
    }
}

impl fmt::Display for TriageStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TriageStatus::Queued => write!(f, "queued"),
            TriageStatus::SlotFound => write!(f, "slot_found"),
            TriageStatus::NoSlot => write!(f, "no_slot"),
            TriageStatus::Resolved => write!(f, "resolved"),
        }
    }
}

/// Outcome of scoring a symptom report, before queueing.
#[derive(Debug, Clone, Copy)]
pub struct TriageAssessment {
    pub severity_score: u8,
    pub category: TriageCategory,
    pub life_threatening: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TriageResult {
    pub id: Uuid,
    pub created_at: DateTime<Utc>,
    pub patient: Patient,
    pub report: SymptomReport,
    pub severity_score: u8,
    pub category: TriageCategory,
    pub queue_position: usize,
    pub estimated_wait_minutes: i64,
    pub protocol: Vec<String>,
    pub life_threatening: bool,
    pub status: TriageStatus,
    pub appointment_id: Option<Uuid>,
}

/// Queue wrapper: category rank first, then insertion time (FIFO within a
/// category).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EmergencyQueueEntry {
    pub triage: TriageResult,
    pub priority: u8,
    pub enqueued_at: DateTime<Utc>,
}

/// Result of trying to find a slot for a queued emergency.
#[derive(Debug, Clone)]
pub enum SlotOutcome {
    Found(Appointment),
    NoSlot,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CategoryCount {
    pub category: TriageCategory,
    pub count: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QueueEntrySummary {
    pub triage_id: Uuid,
    pub patient_name: String,
    pub category: TriageCategory,
    pub severity_score: u8,
    pub queue_position: usize,
    pub estimated_wait_minutes: i64,
    pub enqueued_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QueueStatus {
    pub queue_length: usize,
    pub by_category: Vec<CategoryCount>,
    pub entries: Vec<QueueEntrySummary>,
}
