use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Appointment {
    pub id: Uuid,
    pub patient_id: Uuid,
    pub practitioner_id: Uuid,
    pub start_time: DateTime<Utc>,
    pub end_time: DateTime<Utc>,
    pub procedure: ProcedureType,
    pub status: AppointmentStatus,
    pub origin: BookingOrigin,
    /// Set when the appointment was created by an emergency triage entry.
    pub triage_id: Option<Uuid>,
    /// High-priority appointments are never bumped for emergencies.
    pub high_priority: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Appointment {
    pub fn duration_minutes(&self) -> i64 {
        (self.end_time - self.start_time).num_minutes()
    }

    pub fn is_active(&self) -> bool {
        self.status.is_active()
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum AppointmentStatus {
    Scheduled,
    Confirmed,
    InProgress,
    Completed,
    Cancelled,
    NoShow,
    Rescheduled,
}

impl AppointmentStatus {
    /// Statuses that still occupy their time slot.
    pub fn is_active(&self) -> bool {
        matches!(
            self,
            AppointmentStatus::Scheduled
                | AppointmentStatus::Confirmed
                | AppointmentStatus::InProgress
        )
    }

    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            AppointmentStatus::Completed
                | AppointmentStatus::Cancelled
                | AppointmentStatus::NoShow
                | AppointmentStatus::Rescheduled
        )
    }

    /// Appointments are never hard-deleted, only status-transitioned; this
    /// guards the allowed transitions at the store seam.
    pub fn can_transition_to(&self, next: &AppointmentStatus) -> bool {
        use AppointmentStatus::*;
        match (self, next) {
            (Scheduled, Confirmed | InProgress | Cancelled | NoShow | Rescheduled) => true,
            (Confirmed, InProgress | Completed | Cancelled | NoShow | Rescheduled) => true,
            (InProgress, Completed | Cancelled) => true,
            _ => false,
        }
    }
}

impl fmt::Display for AppointmentStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AppointmentStatus::Scheduled => write!(f, "scheduled"),
            AppointmentStatus::Confirmed => write!(f, "confirmed"),
            AppointmentStatus::InProgress => write!(f, "in_progress"),
            AppointmentStatus::Completed => write!(f, "completed"),
            AppointmentStatus::Cancelled => write!(f, "cancelled"),
            AppointmentStatus::NoShow => write!(f, "no_show"),
            AppointmentStatus::Rescheduled => write!(f, "rescheduled"),
        }
    }
}

/// Where a booking originated.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum BookingOrigin {
    Staff,
    Conversation,
    Triage,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum ProcedureType {
    #[serde(alias = "clean", alias = "hygiene")]
    Cleaning,
    #[serde(alias = "check_up", alias = "exam")]
    Checkup,
    #[serde(alias = "cavity")]
    Filling,
    RootCanal,
    Extraction,
    Crown,
    Whitening,
    #[serde(alias = "emergency")]
    EmergencyExam,
    Consultation,
}

impl ProcedureType {
    pub fn duration_minutes(&self) -> i64 {
        match self {
            ProcedureType::Cleaning => 60,
            ProcedureType::Checkup => 30,
            ProcedureType::Filling => 45,
            ProcedureType::RootCanal => 90,
            ProcedureType::Extraction => 45,
            ProcedureType::Crown => 60,
            ProcedureType::Whitening => 60,
            ProcedureType::EmergencyExam => 45,
            ProcedureType::Consultation => 30,
        }
    }

    /// Urgent procedures are never bumped to make room for an emergency.
    pub fn is_urgent(&self) -> bool {
        matches!(self, ProcedureType::EmergencyExam | ProcedureType::RootCanal)
    }

    /// Keyword match against the fixed conversational vocabulary.
    pub fn match_keyword(text: &str) -> Option<ProcedureType> {
        let text = text.to_lowercase();
        const VOCABULARY: &[(&str, ProcedureType)] = &[
            ("cleaning", ProcedureType::Cleaning),
            ("clean", ProcedureType::Cleaning),
            ("hygiene", ProcedureType::Cleaning),
            ("checkup", ProcedureType::Checkup),
            ("check-up", ProcedureType::Checkup),
            ("check up", ProcedureType::Checkup),
            ("exam", ProcedureType::Checkup),
            ("root canal", ProcedureType::RootCanal),
            ("filling", ProcedureType::Filling),
            ("cavity", ProcedureType::Filling),
            ("extraction", ProcedureType::Extraction),
            ("pull", ProcedureType::Extraction),
            ("crown", ProcedureType::Crown),
            ("whitening", ProcedureType::Whitening),
            ("consultation", ProcedureType::Consultation),
        ];
        VOCABULARY
            .iter()
            .find(|(keyword, _)| text.contains(keyword))
            .map(|(_, procedure)| *procedure)
    }
}

impl fmt::Display for ProcedureType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ProcedureType::Cleaning => write!(f, "cleaning"),
            ProcedureType::Checkup => write!(f, "checkup"),
            ProcedureType::Filling => write!(f, "filling"),
            ProcedureType::RootCanal => write!(f, "root canal"),
            ProcedureType::Extraction => write!(f, "extraction"),
            ProcedureType::Crown => write!(f, "crown"),
            ProcedureType::Whitening => write!(f, "whitening"),
            ProcedureType::EmergencyExam => write!(f, "emergency exam"),
            ProcedureType::Consultation => write!(f, "consultation"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn terminal_statuses_accept_no_transitions() {
        for status in [
            AppointmentStatus::Completed,
            AppointmentStatus::Cancelled,
            AppointmentStatus::NoShow,
            AppointmentStatus::Rescheduled,
        ] {
            assert!(!status.can_transition_to(&AppointmentStatus::Confirmed));
            assert!(status.is_terminal());
        }
    }

    #[test]
    fn procedure_vocabulary_matches_longest_phrases_first() {
        assert_eq!(
            ProcedureType::match_keyword("I think I need a root canal"),
            Some(ProcedureType::RootCanal)
        );
        assert_eq!(
            ProcedureType::match_keyword("just a regular check up please"),
            Some(ProcedureType::Checkup)
        );
        assert_eq!(ProcedureType::match_keyword("my tooth hurts"), None);
    }
}
