use serde::{Deserialize, Serialize};
use std::fmt;

use crate::appointment::Appointment;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ConflictKind {
    PractitionerDoubleBooked,
    PatientDoubleBooked,
}

impl fmt::Display for ConflictKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConflictKind::PractitionerDoubleBooked => write!(f, "practitioner double-booked"),
            ConflictKind::PatientDoubleBooked => write!(f, "patient double-booked"),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Conflict {
    pub appointment: Appointment,
    pub kind: ConflictKind,
    pub reason: String,
}

/// Transient result of a conflict check; an empty report means bookable.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ConflictReport {
    pub conflicts: Vec<Conflict>,
}

impl ConflictReport {
    pub fn has_conflict(&self) -> bool {
        !self.conflicts.is_empty()
    }

    pub fn is_bookable(&self) -> bool {
        self.conflicts.is_empty()
    }
}
