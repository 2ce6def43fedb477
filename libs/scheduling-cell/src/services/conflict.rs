use chrono::{DateTime, Duration, Utc};
use tracing::warn;
use uuid::Uuid;

use shared_config::SchedulingConfig;
use shared_models::{Appointment, Conflict, ConflictKind, ConflictReport};

/// Pure overlap testing against existing appointments, with the mandatory
/// sanitation buffer appended to every interval's effective end. The same
/// detector runs for ordinary booking and for triage bumping.
#[derive(Debug, Clone)]
pub struct ConflictDetector {
    buffer_minutes: i64,
}

impl ConflictDetector {
    pub fn new(config: &SchedulingConfig) -> Self {
        Self {
            buffer_minutes: config.buffer_minutes,
        }
    }

    /// Half-open overlap with buffered ends: [s1, e1 + buffer) intersects
    /// [s2, e2 + buffer). Using half-open semantics on both sides keeps exact
    /// boundaries (end == other start, buffer included) conflict-free.
    pub fn overlaps(
        &self,
        start_a: DateTime<Utc>,
        end_a: DateTime<Utc>,
        start_b: DateTime<Utc>,
        end_b: DateTime<Utc>,
    ) -> bool {
        let buffer = Duration::minutes(self.buffer_minutes);
        start_a < end_b + buffer && start_b < end_a + buffer
    }

    /// Checks a candidate interval against the supplied non-cancelled
    /// appointments for the practitioner and the patient. An empty report
    /// means bookable.
    pub fn detect(
        &self,
        practitioner_id: Uuid,
        patient_id: Uuid,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
        existing: &[Appointment],
        exclude_appointment_id: Option<Uuid>,
    ) -> ConflictReport {
        let mut report = ConflictReport::default();

        for appointment in existing {
            if Some(appointment.id) == exclude_appointment_id {
                continue;
            }
            if !appointment.is_active() {
                continue;
            }
            if !self.overlaps(start, end, appointment.start_time, appointment.end_time) {
                continue;
            }

            let kind = if appointment.practitioner_id == practitioner_id {
                ConflictKind::PractitionerDoubleBooked
            } else if appointment.patient_id == patient_id {
                ConflictKind::PatientDoubleBooked
            } else {
                continue;
            };

            let reason = format!(
                "{}: existing {} from {} to {} (plus {} minute buffer)",
                kind,
                appointment.procedure,
                appointment.start_time.format("%Y-%m-%d %H:%M"),
                appointment.end_time.format("%H:%M"),
                self.buffer_minutes
            );
            report.conflicts.push(Conflict {
                appointment: appointment.clone(),
                kind,
                reason,
            });
        }

        if report.has_conflict() {
            warn!(
                "Conflict detected for practitioner {} at {}: {} overlapping appointment(s)",
                practitioner_id,
                start,
                report.conflicts.len()
            );
        }
        report
    }
}
