use chrono::{DateTime, Duration, Utc};
use std::sync::Arc;
use tracing::{debug, info};
use uuid::Uuid;

use shared_config::SchedulingConfig;
use shared_models::{Appointment, Slot, WeekSchedule};
use shared_store::{AppointmentQuery, AppointmentStore};

use crate::models::{AvailabilityCheck, SchedulingError};
use crate::services::conflict::ConflictDetector;
use crate::services::slots::SlotGenerator;

/// Composes the slot generator and the conflict detector to answer "is this
/// slot free?" and "what are the next N alternatives?".
pub struct AvailabilityService {
    store: Arc<dyn AppointmentStore>,
    schedule: WeekSchedule,
    slot_generator: SlotGenerator,
    conflict_detector: ConflictDetector,
    practitioner_id: Uuid,
    lookahead_days: i64,
}

impl AvailabilityService {
    pub fn new(
        store: Arc<dyn AppointmentStore>,
        schedule: WeekSchedule,
        practitioner_id: Uuid,
        config: &SchedulingConfig,
    ) -> Self {
        Self {
            store,
            schedule,
            slot_generator: SlotGenerator::new(config),
            conflict_detector: ConflictDetector::new(config),
            practitioner_id,
            lookahead_days: config.lookahead_days,
        }
    }

    pub fn practitioner_id(&self) -> Uuid {
        self.practitioner_id
    }

    pub fn conflict_detector(&self) -> &ConflictDetector {
        &self.conflict_detector
    }

    /// Is the exact interval starting at `start` bookable? Unavailability is
    /// an answer, never an error; `Err` only signals store or invariant
    /// failures.
    pub async fn check_availability(
        &self,
        start: DateTime<Utc>,
        duration_minutes: i64,
        patient_id: Option<Uuid>,
    ) -> Result<AvailabilityCheck, SchedulingError> {
        let date = start.date_naive();
        let hours = self.schedule.hours_for(date);
        let candidates =
            self.slot_generator
                .generate_slots(date, hours, duration_minutes, self.practitioner_id)?;

        let Some(slot) = candidates.iter().find(|slot| slot.start_time == start) else {
            let time = start.time();
            let within_hours = !hours.closed && time >= hours.open && time < hours.close;
            let reason = if within_hours {
                // Inside the working window but not a generated slot: off the
                // booking grid, in a break, or too close to closing.
                "requested time doesn't fall on an open appointment slot"
            } else {
                "requested time is outside working hours"
            };
            debug!("Requested time {} unavailable: {}", start, reason);
            return Ok(AvailabilityCheck::unavailable(reason));
        };

        let existing = self
            .appointments_around(slot.start_time, slot.end_time, patient_id)
            .await?;
        let report = self.conflict_detector.detect(
            self.practitioner_id,
            patient_id.unwrap_or_else(Uuid::nil),
            slot.start_time,
            slot.end_time,
            &existing,
            None,
        );

        if let Some(conflict) = report.conflicts.first() {
            return Ok(AvailabilityCheck::unavailable(conflict.reason.clone()));
        }
        Ok(AvailabilityCheck::available())
    }

    /// Up to `count` future slots, scanning forward day by day within the
    /// bounded lookahead window. Chronological, earliest first; an empty list
    /// means "escalate to a human", not an error.
    pub async fn find_next_available_slots(
        &self,
        from: DateTime<Utc>,
        duration_minutes: i64,
        count: usize,
    ) -> Result<Vec<Slot>, SchedulingError> {
        let mut results = Vec::new();
        if count == 0 {
            return Ok(results);
        }

        for day_offset in 0..=self.lookahead_days {
            let date = (from + Duration::days(day_offset)).date_naive();
            let hours = self.schedule.hours_for(date);
            if hours.closed {
                continue;
            }

            let candidates = self.slot_generator.generate_slots(
                date,
                hours,
                duration_minutes,
                self.practitioner_id,
            )?;
            if candidates.is_empty() {
                continue;
            }

            let day_start = candidates[0].start_time;
            let day_end = candidates[candidates.len() - 1].end_time;
            let existing = self.appointments_around(day_start, day_end, None).await?;

            for slot in candidates {
                if slot.start_time < from {
                    continue;
                }
                let report = self.conflict_detector.detect(
                    self.practitioner_id,
                    Uuid::nil(),
                    slot.start_time,
                    slot.end_time,
                    &existing,
                    None,
                );
                if report.is_bookable() {
                    results.push(slot);
                    if results.len() == count {
                        info!(
                            "Found {} available slot(s) from {}",
                            results.len(),
                            from
                        );
                        return Ok(results);
                    }
                }
            }
        }

        info!(
            "Found {} available slot(s) within {} day lookahead from {}",
            results.len(),
            self.lookahead_days,
            from
        );
        Ok(results)
    }

    /// Snapshot of appointments near the candidate interval, wide enough to
    /// cover buffered overlap on both sides, for both the practitioner and
    /// (when known) the patient.
    async fn appointments_around(
        &self,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
        patient_id: Option<Uuid>,
    ) -> Result<Vec<Appointment>, SchedulingError> {
        let window_start = start - Duration::hours(4);
        let window_end = end + Duration::hours(4);

        let mut existing = self
            .store
            .find(
                &AppointmentQuery::active_for_practitioner(self.practitioner_id)
                    .between(window_start, window_end),
            )
            .await?;

        if let Some(patient_id) = patient_id {
            let patient_appointments = self
                .store
                .find(&AppointmentQuery::active_for_patient(patient_id).between(window_start, window_end))
                .await?;
            for appointment in patient_appointments {
                if !existing.iter().any(|known| known.id == appointment.id) {
                    existing.push(appointment);
                }
            }
        }
        Ok(existing)
    }
}
