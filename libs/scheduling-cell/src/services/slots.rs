use chrono::{Duration, NaiveDate};
use tracing::debug;
use uuid::Uuid;

use shared_config::SchedulingConfig;
use shared_models::{DayHours, Slot};

use crate::models::SchedulingError;

/// Generates bookable start times for one day against its working-hour
/// rules. Deterministic: no clock reads, no randomness.
#[derive(Debug, Clone)]
pub struct SlotGenerator {
    granularity_minutes: i64,
}

impl SlotGenerator {
    pub fn new(config: &SchedulingConfig) -> Self {
        Self {
            granularity_minutes: config.granularity_minutes,
        }
    }

    /// Candidate slots covering [open, close) at the granularity step,
    /// excluding any slot that intersects a break or whose end exceeds the
    /// closing time. Invariant violations in the working hours fail the whole
    /// call; no partial sequence is ever produced.
    pub fn generate_slots(
        &self,
        date: NaiveDate,
        hours: &DayHours,
        duration_minutes: i64,
        practitioner_id: Uuid,
    ) -> Result<Vec<Slot>, SchedulingError> {
        if duration_minutes <= 0 {
            return Err(SchedulingError::InvalidDuration(format!(
                "duration must be positive, got {duration_minutes}"
            )));
        }
        hours.validate()?;

        if hours.closed {
            debug!("No slots for {}: closed", date);
            return Ok(Vec::new());
        }

        let open = date.and_time(hours.open).and_utc();
        let close = date.and_time(hours.close).and_utc();
        let duration = Duration::minutes(duration_minutes);
        let step = Duration::minutes(self.granularity_minutes);

        let mut slots = Vec::new();
        let mut start = open;
        while start + duration <= close {
            let end = start + duration;
            let in_break = hours.breaks.iter().any(|b| {
                let break_start = date.and_time(b.start).and_utc();
                let break_end = date.and_time(b.end).and_utc();
                start < break_end && break_start < end
            });
            if !in_break {
                slots.push(Slot {
                    start_time: start,
                    end_time: end,
                    practitioner_id,
                    available: true,
                });
            }
            start += step;
        }

        debug!("Generated {} candidate slots for {}", slots.len(), date);
        Ok(slots)
    }
}
