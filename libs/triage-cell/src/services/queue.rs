use chrono::Duration;
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{info, warn};
use uuid::Uuid;

use scheduling_cell::AvailabilityService;
use shared_config::{SchedulingConfig, TriageConfig};
use shared_models::{Appointment, AppointmentStatus, BookingOrigin, Patient, ProcedureType};
use shared_store::{
    AppointmentQuery, AppointmentStore, NotificationGateway, PatientStore, StoreError,
};
use shared_utils::Clock;

use crate::models::{
    CategoryCount, EmergencyQueueEntry, QueueEntrySummary, QueueStatus, SlotOutcome,
    SymptomReport, TriageCategory, TriageError, TriageResult, TriageStatus,
};
use crate::services::scoring::TriageScoringService;

/// Priority queue of emergency patients plus the slot-acquisition ladder that
/// tries to get each of them seen within their category's wait ceiling.
///
/// Ordering is category rank first, arrival time second, so a critical
/// patient always sits ahead of an urgent one no matter when they arrived.
/// The queue itself is in-process state behind a mutex; the lock is never
/// held across an await.
pub struct EmergencyQueueService {
    queue: Mutex<Vec<EmergencyQueueEntry>>,
    scoring: TriageScoringService,
    availability: Arc<AvailabilityService>,
    store: Arc<dyn AppointmentStore>,
    patients: Arc<dyn PatientStore>,
    notifier: Arc<dyn NotificationGateway>,
    clock: Arc<dyn Clock>,
    triage_config: TriageConfig,
    scheduling_config: SchedulingConfig,
}

impl EmergencyQueueService {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        availability: Arc<AvailabilityService>,
        store: Arc<dyn AppointmentStore>,
        patients: Arc<dyn PatientStore>,
        notifier: Arc<dyn NotificationGateway>,
        clock: Arc<dyn Clock>,
        triage_config: TriageConfig,
        scheduling_config: SchedulingConfig,
    ) -> Self {
        Self {
            queue: Mutex::new(Vec::new()),
            scoring: TriageScoringService::new(triage_config.clone()),
            availability,
            store,
            patients,
            notifier,
            clock,
            triage_config,
            scheduling_config,
        }
    }

    /// Scores the report, queues the patient, and immediately tries to
    /// acquire a slot. Life-threatening reports are queued at the top but
    /// never auto-booked: the protocol directs the patient to emergency
    /// medical services and staff resolve the entry by hand.
    pub async fn triage_patient(
        &self,
        patient: Patient,
        report: SymptomReport,
    ) -> Result<TriageResult, TriageError> {
        let assessment = self.scoring.assess(&report);
        let now = self.clock.now();
        let triage = TriageResult {
            id: Uuid::new_v4(),
            created_at: now,
            patient,
            report,
            severity_score: assessment.severity_score,
            category: assessment.category,
            queue_position: 0,
            estimated_wait_minutes: 0,
            protocol: assessment.category.protocol(),
            life_threatening: assessment.life_threatening,
            status: TriageStatus::Queued,
            appointment_id: None,
        };
        let triage_id = triage.id;

        let queued = {
            let mut queue = self.queue.lock().await;
            queue.push(EmergencyQueueEntry {
                priority: assessment.category.rank(),
                enqueued_at: now,
                triage,
            });
            self.recompute(&mut queue);
            self.entry_snapshot(&queue, triage_id)?
        };
        info!(
            %triage_id,
            category = %queued.category,
            score = queued.severity_score,
            position = queued.queue_position,
            "patient triaged and queued"
        );

        if queued.life_threatening {
            return Ok(queued);
        }

        let outcome = self.acquire_slot(&queued).await?;

        let mut queue = self.queue.lock().await;
        let entry = queue
            .iter_mut()
            .find(|entry| entry.triage.id == triage_id)
            .ok_or(TriageError::NotFound(triage_id))?;
        match outcome {
            SlotOutcome::Found(appointment) => {
                entry.triage.status = TriageStatus::SlotFound;
                entry.triage.appointment_id = Some(appointment.id);
                info!(
                    %triage_id,
                    appointment_id = %appointment.id,
                    start = %appointment.start_time,
                    "emergency slot booked"
                );
            }
            SlotOutcome::NoSlot => {
                entry.triage.status = TriageStatus::NoSlot;
                warn!(%triage_id, "no emergency slot within the wait ceiling");
            }
        }
        Ok(entry.triage.clone())
    }

    /// Three-rung slot ladder: reserved emergency times today that fall
    /// inside the category's wait ceiling, then bumping a routine appointment
    /// (critical/urgent only), then the ordinary forward search bounded by
    /// twice the ceiling.
    async fn acquire_slot(&self, triage: &TriageResult) -> Result<SlotOutcome, TriageError> {
        let now = self.clock.now();
        let duration = self.scheduling_config.emergency_duration_minutes;
        let max_wait = triage.category.max_wait_minutes(&self.triage_config);
        // "Immediate" still needs a chair for the length of the exam.
        let effective_wait = if max_wait == 0 { duration } else { max_wait };

        if triage.category != TriageCategory::Minor {
            // Reserved capacity only counts if it honors the wait ceiling;
            // otherwise the ladder falls through to bumping or the ordinary
            // search, which may seat the patient sooner.
            let deadline = now + Duration::minutes(effective_wait);
            for reserved in &self.triage_config.reserved_slot_times {
                let start = now.date_naive().and_time(*reserved).and_utc();
                if start < now || start > deadline {
                    continue;
                }
                let check = self
                    .availability
                    .check_availability(start, duration, Some(triage.patient.id))
                    .await?;
                if !check.available {
                    continue;
                }
                match self.book(triage, start).await {
                    Ok(appointment) => return Ok(SlotOutcome::Found(appointment)),
                    Err(TriageError::Store(StoreError::SlotTaken(_))) => continue,
                    Err(error) => return Err(error),
                }
            }
        }

        if triage.category.rank() <= TriageCategory::Urgent.rank() {
            if let Some(bumped) = self.bump_candidate(effective_wait).await? {
                self.store
                    .update_status(
                        bumped.id,
                        AppointmentStatus::Rescheduled,
                        Some("rescheduled to make room for an emergency patient"),
                    )
                    .await?;
                self.notify_bumped(&bumped).await;
                info!(
                    bumped_appointment = %bumped.id,
                    start = %bumped.start_time,
                    "bumped routine appointment for emergency"
                );
                match self.book(triage, bumped.start_time).await {
                    Ok(appointment) => return Ok(SlotOutcome::Found(appointment)),
                    Err(TriageError::Store(StoreError::SlotTaken(_))) => {}
                    Err(error) => return Err(error),
                }
            }
        }

        let horizon = now + Duration::minutes(effective_wait * 2);
        let slots = self
            .availability
            .find_next_available_slots(now, duration, 1)
            .await?;
        if let Some(slot) = slots.into_iter().next() {
            if slot.start_time <= horizon {
                match self.book(triage, slot.start_time).await {
                    Ok(appointment) => return Ok(SlotOutcome::Found(appointment)),
                    Err(TriageError::Store(StoreError::SlotTaken(_))) => {}
                    Err(error) => return Err(error),
                }
            }
        }
        Ok(SlotOutcome::NoSlot)
    }

    /// Earliest routine appointment inside the wait window that can be moved:
    /// never another emergency, an urgent procedure, or a high-priority
    /// booking.
    async fn bump_candidate(&self, wait_minutes: i64) -> Result<Option<Appointment>, TriageError> {
        let now = self.clock.now();
        let deadline = now + Duration::minutes(wait_minutes);
        let upcoming = self
            .store
            .find(
                &AppointmentQuery::active_for_practitioner(self.availability.practitioner_id())
                    .between(now, deadline),
            )
            .await?;
        Ok(upcoming.into_iter().find(|appointment| {
            !appointment.high_priority
                && !appointment.procedure.is_urgent()
                && appointment.origin != BookingOrigin::Triage
        }))
    }

    async fn notify_bumped(&self, appointment: &Appointment) {
        let patient = match self.patients.find_by_id(appointment.patient_id).await {
            Ok(Some(patient)) => patient,
            Ok(None) => {
                warn!(patient_id = %appointment.patient_id, "bumped patient not found, cannot notify");
                return;
            }
            Err(error) => {
                warn!(error = %error, "patient lookup failed, cannot notify bumped patient");
                return;
            }
        };
        let Some(recipient) = patient.contact() else {
            warn!(patient_id = %patient.id, "bumped patient has no contact channel");
            return;
        };
        let message = format!(
            "Your {} appointment on {} needs to be rescheduled due to a dental emergency. \
             We will contact you shortly with new options.",
            appointment.procedure,
            appointment.start_time.format("%Y-%m-%d at %H:%M"),
        );
        if let Err(error) = self.notifier.notify(recipient, &message).await {
            warn!(error = %error, "reschedule notification failed");
        }
    }

    async fn book(
        &self,
        triage: &TriageResult,
        start: chrono::DateTime<chrono::Utc>,
    ) -> Result<Appointment, TriageError> {
        let now = self.clock.now();
        let duration = self.scheduling_config.emergency_duration_minutes;
        let appointment = Appointment {
            id: Uuid::new_v4(),
            patient_id: triage.patient.id,
            practitioner_id: self.availability.practitioner_id(),
            start_time: start,
            end_time: start + Duration::minutes(duration),
            procedure: ProcedureType::EmergencyExam,
            status: AppointmentStatus::Scheduled,
            origin: BookingOrigin::Triage,
            triage_id: Some(triage.id),
            high_priority: true,
            created_at: now,
            updated_at: now,
        };
        Ok(self.store.create(appointment).await?)
    }

    pub async fn update_status(
        &self,
        triage_id: Uuid,
        status: TriageStatus,
    ) -> Result<TriageResult, TriageError> {
        let mut queue = self.queue.lock().await;
        let index = queue
            .iter()
            .position(|entry| entry.triage.id == triage_id)
            .ok_or(TriageError::NotFound(triage_id))?;
        let current = queue[index].triage.status;
        if !current.can_transition_to(&status) {
            return Err(TriageError::InvalidStatusTransition {
                from: current.to_string(),
                to: status.to_string(),
            });
        }
        queue[index].triage.status = status;
        if status == TriageStatus::Resolved {
            let entry = queue.remove(index);
            self.recompute(&mut queue);
            info!(%triage_id, "triage entry resolved and dequeued");
            return Ok(entry.triage);
        }
        Ok(queue[index].triage.clone())
    }

    pub async fn resolve(&self, triage_id: Uuid) -> Result<TriageResult, TriageError> {
        self.update_status(triage_id, TriageStatus::Resolved).await
    }

    pub async fn queue_status(&self) -> QueueStatus {
        let queue = self.queue.lock().await;
        let by_category = [
            TriageCategory::Critical,
            TriageCategory::Urgent,
            TriageCategory::Moderate,
            TriageCategory::Minor,
        ]
        .iter()
        .map(|category| CategoryCount {
            category: *category,
            count: queue
                .iter()
                .filter(|entry| entry.triage.category == *category)
                .count(),
        })
        .collect();
        let entries = queue
            .iter()
            .map(|entry| QueueEntrySummary {
                triage_id: entry.triage.id,
                patient_name: entry.triage.patient.name.clone(),
                category: entry.triage.category,
                severity_score: entry.triage.severity_score,
                queue_position: entry.triage.queue_position,
                estimated_wait_minutes: entry.triage.estimated_wait_minutes,
                enqueued_at: entry.enqueued_at,
            })
            .collect();
        QueueStatus {
            queue_length: queue.len(),
            by_category,
            entries,
        }
    }

    /// Drops entries that already have an appointment and have sat in the
    /// queue longer than `max_age_minutes`. Returns how many were removed.
    pub async fn evict_stale(&self, max_age_minutes: i64) -> usize {
        let cutoff = self.clock.now() - Duration::minutes(max_age_minutes);
        let mut queue = self.queue.lock().await;
        let before = queue.len();
        queue.retain(|entry| {
            !(entry.triage.status == TriageStatus::SlotFound && entry.enqueued_at < cutoff)
        });
        let removed = before - queue.len();
        if removed > 0 {
            self.recompute(&mut queue);
            info!(removed, "evicted stale triage entries");
        }
        removed
    }

    /// Re-sorts by (priority, arrival) and refreshes positions and wait
    /// estimates. Estimated wait is one emergency-exam length per patient
    /// ahead, capped at twice the category ceiling.
    fn recompute(&self, queue: &mut Vec<EmergencyQueueEntry>) {
        queue.sort_by(|a, b| (a.priority, a.enqueued_at).cmp(&(b.priority, b.enqueued_at)));
        let duration = self.scheduling_config.emergency_duration_minutes;
        for (index, entry) in queue.iter_mut().enumerate() {
            entry.triage.queue_position = index + 1;
            let ahead = index as i64 * duration;
            let cap = 2 * entry.triage.category.max_wait_minutes(&self.triage_config);
            entry.triage.estimated_wait_minutes = ahead.min(cap);
        }
    }

    fn entry_snapshot(
        &self,
        queue: &[EmergencyQueueEntry],
        triage_id: Uuid,
    ) -> Result<TriageResult, TriageError> {
        queue
            .iter()
            .find(|entry| entry.triage.id == triage_id)
            .map(|entry| entry.triage.clone())
            .ok_or(TriageError::NotFound(triage_id))
    }
}
