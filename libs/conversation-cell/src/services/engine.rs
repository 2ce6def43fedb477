use chrono::Duration;
use std::sync::Arc;
use tracing::{info, warn};
use uuid::Uuid;

use scheduling_cell::models::RiskTier;
use scheduling_cell::services::{AvailabilityService, NoShowRiskService};
use shared_config::{ConversationConfig, EngineConfig, SchedulingConfig};
use shared_models::{Appointment, AppointmentStatus, BookingOrigin, ProcedureType, Slot};
use shared_store::{AppointmentStore, PatientStore, ReplyProvider, StoreError};
use shared_utils::Clock;

use crate::models::{
    BookingField, ConversationError, ConversationState, ConversationStep, EscalationReason,
    ExtractedEntities, PendingAppointment, RequestedAction, Speaker, TurnContext, TurnResponse,
};
use crate::services::extraction::ExtractionService;
use crate::services::replies::ReplyRenderer;
use crate::services::signals;
use crate::services::state::ConversationStore;

/// Multi-turn booking conversation. Each turn runs the same pipeline:
/// correction check, entity extraction, merge into the session's booking
/// data, frustration check, then one decision — handle an explicit action,
/// resolve a pending or suggested slot, verify-and-book, or ask for the next
/// missing detail.
///
/// Dependency failures never reach the patient as errors; they count against
/// the session and hand off to a human after the configured limit.
pub struct ConversationEngine {
    conversations: ConversationStore,
    extractor: ExtractionService,
    replies: ReplyRenderer,
    availability: Arc<AvailabilityService>,
    appointments: Arc<dyn AppointmentStore>,
    patients: Arc<dyn PatientStore>,
    risk: NoShowRiskService,
    clock: Arc<dyn Clock>,
    config: ConversationConfig,
    scheduling: SchedulingConfig,
}

impl ConversationEngine {
    pub fn new(
        availability: Arc<AvailabilityService>,
        appointments: Arc<dyn AppointmentStore>,
        patients: Arc<dyn PatientStore>,
        clock: Arc<dyn Clock>,
        config: &EngineConfig,
        provider: Option<Arc<dyn ReplyProvider>>,
    ) -> Self {
        Self {
            conversations: ConversationStore::new(clock.clone()),
            extractor: ExtractionService::new(),
            replies: ReplyRenderer::new(provider),
            availability,
            appointments,
            patients,
            risk: NoShowRiskService::new(config.no_show.clone(), clock.clone()),
            clock,
            config: config.conversation.clone(),
            scheduling: config.scheduling.clone(),
        }
    }

    pub async fn handle_utterance(
        &self,
        session_id: &str,
        utterance: &str,
        context: &TurnContext,
    ) -> TurnResponse {
        let now = self.clock.now();
        let mut state = self
            .conversations
            .get_or_create(session_id, context.patient_id)
            .await;

        // A finished booking does not block the next one; the committed
        // appointment id survives for cancel/reschedule requests.
        if state.step == ConversationStep::Completed {
            state.begin_new_booking();
        }

        let previous_step = state.step;
        state.record(Speaker::Patient, utterance, now);
        state.last_active = now;

        // A correction throws away everything the patient has not explicitly
        // confirmed; this turn's extraction then refills from scratch.
        if signals::is_correction(utterance) && !state.step.is_terminal() {
            state.step = ConversationStep::Correcting;
            state.data.clear_unconfirmed();
        }

        let entities = self.extractor.extract(utterance, now.date_naive());
        state.data.apply(&entities);

        let frustrated =
            signals::is_frustrated(utterance) || state.attempts > self.config.stuck_attempts;

        let mut response = if state.step == ConversationStep::Escalated {
            let mut response =
                TurnResponse::reply(self.replies.handoff(), ConversationStep::Escalated);
            response.needs_human_help = true;
            response
        } else if frustrated {
            info!(
                session = session_id,
                attempts = state.attempts,
                "escalating frustrated conversation"
            );
            state.step = ConversationStep::Escalated;
            let mut response =
                TurnResponse::reply(self.replies.handoff(), ConversationStep::Escalated);
            response.needs_human_help = true;
            response.escalation_reason = Some(EscalationReason::Frustration);
            response
        } else {
            self.decide(&mut state, &entities).await
        };

        if state.step == previous_step && !state.step.is_terminal() {
            state.attempts += 1;
        } else {
            state.attempts = 0;
        }

        response.step = state.step;
        response.reply = self.replies.render(utterance, response.reply).await;
        state.record(Speaker::Assistant, response.reply.clone(), now);
        self.conversations.save(state).await;
        self.conversations
            .evict_idle(self.config.idle_timeout_minutes)
            .await;
        response
    }

    /// Drops the session entirely, as if the patient had never called.
    pub async fn reset_conversation(&self, session_id: &str) -> bool {
        self.conversations.reset(session_id).await
    }

    pub async fn active_conversations(&self) -> usize {
        self.conversations.len().await
    }

    async fn decide(
        &self,
        state: &mut ConversationState,
        entities: &ExtractedEntities,
    ) -> TurnResponse {
        match entities.action {
            Some(RequestedAction::Cancel) => return self.cancel(state).await,
            Some(RequestedAction::Reschedule) => return self.reschedule(state, entities).await,
            Some(RequestedAction::Emergency) => return self.emergency(state).await,
            None => {}
        }

        // Fresh scheduling details invalidate anything held for confirmation.
        if entities.date.is_some() || entities.time.is_some() {
            state.pending = None;
        }

        if state.pending.is_some() {
            return self.resolve_pending(state, entities).await;
        }

        if !state.suggested.is_empty() {
            if let Some(response) = self.resolve_suggestion(state, entities).await {
                return response;
            }
        }

        if state.data.has_slot() {
            return self.check_and_book(state).await;
        }

        self.gather(state)
    }

    /// A slot is on hold; either the patient confirms it, declines it, or
    /// still owes us identity details.
    async fn resolve_pending(
        &self,
        state: &mut ConversationState,
        entities: &ExtractedEntities,
    ) -> TurnResponse {
        let Some(pending) = state.pending.clone() else {
            return self.gather(state);
        };
        if entities.negative {
            state.pending = None;
            state.step = ConversationStep::GatheringInfo;
            return TurnResponse::reply(
                "No problem, we won't book that. What day and time would suit you better?",
                state.step,
            );
        }

        if !state.data.has_identity() {
            let field = if state.data.name.is_none() {
                BookingField::Name
            } else {
                BookingField::Contact
            };
            state.step = ConversationStep::Confirming;
            return TurnResponse::reply(self.replies.ask(field), state.step);
        }

        let supplied_details = entities.name.is_some() || entities.contact().is_some();
        if entities.affirmative || supplied_details {
            return self.commit(state).await;
        }

        state.step = ConversationStep::Confirming;
        TurnResponse::reply(self.replies.confirm_slot(&pending), state.step)
    }

    /// Alternatives are on the table; a choice or a plain "yes" picks one, a
    /// "no" clears them.
    async fn resolve_suggestion(
        &self,
        state: &mut ConversationState,
        entities: &ExtractedEntities,
    ) -> Option<TurnResponse> {
        if entities.negative {
            state.suggested.clear();
            state.step = ConversationStep::GatheringInfo;
            return Some(TurnResponse::reply(
                "Okay. Is there another day or time that would work for you?",
                state.step,
            ));
        }
        let picked = match entities.choice {
            Some(index) => state.suggested.get(index).cloned(),
            None if entities.affirmative => state.suggested.first().cloned(),
            None => None,
        };
        let slot = picked?;
        self.adopt_slot(state, &slot);
        Some(self.check_and_book(state).await)
    }

    fn adopt_slot(&self, state: &mut ConversationState, slot: &Slot) {
        state.data.date = Some(slot.start_time.date_naive());
        state.data.time = Some(slot.start_time.time());
        state.data.confirmed.remove(&BookingField::Date);
        state.data.confirmed.remove(&BookingField::Time);
        state.suggested.clear();
    }

    /// Date and time are known: verify the exact slot, then either commit
    /// (all details in hand), hold it while we collect identity, or offer
    /// the closest alternatives.
    async fn check_and_book(&self, state: &mut ConversationState) -> TurnResponse {
        let (Some(date), Some(time)) = (state.data.date, state.data.time) else {
            return self.gather(state);
        };
        let start = date.and_time(time).and_utc();
        let now = self.clock.now();
        if start <= now {
            state.data.date = None;
            state.data.time = None;
            state.step = ConversationStep::GatheringInfo;
            return TurnResponse::reply(
                "That time has already passed. What day works for you?",
                state.step,
            );
        }

        let duration = state
            .data
            .procedure
            .map(|procedure| procedure.duration_minutes())
            .unwrap_or(self.scheduling.default_duration_minutes);

        let check = match self
            .availability
            .check_availability(start, duration, Some(state.patient_id))
            .await
        {
            Ok(check) => check,
            Err(error) => return self.failure(state, error.into()),
        };

        if !check.available {
            let reason = check
                .reason
                .unwrap_or_else(|| "that time isn't available".to_string());
            return self.suggest_alternatives(state, start, duration, &reason).await;
        }

        state.data.confirm(BookingField::Date);
        state.data.confirm(BookingField::Time);
        state.suggested.clear();
        let pending = PendingAppointment {
            start_time: start,
            duration_minutes: duration,
            procedure: state.data.procedure.unwrap_or(ProcedureType::Checkup),
            emergency: false,
        };
        state.pending = Some(pending.clone());

        if state.data.has_identity() {
            return self.commit(state).await;
        }

        let field = if state.data.name.is_none() {
            BookingField::Name
        } else {
            BookingField::Contact
        };
        state.step = ConversationStep::Confirming;
        TurnResponse::reply(
            format!(
                "{} {}",
                self.replies.confirm_slot(&pending),
                self.replies.ask(field)
            ),
            state.step,
        )
    }

    /// Writes the held appointment to the store. This is the only place a
    /// booking is committed, and the pending slot is consumed on success, so
    /// a repeated "yes" can never book twice.
    async fn commit(&self, state: &mut ConversationState) -> TurnResponse {
        let Some(pending) = state.pending.clone() else {
            return self.gather(state);
        };
        let now = self.clock.now();
        let appointment = Appointment {
            id: Uuid::new_v4(),
            patient_id: state.patient_id,
            practitioner_id: self.availability.practitioner_id(),
            start_time: pending.start_time,
            end_time: pending.start_time + Duration::minutes(pending.duration_minutes),
            procedure: pending.procedure,
            status: AppointmentStatus::Scheduled,
            origin: BookingOrigin::Conversation,
            triage_id: None,
            high_priority: pending.emergency,
            created_at: now,
            updated_at: now,
        };

        match self.appointments.create(appointment).await {
            Ok(appointment) => {
                state.booked_appointment_id = Some(appointment.id);
                state.pending = None;
                state.step = ConversationStep::Completed;

                let risk = match self.patients.find_history(state.patient_id).await {
                    Ok(history) => Some(self.risk.assess(&history, appointment.start_time)),
                    Err(error) => {
                        warn!(error = %error, "history lookup failed, skipping no-show score");
                        None
                    }
                };
                if let Some(risk) = &risk {
                    if risk.tier == RiskTier::High {
                        info!(
                            appointment_id = %appointment.id,
                            score = risk.score,
                            "high no-show risk, flagging for a confirmation call"
                        );
                    }
                }

                let reply = if pending.emergency {
                    self.replies.emergency_booked(&appointment)
                } else {
                    self.replies.booked(&appointment)
                };
                let mut response = TurnResponse::reply(reply, ConversationStep::Completed);
                response.appointment_booked = true;
                response.appointment = Some(appointment);
                response.is_emergency = pending.emergency;
                response.no_show_risk = risk;
                response
            }
            Err(StoreError::SlotTaken(_)) => {
                // Lost the race between check and create.
                state.pending = None;
                state.data.confirmed.remove(&BookingField::Date);
                state.data.confirmed.remove(&BookingField::Time);
                self.suggest_alternatives(
                    state,
                    pending.start_time,
                    pending.duration_minutes,
                    "that slot was just taken",
                )
                .await
            }
            Err(error) => self.failure(state, error.into()),
        }
    }

    async fn suggest_alternatives(
        &self,
        state: &mut ConversationState,
        from: chrono::DateTime<chrono::Utc>,
        duration_minutes: i64,
        reason: &str,
    ) -> TurnResponse {
        let slots = match self
            .availability
            .find_next_available_slots(from, duration_minutes, self.config.alternatives_count)
            .await
        {
            Ok(slots) => slots,
            Err(error) => return self.failure(state, error.into()),
        };

        if slots.is_empty() {
            state.suggested.clear();
            state.step = ConversationStep::GatheringInfo;
            return TurnResponse::reply(self.replies.nothing_available(), state.step);
        }

        state.suggested = slots.clone();
        state.step = ConversationStep::SuggestingSlots;
        let mut response = TurnResponse::reply(
            self.replies.offer_alternatives(reason, &slots),
            state.step,
        );
        response.alternatives = slots;
        response
    }

    async fn cancel(&self, state: &mut ConversationState) -> TurnResponse {
        let Some(appointment_id) = state.booked_appointment_id else {
            return self.escalate(state, EscalationReason::NoKnownAppointment);
        };
        match self
            .appointments
            .update_status(
                appointment_id,
                AppointmentStatus::Cancelled,
                Some("patient requested cancellation in conversation"),
            )
            .await
        {
            Ok(appointment) => {
                state.booked_appointment_id = None;
                state.step = ConversationStep::Completed;
                TurnResponse::reply(self.replies.cancelled(&appointment), state.step)
            }
            Err(error) => self.failure(state, error.into()),
        }
    }

    async fn reschedule(
        &self,
        state: &mut ConversationState,
        entities: &ExtractedEntities,
    ) -> TurnResponse {
        let Some(appointment_id) = state.booked_appointment_id else {
            return self.escalate(state, EscalationReason::NoKnownAppointment);
        };
        if let Err(error) = self
            .appointments
            .update_status(
                appointment_id,
                AppointmentStatus::Rescheduled,
                Some("patient asked for a new time"),
            )
            .await
        {
            return self.failure(state, error.into());
        }
        state.booked_appointment_id = None;
        state.pending = None;
        state.suggested.clear();

        // Keep identity; drop only the slot details the patient did not
        // restate in this same turn.
        if entities.date.is_none() {
            state.data.date = None;
            state.data.confirmed.remove(&BookingField::Date);
        }
        if entities.time.is_none() {
            state.data.time = None;
            state.data.confirmed.remove(&BookingField::Time);
        }

        if state.data.has_slot() {
            return self.check_and_book(state).await;
        }
        state.step = ConversationStep::GatheringInfo;
        TurnResponse::reply(
            "Of course. What new day and time would you like?",
            state.step,
        )
    }

    /// Emergency keywords shortcut the normal flow: find the earliest slot
    /// today or tomorrow for an emergency exam, or hand off immediately.
    async fn emergency(&self, state: &mut ConversationState) -> TurnResponse {
        let now = self.clock.now();
        let duration = self.scheduling.emergency_duration_minutes;
        let cutoff = (now.date_naive() + Duration::days(2))
            .and_hms_opt(0, 0, 0)
            .map(|t| t.and_utc());

        let slots = match self
            .availability
            .find_next_available_slots(now, duration, 1)
            .await
        {
            Ok(slots) => slots,
            Err(error) => {
                let mut response = self.failure(state, error.into());
                response.is_emergency = true;
                return response;
            }
        };
        let same_day = slots
            .into_iter()
            .find(|slot| cutoff.map(|c| slot.start_time < c).unwrap_or(false));

        let Some(slot) = same_day else {
            let mut response = self.escalate(state, EscalationReason::EmergencyUnplaceable);
            response.reply = self.replies.emergency_unplaceable();
            response.is_emergency = true;
            return response;
        };

        state.data.procedure = Some(ProcedureType::EmergencyExam);
        state.pending = Some(PendingAppointment {
            start_time: slot.start_time,
            duration_minutes: duration,
            procedure: ProcedureType::EmergencyExam,
            emergency: true,
        });

        if state.data.has_identity() {
            return self.commit(state).await;
        }
        state.step = ConversationStep::GatheringInfo;
        let mut response = TurnResponse::reply(self.replies.emergency_identity(), state.step);
        response.is_emergency = true;
        response
    }

    /// Asks for the first missing booking detail; brand-new sessions get the
    /// greeting instead.
    fn gather(&self, state: &mut ConversationState) -> TurnResponse {
        let missing = state.data.missing_fields();
        if state.step == ConversationStep::Greeting && missing.len() == BookingField::ORDERED.len()
        {
            state.step = ConversationStep::GatheringInfo;
            return TurnResponse::reply(self.replies.greeting(), state.step);
        }
        state.step = ConversationStep::GatheringInfo;
        match missing.first() {
            Some(field) => TurnResponse::reply(self.replies.ask(*field), state.step),
            // Date and time present would have routed to check_and_book.
            None => TurnResponse::reply(self.replies.greeting(), state.step),
        }
    }

    fn escalate(
        &self,
        state: &mut ConversationState,
        reason: EscalationReason,
    ) -> TurnResponse {
        state.step = ConversationStep::Escalated;
        let mut response = TurnResponse::reply(self.replies.handoff(), state.step);
        response.needs_human_help = true;
        response.escalation_reason = Some(reason);
        response
    }

    fn failure(
        &self,
        state: &mut ConversationState,
        error: ConversationError,
    ) -> TurnResponse {
        state.error_count += 1;
        warn!(
            error = %error,
            errors = state.error_count,
            "dependency failure during conversation turn"
        );
        if state.error_count >= self.config.max_attempts {
            return self.escalate(state, EscalationReason::RepeatedErrors);
        }
        TurnResponse::reply(
            "Sorry, something went wrong on my end. Could you try that once more?",
            state.step,
        )
    }
}
