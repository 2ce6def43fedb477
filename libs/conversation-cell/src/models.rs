use chrono::{DateTime, NaiveDate, NaiveTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fmt;
use uuid::Uuid;

use scheduling_cell::models::{NoShowRisk, SchedulingError};
use shared_models::{Appointment, ProcedureType, Slot};
use shared_store::StoreError;

#[derive(Debug, Clone, thiserror::Error)]
pub enum ConversationError {
    #[error(transparent)]
    Store(#[from] StoreError),

    #[error(transparent)]
    Scheduling(#[from] SchedulingError),
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ConversationStep {
    Greeting,
    GatheringInfo,
    SuggestingSlots,
    Confirming,
    Correcting,
    Completed,
    Escalated,
}

impl ConversationStep {
    pub fn is_terminal(&self) -> bool {
        matches!(self, ConversationStep::Completed | ConversationStep::Escalated)
    }
}

impl fmt::Display for ConversationStep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConversationStep::Greeting => write!(f, "greeting"),
            ConversationStep::GatheringInfo => write!(f, "gathering_info"),
            ConversationStep::SuggestingSlots => write!(f, "suggesting_slots"),
            ConversationStep::Confirming => write!(f, "confirming"),
            ConversationStep::Correcting => write!(f, "correcting"),
            ConversationStep::Completed => write!(f, "completed"),
            ConversationStep::Escalated => write!(f, "escalated"),
        }
    }
}

/// The booking fields the conversation collects, in prompting order.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum BookingField {
    Date,
    Time,
    Procedure,
    Name,
    Contact,
}

impl BookingField {
    pub const ORDERED: [BookingField; 5] = [
        BookingField::Date,
        BookingField::Time,
        BookingField::Procedure,
        BookingField::Name,
        BookingField::Contact,
    ];

    pub fn prompt(&self) -> &'static str {
        match self {
            BookingField::Date => "What day would you like to come in?",
            BookingField::Time => "What time works best for you?",
            BookingField::Procedure => "What kind of visit is this? For example a cleaning, a checkup, or a filling.",
            BookingField::Name => "Can I have your name, please?",
            BookingField::Contact => "What's the best phone number or email to reach you?",
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum RequestedAction {
    Cancel,
    Reschedule,
    Emergency,
}

/// How sure the extractor is about a value. Explicit values may overwrite a
/// previously confirmed field; inferred ones never do.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum Confidence {
    Explicit,
    Inferred,
}

/// Everything a single utterance yielded.
#[derive(Debug, Clone, Default)]
pub struct ExtractedEntities {
    pub date: Option<(NaiveDate, Confidence)>,
    pub time: Option<(NaiveTime, Confidence)>,
    pub procedure: Option<ProcedureType>,
    pub name: Option<String>,
    pub phone: Option<String>,
    pub email: Option<String>,
    pub action: Option<RequestedAction>,
    pub affirmative: bool,
    pub negative: bool,
    /// Zero-based index into previously suggested slots ("the first one").
    pub choice: Option<usize>,
}

impl ExtractedEntities {
    pub fn contact(&self) -> Option<&str> {
        self.phone.as_deref().or(self.email.as_deref())
    }
}

/// Accumulated booking details plus the set of fields the patient has
/// explicitly confirmed. Confirmed fields survive corrections; an explicit
/// restatement overwrites the value and drops the confirmation.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct BookingData {
    pub date: Option<NaiveDate>,
    pub time: Option<NaiveTime>,
    pub procedure: Option<ProcedureType>,
    pub name: Option<String>,
    pub contact: Option<String>,
    pub confirmed: HashSet<BookingField>,
}

impl BookingData {
    pub fn apply(&mut self, entities: &ExtractedEntities) {
        if let Some((date, confidence)) = entities.date {
            if self.overwritable(BookingField::Date, confidence) {
                self.date = Some(date);
            }
        }
        if let Some((time, confidence)) = entities.time {
            if self.overwritable(BookingField::Time, confidence) {
                self.time = Some(time);
            }
        }
        if let Some(procedure) = entities.procedure {
            if self.overwritable(BookingField::Procedure, Confidence::Explicit) {
                self.procedure = Some(procedure);
            }
        }
        if let Some(name) = &entities.name {
            if self.overwritable(BookingField::Name, Confidence::Explicit) {
                self.name = Some(name.clone());
            }
        }
        if let Some(contact) = entities.contact() {
            if self.overwritable(BookingField::Contact, Confidence::Explicit) {
                self.contact = Some(contact.to_string());
            }
        }
    }

    /// A confirmed field blocks inferred updates; an explicit restatement
    /// wins, but the field must then be re-confirmed.
    fn overwritable(&mut self, field: BookingField, confidence: Confidence) -> bool {
        if !self.confirmed.contains(&field) {
            return true;
        }
        if confidence == Confidence::Explicit {
            self.confirmed.remove(&field);
            return true;
        }
        false
    }

    pub fn confirm(&mut self, field: BookingField) {
        self.confirmed.insert(field);
    }

    /// Drops everything the patient has not explicitly confirmed.
    pub fn clear_unconfirmed(&mut self) {
        if !self.confirmed.contains(&BookingField::Date) {
            self.date = None;
        }
        if !self.confirmed.contains(&BookingField::Time) {
            self.time = None;
        }
        if !self.confirmed.contains(&BookingField::Procedure) {
            self.procedure = None;
        }
        if !self.confirmed.contains(&BookingField::Name) {
            self.name = None;
        }
        if !self.confirmed.contains(&BookingField::Contact) {
            self.contact = None;
        }
    }

    pub fn missing_fields(&self) -> Vec<BookingField> {
        BookingField::ORDERED
            .iter()
            .copied()
            .filter(|field| match field {
                BookingField::Date => self.date.is_none(),
                BookingField::Time => self.time.is_none(),
                BookingField::Procedure => self.procedure.is_none(),
                BookingField::Name => self.name.is_none(),
                BookingField::Contact => self.contact.is_none(),
            })
            .collect()
    }

    pub fn has_slot(&self) -> bool {
        self.date.is_some() && self.time.is_some()
    }

    pub fn has_identity(&self) -> bool {
        self.name.is_some() && self.contact.is_some()
    }
}

/// A slot the engine has verified as free and is waiting for the patient to
/// confirm.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PendingAppointment {
    pub start_time: DateTime<Utc>,
    pub duration_minutes: i64,
    pub procedure: ProcedureType,
    pub emergency: bool,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum Speaker {
    Patient,
    Assistant,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Turn {
    pub speaker: Speaker,
    pub text: String,
    pub at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum EscalationReason {
    Frustration,
    RepeatedErrors,
    EmergencyUnplaceable,
    NoKnownAppointment,
}

/// Per-conversation working memory. Lives in the conversation store keyed by
/// session id and is garbage-collected after the idle timeout.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConversationState {
    pub id: String,
    pub patient_id: Uuid,
    pub step: ConversationStep,
    pub data: BookingData,
    pub history: Vec<Turn>,
    pub pending: Option<PendingAppointment>,
    pub suggested: Vec<Slot>,
    /// Consecutive turns spent on the same step.
    pub attempts: u32,
    /// Dependency failures in this conversation.
    pub error_count: u32,
    pub booked_appointment_id: Option<Uuid>,
    pub created_at: DateTime<Utc>,
    pub last_active: DateTime<Utc>,
}

impl ConversationState {
    pub fn new(id: impl Into<String>, patient_id: Uuid, now: DateTime<Utc>) -> Self {
        Self {
            id: id.into(),
            patient_id,
            step: ConversationStep::Greeting,
            data: BookingData::default(),
            history: Vec::new(),
            pending: None,
            suggested: Vec::new(),
            attempts: 0,
            error_count: 0,
            booked_appointment_id: None,
            created_at: now,
            last_active: now,
        }
    }

    pub fn record(&mut self, speaker: Speaker, text: impl Into<String>, at: DateTime<Utc>) {
        self.history.push(Turn {
            speaker,
            text: text.into(),
            at,
        });
    }

    /// Ready for another booking after a completed one; the committed
    /// appointment id is kept so "cancel that" still works.
    pub fn begin_new_booking(&mut self) {
        self.step = ConversationStep::Greeting;
        self.data = BookingData::default();
        self.pending = None;
        self.suggested.clear();
        self.attempts = 0;
    }
}

/// Caller-supplied context for one turn: who is talking (when the channel
/// already knows) and which chair to book against.
#[derive(Debug, Clone)]
pub struct TurnContext {
    pub patient_id: Option<Uuid>,
}

impl Default for TurnContext {
    fn default() -> Self {
        Self { patient_id: None }
    }
}

/// Everything the channel needs to respond to the patient after one turn.
#[derive(Debug, Clone)]
pub struct TurnResponse {
    pub reply: String,
    pub step: ConversationStep,
    pub appointment_booked: bool,
    pub appointment: Option<Appointment>,
    pub alternatives: Vec<Slot>,
    pub needs_human_help: bool,
    pub escalation_reason: Option<EscalationReason>,
    pub is_emergency: bool,
    pub no_show_risk: Option<NoShowRisk>,
}

impl TurnResponse {
    pub fn reply(text: impl Into<String>, step: ConversationStep) -> Self {
        Self {
            reply: text.into(),
            step,
            appointment_booked: false,
            appointment: None,
            alternatives: Vec::new(),
            needs_human_help: false,
            escalation_reason: None,
            is_emergency: false,
            no_show_risk: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_fields_follow_prompting_order() {
        let mut data = BookingData::default();
        assert_eq!(data.missing_fields(), BookingField::ORDERED.to_vec());

        data.time = Some(NaiveTime::from_hms_opt(10, 0, 0).unwrap());
        data.name = Some("Jane Doe".to_string());
        assert_eq!(
            data.missing_fields(),
            vec![BookingField::Date, BookingField::Procedure, BookingField::Contact]
        );
    }

    #[test]
    fn inferred_values_never_touch_confirmed_fields() {
        let mut data = BookingData::default();
        let confirmed_date = NaiveDate::from_ymd_opt(2025, 6, 3).unwrap();
        data.date = Some(confirmed_date);
        data.confirm(BookingField::Date);

        let mut entities = ExtractedEntities::default();
        entities.date = Some((
            NaiveDate::from_ymd_opt(2025, 6, 4).unwrap(),
            Confidence::Inferred,
        ));
        data.apply(&entities);
        assert_eq!(data.date, Some(confirmed_date));

        entities.date = Some((
            NaiveDate::from_ymd_opt(2025, 6, 4).unwrap(),
            Confidence::Explicit,
        ));
        data.apply(&entities);
        assert_eq!(data.date, NaiveDate::from_ymd_opt(2025, 6, 4));
        assert!(!data.confirmed.contains(&BookingField::Date));
    }

    #[test]
    fn clearing_unconfirmed_spares_confirmed_fields() {
        let mut data = BookingData::default();
        data.date = Some(NaiveDate::from_ymd_opt(2025, 6, 3).unwrap());
        data.name = Some("Jane Doe".to_string());
        data.confirm(BookingField::Name);

        data.clear_unconfirmed();
        assert!(data.date.is_none());
        assert_eq!(data.name.as_deref(), Some("Jane Doe"));
    }
}
