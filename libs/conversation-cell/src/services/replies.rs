use chrono::{DateTime, Utc};
use std::sync::Arc;
use tracing::warn;

use shared_models::{Appointment, Slot};
use shared_store::ReplyProvider;

use crate::models::{BookingField, PendingAppointment};

/// Drafts every outgoing reply from fixed templates. When a free-text
/// provider is wired in, the draft is handed to it for rephrasing; any
/// provider failure falls back to the draft, so the engine always answers.
pub struct ReplyRenderer {
    provider: Option<Arc<dyn ReplyProvider>>,
}

impl ReplyRenderer {
    pub fn new(provider: Option<Arc<dyn ReplyProvider>>) -> Self {
        Self { provider }
    }

    pub async fn render(&self, utterance: &str, draft: String) -> String {
        let Some(provider) = &self.provider else {
            return draft;
        };
        match provider.render_reply(utterance, &draft).await {
            Ok(rendered) => rendered,
            Err(error) => {
                warn!(error = %error, "reply provider failed, using draft");
                draft
            }
        }
    }

    pub fn greeting(&self) -> String {
        "Hi! I can help you book, reschedule, or cancel a dental appointment. \
         What can I do for you?"
            .to_string()
    }

    pub fn ask(&self, field: BookingField) -> String {
        field.prompt().to_string()
    }

    pub fn confirm_slot(&self, pending: &PendingAppointment) -> String {
        format!(
            "I can book a {} on {}. Shall I go ahead?",
            pending.procedure,
            format_moment(pending.start_time),
        )
    }

    pub fn booked(&self, appointment: &Appointment) -> String {
        format!(
            "You're all set: {} on {}. See you then!",
            appointment.procedure,
            format_moment(appointment.start_time),
        )
    }

    pub fn offer_alternatives(&self, requested_reason: &str, slots: &[Slot]) -> String {
        let options = slots
            .iter()
            .map(|slot| format_moment(slot.start_time))
            .collect::<Vec<_>>()
            .join(" or ");
        format!(
            "I'm sorry, {}. The closest I have is {}. Would either of those work?",
            requested_reason, options,
        )
    }

    pub fn nothing_available(&self) -> String {
        "I'm sorry, I couldn't find anything close to that in the next two weeks. \
         Is there another day that could work?"
            .to_string()
    }

    pub fn cancelled(&self, appointment: &Appointment) -> String {
        format!(
            "Your {} on {} has been cancelled.",
            appointment.procedure,
            format_moment(appointment.start_time),
        )
    }

    pub fn handoff(&self) -> String {
        "I'm sorry for the trouble. Let me connect you with a member of our team \
         who can sort this out."
            .to_string()
    }

    pub fn emergency_booked(&self, appointment: &Appointment) -> String {
        format!(
            "That sounds urgent, so I've set aside an emergency exam on {}. \
             If your symptoms get worse before then, please call us right away.",
            format_moment(appointment.start_time),
        )
    }

    pub fn emergency_identity(&self) -> String {
        "That sounds urgent. I can hold an emergency exam for you; \
         can I have your name and a phone number?"
            .to_string()
    }

    pub fn emergency_unplaceable(&self) -> String {
        "That sounds urgent and I couldn't find a same-day opening. \
         Please call the office directly so our team can fit you in."
            .to_string()
    }
}

/// "Monday, June 9 at 9:00 AM".
pub fn format_moment(at: DateTime<Utc>) -> String {
    at.format("%A, %B %-d at %-I:%M %p").to_string()
}
