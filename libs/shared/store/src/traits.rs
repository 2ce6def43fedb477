use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use shared_models::{Appointment, AppointmentStatus, Patient};

use crate::error::{NotificationError, ProviderError, StoreError};

/// Filter for appointment lookups. All fields are optional and combined
/// conjunctively; `active_only` keeps scheduled/confirmed/in-progress rows.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppointmentQuery {
    pub practitioner_id: Option<Uuid>,
    pub patient_id: Option<Uuid>,
    pub from: Option<DateTime<Utc>>,
    pub to: Option<DateTime<Utc>>,
    pub active_only: bool,
}

impl AppointmentQuery {
    pub fn active_for_practitioner(practitioner_id: Uuid) -> Self {
        Self {
            practitioner_id: Some(practitioner_id),
            active_only: true,
            ..Self::default()
        }
    }

    pub fn active_for_patient(patient_id: Uuid) -> Self {
        Self {
            patient_id: Some(patient_id),
            active_only: true,
            ..Self::default()
        }
    }

    pub fn between(mut self, from: DateTime<Utc>, to: DateTime<Utc>) -> Self {
        self.from = Some(from);
        self.to = Some(to);
        self
    }
}

/// The authoritative appointment store. It owns persistence and enforces one
/// uniqueness constraint per (practitioner, start-time) to back up in-process
/// conflict checks.
#[async_trait]
pub trait AppointmentStore: Send + Sync {
    /// Appointments matching the query, ordered by start time ascending.
    async fn find(&self, query: &AppointmentQuery) -> Result<Vec<Appointment>, StoreError>;

    async fn create(&self, appointment: Appointment) -> Result<Appointment, StoreError>;

    /// Appointments are never deleted; cancellation and rescheduling are
    /// status transitions (audit requirement).
    async fn update_status(
        &self,
        id: Uuid,
        status: AppointmentStatus,
        reason: Option<&str>,
    ) -> Result<Appointment, StoreError>;
}

#[async_trait]
pub trait PatientStore: Send + Sync {
    async fn find_by_id(&self, id: Uuid) -> Result<Option<Patient>, StoreError>;

    /// Past appointments for no-show scoring, ordered by start time ascending.
    async fn find_history(&self, patient_id: Uuid) -> Result<Vec<Appointment>, StoreError>;
}

/// Fire-and-forget outbound messaging. Failures are logged by callers, never
/// propagated into user-facing flows.
#[async_trait]
pub trait NotificationGateway: Send + Sync {
    async fn notify(&self, recipient: &str, message: &str) -> Result<(), NotificationError>;
}

/// Optional natural-language surface: rephrases a drafted reply given the
/// user's utterance. The engine always works without one.
#[async_trait]
pub trait ReplyProvider: Send + Sync {
    async fn render_reply(&self, utterance: &str, draft: &str) -> Result<String, ProviderError>;
}
