use async_trait::async_trait;
use chrono::Utc;
use std::collections::HashMap;
use tokio::sync::RwLock;
use tracing::{debug, info};
use uuid::Uuid;

use shared_models::{Appointment, AppointmentStatus, Patient};

use crate::error::{NotificationError, StoreError};
use crate::traits::{AppointmentQuery, AppointmentStore, NotificationGateway, PatientStore};

/// In-memory appointment store. Enforces the same (practitioner, start-time)
/// uniqueness constraint a real store would, so booking races surface as
/// `SlotTaken` here too.
#[derive(Debug, Default)]
pub struct InMemoryAppointmentStore {
    records: RwLock<HashMap<Uuid, Appointment>>,
}

impl InMemoryAppointmentStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn len(&self) -> usize {
        self.records.read().await.len()
    }

    pub async fn get(&self, id: Uuid) -> Option<Appointment> {
        self.records.read().await.get(&id).cloned()
    }
}

fn matches(query: &AppointmentQuery, appointment: &Appointment) -> bool {
    if let Some(practitioner_id) = query.practitioner_id {
        if appointment.practitioner_id != practitioner_id {
            return false;
        }
    }
    if let Some(patient_id) = query.patient_id {
        if appointment.patient_id != patient_id {
            return false;
        }
    }
    if let Some(from) = query.from {
        if appointment.end_time <= from {
            return false;
        }
    }
    if let Some(to) = query.to {
        if appointment.start_time >= to {
            return false;
        }
    }
    if query.active_only && !appointment.is_active() {
        return false;
    }
    true
}

#[async_trait]
impl AppointmentStore for InMemoryAppointmentStore {
    async fn find(&self, query: &AppointmentQuery) -> Result<Vec<Appointment>, StoreError> {
        let records = self.records.read().await;
        let mut found: Vec<Appointment> = records
            .values()
            .filter(|appointment| matches(query, appointment))
            .cloned()
            .collect();
        found.sort_by_key(|appointment| appointment.start_time);
        Ok(found)
    }

    async fn create(&self, appointment: Appointment) -> Result<Appointment, StoreError> {
        let mut records = self.records.write().await;
        let taken = records.values().any(|existing| {
            existing.practitioner_id == appointment.practitioner_id
                && existing.start_time == appointment.start_time
                && existing.is_active()
        });
        if taken {
            return Err(StoreError::SlotTaken(appointment.start_time));
        }
        debug!(
            "Created appointment {} for patient {} at {}",
            appointment.id, appointment.patient_id, appointment.start_time
        );
        records.insert(appointment.id, appointment.clone());
        Ok(appointment)
    }

    async fn update_status(
        &self,
        id: Uuid,
        status: AppointmentStatus,
        reason: Option<&str>,
    ) -> Result<Appointment, StoreError> {
        let mut records = self.records.write().await;
        let appointment = records.get_mut(&id).ok_or(StoreError::NotFound)?;
        if !appointment.status.can_transition_to(&status) {
            return Err(StoreError::InvalidStatusTransition {
                from: appointment.status.to_string(),
                to: status.to_string(),
            });
        }
        debug!(
            "Appointment {} transitioned {} -> {} ({})",
            id,
            appointment.status,
            status,
            reason.unwrap_or("no reason given")
        );
        appointment.status = status;
        appointment.updated_at = Utc::now();
        Ok(appointment.clone())
    }
}

/// In-memory patient registry with a separately fed visit history.
#[derive(Debug, Default)]
pub struct InMemoryPatientStore {
    patients: RwLock<HashMap<Uuid, Patient>>,
    history: RwLock<HashMap<Uuid, Vec<Appointment>>>,
}

impl InMemoryPatientStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn insert(&self, patient: Patient) {
        self.patients.write().await.insert(patient.id, patient);
    }

    pub async fn push_history(&self, patient_id: Uuid, appointment: Appointment) {
        self.history
            .write()
            .await
            .entry(patient_id)
            .or_default()
            .push(appointment);
    }
}

#[async_trait]
impl PatientStore for InMemoryPatientStore {
    async fn find_by_id(&self, id: Uuid) -> Result<Option<Patient>, StoreError> {
        Ok(self.patients.read().await.get(&id).cloned())
    }

    async fn find_history(&self, patient_id: Uuid) -> Result<Vec<Appointment>, StoreError> {
        let mut visits = self
            .history
            .read()
            .await
            .get(&patient_id)
            .cloned()
            .unwrap_or_default();
        visits.sort_by_key(|appointment| appointment.start_time);
        Ok(visits)
    }
}

/// Default gateway: logs the message instead of delivering it. Real SMS/email
/// transports live outside the engine.
#[derive(Debug, Default)]
pub struct LoggingNotificationGateway;

#[async_trait]
impl NotificationGateway for LoggingNotificationGateway {
    async fn notify(&self, recipient: &str, message: &str) -> Result<(), NotificationError> {
        info!("Notification to {}: {}", recipient, message);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;
    use chrono::{Duration, TimeZone};
    use shared_models::{BookingOrigin, ProcedureType};

    fn appointment(practitioner_id: Uuid, start_offset_hours: i64) -> Appointment {
        let start = Utc.with_ymd_and_hms(2025, 6, 2, 9, 0, 0).unwrap()
            + Duration::hours(start_offset_hours);
        Appointment {
            id: Uuid::new_v4(),
            patient_id: Uuid::new_v4(),
            practitioner_id,
            start_time: start,
            end_time: start + Duration::minutes(30),
            procedure: ProcedureType::Checkup,
            status: AppointmentStatus::Scheduled,
            origin: BookingOrigin::Staff,
            triage_id: None,
            high_priority: false,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    #[tokio::test]
    async fn create_enforces_practitioner_start_uniqueness() {
        let store = InMemoryAppointmentStore::new();
        let practitioner_id = Uuid::new_v4();
        let first = appointment(practitioner_id, 0);
        let mut second = appointment(practitioner_id, 0);
        second.start_time = first.start_time;
        second.end_time = first.end_time;

        store.create(first).await.expect("first booking");
        assert_matches!(
            store.create(second).await,
            Err(StoreError::SlotTaken(_))
        );
    }

    #[tokio::test]
    async fn cancelled_slot_can_be_rebooked() {
        let store = InMemoryAppointmentStore::new();
        let practitioner_id = Uuid::new_v4();
        let first = appointment(practitioner_id, 0);
        let first_id = first.id;
        let mut second = appointment(practitioner_id, 0);
        second.start_time = first.start_time;
        second.end_time = first.end_time;

        store.create(first).await.expect("first booking");
        store
            .update_status(first_id, AppointmentStatus::Cancelled, Some("patient call"))
            .await
            .expect("cancel");
        store.create(second).await.expect("rebooking freed slot");
    }

    #[tokio::test]
    async fn update_status_rejects_invalid_transition() {
        let store = InMemoryAppointmentStore::new();
        let record = appointment(Uuid::new_v4(), 0);
        let id = record.id;
        store.create(record).await.expect("create");
        store
            .update_status(id, AppointmentStatus::Completed, None)
            .await
            .expect_err("scheduled cannot jump to completed");
    }

    #[tokio::test]
    async fn find_filters_by_range_and_activity() {
        let store = InMemoryAppointmentStore::new();
        let practitioner_id = Uuid::new_v4();
        let early = appointment(practitioner_id, 0);
        let late = appointment(practitioner_id, 30);
        let cancelled_id = early.id;
        let window_start = early.start_time - Duration::hours(1);
        let window_end = early.start_time + Duration::hours(2);

        store.create(early).await.expect("create early");
        store.create(late).await.expect("create late");

        let query =
            AppointmentQuery::active_for_practitioner(practitioner_id).between(window_start, window_end);
        assert_eq!(store.find(&query).await.expect("find").len(), 1);

        store
            .update_status(cancelled_id, AppointmentStatus::Cancelled, None)
            .await
            .expect("cancel");
        assert!(store.find(&query).await.expect("find").is_empty());
    }
}
