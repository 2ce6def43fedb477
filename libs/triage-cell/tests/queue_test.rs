use async_trait::async_trait;
use chrono::{DateTime, Duration, NaiveDate, NaiveTime, TimeZone, Utc};
use std::sync::Arc;
use uuid::Uuid;

use assert_matches::assert_matches;
use scheduling_cell::AvailabilityService;
use shared_config::{SchedulingConfig, TriageConfig};
use shared_models::{
    Appointment, AppointmentStatus, BookingOrigin, DayHours, Patient, ProcedureType, WeekSchedule,
};
use shared_store::{
    AppointmentStore, InMemoryAppointmentStore, InMemoryPatientStore, NotificationError,
    NotificationGateway,
};
use shared_utils::FixedClock;
use triage_cell::models::{
    SymptomDuration, SymptomReport, TriageCategory, TriageError, TriageStatus,
};
use triage_cell::services::EmergencyQueueService;

#[derive(Default)]
struct RecordingGateway {
    sent: tokio::sync::Mutex<Vec<(String, String)>>,
}

#[async_trait]
impl NotificationGateway for RecordingGateway {
    async fn notify(&self, recipient: &str, message: &str) -> Result<(), NotificationError> {
        self.sent
            .lock()
            .await
            .push((recipient.to_string(), message.to_string()));
        Ok(())
    }
}

fn monday_nine() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2025, 6, 2, 9, 0, 0).unwrap()
}

struct Harness {
    service: EmergencyQueueService,
    store: Arc<InMemoryAppointmentStore>,
    patients: Arc<InMemoryPatientStore>,
    gateway: Arc<RecordingGateway>,
    clock: Arc<FixedClock>,
    practitioner_id: Uuid,
}

fn harness(schedule: WeekSchedule) -> Harness {
    let store = Arc::new(InMemoryAppointmentStore::new());
    let patients = Arc::new(InMemoryPatientStore::new());
    let gateway = Arc::new(RecordingGateway::default());
    let clock = Arc::new(FixedClock::new(monday_nine()));
    let practitioner_id = Uuid::new_v4();
    let scheduling = SchedulingConfig::default();

    let appointment_store: Arc<dyn AppointmentStore> = store.clone();
    let availability = Arc::new(AvailabilityService::new(
        appointment_store.clone(),
        schedule,
        practitioner_id,
        &scheduling,
    ));
    let service = EmergencyQueueService::new(
        availability,
        appointment_store,
        patients.clone(),
        gateway.clone(),
        clock.clone(),
        TriageConfig::default(),
        scheduling,
    );
    Harness {
        service,
        store,
        patients,
        gateway,
        clock,
        practitioner_id,
    }
}

fn walk_in(name: &str) -> Patient {
    Patient {
        id: Uuid::new_v4(),
        name: name.to_string(),
        phone: Some("555-867-5309".to_string()),
        email: None,
    }
}

fn urgent_report() -> SymptomReport {
    SymptomReport {
        description: "tooth knocked out playing hockey".to_string(),
        pain_level: 8,
        swelling: true,
        duration: Some(SymptomDuration::JustStarted),
        ..Default::default()
    }
}

fn minor_report() -> SymptomReport {
    SymptomReport {
        description: "mild sensitivity to cold".to_string(),
        pain_level: 2,
        ..Default::default()
    }
}

#[tokio::test]
async fn urgent_walk_in_gets_the_reserved_emergency_slot() {
    let harness = harness(WeekSchedule::standard());
    // 9:45: the 10:00 reserved time sits inside the 30 minute urgent ceiling.
    harness.clock.advance(Duration::minutes(45));
    let result = harness
        .service
        .triage_patient(walk_in("Alex Carter"), urgent_report())
        .await
        .expect("triage");

    assert_eq!(result.category, TriageCategory::Urgent);
    assert_eq!(result.queue_position, 1);
    assert_eq!(result.status, TriageStatus::SlotFound);

    let appointment_id = result.appointment_id.expect("booked appointment");
    let appointment = harness.store.get(appointment_id).await.expect("stored");
    assert_eq!(
        appointment.start_time,
        Utc.with_ymd_and_hms(2025, 6, 2, 10, 0, 0).unwrap()
    );
    assert_eq!(appointment.procedure, ProcedureType::EmergencyExam);
    assert_eq!(appointment.origin, BookingOrigin::Triage);
    assert!(appointment.high_priority);
    assert_eq!(appointment.triage_id, Some(result.id));
}

#[tokio::test]
async fn urgent_walk_in_is_seated_inside_the_ceiling_when_reserved_times_are_too_far() {
    // 9:00 against an empty calendar: the 10:00 reserved time would blow the
    // 30 minute urgent ceiling, so the free 9:00 slot wins instead.
    let harness = harness(WeekSchedule::standard());
    let result = harness
        .service
        .triage_patient(walk_in("Morgan Prompt"), urgent_report())
        .await
        .expect("triage");

    assert_eq!(result.status, TriageStatus::SlotFound);
    let appointment = harness
        .store
        .get(result.appointment_id.expect("booked"))
        .await
        .expect("stored");
    assert_eq!(appointment.start_time, monday_nine());
}

#[tokio::test]
async fn urgent_arrivals_jump_ahead_of_minor_ones() {
    let harness = harness(WeekSchedule::standard());
    let minor = harness
        .service
        .triage_patient(walk_in("Casey Minor"), minor_report())
        .await
        .expect("minor triage");
    let urgent = harness
        .service
        .triage_patient(walk_in("Robin Urgent"), urgent_report())
        .await
        .expect("urgent triage");

    assert_eq!(minor.category, TriageCategory::Minor);
    assert_eq!(urgent.queue_position, 1);

    let status = harness.service.queue_status().await;
    assert_eq!(status.queue_length, 2);
    assert_eq!(status.entries[0].category, TriageCategory::Urgent);
    assert_eq!(status.entries[0].estimated_wait_minutes, 0);
    assert_eq!(status.entries[1].category, TriageCategory::Minor);
    // One emergency-exam length behind the urgent patient.
    assert_eq!(status.entries[1].estimated_wait_minutes, 45);
}

#[tokio::test]
async fn urgent_patient_bumps_a_routine_appointment_when_nothing_is_free() {
    // A single 9:00-10:00 window today, fully taken by a routine checkup, and
    // the reserved emergency times fall outside it.
    let mut schedule = WeekSchedule::standard();
    schedule.set_override(
        NaiveDate::from_ymd_opt(2025, 6, 2).unwrap(),
        DayHours::open_hours(
            NaiveTime::from_hms_opt(9, 0, 0).unwrap(),
            NaiveTime::from_hms_opt(10, 0, 0).unwrap(),
        ),
    );
    let harness = harness(schedule);

    let regular = Patient {
        id: Uuid::new_v4(),
        name: "Pat Routine".to_string(),
        phone: Some("555-000-1111".to_string()),
        email: None,
    };
    harness.patients.insert(regular.clone()).await;
    let checkup = Appointment {
        id: Uuid::new_v4(),
        patient_id: regular.id,
        practitioner_id: harness.practitioner_id,
        start_time: monday_nine(),
        end_time: monday_nine() + Duration::minutes(60),
        procedure: ProcedureType::Checkup,
        status: AppointmentStatus::Scheduled,
        origin: BookingOrigin::Staff,
        triage_id: None,
        high_priority: false,
        created_at: monday_nine(),
        updated_at: monday_nine(),
    };
    let checkup_id = checkup.id;
    harness.store.create(checkup).await.expect("seed checkup");

    let result = harness
        .service
        .triage_patient(walk_in("Jamie Emergency"), urgent_report())
        .await
        .expect("triage");

    assert_eq!(result.status, TriageStatus::SlotFound);
    let emergency = harness
        .store
        .get(result.appointment_id.expect("booked"))
        .await
        .expect("stored");
    assert_eq!(emergency.start_time, monday_nine());

    let bumped = harness.store.get(checkup_id).await.expect("still stored");
    assert_eq!(bumped.status, AppointmentStatus::Rescheduled);

    let sent = harness.gateway.sent.lock().await;
    assert_eq!(sent.len(), 1);
    assert_eq!(sent[0].0, "555-000-1111");
    assert!(sent[0].1.contains("rescheduled"));
}

#[tokio::test]
async fn no_open_day_within_the_ceiling_leaves_the_patient_queued() {
    let schedule = WeekSchedule::new(std::array::from_fn(|_| DayHours::closed()));
    let harness = harness(schedule);

    let result = harness
        .service
        .triage_patient(walk_in("Morgan Stuck"), urgent_report())
        .await
        .expect("triage");

    assert_eq!(result.status, TriageStatus::NoSlot);
    assert!(result.appointment_id.is_none());
    assert_eq!(harness.service.queue_status().await.queue_length, 1);
}

#[tokio::test]
async fn life_threatening_report_is_never_auto_booked() {
    let harness = harness(WeekSchedule::standard());
    let report = SymptomReport {
        description: "uncontrolled bleeding after an extraction".to_string(),
        pain_level: 4,
        bleeding: true,
        ..Default::default()
    };
    let result = harness
        .service
        .triage_patient(walk_in("Drew Critical"), report)
        .await
        .expect("triage");

    assert_eq!(result.category, TriageCategory::Critical);
    assert_eq!(result.severity_score, 100);
    assert!(result.life_threatening);
    assert_eq!(result.status, TriageStatus::Queued);
    assert!(result.appointment_id.is_none());
    assert!(result.protocol.iter().any(|step| step.contains("911")));
    assert_eq!(harness.store.len().await, 0);
}

#[tokio::test]
async fn resolving_an_entry_dequeues_and_promotes_the_rest() {
    let harness = harness(WeekSchedule::standard());
    let first = harness
        .service
        .triage_patient(walk_in("First In"), urgent_report())
        .await
        .expect("first");
    let second = harness
        .service
        .triage_patient(walk_in("Second In"), urgent_report())
        .await
        .expect("second");
    assert_eq!(second.queue_position, 2);

    let resolved = harness.service.resolve(first.id).await.expect("resolve");
    assert_eq!(resolved.status, TriageStatus::Resolved);

    let status = harness.service.queue_status().await;
    assert_eq!(status.queue_length, 1);
    assert_eq!(status.entries[0].triage_id, second.id);
    assert_eq!(status.entries[0].queue_position, 1);

    assert_matches!(
        harness.service.resolve(first.id).await,
        Err(TriageError::NotFound(_))
    );
}

#[tokio::test]
async fn slot_found_entries_cannot_return_to_queued() {
    let harness = harness(WeekSchedule::standard());
    let result = harness
        .service
        .triage_patient(walk_in("Settled"), urgent_report())
        .await
        .expect("triage");
    assert_eq!(result.status, TriageStatus::SlotFound);

    assert_matches!(
        harness
            .service
            .update_status(result.id, TriageStatus::Queued)
            .await,
        Err(TriageError::InvalidStatusTransition { .. })
    );
}

#[tokio::test]
async fn eviction_drops_old_booked_entries_but_keeps_unplaced_ones() {
    let harness = harness(WeekSchedule::standard());
    harness
        .service
        .triage_patient(walk_in("Old Booked"), urgent_report())
        .await
        .expect("triage");

    harness.clock.advance(Duration::hours(2));
    assert_eq!(harness.service.evict_stale(60).await, 1);
    assert_eq!(harness.service.queue_status().await.queue_length, 0);
}
