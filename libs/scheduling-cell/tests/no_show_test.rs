use chrono::{DateTime, Duration, TimeZone, Utc};
use std::sync::Arc;
use uuid::Uuid;

use scheduling_cell::models::RiskTier;
use scheduling_cell::services::NoShowRiskService;
use shared_config::NoShowConfig;
use shared_models::{Appointment, AppointmentStatus, BookingOrigin, ProcedureType};
use shared_utils::FixedClock;

fn booking_time() -> DateTime<Utc> {
    // A Monday morning.
    Utc.with_ymd_and_hms(2025, 6, 2, 9, 0, 0).unwrap()
}

fn scorer() -> NoShowRiskService {
    NoShowRiskService::new(
        NoShowConfig::default(),
        Arc::new(FixedClock::new(booking_time())),
    )
}

fn visit(weeks_ago: i64, status: AppointmentStatus) -> Appointment {
    let start = booking_time() - Duration::weeks(weeks_ago);
    Appointment {
        id: Uuid::new_v4(),
        patient_id: Uuid::new_v4(),
        practitioner_id: Uuid::new_v4(),
        start_time: start,
        end_time: start + Duration::minutes(30),
        procedure: ProcedureType::Checkup,
        status,
        origin: BookingOrigin::Staff,
        triage_id: None,
        high_priority: false,
        created_at: start,
        updated_at: start,
    }
}

#[test]
fn fresh_patient_midweek_short_lead_is_low() {
    // 10am Wednesday, two days ahead, no history.
    let slot = Utc.with_ymd_and_hms(2025, 6, 4, 10, 0, 0).unwrap();
    let risk = scorer().assess(&[], slot);
    assert_eq!(risk.score, 0);
    assert_eq!(risk.tier, RiskTier::Low);
}

#[test]
fn repeat_no_show_late_friday_long_lead_is_high() {
    // 3 of the last 5 visits were no-shows; 5pm Friday slot 45 days out.
    let history = vec![
        visit(1, AppointmentStatus::NoShow),
        visit(2, AppointmentStatus::Completed),
        visit(3, AppointmentStatus::NoShow),
        visit(4, AppointmentStatus::Completed),
        visit(5, AppointmentStatus::NoShow),
    ];
    let slot = Utc.with_ymd_and_hms(2025, 7, 18, 17, 0, 0).unwrap();
    let risk = scorer().assess(&history, slot);

    // 3/5 * 50 + 3 * 10 + 10 (after 16:00) + 5 (Friday) + 15 (lead > 30d).
    assert_eq!(risk.score, 90);
    assert_eq!(risk.tier, RiskTier::High);
}

#[test]
fn only_recent_window_gets_the_extra_weight() {
    // Six old completed visits push the no-shows out of the recent window.
    let mut history: Vec<Appointment> = (1..=6)
        .map(|weeks| visit(weeks, AppointmentStatus::Completed))
        .collect();
    history.push(visit(30, AppointmentStatus::NoShow));
    history.push(visit(40, AppointmentStatus::NoShow));

    let slot = Utc.with_ymd_and_hms(2025, 6, 4, 10, 0, 0).unwrap();
    let risk = scorer().assess(&history, slot);

    // Ratio contribution only: 2/8 * 50 = 12.5, rounds to 13.
    assert_eq!(risk.score, 13);
    assert_eq!(risk.tier, RiskTier::Low);
}

#[test]
fn sixteen_hundred_sharp_is_not_off_hours() {
    let at_cutoff = Utc.with_ymd_and_hms(2025, 6, 4, 16, 0, 0).unwrap();
    let past_cutoff = Utc.with_ymd_and_hms(2025, 6, 4, 16, 30, 0).unwrap();
    assert_eq!(scorer().assess(&[], at_cutoff).score, 0);
    assert_eq!(scorer().assess(&[], past_cutoff).score, 10);
}

#[test]
fn score_is_clamped_to_one_hundred() {
    let history: Vec<Appointment> = (1..=5)
        .map(|weeks| visit(weeks, AppointmentStatus::NoShow))
        .collect();
    // Friday 7am, 45 days out: 50 + 50 + 10 + 5 + 15 caps at 100.
    let slot = Utc.with_ymd_and_hms(2025, 7, 18, 7, 0, 0).unwrap();
    let risk = scorer().assess(&history, slot);
    assert_eq!(risk.score, 100);
    assert_eq!(risk.tier, RiskTier::High);
}
