use chrono::{NaiveDate, NaiveTime};
use uuid::Uuid;

use scheduling_cell::models::SchedulingError;
use scheduling_cell::services::SlotGenerator;
use shared_config::SchedulingConfig;
use shared_models::DayHours;

fn t(h: u32, m: u32) -> NaiveTime {
    NaiveTime::from_hms_opt(h, m, 0).unwrap()
}

fn monday() -> NaiveDate {
    NaiveDate::from_ymd_opt(2025, 6, 2).unwrap()
}

fn generator() -> SlotGenerator {
    SlotGenerator::new(&SchedulingConfig::default())
}

#[test]
fn covers_working_window_exactly_at_granularity() {
    let hours = DayHours::open_hours(t(9, 0), t(17, 0)).with_break(t(12, 0), t(13, 0));
    let slots = generator()
        .generate_slots(monday(), &hours, 15, Uuid::new_v4())
        .expect("valid hours");

    // Duration equals the granularity, so the count is exactly
    // (close - open - breaks) / duration: (480 - 60) / 15.
    assert_eq!(slots.len(), 28);
    assert_eq!(slots[0].start_time.time(), t(9, 0));
    assert_eq!(slots.last().unwrap().end_time.time(), t(17, 0));
}

#[test]
fn no_slot_straddles_a_break() {
    let hours = DayHours::open_hours(t(9, 0), t(17, 0)).with_break(t(12, 0), t(13, 0));
    let slots = generator()
        .generate_slots(monday(), &hours, 30, Uuid::new_v4())
        .expect("valid hours");

    for slot in &slots {
        let start = slot.start_time.time();
        let end = slot.end_time.time();
        assert!(
            end <= t(12, 0) || start >= t(13, 0),
            "slot {start}-{end} intersects the lunch break"
        );
    }
    // 9:00..=11:30 starts before lunch, 13:00..=16:30 after.
    assert_eq!(slots.len(), 26);
}

#[test]
fn slots_never_run_past_closing_time() {
    let hours = DayHours::open_hours(t(9, 0), t(10, 0));
    let slots = generator()
        .generate_slots(monday(), &hours, 50, Uuid::new_v4())
        .expect("valid hours");

    assert_eq!(slots.len(), 1);
    assert_eq!(slots[0].start_time.time(), t(9, 0));
}

#[test]
fn closed_day_yields_empty_sequence() {
    let slots = generator()
        .generate_slots(monday(), &DayHours::closed(), 30, Uuid::new_v4())
        .expect("closed day is valid");
    assert!(slots.is_empty());
}

#[test]
fn invalid_hours_are_rejected_with_no_partial_output() {
    let inverted = DayHours::open_hours(t(17, 0), t(9, 0));
    let result = generator().generate_slots(monday(), &inverted, 30, Uuid::new_v4());
    assert!(matches!(
        result,
        Err(SchedulingError::InvalidWorkingHours(_))
    ));

    let bad_break = DayHours::open_hours(t(9, 0), t(17, 0)).with_break(t(8, 0), t(10, 0));
    let result = generator().generate_slots(monday(), &bad_break, 30, Uuid::new_v4());
    assert!(matches!(
        result,
        Err(SchedulingError::InvalidWorkingHours(_))
    ));
}

#[test]
fn same_inputs_same_sequence() {
    let hours = DayHours::open_hours(t(9, 0), t(17, 0)).with_break(t(12, 0), t(13, 0));
    let practitioner_id = Uuid::new_v4();
    let first = generator()
        .generate_slots(monday(), &hours, 30, practitioner_id)
        .expect("valid hours");
    let second = generator()
        .generate_slots(monday(), &hours, 30, practitioner_id)
        .expect("valid hours");
    assert_eq!(first, second);
}
