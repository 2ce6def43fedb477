use chrono::{Datelike, NaiveDate, NaiveTime, Weekday};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use thiserror::Error;

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ScheduleValidationError {
    #[error("opening time {open} is not before closing time {close}")]
    OpenNotBeforeClose { open: NaiveTime, close: NaiveTime },

    #[error("break {start}-{end} falls outside working hours")]
    BreakOutsideHours { start: NaiveTime, end: NaiveTime },

    #[error("break {start}-{end} is empty or inverted")]
    InvalidBreak { start: NaiveTime, end: NaiveTime },

    #[error("breaks overlap at {at}")]
    OverlappingBreaks { at: NaiveTime },
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct BreakInterval {
    pub start: NaiveTime,
    pub end: NaiveTime,
}

/// Working hours for a single day: open/close plus zero or more breaks.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DayHours {
    pub open: NaiveTime,
    pub close: NaiveTime,
    pub breaks: Vec<BreakInterval>,
    /// Holiday or regular day off; open/close are ignored when set.
    pub closed: bool,
}

impl DayHours {
    pub fn open_hours(open: NaiveTime, close: NaiveTime) -> Self {
        Self {
            open,
            close,
            breaks: Vec::new(),
            closed: false,
        }
    }

    pub fn closed() -> Self {
        Self {
            open: NaiveTime::MIN,
            close: NaiveTime::MIN,
            breaks: Vec::new(),
            closed: true,
        }
    }

    pub fn with_break(mut self, start: NaiveTime, end: NaiveTime) -> Self {
        self.breaks.push(BreakInterval { start, end });
        self
    }

    /// Invariants: open < close; breaks non-empty, disjoint, and contained
    /// within [open, close). A closed day is vacuously valid.
    pub fn validate(&self) -> Result<(), ScheduleValidationError> {
        if self.closed {
            return Ok(());
        }
        if self.open >= self.close {
            return Err(ScheduleValidationError::OpenNotBeforeClose {
                open: self.open,
                close: self.close,
            });
        }
        let mut sorted = self.breaks.clone();
        sorted.sort_by_key(|b| b.start);
        let mut previous_end: Option<NaiveTime> = None;
        for interval in &sorted {
            if interval.start >= interval.end {
                return Err(ScheduleValidationError::InvalidBreak {
                    start: interval.start,
                    end: interval.end,
                });
            }
            if interval.start < self.open || interval.end > self.close {
                return Err(ScheduleValidationError::BreakOutsideHours {
                    start: interval.start,
                    end: interval.end,
                });
            }
            if let Some(end) = previous_end {
                if interval.start < end {
                    return Err(ScheduleValidationError::OverlappingBreaks {
                        at: interval.start,
                    });
                }
            }
            previous_end = Some(interval.end);
        }
        Ok(())
    }
}

/// Recurring weekly hours plus one-off per-date overrides (special hours or
/// holidays). Overrides always win over the recurring day.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WeekSchedule {
    days: [DayHours; 7],
    overrides: HashMap<NaiveDate, DayHours>,
}

impl WeekSchedule {
    pub fn new(days: [DayHours; 7]) -> Self {
        Self {
            days,
            overrides: HashMap::new(),
        }
    }

    /// Standard dental-office week: weekdays 9-17 with a lunch break,
    /// Saturday mornings, closed Sunday.
    pub fn standard() -> Self {
        let lunch_start = NaiveTime::from_hms_opt(12, 0, 0).unwrap();
        let lunch_end = NaiveTime::from_hms_opt(13, 0, 0).unwrap();
        let weekday = DayHours::open_hours(
            NaiveTime::from_hms_opt(9, 0, 0).unwrap(),
            NaiveTime::from_hms_opt(17, 0, 0).unwrap(),
        )
        .with_break(lunch_start, lunch_end);
        let saturday = DayHours::open_hours(
            NaiveTime::from_hms_opt(9, 0, 0).unwrap(),
            NaiveTime::from_hms_opt(13, 0, 0).unwrap(),
        );
        Self::new([
            weekday.clone(),
            weekday.clone(),
            weekday.clone(),
            weekday.clone(),
            weekday,
            saturday,
            DayHours::closed(),
        ])
    }

    pub fn set_override(&mut self, date: NaiveDate, hours: DayHours) {
        self.overrides.insert(date, hours);
    }

    pub fn set_holiday(&mut self, date: NaiveDate) {
        self.overrides.insert(date, DayHours::closed());
    }

    pub fn hours_for(&self, date: NaiveDate) -> &DayHours {
        if let Some(special) = self.overrides.get(&date) {
            return special;
        }
        &self.days[weekday_index(date.weekday())]
    }
}

fn weekday_index(weekday: Weekday) -> usize {
    weekday.num_days_from_monday() as usize
}
