use chrono::{Datelike, Duration, NaiveDate, NaiveTime, Weekday};
use regex::Regex;
use tracing::debug;

use shared_models::ProcedureType;

use crate::models::{Confidence, ExtractedEntities, RequestedAction};

/// Words that start phrases like "I'm looking for" and must never be taken
/// for a name.
const NAME_STOPLIST: &[&str] = &[
    "a", "an", "the", "and", "but", "looking", "calling", "trying", "having", "hoping",
    "wondering", "here", "just", "not", "so", "really", "very", "sorry", "sure", "available",
    "free", "good", "fine", "ok", "okay", "in", "pain", "frustrated", "confused", "interested",
    "going", "getting", "afraid", "hurting",
];

/// Rule-based entity extraction over a single utterance. Every rule is a
/// compiled regex; there is no statistical model anywhere in this path, so
/// behavior is fully deterministic and testable.
pub struct ExtractionService {
    time_meridiem: Regex,
    time_at: Regex,
    today: Regex,
    tomorrow: Regex,
    date_numeric: Regex,
    date_month: Regex,
    weekday: Regex,
    name: Regex,
    phone: Regex,
    email: Regex,
    choice_ordinal: Regex,
    choice_option: Regex,
    emergency: Regex,
    cancel: Regex,
    reschedule: Regex,
    affirmative: Regex,
    negative: Regex,
}

fn rule(pattern: &str) -> Regex {
    // Patterns are compile-time constants; a failure here is a programming
    // error, not an input error.
    Regex::new(pattern).expect("extraction pattern compiles")
}

impl ExtractionService {
    pub fn new() -> Self {
        Self {
            time_meridiem: rule(r"(?i)\b(\d{1,2})(?::(\d{2}))?\s*([ap])\.?m\.?\b"),
            time_at: rule(r"(?i)\bat\s+(\d{1,2})(?::(\d{2}))?\b"),
            today: rule(r"(?i)\btoday\b"),
            tomorrow: rule(r"(?i)\btomorrow\b"),
            date_numeric: rule(r"\b(\d{1,2})/(\d{1,2})(?:/(\d{2,4}))?\b"),
            date_month: rule(
                r"(?i)\b(january|february|march|april|may|june|july|august|september|october|november|december)\s+(\d{1,2})(?:st|nd|rd|th)?\b",
            ),
            weekday: rule(
                r"(?i)\b(?:(not)\s+)?(?:next\s+)?(monday|tuesday|wednesday|thursday|friday|saturday|sunday)\b",
            ),
            name: rule(
                r"(?i)\b(?:my name is|i am|i'm|this is)\s+([A-Za-z][A-Za-z'\-]*(?:\s+[A-Za-z][A-Za-z'\-]*){0,2})",
            ),
            phone: rule(r"\(?\d{3}\)?[-.\s]?\d{3}[-.\s]?\d{4}\b"),
            email: rule(r"[A-Za-z0-9._%+\-]+@[A-Za-z0-9.\-]+\.[A-Za-z]{2,}"),
            choice_ordinal: rule(r"(?i)\b(first|second|third)\b"),
            choice_option: rule(r"(?i)\boption\s+([123])\b"),
            emergency: rule(
                r"(?i)\b(emergency|severe pain|unbearable|excruciating|agony|knocked out|bleeding|swollen|swelling|broken tooth|broke my tooth|cracked tooth)\b",
            ),
            cancel: rule(r"(?i)\bcancel\b"),
            reschedule: rule(r"(?i)\b(reschedule|move my appointment|change my appointment)\b"),
            affirmative: rule(
                r"(?i)\b(yes|yeah|yep|yup|sure|confirm|correct|sounds good|that works|works for me|perfect|book it|let'?s do it|ok(ay)?)\b",
            ),
            negative: rule(
                r"(?i)\b(no|nope|nah|neither|none of (those|these)|doesn'?t work|can'?t (do|make)|won'?t work|something else)\b",
            ),
        }
    }

    pub fn extract(&self, utterance: &str, today: NaiveDate) -> ExtractedEntities {
        let mut entities = ExtractedEntities::default();

        entities.date = self.extract_date(utterance, today);
        entities.time = self.extract_time(utterance);
        entities.procedure = ProcedureType::match_keyword(utterance);
        entities.name = self.extract_name(utterance);
        entities.phone = self
            .phone
            .find(utterance)
            .map(|found| found.as_str().to_string());
        entities.email = self
            .email
            .find(utterance)
            .map(|found| found.as_str().to_string());
        entities.action = self.extract_action(utterance);
        entities.affirmative = self.affirmative.is_match(utterance);
        entities.negative = self.negative.is_match(utterance);
        entities.choice = self.extract_choice(utterance);

        debug!(
            date = ?entities.date,
            time = ?entities.time,
            action = ?entities.action,
            "extracted entities"
        );
        entities
    }

    fn extract_action(&self, utterance: &str) -> Option<RequestedAction> {
        if self.cancel.is_match(utterance) {
            Some(RequestedAction::Cancel)
        } else if self.reschedule.is_match(utterance) {
            Some(RequestedAction::Reschedule)
        } else if self.emergency.is_match(utterance) {
            Some(RequestedAction::Emergency)
        } else {
            None
        }
    }

    fn extract_date(&self, utterance: &str, today: NaiveDate) -> Option<(NaiveDate, Confidence)> {
        if let Some(captures) = self.date_numeric.captures(utterance) {
            let month: u32 = captures.get(1)?.as_str().parse().ok()?;
            let day: u32 = captures.get(2)?.as_str().parse().ok()?;
            let year = match captures.get(3) {
                Some(raw) => {
                    let parsed: i32 = raw.as_str().parse().ok()?;
                    if parsed < 100 {
                        parsed + 2000
                    } else {
                        parsed
                    }
                }
                None => today.year(),
            };
            if let Some(date) = NaiveDate::from_ymd_opt(year, month, day) {
                // A bare month/day that already passed means next year.
                let date = if captures.get(3).is_none() && date < today {
                    NaiveDate::from_ymd_opt(year + 1, month, day)?
                } else {
                    date
                };
                return Some((date, Confidence::Explicit));
            }
        }

        if let Some(captures) = self.date_month.captures(utterance) {
            let month = month_number(&captures.get(1)?.as_str().to_lowercase())?;
            let day: u32 = captures.get(2)?.as_str().parse().ok()?;
            if let Some(date) = NaiveDate::from_ymd_opt(today.year(), month, day) {
                let date = if date < today {
                    NaiveDate::from_ymd_opt(today.year() + 1, month, day)?
                } else {
                    date
                };
                return Some((date, Confidence::Explicit));
            }
        }

        if self.today.is_match(utterance) {
            return Some((today, Confidence::Explicit));
        }
        if self.tomorrow.is_match(utterance) {
            return Some((today + Duration::days(1), Confidence::Explicit));
        }

        // First weekday mention not negated by "not" ("not Tuesday,
        // Wednesday" picks Wednesday).
        for captures in self.weekday.captures_iter(utterance) {
            if captures.get(1).is_some() {
                continue;
            }
            let target = weekday_from_name(&captures.get(2)?.as_str().to_lowercase())?;
            return Some((next_weekday(today, target), Confidence::Explicit));
        }
        None
    }

    fn extract_time(&self, utterance: &str) -> Option<(NaiveTime, Confidence)> {
        if let Some(captures) = self.time_meridiem.captures(utterance) {
            let hour: u32 = captures.get(1)?.as_str().parse().ok()?;
            let minute: u32 = captures
                .get(2)
                .and_then(|m| m.as_str().parse().ok())
                .unwrap_or(0);
            let meridiem = captures.get(3)?.as_str().to_lowercase();
            let hour = match (meridiem.as_str(), hour) {
                ("a", 12) => 0,
                ("a", h) => h,
                ("p", 12) => 12,
                ("p", h) => h + 12,
                _ => return None,
            };
            return NaiveTime::from_hms_opt(hour, minute, 0).map(|t| (t, Confidence::Explicit));
        }

        if let Some(captures) = self.time_at.captures(utterance) {
            let hour: u32 = captures.get(1)?.as_str().parse().ok()?;
            let minute: u32 = captures
                .get(2)
                .and_then(|m| m.as_str().parse().ok())
                .unwrap_or(0);
            // Bare "at 3" reads as mid-afternoon; the office closes before
            // any plausible 3am booking.
            let hour = if hour <= 7 { hour + 12 } else { hour };
            if hour < 24 {
                return NaiveTime::from_hms_opt(hour, minute, 0)
                    .map(|t| (t, Confidence::Explicit));
            }
        }

        let lower = utterance.to_lowercase();
        if lower.contains("noon") {
            return NaiveTime::from_hms_opt(12, 0, 0).map(|t| (t, Confidence::Explicit));
        }
        if lower.contains("morning") {
            return NaiveTime::from_hms_opt(9, 0, 0).map(|t| (t, Confidence::Inferred));
        }
        if lower.contains("afternoon") {
            return NaiveTime::from_hms_opt(14, 0, 0).map(|t| (t, Confidence::Inferred));
        }
        if lower.contains("evening") {
            return NaiveTime::from_hms_opt(17, 0, 0).map(|t| (t, Confidence::Inferred));
        }
        None
    }

    fn extract_name(&self, utterance: &str) -> Option<String> {
        let captures = self.name.captures(utterance)?;
        let raw = captures.get(1)?.as_str();
        let mut words: Vec<&str> = Vec::new();
        for word in raw.split_whitespace() {
            if NAME_STOPLIST.contains(&word.to_lowercase().as_str()) {
                break;
            }
            words.push(word);
        }
        if words.is_empty() {
            return None;
        }
        Some(words.join(" "))
    }

    fn extract_choice(&self, utterance: &str) -> Option<usize> {
        if let Some(captures) = self.choice_option.captures(utterance) {
            let n: usize = captures.get(1)?.as_str().parse().ok()?;
            return Some(n - 1);
        }
        let captures = self.choice_ordinal.captures(utterance)?;
        match captures.get(1)?.as_str().to_lowercase().as_str() {
            "first" => Some(0),
            "second" => Some(1),
            "third" => Some(2),
            _ => None,
        }
    }
}

impl Default for ExtractionService {
    fn default() -> Self {
        Self::new()
    }
}

fn month_number(name: &str) -> Option<u32> {
    match name {
        "january" => Some(1),
        "february" => Some(2),
        "march" => Some(3),
        "april" => Some(4),
        "may" => Some(5),
        "june" => Some(6),
        "july" => Some(7),
        "august" => Some(8),
        "september" => Some(9),
        "october" => Some(10),
        "november" => Some(11),
        "december" => Some(12),
        _ => None,
    }
}

fn weekday_from_name(name: &str) -> Option<Weekday> {
    match name {
        "monday" => Some(Weekday::Mon),
        "tuesday" => Some(Weekday::Tue),
        "wednesday" => Some(Weekday::Wed),
        "thursday" => Some(Weekday::Thu),
        "friday" => Some(Weekday::Fri),
        "saturday" => Some(Weekday::Sat),
        "sunday" => Some(Weekday::Sun),
        _ => None,
    }
}

/// The next occurrence of `target` strictly after `today`.
fn next_weekday(today: NaiveDate, target: Weekday) -> NaiveDate {
    let ahead = (target.num_days_from_monday() + 7 - today.weekday().num_days_from_monday()) % 7;
    let ahead = if ahead == 0 { 7 } else { ahead };
    today + Duration::days(ahead as i64)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn monday() -> NaiveDate {
        NaiveDate::from_ymd_opt(2025, 6, 2).unwrap()
    }

    fn extract(utterance: &str) -> ExtractedEntities {
        ExtractionService::new().extract(utterance, monday())
    }

    #[test]
    fn parses_meridiem_times() {
        assert_eq!(
            extract("how about 10am").time,
            NaiveTime::from_hms_opt(10, 0, 0).map(|t| (t, Confidence::Explicit))
        );
        assert_eq!(
            extract("2:30 pm works").time,
            NaiveTime::from_hms_opt(14, 30, 0).map(|t| (t, Confidence::Explicit))
        );
        assert_eq!(
            extract("12am if you have it").time,
            NaiveTime::from_hms_opt(0, 0, 0).map(|t| (t, Confidence::Explicit))
        );
    }

    #[test]
    fn bare_small_hours_read_as_afternoon() {
        assert_eq!(
            extract("can I come in at 3").time,
            NaiveTime::from_hms_opt(15, 0, 0).map(|t| (t, Confidence::Explicit))
        );
        assert_eq!(
            extract("at 11 maybe").time,
            NaiveTime::from_hms_opt(11, 0, 0).map(|t| (t, Confidence::Explicit))
        );
    }

    #[test]
    fn dayparts_are_inferred_not_explicit() {
        assert_eq!(
            extract("sometime in the morning").time,
            NaiveTime::from_hms_opt(9, 0, 0).map(|t| (t, Confidence::Inferred))
        );
        assert_eq!(
            extract("around noon").time,
            NaiveTime::from_hms_opt(12, 0, 0).map(|t| (t, Confidence::Explicit))
        );
    }

    #[test]
    fn weekday_resolves_to_next_occurrence() {
        // Asked on Monday 2025-06-02.
        assert_eq!(
            extract("tuesday would be great").date,
            NaiveDate::from_ymd_opt(2025, 6, 3).map(|d| (d, Confidence::Explicit))
        );
        // Same weekday as today rolls a full week forward.
        assert_eq!(
            extract("next monday").date,
            NaiveDate::from_ymd_opt(2025, 6, 9).map(|d| (d, Confidence::Explicit))
        );
    }

    #[test]
    fn negated_weekday_is_skipped() {
        assert_eq!(
            extract("actually not tuesday, wednesday would be better").date,
            NaiveDate::from_ymd_opt(2025, 6, 4).map(|d| (d, Confidence::Explicit))
        );
    }

    #[test]
    fn numeric_dates_roll_to_next_year_when_past() {
        assert_eq!(
            extract("book me for 6/20").date,
            NaiveDate::from_ymd_opt(2025, 6, 20).map(|d| (d, Confidence::Explicit))
        );
        assert_eq!(
            extract("book me for 1/15").date,
            NaiveDate::from_ymd_opt(2026, 1, 15).map(|d| (d, Confidence::Explicit))
        );
    }

    #[test]
    fn month_name_dates_parse() {
        assert_eq!(
            extract("june 20th please").date,
            NaiveDate::from_ymd_opt(2025, 6, 20).map(|d| (d, Confidence::Explicit))
        );
    }

    #[test]
    fn names_come_from_introduction_phrases_only() {
        assert_eq!(extract("I'm Jane Doe").name.as_deref(), Some("Jane Doe"));
        assert_eq!(
            extract("my name is Sam O'Brien and I need a filling")
                .name
                .as_deref(),
            Some("Sam O'Brien")
        );
        assert_eq!(extract("I'm looking for an appointment").name, None);
        assert_eq!(extract("I'm frustrated").name, None);
    }

    #[test]
    fn contact_details_are_found_anywhere() {
        let entities = extract("reach me at 555-123-4567 or jane@example.com");
        assert_eq!(entities.phone.as_deref(), Some("555-123-4567"));
        assert_eq!(entities.email.as_deref(), Some("jane@example.com"));
        assert_eq!(entities.contact(), Some("555-123-4567"));
    }

    #[test]
    fn actions_rank_cancel_over_emergency() {
        assert_eq!(
            extract("I need to cancel my appointment").action,
            Some(RequestedAction::Cancel)
        );
        assert_eq!(
            extract("can we reschedule").action,
            Some(RequestedAction::Reschedule)
        );
        assert_eq!(
            extract("I'm in severe pain").action,
            Some(RequestedAction::Emergency)
        );
    }

    #[test]
    fn affirmative_negative_and_choice_cues() {
        assert!(extract("yes, that works").affirmative);
        assert!(extract("nope, neither of those").negative);
        assert_eq!(extract("the second one please").choice, Some(1));
        assert_eq!(extract("option 1").choice, Some(0));
    }
}
