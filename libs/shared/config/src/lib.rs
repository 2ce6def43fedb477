//! Engine configuration. Every hand-tuned weight and threshold from the
//! scheduling, no-show, triage and conversation components lives here as a
//! plain field with a default, so the numbers can be recalibrated against
//! real outcome data without touching the services that apply them.

use chrono::NaiveTime;
use serde::{Deserialize, Serialize};
use std::env;
use tracing::warn;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EngineConfig {
    pub scheduling: SchedulingConfig,
    pub no_show: NoShowConfig,
    pub triage: TriageConfig,
    pub conversation: ConversationConfig,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            scheduling: SchedulingConfig::default(),
            no_show: NoShowConfig::default(),
            triage: TriageConfig::default(),
            conversation: ConversationConfig::default(),
        }
    }
}

impl EngineConfig {
    /// Defaults with the operationally interesting knobs overridable from the
    /// environment. Unparseable values are warned about and ignored.
    pub fn from_env() -> Self {
        let mut config = Self::default();
        if let Some(days) = read_env_i64("SCHEDULER_LOOKAHEAD_DAYS") {
            config.scheduling.lookahead_days = days;
        }
        if let Some(minutes) = read_env_i64("SCHEDULER_BUFFER_MINUTES") {
            config.scheduling.buffer_minutes = minutes;
        }
        if let Some(minutes) = read_env_i64("CONVERSATION_IDLE_TIMEOUT_MINUTES") {
            config.conversation.idle_timeout_minutes = minutes;
        }
        config
    }
}

fn read_env_i64(key: &str) -> Option<i64> {
    match env::var(key) {
        Ok(raw) => match raw.parse::<i64>() {
            Ok(value) => Some(value),
            Err(_) => {
                warn!("{} is not a number, ignoring: {:?}", key, raw);
                None
            }
        },
        Err(_) => None,
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SchedulingConfig {
    /// Step between candidate slot start times.
    pub granularity_minutes: i64,
    /// Sanitation/turnover gap appended to every existing appointment before
    /// overlap testing.
    pub buffer_minutes: i64,
    /// How many days forward the alternatives search scans.
    pub lookahead_days: i64,
    /// Duration used when the procedure type is unknown.
    pub default_duration_minutes: i64,
    /// Duration reserved for emergency walk-ins.
    pub emergency_duration_minutes: i64,
}

impl Default for SchedulingConfig {
    fn default() -> Self {
        Self {
            granularity_minutes: 15,
            buffer_minutes: 15,
            lookahead_days: 14,
            default_duration_minutes: 30,
            emergency_duration_minutes: 45,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NoShowConfig {
    /// Historical no-show ratio is scaled to [0, history_scale].
    pub history_scale: f64,
    /// Added per no-show among the most recent visits.
    pub recent_no_show_weight: u8,
    /// Size of the recent-visit window.
    pub recent_window: usize,
    /// Added for slots before `early_cutoff` or after `late_cutoff`.
    pub off_hours_weight: u8,
    pub early_cutoff: NaiveTime,
    pub late_cutoff: NaiveTime,
    /// Added for Monday or Friday slots.
    pub edge_day_weight: u8,
    /// Added when lead time exceeds `long_lead_days`.
    pub long_lead_weight: u8,
    pub long_lead_days: i64,
    pub high_threshold: u8,
    pub medium_threshold: u8,
}

impl Default for NoShowConfig {
    fn default() -> Self {
        Self {
            history_scale: 50.0,
            recent_no_show_weight: 10,
            recent_window: 5,
            off_hours_weight: 10,
            early_cutoff: NaiveTime::from_hms_opt(9, 0, 0).unwrap(),
            late_cutoff: NaiveTime::from_hms_opt(16, 0, 0).unwrap(),
            edge_day_weight: 5,
            long_lead_weight: 15,
            long_lead_days: 30,
            high_threshold: 50,
            medium_threshold: 25,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct KeywordBonus {
    pub phrase: String,
    pub points: u8,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TriageConfig {
    pub pain_multiplier: u8,
    pub swelling_weight: u8,
    pub bleeding_weight: u8,
    pub fever_weight: u8,
    pub cannot_eat_weight: u8,
    pub sleep_disrupted_weight: u8,
    pub medication_ineffective_weight: u8,
    /// Fresh trauma: symptoms that just started.
    pub just_started_weight: u8,
    /// Possible untreated infection: symptoms present three days or more.
    pub prolonged_weight: u8,
    /// Free-text phrases that add points on top of the structured rubric.
    pub keyword_bonuses: Vec<KeywordBonus>,
    /// Score thresholds for the non-critical categories.
    pub urgent_threshold: u8,
    pub moderate_threshold: u8,
    /// Maximum acceptable wait per category, in minutes.
    pub critical_max_wait_minutes: i64,
    pub urgent_max_wait_minutes: i64,
    pub moderate_max_wait_minutes: i64,
    pub minor_max_wait_minutes: i64,
    /// Daily reserved emergency capacity, as clock times kept free for
    /// triage bookings.
    pub reserved_slot_times: Vec<NaiveTime>,
}

impl Default for TriageConfig {
    fn default() -> Self {
        Self {
            pain_multiplier: 3,
            swelling_weight: 15,
            bleeding_weight: 20,
            fever_weight: 12,
            cannot_eat_weight: 8,
            sleep_disrupted_weight: 7,
            medication_ineffective_weight: 5,
            just_started_weight: 5,
            prolonged_weight: 10,
            keyword_bonuses: vec![
                KeywordBonus {
                    phrase: "severe pain".to_string(),
                    points: 35,
                },
                KeywordBonus {
                    phrase: "knocked out".to_string(),
                    points: 30,
                },
                KeywordBonus {
                    phrase: "abscess".to_string(),
                    points: 25,
                },
                KeywordBonus {
                    phrase: "fracture".to_string(),
                    points: 25,
                },
            ],
            urgent_threshold: 70,
            moderate_threshold: 40,
            critical_max_wait_minutes: 0,
            urgent_max_wait_minutes: 30,
            moderate_max_wait_minutes: 120,
            minor_max_wait_minutes: 1440,
            reserved_slot_times: vec![
                NaiveTime::from_hms_opt(10, 0, 0).unwrap(),
                NaiveTime::from_hms_opt(14, 0, 0).unwrap(),
            ],
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConversationConfig {
    /// Conversations idle longer than this are garbage-collected.
    pub idle_timeout_minutes: i64,
    /// Dependency failures tolerated before handing off to a human.
    pub max_attempts: u32,
    /// Turns stuck on the same step before frustration escalation.
    pub stuck_attempts: u32,
    /// How many alternative slots to offer when a request is unavailable.
    pub alternatives_count: usize,
}

impl Default for ConversationConfig {
    fn default() -> Self {
        Self {
            idle_timeout_minutes: 30,
            max_attempts: 3,
            stuck_attempts: 5,
            alternatives_count: 2,
        }
    }
}
