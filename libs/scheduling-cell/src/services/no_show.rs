use chrono::{DateTime, Datelike, Utc, Weekday};
use std::sync::Arc;
use tracing::debug;

use shared_config::NoShowConfig;
use shared_models::{Appointment, AppointmentStatus};
use shared_utils::Clock;

use crate::models::{NoShowRisk, RiskTier};

/// Additive no-show risk scoring over a patient's visit history and the
/// candidate slot's time-of-day, day-of-week and lead time. Advisory only.
pub struct NoShowRiskService {
    config: NoShowConfig,
    clock: Arc<dyn Clock>,
}

impl NoShowRiskService {
    pub fn new(config: NoShowConfig, clock: Arc<dyn Clock>) -> Self {
        Self { config, clock }
    }

    pub fn assess(&self, history: &[Appointment], slot_start: DateTime<Utc>) -> NoShowRisk {
        let mut score = 0.0_f64;

        let total = history.len();
        if total > 0 {
            let no_shows = history
                .iter()
                .filter(|visit| visit.status == AppointmentStatus::NoShow)
                .count();
            score += no_shows as f64 / total as f64 * self.config.history_scale;
        }

        // Most recent visits weigh extra.
        let mut recent: Vec<&Appointment> = history.iter().collect();
        recent.sort_by_key(|visit| std::cmp::Reverse(visit.start_time));
        let recent_no_shows = recent
            .iter()
            .take(self.config.recent_window)
            .filter(|visit| visit.status == AppointmentStatus::NoShow)
            .count();
        score += recent_no_shows as f64 * f64::from(self.config.recent_no_show_weight);

        let slot_time = slot_start.time();
        if slot_time < self.config.early_cutoff || slot_time > self.config.late_cutoff {
            score += f64::from(self.config.off_hours_weight);
        }

        if matches!(slot_start.weekday(), Weekday::Mon | Weekday::Fri) {
            score += f64::from(self.config.edge_day_weight);
        }

        let lead_days = (slot_start - self.clock.now()).num_days();
        if lead_days > self.config.long_lead_days {
            score += f64::from(self.config.long_lead_weight);
        }

        let score = score.clamp(0.0, 100.0).round() as u8;
        let tier = if score > self.config.high_threshold {
            RiskTier::High
        } else if score > self.config.medium_threshold {
            RiskTier::Medium
        } else {
            RiskTier::Low
        };
        debug!(
            "No-show risk for slot {}: score {} tier {}",
            slot_start, score, tier
        );
        NoShowRisk { score, tier }
    }
}
