use shared_config::TriageConfig;
use tracing::{debug, warn};

use crate::models::{SymptomDuration, SymptomReport, TriageAssessment, TriageCategory};

/// Phrases that indicate the situation may be beyond dental care entirely.
/// Any of these short-circuits scoring: the patient is told to seek
/// emergency medical attention, not a dental slot.
const LIFE_THREATENING_CUES: &[&str] = &[
    "unconscious",
    "not breathing",
    "can't breathe",
    "cannot breathe",
    "difficulty breathing",
    "allergic reaction",
    "uncontrolled bleeding",
    "won't stop bleeding",
    "chest pain",
    "head injury",
];

/// Converts a symptom report into a 0-100 severity score and category.
///
/// The rubric is additive: each structured symptom contributes a fixed
/// weight, free-text phrases add configured bonuses, and the total is
/// clamped to 100.
pub struct TriageScoringService {
    config: TriageConfig,
}

impl TriageScoringService {
    pub fn new(config: TriageConfig) -> Self {
        Self { config }
    }

    pub fn assess(&self, report: &SymptomReport) -> TriageAssessment {
        let description = report.description.to_lowercase();

        if let Some(cue) = LIFE_THREATENING_CUES
            .iter()
            .find(|cue| description.contains(*cue))
        {
            warn!(cue, "life-threatening cue in symptom description");
            return TriageAssessment {
                severity_score: 100,
                category: TriageCategory::Critical,
                life_threatening: true,
            };
        }

        let mut score: u32 = 0;

        score += report.pain_level.min(10) as u32 * self.config.pain_multiplier as u32;
        if report.swelling {
            score += self.config.swelling_weight as u32;
        }
        if report.bleeding {
            score += self.config.bleeding_weight as u32;
        }
        if report.fever {
            score += self.config.fever_weight as u32;
        }
        if report.cannot_eat {
            score += self.config.cannot_eat_weight as u32;
        }
        if report.sleep_disrupted {
            score += self.config.sleep_disrupted_weight as u32;
        }
        if report.medication_ineffective {
            score += self.config.medication_ineffective_weight as u32;
        }

        match report.duration {
            Some(SymptomDuration::JustStarted) => {
                score += self.config.just_started_weight as u32;
            }
            Some(SymptomDuration::ThreeDaysOrMore) => {
                score += self.config.prolonged_weight as u32;
            }
            Some(SymptomDuration::UnderThreeDays) | None => {}
        }

        for bonus in &self.config.keyword_bonuses {
            if description.contains(&bonus.phrase) {
                score += bonus.points as u32;
            }
        }

        let severity_score = score.min(100) as u8;
        let category = self.categorize(severity_score);
        debug!(severity_score, %category, "scored symptom report");

        TriageAssessment {
            severity_score,
            category,
            life_threatening: false,
        }
    }

    fn categorize(&self, score: u8) -> TriageCategory {
        if score >= self.config.urgent_threshold {
            TriageCategory::Urgent
        } else if score >= self.config.moderate_threshold {
            TriageCategory::Moderate
        } else {
            TriageCategory::Minor
        }
    }
}
