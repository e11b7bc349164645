//! Exam readiness: predicted score, pass probability and weak topics.
//!
//! Topics the user never studied count as zero mastery. The predictor never
//! assumes partial credit for material it has no evidence about.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::mastery::TopicMastery;

/// Exam blueprint for a course.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExamConfig {
    #[serde(default)]
    pub total_questions: u32,
    /// Fraction (0.7) or percentage (70) of the score scale needed to pass.
    pub passing_score: f64,
    #[serde(default)]
    pub duration_minutes: u32,
    #[serde(default)]
    pub sections: Vec<ExamSection>,
    #[serde(default = "default_score_scale")]
    pub score_scale: f64,
}

fn default_score_scale() -> f64 {
    100.0
}

impl Default for ExamConfig {
    fn default() -> Self {
        Self {
            total_questions: 0,
            passing_score: 0.7,
            duration_minutes: 0,
            sections: Vec::new(),
            score_scale: default_score_scale(),
        }
    }
}

impl ExamConfig {
    /// Passing score as a fraction in [0, 1].
    pub fn passing_fraction(&self) -> f64 {
        let raw = if self.passing_score > 1.0 {
            self.passing_score / 100.0
        } else {
            self.passing_score
        };
        raw.clamp(0.0, 1.0)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExamSection {
    pub name: String,
    pub weight_pct: f64,
    #[serde(default)]
    pub topic_ids: Vec<Uuid>,
}

/// Mock-exam results for one user and course.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ExamHistory {
    pub attempts: u32,
    pub mean_score_pct: f64,
}

/// A course topic and its share of the exam.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TopicWeight {
    pub topic_id: Uuid,
    pub name: String,
    pub weight_pct: f64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct PredictorParams {
    /// Slope of the logistic curve around the passing score.
    pub steepness: f64,
    /// Topics below this mastery are reported as weak.
    pub weak_threshold: f64,
    pub weak_topic_limit: usize,
    pub history_weight_per_attempt: f64,
    pub max_history_weight: f64,
}

impl Default for PredictorParams {
    fn default() -> Self {
        Self {
            steepness: 12.0,
            weak_threshold: 0.7,
            weak_topic_limit: 5,
            history_weight_per_attempt: 0.1,
            max_history_weight: 0.5,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WeakTopic {
    pub topic_id: Uuid,
    pub name: String,
    pub mastery_score: f64,
    pub weight_pct: f64,
    /// weight_pct * (1 - mastery_score); higher is more valuable to study.
    pub priority: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Recommendation {
    /// No studied cards yet.
    MoreStudyNeeded,
    OnTrack,
    FocusWeakTopics { weak_count: usize },
    CoverNewCards,
    BuildFoundation { remaining_cards: u32 },
    AddCards,
}

impl Recommendation {
    pub fn message(&self) -> String {
        match self {
            Self::MoreStudyNeeded => {
                "Not enough study data yet. Review some cards to get a prediction.".to_string()
            }
            Self::OnTrack => {
                "You are on track to pass. Polish your weak topics and practice with mock exams."
                    .to_string()
            }
            Self::FocusWeakTopics { weak_count } => format!(
                "You are close to passing. Focused review of {weak_count} weak topic(s) will help most."
            ),
            Self::CoverNewCards => {
                "Good progress. Prioritize working through cards you have not studied yet."
                    .to_string()
            }
            Self::BuildFoundation { remaining_cards } => format!(
                "{remaining_cards} cards left to master. Start with the foundational topics."
            ),
            Self::AddCards => "Add cards to this course to start studying.".to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Prediction {
    /// Predicted share of the score scale, in [0, 1].
    pub predicted_fraction: f64,
    pub predicted_score: f64,
    pub pass_probability: f64,
    /// Passing score on the exam's score scale.
    pub passing_score: f64,
    pub weak_topics: Vec<WeakTopic>,
    pub total_topics: usize,
    pub studied_topics: usize,
    pub recommendation: Recommendation,
    pub insufficient_data: bool,
}

/// Predict exam readiness from per-topic mastery.
///
/// `mastery` may omit topics; a missing topic counts as zero cards studied.
pub fn predict(
    config: &ExamConfig,
    topics: &[TopicWeight],
    mastery: &[TopicMastery],
    history: Option<&ExamHistory>,
    params: &PredictorParams,
) -> Prediction {
    let by_topic: HashMap<Uuid, &TopicMastery> = mastery.iter().map(|m| (m.topic_id, m)).collect();
    let score_of = |id: &Uuid| by_topic.get(id).map(|m| m.mastery_score).unwrap_or(0.0);

    let weights = effective_topic_weights(topics);
    let passing_fraction = config.passing_fraction();
    let passing_score = passing_fraction * config.score_scale;
    let studied_topics = topics
        .iter()
        .filter(|t| by_topic.get(&t.topic_id).is_some_and(|m| m.is_studied()))
        .count();
    let any_studied = mastery.iter().any(TopicMastery::is_studied);

    let mut weak_topics: Vec<WeakTopic> = topics
        .iter()
        .zip(&weights)
        .map(|(t, &weight_pct)| {
            let mastery_score = score_of(&t.topic_id);
            WeakTopic {
                topic_id: t.topic_id,
                name: t.name.clone(),
                mastery_score,
                weight_pct,
                priority: weight_pct * (1.0 - mastery_score),
            }
        })
        .filter(|w| !any_studied || w.mastery_score < params.weak_threshold)
        .collect();
    weak_topics.sort_by(|a, b| {
        b.priority
            .total_cmp(&a.priority)
            .then_with(|| a.topic_id.cmp(&b.topic_id))
    });

    if !any_studied {
        return Prediction {
            predicted_fraction: 0.0,
            predicted_score: 0.0,
            pass_probability: 0.0,
            passing_score,
            weak_topics,
            total_topics: topics.len(),
            studied_topics: 0,
            recommendation: Recommendation::MoreStudyNeeded,
            insufficient_data: true,
        };
    }
    weak_topics.truncate(params.weak_topic_limit);

    let mastery_fraction = section_weighted_fraction(config, topics, &weights, &by_topic);
    let predicted_fraction = match history.filter(|h| h.attempts > 0) {
        Some(h) => {
            let w = (params.history_weight_per_attempt * f64::from(h.attempts))
                .min(params.max_history_weight);
            let historical = (h.mean_score_pct / 100.0).clamp(0.0, 1.0);
            (1.0 - w) * mastery_fraction + w * historical
        }
        None => mastery_fraction,
    };

    let pass_probability =
        1.0 / (1.0 + (-params.steepness * (predicted_fraction - passing_fraction)).exp());

    let total_cards: u32 = mastery.iter().map(|m| m.total_cards).sum();
    let mastered_cards: u32 = mastery.iter().map(|m| m.mastered_cards).sum();
    let remaining_cards = total_cards.saturating_sub(mastered_cards);

    let recommendation = if pass_probability >= 0.8 {
        Recommendation::OnTrack
    } else if pass_probability >= 0.5 && !weak_topics.is_empty() {
        Recommendation::FocusWeakTopics {
            weak_count: weak_topics.len(),
        }
    } else if pass_probability >= 0.5 {
        Recommendation::CoverNewCards
    } else if remaining_cards > 0 {
        Recommendation::BuildFoundation { remaining_cards }
    } else {
        Recommendation::AddCards
    };

    Prediction {
        predicted_fraction,
        predicted_score: predicted_fraction * config.score_scale,
        pass_probability,
        passing_score,
        weak_topics,
        total_topics: topics.len(),
        studied_topics,
        recommendation,
        insufficient_data: false,
    }
}

/// Topic weights, or equal weights when none are configured.
fn effective_topic_weights(topics: &[TopicWeight]) -> Vec<f64> {
    let total: f64 = topics.iter().map(|t| t.weight_pct.max(0.0)).sum();
    if total > 0.0 {
        topics.iter().map(|t| t.weight_pct.max(0.0)).collect()
    } else {
        let equal = 100.0 / topics.len().max(1) as f64;
        vec![equal; topics.len()]
    }
}

/// Weighted mastery over the exam sections.
///
/// Sections that list topics use the card-weighted mastery of those topics;
/// sections without topics contribute zero. If no section lists topics, each
/// course topic acts as its own section.
fn section_weighted_fraction(
    config: &ExamConfig,
    topics: &[TopicWeight],
    topic_weights: &[f64],
    by_topic: &HashMap<Uuid, &TopicMastery>,
) -> f64 {
    let mapped = config.sections.iter().any(|s| !s.topic_ids.is_empty());

    let sections: Vec<(f64, f64)> = if mapped {
        config
            .sections
            .iter()
            .map(|s| {
                let (mastered, total) = s
                    .topic_ids
                    .iter()
                    .filter_map(|id| by_topic.get(id))
                    .fold((0u32, 0u32), |(m, t), tm| {
                        (m + tm.mastered_cards, t + tm.total_cards)
                    });
                let fraction = if total == 0 {
                    0.0
                } else {
                    f64::from(mastered) / f64::from(total)
                };
                (fraction, s.weight_pct.max(0.0))
            })
            .collect()
    } else {
        topics
            .iter()
            .zip(topic_weights)
            .map(|(t, &w)| {
                let fraction = by_topic.get(&t.topic_id).map(|m| m.mastery_score).unwrap_or(0.0);
                (fraction, w)
            })
            .collect()
    };

    let weight_sum: f64 = sections.iter().map(|(_, w)| w).sum();
    if sections.is_empty() {
        return 0.0;
    }
    if weight_sum <= 0.0 {
        return sections.iter().map(|(f, _)| f).sum::<f64>() / sections.len() as f64;
    }
    sections.iter().map(|(f, w)| f * w).sum::<f64>() / weight_sum
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn topic(n: u128, weight_pct: f64) -> TopicWeight {
        TopicWeight {
            topic_id: Uuid::from_u128(n),
            name: format!("Topic {n}"),
            weight_pct,
        }
    }

    fn mastery(n: u128, total: u32, studied: u32, mastered: u32) -> TopicMastery {
        TopicMastery {
            topic_id: Uuid::from_u128(n),
            total_cards: total,
            studied_cards: studied,
            mastered_cards: mastered,
            failed_cards: 0,
            mastery_score: if total == 0 {
                0.0
            } else {
                f64::from(mastered) / f64::from(total)
            },
            recent_accuracy: None,
            recent_reviews: 0,
        }
    }

    fn config(passing_score: f64) -> ExamConfig {
        ExamConfig {
            passing_score,
            ..ExamConfig::default()
        }
    }

    #[test]
    fn forty_percent_mastery_predicts_forty_percent_score() {
        let topics: Vec<TopicWeight> = (1..=5).map(|n| topic(n, 20.0)).collect();
        let masteries: Vec<TopicMastery> = (1..=5).map(|n| mastery(n, 20, 20, 8)).collect();

        let prediction = predict(
            &config(0.7),
            &topics,
            &masteries,
            None,
            &PredictorParams::default(),
        );

        assert!((prediction.predicted_score - 40.0).abs() < 1e-9);
        assert!(prediction.pass_probability < 0.5);
        assert_eq!(prediction.passing_score, 70.0);
        assert_eq!(prediction.total_topics, 5);
        assert_eq!(prediction.studied_topics, 5);
        assert_eq!(prediction.weak_topics.len(), 5);
        assert_eq!(
            prediction.recommendation,
            Recommendation::BuildFoundation { remaining_cards: 60 }
        );
    }

    #[test]
    fn no_reviews_is_insufficient_data_with_every_topic_weak() {
        let topics: Vec<TopicWeight> = (1..=7).map(|n| topic(n, 0.0)).collect();
        let masteries: Vec<TopicMastery> = (1..=7).map(|n| mastery(n, 10, 0, 0)).collect();

        let prediction = predict(
            &config(70.0),
            &topics,
            &masteries,
            None,
            &PredictorParams::default(),
        );

        assert!(prediction.insufficient_data);
        assert_eq!(prediction.predicted_score, 0.0);
        assert_eq!(prediction.pass_probability, 0.0);
        assert_eq!(prediction.weak_topics.len(), 7);
        assert!(prediction.weak_topics.iter().all(|w| w.mastery_score == 0.0));
        assert_eq!(prediction.recommendation, Recommendation::MoreStudyNeeded);
    }

    #[test]
    fn empty_course_is_insufficient_data() {
        let prediction = predict(&config(0.7), &[], &[], None, &PredictorParams::default());
        assert!(prediction.insufficient_data);
        assert!(prediction.weak_topics.is_empty());
    }

    #[test]
    fn pass_probability_is_half_at_passing_score() {
        let topics = vec![topic(1, 100.0)];
        let masteries = vec![mastery(1, 10, 10, 7)];
        let prediction = predict(
            &config(0.7),
            &topics,
            &masteries,
            None,
            &PredictorParams::default(),
        );
        assert!((prediction.pass_probability - 0.5).abs() < 1e-9);
    }

    #[test]
    fn pass_probability_grows_with_mastery() {
        let topics = vec![topic(1, 100.0)];
        let mut last = 0.0;
        for mastered in 1..=10 {
            let prediction = predict(
                &config(0.7),
                &topics,
                &[mastery(1, 10, 10, mastered)],
                None,
                &PredictorParams::default(),
            );
            assert!(prediction.pass_probability > last);
            last = prediction.pass_probability;
        }
        assert!(last > 0.95);
    }

    #[test]
    fn weak_topics_rank_by_priority_then_id() {
        let topics = vec![topic(1, 10.0), topic(2, 40.0), topic(3, 40.0), topic(4, 10.0)];
        let masteries = vec![
            mastery(1, 10, 10, 0),
            mastery(2, 10, 10, 5),
            mastery(3, 10, 10, 5),
            mastery(4, 10, 10, 9),
        ];

        let prediction = predict(
            &config(0.7),
            &topics,
            &masteries,
            None,
            &PredictorParams::default(),
        );

        let order: Vec<Uuid> = prediction.weak_topics.iter().map(|w| w.topic_id).collect();
        // 4 is at 0.9 mastery and not weak
        assert_eq!(
            order,
            vec![Uuid::from_u128(2), Uuid::from_u128(3), Uuid::from_u128(1)]
        );
        assert!((prediction.weak_topics[0].priority - 20.0).abs() < 1e-9);
    }

    #[test]
    fn weak_topics_truncated_to_limit() {
        let topics: Vec<TopicWeight> = (1..=8).map(|n| topic(n, 12.5)).collect();
        let masteries: Vec<TopicMastery> = (1..=8).map(|n| mastery(n, 10, 5, 1)).collect();
        let params = PredictorParams {
            weak_topic_limit: 3,
            ..PredictorParams::default()
        };
        let prediction = predict(&config(0.7), &topics, &masteries, None, &params);
        assert_eq!(prediction.weak_topics.len(), 3);
    }

    #[test]
    fn sections_use_card_weighted_topic_mastery() {
        let exam = ExamConfig {
            passing_score: 0.5,
            sections: vec![
                ExamSection {
                    name: "Audit".to_string(),
                    weight_pct: 75.0,
                    topic_ids: vec![Uuid::from_u128(1), Uuid::from_u128(2)],
                },
                ExamSection {
                    name: "Ethics".to_string(),
                    weight_pct: 25.0,
                    topic_ids: vec![Uuid::from_u128(3)],
                },
            ],
            ..ExamConfig::default()
        };
        let topics = vec![topic(1, 0.0), topic(2, 0.0), topic(3, 0.0)];
        // section 1: (10 + 0) / (10 + 30) = 0.25, section 2: 1.0
        let masteries = vec![
            mastery(1, 10, 10, 10),
            mastery(2, 30, 0, 0),
            mastery(3, 5, 5, 5),
        ];

        let prediction = predict(&exam, &topics, &masteries, None, &PredictorParams::default());
        let expected = 0.25 * 0.75 + 1.0 * 0.25;
        assert!((prediction.predicted_fraction - expected).abs() < 1e-9);
    }

    #[test]
    fn mock_exam_history_is_blended_in() {
        let topics = vec![topic(1, 100.0)];
        let masteries = vec![mastery(1, 10, 10, 4)];
        let history = ExamHistory {
            attempts: 3,
            mean_score_pct: 80.0,
        };
        let prediction = predict(
            &config(0.7),
            &topics,
            &masteries,
            Some(&history),
            &PredictorParams::default(),
        );
        let expected = 0.7 * 0.4 + 0.3 * 0.8;
        assert!((prediction.predicted_fraction - expected).abs() < 1e-9);

        let many = ExamHistory {
            attempts: 40,
            mean_score_pct: 80.0,
        };
        let capped = predict(
            &config(0.7),
            &topics,
            &masteries,
            Some(&many),
            &PredictorParams::default(),
        );
        assert!((capped.predicted_fraction - 0.6).abs() < 1e-9);
    }

    #[test]
    fn high_mastery_is_on_track() {
        let topics = vec![topic(1, 50.0), topic(2, 50.0)];
        let masteries = vec![mastery(1, 10, 10, 10), mastery(2, 10, 10, 9)];
        let prediction = predict(
            &config(0.7),
            &topics,
            &masteries,
            None,
            &PredictorParams::default(),
        );
        assert_eq!(prediction.recommendation, Recommendation::OnTrack);
        assert!(prediction.weak_topics.is_empty());
    }

    #[test]
    fn passing_score_percentage_is_normalised() {
        assert_eq!(config(75.0).passing_fraction(), 0.75);
        assert_eq!(config(0.6).passing_fraction(), 0.6);
    }

    #[test]
    fn exam_config_defaults_from_json() {
        let exam: ExamConfig = serde_json::from_str(r#"{"passing_score": 60}"#).unwrap();
        assert_eq!(exam.score_scale, 100.0);
        assert!(exam.sections.is_empty());
        assert_eq!(exam.passing_fraction(), 0.6);
    }
}
