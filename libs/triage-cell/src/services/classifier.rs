// libs/triage-cell/src/services/classifier.rs
use tracing::debug;

use crate::models::{TriageAssessment, UrgencyTier};

/// Symptoms that always score 10 regardless of any other keyword present.
const EMERGENCY_KEYWORDS: &[&str] = &[
    "chest pain",
    "can't breathe",
    "cannot breathe",
    "shortness of breath",
    "difficulty breathing",
    "unconscious",
    "unresponsive",
    "seizure",
    "stroke",
    "severe bleeding",
    "coughing up blood",
    "suicidal",
    "overdose",
    "anaphylaxis",
    "choking",
];

const URGENT_KEYWORDS: &[&str] = &[
    "high fever",
    "broken bone",
    "fracture",
    "deep cut",
    "head injury",
    "concussion",
    "vomiting blood",
    "severe pain",
    "allergic reaction",
    "dehydration",
    "kidney stone",
];

const HIGH_KEYWORDS: &[&str] = &[
    "fever",
    "infection",
    "migraine",
    "persistent cough",
    "earache",
    "ear pain",
    "sprain",
    "rash",
    "burning urination",
];

const MEDIUM_KEYWORDS: &[&str] = &[
    "cough",
    "cold",
    "sore throat",
    "headache",
    "congestion",
    "runny nose",
    "fatigue",
    "back pain",
    "refill",
    "follow up",
    "follow-up",
];

/// Words that bump urgent/high scores by one point each, capped at two.
const INTENSIFIERS: &[&str] = &["severe", "worst", "unbearable", "excruciating", "extreme"];

const EMERGENCY_SCORE: i32 = 10;
const URGENT_BASE_SCORE: i32 = 7;
const HIGH_BASE_SCORE: i32 = 5;
const MEDIUM_SCORE: i32 = 4;
const DEFAULT_SCORE: i32 = 3;
const MAX_INTENSIFIER_BONUS: i32 = 2;

/// Deterministic keyword-based symptom scorer. Pure: no I/O, no state.
pub struct PriorityClassifier;

impl PriorityClassifier {
    pub fn new() -> Self {
        Self
    }

    /// Map free-text symptoms to an urgency score in [1, 10].
    ///
    /// Tiers are scanned top-down; an emergency keyword short-circuits to 10.
    /// Any input, including the empty string, yields a valid score.
    pub fn score(&self, text: &str) -> i32 {
        self.assess(text).score
    }

    pub fn assess(&self, text: &str) -> TriageAssessment {
        let normalized = text.to_lowercase();

        let (tier, score) = if contains_any(&normalized, EMERGENCY_KEYWORDS) {
            (UrgencyTier::Emergency, EMERGENCY_SCORE)
        } else if contains_any(&normalized, URGENT_KEYWORDS) {
            let score = URGENT_BASE_SCORE + intensifier_bonus(&normalized);
            (UrgencyTier::Urgent, score)
        } else if contains_any(&normalized, HIGH_KEYWORDS) {
            let score = HIGH_BASE_SCORE + intensifier_bonus(&normalized);
            (UrgencyTier::High, score)
        } else if contains_any(&normalized, MEDIUM_KEYWORDS) {
            (UrgencyTier::Medium, MEDIUM_SCORE)
        } else {
            (UrgencyTier::Low, DEFAULT_SCORE)
        };

        let score = score.clamp(1, 10);

        debug!("Triage score {} ({}) for symptom text", score, tier);

        TriageAssessment {
            score,
            tier,
            recommended_timeframe: tier.recommended_timeframe().to_string(),
        }
    }
}

impl Default for PriorityClassifier {
    fn default() -> Self {
        Self::new()
    }
}

fn contains_any(text: &str, keywords: &[&str]) -> bool {
    keywords.iter().any(|kw| text.contains(kw))
}

fn intensifier_bonus(text: &str) -> i32 {
    let matches = INTENSIFIERS.iter().filter(|word| text.contains(*word)).count() as i32;
    matches.min(MAX_INTENSIFIER_BONUS)
}
