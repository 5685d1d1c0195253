// libs/triage-cell/src/models.rs
use serde::{Deserialize, Serialize};
use std::fmt;

/// Priority scores at or above this value bypass normal booking and are
/// routed to the urgent-escalation queue.
pub const EMERGENCY_THRESHOLD: i32 = 9;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UrgencyTier {
    Emergency,
    Urgent,
    High,
    Medium,
    Low,
}

impl fmt::Display for UrgencyTier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            UrgencyTier::Emergency => write!(f, "emergency"),
            UrgencyTier::Urgent => write!(f, "urgent"),
            UrgencyTier::High => write!(f, "high"),
            UrgencyTier::Medium => write!(f, "medium"),
            UrgencyTier::Low => write!(f, "low"),
        }
    }
}

impl UrgencyTier {
    pub fn recommended_timeframe(&self) -> &'static str {
        match self {
            UrgencyTier::Emergency => "Call emergency services or go to the ER now",
            UrgencyTier::Urgent => "Within 24 hours",
            UrgencyTier::High => "Within 2-3 days",
            UrgencyTier::Medium => "Within 1 week",
            UrgencyTier::Low => "Routine scheduling",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TriageAssessment {
    pub score: i32,
    pub tier: UrgencyTier,
    pub recommended_timeframe: String,
}

impl TriageAssessment {
    pub fn is_emergency(&self) -> bool {
        self.score >= EMERGENCY_THRESHOLD
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AssessRequest {
    pub symptom_text: String,
}
