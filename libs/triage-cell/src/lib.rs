pub mod handlers;
pub mod models;
pub mod router;
pub mod services;

pub use models::{TriageAssessment, UrgencyTier, EMERGENCY_THRESHOLD};
pub use services::PriorityClassifier;
