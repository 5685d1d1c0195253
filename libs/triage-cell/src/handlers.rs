// libs/triage-cell/src/handlers.rs
use axum::{extract::Extension, Json};
use serde_json::{json, Value};
use tracing::info;

use shared_models::auth::User;
use shared_models::error::AppError;

use crate::models::AssessRequest;
use crate::services::PriorityClassifier;

/// Score a free-text symptom description for the intake assistant.
#[axum::debug_handler]
pub async fn assess_symptoms(
    Extension(user): Extension<User>,
    Json(request): Json<AssessRequest>,
) -> Result<Json<Value>, AppError> {
    if request.symptom_text.trim().is_empty() {
        return Err(AppError::ValidationError("symptom_text must not be empty".to_string()));
    }

    let assessment = PriorityClassifier::new().assess(&request.symptom_text);

    info!(
        "Triage assessment for user {}: score {} ({})",
        user.id, assessment.score, assessment.tier
    );

    let emergency = assessment.is_emergency();

    Ok(Json(json!({
        "score": assessment.score,
        "label": assessment.tier,
        "recommended_timeframe": assessment.recommended_timeframe,
        "emergency": emergency,
    })))
}
