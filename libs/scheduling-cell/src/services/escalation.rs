// libs/scheduling-cell/src/services/escalation.rs
use std::sync::Arc;

use serde_json::json;
use tracing::info;
use uuid::Uuid;

use shared_database::supabase::SupabaseClient;

use crate::models::{EscalationTicket, SchedulingError};

/// Urgent-escalation collaborator: bookings that score in the emergency band
/// are handed to this queue instead of creating a visit.
pub struct EscalationService {
    supabase: Arc<SupabaseClient>,
}

impl EscalationService {
    pub fn new(supabase: Arc<SupabaseClient>) -> Self {
        Self { supabase }
    }

    pub async fn enqueue(
        &self,
        patient_id: Uuid,
        symptom_text: &str,
        urgency_score: i32,
        auth_token: &str,
    ) -> Result<EscalationTicket, SchedulingError> {
        let ticket_data = json!({
            "id": Uuid::new_v4(),
            "patient_id": patient_id,
            "symptom_text": symptom_text,
            "urgency_score": urgency_score,
            "created_at": chrono::Utc::now().to_rfc3339(),
        });

        let result = self
            .supabase
            .insert_returning("/rest/v1/escalations", Some(auth_token), ticket_data)
            .await
            .map_err(|e| SchedulingError::Database(format!("failed to enqueue escalation: {}", e)))?;

        let row = result.into_iter().next().ok_or_else(|| {
            SchedulingError::Database("escalation insert returned no row".to_string())
        })?;

        let ticket: EscalationTicket = serde_json::from_value(row)
            .map_err(|e| SchedulingError::Database(format!("failed to parse escalation: {}", e)))?;

        info!(
            "Escalation {} queued for patient {} with urgency {}",
            ticket.id, patient_id, urgency_score
        );

        Ok(ticket)
    }
}
