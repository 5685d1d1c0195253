// libs/scheduling-cell/src/services/audit.rs
use std::sync::Arc;

use serde_json::{json, Value};
use tracing::{info, warn};
use uuid::Uuid;

use shared_database::supabase::SupabaseClient;

/// Audit-log collaborator. Every create/reschedule/cancel records an entry;
/// like calendar mirroring, a failed write is logged and swallowed so audit
/// availability never gates a booking.
pub struct AuditService {
    supabase: Arc<SupabaseClient>,
}

impl AuditService {
    pub fn new(supabase: Arc<SupabaseClient>) -> Self {
        Self { supabase }
    }

    pub async fn record(
        &self,
        actor_type: &str,
        actor_id: &str,
        action: &str,
        resource_type: &str,
        resource_id: &str,
        metadata: Value,
        auth_token: &str,
    ) {
        info!(
            actor_type = actor_type,
            actor_id = actor_id,
            action = action,
            resource_type = resource_type,
            resource_id = resource_id,
            "AUDIT: {}",
            action
        );

        let entry = json!({
            "id": Uuid::new_v4(),
            "actor_type": actor_type,
            "actor_id": actor_id,
            "action": action,
            "resource_type": resource_type,
            "resource_id": resource_id,
            "metadata": metadata,
            "created_at": chrono::Utc::now().to_rfc3339(),
        });

        if let Err(e) = self
            .supabase
            .insert_returning("/rest/v1/audit_events", Some(auth_token), entry)
            .await
        {
            warn!("Audit write failed for action {}: {}", action, e);
        }
    }
}
