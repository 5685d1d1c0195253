// libs/scheduling-cell/src/services/resolution.rs
use std::sync::Arc;

use chrono::Utc;
use reqwest::Method;
use serde_json::Value;
use tracing::debug;
use uuid::Uuid;

use shared_database::supabase::SupabaseClient;

use crate::models::{Provider, SchedulingError, Visit, ACTIVE_STATUS_FILTER};

/// Explicit provider resolution, in decreasing order of preference:
/// 1. the provider id named by the caller,
/// 2. the provider of the patient's next upcoming active visit,
/// 3. any provider with a connected calendar,
/// 4. the first provider on record.
pub struct ProviderResolutionService {
    supabase: Arc<SupabaseClient>,
}

impl ProviderResolutionService {
    pub fn new(supabase: Arc<SupabaseClient>) -> Self {
        Self { supabase }
    }

    pub async fn get_provider(
        &self,
        provider_id: Uuid,
        auth_token: &str,
    ) -> Result<Provider, SchedulingError> {
        let path = format!("/rest/v1/providers?id=eq.{}", provider_id);
        let result: Vec<Value> = self
            .supabase
            .request(Method::GET, &path, Some(auth_token), None)
            .await
            .map_err(|e| SchedulingError::Database(e.to_string()))?;

        let row = result.into_iter().next().ok_or(SchedulingError::ProviderNotFound)?;

        serde_json::from_value(row)
            .map_err(|e| SchedulingError::Database(format!("failed to parse provider: {}", e)))
    }

    pub async fn resolve(
        &self,
        explicit_provider_id: Option<Uuid>,
        patient_id: Uuid,
        auth_token: &str,
    ) -> Result<Provider, SchedulingError> {
        if let Some(provider_id) = explicit_provider_id {
            return self.get_provider(provider_id, auth_token).await;
        }

        if let Some(provider_id) = self.upcoming_visit_provider(patient_id, auth_token).await? {
            debug!(
                "Resolved provider {} from patient {}'s upcoming visit",
                provider_id, patient_id
            );
            return self.get_provider(provider_id, auth_token).await;
        }

        if let Some(provider) = self.first_provider("calendar_connected=eq.true", auth_token).await? {
            return Ok(provider);
        }

        self.first_provider("", auth_token)
            .await?
            .ok_or(SchedulingError::ProviderNotFound)
    }

    async fn upcoming_visit_provider(
        &self,
        patient_id: Uuid,
        auth_token: &str,
    ) -> Result<Option<Uuid>, SchedulingError> {
        let now = urlencoding::encode(&Utc::now().to_rfc3339()).into_owned();
        let path = format!(
            "/rest/v1/visits?patient_id=eq.{}&{}&scheduled_at=gte.{}&order=scheduled_at.asc&limit=1",
            patient_id, ACTIVE_STATUS_FILTER, now
        );

        let result: Vec<Value> = self
            .supabase
            .request(Method::GET, &path, Some(auth_token), None)
            .await
            .map_err(|e| SchedulingError::Database(e.to_string()))?;

        let visit: Option<Visit> = match result.into_iter().next() {
            Some(row) => Some(
                serde_json::from_value(row)
                    .map_err(|e| SchedulingError::Database(format!("failed to parse visit: {}", e)))?,
            ),
            None => None,
        };

        Ok(visit.and_then(|v| v.provider_id))
    }

    async fn first_provider(
        &self,
        filter: &str,
        auth_token: &str,
    ) -> Result<Option<Provider>, SchedulingError> {
        let mut path = "/rest/v1/providers?order=created_at.asc&limit=1".to_string();
        if !filter.is_empty() {
            path = format!("/rest/v1/providers?{}&order=created_at.asc&limit=1", filter);
        }

        let result: Vec<Value> = self
            .supabase
            .request(Method::GET, &path, Some(auth_token), None)
            .await
            .map_err(|e| SchedulingError::Database(e.to_string()))?;

        match result.into_iter().next() {
            Some(row) => serde_json::from_value(row)
                .map(Some)
                .map_err(|e| SchedulingError::Database(format!("failed to parse provider: {}", e))),
            None => Ok(None),
        }
    }
}
