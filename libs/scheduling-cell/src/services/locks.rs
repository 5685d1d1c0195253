// libs/scheduling-cell/src/services/locks.rs
use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use reqwest::Method;
use serde_json::{json, Value};
use tracing::{debug, warn};
use uuid::Uuid;

use shared_database::supabase::SupabaseClient;

use crate::models::SchedulingError;

/// Per-provider scheduling lock backed by a store row.
///
/// The `scheduling_locks` table carries a uniqueness constraint on
/// `lock_key`, so the insert is the atomic acquire: concurrent bookings for
/// the same provider serialize here, which is what makes commit-time
/// re-validation race-free. Locks expire so a crashed holder cannot wedge
/// the schedule.
pub struct SchedulingLockService {
    supabase: Arc<SupabaseClient>,
    lock_timeout_seconds: i64,
    max_attempts: u32,
}

impl SchedulingLockService {
    pub fn new(supabase: Arc<SupabaseClient>) -> Self {
        Self {
            supabase,
            lock_timeout_seconds: 30,
            max_attempts: 3,
        }
    }

    fn lock_key(provider_id: Uuid) -> String {
        format!("provider_{}", provider_id)
    }

    /// Acquire the provider's lock, retrying briefly on contention.
    pub async fn acquire(&self, provider_id: Uuid) -> Result<(), SchedulingError> {
        let lock_key = Self::lock_key(provider_id);

        for attempt in 1..=self.max_attempts {
            if self.try_acquire(&lock_key, provider_id).await? {
                debug!("Scheduling lock acquired: {}", lock_key);
                return Ok(());
            }

            if attempt < self.max_attempts {
                debug!(
                    "Scheduling lock contended for provider {}, attempt {}/{}",
                    provider_id, attempt, self.max_attempts
                );
                tokio::time::sleep(std::time::Duration::from_millis(100 * attempt as u64)).await;
            }
        }

        Err(SchedulingError::SlotUnavailable(
            "another booking for this provider is in progress, retry shortly".to_string(),
        ))
    }

    pub async fn release(&self, provider_id: Uuid) -> Result<(), SchedulingError> {
        let lock_key = Self::lock_key(provider_id);
        let path = format!("/rest/v1/scheduling_locks?lock_key=eq.{}", lock_key);

        self.supabase
            .delete(&path, None)
            .await
            .map_err(|e| SchedulingError::Database(format!("lock release failed: {}", e)))?;

        debug!("Scheduling lock released: {}", lock_key);
        Ok(())
    }

    async fn try_acquire(
        &self,
        lock_key: &str,
        provider_id: Uuid,
    ) -> Result<bool, SchedulingError> {
        if self.insert_lock_row(lock_key, provider_id).await {
            return Ok(true);
        }

        // Insert was rejected: a lock row exists. Clear it if expired and
        // try once more.
        if self.cleanup_expired_lock(lock_key).await? {
            return Ok(self.insert_lock_row(lock_key, provider_id).await);
        }

        Ok(false)
    }

    async fn insert_lock_row(&self, lock_key: &str, provider_id: Uuid) -> bool {
        let lock_data = json!({
            "lock_key": lock_key,
            "provider_id": provider_id,
            "acquired_at": Utc::now().to_rfc3339(),
            "expires_at": (Utc::now() + Duration::seconds(self.lock_timeout_seconds)).to_rfc3339(),
            "process_id": format!("scheduler_{}", Uuid::new_v4()),
        });

        self.supabase
            .insert_returning("/rest/v1/scheduling_locks", None, lock_data)
            .await
            .is_ok()
    }

    async fn cleanup_expired_lock(&self, lock_key: &str) -> Result<bool, SchedulingError> {
        let path = format!("/rest/v1/scheduling_locks?lock_key=eq.{}", lock_key);
        let result: Vec<Value> = self
            .supabase
            .request(Method::GET, &path, None, None)
            .await
            .map_err(|e| SchedulingError::Database(format!("lock check failed: {}", e)))?;

        let Some(lock) = result.first() else {
            // Row vanished between insert rejection and this check.
            return Ok(true);
        };

        let expired = lock
            .get("expires_at")
            .and_then(|v| v.as_str())
            .and_then(|s| DateTime::parse_from_rfc3339(s).ok())
            .map(|expires_at| expires_at.with_timezone(&Utc) < Utc::now())
            .unwrap_or(false);

        if expired {
            warn!("Cleaning up expired scheduling lock: {}", lock_key);
            let path = format!("/rest/v1/scheduling_locks?lock_key=eq.{}", lock_key);
            self.supabase
                .delete(&path, None)
                .await
                .map_err(|e| SchedulingError::Database(format!("lock cleanup failed: {}", e)))?;
            return Ok(true);
        }

        Ok(false)
    }
}
