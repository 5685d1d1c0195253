// libs/calendar-cell/src/port.rs
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::models::{BusyInterval, CalendarError, CalendarEventRequest};

/// Seam between the scheduling engine and the external calendar service.
///
/// Every implementation must be safe to retry: the booking layer treats any
/// error as "mirroring failed, carry on", so a write that half-applied must
/// converge when repeated.
#[async_trait]
pub trait CalendarPort: Send + Sync {
    /// Fetch busy intervals for a provider's connected calendar.
    async fn get_busy_intervals(
        &self,
        provider_id: Uuid,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
        auth_token: &str,
    ) -> Result<Vec<BusyInterval>, CalendarError>;

    /// Mirror a newly booked visit; returns the external event id.
    async fn create_event(
        &self,
        provider_id: Uuid,
        event: &CalendarEventRequest,
        auth_token: &str,
    ) -> Result<String, CalendarError>;

    /// Mirror a reschedule onto an existing event.
    async fn update_event(
        &self,
        provider_id: Uuid,
        event_id: &str,
        event: &CalendarEventRequest,
        auth_token: &str,
    ) -> Result<(), CalendarError>;

    /// Mirror a cancellation. Deleting an already-deleted event succeeds.
    async fn delete_event(
        &self,
        provider_id: Uuid,
        event_id: &str,
        auth_token: &str,
    ) -> Result<(), CalendarError>;
}
