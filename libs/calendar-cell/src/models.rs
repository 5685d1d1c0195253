// libs/calendar-cell/src/models.rs
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A time range during which the provider is unavailable. Ephemeral: built
/// per request from visit rows or calendar free/busy results, never stored.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BusyInterval {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
    pub source: BusySource,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BusySource {
    Internal,
    External,
}

/// Event payload mirrored to the external calendar for a visit.
///
/// The visit id doubles as the idempotency key: it is written to the event's
/// private extended properties so a retried create can be reconciled.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CalendarEventRequest {
    pub visit_id: Uuid,
    pub summary: String,
    pub description: Option<String>,
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
}

/// Calendar OAuth material embedded on the provider row. Only this cell
/// reads or writes these columns.
#[derive(Debug, Clone, Deserialize)]
pub struct ProviderCalendarCredentials {
    pub id: Uuid,
    pub calendar_connected: bool,
    pub calendar_access_token: Option<String>,
    pub calendar_refresh_token: Option<String>,
    pub calendar_token_expires_at: Option<DateTime<Utc>>,
}

/// Successful refresh-token exchange response.
#[derive(Debug, Clone, Deserialize)]
pub struct TokenRefreshResponse {
    pub access_token: String,
    pub expires_in: i64,
}

#[derive(Debug, Clone, thiserror::Error)]
pub enum CalendarError {
    #[error("Provider has no connected calendar")]
    NotConnected,

    #[error("Calendar service unavailable: {0}")]
    Unavailable(String),

    #[error("Calendar token refresh failed: {0}")]
    TokenRefreshFailed(String),

    #[error("Database error: {0}")]
    Database(String),
}
