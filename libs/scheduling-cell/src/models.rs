// libs/scheduling-cell/src/models.rs
use chrono::{DateTime, Duration, NaiveTime, Utc, Weekday};
use chrono_tz::Tz;
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

// ==============================================================================
// CORE VISIT MODELS
// ==============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Visit {
    pub id: Uuid,
    pub patient_id: Uuid,
    pub provider_id: Option<Uuid>,
    pub scheduled_at: DateTime<Utc>,
    pub duration_minutes: i32,
    pub status: VisitStatus,
    pub visit_type: String,
    pub reason_for_visit: Option<String>,
    pub priority_score: i32,
    pub calendar_event_id: Option<String>,
    pub cancelled_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Visit {
    /// Scheduled end instant derived from start and duration.
    pub fn scheduled_end(&self) -> DateTime<Utc> {
        self.scheduled_at + Duration::minutes(self.duration_minutes as i64)
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum VisitStatus {
    Scheduled,
    CheckedIn,
    InProgress,
    Completed,
    Cancelled,
}

impl VisitStatus {
    /// Statuses whose visits occupy provider time for conflict purposes.
    pub fn is_active(&self) -> bool {
        matches!(
            self,
            VisitStatus::Scheduled | VisitStatus::CheckedIn | VisitStatus::InProgress
        )
    }
}

impl fmt::Display for VisitStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            VisitStatus::Scheduled => write!(f, "scheduled"),
            VisitStatus::CheckedIn => write!(f, "checked_in"),
            VisitStatus::InProgress => write!(f, "in_progress"),
            VisitStatus::Completed => write!(f, "completed"),
            VisitStatus::Cancelled => write!(f, "cancelled"),
        }
    }
}

/// PostgREST filter covering the statuses counted in conflict detection.
pub const ACTIVE_STATUS_FILTER: &str = "status=in.(scheduled,checked_in,in_progress)";

/// Default appointment length for a free-form visit type.
pub fn default_duration_minutes(visit_type: &str) -> i32 {
    match visit_type.to_lowercase().replace([' ', '-'], "_").as_str() {
        "initial" | "initial_consultation" | "new_patient" => 45,
        "annual_physical" | "physical" => 60,
        "follow_up" | "follow_up_consultation" => 20,
        "telehealth" | "telehealth_checkin" => 15,
        _ => 30,
    }
}

// ==============================================================================
// PROVIDER SCHEDULE MODELS
// ==============================================================================

/// One wall-clock working shift in the provider's timezone.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ShiftHours {
    pub start: NaiveTime,
    pub end: NaiveTime,
}

/// Weekly working hours: an ordered list of shifts per weekday. Days without
/// an entry are non-working days. Validated at the provider-settings
/// boundary, so shifts arrive well-formed here.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct WeeklyHours {
    #[serde(default)]
    pub monday: Vec<ShiftHours>,
    #[serde(default)]
    pub tuesday: Vec<ShiftHours>,
    #[serde(default)]
    pub wednesday: Vec<ShiftHours>,
    #[serde(default)]
    pub thursday: Vec<ShiftHours>,
    #[serde(default)]
    pub friday: Vec<ShiftHours>,
    #[serde(default)]
    pub saturday: Vec<ShiftHours>,
    #[serde(default)]
    pub sunday: Vec<ShiftHours>,
}

impl WeeklyHours {
    pub fn shifts_for(&self, weekday: Weekday) -> &[ShiftHours] {
        match weekday {
            Weekday::Mon => &self.monday,
            Weekday::Tue => &self.tuesday,
            Weekday::Wed => &self.wednesday,
            Weekday::Thu => &self.thursday,
            Weekday::Fri => &self.friday,
            Weekday::Sat => &self.saturday,
            Weekday::Sun => &self.sunday,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Provider {
    pub id: Uuid,
    pub full_name: String,
    pub timezone: String,
    pub buffer_before_minutes: i32,
    pub buffer_after_minutes: i32,
    pub working_hours: WeeklyHours,
    pub calendar_connected: bool,
}

impl Provider {
    /// Parse the provider's IANA timezone. All wall-clock math goes through
    /// this zone; instants are compared in UTC everywhere else.
    pub fn tz(&self) -> Result<Tz, SchedulingError> {
        self.timezone.parse().map_err(|_| {
            SchedulingError::Validation(format!(
                "provider {} has an invalid timezone: {}",
                self.id, self.timezone
            ))
        })
    }
}

// ==============================================================================
// REQUEST/RESPONSE MODELS
// ==============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BookVisitRequest {
    pub patient_id: Uuid,
    pub provider_id: Option<Uuid>,
    pub scheduled_at: DateTime<Utc>,
    pub visit_type: String,
    pub reason_for_visit: String,
    pub duration_minutes: Option<i32>,
    pub priority_score: Option<i32>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RescheduleVisitRequest {
    pub new_scheduled_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AdvanceStatusRequest {
    pub status: VisitStatus,
}

/// Result of checking one candidate interval against all busy sources.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SlotCheck {
    pub available: bool,
    pub conflict_reason: Option<String>,
}

impl SlotCheck {
    pub fn available() -> Self {
        Self { available: true, conflict_reason: None }
    }

    pub fn conflict(reason: impl Into<String>) -> Self {
        Self { available: false, conflict_reason: Some(reason.into()) }
    }
}

/// A bookable slot, labelled in the provider's timezone for display.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AvailableSlot {
    pub start_time: DateTime<Utc>,
    pub display_label: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EscalationTicket {
    pub id: Uuid,
    pub patient_id: Uuid,
    pub symptom_text: String,
    pub urgency_score: i32,
    pub created_at: DateTime<Utc>,
}

/// Outcome of a booking request. Emergency routing is a successful outcome,
/// not an error: no visit exists and the patient was redirected.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum BookingOutcome {
    Scheduled { visit: Visit },
    EmergencyRouted { escalation: EscalationTicket, message: String },
}

// ==============================================================================
// ERROR TYPES
// ==============================================================================

#[derive(Debug, Clone, Serialize, Deserialize, thiserror::Error)]
pub enum SchedulingError {
    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Requested slot is not available: {0}")]
    SlotUnavailable(String),

    #[error("Visit not found")]
    VisitNotFound,

    #[error("Provider not found")]
    ProviderNotFound,

    #[error("Visit cannot be modified in status {0}")]
    InvalidStatusTransition(VisitStatus),

    #[error("Calendar unavailable: {0}")]
    CalendarUnavailable(String),

    #[error("Database error: {0}")]
    Database(String),
}

impl From<calendar_cell::models::CalendarError> for SchedulingError {
    fn from(e: calendar_cell::models::CalendarError) -> Self {
        SchedulingError::CalendarUnavailable(e.to_string())
    }
}
