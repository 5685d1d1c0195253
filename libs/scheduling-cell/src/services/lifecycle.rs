// libs/scheduling-cell/src/services/lifecycle.rs
use chrono::{DateTime, Utc};
use tracing::{debug, warn};

use crate::models::{SchedulingError, VisitStatus};

/// Upper bound on a single visit's length.
const MAX_DURATION_MINUTES: i32 = 480;

pub struct VisitLifecycleService;

impl VisitLifecycleService {
    pub fn new() -> Self {
        Self
    }

    /// Valid next statuses for a given current status.
    pub fn valid_transitions(&self, current: &VisitStatus) -> Vec<VisitStatus> {
        match current {
            VisitStatus::Scheduled => vec![VisitStatus::CheckedIn, VisitStatus::Cancelled],
            VisitStatus::CheckedIn => vec![VisitStatus::InProgress, VisitStatus::Cancelled],
            VisitStatus::InProgress => vec![VisitStatus::Completed, VisitStatus::Cancelled],
            // Terminal states
            VisitStatus::Completed => vec![],
            VisitStatus::Cancelled => vec![],
        }
    }

    pub fn validate_status_transition(
        &self,
        current: &VisitStatus,
        next: &VisitStatus,
    ) -> Result<(), SchedulingError> {
        debug!("Validating status transition {} -> {}", current, next);

        if !self.valid_transitions(current).contains(next) {
            warn!("Invalid status transition attempted: {} -> {}", current, next);
            return Err(SchedulingError::InvalidStatusTransition(*current));
        }

        Ok(())
    }

    /// Visits that still occupy provider time may be cancelled.
    pub fn is_cancellable(&self, status: &VisitStatus) -> bool {
        status.is_active()
    }

    /// Only visits that have not started their day-of flow may move.
    pub fn is_reschedulable(&self, status: &VisitStatus) -> bool {
        matches!(status, VisitStatus::Scheduled)
    }

    /// Input validation shared by create and reschedule. Runs before any I/O.
    pub fn validate_booking_timing(
        &self,
        scheduled_at: DateTime<Utc>,
        duration_minutes: i32,
        now: DateTime<Utc>,
    ) -> Result<(), SchedulingError> {
        if duration_minutes <= 0 {
            return Err(SchedulingError::Validation(
                "duration_minutes must be positive".to_string(),
            ));
        }

        if duration_minutes > MAX_DURATION_MINUTES {
            return Err(SchedulingError::Validation(format!(
                "duration_minutes must not exceed {}",
                MAX_DURATION_MINUTES
            )));
        }

        if scheduled_at <= now {
            return Err(SchedulingError::Validation(
                "visit must be scheduled for a future time".to_string(),
            ));
        }

        Ok(())
    }
}

impl Default for VisitLifecycleService {
    fn default() -> Self {
        Self::new()
    }
}
