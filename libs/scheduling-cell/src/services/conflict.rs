// libs/scheduling-cell/src/services/conflict.rs
use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use reqwest::Method;
use serde_json::Value;
use tracing::{debug, warn};
use uuid::Uuid;

use calendar_cell::models::{BusyInterval, BusySource};
use calendar_cell::port::CalendarPort;
use shared_database::supabase::SupabaseClient;

use crate::models::{Provider, SchedulingError, SlotCheck, Visit, ACTIVE_STATUS_FILTER};

/// No visit is longer than this; conflict queries widen their window by it
/// so a long visit straddling the window start is still fetched.
const MAX_VISIT_SPAN_MINUTES: i64 = 24 * 60;

/// Half-open overlap test on UTC instants. Touching endpoints do not count.
fn windows_overlap(
    a_from: DateTime<Utc>,
    a_to: DateTime<Utc>,
    b_from: DateTime<Utc>,
    b_to: DateTime<Utc>,
) -> bool {
    a_from < b_to && b_from < a_to
}

/// Test whether interval `a`, expanded by the given buffers, overlaps
/// interval `b`. Both intervals are (start, duration); all arithmetic is on
/// absolute UTC instants - wall-clock values must never reach this function.
pub fn intervals_overlap(
    a_start: DateTime<Utc>,
    a_duration_minutes: i32,
    b_start: DateTime<Utc>,
    b_duration_minutes: i32,
    buffer_before_minutes: i32,
    buffer_after_minutes: i32,
) -> bool {
    let a_from = a_start - Duration::minutes(buffer_before_minutes as i64);
    let a_to = a_start
        + Duration::minutes(a_duration_minutes as i64)
        + Duration::minutes(buffer_after_minutes as i64);
    let b_to = b_start + Duration::minutes(b_duration_minutes as i64);

    windows_overlap(a_from, a_to, b_start, b_to)
}

/// Buffered overlap of a candidate (start, duration) against a busy interval.
pub fn overlaps_busy_interval(
    start: DateTime<Utc>,
    duration_minutes: i32,
    busy: &BusyInterval,
    buffer_before_minutes: i32,
    buffer_after_minutes: i32,
) -> bool {
    let from = start - Duration::minutes(buffer_before_minutes as i64);
    let to = start
        + Duration::minutes(duration_minutes as i64)
        + Duration::minutes(buffer_after_minutes as i64);

    windows_overlap(from, to, busy.start, busy.end)
}

pub struct ConflictDetectionService {
    supabase: Arc<SupabaseClient>,
    calendar: Arc<dyn CalendarPort>,
}

impl ConflictDetectionService {
    pub fn new(supabase: Arc<SupabaseClient>, calendar: Arc<dyn CalendarPort>) -> Self {
        Self { supabase, calendar }
    }

    /// Fetch the provider's active visits that could overlap the window.
    pub async fn active_visits_around(
        &self,
        provider_id: Uuid,
        window_start: DateTime<Utc>,
        window_end: DateTime<Utc>,
        exclude_visit_id: Option<Uuid>,
        auth_token: &str,
    ) -> Result<Vec<Visit>, SchedulingError> {
        let fetch_from = window_start - Duration::minutes(MAX_VISIT_SPAN_MINUTES);

        let mut query_parts = vec![
            format!("provider_id=eq.{}", provider_id),
            ACTIVE_STATUS_FILTER.to_string(),
            format!("scheduled_at=gte.{}", urlencoding::encode(&fetch_from.to_rfc3339())),
            format!("scheduled_at=lt.{}", urlencoding::encode(&window_end.to_rfc3339())),
        ];

        if let Some(exclude_id) = exclude_visit_id {
            query_parts.push(format!("id=neq.{}", exclude_id));
        }

        let path = format!("/rest/v1/visits?{}&order=scheduled_at.asc", query_parts.join("&"));

        let result: Vec<Value> = self
            .supabase
            .request(Method::GET, &path, Some(auth_token), None)
            .await
            .map_err(|e| SchedulingError::Database(e.to_string()))?;

        let visits: Vec<Visit> = result
            .into_iter()
            .map(serde_json::from_value)
            .collect::<Result<Vec<Visit>, _>>()
            .map_err(|e| SchedulingError::Database(format!("failed to parse visits: {}", e)))?;

        // The store already filters by status; re-check here so a stale or
        // permissive row set can never produce a phantom conflict.
        Ok(visits.into_iter().filter(|v| v.status.is_active()).collect())
    }

    /// Internal busy intervals for a window, from active visit rows.
    pub async fn internal_busy_intervals(
        &self,
        provider_id: Uuid,
        window_start: DateTime<Utc>,
        window_end: DateTime<Utc>,
        exclude_visit_id: Option<Uuid>,
        auth_token: &str,
    ) -> Result<Vec<BusyInterval>, SchedulingError> {
        let visits = self
            .active_visits_around(provider_id, window_start, window_end, exclude_visit_id, auth_token)
            .await?;

        Ok(visits
            .iter()
            .map(|v| BusyInterval {
                start: v.scheduled_at,
                end: v.scheduled_end(),
                source: BusySource::Internal,
            })
            .collect())
    }

    /// Validate one candidate interval against internal visits and, when the
    /// provider's calendar is connected, external busy time.
    ///
    /// An unreachable calendar degrades to internal-only checking: slot
    /// validation must never fail solely because the external calendar is
    /// down.
    pub async fn check_interval(
        &self,
        provider: &Provider,
        start: DateTime<Utc>,
        duration_minutes: i32,
        exclude_visit_id: Option<Uuid>,
        auth_token: &str,
    ) -> Result<SlotCheck, SchedulingError> {
        let end = start + Duration::minutes(duration_minutes as i64);
        debug!(
            "Checking interval {} - {} for provider {} (buffers {}/{})",
            start, end, provider.id, provider.buffer_before_minutes, provider.buffer_after_minutes
        );

        let visits = self
            .active_visits_around(provider.id, start, end + buffered_margin(provider), exclude_visit_id, auth_token)
            .await?;

        for visit in &visits {
            if intervals_overlap(
                start,
                duration_minutes,
                visit.scheduled_at,
                visit.duration_minutes,
                provider.buffer_before_minutes,
                provider.buffer_after_minutes,
            ) {
                debug!("Conflict with visit {} at {}", visit.id, visit.scheduled_at);
                return Ok(SlotCheck::conflict("conflicts with an existing visit"));
            }
        }

        if provider.calendar_connected {
            let query_start = start - Duration::minutes(provider.buffer_before_minutes as i64);
            let query_end = end + Duration::minutes(provider.buffer_after_minutes as i64);

            match self
                .calendar
                .get_busy_intervals(provider.id, query_start, query_end, auth_token)
                .await
            {
                Ok(busy_intervals) => {
                    for busy in &busy_intervals {
                        if overlaps_busy_interval(
                            start,
                            duration_minutes,
                            busy,
                            provider.buffer_before_minutes,
                            provider.buffer_after_minutes,
                        ) {
                            return Ok(SlotCheck::conflict("provider calendar shows busy"));
                        }
                    }
                }
                Err(e) => {
                    warn!(
                        "External calendar unavailable during conflict check for provider {}: {}",
                        provider.id, e
                    );
                }
            }
        }

        Ok(SlotCheck::available())
    }
}

fn buffered_margin(provider: &Provider) -> Duration {
    Duration::minutes((provider.buffer_before_minutes + provider.buffer_after_minutes) as i64)
}
