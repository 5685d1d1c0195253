// libs/scheduling-cell/src/services/availability.rs
use std::sync::Arc;

use chrono::{DateTime, Datelike, Duration, NaiveDate, TimeZone, Utc};
use chrono_tz::Tz;
use tracing::{debug, warn};

use calendar_cell::models::BusyInterval;
use calendar_cell::port::CalendarPort;
use shared_database::supabase::SupabaseClient;

use crate::models::{AvailableSlot, Provider, SchedulingError};
use crate::services::conflict::{overlaps_busy_interval, ConflictDetectionService};

/// Longest slot-browse range a single query may cover.
const MAX_RANGE_DAYS: i64 = 62;

/// Bookable start instants for one calendar day, walked in the provider's
/// timezone and returned as UTC instants.
///
/// Shifts whose local start falls in a DST spring-forward gap are skipped
/// for that day; ambiguous local times (fall-back) take the earlier mapping.
pub fn slots_for_day(
    provider: &Provider,
    tz: Tz,
    date: NaiveDate,
    duration_minutes: i32,
    granularity_minutes: i32,
    now: DateTime<Utc>,
    busy: &[BusyInterval],
) -> Vec<DateTime<Utc>> {
    let duration = Duration::minutes(duration_minutes as i64);
    let step = Duration::minutes(granularity_minutes as i64);

    let mut slots = Vec::new();

    for shift in provider.working_hours.shifts_for(date.weekday()) {
        if shift.end <= shift.start {
            continue;
        }

        let shift_start = match tz.from_local_datetime(&date.and_time(shift.start)).earliest() {
            Some(local) => local.with_timezone(&Utc),
            None => continue,
        };
        let shift_end = match tz.from_local_datetime(&date.and_time(shift.end)).earliest() {
            Some(local) => local.with_timezone(&Utc),
            None => continue,
        };

        let mut candidate = shift_start;
        while candidate + duration <= shift_end {
            let is_past = candidate <= now;
            let is_blocked = busy.iter().any(|interval| {
                overlaps_busy_interval(
                    candidate,
                    duration_minutes,
                    interval,
                    provider.buffer_before_minutes,
                    provider.buffer_after_minutes,
                )
            });

            if !is_past && !is_blocked {
                slots.push(candidate);
            }

            candidate += step;
        }
    }

    slots.sort();
    slots
}

pub struct SlotGenerationService {
    conflict_service: ConflictDetectionService,
    calendar: Arc<dyn CalendarPort>,
}

impl SlotGenerationService {
    pub fn new(supabase: Arc<SupabaseClient>, calendar: Arc<dyn CalendarPort>) -> Self {
        Self {
            conflict_service: ConflictDetectionService::new(supabase, Arc::clone(&calendar)),
            calendar,
        }
    }

    /// Generate the ordered list of bookable slots for a provider over a
    /// date range (inclusive on both ends, interpreted in the provider's
    /// timezone).
    pub async fn generate_slots(
        &self,
        provider: &Provider,
        start_date: NaiveDate,
        end_date: NaiveDate,
        duration_minutes: i32,
        granularity_minutes: Option<i32>,
        limit: Option<usize>,
        auth_token: &str,
    ) -> Result<Vec<AvailableSlot>, SchedulingError> {
        if duration_minutes <= 0 {
            return Err(SchedulingError::Validation(
                "duration_minutes must be positive".to_string(),
            ));
        }
        let granularity = granularity_minutes.unwrap_or(duration_minutes);
        if granularity <= 0 {
            return Err(SchedulingError::Validation(
                "granularity_minutes must be positive".to_string(),
            ));
        }
        if end_date < start_date {
            return Err(SchedulingError::Validation(
                "end_date must not precede start_date".to_string(),
            ));
        }
        if (end_date - start_date).num_days() > MAX_RANGE_DAYS {
            return Err(SchedulingError::Validation(format!(
                "date range exceeds {} days",
                MAX_RANGE_DAYS
            )));
        }

        let tz = provider.tz()?;

        // Fetch window in UTC with a day of slack on each side; the precise
        // timezone boundaries are handled by the per-day walk.
        let window_start = start_date
            .and_hms_opt(0, 0, 0)
            .map(|dt| dt.and_utc() - Duration::days(1))
            .ok_or_else(|| SchedulingError::Validation("invalid start_date".to_string()))?;
        let window_end = end_date
            .and_hms_opt(0, 0, 0)
            .map(|dt| dt.and_utc() + Duration::days(2))
            .ok_or_else(|| SchedulingError::Validation("invalid end_date".to_string()))?;

        let mut busy = self
            .conflict_service
            .internal_busy_intervals(provider.id, window_start, window_end, None, auth_token)
            .await?;

        if provider.calendar_connected {
            match self
                .calendar
                .get_busy_intervals(provider.id, window_start, window_end, auth_token)
                .await
            {
                Ok(external) => busy.extend(external),
                Err(e) => {
                    warn!(
                        "External calendar unavailable during slot generation for provider {}: {}",
                        provider.id, e
                    );
                }
            }
        }

        let now = Utc::now();
        let mut starts = Vec::new();
        let mut date = start_date;
        while date <= end_date {
            starts.extend(slots_for_day(
                provider,
                tz,
                date,
                duration_minutes,
                granularity,
                now,
                &busy,
            ));
            match date.succ_opt() {
                Some(next) => date = next,
                None => break,
            }
        }

        starts.sort();
        if let Some(cap) = limit {
            starts.truncate(cap);
        }

        debug!(
            "Generated {} slots for provider {} between {} and {}",
            starts.len(),
            provider.id,
            start_date,
            end_date
        );

        Ok(starts
            .into_iter()
            .map(|start_time| AvailableSlot {
                display_label: format_slot_label(start_time, &tz),
                start_time,
            })
            .collect())
    }
}

fn format_slot_label(start: DateTime<Utc>, tz: &Tz) -> String {
    start.with_timezone(tz).format("%a %b %-d, %-I:%M %p").to_string()
}
