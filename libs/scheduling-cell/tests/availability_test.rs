use chrono::{DateTime, NaiveDate, NaiveTime, TimeZone, Utc};
use chrono_tz::Tz;
use uuid::Uuid;

use calendar_cell::models::{BusyInterval, BusySource};
use scheduling_cell::models::{Provider, ShiftHours, WeeklyHours};
use scheduling_cell::services::availability::slots_for_day;

fn shift(start: &str, end: &str) -> ShiftHours {
    ShiftHours {
        start: NaiveTime::parse_from_str(start, "%H:%M").unwrap(),
        end: NaiveTime::parse_from_str(end, "%H:%M").unwrap(),
    }
}

fn weekday_provider(timezone: &str, buffer_before: i32, buffer_after: i32) -> Provider {
    let weekday_shift = vec![shift("09:00", "17:00")];
    Provider {
        id: Uuid::new_v4(),
        full_name: "Dr. Test Provider".to_string(),
        timezone: timezone.to_string(),
        buffer_before_minutes: buffer_before,
        buffer_after_minutes: buffer_after,
        working_hours: WeeklyHours {
            monday: weekday_shift.clone(),
            tuesday: weekday_shift.clone(),
            wednesday: weekday_shift.clone(),
            thursday: weekday_shift.clone(),
            friday: weekday_shift,
            ..WeeklyHours::default()
        },
        calendar_connected: false,
    }
}

fn busy(start: DateTime<Utc>, end: DateTime<Utc>, source: BusySource) -> BusyInterval {
    BusyInterval { start, end, source }
}

// A Monday well in the future so the past-slot filter stays out of the way.
const MONDAY: &str = "2027-01-04";

fn monday() -> NaiveDate {
    MONDAY.parse().unwrap()
}

fn long_ago() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2026, 1, 1, 0, 0, 0).unwrap()
}

#[test]
fn full_open_monday_yields_sixteen_half_hour_slots() {
    let provider = weekday_provider("UTC", 0, 0);
    let tz: Tz = provider.tz().unwrap();

    let slots = slots_for_day(&provider, tz, monday(), 30, 30, long_ago(), &[]);

    assert_eq!(slots.len(), 16);
    assert_eq!(slots[0], Utc.with_ymd_and_hms(2027, 1, 4, 9, 0, 0).unwrap());
    assert_eq!(slots[15], Utc.with_ymd_and_hms(2027, 1, 4, 16, 30, 0).unwrap());
}

#[test]
fn slots_convert_provider_wall_clock_to_utc() {
    let provider = weekday_provider("America/New_York", 0, 0);
    let tz: Tz = provider.tz().unwrap();

    let slots = slots_for_day(&provider, tz, monday(), 30, 30, long_ago(), &[]);

    // 09:00 EST is 14:00 UTC in January
    assert_eq!(slots[0], Utc.with_ymd_and_hms(2027, 1, 4, 14, 0, 0).unwrap());
    assert_eq!(slots.len(), 16);
}

#[test]
fn weekend_day_with_no_shifts_yields_no_slots() {
    let provider = weekday_provider("UTC", 0, 0);
    let tz: Tz = provider.tz().unwrap();
    let sunday: NaiveDate = "2027-01-03".parse().unwrap();

    let slots = slots_for_day(&provider, tz, sunday, 30, 30, long_ago(), &[]);

    assert!(slots.is_empty());
}

#[test]
fn duration_longer_than_any_shift_yields_no_slots() {
    let provider = weekday_provider("UTC", 0, 0);
    let tz: Tz = provider.tz().unwrap();

    // 8-hour shift, 9-hour appointment
    let slots = slots_for_day(&provider, tz, monday(), 540, 30, long_ago(), &[]);

    assert!(slots.is_empty());
}

#[test]
fn candidate_must_fit_entirely_inside_the_shift() {
    let provider = weekday_provider("UTC", 0, 0);
    let tz: Tz = provider.tz().unwrap();

    // 60-minute appointments at 30-minute granularity: last start is 16:00
    let slots = slots_for_day(&provider, tz, monday(), 60, 30, long_ago(), &[]);

    assert_eq!(*slots.last().unwrap(), Utc.with_ymd_and_hms(2027, 1, 4, 16, 0, 0).unwrap());
}

#[test]
fn past_candidates_are_dropped() {
    let provider = weekday_provider("UTC", 0, 0);
    let tz: Tz = provider.tz().unwrap();
    let midday = Utc.with_ymd_and_hms(2027, 1, 4, 12, 0, 0).unwrap();

    let slots = slots_for_day(&provider, tz, monday(), 30, 30, midday, &[]);

    // 12:00 itself is not strictly after "now"; 12:30 through 16:30 remain
    assert_eq!(slots.len(), 9);
    assert_eq!(slots[0], Utc.with_ymd_and_hms(2027, 1, 4, 12, 30, 0).unwrap());
}

#[test]
fn busy_intervals_block_overlapping_candidates() {
    let provider = weekday_provider("UTC", 0, 0);
    let tz: Tz = provider.tz().unwrap();

    let blocked = busy(
        Utc.with_ymd_and_hms(2027, 1, 4, 10, 0, 0).unwrap(),
        Utc.with_ymd_and_hms(2027, 1, 4, 10, 30, 0).unwrap(),
        BusySource::Internal,
    );

    let slots = slots_for_day(&provider, tz, monday(), 30, 30, long_ago(), &[blocked]);

    assert_eq!(slots.len(), 15);
    assert!(!slots.contains(&Utc.with_ymd_and_hms(2027, 1, 4, 10, 0, 0).unwrap()));
    // Adjacent slots survive: half-open intervals, no buffers
    assert!(slots.contains(&Utc.with_ymd_and_hms(2027, 1, 4, 9, 30, 0).unwrap()));
    assert!(slots.contains(&Utc.with_ymd_and_hms(2027, 1, 4, 10, 30, 0).unwrap()));
}

#[test]
fn external_busy_intervals_block_like_internal_ones() {
    let provider = weekday_provider("UTC", 0, 0);
    let tz: Tz = provider.tz().unwrap();

    let blocked = busy(
        Utc.with_ymd_and_hms(2027, 1, 4, 14, 0, 0).unwrap(),
        Utc.with_ymd_and_hms(2027, 1, 4, 15, 0, 0).unwrap(),
        BusySource::External,
    );

    let slots = slots_for_day(&provider, tz, monday(), 30, 30, long_ago(), &[blocked]);

    assert!(!slots.contains(&Utc.with_ymd_and_hms(2027, 1, 4, 14, 0, 0).unwrap()));
    assert!(!slots.contains(&Utc.with_ymd_and_hms(2027, 1, 4, 14, 30, 0).unwrap()));
}

#[test]
fn buffers_block_slots_adjacent_to_busy_time() {
    let provider = weekday_provider("UTC", 10, 10);
    let tz: Tz = provider.tz().unwrap();

    let blocked = busy(
        Utc.with_ymd_and_hms(2027, 1, 4, 10, 0, 0).unwrap(),
        Utc.with_ymd_and_hms(2027, 1, 4, 10, 30, 0).unwrap(),
        BusySource::Internal,
    );

    let slots = slots_for_day(&provider, tz, monday(), 30, 30, long_ago(), &[blocked]);

    // With 10-minute buffers the neighbouring half-hours fall too
    assert!(!slots.contains(&Utc.with_ymd_and_hms(2027, 1, 4, 9, 30, 0).unwrap()));
    assert!(!slots.contains(&Utc.with_ymd_and_hms(2027, 1, 4, 10, 30, 0).unwrap()));
    assert!(slots.contains(&Utc.with_ymd_and_hms(2027, 1, 4, 9, 0, 0).unwrap()));
}

#[test]
fn growing_buffers_never_add_slots() {
    let blocked = vec![
        busy(
            Utc.with_ymd_and_hms(2027, 1, 4, 10, 0, 0).unwrap(),
            Utc.with_ymd_and_hms(2027, 1, 4, 10, 30, 0).unwrap(),
            BusySource::Internal,
        ),
        busy(
            Utc.with_ymd_and_hms(2027, 1, 4, 14, 15, 0).unwrap(),
            Utc.with_ymd_and_hms(2027, 1, 4, 15, 5, 0).unwrap(),
            BusySource::External,
        ),
    ];

    let mut previous_count = usize::MAX;
    for buffer in [0, 5, 10, 20, 40] {
        let provider = weekday_provider("UTC", buffer, buffer);
        let tz: Tz = provider.tz().unwrap();
        let count = slots_for_day(&provider, tz, monday(), 30, 30, long_ago(), &blocked).len();

        assert!(
            count <= previous_count,
            "buffer {} produced {} slots, more than {}",
            buffer,
            count,
            previous_count
        );
        previous_count = count;
    }
}

#[test]
fn finer_granularity_walks_more_candidates() {
    let provider = weekday_provider("UTC", 0, 0);
    let tz: Tz = provider.tz().unwrap();

    // 30-minute appointments browsed on a 15-minute grid: starts 09:00
    // through 16:30 every 15 minutes
    let slots = slots_for_day(&provider, tz, monday(), 30, 15, long_ago(), &[]);

    assert_eq!(slots.len(), 31);
    assert!(slots.contains(&Utc.with_ymd_and_hms(2027, 1, 4, 9, 15, 0).unwrap()));
}

#[test]
fn split_shifts_produce_two_slot_runs() {
    let mut provider = weekday_provider("UTC", 0, 0);
    provider.working_hours.monday = vec![shift("09:00", "12:00"), shift("13:00", "17:00")];
    let tz: Tz = provider.tz().unwrap();

    let slots = slots_for_day(&provider, tz, monday(), 30, 30, long_ago(), &[]);

    // 6 morning starts + 8 afternoon starts, nothing over lunch
    assert_eq!(slots.len(), 14);
    assert!(!slots.contains(&Utc.with_ymd_and_hms(2027, 1, 4, 12, 0, 0).unwrap()));
    assert!(!slots.contains(&Utc.with_ymd_and_hms(2027, 1, 4, 12, 30, 0).unwrap()));
}

#[test]
fn dst_gap_shift_is_skipped_not_misplaced() {
    // US spring-forward: 2027-03-14, 02:00-03:00 local does not exist.
    let mut provider = weekday_provider("America/New_York", 0, 0);
    let gap_day: NaiveDate = "2027-03-14".parse().unwrap();
    provider.working_hours.sunday = vec![shift("02:00", "03:00")];
    let tz: Tz = provider.tz().unwrap();

    let slots = slots_for_day(&provider, tz, gap_day, 30, 30, long_ago(), &[]);

    assert!(slots.is_empty());
}

#[test]
fn all_slots_fall_within_working_hours_in_provider_timezone() {
    let provider = weekday_provider("America/Los_Angeles", 0, 0);
    let tz: Tz = provider.tz().unwrap();

    let slots = slots_for_day(&provider, tz, monday(), 45, 15, long_ago(), &[]);

    assert!(!slots.is_empty());
    for slot in &slots {
        let local = slot.with_timezone(&tz).time();
        let end_local = (*slot + chrono::Duration::minutes(45)).with_timezone(&tz).time();
        assert!(local >= NaiveTime::parse_from_str("09:00", "%H:%M").unwrap());
        assert!(end_local <= NaiveTime::parse_from_str("17:00", "%H:%M").unwrap());
    }
}
