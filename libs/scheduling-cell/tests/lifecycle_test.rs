use assert_matches::assert_matches;
use chrono::{Duration, Utc};

use scheduling_cell::models::{SchedulingError, VisitStatus};
use scheduling_cell::services::lifecycle::VisitLifecycleService;

#[test]
fn day_of_flow_transitions_are_valid() {
    let lifecycle = VisitLifecycleService::new();

    assert!(lifecycle
        .validate_status_transition(&VisitStatus::Scheduled, &VisitStatus::CheckedIn)
        .is_ok());
    assert!(lifecycle
        .validate_status_transition(&VisitStatus::CheckedIn, &VisitStatus::InProgress)
        .is_ok());
    assert!(lifecycle
        .validate_status_transition(&VisitStatus::InProgress, &VisitStatus::Completed)
        .is_ok());
}

#[test]
fn every_active_status_may_cancel() {
    let lifecycle = VisitLifecycleService::new();

    for status in [VisitStatus::Scheduled, VisitStatus::CheckedIn, VisitStatus::InProgress] {
        assert!(lifecycle.is_cancellable(&status), "{} should be cancellable", status);
        assert!(lifecycle
            .validate_status_transition(&status, &VisitStatus::Cancelled)
            .is_ok());
    }
}

#[test]
fn terminal_statuses_allow_no_transitions() {
    let lifecycle = VisitLifecycleService::new();

    for terminal in [VisitStatus::Completed, VisitStatus::Cancelled] {
        assert!(lifecycle.valid_transitions(&terminal).is_empty());
        assert!(!lifecycle.is_cancellable(&terminal));

        let result = lifecycle.validate_status_transition(&terminal, &VisitStatus::Scheduled);
        assert_matches!(result, Err(SchedulingError::InvalidStatusTransition(_)));
    }
}

#[test]
fn skipping_check_in_is_rejected() {
    let lifecycle = VisitLifecycleService::new();

    let result = lifecycle.validate_status_transition(&VisitStatus::Scheduled, &VisitStatus::Completed);
    assert_matches!(result, Err(SchedulingError::InvalidStatusTransition(VisitStatus::Scheduled)));
}

#[test]
fn only_scheduled_visits_are_reschedulable() {
    let lifecycle = VisitLifecycleService::new();

    assert!(lifecycle.is_reschedulable(&VisitStatus::Scheduled));
    for status in [
        VisitStatus::CheckedIn,
        VisitStatus::InProgress,
        VisitStatus::Completed,
        VisitStatus::Cancelled,
    ] {
        assert!(!lifecycle.is_reschedulable(&status));
    }
}

#[test]
fn booking_timing_rejects_past_and_nonsense_durations() {
    let lifecycle = VisitLifecycleService::new();
    let now = Utc::now();

    assert_matches!(
        lifecycle.validate_booking_timing(now - Duration::hours(1), 30, now),
        Err(SchedulingError::Validation(_))
    );
    assert_matches!(
        lifecycle.validate_booking_timing(now, 30, now),
        Err(SchedulingError::Validation(_))
    );
    assert_matches!(
        lifecycle.validate_booking_timing(now + Duration::hours(1), 0, now),
        Err(SchedulingError::Validation(_))
    );
    assert_matches!(
        lifecycle.validate_booking_timing(now + Duration::hours(1), -15, now),
        Err(SchedulingError::Validation(_))
    );
    assert_matches!(
        lifecycle.validate_booking_timing(now + Duration::hours(1), 481, now),
        Err(SchedulingError::Validation(_))
    );

    assert!(lifecycle
        .validate_booking_timing(now + Duration::hours(1), 30, now)
        .is_ok());
}
