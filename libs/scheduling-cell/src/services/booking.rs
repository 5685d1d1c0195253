// libs/scheduling-cell/src/services/booking.rs
use std::sync::Arc;

use chrono::Utc;
use reqwest::Method;
use serde_json::{json, Value};
use tracing::{debug, info, warn};
use uuid::Uuid;

use calendar_cell::models::CalendarEventRequest;
use calendar_cell::port::CalendarPort;
use calendar_cell::services::GoogleCalendarService;
use shared_config::AppConfig;
use shared_database::supabase::SupabaseClient;
use shared_models::auth::User;
use triage_cell::models::EMERGENCY_THRESHOLD;
use triage_cell::services::PriorityClassifier;

use crate::models::{
    default_duration_minutes, BookVisitRequest, BookingOutcome, Provider, SchedulingError,
    Visit, VisitStatus,
};
use crate::services::audit::AuditService;
use crate::services::conflict::ConflictDetectionService;
use crate::services::escalation::EscalationService;
use crate::services::lifecycle::VisitLifecycleService;
use crate::services::locks::SchedulingLockService;
use crate::services::resolution::ProviderResolutionService;

/// Owns the visit state machine: validates requested intervals, persists
/// state transitions, and mirrors them to the external calendar on a
/// best-effort basis. Calendar failures never fail a booking.
pub struct VisitBookingService {
    supabase: Arc<SupabaseClient>,
    conflict_service: ConflictDetectionService,
    lifecycle_service: VisitLifecycleService,
    lock_service: SchedulingLockService,
    resolution_service: ProviderResolutionService,
    escalation_service: EscalationService,
    audit_service: AuditService,
    calendar: Arc<dyn CalendarPort>,
    classifier: PriorityClassifier,
}

impl VisitBookingService {
    pub fn new(config: &AppConfig) -> Self {
        let supabase = Arc::new(SupabaseClient::new(config));
        let calendar: Arc<dyn CalendarPort> =
            Arc::new(GoogleCalendarService::new(config, Arc::clone(&supabase)));
        Self::with_calendar_port(config, calendar)
    }

    /// Build the service around a substitute calendar adapter. The seam the
    /// tests use to simulate an unreachable calendar.
    pub fn with_calendar_port(config: &AppConfig, calendar: Arc<dyn CalendarPort>) -> Self {
        let supabase = Arc::new(SupabaseClient::new(config));

        Self {
            conflict_service: ConflictDetectionService::new(
                Arc::clone(&supabase),
                Arc::clone(&calendar),
            ),
            lifecycle_service: VisitLifecycleService::new(),
            lock_service: SchedulingLockService::new(Arc::clone(&supabase)),
            resolution_service: ProviderResolutionService::new(Arc::clone(&supabase)),
            escalation_service: EscalationService::new(Arc::clone(&supabase)),
            audit_service: AuditService::new(Arc::clone(&supabase)),
            supabase,
            calendar,
            classifier: PriorityClassifier::new(),
        }
    }

    pub fn conflict_service(&self) -> &ConflictDetectionService {
        &self.conflict_service
    }

    pub fn resolution_service(&self) -> &ProviderResolutionService {
        &self.resolution_service
    }

    /// Book a visit, or route the patient to urgent escalation when their
    /// symptoms score in the emergency band.
    pub async fn book_visit(
        &self,
        request: BookVisitRequest,
        actor: &User,
        auth_token: &str,
    ) -> Result<BookingOutcome, SchedulingError> {
        info!(
            "Booking visit for patient {} with provider {:?}",
            request.patient_id, request.provider_id
        );

        // Step 1: input validation, before any I/O
        let duration_minutes = request
            .duration_minutes
            .unwrap_or_else(|| default_duration_minutes(&request.visit_type));
        self.lifecycle_service
            .validate_booking_timing(request.scheduled_at, duration_minutes, Utc::now())?;

        if let Some(score) = request.priority_score {
            if !(1..=10).contains(&score) {
                return Err(SchedulingError::Validation(
                    "priority_score must be between 1 and 10".to_string(),
                ));
            }
        }

        // Step 2: triage. A caller-supplied score wins over classification.
        let priority_score = request
            .priority_score
            .unwrap_or_else(|| self.classifier.score(&request.reason_for_visit));

        // Step 3: emergency diversion - no visit is created
        if priority_score >= EMERGENCY_THRESHOLD {
            warn!(
                "Emergency priority {} for patient {}, routing to escalation",
                priority_score, request.patient_id
            );

            let escalation = self
                .escalation_service
                .enqueue(request.patient_id, &request.reason_for_visit, priority_score, auth_token)
                .await?;

            self.audit_service
                .record(
                    actor.role.as_deref().unwrap_or("patient"),
                    &actor.id,
                    "booking.emergency_routed",
                    "escalation",
                    &escalation.id.to_string(),
                    json!({ "urgency_score": priority_score }),
                    auth_token,
                )
                .await;

            return Ok(BookingOutcome::EmergencyRouted {
                escalation,
                message: "Your symptoms need immediate attention. A clinician has been alerted; \
                          if this is life-threatening call emergency services now."
                    .to_string(),
            });
        }

        // Step 4: provider resolution
        let provider = self
            .resolution_service
            .resolve(request.provider_id, request.patient_id, auth_token)
            .await?;

        // Step 5: commit under the provider's scheduling lock. Slot listings
        // are snapshots; only this re-validation is authoritative.
        self.lock_service.acquire(provider.id).await?;

        let commit_result = self
            .validate_and_insert(&request, &provider, duration_minutes, priority_score, auth_token)
            .await;

        self.release_lock(provider.id).await;

        let mut visit = commit_result?;

        // Step 6: audit trail
        self.audit_service
            .record(
                actor.role.as_deref().unwrap_or("patient"),
                &actor.id,
                "visit.created",
                "visit",
                &visit.id.to_string(),
                json!({
                    "scheduled_at": visit.scheduled_at.to_rfc3339(),
                    "duration_minutes": visit.duration_minutes,
                    "provider_id": provider.id,
                }),
                auth_token,
            )
            .await;

        // Step 7: best-effort calendar mirroring, after the durable commit
        if provider.calendar_connected {
            visit = self.mirror_create(visit, &provider, auth_token).await;
        }

        info!("Visit {} booked with provider {}", visit.id, provider.id);
        Ok(BookingOutcome::Scheduled { visit })
    }

    /// Move a scheduled visit to a new start time.
    pub async fn reschedule_visit(
        &self,
        visit_id: Uuid,
        new_scheduled_at: chrono::DateTime<Utc>,
        actor: &User,
        auth_token: &str,
    ) -> Result<Visit, SchedulingError> {
        debug!("Rescheduling visit {} to {}", visit_id, new_scheduled_at);

        let visit = self.get_visit(visit_id, auth_token).await?;

        if !self.lifecycle_service.is_reschedulable(&visit.status) {
            return Err(SchedulingError::InvalidStatusTransition(visit.status));
        }

        self.lifecycle_service
            .validate_booking_timing(new_scheduled_at, visit.duration_minutes, Utc::now())?;

        let previous_scheduled_at = visit.scheduled_at;

        let updated = match visit.provider_id {
            Some(provider_id) => {
                let provider = self.resolution_service.get_provider(provider_id, auth_token).await?;

                // The visit being moved is excluded from its own conflict set.
                self.lock_service.acquire(provider.id).await?;

                let check = self
                    .conflict_service
                    .check_interval(
                        &provider,
                        new_scheduled_at,
                        visit.duration_minutes,
                        Some(visit.id),
                        auth_token,
                    )
                    .await;

                let patch_result = match check {
                    Ok(check) if check.available => {
                        self.patch_visit(
                            visit.id,
                            json!({
                                "scheduled_at": new_scheduled_at.to_rfc3339(),
                                "updated_at": Utc::now().to_rfc3339(),
                            }),
                            auth_token,
                        )
                        .await
                    }
                    Ok(check) => Err(SchedulingError::SlotUnavailable(
                        check.conflict_reason.unwrap_or_else(|| "slot conflict".to_string()),
                    )),
                    Err(e) => Err(e),
                };

                self.release_lock(provider.id).await;
                let updated = patch_result?;

                if let Some(event_id) = updated.calendar_event_id.as_deref() {
                    if provider.calendar_connected {
                        self.mirror_update(&updated, &provider, event_id, auth_token).await;
                    }
                }

                updated
            }
            None => {
                self.patch_visit(
                    visit.id,
                    json!({
                        "scheduled_at": new_scheduled_at.to_rfc3339(),
                        "updated_at": Utc::now().to_rfc3339(),
                    }),
                    auth_token,
                )
                .await?
            }
        };

        self.audit_service
            .record(
                actor.role.as_deref().unwrap_or("patient"),
                &actor.id,
                "visit.rescheduled",
                "visit",
                &updated.id.to_string(),
                json!({
                    "from": previous_scheduled_at.to_rfc3339(),
                    "to": new_scheduled_at.to_rfc3339(),
                }),
                auth_token,
            )
            .await;

        info!("Visit {} rescheduled to {}", updated.id, new_scheduled_at);
        Ok(updated)
    }

    /// Cancel a visit that has not yet completed.
    pub async fn cancel_visit(
        &self,
        visit_id: Uuid,
        actor: &User,
        auth_token: &str,
    ) -> Result<Visit, SchedulingError> {
        debug!("Cancelling visit {}", visit_id);

        let visit = self.get_visit(visit_id, auth_token).await?;

        if !self.lifecycle_service.is_cancellable(&visit.status) {
            return Err(SchedulingError::InvalidStatusTransition(visit.status));
        }

        let cancelled = self
            .patch_visit(
                visit.id,
                json!({
                    "status": VisitStatus::Cancelled.to_string(),
                    "cancelled_at": Utc::now().to_rfc3339(),
                    "updated_at": Utc::now().to_rfc3339(),
                }),
                auth_token,
            )
            .await?;

        self.audit_service
            .record(
                actor.role.as_deref().unwrap_or("patient"),
                &actor.id,
                "visit.cancelled",
                "visit",
                &cancelled.id.to_string(),
                json!({ "previous_status": visit.status.to_string() }),
                auth_token,
            )
            .await;

        if let (Some(event_id), Some(provider_id)) =
            (cancelled.calendar_event_id.as_deref(), cancelled.provider_id)
        {
            if let Err(e) = self.calendar.delete_event(provider_id, event_id, auth_token).await {
                warn!("Calendar delete failed for visit {}: {}", cancelled.id, e);
            }
        }

        info!("Visit {} cancelled", cancelled.id);
        Ok(cancelled)
    }

    /// Advance a visit through its day-of flow (check-in, start, complete).
    /// Cancellation goes through `cancel_visit` so the mirrored event is
    /// cleaned up.
    pub async fn advance_visit_status(
        &self,
        visit_id: Uuid,
        next_status: VisitStatus,
        actor: &User,
        auth_token: &str,
    ) -> Result<Visit, SchedulingError> {
        if next_status == VisitStatus::Cancelled {
            return self.cancel_visit(visit_id, actor, auth_token).await;
        }

        let visit = self.get_visit(visit_id, auth_token).await?;

        self.lifecycle_service
            .validate_status_transition(&visit.status, &next_status)?;

        let mut patch = json!({
            "status": next_status.to_string(),
            "updated_at": Utc::now().to_rfc3339(),
        });
        if next_status == VisitStatus::Completed {
            patch["completed_at"] = json!(Utc::now().to_rfc3339());
        }

        let updated = self.patch_visit(visit.id, patch, auth_token).await?;

        self.audit_service
            .record(
                actor.role.as_deref().unwrap_or("staff"),
                &actor.id,
                "visit.status_advanced",
                "visit",
                &updated.id.to_string(),
                json!({
                    "from": visit.status.to_string(),
                    "to": next_status.to_string(),
                }),
                auth_token,
            )
            .await;

        Ok(updated)
    }

    pub async fn get_visit(&self, visit_id: Uuid, auth_token: &str) -> Result<Visit, SchedulingError> {
        let path = format!("/rest/v1/visits?id=eq.{}", visit_id);
        let result: Vec<Value> = self
            .supabase
            .request(Method::GET, &path, Some(auth_token), None)
            .await
            .map_err(|e| SchedulingError::Database(e.to_string()))?;

        let row = result.into_iter().next().ok_or(SchedulingError::VisitNotFound)?;

        serde_json::from_value(row)
            .map_err(|e| SchedulingError::Database(format!("failed to parse visit: {}", e)))
    }

    // ==============================================================================
    // PRIVATE HELPER METHODS
    // ==============================================================================

    async fn validate_and_insert(
        &self,
        request: &BookVisitRequest,
        provider: &Provider,
        duration_minutes: i32,
        priority_score: i32,
        auth_token: &str,
    ) -> Result<Visit, SchedulingError> {
        let check = self
            .conflict_service
            .check_interval(provider, request.scheduled_at, duration_minutes, None, auth_token)
            .await?;

        if !check.available {
            let reason = check.conflict_reason.unwrap_or_else(|| "slot conflict".to_string());
            warn!(
                "Slot conflict for provider {} at {}: {}",
                provider.id, request.scheduled_at, reason
            );
            return Err(SchedulingError::SlotUnavailable(reason));
        }

        let now = Utc::now();
        let visit_data = json!({
            "id": Uuid::new_v4(),
            "patient_id": request.patient_id,
            "provider_id": provider.id,
            "scheduled_at": request.scheduled_at.to_rfc3339(),
            "duration_minutes": duration_minutes,
            "status": VisitStatus::Scheduled.to_string(),
            "visit_type": &request.visit_type,
            "reason_for_visit": &request.reason_for_visit,
            "priority_score": priority_score,
            "calendar_event_id": null,
            "cancelled_at": null,
            "completed_at": null,
            "created_at": now.to_rfc3339(),
            "updated_at": now.to_rfc3339(),
        });

        let result = self
            .supabase
            .insert_returning("/rest/v1/visits", Some(auth_token), visit_data)
            .await
            .map_err(|e| SchedulingError::Database(format!("visit insert failed: {}", e)))?;

        let row = result.into_iter().next().ok_or_else(|| {
            SchedulingError::Database("visit insert returned no row".to_string())
        })?;

        serde_json::from_value(row)
            .map_err(|e| SchedulingError::Database(format!("failed to parse visit: {}", e)))
    }

    async fn patch_visit(
        &self,
        visit_id: Uuid,
        body: Value,
        auth_token: &str,
    ) -> Result<Visit, SchedulingError> {
        let path = format!("/rest/v1/visits?id=eq.{}", visit_id);
        let result = self
            .supabase
            .update_returning(&path, Some(auth_token), body)
            .await
            .map_err(|e| SchedulingError::Database(format!("visit update failed: {}", e)))?;

        let row = result.into_iter().next().ok_or(SchedulingError::VisitNotFound)?;

        serde_json::from_value(row)
            .map_err(|e| SchedulingError::Database(format!("failed to parse visit: {}", e)))
    }

    async fn release_lock(&self, provider_id: Uuid) {
        if let Err(e) = self.lock_service.release(provider_id).await {
            // The row expires on its own; losing the delete only delays the
            // next booking by the lock timeout.
            warn!("Failed to release scheduling lock for provider {}: {}", provider_id, e);
        }
    }

    async fn mirror_create(&self, visit: Visit, provider: &Provider, auth_token: &str) -> Visit {
        let event = Self::event_for(&visit, provider);

        match self.calendar.create_event(provider.id, &event, auth_token).await {
            Ok(event_id) => {
                match self
                    .patch_visit(visit.id, json!({ "calendar_event_id": event_id }), auth_token)
                    .await
                {
                    Ok(updated) => updated,
                    Err(e) => {
                        warn!(
                            "Visit {} mirrored but event id could not be stored: {}",
                            visit.id, e
                        );
                        visit
                    }
                }
            }
            Err(e) => {
                warn!("Calendar mirroring failed for visit {}: {}", visit.id, e);
                visit
            }
        }
    }

    async fn mirror_update(
        &self,
        visit: &Visit,
        provider: &Provider,
        event_id: &str,
        auth_token: &str,
    ) {
        let event = Self::event_for(visit, provider);

        if let Err(e) = self
            .calendar
            .update_event(provider.id, event_id, &event, auth_token)
            .await
        {
            warn!("Calendar update failed for visit {}: {}", visit.id, e);
        }
    }

    /// Event payload mirrored for a visit. Symptom text stays out of the
    /// external calendar.
    fn event_for(visit: &Visit, provider: &Provider) -> CalendarEventRequest {
        CalendarEventRequest {
            visit_id: visit.id,
            summary: format!("Clinic visit ({})", visit.visit_type),
            description: Some(format!("Booked with {}", provider.full_name)),
            start: visit.scheduled_at,
            end: visit.scheduled_end(),
        }
    }
}
