// libs/scheduling-cell/src/handlers.rs
use std::sync::Arc;

use axum::{
    extract::{Extension, Path, Query, State},
    Json,
};
use axum_extra::TypedHeader;
use chrono::{DateTime, NaiveDate, Utc};
use headers::{authorization::Bearer, Authorization};
use serde::Deserialize;
use serde_json::{json, Value};
use uuid::Uuid;

use calendar_cell::port::CalendarPort;
use calendar_cell::services::GoogleCalendarService;
use shared_config::AppConfig;
use shared_database::supabase::SupabaseClient;
use shared_models::auth::User;
use shared_models::error::AppError;

use crate::models::{
    AdvanceStatusRequest, BookVisitRequest, RescheduleVisitRequest, SchedulingError, Visit,
};
use crate::services::availability::SlotGenerationService;
use crate::services::booking::VisitBookingService;
use crate::services::resolution::ProviderResolutionService;

// ==============================================================================
// QUERY PARAMETER STRUCTS
// ==============================================================================

#[derive(Debug, Deserialize)]
pub struct AvailabilityQueryParams {
    pub scheduled_at: DateTime<Utc>,
    pub duration_minutes: i32,
    pub provider_id: Option<Uuid>,
}

#[derive(Debug, Deserialize)]
pub struct SlotQueryParams {
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    pub duration_minutes: i32,
    pub granularity_minutes: Option<i32>,
    pub limit: Option<usize>,
    pub provider_id: Option<Uuid>,
}

fn map_scheduling_error(e: SchedulingError) -> AppError {
    match e {
        SchedulingError::Validation(msg) => AppError::BadRequest(msg),
        SchedulingError::SlotUnavailable(msg) => {
            AppError::Conflict(format!("Slot not available: {}", msg))
        }
        SchedulingError::VisitNotFound => AppError::NotFound("Visit not found".to_string()),
        SchedulingError::ProviderNotFound => AppError::NotFound("Provider not found".to_string()),
        SchedulingError::InvalidStatusTransition(status) => {
            AppError::Conflict(format!("Visit cannot be modified in status {}", status))
        }
        SchedulingError::CalendarUnavailable(msg) => AppError::ExternalService(msg),
        SchedulingError::Database(msg) => AppError::Internal(msg),
    }
}

fn actor_patient_id(user: &User) -> Result<Uuid, AppError> {
    Uuid::parse_str(&user.id)
        .map_err(|_| AppError::BadRequest("actor id is not a valid uuid".to_string()))
}

fn authorize_visit_access(user: &User, visit: &Visit) -> Result<(), AppError> {
    let is_patient = visit.patient_id.to_string() == user.id;
    let is_provider = visit
        .provider_id
        .map(|id| id.to_string() == user.id)
        .unwrap_or(false);

    if !is_patient && !is_provider && !user.is_staff() {
        return Err(AppError::Auth("Not authorized to access this visit".to_string()));
    }
    Ok(())
}

// ==============================================================================
// BOOKING HANDLERS
// ==============================================================================

#[axum::debug_handler]
pub async fn book_visit(
    State(state): State<Arc<AppConfig>>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Extension(user): Extension<User>,
    Json(request): Json<BookVisitRequest>,
) -> Result<Json<Value>, AppError> {
    let token = auth.token();

    // Patients book for themselves; staff can book on a patient's behalf.
    let is_patient = request.patient_id.to_string() == user.id;
    if !is_patient && !user.is_staff() {
        return Err(AppError::Auth(
            "Not authorized to book a visit for this patient".to_string(),
        ));
    }

    let booking_service = VisitBookingService::new(&state);

    let outcome = booking_service
        .book_visit(request, &user, token)
        .await
        .map_err(map_scheduling_error)?;

    Ok(Json(json!({
        "success": true,
        "result": outcome,
    })))
}

#[axum::debug_handler]
pub async fn get_visit(
    State(state): State<Arc<AppConfig>>,
    Path(visit_id): Path<Uuid>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Extension(user): Extension<User>,
) -> Result<Json<Value>, AppError> {
    let token = auth.token();
    let booking_service = VisitBookingService::new(&state);

    let visit = booking_service
        .get_visit(visit_id, token)
        .await
        .map_err(map_scheduling_error)?;

    authorize_visit_access(&user, &visit)?;

    Ok(Json(json!(visit)))
}

#[axum::debug_handler]
pub async fn reschedule_visit(
    State(state): State<Arc<AppConfig>>,
    Path(visit_id): Path<Uuid>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Extension(user): Extension<User>,
    Json(request): Json<RescheduleVisitRequest>,
) -> Result<Json<Value>, AppError> {
    let token = auth.token();
    let booking_service = VisitBookingService::new(&state);

    let visit = booking_service
        .get_visit(visit_id, token)
        .await
        .map_err(map_scheduling_error)?;
    authorize_visit_access(&user, &visit)?;

    let updated = booking_service
        .reschedule_visit(visit_id, request.new_scheduled_at, &user, token)
        .await
        .map_err(map_scheduling_error)?;

    Ok(Json(json!({
        "success": true,
        "visit": updated,
        "message": "Visit rescheduled successfully",
    })))
}

#[axum::debug_handler]
pub async fn cancel_visit(
    State(state): State<Arc<AppConfig>>,
    Path(visit_id): Path<Uuid>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Extension(user): Extension<User>,
) -> Result<Json<Value>, AppError> {
    let token = auth.token();
    let booking_service = VisitBookingService::new(&state);

    let visit = booking_service
        .get_visit(visit_id, token)
        .await
        .map_err(map_scheduling_error)?;
    authorize_visit_access(&user, &visit)?;

    let cancelled = booking_service
        .cancel_visit(visit_id, &user, token)
        .await
        .map_err(map_scheduling_error)?;

    Ok(Json(json!({
        "success": true,
        "visit": cancelled,
        "message": "Visit cancelled successfully",
    })))
}

#[axum::debug_handler]
pub async fn advance_visit_status(
    State(state): State<Arc<AppConfig>>,
    Path(visit_id): Path<Uuid>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Extension(user): Extension<User>,
    Json(request): Json<AdvanceStatusRequest>,
) -> Result<Json<Value>, AppError> {
    let token = auth.token();

    // Day-of flow transitions are a front-desk/provider concern.
    if !user.is_staff() {
        return Err(AppError::Auth("Not authorized to update visit status".to_string()));
    }

    let booking_service = VisitBookingService::new(&state);

    let updated = booking_service
        .advance_visit_status(visit_id, request.status, &user, token)
        .await
        .map_err(map_scheduling_error)?;

    Ok(Json(json!({
        "success": true,
        "visit": updated,
    })))
}

// ==============================================================================
// AVAILABILITY HANDLERS
// ==============================================================================

#[axum::debug_handler]
pub async fn check_availability(
    State(state): State<Arc<AppConfig>>,
    Query(params): Query<AvailabilityQueryParams>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Extension(user): Extension<User>,
) -> Result<Json<Value>, AppError> {
    let token = auth.token();

    if params.duration_minutes <= 0 {
        return Err(AppError::BadRequest("duration_minutes must be positive".to_string()));
    }

    let patient_id = actor_patient_id(&user)?;
    let booking_service = VisitBookingService::new(&state);

    let provider = booking_service
        .resolution_service()
        .resolve(params.provider_id, patient_id, token)
        .await
        .map_err(map_scheduling_error)?;

    let check = booking_service
        .conflict_service()
        .check_interval(&provider, params.scheduled_at, params.duration_minutes, None, token)
        .await
        .map_err(map_scheduling_error)?;

    Ok(Json(json!(check)))
}

#[axum::debug_handler]
pub async fn generate_slots(
    State(state): State<Arc<AppConfig>>,
    Query(params): Query<SlotQueryParams>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Extension(user): Extension<User>,
) -> Result<Json<Value>, AppError> {
    let token = auth.token();

    let patient_id = actor_patient_id(&user)?;

    let supabase = Arc::new(SupabaseClient::new(&state));
    let calendar: Arc<dyn CalendarPort> =
        Arc::new(GoogleCalendarService::new(&state, Arc::clone(&supabase)));

    let resolution_service = ProviderResolutionService::new(Arc::clone(&supabase));
    let provider = resolution_service
        .resolve(params.provider_id, patient_id, token)
        .await
        .map_err(map_scheduling_error)?;

    let slot_service = SlotGenerationService::new(supabase, calendar);
    let slots = slot_service
        .generate_slots(
            &provider,
            params.start_date,
            params.end_date,
            params.duration_minutes,
            params.granularity_minutes,
            params.limit,
            token,
        )
        .await
        .map_err(map_scheduling_error)?;

    Ok(Json(json!({
        "provider_id": provider.id,
        "timezone": &provider.timezone,
        "slots": slots,
    })))
}
