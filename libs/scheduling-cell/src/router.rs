// libs/scheduling-cell/src/router.rs
use std::sync::Arc;

use axum::{
    middleware,
    routing::{get, patch, post},
    Router,
};

use shared_config::AppConfig;
use shared_utils::extractor::auth_middleware;

use crate::handlers;

pub fn appointment_routes(state: Arc<AppConfig>) -> Router {
    // All scheduling operations require authentication
    let protected_routes = Router::new()
        .route("/", post(handlers::book_visit))
        .route("/availability/check", get(handlers::check_availability))
        .route("/slots", get(handlers::generate_slots))
        .route("/{visit_id}", get(handlers::get_visit))
        .route("/{visit_id}/reschedule", patch(handlers::reschedule_visit))
        .route("/{visit_id}/cancel", post(handlers::cancel_visit))
        .route("/{visit_id}/status", patch(handlers::advance_visit_status))
        .layer(middleware::from_fn_with_state(state.clone(), auth_middleware));

    Router::new().merge(protected_routes).with_state(state)
}
