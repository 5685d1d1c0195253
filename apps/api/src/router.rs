use std::sync::Arc;

use axum::{routing::get, Router};

use scheduling_cell::router::appointment_routes;
use shared_config::AppConfig;
use triage_cell::router::triage_routes;

pub fn create_router(state: Arc<AppConfig>) -> Router {
    Router::new()
        .route("/", get(|| async { "Clinic scheduling API is running!" }))
        .nest("/appointments", appointment_routes(state.clone()))
        .nest("/triage", triage_routes(state.clone()))
}
