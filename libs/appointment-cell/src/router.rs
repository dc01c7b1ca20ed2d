// libs/appointment-cell/src/router.rs
use std::sync::Arc;

use axum::{
    Router,
    routing::{get, patch, post},
    middleware,
};

use shared_config::AppConfig;
use shared_utils::extractor::auth_middleware;

use crate::handlers;

pub fn appointment_routes(state: Arc<AppConfig>) -> Router {
    let public_routes = Router::new()
        .route("/doctor/{doctor_id}/available-slots", get(handlers::get_available_slots));

    // Everything scoped to a user requires authentication
    let protected_routes = Router::new()
        .route("/", post(handlers::create_appointment))
        .route("/my-appointments", get(handlers::get_my_appointments))
        .route("/{appointment_id}", get(handlers::get_appointment))
        .route("/{appointment_id}/status", patch(handlers::update_appointment_status))
        // Clinic workflow hook, role checked in the handler
        .route("/{appointment_id}/clinic-status", patch(handlers::update_clinic_status))
        .layer(middleware::from_fn_with_state(state.clone(), auth_middleware));

    Router::new()
        .merge(public_routes)
        .merge(protected_routes)
        .with_state(state)
}
