use std::sync::Arc;

use axum::{
    Router,
    routing::get,
};

use appointment_cell::router::appointment_routes;
use review_cell::router::review_routes;
use shared_config::AppConfig;

pub fn create_router(state: Arc<AppConfig>) -> Router {
    Router::new()
        .route("/", get(|| async { "Vet clinic booking API is running" }))
        .nest("/appointments", appointment_routes(state.clone()))
        .nest("/reviews", review_routes(state))
}
