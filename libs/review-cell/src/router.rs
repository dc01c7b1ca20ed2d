// libs/review-cell/src/router.rs
use std::sync::Arc;

use axum::{
    Router,
    routing::{get, post},
    middleware,
};

use shared_config::AppConfig;
use shared_utils::extractor::auth_middleware;

use crate::handlers;

pub fn review_routes(state: Arc<AppConfig>) -> Router {
    let public_routes = Router::new()
        .route("/hospital/{hospital_id}", get(handlers::get_hospital_reviews));

    let protected_routes = Router::new()
        .route("/", post(handlers::submit_review))
        .layer(middleware::from_fn_with_state(state.clone(), auth_middleware));

    Router::new()
        .merge(public_routes)
        .merge(protected_routes)
        .with_state(state)
}
