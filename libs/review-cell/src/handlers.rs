// libs/review-cell/src/handlers.rs
use std::sync::Arc;

use axum::{
    extract::{rejection::JsonRejection, Extension, Path, State},
    Json,
};
use uuid::Uuid;

use shared_config::AppConfig;
use shared_models::auth::User;
use shared_models::error::AppError;
use shared_utils::extractor::json_body;

use crate::models::{Review, ReviewWithAuthor, SubmitReviewRequest};
use crate::services::ReviewService;

#[axum::debug_handler]
pub async fn submit_review(
    State(state): State<Arc<AppConfig>>,
    Extension(user): Extension<User>,
    payload: Result<Json<SubmitReviewRequest>, JsonRejection>,
) -> Result<Json<Review>, AppError> {
    let request = json_body(payload)?;
    let user_id = user.user_uuid()?;

    let review_service = ReviewService::new(&state);
    let review = review_service.submit_review(user_id, request).await?;

    Ok(Json(review))
}

#[axum::debug_handler]
pub async fn get_hospital_reviews(
    State(state): State<Arc<AppConfig>>,
    Path(hospital_id): Path<String>,
) -> Result<Json<Vec<ReviewWithAuthor>>, AppError> {
    let hospital_id = Uuid::parse_str(&hospital_id)
        .map_err(|_| AppError::NotFound("Hospital not found".to_string()))?;

    let review_service = ReviewService::new(&state);
    let reviews = review_service.hospital_reviews(hospital_id).await?;

    Ok(Json(reviews))
}
