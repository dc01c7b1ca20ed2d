// libs/review-cell/src/models.rs
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use catalog_cell::CatalogError;
use shared_models::error::AppError;

pub const MIN_RATING: i16 = 1;
pub const MAX_RATING: i16 = 5;

// ==============================================================================
// REVIEW MODELS
// ==============================================================================

/// A stored review. Immutable once written.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Review {
    pub id: Uuid,
    pub user_id: Uuid,
    pub appointment_id: Uuid,
    pub hospital_id: Uuid,
    pub doctor_id: Uuid,
    pub rating: i16,
    pub comment: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReviewerSummary {
    pub full_name: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReviewedDoctor {
    pub name: String,
    pub specialization: String,
}

/// A review as listed on a hospital page.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReviewWithAuthor {
    #[serde(flatten)]
    pub review: Review,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub doctor: Option<ReviewedDoctor>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reviewer: Option<ReviewerSummary>,
}

/// Insert payload for the `reviews` table.
#[derive(Debug, Serialize)]
pub struct NewReview {
    pub user_id: Uuid,
    pub appointment_id: Uuid,
    pub hospital_id: Uuid,
    pub doctor_id: Uuid,
    pub rating: i16,
    pub comment: String,
    pub created_at: DateTime<Utc>,
}

/// The appointment columns a review is gated on and denormalized from.
#[derive(Debug, Clone, Deserialize)]
pub struct ReviewableAppointment {
    pub id: Uuid,
    pub hospital_id: Uuid,
    pub doctor_id: Uuid,
}

// ==============================================================================
// REQUEST MODELS
// ==============================================================================

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SubmitReviewRequest {
    pub appointment_id: Option<Uuid>,
    pub rating: Option<f64>,
    pub comment: Option<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ValidReview {
    pub appointment_id: Uuid,
    pub rating: i16,
    pub comment: String,
}

impl SubmitReviewRequest {
    pub fn validate(self) -> Result<ValidReview, ReviewError> {
        let comment = self.comment.map(|c| c.trim().to_string()).filter(|c| !c.is_empty());

        let (Some(appointment_id), Some(rating), Some(comment)) = (self.appointment_id, self.rating, comment) else {
            return Err(ReviewError::ValidationError("Please provide all fields".to_string()));
        };

        if rating.fract() != 0.0 || rating < f64::from(MIN_RATING) || rating > f64::from(MAX_RATING) {
            return Err(ReviewError::ValidationError(format!(
                "Rating must be a whole number between {} and {}",
                MIN_RATING, MAX_RATING
            )));
        }

        Ok(ValidReview {
            appointment_id,
            rating: rating as i16,
            comment,
        })
    }
}

// ==============================================================================
// ERROR TYPES
// ==============================================================================

#[derive(Debug, thiserror::Error)]
pub enum ReviewError {
    #[error("{0}")]
    ValidationError(String),

    #[error("Appointment not found or not completed")]
    AppointmentNotFound,

    #[error("Review already submitted")]
    AlreadyReviewed,

    #[error("Database error: {0}")]
    DatabaseError(String),
}

impl From<CatalogError> for ReviewError {
    fn from(err: CatalogError) -> Self {
        ReviewError::DatabaseError(err.to_string())
    }
}

impl From<ReviewError> for AppError {
    fn from(err: ReviewError) -> Self {
        match err {
            ReviewError::ValidationError(msg) => AppError::ValidationError(msg),
            ReviewError::AppointmentNotFound => AppError::NotFound(err.to_string()),
            ReviewError::AlreadyReviewed => AppError::Conflict(err.to_string()),
            ReviewError::DatabaseError(msg) => AppError::Database(msg),
        }
    }
}
