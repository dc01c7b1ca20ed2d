// libs/review-cell/src/services/review.rs
use std::sync::Arc;

use chrono::Utc;
use reqwest::Method;
use serde_json::Value;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use appointment_cell::models::AppointmentStatus;
use shared_config::AppConfig;
use shared_database::supabase::{SupabaseClient, SupabaseError, prefer_representation};

use crate::models::{
    NewReview, Review, ReviewError, ReviewWithAuthor, ReviewableAppointment, SubmitReviewRequest,
};
use crate::services::rating::RatingAggregator;

/// Unique constraint on `reviews.appointment_id`.
pub const REVIEW_APPOINTMENT_INDEX: &str = "reviews_appointment_id_key";

const LISTING_SELECT: &str = "*,doctor:doctors(name,specialization),reviewer:profiles(full_name)";

pub struct ReviewService {
    supabase: Arc<SupabaseClient>,
    rating_aggregator: RatingAggregator,
    page_limit: u32,
}

impl ReviewService {
    pub fn new(config: &AppConfig) -> Self {
        Self::with_client(Arc::new(SupabaseClient::new(config)), config.review_page_limit)
    }

    pub fn with_client(supabase: Arc<SupabaseClient>, page_limit: u32) -> Self {
        Self {
            rating_aggregator: RatingAggregator::with_client(Arc::clone(&supabase)),
            supabase,
            page_limit,
        }
    }

    /// Review a completed appointment, then refresh the hospital and doctor
    /// ratings. The review is committed before the refresh, so a failed
    /// refresh is logged and the review still stands.
    pub async fn submit_review(
        &self,
        user_id: Uuid,
        request: SubmitReviewRequest,
    ) -> Result<Review, ReviewError> {
        let review = request.validate()?;

        let appointment = self.completed_appointment(review.appointment_id, user_id).await?;

        if self.has_review(appointment.id).await? {
            warn!("Appointment {} already reviewed", appointment.id);
            return Err(ReviewError::AlreadyReviewed);
        }

        let new_review = NewReview {
            user_id,
            appointment_id: appointment.id,
            hospital_id: appointment.hospital_id,
            doctor_id: appointment.doctor_id,
            rating: review.rating,
            comment: review.comment,
            created_at: Utc::now(),
        };
        let body = serde_json::to_value(&new_review)
            .map_err(|e| ReviewError::DatabaseError(format!("Failed to encode review: {}", e)))?;

        let result: Vec<Review> = self.supabase.request_with_headers(
            Method::POST,
            "/rest/v1/reviews",
            self.supabase.service_key(),
            Some(body),
            Some(prefer_representation()),
        ).await.map_err(|e| {
            if SupabaseError::is_unique_violation(&e, Some(REVIEW_APPOINTMENT_INDEX)) {
                warn!("Duplicate review for appointment {} rejected by storage", new_review.appointment_id);
                ReviewError::AlreadyReviewed
            } else {
                ReviewError::DatabaseError(e.to_string())
            }
        })?;

        let created = result
            .into_iter()
            .next()
            .ok_or_else(|| ReviewError::DatabaseError("Failed to create review".to_string()))?;

        info!(
            "Review {} ({} stars) stored for appointment {}",
            created.id, created.rating, created.appointment_id
        );

        if let Err(e) = self.rating_aggregator.recompute(created.hospital_id, created.doctor_id).await {
            error!(
                "Rating refresh failed after review {} (hospital {}, doctor {}): {}",
                created.id, created.hospital_id, created.doctor_id, e
            );
        }

        Ok(created)
    }

    /// Most recent reviews of a hospital, newest first.
    pub async fn hospital_reviews(&self, hospital_id: Uuid) -> Result<Vec<ReviewWithAuthor>, ReviewError> {
        debug!("Listing reviews for hospital {}", hospital_id);

        let path = format!(
            "/rest/v1/reviews?hospital_id=eq.{}&select={}&order=created_at.desc&limit={}",
            hospital_id, LISTING_SELECT, self.page_limit
        );

        self.supabase.request(
            Method::GET,
            &path,
            self.supabase.service_key(),
            None,
        ).await.map_err(|e| ReviewError::DatabaseError(e.to_string()))
    }

    async fn completed_appointment(
        &self,
        appointment_id: Uuid,
        user_id: Uuid,
    ) -> Result<ReviewableAppointment, ReviewError> {
        let path = format!(
            "/rest/v1/appointments?id=eq.{}&user_id=eq.{}&status=eq.{}&select=id,hospital_id,doctor_id",
            appointment_id, user_id, AppointmentStatus::Completed
        );

        let rows: Vec<ReviewableAppointment> = self.supabase.request(
            Method::GET,
            &path,
            self.supabase.service_key(),
            None,
        ).await.map_err(|e| ReviewError::DatabaseError(e.to_string()))?;

        rows.into_iter().next().ok_or(ReviewError::AppointmentNotFound)
    }

    async fn has_review(&self, appointment_id: Uuid) -> Result<bool, ReviewError> {
        let path = format!("/rest/v1/reviews?appointment_id=eq.{}&select=id&limit=1", appointment_id);

        let rows: Vec<Value> = self.supabase.request(
            Method::GET,
            &path,
            self.supabase.service_key(),
            None,
        ).await.map_err(|e| ReviewError::DatabaseError(e.to_string()))?;

        Ok(!rows.is_empty())
    }
}
