// libs/review-cell/src/services/rating.rs
use std::sync::Arc;

use reqwest::Method;
use serde::Deserialize;
use tracing::debug;
use uuid::Uuid;

use catalog_cell::{CachedRating, CatalogService};
use shared_database::supabase::SupabaseClient;

use crate::models::ReviewError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RatedEntity {
    Hospital,
    Doctor,
}

impl RatedEntity {
    fn review_column(&self) -> &'static str {
        match self {
            RatedEntity::Hospital => "hospital_id",
            RatedEntity::Doctor => "doctor_id",
        }
    }
}

#[derive(Debug, Deserialize)]
struct RatingRow {
    rating: i16,
}

/// Keeps the cached `rating` on hospitals and doctors in step with the review
/// history. Every recompute is a full scan of that entity's reviews.
pub struct RatingAggregator {
    supabase: Arc<SupabaseClient>,
    catalog_service: CatalogService,
}

impl RatingAggregator {
    pub fn with_client(supabase: Arc<SupabaseClient>) -> Self {
        Self {
            catalog_service: CatalogService::with_client(Arc::clone(&supabase)),
            supabase,
        }
    }

    /// Recompute both ratings touched by a review. The two are independent and
    /// run concurrently. Both are attempted even if one fails.
    pub async fn recompute(&self, hospital_id: Uuid, doctor_id: Uuid) -> Result<(), ReviewError> {
        let (hospital, doctor) = tokio::join!(
            self.recompute_one(RatedEntity::Hospital, hospital_id),
            self.recompute_one(RatedEntity::Doctor, doctor_id),
        );
        hospital?;
        doctor?;
        Ok(())
    }

    /// Recompute and store one entity's rating. Returns the stored value, or
    /// `None` when the entity has no reviews (the cache is left untouched).
    pub async fn recompute_one(
        &self,
        entity: RatedEntity,
        id: Uuid,
    ) -> Result<Option<CachedRating>, ReviewError> {
        let path = format!("/rest/v1/reviews?{}=eq.{}&select=rating", entity.review_column(), id);

        let rows: Vec<RatingRow> = self.supabase.request(
            Method::GET,
            &path,
            self.supabase.service_key(),
            None,
        ).await.map_err(|e| ReviewError::DatabaseError(e.to_string()))?;

        let review_count = rows.len();
        let Some(rating) = CachedRating::from_ratings(rows.into_iter().map(|row| row.rating)) else {
            debug!("No reviews for {:?} {}, rating left as is", entity, id);
            return Ok(None);
        };

        debug!("{:?} {} rated {:.1} over {} reviews", entity, id, rating.value(), review_count);

        match entity {
            RatedEntity::Hospital => self.catalog_service.store_hospital_rating(id, rating).await?,
            RatedEntity::Doctor => self.catalog_service.store_doctor_rating(id, rating).await?,
        }

        Ok(Some(rating))
    }
}
