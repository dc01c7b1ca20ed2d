// libs/catalog-cell/src/services/catalog.rs
use std::sync::Arc;

use reqwest::Method;
use serde::de::DeserializeOwned;
use serde_json::{json, Value};
use tracing::{debug, info, warn};
use uuid::Uuid;

use shared_database::supabase::{SupabaseClient, prefer_representation};

use crate::models::{CachedRating, CatalogError, Doctor, OwnedPet};

pub struct CatalogService {
    supabase: Arc<SupabaseClient>,
}

impl CatalogService {
    pub fn with_client(supabase: Arc<SupabaseClient>) -> Self {
        Self { supabase }
    }

    /// Fetch a doctor that is still taking appointments.
    pub async fn get_active_doctor(&self, doctor_id: Uuid) -> Result<Doctor, CatalogError> {
        debug!("Fetching doctor: {}", doctor_id);

        let path = format!("/rest/v1/doctors?id=eq.{}&is_active=eq.true", doctor_id);
        self.fetch_one(&path).await?.ok_or(CatalogError::DoctorNotFound)
    }

    /// Fetch a pet only if it belongs to `owner_id`. A missing pet and someone
    /// else's pet are the same error.
    pub async fn find_owned_pet(&self, pet_id: Uuid, owner_id: Uuid) -> Result<OwnedPet, CatalogError> {
        debug!("Checking pet {} belongs to {}", pet_id, owner_id);

        let path = format!(
            "/rest/v1/pets?id=eq.{}&owner_id=eq.{}&select=id,owner_id,name",
            pet_id, owner_id
        );
        self.fetch_one(&path).await?.ok_or(CatalogError::PetNotFound)
    }

    pub async fn store_hospital_rating(
        &self,
        hospital_id: Uuid,
        rating: CachedRating,
    ) -> Result<(), CatalogError> {
        self.store_rating("hospitals", hospital_id, rating).await
    }

    pub async fn store_doctor_rating(
        &self,
        doctor_id: Uuid,
        rating: CachedRating,
    ) -> Result<(), CatalogError> {
        self.store_rating("doctors", doctor_id, rating).await
    }

    async fn store_rating(
        &self,
        table: &str,
        id: Uuid,
        rating: CachedRating,
    ) -> Result<(), CatalogError> {
        let path = format!("/rest/v1/{}?id=eq.{}", table, id);

        let result: Vec<Value> = self.supabase.request_with_headers(
            Method::PATCH,
            &path,
            self.supabase.service_key(),
            Some(json!({ "rating": rating.value() })),
            Some(prefer_representation()),
        ).await.map_err(|e| CatalogError::DatabaseError(e.to_string()))?;

        if result.is_empty() {
            warn!("Rating write-back matched no row in {} for {}", table, id);
        } else {
            info!("Cached rating for {} {} set to {:.1}", table, id, rating.value());
        }

        Ok(())
    }

    async fn fetch_one<T: DeserializeOwned>(&self, path: &str) -> Result<Option<T>, CatalogError> {
        let result: Vec<Value> = self.supabase.request(
            Method::GET,
            path,
            self.supabase.service_key(),
            None,
        ).await.map_err(|e| CatalogError::DatabaseError(e.to_string()))?;

        result
            .into_iter()
            .next()
            .map(|row| serde_json::from_value(row))
            .transpose()
            .map_err(|e| CatalogError::DatabaseError(format!("Failed to parse catalog row: {}", e)))
    }
}
