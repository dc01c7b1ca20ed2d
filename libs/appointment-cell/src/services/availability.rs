// libs/appointment-cell/src/services/availability.rs
use std::sync::Arc;

use chrono::NaiveDate;
use reqwest::Method;
use serde::Deserialize;
use tracing::debug;
use uuid::Uuid;

use catalog_cell::CatalogService;
use shared_config::AppConfig;
use shared_database::supabase::SupabaseClient;

use crate::models::{AppointmentError, AvailableSlotsResponse};

/// `status` filter matching the statuses that hold a slot.
const ACTIVE_STATUS_FILTER: &str = "in.(pending,confirmed)";

#[derive(Debug, Deserialize)]
struct BookedSlotRow {
    time_slot: String,
}

pub struct AvailabilityService {
    supabase: Arc<SupabaseClient>,
    catalog: CatalogService,
}

impl AvailabilityService {
    pub fn new(config: &AppConfig) -> Self {
        Self::with_client(Arc::new(SupabaseClient::new(config)))
    }

    pub fn with_client(supabase: Arc<SupabaseClient>) -> Self {
        Self {
            catalog: CatalogService::with_client(Arc::clone(&supabase)),
            supabase,
        }
    }

    /// Bookable slots of an active doctor on `date`. Read-only.
    pub async fn resolve_slots(
        &self,
        doctor_id: Uuid,
        date: NaiveDate,
    ) -> Result<AvailableSlotsResponse, AppointmentError> {
        let doctor = self.catalog.get_active_doctor(doctor_id).await?;
        let booked = self.booked_slots(doctor_id, date, None).await?;

        let (booked_slots, available_slots) = compute_slots(&doctor.available_time_slots, booked);

        debug!(
            "Doctor {} on {}: {} available, {} booked",
            doctor_id, date, available_slots.len(), booked_slots.len()
        );

        Ok(AvailableSlotsResponse {
            date,
            is_working_day: doctor.works_on(date),
            all_slots: doctor.available_time_slots,
            booked_slots,
            available_slots,
        })
    }

    /// Whether an active appointment already holds `(doctor, date, slot)`.
    pub async fn is_slot_taken(
        &self,
        doctor_id: Uuid,
        date: NaiveDate,
        time_slot: &str,
    ) -> Result<bool, AppointmentError> {
        Ok(!self.booked_slots(doctor_id, date, Some(time_slot)).await?.is_empty())
    }

    async fn booked_slots(
        &self,
        doctor_id: Uuid,
        date: NaiveDate,
        time_slot: Option<&str>,
    ) -> Result<Vec<String>, AppointmentError> {
        let mut path = format!(
            "/rest/v1/appointments?doctor_id=eq.{}&appointment_date=eq.{}&status={}&select=time_slot",
            doctor_id, date, ACTIVE_STATUS_FILTER
        );
        if let Some(slot) = time_slot {
            path.push_str(&format!("&time_slot=eq.{}", urlencoding::encode(slot)));
        }

        let rows: Vec<BookedSlotRow> = self.supabase.request(
            Method::GET,
            &path,
            self.supabase.service_key(),
            None,
        ).await.map_err(|e| AppointmentError::DatabaseError(e.to_string()))?;

        Ok(rows.into_iter().map(|row| row.time_slot).collect())
    }
}

/// Split a slot template into `(booked, available)`.
///
/// `booked` is deduplicated in order of first appearance and keeps slots that
/// are no longer in the template. `available` keeps template order.
pub fn compute_slots<I>(template: &[String], booked: I) -> (Vec<String>, Vec<String>)
where
    I: IntoIterator<Item = String>,
{
    let mut booked_slots: Vec<String> = Vec::new();
    for slot in booked {
        if !booked_slots.contains(&slot) {
            booked_slots.push(slot);
        }
    }

    let available_slots = template
        .iter()
        .filter(|slot| !booked_slots.contains(slot))
        .cloned()
        .collect();

    (booked_slots, available_slots)
}
