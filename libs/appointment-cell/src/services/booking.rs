// libs/appointment-cell/src/services/booking.rs
use std::sync::Arc;

use chrono::Utc;
use reqwest::Method;
use serde_json::{json, Value};
use tracing::{debug, info, warn};
use uuid::Uuid;

use catalog_cell::CatalogService;
use shared_config::AppConfig;
use shared_database::supabase::{SupabaseClient, SupabaseError, prefer_representation};

use crate::models::{
    Appointment, AppointmentDetails, AppointmentError, AppointmentStatus, CreateAppointmentRequest,
    NewAppointment, PaymentStatus,
};
use crate::services::availability::AvailabilityService;
use crate::services::lifecycle::{AppointmentLifecycleService, TransitionActor};

/// Partial unique index over active `(doctor_id, appointment_date, time_slot)`.
pub const ACTIVE_SLOT_INDEX: &str = "appointments_active_slot_key";

/// PostgREST embedding for the display summaries.
const DETAILS_SELECT: &str = "*,pet:pets(name,type,age),hospital:hospitals(name,address,phone),doctor:doctors(name,specialization,consultation_fee)";

pub struct AppointmentBookingService {
    supabase: Arc<SupabaseClient>,
    catalog_service: CatalogService,
    availability_service: AvailabilityService,
    lifecycle_service: AppointmentLifecycleService,
}

impl AppointmentBookingService {
    pub fn new(config: &AppConfig) -> Self {
        Self::with_client(Arc::new(SupabaseClient::new(config)))
    }

    pub fn with_client(supabase: Arc<SupabaseClient>) -> Self {
        Self {
            catalog_service: CatalogService::with_client(Arc::clone(&supabase)),
            availability_service: AvailabilityService::with_client(Arc::clone(&supabase)),
            lifecycle_service: AppointmentLifecycleService::new(),
            supabase,
        }
    }

    /// Book a slot for one of the caller's pets.
    ///
    /// Checks run in order and fail fast: required fields, pet ownership,
    /// active doctor, fit with the doctor's template, then the active-slot
    /// pre-check. The insert itself is guarded by [`ACTIVE_SLOT_INDEX`], so
    /// a booking that loses a race after the pre-check still comes back as
    /// [`AppointmentError::SlotAlreadyBooked`].
    pub async fn create_booking(
        &self,
        user_id: Uuid,
        request: CreateAppointmentRequest,
    ) -> Result<AppointmentDetails, AppointmentError> {
        let booking = request.validate()?;

        self.catalog_service.find_owned_pet(booking.pet_id, user_id).await?;
        let doctor = self.catalog_service.get_active_doctor(booking.doctor_id).await?;

        if doctor.hospital_id != booking.hospital_id {
            return Err(AppointmentError::ValidationError(
                "Doctor does not practice at this hospital".to_string(),
            ));
        }
        if !doctor.offers_slot(&booking.time_slot) {
            return Err(AppointmentError::ValidationError(format!(
                "Time slot {} is not offered by this doctor", booking.time_slot
            )));
        }
        if !doctor.works_on(booking.appointment_date) {
            return Err(AppointmentError::ValidationError(format!(
                "Doctor is not available on {}", booking.appointment_date.format("%A")
            )));
        }

        if self.availability_service
            .is_slot_taken(booking.doctor_id, booking.appointment_date, &booking.time_slot)
            .await?
        {
            warn!(
                "Slot {} {} for doctor {} already booked",
                booking.appointment_date, booking.time_slot, booking.doctor_id
            );
            return Err(AppointmentError::SlotAlreadyBooked);
        }

        let now = Utc::now();
        let new_appointment = NewAppointment {
            user_id,
            pet_id: booking.pet_id,
            hospital_id: booking.hospital_id,
            doctor_id: booking.doctor_id,
            appointment_date: booking.appointment_date,
            time_slot: booking.time_slot,
            reason: booking.reason,
            symptoms: booking.symptoms,
            status: AppointmentStatus::Pending,
            total_fee: doctor.consultation_fee,
            payment_status: PaymentStatus::Pending,
            reminder_sent: false,
            created_at: now,
            updated_at: now,
        };
        let body = serde_json::to_value(&new_appointment)
            .map_err(|e| AppointmentError::DatabaseError(format!("Failed to encode appointment: {}", e)))?;

        let path = format!("/rest/v1/appointments?select={}", DETAILS_SELECT);
        let result: Vec<AppointmentDetails> = self.supabase.request_with_headers(
            Method::POST,
            &path,
            self.supabase.service_key(),
            Some(body),
            Some(prefer_representation()),
        ).await.map_err(|e| {
            if SupabaseError::is_unique_violation(&e, Some(ACTIVE_SLOT_INDEX)) {
                warn!("Lost the race for slot of doctor {}: {}", new_appointment.doctor_id, e);
                AppointmentError::SlotAlreadyBooked
            } else {
                AppointmentError::DatabaseError(e.to_string())
            }
        })?;

        let created = result
            .into_iter()
            .next()
            .ok_or_else(|| AppointmentError::DatabaseError("Failed to create appointment".to_string()))?;

        info!(
            "Appointment {} booked for doctor {} on {} at {} (fee {:.2})",
            created.appointment.id,
            created.appointment.doctor_id,
            created.appointment.appointment_date,
            created.appointment.time_slot,
            created.appointment.total_fee
        );

        Ok(created)
    }

    /// The caller's appointments, latest appointment date first.
    pub async fn list_my_appointments(
        &self,
        user_id: Uuid,
        status: Option<AppointmentStatus>,
    ) -> Result<Vec<AppointmentDetails>, AppointmentError> {
        debug!("Listing appointments for user {} (status {:?})", user_id, status);

        let mut path = format!(
            "/rest/v1/appointments?user_id=eq.{}&select={}&order=appointment_date.desc,created_at.desc",
            user_id, DETAILS_SELECT
        );
        if let Some(status) = status {
            path.push_str(&format!("&status=eq.{}", status));
        }

        self.supabase.request(
            Method::GET,
            &path,
            self.supabase.service_key(),
            None,
        ).await.map_err(|e| AppointmentError::DatabaseError(e.to_string()))
    }

    /// A single appointment, visible only to the user who booked it.
    pub async fn get_appointment(
        &self,
        user_id: Uuid,
        appointment_id: Uuid,
    ) -> Result<AppointmentDetails, AppointmentError> {
        debug!("Fetching appointment: {}", appointment_id);

        let path = format!(
            "/rest/v1/appointments?id=eq.{}&user_id=eq.{}&select={}",
            appointment_id, user_id, DETAILS_SELECT
        );
        self.fetch_one(&path).await?.ok_or(AppointmentError::NotFound)
    }

    /// Owner-initiated status change. Cancelling an active appointment is the
    /// only move an owner can make.
    pub async fn update_status(
        &self,
        appointment_id: Uuid,
        user_id: Uuid,
        new_status: AppointmentStatus,
    ) -> Result<AppointmentDetails, AppointmentError> {
        self.transition(appointment_id, Some(user_id), new_status, TransitionActor::Owner).await
    }

    /// Status change driven by the clinic workflow: confirm, complete or
    /// mark as no-show.
    pub async fn apply_clinic_transition(
        &self,
        appointment_id: Uuid,
        new_status: AppointmentStatus,
    ) -> Result<AppointmentDetails, AppointmentError> {
        self.transition(appointment_id, None, new_status, TransitionActor::Clinic).await
    }

    async fn transition(
        &self,
        appointment_id: Uuid,
        owner: Option<Uuid>,
        new_status: AppointmentStatus,
        actor: TransitionActor,
    ) -> Result<AppointmentDetails, AppointmentError> {
        let scope = match owner {
            Some(user_id) => format!("id=eq.{}&user_id=eq.{}", appointment_id, user_id),
            None => format!("id=eq.{}", appointment_id),
        };

        let current: Appointment = self
            .fetch_one(&format!("/rest/v1/appointments?{}&select=*", scope))
            .await?
            .ok_or(AppointmentError::NotFound)?;

        self.lifecycle_service
            .validate_status_transition(current.status, new_status, actor)?;

        // Compare-and-set on the status read above. If another request moved
        // the appointment in between, no row matches and this one loses.
        let path = format!(
            "/rest/v1/appointments?{}&status=eq.{}&select={}",
            scope, current.status, DETAILS_SELECT
        );
        let result: Vec<AppointmentDetails> = self.supabase.request_with_headers(
            Method::PATCH,
            &path,
            self.supabase.service_key(),
            Some(json!({
                "status": new_status,
                "updated_at": Utc::now().to_rfc3339(),
            })),
            Some(prefer_representation()),
        ).await.map_err(|e| AppointmentError::DatabaseError(e.to_string()))?;

        let updated = result.into_iter().next().ok_or_else(|| {
            warn!(
                "Appointment {} changed concurrently, {} -> {} not applied",
                appointment_id, current.status, new_status
            );
            AppointmentError::InvalidStatusTransition { from: current.status, to: new_status }
        })?;

        info!("Appointment {} moved {} -> {} by {:?}", appointment_id, current.status, new_status, actor);
        Ok(updated)
    }

    async fn fetch_one<T: serde::de::DeserializeOwned>(
        &self,
        path: &str,
    ) -> Result<Option<T>, AppointmentError> {
        let result: Vec<Value> = self.supabase.request(
            Method::GET,
            path,
            self.supabase.service_key(),
            None,
        ).await.map_err(|e| AppointmentError::DatabaseError(e.to_string()))?;

        result
            .into_iter()
            .next()
            .map(serde_json::from_value)
            .transpose()
            .map_err(|e| AppointmentError::DatabaseError(format!("Failed to parse appointment: {}", e)))
    }
}
