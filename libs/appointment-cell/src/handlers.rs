// libs/appointment-cell/src/handlers.rs
use std::sync::Arc;

use axum::{
    extract::{rejection::JsonRejection, Extension, Path, Query, State},
    Json,
};
use serde::Deserialize;
use uuid::Uuid;

use shared_config::AppConfig;
use shared_models::auth::User;
use shared_models::error::AppError;
use shared_utils::extractor::json_body;

use crate::models::{
    parse_date, AppointmentDetails, AppointmentStatus, AvailableSlotsResponse,
    CreateAppointmentRequest, UpdateStatusRequest,
};
use crate::services::availability::AvailabilityService;
use crate::services::booking::AppointmentBookingService;

/// Roles allowed to drive the clinic side of the lifecycle.
const CLINIC_ROLES: &[&str] = &["clinic", "admin"];

// ==============================================================================
// QUERY PARAMETER STRUCTS
// ==============================================================================

#[derive(Debug, Deserialize)]
pub struct MyAppointmentsQuery {
    pub status: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct AvailableSlotsQuery {
    pub date: Option<String>,
}

// ==============================================================================
// BOOKING HANDLERS
// ==============================================================================

#[axum::debug_handler]
pub async fn create_appointment(
    State(state): State<Arc<AppConfig>>,
    Extension(user): Extension<User>,
    payload: Result<Json<CreateAppointmentRequest>, JsonRejection>,
) -> Result<Json<AppointmentDetails>, AppError> {
    let request = json_body(payload)?;
    let user_id = user.user_uuid()?;

    let booking_service = AppointmentBookingService::new(&state);
    let appointment = booking_service.create_booking(user_id, request).await?;

    Ok(Json(appointment))
}

#[axum::debug_handler]
pub async fn get_my_appointments(
    State(state): State<Arc<AppConfig>>,
    Extension(user): Extension<User>,
    Query(params): Query<MyAppointmentsQuery>,
) -> Result<Json<Vec<AppointmentDetails>>, AppError> {
    let user_id = user.user_uuid()?;
    let status = params
        .status
        .as_deref()
        .filter(|s| !s.trim().is_empty())
        .map(str::parse::<AppointmentStatus>)
        .transpose()?;

    let booking_service = AppointmentBookingService::new(&state);
    let appointments = booking_service.list_my_appointments(user_id, status).await?;

    Ok(Json(appointments))
}

#[axum::debug_handler]
pub async fn get_appointment(
    State(state): State<Arc<AppConfig>>,
    Extension(user): Extension<User>,
    Path(appointment_id): Path<String>,
) -> Result<Json<AppointmentDetails>, AppError> {
    let user_id = user.user_uuid()?;
    let appointment_id = parse_id(&appointment_id, "Appointment not found")?;

    let booking_service = AppointmentBookingService::new(&state);
    let appointment = booking_service.get_appointment(user_id, appointment_id).await?;

    Ok(Json(appointment))
}

// ==============================================================================
// STATUS HANDLERS
// ==============================================================================

/// Owner status change. In practice only `{"status": "cancelled"}` succeeds.
#[axum::debug_handler]
pub async fn update_appointment_status(
    State(state): State<Arc<AppConfig>>,
    Extension(user): Extension<User>,
    Path(appointment_id): Path<String>,
    payload: Result<Json<UpdateStatusRequest>, JsonRejection>,
) -> Result<Json<AppointmentDetails>, AppError> {
    let user_id = user.user_uuid()?;
    let new_status = json_body(payload)?.parse()?;
    let appointment_id = parse_id(&appointment_id, "Appointment not found")?;

    let booking_service = AppointmentBookingService::new(&state);
    let appointment = booking_service
        .update_status(appointment_id, user_id, new_status)
        .await?;

    Ok(Json(appointment))
}

#[axum::debug_handler]
pub async fn update_clinic_status(
    State(state): State<Arc<AppConfig>>,
    Extension(user): Extension<User>,
    Path(appointment_id): Path<String>,
    payload: Result<Json<UpdateStatusRequest>, JsonRejection>,
) -> Result<Json<AppointmentDetails>, AppError> {
    if !user.has_role(CLINIC_ROLES) {
        return Err(AppError::Auth("Clinic access required".to_string()));
    }

    let new_status = json_body(payload)?.parse()?;
    let appointment_id = parse_id(&appointment_id, "Appointment not found")?;

    let booking_service = AppointmentBookingService::new(&state);
    let appointment = booking_service
        .apply_clinic_transition(appointment_id, new_status)
        .await?;

    Ok(Json(appointment))
}

// ==============================================================================
// PUBLIC HANDLERS
// ==============================================================================

#[axum::debug_handler]
pub async fn get_available_slots(
    State(state): State<Arc<AppConfig>>,
    Path(doctor_id): Path<String>,
    Query(params): Query<AvailableSlotsQuery>,
) -> Result<Json<AvailableSlotsResponse>, AppError> {
    let date = params
        .date
        .as_deref()
        .filter(|d| !d.trim().is_empty())
        .ok_or_else(|| AppError::ValidationError("Date is required".to_string()))?;
    let date = parse_date(date)?;
    let doctor_id = parse_id(&doctor_id, "Doctor not found")?;

    let availability_service = AvailabilityService::new(&state);
    let slots = availability_service.resolve_slots(doctor_id, date).await?;

    Ok(Json(slots))
}

/// Ids that are not UUIDs cannot name an existing record.
fn parse_id(raw: &str, not_found: &str) -> Result<Uuid, AppError> {
    Uuid::parse_str(raw).map_err(|_| AppError::NotFound(not_found.to_string()))
}
