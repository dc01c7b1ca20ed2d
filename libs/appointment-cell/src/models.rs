// libs/appointment-cell/src/models.rs
use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use catalog_cell::{CatalogError, DoctorSummary, HospitalSummary, PetSummary};
use shared_models::error::AppError;

/// Wire format of `appointment_date`.
pub const DATE_FORMAT: &str = "%Y-%m-%d";

// ==============================================================================
// CORE APPOINTMENT MODELS
// ==============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Appointment {
    pub id: Uuid,
    pub user_id: Uuid,
    pub pet_id: Uuid,
    pub hospital_id: Uuid,
    pub doctor_id: Uuid,
    pub appointment_date: NaiveDate,
    pub time_slot: String,
    pub reason: String,
    pub symptoms: Option<String>,
    #[serde(default)]
    pub notes: Option<String>,
    #[serde(default)]
    pub prescription: Option<String>,
    pub status: AppointmentStatus,
    /// Consultation fee at booking time. Never recomputed.
    pub total_fee: f64,
    pub payment_status: PaymentStatus,
    #[serde(default)]
    pub reminder_sent: bool,
    pub created_at: DateTime<Utc>,
    #[serde(default)]
    pub updated_at: Option<DateTime<Utc>>,
}

/// An appointment together with the display summaries PostgREST embeds.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppointmentDetails {
    #[serde(flatten)]
    pub appointment: Appointment,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pet: Option<PetSummary>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub hospital: Option<HospitalSummary>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub doctor: Option<DoctorSummary>,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum AppointmentStatus {
    Pending,
    Confirmed,
    Completed,
    Cancelled,
    #[serde(alias = "no-show")]
    NoShow,
}

impl AppointmentStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            AppointmentStatus::Pending => "pending",
            AppointmentStatus::Confirmed => "confirmed",
            AppointmentStatus::Completed => "completed",
            AppointmentStatus::Cancelled => "cancelled",
            AppointmentStatus::NoShow => "no_show",
        }
    }

    /// Statuses that hold a slot.
    pub fn is_active(&self) -> bool {
        matches!(self, AppointmentStatus::Pending | AppointmentStatus::Confirmed)
    }

    pub fn is_terminal(&self) -> bool {
        !self.is_active()
    }
}

impl fmt::Display for AppointmentStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for AppointmentStatus {
    type Err = AppointmentError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "pending" => Ok(AppointmentStatus::Pending),
            "confirmed" => Ok(AppointmentStatus::Confirmed),
            "completed" => Ok(AppointmentStatus::Completed),
            "cancelled" => Ok(AppointmentStatus::Cancelled),
            "no_show" | "no-show" => Ok(AppointmentStatus::NoShow),
            other => Err(AppointmentError::ValidationError(format!("Invalid status: {}", other))),
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum PaymentStatus {
    Pending,
    Paid,
    Refunded,
}

/// Insert payload for the `appointments` table.
#[derive(Debug, Serialize)]
pub struct NewAppointment {
    pub user_id: Uuid,
    pub pet_id: Uuid,
    pub hospital_id: Uuid,
    pub doctor_id: Uuid,
    pub appointment_date: NaiveDate,
    pub time_slot: String,
    pub reason: String,
    pub symptoms: Option<String>,
    pub status: AppointmentStatus,
    pub total_fee: f64,
    pub payment_status: PaymentStatus,
    pub reminder_sent: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

// ==============================================================================
// REQUEST/RESPONSE MODELS
// ==============================================================================

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateAppointmentRequest {
    pub pet_id: Option<Uuid>,
    pub hospital_id: Option<Uuid>,
    pub doctor_id: Option<Uuid>,
    pub appointment_date: Option<String>,
    pub time_slot: Option<String>,
    pub reason: Option<String>,
    pub symptoms: Option<String>,
}

/// A booking request with every required field present and parsed.
#[derive(Debug, Clone, PartialEq)]
pub struct NewBooking {
    pub pet_id: Uuid,
    pub hospital_id: Uuid,
    pub doctor_id: Uuid,
    pub appointment_date: NaiveDate,
    pub time_slot: String,
    pub reason: String,
    pub symptoms: Option<String>,
}

impl CreateAppointmentRequest {
    pub fn validate(self) -> Result<NewBooking, AppointmentError> {
        let missing = || AppointmentError::ValidationError("Please provide all required fields".to_string());

        let (Some(pet_id), Some(hospital_id), Some(doctor_id)) =
            (self.pet_id, self.hospital_id, self.doctor_id)
        else {
            return Err(missing());
        };

        let appointment_date = non_blank(self.appointment_date).ok_or_else(missing)?;
        let time_slot = non_blank(self.time_slot).ok_or_else(missing)?;
        let reason = non_blank(self.reason).ok_or_else(missing)?;

        Ok(NewBooking {
            pet_id,
            hospital_id,
            doctor_id,
            appointment_date: parse_date(&appointment_date)?,
            time_slot,
            reason,
            symptoms: non_blank(self.symptoms),
        })
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct UpdateStatusRequest {
    pub status: Option<String>,
}

impl UpdateStatusRequest {
    pub fn parse(&self) -> Result<AppointmentStatus, AppointmentError> {
        self.status
            .as_deref()
            .filter(|s| !s.trim().is_empty())
            .ok_or_else(|| AppointmentError::ValidationError("Status is required".to_string()))?
            .parse()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct AvailableSlotsResponse {
    pub date: NaiveDate,
    pub all_slots: Vec<String>,
    pub booked_slots: Vec<String>,
    pub available_slots: Vec<String>,
    pub is_working_day: bool,
}

pub fn parse_date(value: &str) -> Result<NaiveDate, AppointmentError> {
    NaiveDate::parse_from_str(value.trim(), DATE_FORMAT)
        .map_err(|_| AppointmentError::ValidationError(format!("Invalid date '{}', expected YYYY-MM-DD", value)))
}

fn non_blank(value: Option<String>) -> Option<String> {
    value.map(|v| v.trim().to_string()).filter(|v| !v.is_empty())
}

// ==============================================================================
// ERROR TYPES
// ==============================================================================

#[derive(Debug, thiserror::Error)]
pub enum AppointmentError {
    #[error("{0}")]
    ValidationError(String),

    #[error("Pet not found or does not belong to you")]
    PetNotFound,

    #[error("Doctor not found")]
    DoctorNotFound,

    #[error("Appointment not found")]
    NotFound,

    #[error("This time slot is already booked")]
    SlotAlreadyBooked,

    #[error("Cannot change appointment status from {from} to {to}")]
    InvalidStatusTransition {
        from: AppointmentStatus,
        to: AppointmentStatus,
    },

    #[error("Database error: {0}")]
    DatabaseError(String),
}

impl From<CatalogError> for AppointmentError {
    fn from(err: CatalogError) -> Self {
        match err {
            CatalogError::DoctorNotFound => AppointmentError::DoctorNotFound,
            CatalogError::PetNotFound => AppointmentError::PetNotFound,
            CatalogError::DatabaseError(msg) => AppointmentError::DatabaseError(msg),
        }
    }
}

impl From<AppointmentError> for AppError {
    fn from(err: AppointmentError) -> Self {
        match err {
            AppointmentError::ValidationError(msg) => AppError::ValidationError(msg),
            AppointmentError::PetNotFound
            | AppointmentError::DoctorNotFound
            | AppointmentError::NotFound => AppError::NotFound(err.to_string()),
            AppointmentError::SlotAlreadyBooked => AppError::Conflict(err.to_string()),
            AppointmentError::InvalidStatusTransition { .. } => AppError::InvalidState(err.to_string()),
            AppointmentError::DatabaseError(msg) => AppError::Database(msg),
        }
    }
}
