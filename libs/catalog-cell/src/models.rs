// libs/catalog-cell/src/models.rs
use chrono::{Datelike, NaiveDate, Weekday};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

// ==============================================================================
// DERIVED RATING CACHE
// ==============================================================================

/// Mean of every review rating for a hospital or doctor, rounded to one decimal.
///
/// The value is a cache over the review history. Outside of deserializing what
/// is already stored, the only constructor is [`CachedRating::from_ratings`],
/// and the catalog write-back only accepts this type, so the column cannot be
/// set to anything that was not aggregated from reviews.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CachedRating(f64);

impl CachedRating {
    /// Aggregate a full review history. `None` when there are no reviews.
    pub fn from_ratings<I>(ratings: I) -> Option<Self>
    where
        I: IntoIterator<Item = i16>,
    {
        let (sum, count) = ratings
            .into_iter()
            .fold((0i64, 0u32), |(sum, count), r| (sum + i64::from(r), count + 1));

        if count == 0 {
            return None;
        }

        let mean = sum as f64 / f64::from(count);
        Some(Self((mean * 10.0).round() / 10.0))
    }

    pub fn value(&self) -> f64 {
        self.0
    }
}

/// Stored value for an entity that has never been reviewed.
fn unrated() -> CachedRating {
    CachedRating(0.0)
}

// ==============================================================================
// CATALOG RECORDS
// ==============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Doctor {
    pub id: Uuid,
    pub hospital_id: Uuid,
    pub name: String,
    pub specialization: String,
    pub consultation_fee: f64,
    /// Weekday names, e.g. `"Monday"`.
    #[serde(default)]
    pub available_days: Vec<String>,
    /// Slot template in declaration order, e.g. `["09:00", "09:30"]`.
    #[serde(default)]
    pub available_time_slots: Vec<String>,
    #[serde(default = "unrated")]
    pub rating: CachedRating,
    pub is_active: bool,
}

impl Doctor {
    /// Whether `date` falls on one of the doctor's declared weekdays. A doctor
    /// with no declared days is treated as working every day.
    pub fn works_on(&self, date: NaiveDate) -> bool {
        if self.available_days.is_empty() {
            return true;
        }
        let weekday = date.weekday();
        self.available_days
            .iter()
            .filter_map(|day| day.trim().parse::<Weekday>().ok())
            .any(|day| day == weekday)
    }

    pub fn offers_slot(&self, time_slot: &str) -> bool {
        self.available_time_slots.iter().any(|slot| slot == time_slot)
    }
}

/// Pet row as needed for the ownership check.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OwnedPet {
    pub id: Uuid,
    pub owner_id: Uuid,
    pub name: String,
}

// ==============================================================================
// DISPLAY SUMMARIES (embedded by PostgREST)
// ==============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PetSummary {
    pub name: String,
    #[serde(rename = "type")]
    pub pet_type: Option<String>,
    pub age: Option<i32>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HospitalSummary {
    pub name: String,
    pub address: Option<String>,
    pub phone: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DoctorSummary {
    pub name: String,
    pub specialization: String,
    pub consultation_fee: Option<f64>,
}

// ==============================================================================
// ERROR TYPES
// ==============================================================================

#[derive(Debug, Clone, thiserror::Error)]
pub enum CatalogError {
    #[error("Doctor not found")]
    DoctorNotFound,

    #[error("Pet not found")]
    PetNotFound,

    #[error("Database error: {0}")]
    DatabaseError(String),
}
