//! Read side of the hospital/doctor catalog plus the owned-pet lookup the
//! booking ledger needs. The only write path is the cached rating write-back.

pub mod models;
pub mod services;

pub use models::{
    CachedRating, CatalogError, Doctor, DoctorSummary, HospitalSummary,
    OwnedPet, PetSummary,
};
pub use services::CatalogService;
