// libs/appointment-cell/src/services/lifecycle.rs
use tracing::{debug, warn};

use crate::models::{AppointmentError, AppointmentStatus};
use crate::models::AppointmentStatus::{Cancelled, Completed, Confirmed, NoShow, Pending};

/// Who is asking for a status change.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransitionActor {
    /// The pet owner who made the booking.
    Owner,
    /// The clinic workflow (front desk, doctor, admin).
    Clinic,
}

/// Every legal `(from, to, actor)` edge. Anything not listed is rejected,
/// which makes completed, cancelled and no_show terminal.
const TRANSITIONS: &[(AppointmentStatus, AppointmentStatus, TransitionActor)] = &[
    (Pending, Cancelled, TransitionActor::Owner),
    (Confirmed, Cancelled, TransitionActor::Owner),
    (Pending, Confirmed, TransitionActor::Clinic),
    (Confirmed, Completed, TransitionActor::Clinic),
    (Pending, NoShow, TransitionActor::Clinic),
    (Confirmed, NoShow, TransitionActor::Clinic),
];

pub struct AppointmentLifecycleService;

impl AppointmentLifecycleService {
    pub fn new() -> Self {
        Self
    }

    /// Validate that `actor` may move an appointment from `current_status` to `new_status`.
    pub fn validate_status_transition(
        &self,
        current_status: AppointmentStatus,
        new_status: AppointmentStatus,
        actor: TransitionActor,
    ) -> Result<(), AppointmentError> {
        debug!("Validating status transition {} -> {} by {:?}", current_status, new_status, actor);

        let allowed = TRANSITIONS
            .iter()
            .any(|&(from, to, who)| from == current_status && to == new_status && who == actor);

        if !allowed {
            warn!("Invalid status transition attempted: {} -> {} by {:?}", current_status, new_status, actor);
            return Err(AppointmentError::InvalidStatusTransition {
                from: current_status,
                to: new_status,
            });
        }

        Ok(())
    }

    /// All statuses `actor` can move an appointment to from `current_status`.
    pub fn get_valid_transitions(
        &self,
        current_status: AppointmentStatus,
        actor: TransitionActor,
    ) -> Vec<AppointmentStatus> {
        TRANSITIONS
            .iter()
            .filter(|&&(from, _, who)| from == current_status && who == actor)
            .map(|&(_, to, _)| to)
            .collect()
    }
}

impl Default for AppointmentLifecycleService {
    fn default() -> Self {
        Self::new()
    }
}
