use chrono::NaiveDate;
use serde::Deserialize;
use thiserror::Error;
use uuid::Uuid;

use shared_database::StoreError;
use shared_models::error::AppError;

pub use shared_models::clinic::{Doctor, SlotSchedule, Specialty, TimeSlot, TimeSlotTemplate};

// ==============================================================================
// QUERY PARAMETERS
// ==============================================================================

#[derive(Debug, Deserialize)]
pub struct DoctorQuery {
    pub specialty: Uuid,
}

#[derive(Debug, Deserialize)]
pub struct SlotQuery {
    pub doctor: Uuid,
    pub date: NaiveDate,
}

// ==============================================================================
// ERRORS
// ==============================================================================

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DirectoryError {
    #[error("Specialty {0} not found")]
    SpecialtyNotFound(Uuid),

    #[error("Doctor {0} not found")]
    DoctorNotFound(Uuid),

    #[error("Directory store error: {0}")]
    Store(#[from] StoreError),
}

impl From<DirectoryError> for AppError {
    fn from(err: DirectoryError) -> Self {
        match err {
            DirectoryError::SpecialtyNotFound(_) | DirectoryError::DoctorNotFound(_) => {
                AppError::NotFound(err.to_string())
            }
            DirectoryError::Store(store) if store.is_transient() => {
                AppError::ServiceUnavailable("Clinic directory is temporarily unavailable, please retry".to_string())
            }
            DirectoryError::Store(store) => AppError::Database(store.to_string()),
        }
    }
}
