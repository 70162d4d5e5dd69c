// libs/appointment-cell/src/models.rs
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;
use uuid::Uuid;

use doctor_cell::DirectoryError;
use shared_database::StoreError;
use shared_models::error::AppError;

pub use shared_models::clinic::{Booking, BookingStatus, ContactDetails, TimeSlot};

// ==============================================================================
// REQUEST/RESPONSE MODELS
// ==============================================================================

/// A one-shot booking submission. Every field is untrusted client state.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BookingSubmission {
    pub specialty_id: Option<Uuid>,
    pub doctor_id: Uuid,
    pub date: NaiveDate,
    pub time_slot_id: String,
    pub patient_name: String,
    pub patient_email: String,
    pub patient_phone: String,
}

impl BookingSubmission {
    pub fn contact(&self) -> ContactDetails {
        ContactDetails {
            name: self.patient_name.clone(),
            email: self.patient_email.clone(),
            phone: self.patient_phone.clone(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UpdateStatusRequest {
    pub status: BookingStatus,
    pub notes: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UpdateNotesRequest {
    pub notes: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RescheduleRequest {
    pub date: NaiveDate,
    pub time_slot_id: String,
}

/// A booking as shown in a patient's appointment list.
#[derive(Debug, Clone, Serialize)]
pub struct AppointmentSummary {
    #[serde(flatten)]
    pub booking: Booking,
    pub doctor_name: Option<String>,
}

/// Reschedule is cancel-then-create. The second step can lose a race after
/// the first has committed, and callers must be told both facts.
#[derive(Debug)]
pub enum RescheduleOutcome {
    Rescheduled {
        cancelled: Booking,
        booking: Booking,
    },
    PartiallyApplied {
        cancelled: Booking,
        error: BookingError,
    },
}

// ==============================================================================
// LIFECYCLE ACTIONS
// ==============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BookingAction {
    View,
    Cancel,
    Complete,
    Annotate,
    Reschedule,
}

impl fmt::Display for BookingAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BookingAction::View => write!(f, "view"),
            BookingAction::Cancel => write!(f, "cancel"),
            BookingAction::Complete => write!(f, "complete"),
            BookingAction::Annotate => write!(f, "annotate"),
            BookingAction::Reschedule => write!(f, "reschedule"),
        }
    }
}

// ==============================================================================
// ERRORS
// ==============================================================================

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum BookingError {
    #[error("{0} not found")]
    NotFound(String),

    #[error("This time slot was just booked by someone else, please choose another slot")]
    SlotConflict,

    #[error("Invalid slot: {0}")]
    InvalidSlot(String),

    #[error("Only the booking's patient or assigned doctor may {0} it")]
    Forbidden(BookingAction),

    #[error("Cannot {action} a booking that is {from}")]
    InvalidTransition {
        from: BookingStatus,
        action: BookingAction,
    },

    #[error("Invalid contact details: {0}")]
    InvalidContact(String),

    #[error("Booking store error: {0}")]
    Store(StoreError),
}

impl From<StoreError> for BookingError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::UniqueViolation(_) => BookingError::SlotConflict,
            other => BookingError::Store(other),
        }
    }
}

impl From<DirectoryError> for BookingError {
    fn from(err: DirectoryError) -> Self {
        match err {
            DirectoryError::SpecialtyNotFound(id) => BookingError::NotFound(format!("Specialty {}", id)),
            DirectoryError::DoctorNotFound(id) => BookingError::NotFound(format!("Doctor {}", id)),
            DirectoryError::Store(store) => BookingError::Store(store),
        }
    }
}

impl From<BookingError> for AppError {
    fn from(err: BookingError) -> Self {
        let message = err.to_string();
        match err {
            BookingError::NotFound(_) => AppError::NotFound(message),
            BookingError::SlotConflict => AppError::SlotConflict(message),
            BookingError::InvalidSlot(_) => AppError::InvalidSlot(message),
            BookingError::Forbidden(_) => AppError::Forbidden(message),
            BookingError::InvalidTransition { .. } => AppError::InvalidTransition(message),
            BookingError::InvalidContact(_) => AppError::ValidationError(message),
            BookingError::Store(store) if store.is_transient() => AppError::ServiceUnavailable(
                "Booking service is temporarily unavailable, please retry".to_string(),
            ),
            BookingError::Store(_) => AppError::Database(message),
        }
    }
}
