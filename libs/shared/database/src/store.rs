use std::future::Future;
use std::time::Duration;

use async_trait::async_trait;
use chrono::NaiveDate;
use uuid::Uuid;

use shared_models::clinic::{
    Booking, Doctor, NewBooking, Specialty, StatusChange, TimeSlotTemplate,
};

use crate::error::StoreError;

/// Durable storage for the directory, slot templates and bookings.
///
/// `insert_booking` is the one operation with a hard atomicity requirement:
/// implementations must check for an active booking on the same
/// `(doctor_id, date, time_slot_id)` and insert as one indivisible step,
/// returning [`StoreError::UniqueViolation`] to the loser of a race.
/// `update_status` is a compare-and-set on the current status and returns
/// [`StoreError::PreconditionFailed`] when the booking has moved on.
/// `update_notes` fails the same way on a cancelled booking.
#[async_trait]
pub trait ClinicStore: Send + Sync {
    async fn list_specialties(&self) -> Result<Vec<Specialty>, StoreError>;

    async fn get_specialty(&self, specialty_id: Uuid) -> Result<Option<Specialty>, StoreError>;

    async fn list_doctors(&self, specialty_id: Uuid) -> Result<Vec<Doctor>, StoreError>;

    async fn get_doctor(&self, doctor_id: Uuid) -> Result<Option<Doctor>, StoreError>;

    async fn list_templates(&self, doctor_id: Uuid) -> Result<Vec<TimeSlotTemplate>, StoreError>;

    /// Slot ids held by bookings in state `booked` for the doctor on that date.
    async fn booked_slot_ids(&self, doctor_id: Uuid, date: NaiveDate) -> Result<Vec<String>, StoreError>;

    async fn insert_booking(&self, booking: NewBooking) -> Result<Booking, StoreError>;

    async fn get_booking(&self, booking_id: Uuid) -> Result<Option<Booking>, StoreError>;

    async fn update_status(&self, booking_id: Uuid, change: StatusChange) -> Result<Booking, StoreError>;

    async fn update_notes(&self, booking_id: Uuid, notes: String) -> Result<Booking, StoreError>;

    /// Newest appointment date first.
    async fn list_bookings_for_patient(&self, patient_id: Uuid) -> Result<Vec<Booking>, StoreError>;

    /// Oldest appointment date first.
    async fn list_bookings_for_doctor(&self, doctor_id: Uuid) -> Result<Vec<Booking>, StoreError>;

    async fn add_specialty(&self, specialty: Specialty) -> Result<Specialty, StoreError>;

    async fn add_doctor(&self, doctor: Doctor) -> Result<Doctor, StoreError>;

    async fn add_template(&self, template: TimeSlotTemplate) -> Result<TimeSlotTemplate, StoreError>;
}

/// Run a store call with an upper bound on how long it may take.
pub async fn bounded<T, F>(limit: Duration, call: F) -> Result<T, StoreError>
where
    F: Future<Output = Result<T, StoreError>>,
{
    match tokio::time::timeout(limit, call).await {
        Ok(result) => result,
        Err(_) => {
            tracing::warn!("Store call exceeded {:?}", limit);
            Err(StoreError::Timeout(limit))
        }
    }
}
