// libs/appointment-cell/src/services/ledger.rs
use std::sync::Arc;
use std::time::Duration;

use chrono::NaiveDate;
use tracing::{debug, info, warn};
use uuid::Uuid;

use doctor_cell::AvailabilityService;
use shared_database::{bounded, AppState, ClinicStore, StoreError};
use shared_models::clinic::{NewBooking, StatusChange};

use crate::models::{
    Booking, BookingAction, BookingError, ContactDetails, RescheduleOutcome,
};
use crate::services::contact::validate_contact;
use crate::services::lifecycle::BookingLifecycle;

/// Source of truth for bookings.
///
/// At most one `booked` booking exists per `(doctor, date, slot)`. The store
/// enforces that atomically; the ledger validates everything else and owns
/// the status transitions.
pub struct BookingLedger {
    store: Arc<dyn ClinicStore>,
    timeout: Duration,
    availability: AvailabilityService,
    pinned_today: Option<NaiveDate>,
}

impl BookingLedger {
    pub fn new(state: &AppState) -> Self {
        Self {
            store: Arc::clone(&state.store),
            timeout: state.config.store_timeout(),
            availability: AvailabilityService::new(state),
            pinned_today: None,
        }
    }

    /// Evaluate the booking window against a fixed date instead of the clock.
    pub fn as_of(mut self, today: NaiveDate) -> Self {
        self.pinned_today = Some(today);
        self
    }

    fn today(&self) -> NaiveDate {
        self.pinned_today.unwrap_or_else(AvailabilityService::today)
    }

    /// Book a slot for a patient.
    ///
    /// The slot must be one the doctor's templates offer on `date` inside the
    /// booking window. Whether it is still free is decided by the atomic
    /// insert, so a lost race comes back as `SlotConflict`.
    pub async fn create(
        &self,
        doctor_id: Uuid,
        patient_id: Uuid,
        date: NaiveDate,
        time_slot_id: &str,
        contact: &ContactDetails,
    ) -> Result<Booking, BookingError> {
        let contact = validate_contact(contact)?;
        self.validate_slot(doctor_id, date, time_slot_id).await?;

        self.insert(NewBooking {
            doctor_id,
            patient_id,
            date,
            time_slot_id: time_slot_id.to_string(),
            contact,
        })
        .await
    }

    /// Check that the doctor offers `time_slot_id` on `date`, ignoring bookings.
    pub async fn validate_slot(&self, doctor_id: Uuid, date: NaiveDate, time_slot_id: &str) -> Result<(), BookingError> {
        let today = self.today();
        if !self.availability.is_bookable_date(date, today) {
            let (first, last) = self.availability.booking_window(today);
            return Err(BookingError::InvalidSlot(format!(
                "{} is outside the booking window {} to {}",
                date, first, last
            )));
        }

        let offered = self.availability.templated_slots(doctor_id, date, today).await?;
        if !offered.iter().any(|slot| slot.id == time_slot_id) {
            return Err(BookingError::InvalidSlot(format!(
                "doctor {} has no {} slot on {}",
                doctor_id, time_slot_id, date
            )));
        }

        Ok(())
    }

    /// A booking as seen by its patient or its assigned doctor.
    pub async fn get(&self, booking_id: Uuid, acting_id: Uuid) -> Result<Booking, BookingError> {
        let booking = self.load(booking_id).await?;
        if booking.patient_id != acting_id && booking.doctor_id != acting_id {
            warn!("Principal {} denied access to booking {}", acting_id, booking_id);
            return Err(BookingError::Forbidden(BookingAction::View));
        }
        Ok(booking)
    }

    /// Cancel a booking on behalf of the patient who owns it. Frees the slot.
    pub async fn cancel(&self, booking_id: Uuid, acting_patient_id: Uuid) -> Result<Booking, BookingError> {
        let booking = self.load(booking_id).await?;
        Self::ensure_patient(&booking, acting_patient_id, BookingAction::Cancel)?;

        let cancelled = self.transition(&booking, BookingAction::Cancel, None).await?;
        info!(
            "Booking {} cancelled, slot {} on {} is free again",
            cancelled.id, cancelled.time_slot_id, cancelled.date
        );
        Ok(cancelled)
    }

    /// Mark a booking completed. Only the assigned doctor may do this.
    pub async fn complete(
        &self,
        booking_id: Uuid,
        acting_doctor_id: Uuid,
        notes: Option<String>,
    ) -> Result<Booking, BookingError> {
        let booking = self.load(booking_id).await?;
        Self::ensure_doctor(&booking, acting_doctor_id, BookingAction::Complete)?;

        let notes = notes
            .map(|n| n.trim().to_string())
            .filter(|n| !n.is_empty());
        let completed = self.transition(&booking, BookingAction::Complete, notes).await?;
        info!("Booking {} completed by doctor {}", completed.id, acting_doctor_id);
        Ok(completed)
    }

    pub async fn annotate(&self, booking_id: Uuid, acting_doctor_id: Uuid, notes: String) -> Result<Booking, BookingError> {
        let booking = self.load(booking_id).await?;
        Self::ensure_doctor(&booking, acting_doctor_id, BookingAction::Annotate)?;
        BookingLifecycle::next_status(booking.status, BookingAction::Annotate)?;

        let annotated = match bounded(self.timeout, self.store.update_notes(booking_id, notes.trim().to_string())).await {
            Ok(annotated) => annotated,
            Err(StoreError::PreconditionFailed) => {
                let current = self.load(booking_id).await?;
                warn!("Booking {} moved to {} before notes could be written", booking_id, current.status);
                return Err(BookingError::InvalidTransition {
                    from: current.status,
                    action: BookingAction::Annotate,
                });
            }
            Err(StoreError::NotFound) => return Err(Self::missing(booking_id)),
            Err(err) => return Err(err.into()),
        };
        debug!("Notes updated on booking {}", booking_id);
        Ok(annotated)
    }

    /// Move a booking to another date and slot of the same doctor.
    ///
    /// The old booking is cancelled first and the new one created afterwards.
    /// If the create loses a race the cancellation stands, and the outcome is
    /// `PartiallyApplied` so the caller can tell the patient.
    pub async fn reschedule(
        &self,
        booking_id: Uuid,
        acting_patient_id: Uuid,
        new_date: NaiveDate,
        new_time_slot_id: &str,
    ) -> Result<RescheduleOutcome, BookingError> {
        let booking = self.load(booking_id).await?;
        Self::ensure_patient(&booking, acting_patient_id, BookingAction::Reschedule)?;
        BookingLifecycle::next_status(booking.status, BookingAction::Reschedule)?;

        if booking.date == new_date && booking.time_slot_id == new_time_slot_id {
            return Err(BookingError::InvalidSlot(
                "booking already holds the requested slot".to_string(),
            ));
        }
        self.validate_slot(booking.doctor_id, new_date, new_time_slot_id).await?;

        let taken = bounded(self.timeout, self.store.booked_slot_ids(booking.doctor_id, new_date)).await?;
        if taken.iter().any(|id| id == new_time_slot_id) {
            warn!("Reschedule of {} refused: {} on {} is taken", booking_id, new_time_slot_id, new_date);
            return Err(BookingError::SlotConflict);
        }

        let cancelled = self.transition(&booking, BookingAction::Reschedule, None).await?;

        let replacement = NewBooking {
            doctor_id: booking.doctor_id,
            patient_id: booking.patient_id,
            date: new_date,
            time_slot_id: new_time_slot_id.to_string(),
            contact: ContactDetails {
                name: booking.patient_name.clone(),
                email: booking.patient_email.clone(),
                phone: booking.patient_phone.clone(),
            },
        };

        match self.insert(replacement).await {
            Ok(booking) => {
                info!("Booking {} rescheduled as {}", cancelled.id, booking.id);
                Ok(RescheduleOutcome::Rescheduled { cancelled, booking })
            }
            Err(error) => {
                warn!(
                    "Reschedule of {} partially applied: old booking cancelled, new booking failed: {}",
                    cancelled.id, error
                );
                Ok(RescheduleOutcome::PartiallyApplied { cancelled, error })
            }
        }
    }

    /// The patient's bookings, newest date first.
    pub async fn list_for_patient(&self, patient_id: Uuid) -> Result<Vec<Booking>, BookingError> {
        Ok(bounded(self.timeout, self.store.list_bookings_for_patient(patient_id)).await?)
    }

    /// The doctor's bookings, oldest date first.
    pub async fn list_for_doctor(&self, doctor_id: Uuid) -> Result<Vec<Booking>, BookingError> {
        Ok(bounded(self.timeout, self.store.list_bookings_for_doctor(doctor_id)).await?)
    }

    async fn insert(&self, booking: NewBooking) -> Result<Booking, BookingError> {
        let (doctor_id, date, slot) = (booking.doctor_id, booking.date, booking.time_slot_id.clone());

        match bounded(self.timeout, self.store.insert_booking(booking)).await {
            Ok(created) => {
                info!(
                    "Booking {} created: doctor {} on {} at {} for patient {}",
                    created.id, doctor_id, date, slot, created.patient_id
                );
                Ok(created)
            }
            Err(StoreError::UniqueViolation(detail)) => {
                warn!("Slot {} on {} for doctor {} already taken: {}", slot, date, doctor_id, detail);
                Err(BookingError::SlotConflict)
            }
            Err(err) => Err(err.into()),
        }
    }

    /// Apply a status change only if nobody moved the booking meanwhile.
    async fn transition(
        &self,
        booking: &Booking,
        action: BookingAction,
        notes: Option<String>,
    ) -> Result<Booking, BookingError> {
        let to = BookingLifecycle::next_status(booking.status, action)?;
        let change = StatusChange { from: booking.status, to, notes };

        match bounded(self.timeout, self.store.update_status(booking.id, change)).await {
            Ok(updated) => Ok(updated),
            Err(StoreError::PreconditionFailed) => {
                let current = self.load(booking.id).await?;
                warn!(
                    "Booking {} moved to {} before {} could be applied",
                    booking.id, current.status, action
                );
                Err(BookingError::InvalidTransition { from: current.status, action })
            }
            Err(StoreError::NotFound) => Err(Self::missing(booking.id)),
            Err(err) => Err(err.into()),
        }
    }

    async fn load(&self, booking_id: Uuid) -> Result<Booking, BookingError> {
        bounded(self.timeout, self.store.get_booking(booking_id))
            .await?
            .ok_or_else(|| Self::missing(booking_id))
    }

    fn missing(booking_id: Uuid) -> BookingError {
        BookingError::NotFound(format!("Booking {}", booking_id))
    }

    fn ensure_patient(booking: &Booking, acting_id: Uuid, action: BookingAction) -> Result<(), BookingError> {
        if booking.patient_id != acting_id {
            warn!("Principal {} may not {} booking {}", acting_id, action, booking.id);
            return Err(BookingError::Forbidden(action));
        }
        Ok(())
    }

    fn ensure_doctor(booking: &Booking, acting_id: Uuid, action: BookingAction) -> Result<(), BookingError> {
        if booking.doctor_id != acting_id {
            warn!("Principal {} may not {} booking {}", acting_id, action, booking.id);
            return Err(BookingError::Forbidden(action));
        }
        Ok(())
    }
}
