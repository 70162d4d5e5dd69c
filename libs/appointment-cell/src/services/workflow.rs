// libs/appointment-cell/src/services/workflow.rs
use chrono::NaiveDate;
use serde::Serialize;
use thiserror::Error;
use tracing::{debug, info, warn};
use uuid::Uuid;

use doctor_cell::{AvailabilityService, DirectoryService, Doctor, Specialty};
use shared_database::AppState;
use shared_models::error::AppError;

use crate::models::{Booking, BookingError, BookingSubmission, ContactDetails, TimeSlot};
use crate::services::contact::validate_contact;
use crate::services::ledger::BookingLedger;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum WorkflowStep {
    SelectSpecialty,
    SelectDoctor,
    SelectDate,
    SelectTimeSlot,
    EnterContactDetails,
    Confirm,
    Completed,
}

/// What the patient has chosen so far.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PendingSelection {
    pub specialty_id: Option<Uuid>,
    pub doctor_id: Option<Uuid>,
    pub date: Option<NaiveDate>,
    pub time_slot_id: Option<String>,
    pub contact: Option<ContactDetails>,
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum WorkflowError {
    #[error("Cannot perform {attempted:?} while at {current:?}")]
    OutOfOrder {
        current: WorkflowStep,
        attempted: WorkflowStep,
    },

    #[error("{0}")]
    InvalidSelection(String),

    #[error("This time slot was just booked by someone else, please choose another slot")]
    SlotTaken { available: Vec<TimeSlot> },

    #[error(transparent)]
    Booking(#[from] BookingError),
}

/// One patient's path from picking a specialty to a confirmed booking.
///
/// Nothing is written until [`BookingWorkflow::confirm`]; dropping the
/// workflow earlier leaves no trace. Each selection is checked against a
/// fresh query of the step before it, never against cached results.
pub struct BookingWorkflow {
    patient_id: Uuid,
    step: WorkflowStep,
    selection: PendingSelection,
    directory: DirectoryService,
    availability: AvailabilityService,
    ledger: BookingLedger,
    pinned_today: Option<NaiveDate>,
}

impl BookingWorkflow {
    pub fn new(state: &AppState, patient_id: Uuid) -> Self {
        Self {
            patient_id,
            step: WorkflowStep::SelectSpecialty,
            selection: PendingSelection::default(),
            directory: DirectoryService::new(state),
            availability: AvailabilityService::new(state),
            ledger: BookingLedger::new(state),
            pinned_today: None,
        }
    }

    pub fn as_of(mut self, today: NaiveDate) -> Self {
        self.pinned_today = Some(today);
        self.ledger = self.ledger.as_of(today);
        self
    }

    /// Replay a whole submission server-side, leaving the workflow at `Confirm`.
    ///
    /// The specialty is read from the doctor record. A client-supplied
    /// specialty that disagrees with it is rejected.
    pub async fn from_submission(
        state: &AppState,
        patient_id: Uuid,
        submission: &BookingSubmission,
    ) -> Result<Self, WorkflowError> {
        Self::new(state, patient_id).replay(submission).await
    }

    pub async fn replay(mut self, submission: &BookingSubmission) -> Result<Self, WorkflowError> {
        let doctor = self
            .directory
            .get_doctor(submission.doctor_id)
            .await
            .map_err(BookingError::from)?;

        if let Some(claimed) = submission.specialty_id {
            if claimed != doctor.specialty_id {
                return Err(WorkflowError::InvalidSelection(format!(
                    "Doctor {} does not practise specialty {}",
                    doctor.id, claimed
                )));
            }
        }

        self.select_specialty(doctor.specialty_id).await?;
        self.select_doctor(doctor.id).await?;
        self.select_date(submission.date).await.map_err(stale_slot)?;
        self.select_time_slot(&submission.time_slot_id).await.map_err(stale_slot)?;
        if self.step == WorkflowStep::EnterContactDetails {
            self.enter_contact_details(submission.contact())?;
        }
        Ok(self)
    }

    pub fn step(&self) -> WorkflowStep {
        self.step
    }

    pub fn selection(&self) -> &PendingSelection {
        &self.selection
    }

    fn today(&self) -> NaiveDate {
        self.pinned_today.unwrap_or_else(AvailabilityService::today)
    }

    pub async fn specialties(&self) -> Result<Vec<Specialty>, WorkflowError> {
        Ok(self.directory.list_specialties().await.map_err(BookingError::from)?)
    }

    /// Choose a specialty and get the doctors practising it.
    pub async fn select_specialty(&mut self, specialty_id: Uuid) -> Result<Vec<Doctor>, WorkflowError> {
        self.enter(WorkflowStep::SelectSpecialty)?;

        let known = self.specialties().await?;
        if !known.iter().any(|s| s.id == specialty_id) {
            return Err(WorkflowError::InvalidSelection(format!("Unknown specialty {}", specialty_id)));
        }
        let doctors = self
            .directory
            .list_doctors(specialty_id)
            .await
            .map_err(BookingError::from)?;

        self.selection.specialty_id = Some(specialty_id);
        self.selection.doctor_id = None;
        self.selection.date = None;
        self.selection.time_slot_id = None;
        self.step = WorkflowStep::SelectDoctor;

        debug!("Patient {} picked specialty {} ({} doctors)", self.patient_id, specialty_id, doctors.len());
        Ok(doctors)
    }

    /// Choose a doctor of the selected specialty; returns the bookable date range.
    pub async fn select_doctor(&mut self, doctor_id: Uuid) -> Result<(NaiveDate, NaiveDate), WorkflowError> {
        self.enter(WorkflowStep::SelectDoctor)?;
        let specialty_id = self.selected(self.selection.specialty_id, WorkflowStep::SelectDoctor)?;

        let doctors = self
            .directory
            .list_doctors(specialty_id)
            .await
            .map_err(BookingError::from)?;
        if !doctors.iter().any(|d| d.id == doctor_id) {
            return Err(WorkflowError::InvalidSelection(format!(
                "Doctor {} does not practise the selected specialty",
                doctor_id
            )));
        }

        self.selection.doctor_id = Some(doctor_id);
        self.selection.date = None;
        self.selection.time_slot_id = None;
        self.step = WorkflowStep::SelectDate;

        Ok(self.availability.booking_window(self.today()))
    }

    /// Choose a date and get the doctor's free slots on it.
    ///
    /// A date the doctor does not work is rejected. A fully booked date is
    /// accepted and yields no slots.
    pub async fn select_date(&mut self, date: NaiveDate) -> Result<Vec<TimeSlot>, WorkflowError> {
        self.enter(WorkflowStep::SelectDate)?;
        let doctor_id = self.selected(self.selection.doctor_id, WorkflowStep::SelectDate)?;
        let today = self.today();

        if !self.availability.is_bookable_date(date, today) {
            let (first, last) = self.availability.booking_window(today);
            return Err(WorkflowError::InvalidSelection(format!(
                "Please choose a date between {} and {}",
                first, last
            )));
        }

        let offered = self
            .availability
            .templated_slots(doctor_id, date, today)
            .await
            .map_err(BookingError::from)?;
        if offered.is_empty() {
            return Err(WorkflowError::InvalidSelection(format!("The doctor is not available on {}", date)));
        }

        let free = self.free_slots(doctor_id, date).await?;

        self.selection.date = Some(date);
        self.selection.time_slot_id = None;
        self.step = WorkflowStep::SelectTimeSlot;
        Ok(free)
    }

    /// Choose one of the free slots on the selected date.
    pub async fn select_time_slot(&mut self, time_slot_id: &str) -> Result<(), WorkflowError> {
        self.enter(WorkflowStep::SelectTimeSlot)?;
        let doctor_id = self.selected(self.selection.doctor_id, WorkflowStep::SelectTimeSlot)?;
        let date = self.selected(self.selection.date, WorkflowStep::SelectTimeSlot)?;

        let free = self.free_slots(doctor_id, date).await?;
        if !free.iter().any(|slot| slot.id == time_slot_id) {
            let offered = self
                .availability
                .templated_slots(doctor_id, date, self.today())
                .await
                .map_err(BookingError::from)?;
            if offered.iter().any(|slot| slot.id == time_slot_id) {
                warn!("Slot {} on {} was taken before patient {} picked it", time_slot_id, date, self.patient_id);
                return Err(WorkflowError::SlotTaken { available: free });
            }
            return Err(WorkflowError::InvalidSelection(format!("{} is not a slot on {}", time_slot_id, date)));
        }

        self.selection.time_slot_id = Some(time_slot_id.to_string());
        self.step = if self.selection.contact.is_some() {
            WorkflowStep::Confirm
        } else {
            WorkflowStep::EnterContactDetails
        };
        Ok(())
    }

    pub fn enter_contact_details(&mut self, contact: ContactDetails) -> Result<(), WorkflowError> {
        self.enter(WorkflowStep::EnterContactDetails)?;
        let contact = validate_contact(&contact)?;

        self.selection.contact = Some(contact);
        self.step = WorkflowStep::Confirm;
        Ok(())
    }

    /// Commit the booking.
    ///
    /// If the slot went to someone else in the meantime the workflow steps
    /// back to slot selection and reports what is still free.
    pub async fn confirm(&mut self) -> Result<Booking, WorkflowError> {
        if self.step != WorkflowStep::Confirm {
            return Err(WorkflowError::OutOfOrder {
                current: self.step,
                attempted: WorkflowStep::Confirm,
            });
        }
        let doctor_id = self.selected(self.selection.doctor_id, WorkflowStep::Confirm)?;
        let date = self.selected(self.selection.date, WorkflowStep::Confirm)?;
        let time_slot_id = self
            .selection
            .time_slot_id
            .clone()
            .ok_or(WorkflowError::OutOfOrder { current: self.step, attempted: WorkflowStep::Confirm })?;
        let contact = self
            .selection
            .contact
            .clone()
            .ok_or(WorkflowError::OutOfOrder { current: self.step, attempted: WorkflowStep::Confirm })?;

        match self.ledger.create(doctor_id, self.patient_id, date, &time_slot_id, &contact).await {
            Ok(booking) => {
                self.step = WorkflowStep::Completed;
                info!("Patient {} confirmed booking {}", self.patient_id, booking.id);
                Ok(booking)
            }
            Err(BookingError::SlotConflict) => {
                self.back_to_slot_selection();
                let available = self.free_slots(doctor_id, date).await?;
                Err(WorkflowError::SlotTaken { available })
            }
            Err(err @ BookingError::InvalidSlot(_)) => {
                self.back_to_slot_selection();
                Err(err.into())
            }
            Err(err) => Err(err.into()),
        }
    }

    fn back_to_slot_selection(&mut self) {
        self.selection.time_slot_id = None;
        self.step = WorkflowStep::SelectTimeSlot;
    }

    async fn free_slots(&self, doctor_id: Uuid, date: NaiveDate) -> Result<Vec<TimeSlot>, WorkflowError> {
        Ok(self
            .availability
            .list_slots_as_of(doctor_id, date, self.today())
            .await
            .map_err(BookingError::from)?)
    }

    /// Earlier steps may be revisited; later ones may not be skipped to.
    fn enter(&self, attempted: WorkflowStep) -> Result<(), WorkflowError> {
        if self.step == WorkflowStep::Completed || attempted > self.step {
            return Err(WorkflowError::OutOfOrder { current: self.step, attempted });
        }
        Ok(())
    }

    fn selected<T>(&self, value: Option<T>, attempted: WorkflowStep) -> Result<T, WorkflowError> {
        value.ok_or(WorkflowError::OutOfOrder { current: self.step, attempted })
    }
}

/// In a replayed submission a date or slot the doctor does not offer is
/// stale or tampered client state, not a navigation mistake.
fn stale_slot(err: WorkflowError) -> WorkflowError {
    match err {
        WorkflowError::InvalidSelection(reason) => BookingError::InvalidSlot(reason).into(),
        other => other,
    }
}

impl From<WorkflowError> for AppError {
    fn from(err: WorkflowError) -> Self {
        match err {
            WorkflowError::OutOfOrder { .. } => AppError::BadRequest(err.to_string()),
            WorkflowError::InvalidSelection(message) => AppError::ValidationError(message),
            WorkflowError::SlotTaken { .. } => AppError::SlotConflict(err.to_string()),
            WorkflowError::Booking(booking) => booking.into(),
        }
    }
}
