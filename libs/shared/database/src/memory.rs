use std::collections::HashMap;

use async_trait::async_trait;
use chrono::{NaiveDate, Utc};
use tokio::sync::RwLock;
use tracing::debug;
use uuid::Uuid;

use shared_models::clinic::{
    Booking, BookingStatus, Doctor, NewBooking, Specialty, StatusChange, TimeSlotTemplate,
};

use crate::error::StoreError;
use crate::store::ClinicStore;

type SlotKey = (Uuid, NaiveDate, String);

#[derive(Default)]
struct Tables {
    specialties: Vec<Specialty>,
    doctors: Vec<Doctor>,
    templates: Vec<TimeSlotTemplate>,
    bookings: HashMap<Uuid, Booking>,
    // booking id holding each slot; only bookings in `booked` appear here
    active_slots: HashMap<SlotKey, Uuid>,
}

/// Process-local store. A single write lock makes check-and-insert atomic.
#[derive(Default)]
pub struct InMemoryStore {
    tables: RwLock<Tables>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

fn sorted(mut bookings: Vec<Booking>, newest_first: bool) -> Vec<Booking> {
    bookings.sort_by(|a, b| {
        a.date
            .cmp(&b.date)
            .then_with(|| a.time_slot_id.cmp(&b.time_slot_id))
            .then_with(|| a.created_at.cmp(&b.created_at))
    });
    if newest_first {
        bookings.reverse();
    }
    bookings
}

#[async_trait]
impl ClinicStore for InMemoryStore {
    async fn list_specialties(&self) -> Result<Vec<Specialty>, StoreError> {
        Ok(self.tables.read().await.specialties.clone())
    }

    async fn get_specialty(&self, specialty_id: Uuid) -> Result<Option<Specialty>, StoreError> {
        let tables = self.tables.read().await;
        Ok(tables.specialties.iter().find(|s| s.id == specialty_id).cloned())
    }

    async fn list_doctors(&self, specialty_id: Uuid) -> Result<Vec<Doctor>, StoreError> {
        let tables = self.tables.read().await;
        Ok(tables
            .doctors
            .iter()
            .filter(|d| d.specialty_id == specialty_id)
            .cloned()
            .collect())
    }

    async fn get_doctor(&self, doctor_id: Uuid) -> Result<Option<Doctor>, StoreError> {
        let tables = self.tables.read().await;
        Ok(tables.doctors.iter().find(|d| d.id == doctor_id).cloned())
    }

    async fn list_templates(&self, doctor_id: Uuid) -> Result<Vec<TimeSlotTemplate>, StoreError> {
        let tables = self.tables.read().await;
        Ok(tables
            .templates
            .iter()
            .filter(|t| t.doctor_id == doctor_id)
            .cloned()
            .collect())
    }

    async fn booked_slot_ids(&self, doctor_id: Uuid, date: NaiveDate) -> Result<Vec<String>, StoreError> {
        let tables = self.tables.read().await;
        Ok(tables
            .active_slots
            .keys()
            .filter(|(d, day, _)| *d == doctor_id && *day == date)
            .map(|(_, _, slot)| slot.clone())
            .collect())
    }

    async fn insert_booking(&self, booking: NewBooking) -> Result<Booking, StoreError> {
        let mut tables = self.tables.write().await;

        let key = (booking.doctor_id, booking.date, booking.time_slot_id.clone());
        if let Some(holder) = tables.active_slots.get(&key) {
            debug!("Slot {:?} already held by booking {}", key, holder);
            return Err(StoreError::UniqueViolation(format!(
                "slot {} on {} is already booked",
                key.2, key.1
            )));
        }

        let booking = booking.into_booking(Utc::now());
        tables.active_slots.insert(key, booking.id);
        tables.bookings.insert(booking.id, booking.clone());
        Ok(booking)
    }

    async fn get_booking(&self, booking_id: Uuid) -> Result<Option<Booking>, StoreError> {
        Ok(self.tables.read().await.bookings.get(&booking_id).cloned())
    }

    async fn update_status(&self, booking_id: Uuid, change: StatusChange) -> Result<Booking, StoreError> {
        let mut tables = self.tables.write().await;

        let booking = tables.bookings.get_mut(&booking_id).ok_or(StoreError::NotFound)?;
        if booking.status != change.from {
            return Err(StoreError::PreconditionFailed);
        }

        booking.status = change.to;
        if let Some(notes) = change.notes {
            booking.notes = Some(notes);
        }
        booking.updated_at = Utc::now();
        let updated = booking.clone();

        if change.from == BookingStatus::Booked && change.to.is_terminal() {
            tables
                .active_slots
                .remove(&(updated.doctor_id, updated.date, updated.time_slot_id.clone()));
        }

        Ok(updated)
    }

    async fn update_notes(&self, booking_id: Uuid, notes: String) -> Result<Booking, StoreError> {
        let mut tables = self.tables.write().await;
        let booking = tables.bookings.get_mut(&booking_id).ok_or(StoreError::NotFound)?;
        if booking.status == BookingStatus::Cancelled {
            return Err(StoreError::PreconditionFailed);
        }
        booking.notes = Some(notes);
        booking.updated_at = Utc::now();
        Ok(booking.clone())
    }

    async fn list_bookings_for_patient(&self, patient_id: Uuid) -> Result<Vec<Booking>, StoreError> {
        let tables = self.tables.read().await;
        let mine = tables
            .bookings
            .values()
            .filter(|b| b.patient_id == patient_id)
            .cloned()
            .collect();
        Ok(sorted(mine, true))
    }

    async fn list_bookings_for_doctor(&self, doctor_id: Uuid) -> Result<Vec<Booking>, StoreError> {
        let tables = self.tables.read().await;
        let mine = tables
            .bookings
            .values()
            .filter(|b| b.doctor_id == doctor_id)
            .cloned()
            .collect();
        Ok(sorted(mine, false))
    }

    async fn add_specialty(&self, specialty: Specialty) -> Result<Specialty, StoreError> {
        let mut tables = self.tables.write().await;
        if tables.specialties.iter().any(|s| s.name == specialty.name) {
            return Err(StoreError::UniqueViolation(format!(
                "specialty '{}' already exists",
                specialty.name
            )));
        }
        tables.specialties.push(specialty.clone());
        Ok(specialty)
    }

    async fn add_doctor(&self, doctor: Doctor) -> Result<Doctor, StoreError> {
        let mut tables = self.tables.write().await;
        if !tables.specialties.iter().any(|s| s.id == doctor.specialty_id) {
            return Err(StoreError::Rejected(format!(
                "specialty {} does not exist",
                doctor.specialty_id
            )));
        }
        tables.doctors.push(doctor.clone());
        Ok(doctor)
    }

    async fn add_template(&self, template: TimeSlotTemplate) -> Result<TimeSlotTemplate, StoreError> {
        let mut tables = self.tables.write().await;
        if !tables.doctors.iter().any(|d| d.id == template.doctor_id) {
            return Err(StoreError::Rejected(format!(
                "doctor {} does not exist",
                template.doctor_id
            )));
        }
        tables.templates.push(template.clone());
        Ok(template)
    }
}
