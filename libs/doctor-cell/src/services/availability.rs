use std::collections::{BTreeMap, HashSet};
use std::sync::Arc;
use std::time::Duration;

use chrono::{Datelike, Duration as ChronoDuration, NaiveDate, Utc};
use tracing::debug;
use uuid::Uuid;

use shared_database::{bounded, AppState, ClinicStore};

use crate::models::{DirectoryError, SlotSchedule, TimeSlot, TimeSlotTemplate};

/// Computes bookable slots from a doctor's templates minus active bookings.
///
/// Results are never cached: availability is recomputed whenever a patient
/// picks a slot and again when the ledger commits a booking.
pub struct AvailabilityService {
    store: Arc<dyn ClinicStore>,
    timeout: Duration,
    horizon_days: i64,
}

impl AvailabilityService {
    pub fn new(state: &AppState) -> Self {
        Self {
            store: Arc::clone(&state.store),
            timeout: state.config.store_timeout(),
            horizon_days: state.config.booking_horizon_days,
        }
    }

    pub fn today() -> NaiveDate {
        Utc::now().date_naive()
    }

    /// First and last bookable day, both inclusive.
    pub fn booking_window(&self, today: NaiveDate) -> (NaiveDate, NaiveDate) {
        (today, today + ChronoDuration::days(self.horizon_days))
    }

    pub fn is_bookable_date(&self, date: NaiveDate, today: NaiveDate) -> bool {
        let (first, last) = self.booking_window(today);
        date >= first && date <= last
    }

    pub async fn list_slots(&self, doctor_id: Uuid, date: NaiveDate) -> Result<Vec<TimeSlot>, DirectoryError> {
        self.list_slots_as_of(doctor_id, date, Self::today()).await
    }

    /// Free slots for the doctor on `date`, ascending by time.
    pub async fn list_slots_as_of(
        &self,
        doctor_id: Uuid,
        date: NaiveDate,
        today: NaiveDate,
    ) -> Result<Vec<TimeSlot>, DirectoryError> {
        let templated = self.templated_slots(doctor_id, date, today).await?;
        if templated.is_empty() {
            return Ok(templated);
        }

        let booked: HashSet<String> = bounded(self.timeout, self.store.booked_slot_ids(doctor_id, date))
            .await?
            .into_iter()
            .collect();

        let free: Vec<TimeSlot> = templated
            .into_iter()
            .filter(|slot| !booked.contains(&slot.id))
            .collect();

        debug!("Doctor {} has {} free slots on {} ({} booked)", doctor_id, free.len(), date, booked.len());
        Ok(free)
    }

    /// Every slot the doctor's templates offer on `date`, ignoring bookings.
    /// Empty outside the booking window.
    pub async fn templated_slots(
        &self,
        doctor_id: Uuid,
        date: NaiveDate,
        today: NaiveDate,
    ) -> Result<Vec<TimeSlot>, DirectoryError> {
        bounded(self.timeout, self.store.get_doctor(doctor_id))
            .await?
            .ok_or(DirectoryError::DoctorNotFound(doctor_id))?;

        if !self.is_bookable_date(date, today) {
            debug!("Date {} is outside the booking window starting {}", date, today);
            return Ok(Vec::new());
        }

        let templates = bounded(self.timeout, self.store.list_templates(doctor_id)).await?;
        Ok(expand_templates(&templates, date))
    }
}

/// Enumerate the slots a set of templates produces on one date.
///
/// Date overrides replace the weekly pattern for that date. A slot is only
/// offered when it finishes by the template's end time.
pub fn expand_templates(templates: &[TimeSlotTemplate], date: NaiveDate) -> Vec<TimeSlot> {
    let overrides: Vec<&TimeSlotTemplate> = templates
        .iter()
        .filter(|t| t.schedule == SlotSchedule::OnDate { date })
        .collect();

    let applicable: Vec<&TimeSlotTemplate> = if overrides.is_empty() {
        templates
            .iter()
            .filter(|t| t.schedule == SlotSchedule::Weekly { weekday: date.weekday() })
            .collect()
    } else {
        overrides
    };

    let mut slots = BTreeMap::new();
    for template in applicable {
        if !template.is_available || template.interval_minutes == 0 {
            continue;
        }

        let step = ChronoDuration::minutes(i64::from(template.interval_minutes));
        let mut start = template.start_time;
        loop {
            let (end, wrapped) = start.overflowing_add_signed(step);
            if wrapped != 0 || end > template.end_time {
                break;
            }
            slots.entry(start).or_insert_with(|| TimeSlot::starting_at(start));
            start = end;
        }
    }

    slots.into_values().collect()
}
