use chrono::{DateTime, NaiveDate, NaiveTime, Utc, Weekday};
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

// ==============================================================================
// DIRECTORY
// ==============================================================================

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Specialty {
    pub id: Uuid,
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Doctor {
    pub id: Uuid,
    pub name: String,
    pub specialty_id: Uuid,
    #[serde(default)]
    pub bio: String,
    pub photo_url: Option<String>,
}

// ==============================================================================
// SCHEDULING
// ==============================================================================

/// When a template applies: every given weekday, or one specific date.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum SlotSchedule {
    Weekly { weekday: Weekday },
    OnDate { date: NaiveDate },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimeSlotTemplate {
    pub id: Uuid,
    pub doctor_id: Uuid,
    pub schedule: SlotSchedule,
    pub start_time: NaiveTime,
    pub end_time: NaiveTime,
    pub interval_minutes: u32,
    #[serde(default = "default_true")]
    pub is_available: bool,
}

fn default_true() -> bool {
    true
}

impl TimeSlotTemplate {
    pub fn weekly(doctor_id: Uuid, weekday: Weekday, start_time: NaiveTime, end_time: NaiveTime, interval_minutes: u32) -> Self {
        Self {
            id: Uuid::new_v4(),
            doctor_id,
            schedule: SlotSchedule::Weekly { weekday },
            start_time,
            end_time,
            interval_minutes,
            is_available: true,
        }
    }

    pub fn on_date(doctor_id: Uuid, date: NaiveDate, start_time: NaiveTime, end_time: NaiveTime, interval_minutes: u32) -> Self {
        Self {
            id: Uuid::new_v4(),
            doctor_id,
            schedule: SlotSchedule::OnDate { date },
            start_time,
            end_time,
            interval_minutes,
            is_available: true,
        }
    }

    /// A date override that takes the doctor off for the whole day.
    pub fn day_off(doctor_id: Uuid, date: NaiveDate) -> Self {
        Self {
            id: Uuid::new_v4(),
            doctor_id,
            schedule: SlotSchedule::OnDate { date },
            start_time: NaiveTime::MIN,
            end_time: NaiveTime::MIN,
            interval_minutes: 0,
            is_available: false,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimeSlot {
    pub id: String,
    pub time: NaiveTime,
}

impl TimeSlot {
    pub fn starting_at(time: NaiveTime) -> Self {
        Self {
            id: slot_id(time),
            time,
        }
    }
}

/// Slot ids are the local start time, `HH:MM`.
pub fn slot_id(time: NaiveTime) -> String {
    time.format("%H:%M").to_string()
}

// ==============================================================================
// BOOKINGS
// ==============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BookingStatus {
    Booked,
    Completed,
    Cancelled,
}

impl BookingStatus {
    pub fn is_terminal(&self) -> bool {
        !matches!(self, BookingStatus::Booked)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            BookingStatus::Booked => "booked",
            BookingStatus::Completed => "completed",
            BookingStatus::Cancelled => "cancelled",
        }
    }
}

impl fmt::Display for BookingStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContactDetails {
    pub name: String,
    pub email: String,
    pub phone: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Booking {
    pub id: Uuid,
    pub doctor_id: Uuid,
    pub patient_id: Uuid,
    pub date: NaiveDate,
    pub time_slot_id: String,
    pub status: BookingStatus,
    pub notes: Option<String>,
    pub patient_name: String,
    pub patient_email: String,
    pub patient_phone: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Everything the store needs to insert a booking in state `booked`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewBooking {
    pub doctor_id: Uuid,
    pub patient_id: Uuid,
    pub date: NaiveDate,
    pub time_slot_id: String,
    pub contact: ContactDetails,
}

impl NewBooking {
    pub fn into_booking(self, now: DateTime<Utc>) -> Booking {
        Booking {
            id: Uuid::new_v4(),
            doctor_id: self.doctor_id,
            patient_id: self.patient_id,
            date: self.date,
            time_slot_id: self.time_slot_id,
            status: BookingStatus::Booked,
            notes: None,
            patient_name: self.contact.name,
            patient_email: self.contact.email,
            patient_phone: self.contact.phone,
            created_at: now,
            updated_at: now,
        }
    }
}

/// A status change applied only if the booking is still in `from`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StatusChange {
    pub from: BookingStatus,
    pub to: BookingStatus,
    pub notes: Option<String>,
}
