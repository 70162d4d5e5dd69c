use async_trait::async_trait;
use chrono::{NaiveDate, NaiveTime, Utc, Weekday};
use reqwest::{
    header::{HeaderMap, HeaderValue},
    Method,
};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tracing::debug;
use uuid::Uuid;

use shared_config::AppConfig;
use shared_models::clinic::{
    Booking, Doctor, NewBooking, SlotSchedule, Specialty, StatusChange, TimeSlotTemplate,
};

use crate::error::StoreError;
use crate::store::ClinicStore;
use crate::supabase::SupabaseClient;

/// `ClinicStore` over Supabase's PostgREST API.
///
/// Slot exclusivity relies on the partial unique index in `sql/schema.sql`;
/// PostgREST reports its violation as HTTP 409.
pub struct SupabaseStore {
    supabase: SupabaseClient,
}

impl SupabaseStore {
    pub fn new(config: &AppConfig) -> Self {
        Self {
            supabase: SupabaseClient::new(config),
        }
    }

    fn return_representation() -> HeaderMap {
        let mut headers = HeaderMap::new();
        headers.insert("Prefer", HeaderValue::from_static("return=representation"));
        headers
    }

    async fn insert<T>(&self, table: &str, row: Value) -> Result<T, StoreError>
    where
        T: serde::de::DeserializeOwned,
    {
        let path = format!("/rest/v1/{}", table);
        let mut rows: Vec<T> = self
            .supabase
            .request_with_headers(Method::POST, &path, Some(row), Some(Self::return_representation()))
            .await?;

        rows.pop()
            .ok_or_else(|| StoreError::Serialization(format!("insert into {} returned no rows", table)))
    }

    async fn first<T>(&self, path: &str) -> Result<Option<T>, StoreError>
    where
        T: serde::de::DeserializeOwned,
    {
        let mut rows: Vec<T> = self.supabase.request(Method::GET, path, None).await?;
        Ok(if rows.is_empty() { None } else { Some(rows.swap_remove(0)) })
    }
}

/// Flat row layout of `time_slot_templates`.
#[derive(Debug, Serialize, Deserialize)]
struct TemplateRow {
    id: Uuid,
    doctor_id: Uuid,
    weekday: Option<Weekday>,
    specific_date: Option<NaiveDate>,
    start_time: NaiveTime,
    end_time: NaiveTime,
    interval_minutes: u32,
    is_available: bool,
}

impl TryFrom<TemplateRow> for TimeSlotTemplate {
    type Error = StoreError;

    fn try_from(row: TemplateRow) -> Result<Self, Self::Error> {
        let schedule = match (row.specific_date, row.weekday) {
            (Some(date), _) => SlotSchedule::OnDate { date },
            (None, Some(weekday)) => SlotSchedule::Weekly { weekday },
            (None, None) => {
                return Err(StoreError::Serialization(format!(
                    "template {} has neither weekday nor specific_date",
                    row.id
                )))
            }
        };

        Ok(TimeSlotTemplate {
            id: row.id,
            doctor_id: row.doctor_id,
            schedule,
            start_time: row.start_time,
            end_time: row.end_time,
            interval_minutes: row.interval_minutes,
            is_available: row.is_available,
        })
    }
}

impl From<&TimeSlotTemplate> for TemplateRow {
    fn from(template: &TimeSlotTemplate) -> Self {
        let (weekday, specific_date) = match template.schedule {
            SlotSchedule::Weekly { weekday } => (Some(weekday), None),
            SlotSchedule::OnDate { date } => (None, Some(date)),
        };

        TemplateRow {
            id: template.id,
            doctor_id: template.doctor_id,
            weekday,
            specific_date,
            start_time: template.start_time,
            end_time: template.end_time,
            interval_minutes: template.interval_minutes,
            is_available: template.is_available,
        }
    }
}

#[derive(Debug, Deserialize)]
struct SlotRow {
    time_slot_id: String,
}

#[async_trait]
impl ClinicStore for SupabaseStore {
    async fn list_specialties(&self) -> Result<Vec<Specialty>, StoreError> {
        self.supabase
            .request(Method::GET, "/rest/v1/specialties?order=created_at.asc", None)
            .await
    }

    async fn get_specialty(&self, specialty_id: Uuid) -> Result<Option<Specialty>, StoreError> {
        self.first(&format!("/rest/v1/specialties?id=eq.{}", specialty_id)).await
    }

    async fn list_doctors(&self, specialty_id: Uuid) -> Result<Vec<Doctor>, StoreError> {
        let path = format!("/rest/v1/doctors?specialty_id=eq.{}&order=created_at.asc", specialty_id);
        self.supabase.request(Method::GET, &path, None).await
    }

    async fn get_doctor(&self, doctor_id: Uuid) -> Result<Option<Doctor>, StoreError> {
        self.first(&format!("/rest/v1/doctors?id=eq.{}", doctor_id)).await
    }

    async fn list_templates(&self, doctor_id: Uuid) -> Result<Vec<TimeSlotTemplate>, StoreError> {
        let path = format!("/rest/v1/time_slot_templates?doctor_id=eq.{}", doctor_id);
        let rows: Vec<TemplateRow> = self.supabase.request(Method::GET, &path, None).await?;
        rows.into_iter().map(TimeSlotTemplate::try_from).collect()
    }

    async fn booked_slot_ids(&self, doctor_id: Uuid, date: NaiveDate) -> Result<Vec<String>, StoreError> {
        let path = format!(
            "/rest/v1/bookings?select=time_slot_id&doctor_id=eq.{}&date=eq.{}&status=eq.booked",
            doctor_id, date
        );
        let rows: Vec<SlotRow> = self.supabase.request(Method::GET, &path, None).await?;
        Ok(rows.into_iter().map(|r| r.time_slot_id).collect())
    }

    async fn insert_booking(&self, booking: NewBooking) -> Result<Booking, StoreError> {
        let booking = booking.into_booking(Utc::now());
        debug!("Inserting booking {} for slot {} on {}", booking.id, booking.time_slot_id, booking.date);
        self.insert("bookings", serde_json::to_value(&booking)?).await
    }

    async fn get_booking(&self, booking_id: Uuid) -> Result<Option<Booking>, StoreError> {
        self.first(&format!("/rest/v1/bookings?id=eq.{}", booking_id)).await
    }

    async fn update_status(&self, booking_id: Uuid, change: StatusChange) -> Result<Booking, StoreError> {
        let mut update = serde_json::Map::new();
        update.insert("status".to_string(), json!(change.to));
        if let Some(notes) = change.notes {
            update.insert("notes".to_string(), json!(notes));
        }
        update.insert("updated_at".to_string(), json!(Utc::now().to_rfc3339()));

        // The status filter makes this a compare-and-set.
        let path = format!("/rest/v1/bookings?id=eq.{}&status=eq.{}", booking_id, change.from);
        let mut rows: Vec<Booking> = self
            .supabase
            .request_with_headers(Method::PATCH, &path, Some(Value::Object(update)), Some(Self::return_representation()))
            .await?;

        match rows.pop() {
            Some(updated) => Ok(updated),
            None => match self.get_booking(booking_id).await? {
                Some(_) => Err(StoreError::PreconditionFailed),
                None => Err(StoreError::NotFound),
            },
        }
    }

    async fn update_notes(&self, booking_id: Uuid, notes: String) -> Result<Booking, StoreError> {
        let path = format!("/rest/v1/bookings?id=eq.{}&status=neq.cancelled", booking_id);
        let body = json!({ "notes": notes, "updated_at": Utc::now().to_rfc3339() });
        let mut rows: Vec<Booking> = self
            .supabase
            .request_with_headers(Method::PATCH, &path, Some(body), Some(Self::return_representation()))
            .await?;

        match rows.pop() {
            Some(updated) => Ok(updated),
            None => match self.get_booking(booking_id).await? {
                Some(_) => Err(StoreError::PreconditionFailed),
                None => Err(StoreError::NotFound),
            },
        }
    }

    async fn list_bookings_for_patient(&self, patient_id: Uuid) -> Result<Vec<Booking>, StoreError> {
        let path = format!(
            "/rest/v1/bookings?patient_id=eq.{}&order=date.desc,time_slot_id.desc",
            patient_id
        );
        self.supabase.request(Method::GET, &path, None).await
    }

    async fn list_bookings_for_doctor(&self, doctor_id: Uuid) -> Result<Vec<Booking>, StoreError> {
        let path = format!(
            "/rest/v1/bookings?doctor_id=eq.{}&order=date.asc,time_slot_id.asc",
            doctor_id
        );
        self.supabase.request(Method::GET, &path, None).await
    }

    async fn add_specialty(&self, specialty: Specialty) -> Result<Specialty, StoreError> {
        self.insert("specialties", serde_json::to_value(&specialty)?).await
    }

    async fn add_doctor(&self, doctor: Doctor) -> Result<Doctor, StoreError> {
        self.insert("doctors", serde_json::to_value(&doctor)?).await
    }

    async fn add_template(&self, template: TimeSlotTemplate) -> Result<TimeSlotTemplate, StoreError> {
        let row: TemplateRow = self
            .insert("time_slot_templates", serde_json::to_value(TemplateRow::from(&template))?)
            .await?;
        TimeSlotTemplate::try_from(row)
    }
}
