use std::sync::Arc;

use axum::{
    extract::{Query, State},
    Json,
};

use shared_database::AppState;
use shared_models::error::AppError;

use crate::models::{Doctor, DoctorQuery, SlotQuery, Specialty, TimeSlot};
use crate::services::{AvailabilityService, DirectoryService};

#[axum::debug_handler]
pub async fn list_specialties(
    State(state): State<Arc<AppState>>,
) -> Result<Json<Vec<Specialty>>, AppError> {
    let directory = DirectoryService::new(&state);
    Ok(Json(directory.list_specialties().await?))
}

#[axum::debug_handler]
pub async fn list_doctors(
    State(state): State<Arc<AppState>>,
    Query(query): Query<DoctorQuery>,
) -> Result<Json<Vec<Doctor>>, AppError> {
    let directory = DirectoryService::new(&state);
    Ok(Json(directory.list_doctors(query.specialty).await?))
}

/// Free slots for a doctor on a date. Dates outside the booking window
/// return an empty list rather than an error.
#[axum::debug_handler]
pub async fn list_slots(
    State(state): State<Arc<AppState>>,
    Query(query): Query<SlotQuery>,
) -> Result<Json<Vec<TimeSlot>>, AppError> {
    let availability = AvailabilityService::new(&state);
    Ok(Json(availability.list_slots(query.doctor, query.date).await?))
}
