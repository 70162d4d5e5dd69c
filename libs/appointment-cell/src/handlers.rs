// libs/appointment-cell/src/handlers.rs
use std::collections::HashMap;
use std::sync::Arc;

use axum::{
    extract::{Extension, Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use futures::future::try_join_all;
use serde_json::{json, Value};
use tracing::{debug, warn};
use uuid::Uuid;

use doctor_cell::{DirectoryError, DirectoryService};
use shared_database::AppState;
use shared_models::auth::User;
use shared_models::error::AppError;
use shared_utils::extractor::principal_id;

use crate::models::{
    AppointmentSummary, Booking, BookingError, BookingStatus, BookingSubmission, RescheduleOutcome,
    RescheduleRequest, UpdateNotesRequest, UpdateStatusRequest,
};
use crate::services::{BookingLedger, BookingWorkflow, WorkflowError};

// ==============================================================================
// BOOKING CREATION
// ==============================================================================

/// Replays the whole selection server-side, then commits it.
#[axum::debug_handler]
pub async fn create_booking(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<User>,
    Json(submission): Json<BookingSubmission>,
) -> Result<Response, AppError> {
    let patient_id = principal_id(&user)?;

    let confirmed = match BookingWorkflow::from_submission(&state, patient_id, &submission).await {
        Ok(mut workflow) => workflow.confirm().await,
        Err(err) => Err(err),
    };

    match confirmed {
        Ok(booking) => Ok((
            StatusCode::CREATED,
            Json(json!({
                "booking_id": booking.id,
                "booking": booking,
                "message": "Booking confirmed"
            })),
        )
            .into_response()),
        Err(WorkflowError::SlotTaken { available }) => {
            let err = AppError::from(BookingError::SlotConflict);
            Ok((
                StatusCode::CONFLICT,
                Json(json!({
                    "error": err.message(),
                    "code": err.code(),
                    "retryable": err.is_retryable(),
                    "available_slots": available
                })),
            )
                .into_response())
        }
        Err(err) => Err(err.into()),
    }
}

// ==============================================================================
// SINGLE BOOKING OPERATIONS
// ==============================================================================

#[axum::debug_handler]
pub async fn get_booking(
    State(state): State<Arc<AppState>>,
    Path(booking_id): Path<Uuid>,
    Extension(user): Extension<User>,
) -> Result<Json<Booking>, AppError> {
    let acting_id = principal_id(&user)?;
    let ledger = BookingLedger::new(&state);
    Ok(Json(ledger.get(booking_id, acting_id).await?))
}

#[axum::debug_handler]
pub async fn cancel_booking(
    State(state): State<Arc<AppState>>,
    Path(booking_id): Path<Uuid>,
    Extension(user): Extension<User>,
) -> Result<Json<Booking>, AppError> {
    let patient_id = principal_id(&user)?;
    let ledger = BookingLedger::new(&state);
    Ok(Json(ledger.cancel(booking_id, patient_id).await?))
}

/// Doctors may only move a booking to `completed`; cancelling is the patient's call.
#[axum::debug_handler]
pub async fn update_booking_status(
    State(state): State<Arc<AppState>>,
    Path(booking_id): Path<Uuid>,
    Extension(user): Extension<User>,
    Json(request): Json<UpdateStatusRequest>,
) -> Result<Json<Booking>, AppError> {
    let doctor_id = principal_id(&user)?;

    if request.status != BookingStatus::Completed {
        return Err(AppError::InvalidTransition(format!(
            "Cannot set a booking to {} here, only completed is allowed",
            request.status
        )));
    }

    let ledger = BookingLedger::new(&state);
    Ok(Json(ledger.complete(booking_id, doctor_id, request.notes).await?))
}

#[axum::debug_handler]
pub async fn update_booking_notes(
    State(state): State<Arc<AppState>>,
    Path(booking_id): Path<Uuid>,
    Extension(user): Extension<User>,
    Json(request): Json<UpdateNotesRequest>,
) -> Result<Json<Booking>, AppError> {
    let doctor_id = principal_id(&user)?;
    let ledger = BookingLedger::new(&state);
    Ok(Json(ledger.annotate(booking_id, doctor_id, request.notes).await?))
}

/// 200 when both halves succeed. 409 with the cancelled booking when the
/// old booking was released but the new slot could not be taken.
#[axum::debug_handler]
pub async fn reschedule_booking(
    State(state): State<Arc<AppState>>,
    Path(booking_id): Path<Uuid>,
    Extension(user): Extension<User>,
    Json(request): Json<RescheduleRequest>,
) -> Result<Response, AppError> {
    let patient_id = principal_id(&user)?;
    let ledger = BookingLedger::new(&state);

    let outcome = ledger
        .reschedule(booking_id, patient_id, request.date, &request.time_slot_id)
        .await?;

    let response = match outcome {
        RescheduleOutcome::Rescheduled { cancelled, booking } => (
            StatusCode::OK,
            Json(json!({
                "outcome": "rescheduled",
                "cancelled_booking": cancelled,
                "booking": booking
            })),
        ),
        RescheduleOutcome::PartiallyApplied { cancelled, error } => {
            let err = AppError::from(error);
            (
                StatusCode::CONFLICT,
                Json(json!({
                    "outcome": "partially_applied",
                    "cancelled_booking": cancelled,
                    "booking": Value::Null,
                    "error": err.message(),
                    "code": err.code(),
                    "message": "Your original booking was cancelled but the new slot could not be booked"
                })),
            )
        }
    };

    Ok(response.into_response())
}

// ==============================================================================
// APPOINTMENT LISTINGS
// ==============================================================================

#[axum::debug_handler]
pub async fn list_patient_appointments(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<User>,
) -> Result<Json<Vec<AppointmentSummary>>, AppError> {
    let patient_id = principal_id(&user)?;
    let ledger = BookingLedger::new(&state);
    let directory = DirectoryService::new(&state);

    let bookings = ledger.list_for_patient(patient_id).await?;

    let mut doctor_ids: Vec<Uuid> = bookings.iter().map(|b| b.doctor_id).collect();
    doctor_ids.sort();
    doctor_ids.dedup();

    let directory = &directory;
    let lookups = doctor_ids.into_iter().map(|doctor_id| async move {
        match directory.get_doctor(doctor_id).await {
            Ok(doctor) => Ok((doctor_id, Some(doctor.name))),
            Err(DirectoryError::DoctorNotFound(_)) => {
                warn!("Booking refers to unknown doctor {}", doctor_id);
                Ok((doctor_id, None))
            }
            Err(err) => Err(err),
        }
    });
    let doctor_names: HashMap<Uuid, Option<String>> = try_join_all(lookups).await?.into_iter().collect();

    let appointments: Vec<AppointmentSummary> = bookings
        .into_iter()
        .map(|booking| {
            let doctor_name = doctor_names.get(&booking.doctor_id).cloned().flatten();
            AppointmentSummary { booking, doctor_name }
        })
        .collect();

    debug!("Patient {} has {} appointments", patient_id, appointments.len());
    Ok(Json(appointments))
}

#[axum::debug_handler]
pub async fn list_doctor_appointments(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<User>,
) -> Result<Json<Vec<Booking>>, AppError> {
    let doctor_id = principal_id(&user)?;
    let ledger = BookingLedger::new(&state);
    Ok(Json(ledger.list_for_doctor(doctor_id).await?))
}
