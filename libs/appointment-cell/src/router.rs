// libs/appointment-cell/src/router.rs
use std::sync::Arc;

use axum::{
    middleware,
    routing::{get, patch, post, put},
    Router,
};

use shared_database::AppState;
use shared_utils::extractor::auth_middleware;

use crate::handlers;

/// Booking operations. Every route requires a bearer token.
pub fn booking_routes(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/bookings", post(handlers::create_booking))
        .route(
            "/bookings/{booking_id}",
            get(handlers::get_booking).delete(handlers::cancel_booking),
        )
        .route("/bookings/{booking_id}/status", put(handlers::update_booking_status))
        .route("/bookings/{booking_id}/notes", put(handlers::update_booking_notes))
        .route("/bookings/{booking_id}/reschedule", patch(handlers::reschedule_booking))
        .route("/patients/appointments", get(handlers::list_patient_appointments))
        .route("/doctors/appointments", get(handlers::list_doctor_appointments))
        .route_layer(middleware::from_fn_with_state(state.config.clone(), auth_middleware))
        .with_state(state)
}
