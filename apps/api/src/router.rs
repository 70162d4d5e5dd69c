use std::sync::Arc;

use axum::{
    Router,
    routing::get,
};

use appointment_cell::router::booking_routes;
use doctor_cell::router::directory_routes;
use shared_database::AppState;

pub fn create_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/", get(|| async { "Clinic booking API is running!" }))
        .merge(directory_routes(state.clone()))
        .merge(booking_routes(state))
}
