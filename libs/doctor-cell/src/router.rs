use std::sync::Arc;

use axum::{
    Router,
    routing::get,
};

use shared_database::AppState;

use crate::handlers;

/// Directory and availability lookups. All public.
pub fn directory_routes(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/specialties", get(handlers::list_specialties))
        .route("/doctors", get(handlers::list_doctors))
        .route("/slots", get(handlers::list_slots))
        .with_state(state)
}
