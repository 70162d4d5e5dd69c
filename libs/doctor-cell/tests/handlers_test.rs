use axum::{
    body::Body,
    http::{Request, StatusCode},
};
use chrono::Duration;
use serde_json::Value;
use tower::ServiceExt;
use uuid::Uuid;

use doctor_cell::router::directory_routes;
use doctor_cell::AvailabilityService;
use shared_database::seed_demo_clinic;
use shared_utils::test_utils::TestConfig;

async fn get(app: axum::Router, uri: &str) -> (StatusCode, Value) {
    let response = app
        .oneshot(Request::builder().uri(uri).body(Body::empty()).unwrap())
        .await
        .unwrap();

    let status = response.status();
    let body = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let json = serde_json::from_slice(&body).unwrap_or(Value::Null);
    (status, json)
}

#[tokio::test]
async fn specialties_endpoint_lists_catalog() {
    let state = TestConfig::default().to_state();
    seed_demo_clinic(state.store.as_ref()).await.unwrap();

    let (status, json) = get(directory_routes(state), "/specialties").await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(json[0]["name"], "Cardiology");
    assert_eq!(json[1]["name"], "Dermatology");
}

#[tokio::test]
async fn doctors_endpoint_filters_by_specialty() {
    let state = TestConfig::default().to_state();
    let clinic = seed_demo_clinic(state.store.as_ref()).await.unwrap();

    let uri = format!("/doctors?specialty={}", clinic.cardiology.id);
    let (status, json) = get(directory_routes(state), &uri).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(json.as_array().unwrap().len(), 1);
    assert_eq!(json[0]["name"], "Dr. A");
}

#[tokio::test]
async fn doctors_endpoint_reports_unknown_specialty() {
    let state = TestConfig::default().to_state();

    let uri = format!("/doctors?specialty={}", Uuid::new_v4());
    let (status, json) = get(directory_routes(state), &uri).await;

    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(json["code"], "not_found");
}

#[tokio::test]
async fn slots_endpoint_returns_free_slots() {
    let state = TestConfig::default().to_state();
    let clinic = seed_demo_clinic(state.store.as_ref()).await.unwrap();
    let day = AvailabilityService::today() + Duration::days(5);

    let uri = format!("/slots?doctor={}&date={}", clinic.dr_a.id, day);
    let (status, json) = get(directory_routes(state), &uri).await;

    assert_eq!(status, StatusCode::OK);
    let ids: Vec<&str> = json.as_array().unwrap().iter().map(|s| s["id"].as_str().unwrap()).collect();
    assert_eq!(ids, vec!["09:00", "09:30"]);
}

#[tokio::test]
async fn slots_endpoint_returns_empty_list_past_horizon() {
    let state = TestConfig::default().to_state();
    let clinic = seed_demo_clinic(state.store.as_ref()).await.unwrap();
    let day = AvailabilityService::today() + Duration::days(45);

    let uri = format!("/slots?doctor={}&date={}", clinic.dr_a.id, day);
    let (status, json) = get(directory_routes(state), &uri).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(json, serde_json::json!([]));
}

#[tokio::test]
async fn slots_endpoint_rejects_malformed_date() {
    let state = TestConfig::default().to_state();
    let clinic = seed_demo_clinic(state.store.as_ref()).await.unwrap();

    let uri = format!("/slots?doctor={}&date=next-tuesday", clinic.dr_a.id);
    let (status, _) = get(directory_routes(state), &uri).await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
}
