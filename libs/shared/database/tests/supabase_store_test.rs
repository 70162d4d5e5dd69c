use std::time::Duration;

use assert_matches::assert_matches;
use chrono::{NaiveDate, NaiveTime, Utc, Weekday};
use serde_json::json;
use uuid::Uuid;
use wiremock::matchers::{method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

use shared_config::AppConfig;
use shared_database::{bounded, ClinicStore, StoreError, SupabaseStore};
use shared_models::clinic::{
    BookingStatus, ContactDetails, NewBooking, SlotSchedule, StatusChange,
};

fn store_for(server: &MockServer) -> SupabaseStore {
    let config = AppConfig {
        supabase_url: server.uri(),
        supabase_anon_key: "test-anon-key".to_string(),
        supabase_jwt_secret: "test-secret".to_string(),
        store_max_retries: 2,
        ..AppConfig::default()
    };
    SupabaseStore::new(&config)
}

fn date() -> NaiveDate {
    NaiveDate::from_ymd_opt(2026, 3, 2).unwrap()
}

fn new_booking(doctor_id: Uuid) -> NewBooking {
    NewBooking {
        doctor_id,
        patient_id: Uuid::new_v4(),
        date: date(),
        time_slot_id: "09:30".to_string(),
        contact: ContactDetails {
            name: "Test Patient".to_string(),
            email: "patient@example.com".to_string(),
            phone: "5550100".to_string(),
        },
    }
}

#[tokio::test]
async fn conflicting_insert_surfaces_as_unique_violation() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/rest/v1/bookings"))
        .respond_with(ResponseTemplate::new(409).set_body_json(json!({
            "code": "23505",
            "message": "duplicate key value violates unique constraint \"bookings_active_slot_key\""
        })))
        .expect(1)
        .mount(&server)
        .await;

    let err = store_for(&server).insert_booking(new_booking(Uuid::new_v4())).await.unwrap_err();

    assert_matches!(err, StoreError::UniqueViolation(msg) if msg.contains("bookings_active_slot_key"));
}

#[tokio::test]
async fn inserted_booking_is_read_back_from_representation() {
    let server = MockServer::start().await;
    let doctor_id = Uuid::new_v4();
    let stored = new_booking(doctor_id).into_booking(Utc::now());

    Mock::given(method("POST"))
        .and(path("/rest/v1/bookings"))
        .respond_with(ResponseTemplate::new(201).set_body_json(json!([stored])))
        .mount(&server)
        .await;

    let booking = store_for(&server).insert_booking(new_booking(doctor_id)).await.unwrap();
    assert_eq!(booking.status, BookingStatus::Booked);
    assert_eq!(booking.time_slot_id, "09:30");
}

#[tokio::test]
async fn booked_slot_ids_filter_on_active_status() {
    let server = MockServer::start().await;
    let doctor_id = Uuid::new_v4();

    Mock::given(method("GET"))
        .and(path("/rest/v1/bookings"))
        .and(query_param("doctor_id", format!("eq.{}", doctor_id)))
        .and(query_param("date", "eq.2026-03-02"))
        .and(query_param("status", "eq.booked"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            { "time_slot_id": "09:00" },
            { "time_slot_id": "10:30" }
        ])))
        .mount(&server)
        .await;

    let slots = store_for(&server).booked_slot_ids(doctor_id, date()).await.unwrap();
    assert_eq!(slots, vec!["09:00".to_string(), "10:30".to_string()]);
}

#[tokio::test]
async fn status_update_on_moved_booking_is_precondition_failure() {
    let server = MockServer::start().await;
    let mut existing = new_booking(Uuid::new_v4()).into_booking(Utc::now());
    existing.status = BookingStatus::Cancelled;

    Mock::given(method("PATCH"))
        .and(path("/rest/v1/bookings"))
        .and(query_param("status", "eq.booked"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/rest/v1/bookings"))
        .and(query_param("id", format!("eq.{}", existing.id)))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([existing])))
        .mount(&server)
        .await;

    let change = StatusChange {
        from: BookingStatus::Booked,
        to: BookingStatus::Cancelled,
        notes: None,
    };
    let err = store_for(&server).update_status(existing.id, change).await.unwrap_err();

    assert_eq!(err, StoreError::PreconditionFailed);
}

#[tokio::test]
async fn notes_patch_skips_cancelled_bookings() {
    let server = MockServer::start().await;
    let mut existing = new_booking(Uuid::new_v4()).into_booking(Utc::now());
    existing.status = BookingStatus::Cancelled;

    Mock::given(method("PATCH"))
        .and(path("/rest/v1/bookings"))
        .and(query_param("status", "neq.cancelled"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/rest/v1/bookings"))
        .and(query_param("id", format!("eq.{}", existing.id)))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([existing])))
        .mount(&server)
        .await;

    let err = store_for(&server)
        .update_notes(existing.id, "late note".to_string())
        .await
        .unwrap_err();

    assert_eq!(err, StoreError::PreconditionFailed);
}

#[tokio::test]
async fn template_rows_become_schedules() {
    let server = MockServer::start().await;
    let doctor_id = Uuid::new_v4();

    Mock::given(method("GET"))
        .and(path("/rest/v1/time_slot_templates"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            {
                "id": Uuid::new_v4(),
                "doctor_id": doctor_id,
                "weekday": "Mon",
                "specific_date": null,
                "start_time": "09:00:00",
                "end_time": "10:00:00",
                "interval_minutes": 30,
                "is_available": true
            },
            {
                "id": Uuid::new_v4(),
                "doctor_id": doctor_id,
                "weekday": null,
                "specific_date": "2026-03-04",
                "start_time": "13:00:00",
                "end_time": "14:00:00",
                "interval_minutes": 20,
                "is_available": true
            }
        ])))
        .mount(&server)
        .await;

    let templates = store_for(&server).list_templates(doctor_id).await.unwrap();

    assert_eq!(templates.len(), 2);
    assert_eq!(templates[0].schedule, SlotSchedule::Weekly { weekday: Weekday::Mon });
    assert_eq!(templates[0].start_time, NaiveTime::from_hms_opt(9, 0, 0).unwrap());
    assert_eq!(
        templates[1].schedule,
        SlotSchedule::OnDate { date: NaiveDate::from_ymd_opt(2026, 3, 4).unwrap() }
    );
}

#[tokio::test]
async fn reads_are_retried_after_transient_failures() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/rest/v1/specialties"))
        .respond_with(ResponseTemplate::new(503))
        .up_to_n_times(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/rest/v1/specialties"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            { "id": Uuid::new_v4(), "name": "Cardiology" }
        ])))
        .mount(&server)
        .await;

    let specialties = store_for(&server).list_specialties().await.unwrap();
    assert_eq!(specialties.len(), 1);
    assert_eq!(specialties[0].name, "Cardiology");
}

#[tokio::test]
async fn slow_read_is_retried_within_the_call_bound() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/rest/v1/specialties"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(json!([]))
                .set_delay(Duration::from_secs(3)),
        )
        .up_to_n_times(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/rest/v1/specialties"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            { "id": Uuid::new_v4(), "name": "Dermatology" }
        ])))
        .mount(&server)
        .await;

    let config = AppConfig {
        supabase_url: server.uri(),
        supabase_anon_key: "test-anon-key".to_string(),
        store_timeout_ms: 700,
        store_max_retries: 1,
        ..AppConfig::default()
    };
    let store = SupabaseStore::new(&config);

    let specialties = bounded(config.store_timeout(), store.list_specialties()).await.unwrap();
    assert_eq!(specialties.len(), 1);
    assert_eq!(specialties[0].name, "Dermatology");
}

#[tokio::test]
async fn writes_are_never_retried() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/rest/v1/bookings"))
        .respond_with(ResponseTemplate::new(503))
        .expect(1)
        .mount(&server)
        .await;

    let err = store_for(&server).insert_booking(new_booking(Uuid::new_v4())).await.unwrap_err();
    assert!(err.is_transient());
}
