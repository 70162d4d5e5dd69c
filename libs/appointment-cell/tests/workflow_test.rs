use std::sync::Arc;

use assert_matches::assert_matches;
use chrono::{Datelike, Duration, NaiveDate, Weekday};
use uuid::Uuid;

use appointment_cell::{
    BookingError, BookingLedger, BookingStatus, BookingSubmission, BookingWorkflow, ContactDetails,
    WorkflowError, WorkflowStep,
};
use doctor_cell::AvailabilityService;
use shared_database::{seed_demo_clinic, AppState, ClinicStore, DemoClinic};
use shared_utils::test_utils::TestConfig;

async fn setup() -> (Arc<AppState>, DemoClinic) {
    let state = TestConfig::default().to_state();
    let clinic = seed_demo_clinic(state.store.as_ref()).await.unwrap();
    (state, clinic)
}

fn day(offset: i64) -> NaiveDate {
    AvailabilityService::today() + Duration::days(offset)
}

fn next_saturday() -> NaiveDate {
    let mut date = day(1);
    while date.weekday() != Weekday::Sat {
        date = date.succ_opt().unwrap();
    }
    date
}

fn contact() -> ContactDetails {
    ContactDetails {
        name: "Pat Patient".to_string(),
        email: "pat@example.com".to_string(),
        phone: "555-010-0199".to_string(),
    }
}

/// A workflow for Dr. A on `date`, waiting for a slot.
async fn at_slot_selection(state: &AppState, clinic: &DemoClinic, date: NaiveDate) -> BookingWorkflow {
    let mut workflow = BookingWorkflow::new(state, Uuid::new_v4());
    workflow.select_specialty(clinic.cardiology.id).await.unwrap();
    workflow.select_doctor(clinic.dr_a.id).await.unwrap();
    workflow.select_date(date).await.unwrap();
    workflow
}

#[tokio::test]
async fn walks_every_step_to_a_confirmed_booking() {
    let (state, clinic) = setup().await;
    let patient = Uuid::new_v4();
    let mut workflow = BookingWorkflow::new(&state, patient);
    assert_eq!(workflow.step(), WorkflowStep::SelectSpecialty);

    let specialties = workflow.specialties().await.unwrap();
    assert_eq!(specialties.len(), 2);

    let doctors = workflow.select_specialty(clinic.cardiology.id).await.unwrap();
    assert_eq!(doctors.iter().map(|d| d.name.as_str()).collect::<Vec<_>>(), vec!["Dr. A"]);

    let (first, last) = workflow.select_doctor(clinic.dr_a.id).await.unwrap();
    assert_eq!((first, last), (day(0), day(30)));

    let slots = workflow.select_date(day(5)).await.unwrap();
    assert_eq!(slots.iter().map(|s| s.id.as_str()).collect::<Vec<_>>(), vec!["09:00", "09:30"]);

    workflow.select_time_slot("09:00").await.unwrap();
    assert_eq!(workflow.step(), WorkflowStep::EnterContactDetails);

    workflow.enter_contact_details(contact()).unwrap();
    assert_eq!(workflow.step(), WorkflowStep::Confirm);

    let booking = workflow.confirm().await.unwrap();
    assert_eq!(booking.patient_id, patient);
    assert_eq!(booking.status, BookingStatus::Booked);
    assert_eq!(workflow.step(), WorkflowStep::Completed);

    assert_matches!(
        workflow.select_specialty(clinic.cardiology.id).await,
        Err(WorkflowError::OutOfOrder { current: WorkflowStep::Completed, .. })
    );
}

#[tokio::test]
async fn steps_cannot_be_skipped() {
    let (state, clinic) = setup().await;
    let mut workflow = BookingWorkflow::new(&state, Uuid::new_v4());

    assert_matches!(
        workflow.select_doctor(clinic.dr_a.id).await,
        Err(WorkflowError::OutOfOrder {
            current: WorkflowStep::SelectSpecialty,
            attempted: WorkflowStep::SelectDoctor
        })
    );
    assert_matches!(workflow.enter_contact_details(contact()), Err(WorkflowError::OutOfOrder { .. }));
    assert_matches!(workflow.confirm().await, Err(WorkflowError::OutOfOrder { .. }));
}

#[tokio::test]
async fn selections_are_checked_against_the_previous_step() {
    let (state, clinic) = setup().await;
    let mut workflow = BookingWorkflow::new(&state, Uuid::new_v4());

    assert_matches!(
        workflow.select_specialty(Uuid::new_v4()).await,
        Err(WorkflowError::InvalidSelection(_))
    );

    workflow.select_specialty(clinic.cardiology.id).await.unwrap();
    assert_matches!(
        workflow.select_doctor(clinic.dr_b.id).await,
        Err(WorkflowError::InvalidSelection(_))
    );

    workflow.select_doctor(clinic.dr_a.id).await.unwrap();
    assert_matches!(workflow.select_date(day(31)).await, Err(WorkflowError::InvalidSelection(_)));
    assert_matches!(workflow.select_date(day(-1)).await, Err(WorkflowError::InvalidSelection(_)));

    workflow.select_date(day(2)).await.unwrap();
    assert_matches!(workflow.select_time_slot("11:15").await, Err(WorkflowError::InvalidSelection(_)));
    assert_eq!(workflow.step(), WorkflowStep::SelectTimeSlot);
}

#[tokio::test]
async fn day_the_doctor_does_not_work_is_rejected() {
    let (state, clinic) = setup().await;
    let mut workflow = BookingWorkflow::new(&state, Uuid::new_v4());
    workflow.select_specialty(clinic.dermatology.id).await.unwrap();
    workflow.select_doctor(clinic.dr_b.id).await.unwrap();

    assert_matches!(
        workflow.select_date(next_saturday()).await,
        Err(WorkflowError::InvalidSelection(_))
    );
    assert_eq!(workflow.step(), WorkflowStep::SelectDate);
}

#[tokio::test]
async fn going_back_clears_later_choices_but_keeps_contact_details() {
    let (state, clinic) = setup().await;
    let mut workflow = at_slot_selection(&state, &clinic, day(3)).await;
    workflow.select_time_slot("09:00").await.unwrap();
    workflow.enter_contact_details(contact()).unwrap();

    workflow.select_doctor(clinic.dr_a.id).await.unwrap();
    assert_eq!(workflow.step(), WorkflowStep::SelectDate);
    assert_eq!(workflow.selection().date, None);
    assert_eq!(workflow.selection().time_slot_id, None);
    assert!(workflow.selection().contact.is_some());

    workflow.select_date(day(4)).await.unwrap();
    workflow.select_time_slot("09:30").await.unwrap();
    assert_eq!(workflow.step(), WorkflowStep::Confirm);

    workflow.select_specialty(clinic.dermatology.id).await.unwrap();
    assert_eq!(workflow.step(), WorkflowStep::SelectDoctor);
    assert_eq!(workflow.selection().doctor_id, None);
}

#[tokio::test]
async fn slot_lost_before_confirm_returns_to_slot_selection() {
    let (state, clinic) = setup().await;
    let mut workflow = at_slot_selection(&state, &clinic, day(5)).await;
    workflow.select_time_slot("09:00").await.unwrap();
    workflow.enter_contact_details(contact()).unwrap();

    BookingLedger::new(&state)
        .create(clinic.dr_a.id, Uuid::new_v4(), day(5), "09:00", &contact())
        .await
        .unwrap();

    let available = match workflow.confirm().await {
        Err(WorkflowError::SlotTaken { available }) => available,
        other => panic!("expected SlotTaken, got {:?}", other),
    };
    assert_eq!(available.iter().map(|s| s.id.as_str()).collect::<Vec<_>>(), vec!["09:30"]);
    assert_eq!(workflow.step(), WorkflowStep::SelectTimeSlot);
    assert_eq!(workflow.selection().time_slot_id, None);

    workflow.select_time_slot("09:30").await.unwrap();
    assert_eq!(workflow.step(), WorkflowStep::Confirm);
    let booking = workflow.confirm().await.unwrap();
    assert_eq!(booking.time_slot_id, "09:30");
}

#[tokio::test]
async fn fully_booked_day_offers_nothing() {
    let (state, clinic) = setup().await;
    let ledger = BookingLedger::new(&state);
    for slot in ["09:00", "09:30"] {
        ledger
            .create(clinic.dr_a.id, Uuid::new_v4(), day(6), slot, &contact())
            .await
            .unwrap();
    }

    let mut workflow = BookingWorkflow::new(&state, Uuid::new_v4());
    workflow.select_specialty(clinic.cardiology.id).await.unwrap();
    workflow.select_doctor(clinic.dr_a.id).await.unwrap();
    assert!(workflow.select_date(day(6)).await.unwrap().is_empty());

    assert_matches!(
        workflow.select_time_slot("09:00").await,
        Err(WorkflowError::SlotTaken { available }) if available.is_empty()
    );
}

#[tokio::test]
async fn abandoned_workflow_leaves_no_booking() {
    let (state, clinic) = setup().await;
    {
        let mut workflow = at_slot_selection(&state, &clinic, day(5)).await;
        workflow.select_time_slot("09:00").await.unwrap();
        workflow.enter_contact_details(contact()).unwrap();
    }

    assert!(state.store.booked_slot_ids(clinic.dr_a.id, day(5)).await.unwrap().is_empty());
}

#[tokio::test]
async fn pinned_date_moves_the_booking_window() {
    let (state, clinic) = setup().await;
    let pinned = day(100);
    let mut workflow = BookingWorkflow::new(&state, Uuid::new_v4()).as_of(pinned);

    workflow.select_specialty(clinic.cardiology.id).await.unwrap();
    let window = workflow.select_doctor(clinic.dr_a.id).await.unwrap();
    assert_eq!(window, (pinned, pinned + Duration::days(30)));

    workflow.select_date(pinned + Duration::days(3)).await.unwrap();
    workflow.select_time_slot("09:30").await.unwrap();
    workflow.enter_contact_details(contact()).unwrap();
    let booking = workflow.confirm().await.unwrap();
    assert_eq!(booking.date, pinned + Duration::days(3));
}

// ==============================================================================
// ONE-SHOT SUBMISSIONS
// ==============================================================================

fn submission(clinic: &DemoClinic, date: NaiveDate, slot: &str) -> BookingSubmission {
    BookingSubmission {
        specialty_id: None,
        doctor_id: clinic.dr_a.id,
        date,
        time_slot_id: slot.to_string(),
        patient_name: "Pat Patient".to_string(),
        patient_email: "pat@example.com".to_string(),
        patient_phone: "5550100199".to_string(),
    }
}

#[tokio::test]
async fn submission_replays_to_confirm() {
    let (state, clinic) = setup().await;
    let mut workflow = BookingWorkflow::from_submission(&state, Uuid::new_v4(), &submission(&clinic, day(2), "09:30"))
        .await
        .unwrap();

    assert_eq!(workflow.step(), WorkflowStep::Confirm);
    assert_eq!(workflow.selection().specialty_id, Some(clinic.cardiology.id));
    assert!(workflow.confirm().await.is_ok());
}

#[tokio::test]
async fn submission_with_wrong_specialty_or_stale_slot_is_rejected() {
    let (state, clinic) = setup().await;

    let mut wrong_specialty = submission(&clinic, day(2), "09:00");
    wrong_specialty.specialty_id = Some(clinic.dermatology.id);
    assert_matches!(
        BookingWorkflow::from_submission(&state, Uuid::new_v4(), &wrong_specialty).await.err(),
        Some(WorkflowError::InvalidSelection(_))
    );

    assert_matches!(
        BookingWorkflow::from_submission(&state, Uuid::new_v4(), &submission(&clinic, day(2), "10:00")).await.err(),
        Some(WorkflowError::Booking(BookingError::InvalidSlot(_)))
    );
    assert_matches!(
        BookingWorkflow::from_submission(&state, Uuid::new_v4(), &submission(&clinic, day(45), "09:00")).await.err(),
        Some(WorkflowError::Booking(BookingError::InvalidSlot(_)))
    );

    let mut unknown_doctor = submission(&clinic, day(2), "09:00");
    unknown_doctor.doctor_id = Uuid::new_v4();
    assert_matches!(
        BookingWorkflow::from_submission(&state, Uuid::new_v4(), &unknown_doctor).await.err(),
        Some(WorkflowError::Booking(BookingError::NotFound(_)))
    );
}

#[tokio::test]
async fn submission_with_bad_contact_is_rejected() {
    let (state, clinic) = setup().await;
    let mut bad = submission(&clinic, day(2), "09:00");
    bad.patient_phone = "call me".to_string();

    assert_matches!(
        BookingWorkflow::from_submission(&state, Uuid::new_v4(), &bad).await.err(),
        Some(WorkflowError::Booking(BookingError::InvalidContact(_)))
    );
}
