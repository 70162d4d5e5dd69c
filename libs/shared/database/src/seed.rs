use chrono::{NaiveTime, Weekday};
use tracing::info;
use uuid::Uuid;

use shared_models::clinic::{Doctor, Specialty, TimeSlotTemplate};

use crate::error::StoreError;
use crate::store::ClinicStore;

const ALL_WEEKDAYS: [Weekday; 7] = [
    Weekday::Mon,
    Weekday::Tue,
    Weekday::Wed,
    Weekday::Thu,
    Weekday::Fri,
    Weekday::Sat,
    Weekday::Sun,
];

/// Ids of the records created by [`seed_demo_clinic`].
#[derive(Debug, Clone)]
pub struct DemoClinic {
    pub cardiology: Specialty,
    pub dermatology: Specialty,
    pub dr_a: Doctor,
    pub dr_b: Doctor,
}

/// Cardiology with Dr. A (09:00 and 09:30 every day) and Dermatology with
/// Dr. B (weekday afternoons, 20-minute slots).
pub async fn seed_demo_clinic(store: &dyn ClinicStore) -> Result<DemoClinic, StoreError> {
    let cardiology = store
        .add_specialty(Specialty { id: Uuid::new_v4(), name: "Cardiology".to_string() })
        .await?;
    let dermatology = store
        .add_specialty(Specialty { id: Uuid::new_v4(), name: "Dermatology".to_string() })
        .await?;

    let dr_a = store
        .add_doctor(Doctor {
            id: Uuid::new_v4(),
            name: "Dr. A".to_string(),
            specialty_id: cardiology.id,
            bio: "Consultant cardiologist.".to_string(),
            photo_url: None,
        })
        .await?;
    let dr_b = store
        .add_doctor(Doctor {
            id: Uuid::new_v4(),
            name: "Dr. B".to_string(),
            specialty_id: dermatology.id,
            bio: "General and paediatric dermatology.".to_string(),
            photo_url: None,
        })
        .await?;

    let (nine, ten) = (hm(9, 0), hm(10, 0));
    for weekday in ALL_WEEKDAYS {
        store
            .add_template(TimeSlotTemplate::weekly(dr_a.id, weekday, nine, ten, 30))
            .await?;
    }
    for weekday in &ALL_WEEKDAYS[..5] {
        store
            .add_template(TimeSlotTemplate::weekly(dr_b.id, *weekday, hm(14, 0), hm(16, 0), 20))
            .await?;
    }

    info!("Seeded demo clinic: {} and {}", cardiology.name, dermatology.name);

    Ok(DemoClinic { cardiology, dermatology, dr_a, dr_b })
}

fn hm(hour: u32, minute: u32) -> NaiveTime {
    NaiveTime::from_hms_opt(hour, minute, 0).unwrap_or(NaiveTime::MIN)
}
