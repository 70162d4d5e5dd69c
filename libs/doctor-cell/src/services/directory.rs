use std::sync::Arc;
use std::time::Duration;

use tracing::debug;
use uuid::Uuid;

use shared_database::{bounded, AppState, ClinicStore};

use crate::models::{DirectoryError, Doctor, Specialty};

/// Read-only view of specialties and the doctors practising them.
pub struct DirectoryService {
    store: Arc<dyn ClinicStore>,
    timeout: Duration,
}

impl DirectoryService {
    pub fn new(state: &AppState) -> Self {
        Self {
            store: Arc::clone(&state.store),
            timeout: state.config.store_timeout(),
        }
    }

    /// All specialties in the order they were created.
    pub async fn list_specialties(&self) -> Result<Vec<Specialty>, DirectoryError> {
        debug!("Listing specialties");
        Ok(bounded(self.timeout, self.store.list_specialties()).await?)
    }

    pub async fn get_specialty(&self, specialty_id: Uuid) -> Result<Specialty, DirectoryError> {
        bounded(self.timeout, self.store.get_specialty(specialty_id))
            .await?
            .ok_or(DirectoryError::SpecialtyNotFound(specialty_id))
    }

    /// Doctors practising the specialty. An unknown specialty is
    /// `SpecialtyNotFound`, not an empty list.
    pub async fn list_doctors(&self, specialty_id: Uuid) -> Result<Vec<Doctor>, DirectoryError> {
        debug!("Listing doctors for specialty {}", specialty_id);
        self.get_specialty(specialty_id).await?;
        Ok(bounded(self.timeout, self.store.list_doctors(specialty_id)).await?)
    }

    pub async fn get_doctor(&self, doctor_id: Uuid) -> Result<Doctor, DirectoryError> {
        bounded(self.timeout, self.store.get_doctor(doctor_id))
            .await?
            .ok_or(DirectoryError::DoctorNotFound(doctor_id))
    }
}
