//! Doctor Registry: the in-process roster and its availability state.
//!
//! Reads are served from a snapshot behind a `parking_lot::RwLock`. Every
//! mutation runs under one async mutex, writes the full next roster through the
//! [`DoctorStore`] and only then swaps it in, so a failed write leaves the
//! in-memory roster untouched.

use std::sync::Arc;

use ambulink_core::{Availability, Doctor, MatchError, match_doctor};
use ambulink_storage::{DoctorStore, StorageError};
use parking_lot::RwLock;
use thiserror::Error;
use tokio::sync::Mutex;

#[derive(Debug, Error)]
pub enum RegistryError {
    #[error("Doctor not found: {id}")]
    DoctorNotFound { id: String },

    #[error(transparent)]
    Match(#[from] MatchError),

    #[error("Roster persistence failed: {0}")]
    Storage(#[from] StorageError),
}

pub struct DoctorRegistry {
    doctors: RwLock<Vec<Doctor>>,
    write_lock: Mutex<()>,
    store: Arc<dyn DoctorStore>,
}

impl DoctorRegistry {
    /// Loads the persisted roster, seeding and persisting the default roster
    /// when nothing has been stored yet.
    pub async fn bootstrap(store: Arc<dyn DoctorStore>) -> Result<Self, RegistryError> {
        let doctors = match store.load().await? {
            Some(doctors) => doctors,
            None => {
                let seeded = seed_doctors();
                store.save(&seeded).await?;
                tracing::info!(count = seeded.len(), "Seeded doctor roster");
                seeded
            }
        };
        tracing::info!(doctors = doctors.len(), "Doctor registry loaded");
        Ok(Self::with_roster(store, doctors))
    }

    pub fn with_roster(store: Arc<dyn DoctorStore>, doctors: Vec<Doctor>) -> Self {
        Self {
            doctors: RwLock::new(doctors),
            write_lock: Mutex::new(()),
            store,
        }
    }

    /// Full roster in storage order.
    pub fn list_doctors(&self) -> Vec<Doctor> {
        self.doctors.read().clone()
    }

    pub fn get(&self, id: &str) -> Result<Doctor, RegistryError> {
        self.doctors
            .read()
            .iter()
            .find(|d| d.id == id)
            .cloned()
            .ok_or_else(|| RegistryError::DoctorNotFound { id: id.to_string() })
    }

    /// First available doctor with exactly this specialization.
    pub fn find_by_specialization_available(&self, specialization: &str) -> Option<Doctor> {
        self.doctors
            .read()
            .iter()
            .find(|d| d.specialization == specialization && d.availability.is_available())
            .cloned()
    }

    pub async fn set_availability(
        &self,
        id: &str,
        availability: Availability,
    ) -> Result<Doctor, RegistryError> {
        let _guard = self.write_lock.lock().await;
        let mut next = self.list_doctors();
        let doctor = next
            .iter_mut()
            .find(|d| d.id == id)
            .ok_or_else(|| RegistryError::DoctorNotFound { id: id.to_string() })?;
        doctor.availability = availability;
        let updated = doctor.clone();

        self.commit(next).await?;
        tracing::info!(
            doctor.id = %updated.id,
            availability = %availability,
            "Doctor availability updated"
        );
        Ok(updated)
    }

    /// Sets a doctor back to `Available`.
    pub async fn release(&self, id: &str) -> Result<Doctor, RegistryError> {
        self.set_availability(id, Availability::Available).await
    }

    /// Matches a doctor for `condition` and marks the winner `Busy`.
    ///
    /// Matching and the status flip happen under the same lock, so two
    /// concurrent assignments never receive the same doctor.
    pub async fn assign(
        &self,
        condition: &str,
        suggested: Option<&str>,
    ) -> Result<Doctor, RegistryError> {
        let _guard = self.write_lock.lock().await;
        let mut next = self.list_doctors();
        let chosen = match_doctor(&next, condition, suggested)?;

        let mut assigned = chosen;
        if let Some(doctor) = next.iter_mut().find(|d| d.id == assigned.id) {
            doctor.availability = Availability::Busy;
            assigned = doctor.clone();
        }

        self.commit(next).await?;
        tracing::info!(
            doctor.id = %assigned.id,
            doctor.name = %assigned.name,
            condition,
            "Doctor assigned"
        );
        Ok(assigned)
    }

    async fn commit(&self, next: Vec<Doctor>) -> Result<(), RegistryError> {
        if let Err(e) = self.store.save(&next).await {
            tracing::error!(error = %e, "Failed to persist doctor roster; keeping previous state");
            return Err(e.into());
        }
        *self.doctors.write() = next;
        Ok(())
    }
}

/// Default roster written on first start.
pub fn seed_doctors() -> Vec<Doctor> {
    let doctor = |id: &str,
                  name: &str,
                  specialization: &str,
                  title: &str,
                  experience_years: u32,
                  availability: Availability,
                  rating: f64,
                  patients_handled: u32,
                  contact: &str,
                  email: &str| Doctor {
        id: id.into(),
        name: name.into(),
        specialization: specialization.into(),
        title: title.into(),
        experience_years,
        availability,
        rating,
        patients_handled,
        contact: contact.into(),
        email: email.into(),
        image_url: Some(format!(
            "https://api.dicebear.com/7.x/avataaars/svg?seed={}",
            name.replace(' ', "")
        )),
    };

    vec![
        doctor(
            "1",
            "Dr. Soufiane Chami",
            "Cardiologist",
            "Senior Specialist",
            15,
            Availability::Available,
            4.8,
            1200,
            "+971582863584",
            "sarah.johnson@hospital.com",
        ),
        doctor(
            "2",
            "Dr. Michael Chen",
            "Neurologist",
            "Department Head",
            20,
            Availability::Available,
            4.9,
            1500,
            "+1234567891",
            "michael.chen@hospital.com",
        ),
        doctor(
            "3",
            "Dr. Smith",
            "Emergency Medicine",
            "Senior Specialist",
            12,
            Availability::Busy,
            4.7,
            1000,
            "+1234567892",
            "smith@hospital.com",
        ),
    ]
}
