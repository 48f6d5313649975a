//! Storage traits for the Ambulink persistence layer.
//!
//! Backends must be thread-safe (`Send + Sync`); they are shared behind `Arc`
//! across request handlers and WebSocket sessions.

use async_trait::async_trait;
use serde_json::Value;

use ambulink_core::{Doctor, EmergencyEvent};

use crate::error::StorageError;
use crate::types::Account;

/// The mutable doctor roster, rewritten whole on every change.
#[async_trait]
pub trait DoctorStore: Send + Sync {
    /// Loads the roster in storage order.
    ///
    /// Returns `None` when nothing has been persisted yet.
    async fn load(&self) -> Result<Option<Vec<Doctor>>, StorageError>;

    /// Replaces the persisted roster. Last writer wins.
    async fn save(&self, doctors: &[Doctor]) -> Result<(), StorageError>;
}

/// Append-only collection of emergency events.
#[async_trait]
pub trait EventStore: Send + Sync {
    /// Persists a normalized event as a new, immutable unit.
    ///
    /// # Errors
    ///
    /// Never overwrites a previous event; backends report a write failure
    /// rather than replacing an existing record.
    async fn insert(&self, event: &EmergencyEvent) -> Result<(), StorageError>;

    /// Most recently written event, if any.
    async fn latest(&self) -> Result<Option<EmergencyEvent>, StorageError>;

    /// Most recent event for a patient id, if any.
    async fn find_by_patient_id(
        &self,
        patient_id: &str,
    ) -> Result<Option<EmergencyEvent>, StorageError>;

    /// Up to `limit` events, most recent first.
    async fn list(&self, limit: usize) -> Result<Vec<EmergencyEvent>, StorageError>;

    /// Normalizes a raw inbound payload, persists it and returns the record.
    ///
    /// # Errors
    ///
    /// Returns `StorageError::InvalidRecord` if the payload cannot be normalized.
    async fn append(&self, raw: &Value) -> Result<EmergencyEvent, StorageError> {
        let event = ambulink_core::normalize(raw)?;
        self.insert(&event).await?;
        Ok(event)
    }
}

/// Registered dashboard accounts.
#[async_trait]
pub trait AccountStore: Send + Sync {
    async fn find_by_email(&self, email: &str) -> Result<Option<Account>, StorageError>;

    /// Adds an account.
    ///
    /// # Errors
    ///
    /// Returns `StorageError::AlreadyExists` if the email or Emirates ID is taken.
    async fn insert(&self, account: Account) -> Result<(), StorageError>;
}
