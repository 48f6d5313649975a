//! In-memory backends with the same semantics as the file backends.

use async_trait::async_trait;
use tokio::sync::RwLock;

use ambulink_core::{Doctor, EmergencyEvent};

use crate::error::StorageError;
use crate::traits::{AccountStore, DoctorStore, EventStore};
use crate::types::Account;

#[derive(Debug, Default)]
pub struct MemoryDoctorStore {
    doctors: RwLock<Option<Vec<Doctor>>>,
}

impl MemoryDoctorStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// A store that already holds a persisted roster.
    pub fn with_doctors(doctors: Vec<Doctor>) -> Self {
        Self {
            doctors: RwLock::new(Some(doctors)),
        }
    }
}

#[async_trait]
impl DoctorStore for MemoryDoctorStore {
    async fn load(&self) -> Result<Option<Vec<Doctor>>, StorageError> {
        Ok(self.doctors.read().await.clone())
    }

    async fn save(&self, doctors: &[Doctor]) -> Result<(), StorageError> {
        *self.doctors.write().await = Some(doctors.to_vec());
        Ok(())
    }
}

/// Events kept in insertion order; the last one is the latest.
#[derive(Debug, Default)]
pub struct MemoryEventStore {
    events: RwLock<Vec<EmergencyEvent>>,
}

impl MemoryEventStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn len(&self) -> usize {
        self.events.read().await.len()
    }
}

#[async_trait]
impl EventStore for MemoryEventStore {
    async fn insert(&self, event: &EmergencyEvent) -> Result<(), StorageError> {
        self.events.write().await.push(event.clone());
        Ok(())
    }

    async fn latest(&self) -> Result<Option<EmergencyEvent>, StorageError> {
        Ok(self.events.read().await.last().cloned())
    }

    async fn find_by_patient_id(
        &self,
        patient_id: &str,
    ) -> Result<Option<EmergencyEvent>, StorageError> {
        Ok(self
            .events
            .read()
            .await
            .iter()
            .rev()
            .find(|e| e.patient.id == patient_id)
            .cloned())
    }

    async fn list(&self, limit: usize) -> Result<Vec<EmergencyEvent>, StorageError> {
        Ok(self
            .events
            .read()
            .await
            .iter()
            .rev()
            .take(limit)
            .cloned()
            .collect())
    }
}

#[derive(Debug, Default)]
pub struct MemoryAccountStore {
    accounts: RwLock<Vec<Account>>,
}

impl MemoryAccountStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl AccountStore for MemoryAccountStore {
    async fn find_by_email(&self, email: &str) -> Result<Option<Account>, StorageError> {
        Ok(self
            .accounts
            .read()
            .await
            .iter()
            .find(|a| a.email.eq_ignore_ascii_case(email))
            .cloned())
    }

    async fn insert(&self, account: Account) -> Result<(), StorageError> {
        let mut accounts = self.accounts.write().await;
        if accounts.iter().any(|a| a.conflicts_with(&account)) {
            return Err(StorageError::already_exists("Account", account.email));
        }
        accounts.push(account);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[tokio::test]
    async fn append_normalizes_and_latest_is_last() {
        let store = MemoryEventStore::new();
        store
            .append(&json!({ "conversation_id": "a", "fullDiagnosis": { "_id": "p1" } }))
            .await
            .unwrap();
        let second = store
            .append(&json!({ "conversation_id": "b", "fullDiagnosis": { "_id": "p2" } }))
            .await
            .unwrap();
        assert_eq!(store.len().await, 2);
        assert_eq!(store.latest().await.unwrap(), Some(second));
        assert_eq!(
            store.find_by_patient_id("p1").await.unwrap().unwrap().id,
            "a"
        );
        let ids: Vec<_> = store
            .list(10)
            .await
            .unwrap()
            .into_iter()
            .map(|e| e.id)
            .collect();
        assert_eq!(ids, vec!["b", "a"]);
    }

    #[tokio::test]
    async fn invalid_payload_is_not_stored() {
        let store = MemoryEventStore::new();
        let err = store.append(&json!(42)).await.unwrap_err();
        assert!(matches!(err, StorageError::InvalidRecord { .. }));
        assert_eq!(store.len().await, 0);
    }
}
