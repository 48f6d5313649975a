//! Dashboard account registration and login.
//!
//! Passwords are hashed with Argon2id and stored as PHC strings; there are no
//! sessions or tokens, a successful login only echoes the account email.

use std::sync::Arc;

use ambulink_storage::{Account, AccountStore, StorageError};
use argon2::{
    Argon2,
    password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString, rand_core::OsRng},
};
use serde::Deserialize;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum AccountError {
    #[error("Email or Emirates ID already registered")]
    Duplicate,

    #[error("Invalid credentials")]
    InvalidCredentials,

    #[error("Missing required field: {0}")]
    MissingField(&'static str),

    #[error("Password hashing failed: {0}")]
    Hashing(String),

    #[error(transparent)]
    Storage(StorageError),
}

impl From<StorageError> for AccountError {
    fn from(err: StorageError) -> Self {
        if err.is_already_exists() {
            Self::Duplicate
        } else {
            Self::Storage(err)
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Registration {
    pub full_name: String,
    #[serde(default)]
    pub phone_number: String,
    pub email: String,
    pub emirates_id: String,
    pub password: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Credentials {
    pub email: String,
    pub password: String,
}

pub struct AccountService {
    store: Arc<dyn AccountStore>,
}

impl AccountService {
    pub fn new(store: Arc<dyn AccountStore>) -> Self {
        Self { store }
    }

    pub async fn register(&self, registration: Registration) -> Result<(), AccountError> {
        let required = [
            ("fullName", &registration.full_name),
            ("email", &registration.email),
            ("emiratesId", &registration.emirates_id),
            ("password", &registration.password),
        ];
        if let Some((field, _)) = required.into_iter().find(|(_, v)| v.trim().is_empty()) {
            return Err(AccountError::MissingField(field));
        }

        let password_hash = hash_password(&registration.password)?;
        let account = Account {
            full_name: registration.full_name.trim().to_string(),
            phone_number: registration.phone_number.trim().to_string(),
            email: registration.email.trim().to_string(),
            emirates_id: registration.emirates_id.trim().to_string(),
            password_hash,
        };
        let email = account.email.clone();
        self.store.insert(account).await?;
        tracing::info!(%email, "Account registered");
        Ok(())
    }

    /// Returns the account email on success.
    pub async fn login(&self, credentials: &Credentials) -> Result<String, AccountError> {
        let account = self
            .store
            .find_by_email(credentials.email.trim())
            .await?
            .ok_or(AccountError::InvalidCredentials)?;

        if !verify_password(&credentials.password, &account.password_hash) {
            tracing::debug!(email = %account.email, "Login rejected");
            return Err(AccountError::InvalidCredentials);
        }
        Ok(account.email)
    }
}

fn hash_password(password: &str) -> Result<String, AccountError> {
    let salt = SaltString::generate(&mut OsRng);
    Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map(|hash| hash.to_string())
        .map_err(|e| AccountError::Hashing(e.to_string()))
}

fn verify_password(password: &str, hash: &str) -> bool {
    match PasswordHash::new(hash) {
        Ok(parsed) => Argon2::default()
            .verify_password(password.as_bytes(), &parsed)
            .is_ok(),
        Err(e) => {
            tracing::warn!(error = %e, "Stored password hash is malformed");
            false
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ambulink_storage::MemoryAccountStore;

    fn registration(email: &str, emirates_id: &str) -> Registration {
        Registration {
            full_name: "Amina Saeed".into(),
            phone_number: "+971500000000".into(),
            email: email.into(),
            emirates_id: emirates_id.into(),
            password: "s3cret-pass".into(),
        }
    }

    #[tokio::test]
    async fn register_then_login() {
        let service = AccountService::new(Arc::new(MemoryAccountStore::new()));
        tokio_test::assert_ok!(
            service
                .register(registration("amina@hospital.test", "784-1"))
                .await
        );

        let email = service
            .login(&Credentials {
                email: "amina@hospital.test".into(),
                password: "s3cret-pass".into(),
            })
            .await
            .unwrap();
        assert_eq!(email, "amina@hospital.test");
    }

    #[tokio::test]
    async fn wrong_password_and_unknown_email_are_invalid() {
        let service = AccountService::new(Arc::new(MemoryAccountStore::new()));
        service
            .register(registration("amina@hospital.test", "784-1"))
            .await
            .unwrap();

        for (email, password) in [
            ("amina@hospital.test", "nope"),
            ("ghost@hospital.test", "s3cret-pass"),
        ] {
            let err = service
                .login(&Credentials {
                    email: email.into(),
                    password: password.into(),
                })
                .await
                .unwrap_err();
            assert!(matches!(err, AccountError::InvalidCredentials));
        }
    }

    #[tokio::test]
    async fn duplicate_registration_is_rejected() {
        let service = AccountService::new(Arc::new(MemoryAccountStore::new()));
        service
            .register(registration("amina@hospital.test", "784-1"))
            .await
            .unwrap();
        let err = service
            .register(registration("other@hospital.test", "784-1"))
            .await
            .unwrap_err();
        assert!(matches!(err, AccountError::Duplicate));
        assert_eq!(err.to_string(), "Email or Emirates ID already registered");
    }

    #[test]
    fn hashes_are_salted_phc_strings() {
        let a = hash_password("pw").unwrap();
        let b = hash_password("pw").unwrap();
        assert!(a.starts_with("$argon2id$"));
        assert_ne!(a, b);
        assert!(verify_password("pw", &a));
        assert!(!verify_password("pw", "not-a-hash"));
    }

    #[tokio::test]
    async fn blank_fields_are_rejected() {
        let service = AccountService::new(Arc::new(MemoryAccountStore::new()));
        let err = service
            .register(registration(" ", "784-1"))
            .await
            .unwrap_err();
        assert!(matches!(err, AccountError::MissingField("email")));
    }
}
