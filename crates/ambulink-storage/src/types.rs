use serde::{Deserialize, Serialize};

use ambulink_core::Doctor;

/// On-disk shape of the roster file.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Roster {
    #[serde(default)]
    pub doctors: Vec<Doctor>,
}

/// A registered dashboard user.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Account {
    pub full_name: String,
    pub phone_number: String,
    pub email: String,
    pub emirates_id: String,
    /// Argon2 PHC string; the plaintext password is never stored
    pub password_hash: String,
}

impl Account {
    /// Whether `other` collides with this account on email or Emirates ID.
    pub fn conflicts_with(&self, other: &Account) -> bool {
        self.email.eq_ignore_ascii_case(&other.email) || self.emirates_id == other.emirates_id
    }
}

/// On-disk shape of the accounts file.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub(crate) struct AccountsFile {
    #[serde(default)]
    pub accounts: Vec<Account>,
}
