//! Flat JSON file backends.
//!
//! Layout under the data directory:
//! - `doctors.json`: the roster, rewritten whole on every change
//! - `accounts.json`: registered accounts, read-modify-written
//! - `emergency_{seq}_{conversation}.json`: one immutable file per event

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::SystemTime;

use async_trait::async_trait;
use serde::Serialize;
use serde::de::DeserializeOwned;
use tokio::io::AsyncWriteExt;
use tokio::sync::Mutex;

use ambulink_core::{Doctor, EmergencyEvent};

use crate::error::StorageError;
use crate::traits::{AccountStore, DoctorStore, EventStore};
use crate::types::{Account, AccountsFile, Roster};

pub const DOCTORS_FILE: &str = "doctors.json";
pub const ACCOUNTS_FILE: &str = "accounts.json";
const EVENT_PREFIX: &str = "emergency_";
const EVENT_SUFFIX: &str = ".json";

async fn read_json<T: DeserializeOwned>(path: &Path) -> Result<Option<T>, StorageError> {
    let bytes = match tokio::fs::read(path).await {
        Ok(bytes) => bytes,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
        Err(e) => return Err(StorageError::io(path, e)),
    };
    let value = serde_json::from_slice(&bytes)
        .map_err(|e| StorageError::serialization(format!("{}: {e}", path.display())))?;
    Ok(Some(value))
}

/// Write through a temp file and rename, so readers never see a torn file.
async fn write_json<T: Serialize + ?Sized>(path: &Path, value: &T) -> Result<(), StorageError> {
    if let Some(parent) = path.parent() {
        tokio::fs::create_dir_all(parent)
            .await
            .map_err(|e| StorageError::io(parent, e))?;
    }
    let bytes = serde_json::to_vec_pretty(value)?;
    let tmp = path.with_extension("json.tmp");
    tokio::fs::write(&tmp, &bytes)
        .await
        .map_err(|e| StorageError::io(&tmp, e))?;
    tokio::fs::rename(&tmp, path)
        .await
        .map_err(|e| StorageError::io(path, e))?;
    Ok(())
}

// ==================== Doctors ====================

/// Roster persisted as `{"doctors": [...]}` in a single file.
#[derive(Debug, Clone)]
pub struct JsonFileDoctorStore {
    path: PathBuf,
}

impl JsonFileDoctorStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Store at `{data_dir}/doctors.json`.
    pub fn in_dir(data_dir: impl AsRef<Path>) -> Self {
        Self::new(data_dir.as_ref().join(DOCTORS_FILE))
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

#[async_trait]
impl DoctorStore for JsonFileDoctorStore {
    async fn load(&self) -> Result<Option<Vec<Doctor>>, StorageError> {
        let roster: Option<Roster> = read_json(&self.path).await?;
        Ok(roster.map(|r| r.doctors))
    }

    async fn save(&self, doctors: &[Doctor]) -> Result<(), StorageError> {
        #[derive(Serialize)]
        struct RosterRef<'a> {
            doctors: &'a [Doctor],
        }
        write_json(&self.path, &RosterRef { doctors }).await.inspect_err(|e| {
            tracing::error!(
                path = %self.path.display(),
                error = %e,
                "Failed to persist doctor roster"
            );
        })
    }
}

// ==================== Events ====================

struct EventFile {
    path: PathBuf,
    seq: u64,
    modified: SystemTime,
}

/// One file per emergency event in a directory.
///
/// Files are created with `create_new`, so an append can never replace an
/// earlier record. A process-wide sequence number in the file name keeps two
/// events with the same conversation id apart and orders events written
/// within the same filesystem timestamp tick.
#[derive(Debug)]
pub struct JsonDirEventStore {
    dir: PathBuf,
    next_seq: AtomicU64,
}

impl JsonDirEventStore {
    /// Opens (creating if needed) an event directory, continuing the
    /// sequence after the highest existing file.
    pub async fn open(dir: impl Into<PathBuf>) -> Result<Self, StorageError> {
        let dir = dir.into();
        tokio::fs::create_dir_all(&dir)
            .await
            .map_err(|e| StorageError::io(&dir, e))?;

        let store = Self {
            dir,
            next_seq: AtomicU64::new(1),
        };
        let highest = store
            .event_files()
            .await?
            .iter()
            .map(|f| f.seq)
            .max()
            .unwrap_or(0);
        store.next_seq.store(highest + 1, Ordering::SeqCst);

        tracing::debug!(dir = %store.dir.display(), next_seq = highest + 1, "Event store opened");
        Ok(store)
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Event files, newest first: last-modified descending, then sequence.
    async fn event_files(&self) -> Result<Vec<EventFile>, StorageError> {
        let mut reader = tokio::fs::read_dir(&self.dir)
            .await
            .map_err(|e| StorageError::io(&self.dir, e))?;

        let mut files = Vec::new();
        while let Some(entry) = reader
            .next_entry()
            .await
            .map_err(|e| StorageError::io(&self.dir, e))?
        {
            let name = entry.file_name();
            let Some(name) = name.to_str() else { continue };
            if !name.starts_with(EVENT_PREFIX) || !name.ends_with(EVENT_SUFFIX) {
                continue;
            }
            let metadata = entry
                .metadata()
                .await
                .map_err(|e| StorageError::io(&entry.path(), e))?;
            files.push(EventFile {
                path: entry.path(),
                seq: parse_seq(name).unwrap_or(0),
                modified: metadata.modified().unwrap_or(SystemTime::UNIX_EPOCH),
            });
        }

        files.sort_by(|a, b| {
            b.modified
                .cmp(&a.modified)
                .then_with(|| b.seq.cmp(&a.seq))
        });
        Ok(files)
    }

    /// Reads events newest first, skipping unreadable files, until `keep`
    /// says stop.
    async fn scan(
        &self,
        mut keep: impl FnMut(&EmergencyEvent) -> ScanStep,
    ) -> Result<Vec<EmergencyEvent>, StorageError> {
        let mut out = Vec::new();
        for file in self.event_files().await? {
            let event: EmergencyEvent = match read_json(&file.path).await {
                Ok(Some(event)) => event,
                Ok(None) => continue,
                Err(e) => {
                    tracing::warn!(
                        path = %file.path.display(),
                        error = %e,
                        "Skipping unreadable event file"
                    );
                    continue;
                }
            };
            match keep(&event) {
                ScanStep::Skip => {}
                ScanStep::Take => out.push(event),
                ScanStep::TakeAndStop => {
                    out.push(event);
                    break;
                }
            }
        }
        Ok(out)
    }
}

enum ScanStep {
    Skip,
    Take,
    TakeAndStop,
}

async fn write_new(path: &Path, bytes: &[u8]) -> std::io::Result<()> {
    let mut file = tokio::fs::OpenOptions::new()
        .write(true)
        .create_new(true)
        .open(path)
        .await?;
    file.write_all(bytes).await?;
    file.flush().await
}

fn parse_seq(file_name: &str) -> Option<u64> {
    let rest = file_name.strip_prefix(EVENT_PREFIX)?;
    let (seq, _) = rest.split_once('_')?;
    seq.parse().ok()
}

fn sanitize_id(id: &str) -> String {
    id.chars()
        .map(|c| if c.is_ascii_alphanumeric() || c == '-' || c == '_' { c } else { '-' })
        .collect()
}

#[async_trait]
impl EventStore for JsonDirEventStore {
    async fn insert(&self, event: &EmergencyEvent) -> Result<(), StorageError> {
        let seq = self.next_seq.fetch_add(1, Ordering::SeqCst);
        let path = self.dir.join(format!(
            "{EVENT_PREFIX}{seq:010}_{}{EVENT_SUFFIX}",
            sanitize_id(&event.id)
        ));
        let bytes = serde_json::to_vec_pretty(event)?;

        if let Err(e) = write_new(&path, &bytes).await {
            tracing::error!(
                event_id = %event.id,
                path = %path.display(),
                error = %e,
                "Failed to persist emergency event"
            );
            return Err(StorageError::io(&path, e));
        }

        tracing::debug!(event_id = %event.id, seq, "Emergency event persisted");
        Ok(())
    }

    async fn latest(&self) -> Result<Option<EmergencyEvent>, StorageError> {
        let found = self.scan(|_| ScanStep::TakeAndStop).await?;
        Ok(found.into_iter().next())
    }

    async fn find_by_patient_id(
        &self,
        patient_id: &str,
    ) -> Result<Option<EmergencyEvent>, StorageError> {
        let found = self
            .scan(|event| {
                if event.patient.id == patient_id {
                    ScanStep::TakeAndStop
                } else {
                    ScanStep::Skip
                }
            })
            .await?;
        Ok(found.into_iter().next())
    }

    async fn list(&self, limit: usize) -> Result<Vec<EmergencyEvent>, StorageError> {
        if limit == 0 {
            return Ok(Vec::new());
        }
        let mut taken = 0;
        self.scan(|_| {
            taken += 1;
            if taken >= limit {
                ScanStep::TakeAndStop
            } else {
                ScanStep::Take
            }
        })
        .await
    }
}

// ==================== Accounts ====================

#[derive(Debug)]
pub struct JsonFileAccountStore {
    path: PathBuf,
    // Serializes read-modify-write within this process.
    write_lock: Mutex<()>,
}

impl JsonFileAccountStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            write_lock: Mutex::new(()),
        }
    }

    /// Store at `{data_dir}/accounts.json`.
    pub fn in_dir(data_dir: impl AsRef<Path>) -> Self {
        Self::new(data_dir.as_ref().join(ACCOUNTS_FILE))
    }

    async fn read_all(&self) -> Result<Vec<Account>, StorageError> {
        let file: Option<AccountsFile> = read_json(&self.path).await?;
        Ok(file.map(|f| f.accounts).unwrap_or_default())
    }
}

#[async_trait]
impl AccountStore for JsonFileAccountStore {
    async fn find_by_email(&self, email: &str) -> Result<Option<Account>, StorageError> {
        Ok(self
            .read_all()
            .await?
            .into_iter()
            .find(|a| a.email.eq_ignore_ascii_case(email)))
    }

    async fn insert(&self, account: Account) -> Result<(), StorageError> {
        let _guard = self.write_lock.lock().await;
        let mut accounts = self.read_all().await?;
        if accounts.iter().any(|a| a.conflicts_with(&account)) {
            return Err(StorageError::already_exists("Account", account.email));
        }
        accounts.push(account);
        write_json(&self.path, &AccountsFile { accounts }).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_sequence_from_file_name() {
        assert_eq!(parse_seq("emergency_0000000042_abc-def.json"), Some(42));
        assert_eq!(parse_seq("emergency_abc.json"), None);
        assert_eq!(parse_seq("doctors.json"), None);
    }

    #[test]
    fn sanitizes_ids_for_file_names() {
        assert_eq!(sanitize_id("4b27-ee6a"), "4b27-ee6a");
        assert_eq!(sanitize_id("../etc/passwd"), "---etc-passwd");
    }
}
