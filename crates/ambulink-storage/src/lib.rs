//! # ambulink-storage
//!
//! Persistence for the Ambulink dispatch backend.
//!
//! Three stores are defined as traits:
//! - [`DoctorStore`]: the mutable doctor roster
//! - [`EventStore`]: append-only emergency events
//! - [`AccountStore`]: registered dashboard accounts
//!
//! Each has a flat JSON file backend ([`file`]) used in production and an
//! in-memory backend ([`memory`]) used by tests.
//!
//! ## Example
//!
//! ```ignore
//! use ambulink_storage::{EventStore, JsonDirEventStore};
//!
//! let store = JsonDirEventStore::open("data").await?;
//! let event = store.append(&payload).await?;
//! assert_eq!(store.latest().await?, Some(event));
//! ```

mod error;
pub mod file;
pub mod memory;
mod traits;
mod types;

pub use error::{ErrorCategory, StorageError};
pub use file::{JsonDirEventStore, JsonFileAccountStore, JsonFileDoctorStore};
pub use memory::{MemoryAccountStore, MemoryDoctorStore, MemoryEventStore};
pub use traits::{AccountStore, DoctorStore, EventStore};
pub use types::{Account, Roster};
