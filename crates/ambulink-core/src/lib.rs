pub mod doctor;
pub mod error;
pub mod event;
pub mod matching;
pub mod time;

pub use doctor::{AssignedDoctor, Assignment, Availability, Doctor};
pub use error::{CoreError, MatchError, Result};
pub use event::{
    DiagnosisSnapshot, EmergencyEvent, Medications, PatientSnapshot, Priority, RawEmergencyPayload,
    Vitals, derive_priority, normalize,
};
pub use matching::{DEFAULT_SPECIALIZATIONS, match_doctor, score, specializations_for};
pub use time::{format_rfc3339, generate_id, now_rfc3339};
