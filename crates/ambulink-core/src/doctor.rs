use serde::{Deserialize, Serialize};
use std::fmt;

/// Duty state of a doctor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Availability {
    Available,
    Busy,
    #[serde(rename = "Off-duty")]
    OffDuty,
}

impl Availability {
    pub fn as_str(&self) -> &'static str {
        match self {
            Availability::Available => "Available",
            Availability::Busy => "Busy",
            Availability::OffDuty => "Off-duty",
        }
    }

    pub fn is_available(&self) -> bool {
        matches!(self, Availability::Available)
    }
}

impl fmt::Display for Availability {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A rostered doctor.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Doctor {
    pub id: String,
    pub name: String,
    pub specialization: String,
    /// Seniority label, e.g. "Senior Specialist"
    #[serde(default)]
    pub title: String,
    pub experience_years: u32,
    pub availability: Availability,
    pub rating: f64,
    #[serde(default)]
    pub patients_handled: u32,
    /// Phone number used for outbound calls
    pub contact: String,
    #[serde(default)]
    pub email: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image_url: Option<String>,
}

impl Doctor {
    pub fn summary(&self) -> AssignedDoctor {
        AssignedDoctor {
            id: self.id.clone(),
            name: self.name.clone(),
            specialization: self.specialization.clone(),
        }
    }
}

/// The slim doctor reference attached to a patient once assigned.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AssignedDoctor {
    pub id: String,
    pub name: String,
    pub specialization: String,
}

/// Doctor-to-patient assignment. Not stored; overwritten by the next one.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Assignment {
    pub patient_id: String,
    pub assigned_doctor: Option<AssignedDoctor>,
}
