//! Emergency events: the ambulance-side payload and its canonical form.
//!
//! Ambulance clients send loosely shaped JSON. [`normalize`] turns any such
//! payload into an [`EmergencyEvent`], the single shape persisted by the
//! event store and broadcast to dashboard sessions. Events are immutable once
//! built; in particular [`Priority`] is derived exactly once, here.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::{CoreError, Result};
use crate::time::{generate_id, now_rfc3339};

const UNKNOWN_PATIENT: &str = "Unknown Patient";
const DEFAULT_STATUS: &str = "PENDING";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Priority {
    High,
    Medium,
}

/// `High` when the symptom text mentions "severe", `Medium` otherwise.
pub fn derive_priority(symptoms: &str) -> Priority {
    if symptoms.to_lowercase().contains("severe") {
        Priority::High
    } else {
        Priority::Medium
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Medications {
    pub injections: String,
    pub medicines: String,
    pub painkillers: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Vitals {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub heart_rate: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub blood_pressure: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub oxygen_saturation: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub temperature: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PatientSnapshot {
    pub id: String,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub age: Option<u32>,
    pub condition: String,
    pub symptoms: String,
    pub paramedics_tips: String,
    pub medications: Medications,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub vitals: Option<Vitals>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub consciousness: Option<String>,
    /// Paramedic conversation transcript, passed through untouched
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub conversation: Option<Value>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DiagnosisSnapshot {
    pub diagnosed_by: String,
    pub medical_diagnosis: String,
    pub status: String,
    pub timestamp: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub date: Option<String>,
}

/// Canonical, persisted and broadcast form of an inbound emergency report.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EmergencyEvent {
    /// Conversation id of the ambulance session
    pub id: String,
    pub patient: PatientSnapshot,
    pub diagnosis: DiagnosisSnapshot,
    pub priority: Priority,
    pub status: String,
    pub timestamp: String,
}

// ---- inbound shape ----

/// Payload as emitted by the ambulance client. Every field is optional.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct RawEmergencyPayload {
    pub conversation_id: Option<String>,
    pub diagnosed_by: Option<String>,
    pub timestamp: Option<String>,
    pub diagnosis: RawDiagnosis,
    #[serde(rename = "fullDiagnosis", alias = "loggedData")]
    pub log: Option<RawLog>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct RawDiagnosis {
    pub patient: RawPatient,
    pub paramedics_tips: Option<String>,
    pub medications: Medications,
    pub conversation_status: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct RawPatient {
    pub medical_diagnosis: Option<String>,
    pub symptoms: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct RawLog {
    #[serde(rename = "_id")]
    pub id: Option<Value>,
    #[serde(rename = "_date")]
    pub date: Option<String>,
    pub patient_name: Option<String>,
    pub diagnosed_by: Option<String>,
    pub patient_age: Option<Value>,
    pub patient_competence: Option<String>,
    pub patient_bpm: Option<Value>,
    pub conversation: Option<Value>,
}

/// Normalize an arbitrary inbound JSON payload into an [`EmergencyEvent`].
///
/// Only non-object payloads and fields of the wrong JSON type are rejected;
/// missing fields fall back to defaults.
pub fn normalize(raw: &Value) -> Result<EmergencyEvent> {
    if !raw.is_object() {
        return Err(CoreError::invalid_payload("payload must be a JSON object"));
    }
    let payload: RawEmergencyPayload = serde_json::from_value(raw.clone())
        .map_err(|e| CoreError::invalid_payload(e.to_string()))?;
    payload.into_event()
}

impl RawEmergencyPayload {
    pub fn into_event(self) -> Result<EmergencyEvent> {
        let log = self.log.unwrap_or_default();
        let id = non_empty(self.conversation_id).unwrap_or_else(generate_id);
        let timestamp = match non_empty(self.timestamp) {
            Some(timestamp) => timestamp,
            None => now_rfc3339()?,
        };

        let symptoms = self.diagnosis.patient.symptoms.unwrap_or_default();
        let condition = self.diagnosis.patient.medical_diagnosis.unwrap_or_default();
        let diagnosis_status =
            non_empty(self.diagnosis.conversation_status).unwrap_or_else(|| DEFAULT_STATUS.into());

        let vitals = log.patient_bpm.as_ref().and_then(lenient_string).map(|bpm| Vitals {
            heart_rate: Some(bpm),
            ..Vitals::default()
        });

        let patient = PatientSnapshot {
            id: log
                .id
                .as_ref()
                .and_then(lenient_string)
                .unwrap_or_else(|| id.clone()),
            name: non_empty(log.patient_name).unwrap_or_else(|| UNKNOWN_PATIENT.into()),
            age: log
                .patient_age
                .as_ref()
                .and_then(lenient_string)
                .and_then(|age| age.trim().parse().ok()),
            condition: condition.clone(),
            symptoms: symptoms.clone(),
            paramedics_tips: self.diagnosis.paramedics_tips.unwrap_or_default(),
            medications: self.diagnosis.medications,
            vitals,
            consciousness: non_empty(log.patient_competence),
            conversation: log.conversation,
        };

        let diagnosis = DiagnosisSnapshot {
            diagnosed_by: non_empty(self.diagnosed_by)
                .or(non_empty(log.diagnosed_by))
                .unwrap_or_default(),
            medical_diagnosis: condition,
            status: diagnosis_status.clone(),
            timestamp: timestamp.clone(),
            date: non_empty(log.date),
        };

        Ok(EmergencyEvent {
            id,
            priority: derive_priority(&symptoms),
            status: diagnosis_status.to_lowercase(),
            patient,
            diagnosis,
            timestamp,
        })
    }
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.filter(|s| !s.trim().is_empty())
}

/// Accept both `"32"` and `32` for fields the ambulance client types loosely.
fn lenient_string(value: &Value) -> Option<String> {
    match value {
        Value::String(s) if !s.trim().is_empty() => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn ambulance_payload() -> Value {
        json!({
            "conversation_id": "4b275b73-ee6a-4b15-a713-d8664812171c",
            "diagnosis": {
                "patient": {
                    "medical_diagnosis": "Subarachnoid Hemorrhage due to Traumatic Brain Injury",
                    "symptoms": "Bleeding from the eyes, loss of consciousness, severe headache"
                },
                "paramedics_tips": "Maintain cervical spine stabilization",
                "medications": {
                    "injections": "Consider Mannitol",
                    "medicines": "None",
                    "painkillers": "Avoid"
                },
                "conversation_status": "DIAGNOSED"
            },
            "loggedData": {
                "_id": "4b275b73-ee6a-4b15-a713-d8664812171c",
                "_date": "25-01-2025",
                "patient_name": "Mohamed Ali",
                "diagnosed_by": "Mohamed Al Mehairbi",
                "patient_age": "32",
                "patient_competence": "Concious",
                "patient_bpm": "112"
            },
            "diagnosed_by": "Mohamed Al Mehairbi",
            "timestamp": "2025-01-26 19:13:55"
        })
    }

    #[test]
    fn normalizes_ambulance_payload() {
        let event = normalize(&ambulance_payload()).unwrap();
        assert_eq!(event.id, "4b275b73-ee6a-4b15-a713-d8664812171c");
        assert_eq!(event.patient.name, "Mohamed Ali");
        assert_eq!(event.patient.age, Some(32));
        assert_eq!(
            event.patient.condition,
            "Subarachnoid Hemorrhage due to Traumatic Brain Injury"
        );
        assert_eq!(
            event.patient.vitals.as_ref().and_then(|v| v.heart_rate.as_deref()),
            Some("112")
        );
        assert_eq!(event.patient.medications.injections, "Consider Mannitol");
        assert_eq!(event.diagnosis.diagnosed_by, "Mohamed Al Mehairbi");
        assert_eq!(event.diagnosis.status, "DIAGNOSED");
        assert_eq!(event.diagnosis.date.as_deref(), Some("25-01-2025"));
        assert_eq!(event.status, "diagnosed");
        assert_eq!(event.priority, Priority::High);
        assert_eq!(event.timestamp, "2025-01-26 19:13:55");
    }

    #[test]
    fn full_diagnosis_key_is_accepted() {
        let payload = json!({
            "conversation_id": "c-1",
            "fullDiagnosis": { "_id": 42, "patient_name": "Jane" }
        });
        let event = normalize(&payload).unwrap();
        assert_eq!(event.patient.id, "42");
        assert_eq!(event.patient.name, "Jane");
    }

    #[test]
    fn missing_fields_fall_back_to_defaults() {
        let event = normalize(&json!({})).unwrap();
        assert!(!event.id.is_empty());
        assert_eq!(event.patient.id, event.id);
        assert_eq!(event.patient.name, "Unknown Patient");
        assert_eq!(event.priority, Priority::Medium);
        assert_eq!(event.status, "pending");
        assert!(!event.timestamp.is_empty());
        assert!(event.patient.vitals.is_none());
    }

    #[test]
    fn priority_is_case_insensitive() {
        assert_eq!(derive_priority("SEVERE chest pain"), Priority::High);
        assert_eq!(derive_priority("mild headache"), Priority::Medium);
        assert_eq!(derive_priority(""), Priority::Medium);
    }

    #[test]
    fn rejects_non_object_payloads() {
        assert!(normalize(&json!("hello")).is_err());
        assert!(normalize(&json!([1, 2])).is_err());
        let wrong_type = json!({ "diagnosis": { "patient": { "symptoms": 12 } } });
        assert!(matches!(
            normalize(&wrong_type),
            Err(CoreError::InvalidPayload { .. })
        ));
    }

    #[test]
    fn canonical_event_round_trips_through_json() {
        let event = normalize(&ambulance_payload()).unwrap();
        let value = serde_json::to_value(&event).unwrap();
        assert_eq!(value["priority"], "high");
        assert_eq!(value["patient"]["paramedicsTips"], "Maintain cervical spine stabilization");
        let back: EmergencyEvent = serde_json::from_value(value).unwrap();
        assert_eq!(back, event);
    }
}
