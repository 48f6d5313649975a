//! Conversational Responder.
//!
//! One chat turn: ground the model on the relevant emergency, ask the
//! completion endpoint for a reply, then act on the directive the reply
//! carries. Directive detection lives entirely in [`parse_directive`].

use std::sync::Arc;

use ambulink_core::{Doctor, EmergencyEvent};
use ambulink_notifications::{
    CallAdapter, CallRequest, ChatMessage, CompletionClient, CompletionRequest, NotificationError,
};
use ambulink_storage::{EventStore, StorageError};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::broadcast::{DispatchMessage, EventBroadcaster};
use crate::registry::DoctorRegistry;

const CALL_PREFIX: &str = "CALL_REQUIRED:";
const ASSIGN_MARKER: &str = "doctor assigned to patient";

const SYSTEM_PROMPT: &str = "You are a medical AI assistant supporting an emergency dispatch team. \
Answer concisely using the patient context provided. \
If the doctor must be reached by phone, start your reply with `CALL_REQUIRED:` followed by the message to read to them. \
If a doctor should be assigned to the patient, include the phrase `doctor assigned to patient` in your reply.";

#[derive(Debug, Error)]
pub enum ResponderError {
    #[error("Completion request failed: {0}")]
    Upstream(#[from] NotificationError),

    #[error("Failed to load emergency context: {0}")]
    Context(#[from] StorageError),

    /// A patient id was given but no emergency is stored for it.
    #[error("Patient not found: {id}")]
    PatientNotFound { id: String },
}

/// Action requested by the model reply.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Directive {
    /// Place a call and read `message` to the doctor.
    Call { message: String },
    AssignDoctor,
    /// Plain answer, no side effect.
    Reply,
}

/// Classifies a model reply.
///
/// A trimmed reply starting with `CALL_REQUIRED:` is a call directive; one
/// mentioning "doctor assigned to patient" (any case) requests an assignment.
pub fn parse_directive(text: &str) -> Directive {
    let trimmed = text.trim();
    if let Some(rest) = trimmed.strip_prefix(CALL_PREFIX) {
        return Directive::Call {
            message: rest.trim().to_string(),
        };
    }
    if trimmed.to_lowercase().contains(ASSIGN_MARKER) {
        return Directive::AssignDoctor;
    }
    Directive::Reply
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatTurn {
    pub message: String,
    #[serde(default)]
    pub patient_id: Option<String>,
    #[serde(default)]
    pub doctor_phone: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CallStatus {
    Initiated,
    Failed,
    /// No phone number or no telephony adapter; nothing was dialled.
    Skipped,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ChatAction {
    MakeCall {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        phone: Option<String>,
        status: CallStatus,
    },
    AssignDoctor {
        doctor: Doctor,
    },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatReply {
    pub response: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub action: Option<ChatAction>,
}

pub struct Responder {
    llm: Arc<dyn CompletionClient>,
    calls: Option<Arc<dyn CallAdapter>>,
    events: Arc<dyn EventStore>,
    registry: Arc<DoctorRegistry>,
    broadcaster: Arc<EventBroadcaster>,
    temperature: f64,
    top_p: f64,
}

impl Responder {
    pub fn new(
        llm: Arc<dyn CompletionClient>,
        calls: Option<Arc<dyn CallAdapter>>,
        events: Arc<dyn EventStore>,
        registry: Arc<DoctorRegistry>,
        broadcaster: Arc<EventBroadcaster>,
    ) -> Self {
        Self {
            llm,
            calls,
            events,
            registry,
            broadcaster,
            temperature: 0.1,
            top_p: 0.1,
        }
    }

    pub fn with_sampling(mut self, temperature: f64, top_p: f64) -> Self {
        self.temperature = temperature;
        self.top_p = top_p;
        self
    }

    pub async fn respond(&self, turn: &ChatTurn) -> Result<ChatReply, ResponderError> {
        let context = self.context_for(turn.patient_id.as_deref()).await?;
        let request = self.build_request(context.as_ref(), &turn.message);

        let text = self.llm.complete(&request).await.map_err(|e| {
            tracing::error!(error = %e, patient.id = ?turn.patient_id, "Chat completion failed");
            ResponderError::Upstream(e)
        })?;

        let reply = match parse_directive(&text) {
            Directive::Call { message } => {
                self.call_doctor(turn.doctor_phone.as_deref(), message).await
            }
            Directive::AssignDoctor => self.assign_doctor(context.as_ref(), turn, text).await,
            Directive::Reply => ChatReply {
                response: text,
                action: None,
            },
        };
        Ok(reply)
    }

    /// The named patient's emergency, or the latest one when no patient is named.
    async fn context_for(
        &self,
        patient_id: Option<&str>,
    ) -> Result<Option<EmergencyEvent>, ResponderError> {
        match patient_id.filter(|id| !id.trim().is_empty()) {
            Some(id) => match self.events.find_by_patient_id(id).await? {
                Some(event) => Ok(Some(event)),
                None => Err(ResponderError::PatientNotFound { id: id.to_string() }),
            },
            None => Ok(self.events.latest().await?),
        }
    }

    fn build_request(&self, context: Option<&EmergencyEvent>, message: &str) -> CompletionRequest {
        let context_text = match context.map(serde_json::to_string_pretty) {
            Some(Ok(json)) => format!("Current emergency context:\n{json}"),
            Some(Err(e)) => {
                tracing::warn!(error = %e, "Failed to serialize emergency context");
                "No emergency context available.".to_string()
            }
            None => "No emergency context available.".to_string(),
        };

        CompletionRequest {
            messages: vec![
                ChatMessage::system(SYSTEM_PROMPT),
                ChatMessage::system(context_text),
                ChatMessage::user(message),
            ],
            temperature: self.temperature,
            top_p: self.top_p,
        }
    }

    async fn call_doctor(&self, phone: Option<&str>, message: String) -> ChatReply {
        let phone = phone.map(str::trim).filter(|p| !p.is_empty());
        let (Some(phone), Some(calls)) = (phone, self.calls.as_ref()) else {
            tracing::warn!(
                has_phone = phone.is_some(),
                telephony = self.calls.is_some(),
                "Call requested but cannot be placed"
            );
            return ChatReply {
                response: message,
                action: Some(ChatAction::MakeCall {
                    phone: phone.map(str::to_string),
                    status: CallStatus::Skipped,
                }),
            };
        };

        let request = CallRequest {
            to: phone.to_string(),
            message: message.clone(),
        };
        match calls.place_call(&request).await {
            Ok(receipt) => {
                tracing::info!(call.sid = %receipt.sid, to = %phone, "Doctor call initiated");
                ChatReply {
                    response: format!("Call initiated to doctor. {message}"),
                    action: Some(ChatAction::MakeCall {
                        phone: Some(phone.to_string()),
                        status: CallStatus::Initiated,
                    }),
                }
            }
            Err(e) => {
                tracing::error!(error = %e, to = %phone, "Doctor call failed");
                ChatReply {
                    response: message,
                    action: Some(ChatAction::MakeCall {
                        phone: Some(phone.to_string()),
                        status: CallStatus::Failed,
                    }),
                }
            }
        }
    }

    async fn assign_doctor(
        &self,
        context: Option<&EmergencyEvent>,
        turn: &ChatTurn,
        text: String,
    ) -> ChatReply {
        let condition = context.map(|e| e.patient.condition.as_str()).unwrap_or("");
        match self.registry.assign(condition, None).await {
            Ok(doctor) => {
                let patient_id = turn
                    .patient_id
                    .as_deref()
                    .filter(|id| !id.trim().is_empty())
                    .or(context.map(|e| e.patient.id.as_str()));
                match patient_id {
                    Some(id) => self.broadcaster.publish_assignment(id, &doctor),
                    None => {
                        self.broadcaster
                            .publish(DispatchMessage::DoctorStatus(doctor.clone()));
                    }
                }
                ChatReply {
                    response: format!(
                        "{text}\n\nAssigned doctor: {} ({}). Contact: {}, {}",
                        doctor.name, doctor.specialization, doctor.contact, doctor.email
                    ),
                    action: Some(ChatAction::AssignDoctor { doctor }),
                }
            }
            Err(e) => {
                tracing::warn!(error = %e, condition, "Doctor assignment from chat failed");
                ChatReply {
                    response: format!("{text}\n\nNo doctor could be assigned: {e}"),
                    action: None,
                }
            }
        }
    }
}
