use axum::{
    Json,
    extract::{Path, Query, State},
    http::{StatusCode, header},
    response::IntoResponse,
};
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};

use ambulink_core::{Assignment, Availability, Doctor, EmergencyEvent};
use ambulink_notifications::say_twiml;

use crate::accounts::{Credentials, Registration};
use crate::broadcast::DispatchMessage;
use crate::error::ApiError;
use crate::responder::{ChatReply, ChatTurn};
use crate::server::AppState;

const DEFAULT_EVENT_LIMIT: usize = 50;
const DEFAULT_VOICE_MESSAGE: &str = "You have an urgent patient request. Please check the dashboard.";

#[derive(Serialize)]
pub struct HealthResponse<'a> {
    status: &'a str,
}

pub async fn root() -> impl IntoResponse {
    let body = json!({
        "service": "Ambulink Dispatch",
        "status": "ok",
        "version": env!("CARGO_PKG_VERSION"),
    });
    (StatusCode::OK, Json(body))
}

pub async fn healthz() -> impl IntoResponse {
    (StatusCode::OK, Json(HealthResponse { status: "ok" }))
}

pub async fn readyz(State(state): State<AppState>) -> impl IntoResponse {
    let status = if state.registry.list_doctors().is_empty() {
        "degraded"
    } else {
        "ready"
    };
    (StatusCode::OK, Json(HealthResponse { status }))
}

// ---- doctors ----

pub async fn list_doctors(State(state): State<AppState>) -> Json<Value> {
    Json(json!({ "doctors": state.registry.list_doctors() }))
}

pub async fn get_doctor(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<Doctor>, ApiError> {
    Ok(Json(state.registry.get(&id)?))
}

#[derive(Debug, Deserialize)]
pub struct AvailabilityUpdate {
    pub availability: Availability,
}

pub async fn update_availability(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(update): Json<AvailabilityUpdate>,
) -> Result<Json<Doctor>, ApiError> {
    let doctor = state
        .registry
        .set_availability(&id, update.availability)
        .await?;
    state
        .broadcaster
        .publish(DispatchMessage::DoctorStatus(doctor.clone()));
    Ok(Json(doctor))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AssignmentRequest {
    pub patient_id: String,
    #[serde(default)]
    pub condition: Option<String>,
    #[serde(default)]
    pub suggested_doctor: Option<String>,
}

/// Assigns a doctor to a patient. Without an explicit condition the
/// patient's stored diagnosis is used, and the patient must exist.
pub async fn create_assignment(
    State(state): State<AppState>,
    Json(request): Json<AssignmentRequest>,
) -> Result<Json<Assignment>, ApiError> {
    if request.patient_id.trim().is_empty() {
        return Err(ApiError::bad_request("patientId is required"));
    }

    let condition = match request.condition.filter(|c| !c.trim().is_empty()) {
        Some(condition) => condition,
        None => state
            .events
            .find_by_patient_id(&request.patient_id)
            .await?
            .map(|event| event.patient.condition)
            .ok_or_else(|| ApiError::not_found("Patient not found"))?,
    };

    let doctor = state
        .registry
        .assign(&condition, request.suggested_doctor.as_deref())
        .await?;
    state
        .broadcaster
        .publish_assignment(&request.patient_id, &doctor);

    Ok(Json(Assignment {
        patient_id: request.patient_id,
        assigned_doctor: Some(doctor.summary()),
    }))
}

// ---- chat ----

pub async fn chat(
    State(state): State<AppState>,
    Json(turn): Json<ChatTurn>,
) -> Result<Json<ChatReply>, ApiError> {
    if turn.message.trim().is_empty() {
        return Err(ApiError::bad_request("message is required"));
    }
    Ok(Json(state.responder.respond(&turn).await?))
}

// ---- emergencies ----

pub async fn create_emergency(
    State(state): State<AppState>,
    Json(payload): Json<Value>,
) -> Result<(StatusCode, Json<EmergencyEvent>), ApiError> {
    let event = state.broadcaster.ingest(&payload).await?;
    Ok((StatusCode::CREATED, Json(event)))
}

#[derive(Debug, Deserialize)]
pub struct ListParams {
    pub limit: Option<usize>,
}

pub async fn list_emergencies(
    State(state): State<AppState>,
    Query(params): Query<ListParams>,
) -> Result<Json<Value>, ApiError> {
    let limit = params.limit.unwrap_or(DEFAULT_EVENT_LIMIT);
    let events = state.events.list(limit).await?;
    Ok(Json(json!({ "emergencies": events })))
}

pub async fn latest_emergency(
    State(state): State<AppState>,
) -> Result<Json<EmergencyEvent>, ApiError> {
    state
        .events
        .latest()
        .await?
        .map(Json)
        .ok_or_else(|| ApiError::not_found("No emergency recorded"))
}

pub async fn get_patient(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<EmergencyEvent>, ApiError> {
    state
        .events
        .find_by_patient_id(&id)
        .await?
        .map(Json)
        .ok_or_else(|| ApiError::not_found("Patient not found"))
}

// ---- accounts ----

pub async fn register(
    State(state): State<AppState>,
    Json(registration): Json<Registration>,
) -> Result<impl IntoResponse, ApiError> {
    state.accounts.register(registration).await?;
    Ok((
        StatusCode::CREATED,
        Json(json!({ "message": "Registration successful" })),
    ))
}

pub async fn login(
    State(state): State<AppState>,
    Json(credentials): Json<Credentials>,
) -> Result<Json<Value>, ApiError> {
    let email = state.accounts.login(&credentials).await?;
    Ok(Json(json!({ "success": true, "doctor": { "email": email } })))
}

// ---- telephony webhook ----

#[derive(Debug, Deserialize)]
pub struct VoiceParams {
    pub message: Option<String>,
}

/// TwiML fetched by the telephony provider when an outbound call connects.
pub async fn voice_twiml(Query(params): Query<VoiceParams>) -> impl IntoResponse {
    let message = params
        .message
        .filter(|m| !m.trim().is_empty())
        .unwrap_or_else(|| DEFAULT_VOICE_MESSAGE.to_string());
    (
        [(header::CONTENT_TYPE, "text/xml")],
        say_twiml(&message),
    )
}
