//! Real-time dispatch channel over WebSocket.
//!
//! Sessions connect at `/api/socket`. An ambulance client sends
//! `{"event":"message","data":{...}}` (or the bare payload); the payload is
//! normalized, appended to the event store and published to every connected
//! session as `{"event":"emergency","data":EmergencyEvent}`. Assignment and
//! availability changes travel over the same channel.
//!
//! Delivery is best effort: a session that lags past the channel capacity or
//! disconnects simply misses messages.

use std::sync::{Arc, OnceLock};

use ambulink_core::{Assignment, Doctor, EmergencyEvent};
use ambulink_storage::{EventStore, StorageError};
use axum::{
    extract::{
        State,
        ws::{Message, WebSocket, WebSocketUpgrade},
    },
    response::Response,
};
use futures_util::{SinkExt, StreamExt};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tokio::sync::{Mutex, broadcast, mpsc};
use tokio::task::JoinHandle;

use crate::registry::DoctorRegistry;
use crate::server::AppState;

const SESSION_QUEUE_DEPTH: usize = 32;

/// Outbound message envelope: `{"event": <name>, "data": <payload>}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event", content = "data", rename_all = "camelCase")]
pub enum DispatchMessage {
    Emergency(EmergencyEvent),
    DoctorAssigned(Assignment),
    DoctorStatus(Doctor),
}

/// Channel manager shared by all sessions and the HTTP handlers.
pub struct EventBroadcaster {
    sender: OnceLock<broadcast::Sender<DispatchMessage>>,
    capacity: usize,
    ingest_lock: Mutex<()>,
    events: Arc<dyn EventStore>,
    registry: Arc<DoctorRegistry>,
    auto_assign: bool,
}

impl EventBroadcaster {
    pub fn new(
        events: Arc<dyn EventStore>,
        registry: Arc<DoctorRegistry>,
        capacity: usize,
        auto_assign: bool,
    ) -> Self {
        Self {
            sender: OnceLock::new(),
            capacity: capacity.max(1),
            ingest_lock: Mutex::new(()),
            events,
            registry,
            auto_assign,
        }
    }

    /// Whether the channel has been created yet.
    pub fn is_listening(&self) -> bool {
        self.sender.get().is_some()
    }

    fn channel(&self) -> &broadcast::Sender<DispatchMessage> {
        self.sender.get_or_init(|| {
            tracing::info!(capacity = self.capacity, "Real-time channel initialized");
            broadcast::channel(self.capacity).0
        })
    }

    pub fn subscribe(&self) -> broadcast::Receiver<DispatchMessage> {
        self.channel().subscribe()
    }

    /// Sends to every current subscriber; returns how many received it.
    pub fn publish(&self, message: DispatchMessage) -> usize {
        // An error only means nobody is connected right now.
        self.channel().send(message).unwrap_or(0)
    }

    pub fn publish_assignment(&self, patient_id: &str, doctor: &Doctor) {
        self.publish(DispatchMessage::DoctorAssigned(Assignment {
            patient_id: patient_id.to_string(),
            assigned_doctor: Some(doctor.summary()),
        }));
        self.publish(DispatchMessage::DoctorStatus(doctor.clone()));
    }

    /// Normalizes, stores and publishes one inbound payload.
    ///
    /// Ingestion is serialized so subscribers see events in append order.
    pub async fn ingest(&self, raw: &Value) -> Result<EmergencyEvent, StorageError> {
        let _guard = self.ingest_lock.lock().await;

        let event = self.events.append(raw).await?;
        let delivered = self.publish(DispatchMessage::Emergency(event.clone()));
        tracing::info!(
            event.id = %event.id,
            patient.id = %event.patient.id,
            priority = ?event.priority,
            sessions = delivered,
            "Emergency received"
        );

        if self.auto_assign {
            match self.registry.assign(&event.patient.condition, None).await {
                Ok(doctor) => self.publish_assignment(&event.patient.id, &doctor),
                Err(e) => tracing::warn!(
                    event.id = %event.id,
                    condition = %event.patient.condition,
                    error = %e,
                    "Automatic doctor assignment failed"
                ),
            }
        }

        Ok(event)
    }
}

/// Extracts the emergency payload from an inbound text frame.
///
/// Frames tagged with another event name are ignored.
fn inbound_payload(text: &str) -> Option<Value> {
    let value: Value = serde_json::from_str(text).ok()?;
    match value.get("event") {
        Some(Value::String(name)) if name == "message" => value.get("data").cloned(),
        Some(_) => None,
        None if value.is_object() => Some(value),
        None => None,
    }
}

/// Starts the ingest worker for one session.
///
/// The worker is detached from the session: it drains every queued payload in
/// order and exits once the sender is dropped, so a session closing mid-ingest
/// never cancels a half-finished append or assignment.
fn spawn_ingest_worker(
    broadcaster: Arc<EventBroadcaster>,
) -> (mpsc::Sender<Value>, JoinHandle<()>) {
    let (tx, mut rx) = mpsc::channel::<Value>(SESSION_QUEUE_DEPTH);
    let handle = tokio::spawn(async move {
        while let Some(payload) = rx.recv().await {
            if let Err(e) = broadcaster.ingest(&payload).await {
                tracing::error!(error = %e, "Failed to ingest emergency message");
            }
        }
    });
    (tx, handle)
}

/// WebSocket upgrade handler for `/api/socket`.
pub async fn socket_handler(State(state): State<AppState>, ws: WebSocketUpgrade) -> Response {
    let broadcaster = state.broadcaster.clone();
    let receiver = broadcaster.subscribe();
    ws.on_upgrade(move |socket| handle_session(socket, broadcaster, receiver))
}

async fn handle_session(
    socket: WebSocket,
    broadcaster: Arc<EventBroadcaster>,
    mut receiver: broadcast::Receiver<DispatchMessage>,
) {
    let (mut ws_write, mut ws_read) = socket.split();

    tracing::info!("Dispatch session connected");

    let (ingest_tx, _worker) = spawn_ingest_worker(broadcaster);

    let mut read_task = tokio::spawn(async move {
        while let Some(msg) = ws_read.next().await {
            match msg {
                Ok(Message::Text(text)) => match inbound_payload(text.as_str()) {
                    Some(payload) => {
                        if ingest_tx.send(payload).await.is_err() {
                            break;
                        }
                    }
                    None => tracing::debug!("Ignoring unrecognized session frame"),
                },
                Ok(Message::Close(_)) => break,
                Err(e) => {
                    tracing::debug!("Dispatch session read error: {}", e);
                    break;
                }
                _ => {}
            }
        }
    });

    loop {
        tokio::select! {
            result = receiver.recv() => {
                match result {
                    Ok(message) => match serde_json::to_string(&message) {
                        Ok(json) => {
                            if let Err(e) = ws_write.send(Message::Text(json.into())).await {
                                tracing::debug!("Dispatch session write error: {}", e);
                                break;
                            }
                        }
                        Err(e) => tracing::warn!("Failed to serialize dispatch message: {}", e),
                    },
                    Err(broadcast::error::RecvError::Lagged(n)) => {
                        tracing::warn!("Dispatch session lagged by {} messages", n);
                    }
                    Err(broadcast::error::RecvError::Closed) => break,
                }
            }
            _ = &mut read_task => {
                tracing::debug!("Dispatch session client disconnected");
                break;
            }
        }
    }

    // Only the reader is aborted; queued payloads still reach the worker.
    read_task.abort();
    tracing::info!("Dispatch session disconnected");
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registry::seed_doctors;
    use ambulink_storage::{MemoryDoctorStore, MemoryEventStore};
    use serde_json::json;

    fn broadcaster(auto_assign: bool) -> (EventBroadcaster, Arc<MemoryEventStore>) {
        let events = Arc::new(MemoryEventStore::new());
        let registry = Arc::new(DoctorRegistry::with_roster(
            Arc::new(MemoryDoctorStore::new()),
            seed_doctors(),
        ));
        (
            EventBroadcaster::new(events.clone(), registry, 16, auto_assign),
            events,
        )
    }

    fn payload(id: &str, diagnosis: &str) -> Value {
        json!({
            "conversation_id": id,
            "diagnosis": { "patient": { "medical_diagnosis": diagnosis, "symptoms": "severe pain" } },
            "fullDiagnosis": { "_id": format!("patient-{id}"), "patient_name": "Jane Roe" }
        })
    }

    #[test]
    fn channel_is_created_lazily_once() {
        let (b, _) = broadcaster(false);
        assert!(!b.is_listening());
        let mut first = b.subscribe();
        let mut second = b.subscribe();
        assert!(b.is_listening());
        assert_eq!(b.publish(DispatchMessage::DoctorStatus(seed_doctors().remove(0))), 2);
        assert!(first.try_recv().is_ok());
        assert!(second.try_recv().is_ok());
    }

    #[test]
    fn publish_without_sessions_is_dropped() {
        let (b, _) = broadcaster(false);
        assert_eq!(b.publish(DispatchMessage::DoctorStatus(seed_doctors().remove(0))), 0);
    }

    #[tokio::test]
    async fn three_sessions_receive_same_events_in_order() {
        let (b, events) = broadcaster(false);
        let mut sessions: Vec<_> = (0..3).map(|_| b.subscribe()).collect();

        let first = b.ingest(&payload("c-1", "Stroke")).await.unwrap();
        let second = b.ingest(&payload("c-2", "Burns")).await.unwrap();
        assert_eq!(events.len().await, 2);

        for session in &mut sessions {
            assert_eq!(
                session.recv().await.unwrap(),
                DispatchMessage::Emergency(first.clone())
            );
            assert_eq!(
                session.recv().await.unwrap(),
                DispatchMessage::Emergency(second.clone())
            );
        }
    }

    #[tokio::test]
    async fn auto_assign_publishes_assignment_after_event() {
        let (b, _) = broadcaster(true);
        let mut session = b.subscribe();
        let event = b.ingest(&payload("c-9", "Heart Attack")).await.unwrap();

        assert!(matches!(session.recv().await.unwrap(), DispatchMessage::Emergency(_)));
        match session.recv().await.unwrap() {
            DispatchMessage::DoctorAssigned(assignment) => {
                assert_eq!(assignment.patient_id, event.patient.id);
                assert_eq!(assignment.assigned_doctor.unwrap().name, "Dr. Soufiane Chami");
            }
            other => panic!("unexpected message: {other:?}"),
        }
        assert!(matches!(session.recv().await.unwrap(), DispatchMessage::DoctorStatus(_)));
    }

    #[tokio::test]
    async fn ingest_worker_finishes_queued_payloads_after_sender_drops() {
        let (b, events) = broadcaster(true);
        let b = Arc::new(b);
        let mut session = b.subscribe();

        let (tx, worker) = spawn_ingest_worker(b.clone());
        tx.send(payload("c-1", "Heart Attack")).await.unwrap();
        tx.send(payload("c-2", "Stroke")).await.unwrap();
        drop(tx);
        worker.await.unwrap();

        assert_eq!(events.len().await, 2);
        let mut seen = Vec::new();
        while let Ok(message) = session.try_recv() {
            seen.push(message);
        }
        let emergencies: Vec<_> = seen
            .iter()
            .filter_map(|m| match m {
                DispatchMessage::Emergency(e) => Some(e.id.as_str()),
                _ => None,
            })
            .collect();
        assert_eq!(emergencies, ["c-1", "c-2"]);
        let assigned = seen
            .iter()
            .filter(|m| matches!(m, DispatchMessage::DoctorAssigned(_)))
            .count();
        assert_eq!(assigned, 2);
    }

    #[test]
    fn envelope_uses_event_and_data_keys() {
        let doctor = seed_doctors().remove(0);
        let value = serde_json::to_value(DispatchMessage::DoctorStatus(doctor)).unwrap();
        assert_eq!(value["event"], "doctorStatus");
        assert_eq!(value["data"]["availability"], "Available");
    }

    #[test]
    fn inbound_frames_accept_tagged_or_bare_payloads() {
        let tagged = r#"{"event":"message","data":{"conversation_id":"x"}}"#;
        assert_eq!(inbound_payload(tagged), Some(json!({ "conversation_id": "x" })));
        assert_eq!(
            inbound_payload(r#"{"conversation_id":"y"}"#),
            Some(json!({ "conversation_id": "y" }))
        );
        assert_eq!(inbound_payload(r#"{"event":"ping"}"#), None);
        assert_eq!(inbound_payload("not json"), None);
    }
}
