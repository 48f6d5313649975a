pub mod accounts;
pub mod broadcast;
pub mod config;
pub mod error;
pub mod handlers;
pub mod observability;
pub mod registry;
pub mod responder;
pub mod server;

pub use accounts::{AccountError, AccountService, Credentials, Registration};
pub use broadcast::{DispatchMessage, EventBroadcaster};
pub use config::{AppConfig, DispatchConfig, LoggingConfig, ServerConfig, StorageConfig};
pub use error::ApiError;
pub use observability::init_tracing;
pub use registry::{DoctorRegistry, RegistryError, seed_doctors};
pub use responder::{
    CallStatus, ChatAction, ChatReply, ChatTurn, Directive, Responder, ResponderError,
    parse_directive,
};
pub use server::{AmbulinkServer, AppState, ServerBuilder, build_app, router};
