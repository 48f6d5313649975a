use std::net::SocketAddr;
use std::sync::Arc;

use axum::{
    Router,
    routing::{get, post, put},
};
use tower::ServiceBuilder;
use tower_http::{compression::CompressionLayer, cors::CorsLayer, trace::TraceLayer};

use ambulink_notifications::{CallAdapter, CompletionClient, OpenAiCompatibleClient, TwilioAdapter};
use ambulink_storage::{
    AccountStore, DoctorStore, EventStore, JsonDirEventStore, JsonFileAccountStore,
    JsonFileDoctorStore,
};

use crate::accounts::AccountService;
use crate::broadcast::{self, EventBroadcaster};
use crate::config::AppConfig;
use crate::handlers;
use crate::registry::DoctorRegistry;
use crate::responder::Responder;

/// Shared state handed to every handler and WebSocket session.
#[derive(Clone)]
pub struct AppState {
    pub registry: Arc<DoctorRegistry>,
    pub events: Arc<dyn EventStore>,
    pub broadcaster: Arc<EventBroadcaster>,
    pub responder: Arc<Responder>,
    pub accounts: Arc<AccountService>,
}

impl AppState {
    /// Wires the file-backed stores and outbound adapters described by `cfg`.
    pub async fn from_config(cfg: &AppConfig) -> anyhow::Result<Self> {
        let data_dir = &cfg.storage.data_dir;
        let doctor_store: Arc<dyn DoctorStore> = Arc::new(JsonFileDoctorStore::in_dir(data_dir));
        let events: Arc<dyn EventStore> = Arc::new(JsonDirEventStore::open(data_dir).await?);
        let account_store: Arc<dyn AccountStore> = Arc::new(JsonFileAccountStore::in_dir(data_dir));

        let llm: Arc<dyn CompletionClient> =
            Arc::new(OpenAiCompatibleClient::from_config(&cfg.llm)?);
        let calls: Option<Arc<dyn CallAdapter>> = if cfg.telephony.enabled {
            Some(Arc::new(TwilioAdapter::from_config(&cfg.telephony)?))
        } else {
            tracing::info!("Telephony disabled; call directives will be skipped");
            None
        };

        let registry = Arc::new(DoctorRegistry::bootstrap(doctor_store).await?);
        Ok(Self::assemble(cfg, registry, events, llm, calls, account_store))
    }

    /// Builds the state from already constructed collaborators.
    pub fn assemble(
        cfg: &AppConfig,
        registry: Arc<DoctorRegistry>,
        events: Arc<dyn EventStore>,
        llm: Arc<dyn CompletionClient>,
        calls: Option<Arc<dyn CallAdapter>>,
        account_store: Arc<dyn AccountStore>,
    ) -> Self {
        let broadcaster = Arc::new(EventBroadcaster::new(
            events.clone(),
            registry.clone(),
            cfg.dispatch.channel_capacity,
            cfg.dispatch.auto_assign,
        ));
        let responder = Arc::new(
            Responder::new(llm, calls, events.clone(), registry.clone(), broadcaster.clone())
                .with_sampling(cfg.llm.temperature, cfg.llm.top_p),
        );
        Self {
            registry,
            events,
            broadcaster,
            responder,
            accounts: Arc::new(AccountService::new(account_store)),
        }
    }
}

pub struct AmbulinkServer {
    addr: SocketAddr,
    app: Router,
}

pub async fn build_app(cfg: &AppConfig) -> anyhow::Result<Router> {
    let state = AppState::from_config(cfg).await?;
    Ok(router(state, cfg.server.body_limit_bytes))
}

pub fn router(state: AppState, body_limit: usize) -> Router {
    Router::new()
        // Health and info endpoints
        .route("/", get(handlers::root))
        .route("/healthz", get(handlers::healthz))
        .route("/readyz", get(handlers::readyz))
        // Doctors
        .route("/api/doctors", get(handlers::list_doctors))
        .route("/api/doctors/{id}", get(handlers::get_doctor))
        .route(
            "/api/doctors/{id}/availability",
            put(handlers::update_availability),
        )
        .route("/api/assignments", post(handlers::create_assignment))
        // Emergencies
        .route(
            "/api/emergencies",
            get(handlers::list_emergencies).post(handlers::create_emergency),
        )
        .route("/api/emergencies/latest", get(handlers::latest_emergency))
        .route("/api/patients/{id}", get(handlers::get_patient))
        // Chat and telephony webhook
        .route("/api/chat", post(handlers::chat))
        .route(
            "/api/voice/twiml",
            get(handlers::voice_twiml).post(handlers::voice_twiml),
        )
        // Accounts
        .route("/api/auth/register", post(handlers::register))
        .route("/api/auth/login", post(handlers::login))
        // Real-time channel
        .route("/api/socket", get(broadcast::socket_handler))
        .layer(
            ServiceBuilder::new()
                .layer(
                    TraceLayer::new_for_http()
                        .make_span_with(|req: &axum::http::Request<_>| {
                            tracing::info_span!(
                                "http.request",
                                http.method = %req.method(),
                                http.target = %req.uri(),
                                http.status_code = tracing::field::Empty,
                            )
                        })
                        .on_response(
                            |res: &axum::http::Response<_>,
                             latency: std::time::Duration,
                             span: &tracing::Span| {
                                span.record(
                                    "http.status_code",
                                    tracing::field::display(res.status().as_u16()),
                                );
                                tracing::info!(
                                    http.status = %res.status().as_u16(),
                                    elapsed_ms = %latency.as_millis(),
                                    "request handled"
                                );
                            },
                        ),
                )
                .layer(CompressionLayer::new())
                .layer(CorsLayer::permissive()),
        )
        .layer(axum::extract::DefaultBodyLimit::max(body_limit))
        .with_state(state)
}

pub struct ServerBuilder {
    addr: SocketAddr,
    config: AppConfig,
}

impl Default for ServerBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl ServerBuilder {
    pub fn new() -> Self {
        let cfg = AppConfig::default();
        Self {
            addr: cfg.addr(),
            config: cfg,
        }
    }

    pub fn with_addr(mut self, addr: SocketAddr) -> Self {
        self.addr = addr;
        self
    }

    pub fn with_config(mut self, cfg: AppConfig) -> Self {
        self.addr = cfg.addr();
        self.config = cfg;
        self
    }

    pub async fn build(self) -> anyhow::Result<AmbulinkServer> {
        let app = build_app(&self.config).await?;

        Ok(AmbulinkServer {
            addr: self.addr,
            app,
        })
    }
}

impl AmbulinkServer {
    pub async fn run(self) -> anyhow::Result<()> {
        let listener = tokio::net::TcpListener::bind(self.addr).await?;
        tracing::info!("listening on {}", self.addr);
        axum::serve(listener, self.app)
            .with_graceful_shutdown(shutdown_signal())
            .await?;
        Ok(())
    }
}

async fn shutdown_signal() {
    let _ = tokio::signal::ctrl_c().await;
    tracing::info!("shutdown signal received");
}
