//! HTTP + WebSocket API for the audience mapper
//!
//! Endpoints:
//! - GET / - Single-page UI
//! - POST /session/new - Create a client session
//! - GET /session/:id - Session state
//! - POST /session/:id/audience - Resolve a location
//! - GET /session/:id/map - Map render
//! - GET /api/geo - Polygon dataset (GeoJSON)
//! - WS /ws/:id - Live updates for one session
//! - GET /health - Health check

use axum::{
    extract::{ws::{Message, WebSocket}, Path, State, WebSocketUpgrade},
    http::StatusCode,
    response::{Html, IntoResponse, Json},
    routing::{get, post},
    Router,
};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::{broadcast, RwLock};
use tracing::{debug, info, warn};

use crate::config::AppConfig;
use crate::core::geo_data::{GeoDataProvider, GeoPolygonSet, GeoSource};
use crate::core::map_presenter::{MapInput, MapPresenter};
use crate::core::orchestrator::{AudienceSession, Settlement};
use crate::core::resolver::{AudienceBackend, AudienceResolver};
use crate::types::{MapView, SessionPhase, SessionState};

const INDEX_HTML: &str = include_str!("../../assets/index.html");

/// Live update message
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionUpdate {
    pub session_id: String,
    pub phase: SessionPhase,
    pub request_id: u64,
    pub map_ready: bool,
}

/// One browser client: its lookup lifecycle and its map
#[derive(Debug)]
pub struct ClientSession {
    pub id: String,
    pub audience: AudienceSession,
    pub map: MapPresenter,
    pub update_tx: broadcast::Sender<SessionUpdate>,
}

impl ClientSession {
    fn new(id: String, geo: Option<Arc<GeoPolygonSet>>) -> Self {
        let (update_tx, _) = broadcast::channel(100);
        let mut map = MapPresenter::new();
        if let Some(geo) = geo {
            map.set_geo_data(geo);
        }
        Self {
            id,
            audience: AudienceSession::new(),
            map,
            update_tx,
        }
    }

    fn notify(&self) {
        // No subscribers is fine
        let _ = self.update_tx.send(SessionUpdate {
            session_id: self.id.clone(),
            phase: self.audience.phase(),
            request_id: self.audience.latest_request(),
            map_ready: self.map.has_geo_data(),
        });
    }
}

/// App state
pub struct AppState<B> {
    pub resolver: AudienceResolver<B>,
    pub sessions: RwLock<HashMap<String, ClientSession>>,
    geo: RwLock<Option<Arc<GeoPolygonSet>>>,
    session_counter: AtomicU64,
}

impl<B: AudienceBackend> AppState<B> {
    pub fn new(resolver: AudienceResolver<B>) -> Self {
        Self {
            resolver,
            sessions: RwLock::new(HashMap::new()),
            geo: RwLock::new(None),
            session_counter: AtomicU64::new(0),
        }
    }

    /// Install the polygon dataset for current and future sessions
    pub async fn set_geo_data(&self, geo: GeoPolygonSet) {
        let geo = Arc::new(geo);
        *self.geo.write().await = Some(geo.clone());
        let mut sessions = self.sessions.write().await;
        for client in sessions.values_mut() {
            client.map.set_geo_data(geo.clone());
            client.notify();
        }
    }

    pub async fn has_geo_data(&self) -> bool {
        self.geo.read().await.is_some()
    }

    /// Open a new client session and return its id
    pub async fn create_session(&self) -> String {
        let id = generate_session_id(self.session_counter.fetch_add(1, Ordering::Relaxed));
        let geo = self.geo.read().await.clone();
        self.sessions
            .write()
            .await
            .insert(id.clone(), ClientSession::new(id.clone(), geo));
        debug!(session = %id, "Session created");
        id
    }

    /// Live updates of one session
    pub async fn subscribe(&self, id: &str) -> Option<broadcast::Receiver<SessionUpdate>> {
        let sessions = self.sessions.read().await;
        sessions.get(id).map(|client| client.update_tx.subscribe())
    }
}

/// Resolve request
#[derive(Debug, Deserialize)]
pub struct AudienceRequest {
    #[serde(default)]
    pub location: String,
}

/// Create session response
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NewSessionResponse {
    pub session_id: String,
    pub websocket_url: String,
}

/// Health response
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
    pub geo_data_loaded: bool,
    pub sessions_active: usize,
}

/// Create the API router
pub fn create_router<B: AudienceBackend + 'static>(state: Arc<AppState<B>>) -> Router {
    Router::new()
        .route("/", get(index))
        .route("/health", get(health::<B>))
        .route("/session/new", post(create_session::<B>))
        .route("/session/:id", get(get_session::<B>))
        .route("/session/:id/audience", post(resolve_audience::<B>))
        .route("/session/:id/map", get(get_map::<B>))
        .route("/api/geo", get(get_geo::<B>))
        .route("/ws/:id", get(websocket_handler::<B>))
        .with_state(state)
}

/// Single-page UI
async fn index() -> Html<&'static str> {
    Html(INDEX_HTML)
}

/// Health check endpoint
async fn health<B: AudienceBackend>(State(state): State<Arc<AppState<B>>>) -> Json<HealthResponse> {
    let sessions_active = state.sessions.read().await.len();
    Json(HealthResponse {
        status: "ok".to_string(),
        version: crate::VERSION.to_string(),
        geo_data_loaded: state.has_geo_data().await,
        sessions_active,
    })
}

/// Create a new session
async fn create_session<B: AudienceBackend>(
    State(state): State<Arc<AppState<B>>>,
) -> Json<NewSessionResponse> {
    let session_id = state.create_session().await;
    Json(NewSessionResponse {
        websocket_url: format!("/ws/{}", session_id),
        session_id,
    })
}

/// Resolve a location into one session
async fn resolve_audience<B: AudienceBackend>(
    State(state): State<Arc<AppState<B>>>,
    Path(id): Path<String>,
    Json(req): Json<AudienceRequest>,
) -> Result<(StatusCode, Json<SessionState>), StatusCode> {
    let ticket = {
        let mut sessions = state.sessions.write().await;
        let client = sessions.get_mut(&id).ok_or(StatusCode::NOT_FOUND)?;
        let begun = client.audience.begin(&req.location);
        match begun {
            Ok(ticket) => {
                // Loading: previous audience is gone from the map too
                client.map.update(MapInput::default());
                client.notify();
                ticket
            }
            Err(_) => {
                client.notify();
                return Ok((StatusCode::BAD_REQUEST, Json(client.audience.snapshot())));
            }
        }
    };

    // No lock held across the backend call
    let outcome = state.resolver.resolve(&ticket.query).await;

    // Session and map change together
    let mut sessions = state.sessions.write().await;
    let client = sessions.get_mut(&id).ok_or(StatusCode::NOT_FOUND)?;
    let settlement = client.audience.settle(&ticket, outcome);
    let snapshot = client.audience.snapshot();
    if settlement == Settlement::Superseded {
        return Ok((StatusCode::CONFLICT, Json(snapshot)));
    }

    client.map.update(MapInput::from_response(snapshot.result.as_ref()));
    client.notify();

    let status = if snapshot.result.is_some() {
        StatusCode::OK
    } else {
        StatusCode::BAD_GATEWAY
    };
    Ok((status, Json(snapshot)))
}

/// Session state
async fn get_session<B: AudienceBackend>(
    State(state): State<Arc<AppState<B>>>,
    Path(id): Path<String>,
) -> Result<Json<SessionState>, StatusCode> {
    let sessions = state.sessions.read().await;
    let client = sessions.get(&id).ok_or(StatusCode::NOT_FOUND)?;
    Ok(Json(client.audience.snapshot()))
}

/// Map render of one session
async fn get_map<B: AudienceBackend>(
    State(state): State<Arc<AppState<B>>>,
    Path(id): Path<String>,
) -> Result<Json<MapView>, StatusCode> {
    let sessions = state.sessions.read().await;
    let client = sessions.get(&id).ok_or(StatusCode::NOT_FOUND)?;
    Ok(Json(client.map.view()))
}

/// Polygon dataset, once loaded
async fn get_geo<B: AudienceBackend>(
    State(state): State<Arc<AppState<B>>>,
) -> Result<Json<serde_json::Value>, StatusCode> {
    let geo = state.geo.read().await;
    let geo = geo.as_ref().ok_or(StatusCode::NOT_FOUND)?;
    Ok(Json(geo.to_geojson().clone()))
}

/// WebSocket handler for live updates
async fn websocket_handler<B: AudienceBackend + 'static>(
    State(state): State<Arc<AppState<B>>>,
    Path(id): Path<String>,
    ws: WebSocketUpgrade,
) -> Result<impl IntoResponse, StatusCode> {
    let rx = state.subscribe(&id).await.ok_or(StatusCode::NOT_FOUND)?;
    Ok(ws.on_upgrade(move |socket| async move {
        handle_websocket(socket, rx).await;
    }))
}

/// Handle WebSocket connection
async fn handle_websocket(mut socket: WebSocket, mut rx: broadcast::Receiver<SessionUpdate>) {
    while let Ok(update) = rx.recv().await {
        let json = serde_json::to_string(&update).unwrap_or_default();
        if socket.send(Message::Text(json)).await.is_err() {
            break;
        }
    }
}

/// Load the polygon dataset once in the background; failure leaves an empty map
pub fn spawn_geo_load<B: AudienceBackend + 'static>(
    state: Arc<AppState<B>>,
    provider: GeoDataProvider,
    source: GeoSource,
) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        match provider.load(&source).await {
            Ok(geo) => state.set_geo_data(geo).await,
            Err(e) => warn!(error = %e, %source, "Map data unavailable, rendering empty map"),
        }
    })
}

/// Run the API server
pub async fn run_server(config: &AppConfig) -> Result<(), Box<dyn std::error::Error>> {
    let resolver = AudienceResolver::gemini(config)?;
    let state = Arc::new(AppState::new(resolver));

    let provider = GeoDataProvider::new(config.timeout_secs)?;
    spawn_geo_load(state.clone(), provider, config.geo_source.clone());

    let router = create_router(state);
    let listener = tokio::net::TcpListener::bind(&config.addr).await?;
    info!(addr = %config.addr, model = %config.model, "Audience mapper running");
    info!("  GET  /                       - UI");
    info!("  POST /session/new            - Create session");
    info!("  GET  /session/:id            - Session state");
    info!("  POST /session/:id/audience   - Resolve location");
    info!("  GET  /session/:id/map        - Map render");
    info!("  GET  /api/geo                - Polygon dataset");
    info!("  WS   /ws/:id                 - Live updates");
    info!("  GET  /health                 - Health check");
    axum::serve(listener, router).await?;
    Ok(())
}

/// Generate session ID
fn generate_session_id(seq: u64) -> String {
    use std::time::{SystemTime, UNIX_EPOCH};
    let nanos = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_nanos() as u64)
        .unwrap_or_default();
    format!("session_{:x}_{:x}", nanos, seq)
}
