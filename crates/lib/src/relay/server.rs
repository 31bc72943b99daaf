//! Relay HTTP + WebSocket server (single port).

use crate::config::{self, Config};
use crate::context;
use crate::generator::AnswerGenerator;
use crate::relay::session::RelaySession;
use anyhow::{Context, Result};
use axum::{
    extract::{
        ws::{Message, WebSocket, WebSocketUpgrade},
        State,
    },
    response::Response,
    routing::get,
    Json, Router,
};
use serde_json::json;
use std::future::Future;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::net::TcpListener;
use tokio::sync::{broadcast, mpsc};
use tower_http::cors::{Any, CorsLayer};

/// Server-wide events delivered to every open connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RelayEvent {
    Shutdown,
}

/// Shared state for the relay (generator, context document, transcript location).
#[derive(Clone)]
pub struct RelayState {
    /// Port actually bound; reported by the health endpoint.
    pub port: u16,
    pub generator: Arc<AnswerGenerator>,
    /// Context document, read once at startup.
    pub context: Arc<str>,
    pub transcripts_dir: Arc<PathBuf>,
    /// Broadcasts events to connected clients (e.g. shutdown).
    pub event_tx: broadcast::Sender<RelayEvent>,
    /// Held by every live connection; `serve` waits for all clones to drop before returning.
    conn_guard: Option<mpsc::Sender<()>>,
}

impl RelayState {
    pub fn new(generator: Arc<AnswerGenerator>, context: Arc<str>, transcripts_dir: PathBuf) -> Self {
        let (event_tx, _) = broadcast::channel(16);
        Self {
            port: 0,
            generator,
            context,
            transcripts_dir: Arc::new(transcripts_dir),
            event_tx,
            conn_guard: None,
        }
    }

    /// Build state from config: context file, API key from the environment, Groq client.
    pub fn from_config(config: &Config) -> Self {
        let generator = AnswerGenerator::from_config(&config.generator, config::resolve_api_key());
        let context = context::load_context(&config.context.path);
        Self::new(
            Arc::new(generator),
            context,
            config.transcripts.directory.clone(),
        )
    }
}

/// Run the relay; binds to config.server.bind:config.server.port.
/// Blocks until shutdown (Ctrl+C / SIGTERM); open connections save their transcripts before this returns.
pub async fn run_relay(config: Config) -> Result<()> {
    let bind_addr = format!("{}:{}", config.server.bind.trim(), config.server.port);
    let listener = TcpListener::bind(&bind_addr)
        .await
        .with_context(|| format!("binding to {}", bind_addr))?;
    let state = RelayState::from_config(&config);
    if !state.generator.is_configured() {
        log::warn!("generation disabled until {} is set", config::API_KEY_ENV);
    }
    serve(listener, state, shutdown_signal()).await
}

/// Serve on an already-bound listener until `shutdown` completes, then close every open
/// connection and wait for their transcripts to be written.
pub async fn serve<F>(listener: TcpListener, mut state: RelayState, shutdown: F) -> Result<()>
where
    F: Future<Output = ()> + Send + 'static,
{
    let local_addr = listener.local_addr().context("reading listener address")?;
    state.port = local_addr.port();
    let event_tx = state.event_tx.clone();
    let (conn_guard, mut conn_done) = mpsc::channel::<()>(1);
    state.conn_guard = Some(conn_guard);

    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let app = Router::new()
        .route("/", get(health_http))
        .route("/ws/interview", get(ws_handler))
        .layer(cors)
        .with_state(state);

    log::info!("relay listening on {}", local_addr);
    axum::serve(listener, app)
        .with_graceful_shutdown(async move {
            shutdown.await;
            log::info!("shutdown signal received, closing connections");
            let _ = event_tx.send(RelayEvent::Shutdown);
        })
        .await
        .context("relay server exited")?;

    // None once every connection has dropped its state (and with it the guard).
    let _ = conn_done.recv().await;
    log::info!("relay stopped");
    Ok(())
}

/// Future that completes when the process should shut down (SIGINT or SIGTERM).
pub async fn shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c()
            .await
            .expect("failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}

/// GET / returns a simple health JSON (for probes).
async fn health_http(State(state): State<RelayState>) -> Json<serde_json::Value> {
    Json(json!({
        "message": "Prompter relay is running",
        "runtime": "running",
        "port": state.port,
    }))
}

/// GET /ws/interview upgrades to WebSocket. Relay events are subscribed before the upgrade.
async fn ws_handler(State(state): State<RelayState>, ws: WebSocketUpgrade) -> Response {
    let event_rx = state.event_tx.subscribe();
    ws.on_upgrade(move |socket| handle_socket(socket, state, event_rx))
}

async fn handle_socket(
    mut socket: WebSocket,
    state: RelayState,
    mut event_rx: broadcast::Receiver<RelayEvent>,
) {
    let mut session = RelaySession::new(state.generator.clone(), state.context.clone());
    log::info!("[{}] client connected", session.id());

    loop {
        tokio::select! {
            biased;

            event = event_rx.recv() => {
                match event {
                    Ok(RelayEvent::Shutdown) | Err(broadcast::error::RecvError::Closed) => {
                        let _ = socket.send(Message::Close(None)).await;
                        break;
                    }
                    Err(broadcast::error::RecvError::Lagged(n)) => {
                        log::debug!("[{}] lagged {} relay events", session.id(), n);
                    }
                }
            }
            msg = socket.recv() => {
                match msg {
                    None | Some(Ok(Message::Close(_))) => {
                        log::info!("[{}] client disconnected", session.id());
                        break;
                    }
                    Some(Err(e)) => {
                        log::error!("[{}] websocket error: {}", session.id(), e);
                        let _ = socket.send(Message::Close(None)).await;
                        break;
                    }
                    Some(Ok(Message::Text(text))) => {
                        let Some(answer) = session.handle_text(&text).await else { continue };
                        if let Err(e) = socket.send(Message::Text(answer)).await {
                            log::error!("[{}] sending answer failed: {}", session.id(), e);
                            let _ = socket.send(Message::Close(None)).await;
                            break;
                        }
                    }
                    Some(Ok(Message::Binary(_))) => {
                        log::warn!("[{}] binary frame received, closing", session.id());
                        let _ = socket.send(Message::Close(None)).await;
                        break;
                    }
                    Some(Ok(_)) => continue,
                }
            }
        }
    }

    session.finalize(&state.transcripts_dir).await;
}
