use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::routing::get;
use axum::{Json, Router};
use futures_util::{SinkExt, StreamExt};
use rand::distr::Alphanumeric;
use rand::Rng;
use serde::Deserialize;
use serde_json::{json, Value};
use space_puzzle_rust_core::config::ServerConfig;
use space_puzzle_rust_core::difficulty::DifficultyCurve;
use space_puzzle_rust_core::generator::LevelGenerator;
use space_puzzle_rust_core::progress_store::ProgressStore;
use space_puzzle_rust_core::rng::Rng as LevelRng;
use space_puzzle_rust_core::server_protocol::{parse_client_message, ParsedClientMessage};
use space_puzzle_rust_core::server_utils::{
    normalize_level, normalize_seed, parse_leaderboard_limit, parse_query_i64, sanitize_address,
};
use space_puzzle_rust_core::session::GameSession;
use tokio::sync::{mpsc, Mutex};
use tower_http::services::{ServeDir, ServeFile};
use tracing_subscriber::EnvFilter;

static NEXT_ID: AtomicU64 = AtomicU64::new(1);

type SharedState = Arc<Mutex<ServerState>>;

struct ClientContext {
    tx: mpsc::Sender<String>,
    address: Option<String>,
    session: Option<GameSession>,
}

struct ServerState {
    curve: DifficultyCurve,
    generator: LevelGenerator,
    clients: HashMap<String, ClientContext>,
    progress_store: ProgressStore,
}

impl ServerState {
    fn new(curve: DifficultyCurve, progress_store: ProgressStore) -> Self {
        Self {
            curve,
            generator: LevelGenerator::default(),
            clients: HashMap::new(),
            progress_store,
        }
    }
}

#[derive(Debug, Deserialize)]
struct LevelQuery {
    level: Option<String>,
    seed: Option<String>,
}

#[derive(Debug, Deserialize)]
struct LeaderboardQuery {
    limit: Option<String>,
}

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let config = match ServerConfig::from_env() {
        Ok(config) => config,
        Err(error) => {
            tracing::error!(%error, "invalid server configuration");
            std::process::exit(2);
        }
    };

    let state = Arc::new(Mutex::new(ServerState::new(
        config.curve.clone(),
        ProgressStore::new(config.progress_db_path.clone()),
    )));

    let app = Router::new()
        .route("/healthz", get(healthz))
        .route("/api/level", get(level_handler))
        .route("/api/players/{address}", get(player_handler))
        .route("/api/leaderboard", get(leaderboard_handler))
        .route("/ws", get(ws_handler))
        .with_state(state);

    let app = if let Some(static_dir) = config.static_dir.clone() {
        let index_file = static_dir.join("index.html");
        tracing::info!(root = %static_dir.display(), "serving static files");
        app.fallback_service(
            ServeDir::new(static_dir).not_found_service(ServeFile::new(index_file)),
        )
    } else {
        tracing::warn!("static file root not found, serving api only");
        app
    };

    let bind_addr = format!("0.0.0.0:{}", config.port);
    let listener = match tokio::net::TcpListener::bind(&bind_addr).await {
        Ok(listener) => listener,
        Err(error) => {
            tracing::error!(%bind_addr, %error, "failed to bind server socket");
            std::process::exit(1);
        }
    };

    tracing::info!(port = config.port, "listening");
    if let Err(error) = axum::serve(listener, app).await {
        tracing::error!(%error, "server runtime failed");
        std::process::exit(1);
    }
}

async fn healthz() -> impl IntoResponse {
    Json(json!({ "ok": true }))
}

async fn level_handler(
    State(state): State<SharedState>,
    Query(query): Query<LevelQuery>,
) -> impl IntoResponse {
    let level = normalize_level(parse_query_i64(query.level.as_deref()));
    let seed = parse_query_i64(query.seed.as_deref())
        .map(normalize_seed)
        .unwrap_or_else(fresh_seed);

    let guard = state.lock().await;
    let config = guard.curve.config_for_level(level);
    match guard.generator.generate(&config, &mut LevelRng::new(seed)) {
        Ok(generated) => (
            StatusCode::OK,
            Json(json!({ "seed": seed, "level": generated })),
        ),
        Err(error) => {
            tracing::error!(%error, level, seed, "level generation failed");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(json!({ "error": error.to_string() })),
            )
        }
    }
}

async fn player_handler(
    State(state): State<SharedState>,
    Path(address): Path<String>,
) -> impl IntoResponse {
    let Some(address) = sanitize_address(&address) else {
        return (
            StatusCode::BAD_REQUEST,
            Json(json!({ "error": "invalid address" })),
        );
    };
    let guard = state.lock().await;
    let progress = guard.progress_store.get(&address);
    (
        StatusCode::OK,
        Json(json!({ "address": address, "progress": progress })),
    )
}

async fn leaderboard_handler(
    State(state): State<SharedState>,
    Query(query): Query<LeaderboardQuery>,
) -> impl IntoResponse {
    let guard = state.lock().await;
    Json(
        guard
            .progress_store
            .leaderboard(parse_leaderboard_limit(query.limit.as_deref())),
    )
}

async fn ws_handler(ws: WebSocketUpgrade, State(state): State<SharedState>) -> impl IntoResponse {
    ws.on_upgrade(move |socket| handle_socket(state, socket))
}

async fn handle_socket(state: SharedState, socket: WebSocket) {
    let client_id = make_id("client");
    let (tx, mut rx) = mpsc::channel::<String>(256);

    {
        let mut guard = state.lock().await;
        guard.clients.insert(
            client_id.clone(),
            ClientContext {
                tx: tx.clone(),
                address: None,
                session: None,
            },
        );
    }
    tracing::debug!(client_id = %client_id, "client connected");

    let (mut ws_sender, mut ws_receiver) = socket.split();
    let writer = tokio::spawn(async move {
        while let Some(payload) = rx.recv().await {
            if ws_sender.send(Message::Text(payload.into())).await.is_err() {
                break;
            }
        }
    });

    while let Some(received) = ws_receiver.next().await {
        let Ok(message) = received else {
            break;
        };

        match message {
            Message::Text(raw) => {
                handle_client_message(&state, &client_id, raw.as_str()).await;
            }
            Message::Binary(raw) => match String::from_utf8(raw.to_vec()) {
                Ok(text) => handle_client_message(&state, &client_id, &text).await,
                Err(_) => send_error(&state, &client_id, "invalid utf8 message").await,
            },
            Message::Close(_) => break,
            _ => {}
        }
    }

    {
        let mut guard = state.lock().await;
        guard.clients.remove(&client_id);
    }
    tracing::debug!(client_id = %client_id, "client disconnected");
    drop(tx);
    let _ = writer.await;
}

async fn handle_client_message(state: &SharedState, client_id: &str, raw: &str) {
    let Some(message) = parse_client_message(raw) else {
        send_error(state, client_id, "invalid message").await;
        return;
    };

    let mut guard = state.lock().await;
    let guard = &mut *guard;
    let Some(client) = guard.clients.get_mut(client_id) else {
        return;
    };

    let reply = match message {
        ParsedClientMessage::Hello { address, seed } => {
            let address = match address {
                Some(raw) => match sanitize_address(&raw) {
                    Some(address) => Some(address),
                    None => {
                        send_to(client, &json!({ "type": "error", "message": "invalid address" }));
                        return;
                    }
                },
                None => None,
            };
            let seed = seed.map(normalize_seed).unwrap_or_else(fresh_seed);
            let session = match GameSession::new(guard.curve.clone(), guard.generator.clone(), seed)
            {
                Ok(session) => session,
                Err(error) => {
                    tracing::error!(%error, "failed to start session");
                    send_to(client, &json!({ "type": "error", "message": error.to_string() }));
                    return;
                }
            };
            let recorded_high = address
                .as_deref()
                .map(|address| guard.progress_store.get(address).high_score)
                .unwrap_or(0);
            let session = session.with_high_score(recorded_high);
            tracing::info!(client_id, seed, address = ?address, "session started");
            let reply = json!({
                "type": "welcome",
                "clientId": client_id,
                "sessionToken": make_session_token(),
                "seed": seed,
                "snapshot": session.snapshot(),
            });
            client.address = address;
            client.session = Some(session);
            reply
        }
        ParsedClientMessage::Move { dir } => {
            let Some(session) = client.session.as_mut() else {
                send_to(client, &hello_first());
                return;
            };
            let outcome = session.attempt_move(dir);
            let level_changed = outcome.level_changed;
            let mut reply = json!({
                "type": "move_result",
                "outcome": outcome,
                "state": session.state(),
            });
            if level_changed {
                reply["snapshot"] = json!(session.snapshot());
            }
            reply
        }
        ParsedClientMessage::Restart => {
            let Some(session) = client.session.as_mut() else {
                send_to(client, &hello_first());
                return;
            };
            match session.restart() {
                Ok(()) => json!({ "type": "snapshot", "snapshot": session.snapshot() }),
                Err(error) => json!({ "type": "error", "message": error.to_string() }),
            }
        }
        ParsedClientMessage::Pause => {
            let Some(session) = client.session.as_mut() else {
                send_to(client, &hello_first());
                return;
            };
            json!({ "type": "paused", "paused": session.toggle_pause() })
        }
        ParsedClientMessage::Save => {
            let (Some(session), Some(address)) = (client.session.as_mut(), client.address.as_ref())
            else {
                send_to(client, &address_first());
                return;
            };
            match guard.progress_store.apply_sync(address, session.state()) {
                Some(plan) => {
                    session.mark_synced();
                    json!({ "type": "saved", "plan": plan })
                }
                None => address_first(),
            }
        }
        ParsedClientMessage::Claim => {
            let Some(address) = client.address.as_ref() else {
                send_to(client, &address_first());
                return;
            };
            match guard.progress_store.claim_daily(address, now_secs()) {
                Some(progress) => json!({ "type": "claimed", "progress": progress }),
                None => json!({ "type": "error", "message": "daily claim not available yet" }),
            }
        }
        ParsedClientMessage::Convert { keys } => {
            let Some(address) = client.address.as_ref() else {
                send_to(client, &address_first());
                return;
            };
            let requested = u64::try_from(keys).unwrap_or(0);
            match guard.progress_store.convert_keys(address, requested) {
                Some(quote) => json!({
                    "type": "converted",
                    "quote": quote,
                    "progress": guard.progress_store.get(address),
                }),
                None => json!({ "type": "error", "message": "not enough keys to convert" }),
            }
        }
        ParsedClientMessage::Ping { t } => json!({ "type": "pong", "t": t }),
    };

    send_to(client, &reply);
}

fn send_to(client: &ClientContext, payload: &Value) {
    let text = payload.to_string();
    if let Err(error) = client.tx.try_send(text) {
        tracing::warn!(%error, "dropping outbound message");
    }
}

async fn send_error(state: &SharedState, client_id: &str, message: &str) {
    let guard = state.lock().await;
    if let Some(client) = guard.clients.get(client_id) {
        send_to(client, &json!({ "type": "error", "message": message }));
    }
}

fn hello_first() -> Value {
    json!({ "type": "error", "message": "send hello first" })
}

fn address_first() -> Value {
    json!({ "type": "error", "message": "hello with an address first" })
}

fn fresh_seed() -> u32 {
    rand::rng().random()
}

fn make_id(prefix: &str) -> String {
    let seq = NEXT_ID.fetch_add(1, Ordering::Relaxed);
    format!("{prefix}_{seq}")
}

fn make_session_token() -> String {
    rand::rng()
        .sample_iter(Alphanumeric)
        .take(32)
        .map(char::from)
        .collect()
}

fn now_secs() -> u64 {
    chrono::Utc::now().timestamp().max(0) as u64
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn make_id_is_sequential_per_prefix() {
        let first = make_id("client");
        let second = make_id("client");
        assert!(first.starts_with("client_"));
        assert_ne!(first, second);
    }

    #[test]
    fn session_token_is_alphanumeric() {
        let token = make_session_token();
        assert_eq!(token.len(), 32);
        assert!(token.chars().all(|c| c.is_ascii_alphanumeric()));
    }
}
