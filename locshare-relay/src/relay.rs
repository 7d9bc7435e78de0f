//! Relay server transport: shared state, HTTP routes, and the WebSocket
//! handler that feeds connection events into the [`RoomRegistry`].
//!
//! Routes:
//! - `GET /ws?room=<id>&role=sender|viewer` upgrades to a WebSocket and
//!   attaches the connection to the room.
//! - `GET /new` allocates a fresh room id.
//! - anything else is served from the static asset directory.

use std::path::PathBuf;
use std::sync::Arc;

use axum::extract::ws::{CloseFrame, Message, WebSocket, close_code};
use axum::extract::{Query, State, WebSocketUpgrade};
use futures_util::{SinkExt, StreamExt};
use locshare_proto::session::AttachParams;
use tokio::sync::mpsc;
use tower_http::services::ServeDir;

use crate::allocator;
use crate::config::RelayConfig;
use crate::rooms::{Connection, Dispatch, RelayError, RoomRegistry};

/// Shared relay server state.
pub struct RelayState {
    /// Room membership and forwarding.
    pub rooms: RoomRegistry,
    /// Capacity of each connection's outbound queue.
    viewer_buffer: usize,
    /// Directory of static browser assets.
    static_dir: PathBuf,
}

impl Default for RelayState {
    fn default() -> Self {
        Self::new()
    }
}

impl RelayState {
    /// Creates a relay state with an empty registry and default limits.
    #[must_use]
    pub fn new() -> Self {
        Self::with_config(&RelayConfig::default())
    }

    /// Creates a relay state from a resolved [`RelayConfig`].
    #[must_use]
    pub fn with_config(config: &RelayConfig) -> Self {
        Self {
            rooms: RoomRegistry::with_max_payload_size(config.max_payload_size),
            viewer_buffer: config.viewer_buffer.max(1),
            static_dir: config.static_dir.clone(),
        }
    }
}

/// Handles an upgraded WebSocket connection.
///
/// The connection lifecycle:
/// 1. Validate the attach parameters; on failure close with code 1008.
/// 2. Attach to the room with a bounded outbound channel.
/// 3. Run a writer task (channel to socket) and a reader task (socket to
///    [`RoomRegistry::on_message`]).
/// 4. When either task ends, abort the other and detach exactly once.
pub async fn handle_socket(socket: WebSocket, state: Arc<RelayState>, params: AttachParams) {
    let (mut ws_sender, mut ws_receiver) = socket.split();

    let request = match params.validate() {
        Ok(request) => request,
        Err(e) => {
            tracing::warn!(error = %e, "rejecting connection");
            reject(&mut ws_sender, &e.to_string()).await;
            return;
        }
    };

    let (tx, mut rx) = mpsc::channel::<String>(state.viewer_buffer);

    let connection = match state.rooms.attach(&request.room_id, request.role, tx).await {
        Ok(connection) => connection,
        Err(e) => {
            tracing::warn!(room_id = %request.room_id, error = %e, "rejecting connection");
            reject(&mut ws_sender, &e.to_string()).await;
            return;
        }
    };

    tracing::info!(
        room_id = %connection.room_id(),
        role = %connection.role(),
        conn = %connection.id(),
        "connection attached"
    );

    // Writer: the registry holds the only sender, so this ends on detach.
    let writer_conn = connection.id();
    let mut write_task = tokio::spawn(async move {
        while let Some(payload) = rx.recv().await {
            if ws_sender.send(Message::Text(payload.into())).await.is_err() {
                tracing::debug!(conn = %writer_conn, "WebSocket write failed");
                break;
            }
        }
    });

    let reader_conn = connection.clone();
    let reader_state = Arc::clone(&state);
    let mut read_task = tokio::spawn(async move {
        while let Some(Ok(msg)) = ws_receiver.next().await {
            let result = match msg {
                Message::Text(text) => {
                    reader_state
                        .rooms
                        .on_message(&reader_conn, text.as_bytes())
                        .await
                }
                Message::Binary(data) => reader_state.rooms.on_message(&reader_conn, &data).await,
                Message::Close(_) => {
                    tracing::debug!(conn = %reader_conn.id(), "received close frame");
                    break;
                }
                Message::Ping(_) | Message::Pong(_) => continue,
            };
            log_dispatch(&reader_conn, &result);
        }
    });

    tokio::select! {
        _ = &mut read_task => {
            write_task.abort();
        }
        _ = &mut write_task => {
            read_task.abort();
        }
    }

    state.rooms.on_close(&connection).await;
    tracing::info!(
        room_id = %connection.room_id(),
        role = %connection.role(),
        conn = %connection.id(),
        "connection detached"
    );
}

/// Records what happened to one inbound frame. Nothing goes back to the peer.
fn log_dispatch(connection: &Connection, result: &Result<Dispatch, RelayError>) {
    match result {
        Ok(Dispatch::Forwarded(delivery)) if delivery.skipped > 0 => {
            tracing::debug!(
                room_id = %connection.room_id(),
                skipped = delivery.skipped,
                "some viewers were not ready"
            );
        }
        Ok(Dispatch::Forwarded(_)) => {}
        Ok(Dispatch::Ignored) => {
            tracing::debug!(conn = %connection.id(), "ignoring unknown message type");
        }
        Err(e) => {
            tracing::warn!(
                room_id = %connection.room_id(),
                conn = %connection.id(),
                error = %e,
                "dropping message"
            );
        }
    }
}

/// Refuses a connection with a policy-violation close frame.
async fn reject(
    ws_sender: &mut (impl SinkExt<Message, Error = axum::Error> + Unpin),
    reason: &str,
) {
    let frame = CloseFrame {
        code: close_code::POLICY,
        reason: reason.to_string().into(),
    };
    if let Err(e) = ws_sender.send(Message::Close(Some(frame))).await {
        tracing::debug!(error = %e, "failed to send close frame");
    }
}

/// Starts the relay server on the given address with default state and
/// returns the bound address and a join handle.
///
/// # Errors
///
/// Returns an error if the TCP listener cannot bind to the given address.
pub async fn start_server(
    addr: &str,
) -> Result<
    (std::net::SocketAddr, tokio::task::JoinHandle<()>),
    Box<dyn std::error::Error + Send + Sync>,
> {
    start_server_with_state(addr, Arc::new(RelayState::new())).await
}

/// Starts the relay server with a pre-configured [`RelayState`].
///
/// # Errors
///
/// Returns an error if the TCP listener cannot bind to the given address.
pub async fn start_server_with_state(
    addr: &str,
    state: Arc<RelayState>,
) -> Result<
    (std::net::SocketAddr, tokio::task::JoinHandle<()>),
    Box<dyn std::error::Error + Send + Sync>,
> {
    let app = router(state);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    let bound_addr = listener.local_addr()?;

    let handle = tokio::spawn(async move {
        if let Err(e) = axum::serve(listener, app).await {
            tracing::error!(error = %e, "relay server error");
        }
    });

    Ok((bound_addr, handle))
}

/// Builds the HTTP router for the given state.
pub fn router(state: Arc<RelayState>) -> axum::Router {
    let static_dir = state.static_dir.clone();
    axum::Router::new()
        .route("/ws", axum::routing::get(ws_handler))
        .route("/new", axum::routing::get(allocator::new_room))
        .fallback_service(ServeDir::new(static_dir))
        .with_state(state)
}

/// axum handler that upgrades an HTTP request to a WebSocket connection.
///
/// Attach parameters are validated after the upgrade so that a bad request
/// is refused with a WebSocket close code rather than an HTTP error.
async fn ws_handler(
    ws: WebSocketUpgrade,
    Query(params): Query<AttachParams>,
    State(state): State<Arc<RelayState>>,
) -> impl axum::response::IntoResponse {
    ws.on_upgrade(move |socket| handle_socket(socket, state, params))
}

/// Starts the relay server in-process for testing.
#[cfg(test)]
pub async fn start_test_server() -> (std::net::SocketAddr, tokio::task::JoinHandle<()>) {
    start_server("127.0.0.1:0")
        .await
        .expect("failed to start test server")
}
