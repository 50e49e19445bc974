// WebSocket accept loop.
//
// Each accepted connection gets its own read task and write task sharing a
// `Connection`; the write task owns the socket's sink half and is the only
// place that ever calls `.send`, so a slow client can never block the
// reader or the event fan-out.

use super::{
    connection::Connection,
    dispatch::{self, AppState, Registry},
};
use crate::{config::ServerConfig, util::async_flag};
use futures::{SinkExt, StreamExt};
use std::{net::SocketAddr, sync::Arc};
use tokio::{net::TcpListener, sync::mpsc};
use tokio_tungstenite::tungstenite::{
    handshake::server::{ErrorResponse, Request as HandshakeRequest, Response as HandshakeResponse},
    protocol::WebSocketConfig,
    Message,
};

pub async fn run(
    config: ServerConfig,
    state: Arc<AppState>,
    mut shutdown: async_flag::Receiver,
) -> Result<(), crate::error::ServiceError> {
    use crate::error::{ErrorKind, ServiceError};

    let bind: SocketAddr = format!("{}:{}", config.host, config.port)
        .parse()
        .map_err(|error| ServiceError::new(ErrorKind::ConfigInvalid, error))?;
    let listener = TcpListener::bind(bind).await.map_err(|error| ServiceError::new(ErrorKind::Internal, error))?;
    log::info!("rpc server listening on {bind}");

    let registry = Arc::new(Registry::new());
    let fan_out_shutdown = shutdown.clone();
    let fan_out_state = Arc::clone(&state);
    let fan_out = tokio::spawn(fan_out_loop(fan_out_state, fan_out_shutdown));

    loop {
        tokio::select! {
            accepted = listener.accept() => {
                let (stream, peer) = match accepted {
                    Ok(pair) => pair,
                    Err(error) => {
                        log::warn!("accept failed: {error}");
                        continue;
                    }
                };
                let state = Arc::clone(&state);
                let registry = Arc::clone(&registry);
                let config = config.clone();
                let connection_shutdown = shutdown.clone();
                tokio::spawn(async move {
                    if let Err(error) = handle_connection(stream, peer, config, state, registry, connection_shutdown).await {
                        log::debug!("connection {peer} ended: {error}");
                    }
                });
            }
            _ = &mut shutdown => {
                log::info!("rpc server shutting down");
                break;
            }
        }
    }

    fan_out.abort();
    Ok(())
}

async fn fan_out_loop(
    state: Arc<AppState>,
    mut shutdown: async_flag::Receiver,
) {
    let mut events = state.bus.subscribe();
    loop {
        tokio::select! {
            received = events.recv() => {
                let envelope = match received {
                    Ok(envelope) => envelope,
                    Err(tokio::sync::broadcast::error::RecvError::Lagged(skipped)) => {
                        log::warn!("event bus fan-out lagged, dropped {skipped} envelopes");
                        continue;
                    }
                    Err(tokio::sync::broadcast::error::RecvError::Closed) => break,
                };
                let Ok(text) = serde_json::to_string(&envelope) else { continue };
                let message = Message::Text(text);

                for connection in state.connections.snapshot() {
                    if !connection.is_subscribed(envelope.params.topic) {
                        continue;
                    }
                    if connection.try_send(message.clone()).is_err() {
                        log::warn!("disconnecting connection {} on outbound overflow", connection.id);
                        connection.close();
                        state.connections.remove(connection.id);
                    }
                }
            }
            _ = &mut shutdown => break,
        }
    }
}

async fn handle_connection(
    stream: tokio::net::TcpStream,
    peer: SocketAddr,
    config: ServerConfig,
    state: Arc<AppState>,
    registry: Arc<Registry>,
    mut shutdown: async_flag::Receiver,
) -> Result<(), anyhow::Error> {
    let expected_path = config.websocket_path.clone();
    let ws_config = WebSocketConfig {
        max_message_size: Some(config.max_message_size),
        ..WebSocketConfig::default()
    };

    let callback = move |request: &HandshakeRequest, response: HandshakeResponse| -> Result<HandshakeResponse, ErrorResponse> {
        if request.uri().path() != expected_path {
            let rejection: ErrorResponse = http::Response::builder()
                .status(404)
                .body(None)
                .expect("well-formed rejection response");
            return Err(rejection);
        }
        Ok(response)
    };

    let websocket = tokio::time::timeout(
        config.read_timeout.into(),
        tokio_tungstenite::accept_hdr_async_with_config(stream, callback, Some(ws_config)),
    )
    .await??;

    let (mut sink, mut stream) = websocket.split();
    let (outbound_tx, mut outbound_rx) = mpsc::channel::<Message>(config.max_in_flight_per_client.max(1));
    let connection = Arc::new(Connection::new(outbound_tx));
    state.connections.insert(Arc::clone(&connection));
    log::debug!("connection {} accepted from {peer}", connection.id);

    let ping_interval: std::time::Duration = config.ping_interval.into();
    let pong_wait: std::time::Duration = config.pong_wait.into();
    let write_task = {
        let connection = Arc::clone(&connection);
        let mut shutdown = shutdown.clone();
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(ping_interval);
            ticker.tick().await; // first tick fires immediately; skip it.
            loop {
                tokio::select! {
                    message = outbound_rx.recv() => match message {
                        Some(message) => {
                            if sink.send(message).await.is_err() {
                                break;
                            }
                        }
                        None => break,
                    },
                    _ = ticker.tick() => {
                        if connection.state() == super::connection::ConnectionState::Closed {
                            break;
                        }
                        if connection.since_last_pong() > pong_wait {
                            log::debug!("connection {} missed pong beyond {pong_wait:?}, disconnecting", connection.id);
                            break;
                        }
                        if sink.send(Message::Ping(Vec::new())).await.is_err() {
                            break;
                        }
                    }
                    _ = &mut shutdown => break,
                }
            }
            let _ = sink.close().await;
        })
    };

    let read_result = async {
        loop {
            tokio::select! {
                frame = stream.next() => {
                    let Some(frame) = frame else { break };
                    let message = frame?;
                    match message {
                        Message::Text(text) => {
                            let state = Arc::clone(&state);
                            let registry = Arc::clone(&registry);
                            let connection = Arc::clone(&connection);
                            // Handlers run on their own task so a slow downstream
                            // call (e.g. a media-engine request) never stalls the
                            // read loop's frame pump; the response, if any, is
                            // written back once the spawned task completes.
                            tokio::spawn(async move {
                                if let Some(response) = dispatch::dispatch(&state, &registry, &connection, &text).await {
                                    if let Ok(text) = serde_json::to_string(&response) {
                                        let _ = connection.try_send(Message::Text(text));
                                    }
                                }
                            });
                        }
                        Message::Pong(_) => connection.note_pong(),
                        Message::Close(_) => break,
                        _ => {}
                    }
                }
                _ = &mut shutdown => break,
            }
        }
        Ok::<(), anyhow::Error>(())
    }
    .await;

    connection.close();
    state.connections.remove(connection.id);
    write_task.abort();

    read_result
}
