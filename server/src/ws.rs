//! The WebSocket endpoint: one task per connection running the reader,
//! writer, heartbeat, and matchmaker-notice loops under a single select.

use crate::router::{disconnect, dispatch, handle_notice, ClientSession};
use crate::AppState;
use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::extract::State;
use axum::response::IntoResponse;
use felt_types::constants::{HEARTBEAT_INTERVAL_SECS, PONG_DEADLINE_SECS};
use felt_types::{ClientFrame, Envelope, Event};
use futures::{SinkExt, StreamExt};
use std::time::{Duration, Instant};
use tokio::sync::mpsc;
use tracing::{debug, info, warn};
use uuid::Uuid;

pub async fn ws_handler(
    State(state): State<AppState>,
    ws: WebSocketUpgrade,
) -> impl IntoResponse {
    ws.on_upgrade(move |socket| client_loop(socket, state))
}

async fn client_loop(socket: WebSocket, state: AppState) {
    let client_id = Uuid::new_v4().to_string();
    info!(client = %client_id, "client connected");

    let mut out_rx = state.hub.register(&client_id).await;
    let (notice_tx, mut notice_rx) = mpsc::channel(8);
    let mut session = ClientSession::new(client_id.clone());
    state
        .hub
        .unicast(
            &client_id,
            Envelope::new(Event::Connected {
                client_id: client_id.clone(),
                player_id: None,
            }),
        )
        .await;

    let (mut sink, mut stream) = socket.split();
    let mut heartbeat = tokio::time::interval(Duration::from_secs(HEARTBEAT_INTERVAL_SECS));
    heartbeat.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
    // The first interval tick fires immediately; swallow it so the first
    // real ping goes out one full period in.
    heartbeat.tick().await;
    let pong_deadline = Duration::from_secs(PONG_DEADLINE_SECS);
    let mut last_pong = Instant::now();

    loop {
        tokio::select! {
            inbound = stream.next() => match inbound {
                Some(Ok(Message::Text(text))) => {
                    handle_text(&state, &mut session, &notice_tx, &text).await;
                }
                Some(Ok(Message::Ping(data))) => {
                    if sink.send(Message::Pong(data)).await.is_err() {
                        break;
                    }
                }
                Some(Ok(Message::Pong(_))) => {
                    last_pong = Instant::now();
                }
                Some(Ok(Message::Close(_))) | None => {
                    debug!(client = %client_id, "connection closed by peer");
                    break;
                }
                Some(Ok(Message::Binary(_))) => {
                    // The protocol is text-only JSON envelopes.
                    state.hub.unicast(&client_id, Envelope::new(Event::Error {
                        message: "binary frames are not supported".into(),
                    })).await;
                }
                Some(Err(err)) => {
                    debug!(client = %client_id, %err, "websocket error");
                    break;
                }
            },
            outbound = out_rx.recv() => match outbound {
                Some(frame) => match frame.encode() {
                    Ok(text) => {
                        if sink.send(Message::Text(text)).await.is_err() {
                            break;
                        }
                    }
                    Err(err) => warn!(client = %client_id, %err, "dropping unencodable frame"),
                },
                // The hub dropped us (slow consumer or shutdown).
                None => break,
            },
            notice = notice_rx.recv() => {
                if let Some(notice) = notice {
                    handle_notice(&state, &mut session, notice).await;
                }
            }
            _ = heartbeat.tick() => {
                if last_pong.elapsed() >= pong_deadline {
                    info!(client = %client_id, "pong deadline missed; closing");
                    break;
                }
                if sink.send(Message::Ping(Vec::new())).await.is_err() {
                    break;
                }
            }
        }
    }

    disconnect(&state, &session).await;
    info!(client = %client_id, "client disconnected");
}

async fn handle_text(
    state: &AppState,
    session: &mut ClientSession,
    notice_tx: &mpsc::Sender<crate::matchmaker::MatchNotice>,
    text: &str,
) {
    let frame = match ClientFrame::decode(text) {
        Ok(frame) => frame,
        Err(err) => {
            debug!(client = %session.client_id, %err, "malformed frame");
            state
                .hub
                .unicast(
                    &session.client_id,
                    Envelope::new(Event::Error {
                        message: format!("malformed message: {err}"),
                    }),
                )
                .await;
            return;
        }
    };
    if let Err(err) = dispatch(state, session, notice_tx, frame.payload).await {
        state
            .hub
            .unicast(
                &session.client_id,
                Envelope::new(Event::Error {
                    message: err.client_message(),
                }),
            )
            .await;
    }
}
