// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! WebSocket gateway: one subscription per connection, one reader task and
//! one writer task.
//!
//! There is no replay on reconnect; clients that need a coherent view call
//! `GET /api/servers` after reconnecting.

use crate::http::AppState;
use axum::extract::ws::{CloseFrame, Message, WebSocket, WebSocketUpgrade};
use axum::extract::State;
use axum::response::Response;
use futures_util::stream::{SplitSink, SplitStream};
use futures_util::{SinkExt, StreamExt};
use parking_lot::Mutex;
use serde::Serialize;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tower_core::Clock;
use tower_hub::{SubscribeOptions, Subscriber};
use tower_wire::{ClientFrame, ServerFrame};
use tracing::debug;

/// Close codes from the wire contract.
const CLOSE_NORMAL: u16 = 1000;
const CLOSE_SERVER_ERROR: u16 = 1011;
const CLOSE_TRY_AGAIN_LATER: u16 = 1013;

pub(crate) async fn upgrade(State(state): State<AppState>, ws: WebSocketUpgrade) -> Response {
    ws.on_upgrade(move |socket| handle(socket, state))
}

async fn handle(socket: WebSocket, state: AppState) {
    let subscriber = state.hub.subscribe(SubscribeOptions::default());
    let subscription_id = subscriber.id().clone();
    debug!(subscription = %subscription_id, "websocket connected");

    let (mut sink, stream) = socket.split();
    let connected = ServerFrame::Connected {
        subscription_id: subscription_id.clone(),
        server_time_ms: state.clock.epoch_ms(),
    };
    if send_json(&mut sink, &connected).await.is_err() {
        return;
    }

    let last_pong = Arc::new(Mutex::new(Instant::now()));
    let conn_cancel = CancellationToken::new();
    let (ctrl_tx, ctrl_rx) = mpsc::channel::<ServerFrame>(16);

    let writer = tokio::spawn(write_loop(WriteLoop {
        sink,
        subscriber,
        ctrl_rx,
        last_pong: Arc::clone(&last_pong),
        heartbeat_interval: state.heartbeat_interval,
        daemon_cancel: state.cancel.clone(),
        conn_cancel: conn_cancel.clone(),
    }));

    read_loop(stream, &state, &subscription_id, ctrl_tx, last_pong, &conn_cancel).await;

    conn_cancel.cancel();
    let _ = writer.await;
    debug!(subscription = %subscription_id, "websocket disconnected");
}

async fn read_loop(
    mut stream: SplitStream<WebSocket>,
    state: &AppState,
    subscription_id: &tower_core::SubscriptionId,
    ctrl_tx: mpsc::Sender<ServerFrame>,
    last_pong: Arc<Mutex<Instant>>,
    conn_cancel: &CancellationToken,
) {
    loop {
        let message = tokio::select! {
            _ = conn_cancel.cancelled() => break,
            message = stream.next() => match message {
                Some(Ok(message)) => message,
                Some(Err(_)) | None => break,
            },
        };
        match message {
            Message::Text(text) => match serde_json::from_str::<ClientFrame>(text.as_str()) {
                Ok(ClientFrame::Subscribe { channels }) => {
                    state.hub.set_channels(subscription_id, channels.into_iter().collect());
                }
                Ok(ClientFrame::Ping) => {
                    let pong = ServerFrame::Pong { at: state.clock.epoch_ms() };
                    if ctrl_tx.send(pong).await.is_err() {
                        break;
                    }
                }
                // Unrecognized frames leave the connection open.
                Err(_) => {
                    if ctrl_tx.send(ServerFrame::unknown_type()).await.is_err() {
                        break;
                    }
                }
            },
            Message::Pong(_) => *last_pong.lock() = Instant::now(),
            Message::Close(_) => break,
            Message::Ping(_) | Message::Binary(_) => {}
        }
    }
}

struct WriteLoop {
    sink: SplitSink<WebSocket, Message>,
    subscriber: Subscriber,
    ctrl_rx: mpsc::Receiver<ServerFrame>,
    last_pong: Arc<Mutex<Instant>>,
    heartbeat_interval: Duration,
    daemon_cancel: CancellationToken,
    conn_cancel: CancellationToken,
}

async fn write_loop(ctx: WriteLoop) {
    let WriteLoop {
        mut sink,
        subscriber,
        mut ctrl_rx,
        last_pong,
        heartbeat_interval,
        daemon_cancel,
        conn_cancel,
    } = ctx;

    let mut ping = tokio::time::interval(heartbeat_interval);
    ping.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
    ping.tick().await;

    loop {
        tokio::select! {
            _ = conn_cancel.cancelled() => break,
            _ = daemon_cancel.cancelled() => {
                let _ = sink.send(close_frame(CLOSE_TRY_AGAIN_LATER, "shutting down")).await;
                break;
            }
            envelope = subscriber.recv() => match envelope {
                Some(envelope) => {
                    if send_json(&mut sink, &envelope).await.is_err() {
                        break;
                    }
                }
                // Hub gone: the tower is shutting down.
                None => {
                    let _ = sink.send(close_frame(CLOSE_TRY_AGAIN_LATER, "shutting down")).await;
                    break;
                }
            },
            frame = ctrl_rx.recv() => match frame {
                Some(frame) => {
                    if send_json(&mut sink, &frame).await.is_err() {
                        break;
                    }
                }
                None => break,
            },
            _ = ping.tick() => {
                if last_pong.lock().elapsed() > heartbeat_interval * 2 {
                    debug!("websocket heartbeat timeout");
                    let _ = sink.send(close_frame(CLOSE_NORMAL, "heartbeat timeout")).await;
                    break;
                }
                if sink.send(Message::Ping(Vec::new().into())).await.is_err() {
                    break;
                }
            }
        }
    }
    conn_cancel.cancel();
}

async fn send_json<T: Serialize>(
    sink: &mut SplitSink<WebSocket, Message>,
    value: &T,
) -> Result<(), ()> {
    match serde_json::to_string(value) {
        Ok(text) => sink.send(Message::Text(text.into())).await.map_err(|_| ()),
        Err(_) => {
            let _ = sink.send(close_frame(CLOSE_SERVER_ERROR, "serialization failure")).await;
            Err(())
        }
    }
}

fn close_frame(code: u16, reason: &'static str) -> Message {
    Message::Close(Some(CloseFrame { code, reason: reason.into() }))
}
