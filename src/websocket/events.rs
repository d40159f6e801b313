//! Order event WebSocket
//!
//! Push-only: after the upgrade the server writes one text frame per event
//! and a ping control frame every `ws_ping_secs`. Client frames other than
//! control frames are ignored; a close, read error or failed write ends the
//! connection.

use axum::{
    extract::{
        ws::{Message, WebSocket, WebSocketUpgrade},
        FromRequestParts, Query,
    },
    http::{header::ORIGIN, request::Parts},
    response::Response,
    Extension,
};
use chrono::{DateTime, Utc};
use futures::{Sink, SinkExt, Stream, StreamExt};
use std::fmt::Display;
use std::time::Duration;
use tokio::time::{Instant, MissedTickBehavior};
use tracing::{debug, info, warn};

use crate::api::error::ApiError;
use crate::middleware::auth::RequireSubject;
use crate::stream::cursor::parse_cursor;
use crate::stream::{EventFilter, StreamContext, StreamQuery};

/// WebSocket upgrade handler. Origin and token are checked before upgrading.
pub async fn events_handler(
    _origin: AllowedOrigin,
    RequireSubject(subject): RequireSubject,
    Extension(ctx): Extension<StreamContext>,
    Query(query): Query<StreamQuery>,
    ws: WebSocketUpgrade,
) -> Response {
    let cursor = parse_cursor(None, query.since.as_deref(), Utc::now());
    let filter = query.filter();
    let max_read = ctx.config.ws_max_read_bytes;

    ws.max_message_size(max_read)
        .max_frame_size(max_read)
        .on_upgrade(move |socket| handle_socket(socket, ctx, filter, cursor, subject))
}

/// Passes when the `Origin` header is absent or on the allow-list.
pub struct AllowedOrigin;

#[async_trait::async_trait]
impl<S> FromRequestParts<S> for AllowedOrigin
where
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let ctx = parts
            .extensions
            .get::<StreamContext>()
            .ok_or_else(|| ApiError::internal("stream context not configured"))?;
        let origin = parts.headers.get(ORIGIN).and_then(|v| v.to_str().ok());
        if origin_allowed(origin, &ctx.allowed_origins) {
            Ok(AllowedOrigin)
        } else {
            warn!(origin = origin.unwrap_or_default(), "Rejected WebSocket origin");
            Err(ApiError::forbidden("origin not allowed"))
        }
    }
}

/// Empty origin (non-browser client) is always allowed; `"*"` allows any.
pub fn origin_allowed(origin: Option<&str>, allowed: &[String]) -> bool {
    let Some(origin) = origin.filter(|o| !o.is_empty()) else {
        return true;
    };
    allowed
        .iter()
        .map(|o| o.trim())
        .any(|o| o == "*" || o.eq_ignore_ascii_case(origin))
}

async fn handle_socket(
    socket: WebSocket,
    ctx: StreamContext,
    filter: EventFilter,
    cursor: Option<DateTime<Utc>>,
    subject: String,
) {
    let (sender, receiver) = socket.split();
    pump(sender, receiver, ctx, filter, cursor, &subject).await;
}

/// Connection loop, generic over the socket halves.
async fn pump<W, R>(
    mut sender: W,
    mut receiver: R,
    ctx: StreamContext,
    filter: EventFilter,
    cursor: Option<DateTime<Utc>>,
    subject: &str,
) where
    W: Sink<Message> + Unpin,
    W::Error: Display,
    R: Stream<Item = Result<Message, axum::Error>> + Unpin,
{
    let cancel = ctx.shutdown.child_token();
    let _guard = cancel.clone().drop_guard();
    let mut subscriber = ctx.hub.subscribe(cancel.clone(), ctx.config.ws_buffer);
    let subscriber_id = subscriber.id();
    info!(subscriber_id, subject, "WebSocket client connected");

    if let Some(since) = cursor {
        let replayed = ctx.hub.replay_since(since, &subscriber).await;
        debug!(subscriber_id, %since, replayed, "WebSocket replay queued");
    }

    let period = ctx.config.ws_ping();
    let write_timeout = ctx.config.ws_write_timeout();
    let mut ping = tokio::time::interval_at(Instant::now() + period, period);
    ping.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            biased;
            _ = cancel.cancelled() => {
                let _ = write(&mut sender, Message::Close(None), write_timeout).await;
                break;
            }
            _ = ping.tick() => {
                if let Err(e) = write(&mut sender, Message::Ping(b"ping".to_vec()), write_timeout).await {
                    debug!(subscriber_id, error = %e, "Ping failed");
                    break;
                }
            }
            event = subscriber.recv() => {
                let Some(event) = event else { break };
                if !filter.matches(&event) {
                    continue;
                }
                let json = match serde_json::to_string(&event) {
                    Ok(json) => json,
                    Err(e) => {
                        warn!(event_id = %event.id, error = %e, "Failed to encode event");
                        continue;
                    }
                };
                if let Err(e) = write(&mut sender, Message::Text(json), write_timeout).await {
                    debug!(subscriber_id, error = %e, "Event write failed");
                    break;
                }
            }
            msg = receiver.next() => {
                match msg {
                    Some(Ok(Message::Close(_))) | None => break,
                    Some(Err(e)) => {
                        debug!(subscriber_id, error = %e, "WebSocket read error");
                        break;
                    }
                    Some(Ok(_)) => {}
                }
            }
        }
    }

    info!(
        subscriber_id,
        dropped = subscriber.dropped(),
        "WebSocket client disconnected"
    );
}

async fn write<W>(sender: &mut W, message: Message, limit: Duration) -> Result<(), String>
where
    W: Sink<Message> + Unpin,
    W::Error: Display,
{
    match tokio::time::timeout(limit, sender.send(message)).await {
        Ok(Ok(())) => Ok(()),
        Ok(Err(e)) => Err(e.to_string()),
        Err(_) => Err(format!("write timed out after {limit:?}")),
    }
}
