//! Server-Sent Events endpoint
//!
//! Per connection: resolve the cursor, subscribe, replay into the same queue,
//! then stream filtered events as `id: <unix nanos>` / `event: order` /
//! `data: <json>` frames with a `: ping` comment on every keepalive tick.

use axum::{
    extract::{Extension, Query},
    http::HeaderMap,
    response::sse::{Event, KeepAlive, Sse},
    routing::get,
    Router,
};
use chrono::Utc;
use futures::stream::{self, Stream};
use orderpulse_core::{OrderEvent, Subscriber};
use std::convert::Infallible;
use tokio_util::sync::DropGuard;
use tracing::{debug, info, warn};

use super::cursor::parse_cursor;
use super::{EventFilter, StreamContext, StreamQuery};
use crate::middleware::auth::OptionalSubject;

/// Create SSE routes
pub fn sse_routes() -> Router {
    Router::new().route("/api/stream/events", get(sse_handler))
}

/// Subscriber plus what must live exactly as long as the response body.
struct Connection {
    subscriber: Subscriber,
    filter: EventFilter,
    // cancels the connection token (and so unsubscribes) when the body is dropped
    _guard: DropGuard,
}

async fn sse_handler(
    Extension(ctx): Extension<StreamContext>,
    OptionalSubject(subject): OptionalSubject,
    Query(query): Query<StreamQuery>,
    headers: HeaderMap,
) -> Sse<impl Stream<Item = Result<Event, Infallible>>> {
    let last_event_id = headers
        .get("last-event-id")
        .and_then(|v| v.to_str().ok());
    let cursor = parse_cursor(last_event_id, query.since.as_deref(), Utc::now());

    let cancel = ctx.shutdown.child_token();
    let subscriber = ctx.hub.subscribe(cancel.clone(), ctx.config.sse_buffer);
    info!(
        subscriber_id = subscriber.id(),
        subject = subject.as_deref().unwrap_or("-"),
        "SSE client connected"
    );

    if let Some(since) = cursor {
        let replayed = ctx.hub.replay_since(since, &subscriber).await;
        debug!(subscriber_id = subscriber.id(), %since, replayed, "SSE replay queued");
    }

    let connection = Connection {
        subscriber,
        filter: query.filter(),
        _guard: cancel.drop_guard(),
    };

    Sse::new(event_stream(connection))
        .keep_alive(KeepAlive::new().interval(ctx.config.keepalive()).text("ping"))
}

fn event_stream(connection: Connection) -> impl Stream<Item = Result<Event, Infallible>> {
    stream::unfold(connection, |mut conn| async move {
        loop {
            let Some(event) = conn.subscriber.recv().await else {
                debug!(subscriber_id = conn.subscriber.id(), "SSE stream closed");
                return None;
            };
            if !conn.filter.matches(&event) {
                continue;
            }
            if let Some(frame) = frame(&event) {
                return Some((Ok(frame), conn));
            }
        }
    })
}

fn frame(event: &OrderEvent) -> Option<Event> {
    match Event::default()
        .id(event.timestamp_nanos().to_string())
        .event("order")
        .json_data(event)
    {
        Ok(frame) => Some(frame),
        Err(e) => {
            warn!(event_id = %event.id, error = %e, "Failed to encode SSE frame");
            None
        }
    }
}
