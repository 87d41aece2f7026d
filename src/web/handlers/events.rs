//! Event catalog and push channel endpoints
//!
//! The push channel is an outbound-only SSE stream carrying every emitted
//! event; browsers subscribe once and render live progress from it.

use axum::{
    Json,
    extract::State,
    response::sse::{Event as SseEvent, KeepAlive, Sse},
};
use futures::Stream;
use tokio_stream::StreamExt;
use tokio_stream::wrappers::BroadcastStream;

use crate::events::{CatalogEntry, catalog};
use crate::web::AppState;

/// Machine-readable catalog of every event and its payload keys
#[utoipa::path(
    get,
    path = "/api/v1/events",
    tag = "events",
    responses((status = 200, description = "Event catalog", body = [CatalogEntry]))
)]
pub async fn event_catalog() -> Json<Vec<CatalogEntry>> {
    Json(catalog())
}

/// Server-sent event stream of all published events
#[utoipa::path(
    get,
    path = "/api/v1/events/stream",
    tag = "events",
    responses((status = 200, description = "SSE stream of events"))
)]
pub async fn event_stream(
    State(state): State<AppState>,
) -> Sse<impl Stream<Item = Result<SseEvent, axum::Error>>> {
    let receiver = state.events.subscribe_push();
    let stream = BroadcastStream::new(receiver).filter_map(|result| {
        // Lagged receivers skip dropped events and keep streaming
        let event = result.ok()?;
        let sse = SseEvent::default()
            .event(event.name.clone())
            .json_data(&event)
            .ok()?;
        Some(Ok(sse))
    });

    Sse::new(stream).keep_alive(KeepAlive::default())
}
