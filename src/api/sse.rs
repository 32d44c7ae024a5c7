//! Server-Sent Events support

use crate::db::Conversation;
use crate::store::DealEvent;
use axum::response::sse::{Event, KeepAlive, Sse};
use futures::stream::Stream;
use serde_json::{json, Value};
use std::convert::Infallible;
use std::time::Duration;
use tokio_stream::wrappers::BroadcastStream;
use tokio_stream::StreamExt;

/// Stream one conversation's events to one participant. Starts with an
/// `init` snapshot, then forwards committed events for that conversation.
/// Notifications addressed to the other participant are dropped, as are
/// messages the snapshot already contains.
pub fn sse_stream(
    conversation: Conversation,
    viewer_id: String,
    broadcast_rx: tokio::sync::broadcast::Receiver<DealEvent>,
) -> Sse<impl Stream<Item = Result<Event, Infallible>>> {
    let conversation_id = conversation.id.clone();
    let last_sequence_id = conversation.last_message().map_or(0, |m| m.sequence_id);
    let init_data = json!({
        "type": "init",
        "conversation": conversation,
    });
    let init = futures::stream::once(async move {
        Ok(Event::default().event("init").data(init_data.to_string()))
    });

    let broadcasts = BroadcastStream::new(broadcast_rx).filter_map(move |result| match result {
        Ok(event) if is_visible(&event, &conversation_id, &viewer_id, last_sequence_id) => {
            Some(Ok(deal_event_to_axum(&event)))
        }
        Ok(_) => None,
        Err(_) => None, // Skip lagged messages
    });

    let combined = init.chain(broadcasts);

    Sse::new(combined).keep_alive(
        KeepAlive::new()
            .interval(Duration::from_secs(15))
            .text("ping"),
    )
}

fn is_visible(
    event: &DealEvent,
    conversation_id: &str,
    viewer_id: &str,
    after_sequence_id: i64,
) -> bool {
    if event.conversation_id() != conversation_id {
        return false;
    }
    match event {
        DealEvent::Notification { recipient, .. } => recipient == viewer_id,
        DealEvent::MessageAppended { message, .. } => message.sequence_id > after_sequence_id,
        DealEvent::StatusChanged { .. } => true,
    }
}

fn deal_event_to_axum(event: &DealEvent) -> Event {
    let data = serde_json::to_value(event).unwrap_or(Value::Null);
    Event::default().event(event.event_type()).data(data.to_string())
}
