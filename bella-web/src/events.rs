//! Live dashboard events. The bot posts each event to `/events`, which records it in the event
//! log and fans it out to every client connected to `/ws`.

use crate::{prelude::*, AppState};
use actix_web::{get, post, web, HttpRequest, HttpResponse};
use actix_ws::{Message, MessageStream, Session};
use bella_redis::LogEntry;
use futures::StreamExt;
use serde_json::{json, Value};
use tokio::sync::broadcast::{self, error::RecvError};
use tracing::{debug, warn};

fn log_entry(event: &Value) -> LogEntry {
    let kind = event
        .get("type")
        .and_then(Value::as_str)
        .unwrap_or("event");
    let level = if kind == "error" { "ERROR" } else { "INFO" };
    let details = event.get("payload").cloned().unwrap_or_else(|| event.clone());
    LogEntry::new(kind, format!("Event: {}", kind))
        .level(level)
        .details(details)
}

#[post("/events")]
async fn post_event(state: web::Data<AppState>, body: web::Bytes) -> Result<HttpResponse> {
    let event: Value = serde_json::from_slice(&body).bad_request("Invalid JSON payload")?;

    if let Some(redis) = state.redis.as_ref() {
        if let Err(err) = redis.event_log().push(&log_entry(&event)).await {
            warn!("Failed to write event log: {}", err);
        }
    }

    state.broadcast(event.to_string());
    Ok(HttpResponse::Ok().json(json!({ "status": "ok" })))
}

#[get("/ws")]
async fn websocket(
    state: web::Data<AppState>,
    request: HttpRequest,
    body: web::Payload,
) -> Result<HttpResponse> {
    let (response, session, stream) = actix_ws::handle(&request, body)?;
    actix_web::rt::spawn(relay(session, stream, state.events.subscribe()));
    Ok(response)
}

/// Forwards broadcast events to one client until either side goes away. Anything the client
/// sends other than pings and closes is ignored.
async fn relay(
    mut session: Session,
    mut stream: MessageStream,
    mut events: broadcast::Receiver<String>,
) {
    debug!("WebSocket client connected");
    loop {
        tokio::select! {
            message = stream.next() => match message {
                Some(Ok(Message::Ping(bytes))) => {
                    if session.pong(&bytes).await.is_err() {
                        break;
                    }
                }
                Some(Ok(Message::Close(reason))) => {
                    let _ = session.close(reason).await;
                    debug!("WebSocket client disconnected");
                    return;
                }
                Some(Ok(_)) => {}
                Some(Err(_)) | None => break,
            },
            event = events.recv() => match event {
                Ok(text) => {
                    if session.text(text).await.is_err() {
                        break;
                    }
                }
                Err(RecvError::Lagged(skipped)) => {
                    warn!("WebSocket client fell behind, skipped {} events", skipped);
                }
                Err(RecvError::Closed) => break,
            },
        }
    }
    let _ = session.close(None).await;
    debug!("WebSocket client disconnected");
}

pub fn scoped_config(cfg: &mut web::ServiceConfig) {
    cfg.service(post_event);
    cfg.service(websocket);
}
