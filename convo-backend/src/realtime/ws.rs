//! `/ws/realtime`: pushes every captured change to connected dashboards

use actix_web::{web, HttpRequest, HttpResponse};
use futures_util::StreamExt;
use tokio::sync::broadcast::error::RecvError;

use super::EventView;
use crate::AppState;

pub async fn ws_handler(
    req: HttpRequest,
    body: web::Payload,
    state: web::Data<AppState>,
) -> actix_web::Result<HttpResponse> {
    let (response, mut session, mut msg_stream) = ::actix_ws::handle(&req, body)?;
    let mut events = state.realtime.monitor().subscribe();

    log::info!("[WS] Realtime watcher connected");

    actix_web::rt::spawn(async move {
        let close_reason = loop {
            tokio::select! {
                msg = msg_stream.next() => match msg {
                    Some(Ok(::actix_ws::Message::Ping(bytes))) => {
                        if session.pong(&bytes).await.is_err() {
                            break None;
                        }
                    }
                    Some(Ok(::actix_ws::Message::Close(reason))) => break reason,
                    Some(Ok(_)) => {}
                    Some(Err(e)) => {
                        log::warn!("[WS] Protocol error from watcher: {}", e);
                        break None;
                    }
                    None => break None,
                },
                event = events.recv() => match event {
                    Ok(event) => {
                        let frame = match serde_json::to_string(&EventView::from(event)) {
                            Ok(frame) => frame,
                            Err(e) => {
                                log::error!("[WS] Failed to encode event: {}", e);
                                continue;
                            }
                        };
                        if session.text(frame).await.is_err() {
                            break None;
                        }
                    }
                    Err(RecvError::Lagged(skipped)) => {
                        log::warn!("[WS] Watcher lagging, skipped {} events", skipped);
                    }
                    Err(RecvError::Closed) => break None,
                },
            }
        };

        let _ = session.close(close_reason).await;
        log::info!("[WS] Realtime watcher disconnected");
    });

    Ok(response)
}
