use actix_web::{web, HttpResponse, Responder};
use chrono::Utc;
use serde::Serialize;
use serde_json::Value;

use super::messages::{reject_message, MessageResponse};
use super::{db_error, require_db};
use crate::models::CreateMessageRequest;
use crate::AppState;

#[derive(Serialize)]
struct ReceivedResponse {
    success: bool,
    received: Value,
    timestamp: String,
}

#[derive(Serialize)]
struct WebhookStatus {
    status: &'static str,
    endpoint: &'static str,
    methods: &'static [&'static str],
    timestamp: String,
}

pub fn config(cfg: &mut web::ServiceConfig) {
    cfg.service(
        web::resource("/api/webhook")
            .route(web::get().to(webhook_status))
            .route(web::post().to(receive_webhook)),
    );
}

async fn webhook_status() -> impl Responder {
    HttpResponse::Ok().json(WebhookStatus {
        status: "ok",
        endpoint: "/api/webhook",
        methods: &["POST"],
        timestamp: Utc::now().to_rfc3339(),
    })
}

/// Store the payload as a message when it looks like one, otherwise echo it back
async fn receive_webhook(state: web::Data<AppState>, body: web::Bytes) -> impl Responder {
    let payload: Value = match serde_json::from_slice(&body) {
        Ok(payload) => payload,
        Err(e) => {
            log::warn!("Webhook body rejected: {}", e);
            return super::bad_request("Invalid request body");
        }
    };

    log::debug!("Webhook received: {}", payload);

    let message_request = payload
        .is_object()
        .then(|| serde_json::from_value::<CreateMessageRequest>(payload.clone()).ok())
        .flatten()
        .filter(|r| r.has_message_fields());

    let request = match message_request {
        Some(request) => request,
        None => {
            return HttpResponse::Ok().json(ReceivedResponse {
                success: true,
                received: payload,
                timestamp: Utc::now().to_rfc3339(),
            });
        }
    };

    let new_message = match request.into_new_message(false) {
        Ok(message) => message,
        Err(e) => return reject_message(e),
    };

    let db = match require_db(&state) {
        Ok(db) => db,
        Err(resp) => return resp,
    };

    match db.create_message(&new_message).await {
        Ok(message) => {
            log::info!("Webhook stored message {} in session {}", message.id, message.session_id);
            HttpResponse::Ok().json(MessageResponse {
                success: true,
                message,
            })
        }
        Err(e) => db_error("Webhook failed to store message", &e),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::controllers::test_support::offline_state;
    use actix_web::{http::StatusCode, test, App};
    use serde_json::json;

    #[actix_web::test]
    async fn test_status() {
        let app = test::init_service(App::new().app_data(offline_state()).configure(config)).await;

        let req = test::TestRequest::get().uri("/api/webhook").to_request();
        let body: Value = test::call_and_read_body_json(&app, req).await;
        assert_eq!(body["status"], "ok");
        assert_eq!(body["methods"], json!(["POST"]));
    }

    #[actix_web::test]
    async fn test_echoes_non_message_payloads() {
        let app = test::init_service(App::new().app_data(offline_state()).configure(config)).await;

        let req = test::TestRequest::post()
            .uri("/api/webhook")
            .set_json(json!({"event": "wake_word", "score": 0.92}))
            .to_request();
        let body: Value = test::call_and_read_body_json(&app, req).await;
        assert_eq!(body["success"], true);
        assert_eq!(body["received"]["event"], "wake_word");
        assert!(body["timestamp"].is_string());
    }

    #[actix_web::test]
    async fn test_invalid_json() {
        let app = test::init_service(App::new().app_data(offline_state()).configure(config)).await;

        let req = test::TestRequest::post()
            .uri("/api/webhook")
            .insert_header(("content-type", "application/json"))
            .set_payload("not json")
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
        let body: Value = test::read_body_json(resp).await;
        assert_eq!(body["error"], "Invalid request body");
    }

    #[actix_web::test]
    async fn test_message_payload_needs_database() {
        let app = test::init_service(App::new().app_data(offline_state()).configure(config)).await;

        let req = test::TestRequest::post()
            .uri("/api/webhook")
            .set_json(json!({"session_id": "s1", "role": "user", "content": "hello"}))
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::INTERNAL_SERVER_ERROR);
    }
}
