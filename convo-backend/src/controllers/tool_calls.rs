use actix_web::{web, HttpResponse, Responder};
use serde::Serialize;

use super::{bad_request, db_error, require_db};
use crate::models::{CreateToolCallRequest, ToolCall};
use crate::AppState;

#[derive(Serialize)]
struct ToolCallResponse {
    success: bool,
    tool_call: ToolCall,
}

pub fn config(cfg: &mut web::ServiceConfig) {
    cfg.service(web::resource("/api/tool-calls").route(web::post().to(create_tool_call)));
}

async fn create_tool_call(state: web::Data<AppState>, body: web::Bytes) -> impl Responder {
    let request: CreateToolCallRequest =
        match super::parse_body(&body, "Failed to record tool call") {
            Ok(request) => request,
            Err(resp) => return resp,
        };

    let new_call = match request.into_new_tool_call() {
        Some(call) => call,
        None => return bad_request("Missing required fields: message_id, tool_name"),
    };

    let db = match require_db(&state) {
        Ok(db) => db,
        Err(resp) => return resp,
    };

    match db.create_tool_call(&new_call).await {
        Ok(tool_call) => {
            log::info!("Tool call recorded: {} tool: {}", tool_call.id, tool_call.tool_name);
            HttpResponse::Ok().json(ToolCallResponse {
                success: true,
                tool_call,
            })
        }
        Err(e) => db_error("Failed to record tool call", &e),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::controllers::test_support::{fake_postgrest, offline_state, online_state};
    use actix_web::{http::StatusCode, test, App};
    use serde_json::{json, Value};

    fn tool_calls_table(cfg: &mut web::ServiceConfig) {
        cfg.route(
            "/rest/v1/tool_calls",
            web::post().to(|body: web::Json<Value>| async move {
                let mut row = body.into_inner();
                row["id"] = json!(31);
                row["executed_at"] = json!("2030-01-01T00:00:00+00:00");
                HttpResponse::Created().json(json!([row]))
            }),
        );
    }

    #[actix_web::test]
    async fn test_requires_message_and_tool() {
        let app = test::init_service(App::new().app_data(offline_state()).configure(config)).await;

        let req = test::TestRequest::post()
            .uri("/api/tool-calls")
            .set_json(json!({"message_id": 4}))
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
        let body: Value = test::read_body_json(resp).await;
        assert_eq!(body["error"], "Missing required fields: message_id, tool_name");
    }

    #[actix_web::test]
    async fn test_unconfigured_database() {
        let app = test::init_service(App::new().app_data(offline_state()).configure(config)).await;

        let req = test::TestRequest::post()
            .uri("/api/tool-calls")
            .set_json(json!({"message_id": 4, "tool_name": "search"}))
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::INTERNAL_SERVER_ERROR);
    }

    #[actix_web::test]
    async fn test_records_tool_call() {
        let url = fake_postgrest(tool_calls_table).await;
        let app =
            test::init_service(App::new().app_data(online_state(&url)).configure(config)).await;

        let req = test::TestRequest::post()
            .uri("/api/tool-calls")
            .set_json(json!({"message_id": 4, "tool_name": "search", "duration_ms": 120.0}))
            .to_request();
        let body: Value = test::call_and_read_body_json(&app, req).await;

        assert_eq!(body["success"], true);
        assert_eq!(body["tool_call"]["id"], 31);
        assert_eq!(body["tool_call"]["arguments"], json!({}));
        assert_eq!(body["tool_call"]["duration_ms"], 120.0);
    }
}
