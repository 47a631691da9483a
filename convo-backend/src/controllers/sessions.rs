use actix_web::{web, HttpResponse, Responder};
use serde::{Deserialize, Serialize};

use super::{db_error, require_db, SESSION_LIST_LIMIT};
use crate::models::{
    attach_tool_calls, ConversationSession, CreateSessionRequest, MessageRole, MessageWithToolCalls,
};
use crate::text::ellipsize;
use crate::AppState;

/// Characters of the first user message shown as a conversation preview
const CONVERSATION_PREVIEW_CHARS: usize = 50;

#[derive(Serialize)]
struct SessionResponse {
    success: bool,
    session: ConversationSession,
}

#[derive(Serialize)]
struct SessionsListResponse {
    success: bool,
    sessions: Vec<ConversationSession>,
}

#[derive(Serialize)]
struct ConversationResponse {
    success: bool,
    session: Option<ConversationSession>,
    messages: Vec<MessageWithToolCalls>,
    tool_call_count: usize,
    preview: Option<String>,
}

#[derive(Debug, Deserialize)]
struct SessionListQuery {
    search: Option<String>,
}

pub fn config(cfg: &mut web::ServiceConfig) {
    cfg.service(
        web::scope("/api/sessions")
            .route("", web::post().to(create_session))
            .route("", web::get().to(list_sessions))
            .route("/{id}/end", web::post().to(end_session))
            .route("/{id}/messages", web::get().to(get_conversation)),
    );
}

async fn create_session(state: web::Data<AppState>, body: web::Bytes) -> impl Responder {
    let request: CreateSessionRequest = match super::parse_body(&body, "Failed to create session") {
        Ok(request) => request,
        Err(resp) => return resp,
    };

    let db = match require_db(&state) {
        Ok(db) => db,
        Err(resp) => return resp,
    };

    match db.create_session(&request.into_new_session()).await {
        Ok(session) => {
            log::info!("Session created: {}", session.id);
            HttpResponse::Ok().json(SessionResponse {
                success: true,
                session,
            })
        }
        Err(e) => db_error("Failed to create session", &e),
    }
}

async fn list_sessions(
    state: web::Data<AppState>,
    query: web::Query<SessionListQuery>,
) -> impl Responder {
    let db = match require_db(&state) {
        Ok(db) => db,
        Err(resp) => return resp,
    };

    match db.list_sessions(SESSION_LIST_LIMIT).await {
        Ok(sessions) => {
            let term = query.search.as_deref().map(str::trim).unwrap_or("");
            let sessions = sessions
                .into_iter()
                .filter(|s| s.matches_search(term))
                .collect();
            HttpResponse::Ok().json(SessionsListResponse {
                success: true,
                sessions,
            })
        }
        Err(e) => db_error("Failed to list sessions", &e),
    }
}

async fn end_session(state: web::Data<AppState>, path: web::Path<String>) -> impl Responder {
    let id = path.into_inner();
    let db = match require_db(&state) {
        Ok(db) => db,
        Err(resp) => return resp,
    };

    match db.end_session(&id).await {
        Ok(Some(session)) => {
            log::info!("Session ended: {}", id);
            HttpResponse::Ok().json(SessionResponse {
                success: true,
                session,
            })
        }
        Ok(None) => HttpResponse::NotFound().json(super::ErrorResponse::new("Session not found")),
        Err(e) => db_error("Failed to end session", &e),
    }
}

/// Messages of one session with the tool calls each assistant turn made
async fn get_conversation(state: web::Data<AppState>, path: web::Path<String>) -> impl Responder {
    let id = path.into_inner();
    let db = match require_db(&state) {
        Ok(db) => db,
        Err(resp) => return resp,
    };

    let session = match db.get_session(&id).await {
        Ok(session) => session,
        Err(e) => return db_error("Failed to fetch session", &e),
    };

    let messages = match db.list_messages(&id).await {
        Ok(messages) => messages,
        Err(e) => return db_error("Failed to fetch messages", &e),
    };

    let assistant_ids: Vec<i64> = messages
        .iter()
        .filter(|m| m.role == MessageRole::Assistant)
        .map(|m| m.id)
        .collect();

    // Messages are still worth showing when tool calls cannot be loaded
    let tool_calls = match db.list_tool_calls_for_messages(&assistant_ids).await {
        Ok(calls) => calls,
        Err(e) => {
            log::error!("Failed to fetch tool calls for session {}: {}", id, e);
            Vec::new()
        }
    };

    let preview = messages
        .iter()
        .find(|m| m.role == MessageRole::User)
        .map(|m| ellipsize(&m.content, CONVERSATION_PREVIEW_CHARS));

    let messages = attach_tool_calls(messages, tool_calls);
    let tool_call_count = messages.iter().map(|m| m.tool_calls.len()).sum();

    HttpResponse::Ok().json(ConversationResponse {
        success: true,
        session,
        messages,
        tool_call_count,
        preview,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::controllers::test_support::{fake_postgrest, offline_state, online_state};
    use actix_web::{http::StatusCode, test, App};
    use serde_json::{json, Value};

    fn session_row(id: &str, user: &str, model: Option<&str>) -> Value {
        json!({
            "id": id,
            "started_at": "2030-01-01T10:00:00+00:00",
            "ended_at": null,
            "wake_word_model": model,
            "user_id": user,
            "metadata": {}
        })
    }

    fn sessions_table(cfg: &mut web::ServiceConfig) {
        cfg.route(
            "/rest/v1/conversation_sessions",
            web::get().to(|| async {
                HttpResponse::Ok().json(json!([
                    session_row("aaa-111", "alice", Some("hey_jarvis")),
                    session_row("bbb-222", "bob", None),
                ]))
            }),
        )
        .route(
            "/rest/v1/conversation_sessions",
            web::post().to(|| async {
                HttpResponse::Created().json(json!([session_row("new-1", "default", None)]))
            }),
        )
        .route(
            "/rest/v1/conversation_sessions",
            web::patch().to(|| async { HttpResponse::Ok().json(json!([])) }),
        );
    }

    fn sessions_with_null_user(cfg: &mut web::ServiceConfig) {
        cfg.route(
            "/rest/v1/conversation_sessions",
            web::get().to(|| async {
                let mut legacy = session_row("old-1", "", None);
                legacy["user_id"] = Value::Null;
                HttpResponse::Ok().json(json!([legacy, session_row("new-2", "alice", None)]))
            }),
        );
    }

    fn conversation_tables(cfg: &mut web::ServiceConfig) {
        cfg.route(
            "/rest/v1/conversation_messages",
            web::get().to(|| async {
                HttpResponse::Ok().json(json!([
                    {"id": 1, "session_id": "s1", "role": "user",
                     "content": "What is the weather like in the mountains this weekend, roughly?",
                     "timestamp": "2030-01-01T10:00:00+00:00"},
                    {"id": 2, "session_id": "s1", "role": "assistant", "content": "Sunny",
                     "timestamp": "2030-01-01T10:00:02+00:00"}
                ]))
            }),
        )
        .route(
            "/rest/v1/tool_calls",
            web::get().to(|| async {
                HttpResponse::Ok().json(json!([
                    {"id": 9, "message_id": 2, "tool_name": "weather", "arguments": {},
                     "result": "sunny", "executed_at": "2030-01-01T10:00:01+00:00",
                     "duration_ms": 12.5}
                ]))
            }),
        )
        .route(
            "/rest/v1/conversation_sessions",
            web::get().to(|| async { HttpResponse::Ok().json(json!([])) }),
        );
    }

    #[actix_web::test]
    async fn test_routes_need_database() {
        let state = offline_state();
        let app = test::init_service(App::new().app_data(state).configure(config)).await;

        let req = test::TestRequest::get().uri("/api/sessions").to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::INTERNAL_SERVER_ERROR);
        let body: Value = test::read_body_json(resp).await;
        assert!(body["error"].as_str().unwrap().starts_with("Supabase not configured"));
    }

    #[actix_web::test]
    async fn test_create_rejects_malformed_body() {
        let state = offline_state();
        let app = test::init_service(App::new().app_data(state).configure(config)).await;

        let req = test::TestRequest::post()
            .uri("/api/sessions")
            .insert_header(("content-type", "application/json"))
            .set_payload("[1, 2")
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    }

    #[actix_web::test]
    async fn test_list_and_search_sessions() {
        let url = fake_postgrest(sessions_table).await;
        let app =
            test::init_service(App::new().app_data(online_state(&url)).configure(config)).await;

        let req = test::TestRequest::get().uri("/api/sessions").to_request();
        let body: Value = test::call_and_read_body_json(&app, req).await;
        assert_eq!(body["sessions"].as_array().unwrap().len(), 2);

        let req = test::TestRequest::get().uri("/api/sessions?search=JARVIS").to_request();
        let body: Value = test::call_and_read_body_json(&app, req).await;
        assert_eq!(body["sessions"].as_array().unwrap().len(), 1);
        assert_eq!(body["sessions"][0]["id"], "aaa-111");
    }

    #[actix_web::test]
    async fn test_list_tolerates_null_user_id() {
        let url = fake_postgrest(sessions_with_null_user).await;
        let app =
            test::init_service(App::new().app_data(online_state(&url)).configure(config)).await;

        let req = test::TestRequest::get().uri("/api/sessions?search=alice").to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::OK);
        let body: Value = test::read_body_json(resp).await;
        assert_eq!(body["sessions"].as_array().unwrap().len(), 1);
        assert_eq!(body["sessions"][0]["id"], "new-2");
    }

    #[actix_web::test]
    async fn test_create_and_end_session() {
        let url = fake_postgrest(sessions_table).await;
        let app =
            test::init_service(App::new().app_data(online_state(&url)).configure(config)).await;

        let req = test::TestRequest::post()
            .uri("/api/sessions")
            .set_json(json!({}))
            .to_request();
        let body: Value = test::call_and_read_body_json(&app, req).await;
        assert_eq!(body["success"], true);
        assert_eq!(body["session"]["id"], "new-1");

        // PATCH matched no rows
        let req = test::TestRequest::post().uri("/api/sessions/missing/end").to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::NOT_FOUND);
    }

    #[actix_web::test]
    async fn test_conversation_attaches_tool_calls() {
        let url = fake_postgrest(conversation_tables).await;
        let app =
            test::init_service(App::new().app_data(online_state(&url)).configure(config)).await;

        let req = test::TestRequest::get().uri("/api/sessions/s1/messages").to_request();
        let body: Value = test::call_and_read_body_json(&app, req).await;

        assert_eq!(body["success"], true);
        assert!(body["session"].is_null());
        assert_eq!(body["tool_call_count"], 1);
        assert_eq!(body["messages"][0]["tool_calls"].as_array().unwrap().len(), 0);
        assert_eq!(body["messages"][1]["tool_calls"][0]["tool_name"], "weather");
        assert_eq!(
            body["preview"],
            "What is the weather like in the mountains this wee..."
        );
    }
}
