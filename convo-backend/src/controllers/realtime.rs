use actix_web::{web, HttpResponse, Responder};
use serde::{Deserialize, Serialize};

use super::{bad_request, require_db, ErrorResponse};
use crate::models::{ChangeType, TableName};
use crate::realtime::{
    parse_table, ws, EventFilter, EventView, MonitorStats, MonitorStatus, RealtimeError,
};
use crate::AppState;

#[derive(Serialize)]
struct StatusResponse {
    success: bool,
    status: MonitorStatus,
    running: bool,
    tables: Vec<TableName>,
}

#[derive(Serialize)]
struct TablesResponse {
    success: bool,
    tables: Vec<TableName>,
}

#[derive(Serialize)]
struct StopResponse {
    success: bool,
    stopped: bool,
    status: MonitorStatus,
}

#[derive(Serialize)]
struct EventsResponse {
    success: bool,
    events: Vec<EventView>,
    count: usize,
    stats: MonitorStats,
}

#[derive(Serialize)]
struct StatsResponse {
    success: bool,
    stats: MonitorStats,
}

#[derive(Serialize)]
struct ClearResponse {
    success: bool,
    cleared: usize,
}

#[derive(Debug, Deserialize)]
struct SetTablesRequest {
    #[serde(default)]
    tables: Vec<String>,
}

#[derive(Debug, Deserialize)]
struct EventsQuery {
    #[serde(rename = "type")]
    event_type: Option<String>,
    table: Option<String>,
}

impl EventsQuery {
    /// `all` or an empty value means no filtering on that field
    fn to_filter(&self) -> Result<EventFilter, HttpResponse> {
        let wanted = |v: &Option<String>| {
            v.as_deref()
                .map(str::trim)
                .filter(|s| !s.is_empty() && !s.eq_ignore_ascii_case("all"))
                .map(str::to_string)
        };

        let event_type = match wanted(&self.event_type) {
            Some(raw) => Some(
                ChangeType::from_str(&raw)
                    .ok_or_else(|| bad_request(format!("Unknown event type: {}", raw)))?,
            ),
            None => None,
        };

        let table = match wanted(&self.table) {
            Some(raw) => Some(parse_table(&raw).map_err(realtime_error)?),
            None => None,
        };

        Ok(EventFilter { event_type, table })
    }
}

pub fn config(cfg: &mut web::ServiceConfig) {
    cfg.service(
        web::scope("/api/realtime")
            .route("/start", web::post().to(start))
            .route("/stop", web::post().to(stop))
            .route("/status", web::get().to(status))
            .route("/tables", web::put().to(set_tables))
            .route("/tables/{table}/toggle", web::post().to(toggle_table))
            .route("/events", web::get().to(list_events))
            .route("/events", web::delete().to(clear_events))
            .route("/stats", web::get().to(stats)),
    );
    // Live event stream for the dashboard
    cfg.route("/ws/realtime", web::get().to(ws::ws_handler));
}

fn realtime_error(err: RealtimeError) -> HttpResponse {
    match err {
        RealtimeError::NoTablesSelected | RealtimeError::UnknownTable(_) => {
            bad_request(err.to_string())
        }
        RealtimeError::AlreadyRunning | RealtimeError::SelectionLocked => {
            HttpResponse::Conflict().json(ErrorResponse::new(err.to_string()))
        }
        other => {
            log::error!("[REALTIME] {}", other);
            super::server_error(other.to_string())
        }
    }
}

fn status_response(state: &AppState) -> StatusResponse {
    let monitor = state.realtime.monitor();
    StatusResponse {
        success: true,
        status: monitor.status(),
        running: state.realtime.is_running(),
        tables: monitor.selected_tables(),
    }
}

async fn start(state: web::Data<AppState>) -> impl Responder {
    let db = match require_db(&state) {
        Ok(db) => db,
        Err(resp) => return resp,
    };

    match state.realtime.start(&db) {
        Ok(_) => HttpResponse::Ok().json(status_response(&state)),
        Err(e) => realtime_error(e),
    }
}

async fn stop(state: web::Data<AppState>) -> impl Responder {
    let stopped = state.realtime.stop().await;
    if stopped {
        log::info!("[REALTIME] Stopped by request");
    }

    HttpResponse::Ok().json(StopResponse {
        success: true,
        stopped,
        status: state.realtime.monitor().status(),
    })
}

async fn status(state: web::Data<AppState>) -> impl Responder {
    HttpResponse::Ok().json(status_response(&state))
}

async fn set_tables(state: web::Data<AppState>, body: web::Bytes) -> impl Responder {
    let request: SetTablesRequest = match super::parse_body(&body, "Invalid request body") {
        Ok(request) => request,
        Err(resp) => return resp,
    };

    let tables = match request
        .tables
        .iter()
        .map(|name| parse_table(name))
        .collect::<Result<Vec<_>, _>>()
    {
        Ok(tables) => tables,
        Err(e) => return realtime_error(e),
    };

    match state.realtime.monitor().set_tables(&tables) {
        Ok(tables) => HttpResponse::Ok().json(TablesResponse {
            success: true,
            tables,
        }),
        Err(e) => realtime_error(e),
    }
}

async fn toggle_table(state: web::Data<AppState>, path: web::Path<String>) -> impl Responder {
    let table = match parse_table(&path) {
        Ok(table) => table,
        Err(e) => return realtime_error(e),
    };

    match state.realtime.monitor().toggle_table(table) {
        Ok(tables) => HttpResponse::Ok().json(TablesResponse {
            success: true,
            tables,
        }),
        Err(e) => realtime_error(e),
    }
}

async fn list_events(state: web::Data<AppState>, query: web::Query<EventsQuery>) -> impl Responder {
    let filter = match query.to_filter() {
        Ok(filter) => filter,
        Err(resp) => return resp,
    };

    let monitor = state.realtime.monitor();
    let events: Vec<EventView> = monitor.events(filter).into_iter().map(EventView::from).collect();

    HttpResponse::Ok().json(EventsResponse {
        success: true,
        count: events.len(),
        events,
        stats: monitor.stats(),
    })
}

async fn clear_events(state: web::Data<AppState>) -> impl Responder {
    HttpResponse::Ok().json(ClearResponse {
        success: true,
        cleared: state.realtime.monitor().clear(),
    })
}

async fn stats(state: web::Data<AppState>) -> impl Responder {
    HttpResponse::Ok().json(StatsResponse {
        success: true,
        stats: state.realtime.monitor().stats(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::controllers::test_support::offline_state;
    use actix_web::{http::StatusCode, test, App, HttpServer};
    use futures_util::StreamExt;
    use serde_json::{json, Value};
    use std::time::Duration;

    #[actix_web::test]
    async fn test_events_filter_and_stats() {
        let state = offline_state();
        let monitor = state.realtime.monitor();
        monitor.record(
            TableName::ConversationMessages,
            ChangeType::Insert,
            json!({"role": "user", "content": "turn on the lights"}),
        );
        monitor.record(TableName::ToolCalls, ChangeType::Update, json!({"tool_name": "lights"}));
        let app = test::init_service(App::new().app_data(state.clone()).configure(config)).await;

        let req = test::TestRequest::get()
            .uri("/api/realtime/events?type=insert&table=all")
            .to_request();
        let body: Value = test::call_and_read_body_json(&app, req).await;
        assert_eq!(body["count"], 1);
        assert_eq!(body["events"][0]["event_type"], "INSERT");
        assert_eq!(body["events"][0]["preview"], "user turn on the lights");
        // Stats ignore the filter
        assert_eq!(body["stats"]["total"], 2);
        assert_eq!(body["stats"]["by_table"]["tool_calls"], 1);

        let req = test::TestRequest::get().uri("/api/realtime/events?type=MERGE").to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);

        let req = test::TestRequest::delete().uri("/api/realtime/events").to_request();
        let body: Value = test::call_and_read_body_json(&app, req).await;
        assert_eq!(body["cleared"], 2);
    }

    #[actix_web::test]
    async fn test_table_selection() {
        let state = offline_state();
        let app = test::init_service(App::new().app_data(state.clone()).configure(config)).await;

        let req = test::TestRequest::post()
            .uri("/api/realtime/tables/tool_calls/toggle")
            .to_request();
        let body: Value = test::call_and_read_body_json(&app, req).await;
        assert_eq!(body["tables"], json!(["conversation_sessions", "conversation_messages"]));

        let req = test::TestRequest::put()
            .uri("/api/realtime/tables")
            .set_json(json!({"tables": ["tool_calls", "conversation_sessions"]}))
            .to_request();
        let body: Value = test::call_and_read_body_json(&app, req).await;
        assert_eq!(body["tables"], json!(["conversation_sessions", "tool_calls"]));

        let req = test::TestRequest::put()
            .uri("/api/realtime/tables")
            .set_json(json!({"tables": ["users"]}))
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);

        state.realtime.monitor().set_status(MonitorStatus::Listening);
        let req = test::TestRequest::post()
            .uri("/api/realtime/tables/tool_calls/toggle")
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::CONFLICT);
    }

    #[actix_web::test]
    async fn test_start_needs_database_and_stop_is_idempotent() {
        let state = offline_state();
        let app = test::init_service(App::new().app_data(state).configure(config)).await;

        let req = test::TestRequest::post().uri("/api/realtime/start").to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::INTERNAL_SERVER_ERROR);

        let req = test::TestRequest::post().uri("/api/realtime/stop").to_request();
        let body: Value = test::call_and_read_body_json(&app, req).await;
        assert_eq!(body["stopped"], false);
        assert_eq!(body["status"], "idle");

        let req = test::TestRequest::get().uri("/api/realtime/status").to_request();
        let body: Value = test::call_and_read_body_json(&app, req).await;
        assert_eq!(body["running"], false);
        assert_eq!(body["tables"].as_array().unwrap().len(), 3);
    }

    #[actix_web::test]
    async fn test_ws_pushes_recorded_events() {
        let state = offline_state();
        let app_state = state.clone();
        let server = HttpServer::new(move || {
            App::new().app_data(app_state.clone()).configure(config)
        })
        .workers(1)
        .disable_signals()
        .bind(("127.0.0.1", 0))
        .unwrap();
        let addr = server.addrs()[0];
        actix_web::rt::spawn(server.run());

        let url = format!("ws://{}/ws/realtime", addr);
        let (mut socket, _) = tokio_tungstenite::connect_async(url).await.unwrap();
        state.realtime.monitor().record(
            TableName::ToolCalls,
            ChangeType::Insert,
            json!({"tool_name": "weather", "duration_ms": 12, "result": "sunny"}),
        );

        let frame = tokio::time::timeout(Duration::from_secs(5), socket.next())
            .await
            .expect("no event pushed")
            .unwrap()
            .unwrap();
        let event: Value = serde_json::from_str(frame.to_text().unwrap()).unwrap();
        assert_eq!(event["table"], "tool_calls");
        assert_eq!(event["event_type"], "INSERT");
        assert_eq!(event["payload"]["result"], "sunny");
        assert_eq!(event["preview"], "weather 12ms sunny");

        socket.close(None).await.unwrap();
    }
}
