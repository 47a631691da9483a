use actix_web::{web, HttpResponse, Responder};
use serde::Serialize;

use super::bad_request;
use crate::console::{is_truthy, stringify_text};
use crate::models::{timestamp, ConsoleLog, ConsoleLogQuery, ConsoleLogRequest};
use crate::text::truncate_chars;
use crate::AppState;

#[derive(Serialize)]
struct AppendLogResponse {
    success: bool,
    log: ConsoleLog,
}

#[derive(Serialize)]
struct LogsResponse {
    success: bool,
    logs: Vec<ConsoleLog>,
    count: usize,
}

#[derive(Serialize)]
struct ClearLogsResponse {
    success: bool,
    message: &'static str,
}

pub fn config(cfg: &mut web::ServiceConfig) {
    cfg.service(
        web::resource("/api/console/log")
            .route(web::post().to(append_log))
            .route(web::get().to(fetch_logs))
            .route(web::delete().to(clear_logs)),
    );
}

async fn append_log(state: web::Data<AppState>, body: web::Bytes) -> impl Responder {
    let request: ConsoleLogRequest = match super::parse_body(&body, "Failed to add log") {
        Ok(request) => request,
        Err(resp) => return resp,
    };

    let token = match request.token.as_deref().filter(|t| !t.is_empty()) {
        Some(token) => token,
        None => return bad_request("Missing required field: token"),
    };

    let text = match request.text.as_ref().and_then(stringify_text) {
        Some(text) => text,
        None => return bad_request("Missing required field: text"),
    };

    let supplied_timestamp = match request.timestamp.as_deref().filter(|t| !t.is_empty()) {
        Some(raw) => match timestamp::parse(raw) {
            Some(ts) => Some(ts),
            None => {
                log::warn!("Rejected console log with timestamp {:?}", raw);
                return bad_request("Failed to add log");
            }
        },
        None => None,
    };

    let is_positive = request.is_positive.as_ref().map(is_truthy).unwrap_or(false);
    let log = state.console.append(token, text, is_positive, supplied_timestamp);

    log::info!(
        "Console log added for token {}...: {}",
        truncate_chars(token, 8),
        truncate_chars(&log.text, 50)
    );

    HttpResponse::Ok().json(AppendLogResponse { success: true, log })
}

async fn fetch_logs(
    state: web::Data<AppState>,
    query: web::Query<ConsoleLogQuery>,
) -> impl Responder {
    let token = match query.token.as_deref().filter(|t| !t.is_empty()) {
        Some(token) => token,
        None => return bad_request("Missing required query parameter: token"),
    };

    let since = match query.since.as_deref().filter(|s| !s.is_empty()) {
        Some(raw) => match timestamp::parse(raw) {
            Some(ts) => Some(ts),
            None => return bad_request(format!("Invalid since timestamp: {}", raw)),
        },
        None => None,
    };

    let logs = state.console.fetch(token, since);
    HttpResponse::Ok().json(LogsResponse {
        success: true,
        count: logs.len(),
        logs,
    })
}

async fn clear_logs(
    state: web::Data<AppState>,
    query: web::Query<ConsoleLogQuery>,
) -> impl Responder {
    let token = match query.token.as_deref().filter(|t| !t.is_empty()) {
        Some(token) => token,
        None => return bad_request("Missing required query parameter: token"),
    };

    if state.console.clear(token) {
        log::info!("Console logs cleared for token {}...", truncate_chars(token, 8));
    }

    HttpResponse::Ok().json(ClearLogsResponse {
        success: true,
        message: "Logs cleared",
    })
}
