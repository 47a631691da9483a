use actix_web::{web, HttpResponse, Responder};
use serde::Serialize;

use crate::AppState;

/// Version from Cargo.toml, available at compile time
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

#[derive(Serialize)]
struct HealthResponse {
    status: &'static str,
    version: &'static str,
    database_configured: bool,
    realtime: &'static str,
    console_tokens: usize,
}

pub fn config(cfg: &mut web::ServiceConfig) {
    cfg.service(web::resource("/api/health").route(web::get().to(health_check)));
    cfg.service(web::resource("/api/version").route(web::get().to(get_version)));
}

async fn health_check(state: web::Data<AppState>) -> impl Responder {
    HttpResponse::Ok().json(HealthResponse {
        status: "ok",
        version: VERSION,
        database_configured: state.db.is_some(),
        realtime: state.realtime.monitor().status().as_str(),
        console_tokens: state.console.token_count(),
    })
}

async fn get_version() -> impl Responder {
    HttpResponse::Ok().json(serde_json::json!({
        "version": VERSION
    }))
}
