pub mod console;
pub mod health;
pub mod messages;
pub mod realtime;
pub mod sessions;
pub mod settings;
pub mod tool_calls;
pub mod usage;
pub mod webhook;

use actix_web::HttpResponse;
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::sync::Arc;

use crate::db::{DbError, SupabaseClient};
use crate::AppState;

/// How many sessions the session list returns
pub const SESSION_LIST_LIMIT: usize = 100;
/// How many sessions feed the usage report
pub const USAGE_SESSION_LIMIT: usize = 500;

/// `{success: false, error}` envelope shared by every route
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub success: bool,
    pub error: String,
}

impl ErrorResponse {
    pub fn new(error: impl Into<String>) -> Self {
        Self {
            success: false,
            error: error.into(),
        }
    }
}

pub fn bad_request(error: impl Into<String>) -> HttpResponse {
    HttpResponse::BadRequest().json(ErrorResponse::new(error))
}

pub fn server_error(error: impl Into<String>) -> HttpResponse {
    HttpResponse::InternalServerError().json(ErrorResponse::new(error))
}

/// 500 carrying the database's own message
pub fn db_error(context: &str, err: &DbError) -> HttpResponse {
    log::error!("{}: {}", context, err);
    server_error(err.to_string())
}

/// The server-side database client, or the 500 explaining it is missing
pub fn require_db(state: &AppState) -> Result<Arc<SupabaseClient>, HttpResponse> {
    state
        .db
        .clone()
        .ok_or_else(|| server_error(DbError::NotConfigured.to_string()))
}

/// Decode a JSON body, answering with the route's own 400 message on failure.
/// An empty body is not valid JSON and is rejected the same way.
pub fn parse_body<T: DeserializeOwned>(body: &[u8], error: &str) -> Result<T, HttpResponse> {
    serde_json::from_slice(body).map_err(|e| {
        log::warn!("Rejected request body: {}", e);
        bad_request(error)
    })
}

#[cfg(test)]
pub(crate) mod test_support {
    use actix_web::{web, App, HttpServer};
    use std::sync::Arc;

    use crate::config::Config;
    use crate::db::SupabaseClient;
    use crate::AppState;

    /// State with no database configured
    pub fn offline_state() -> web::Data<AppState> {
        web::Data::new(AppState::new(Config::default(), None))
    }

    /// State whose database client points at `url`
    pub fn online_state(url: &str) -> web::Data<AppState> {
        let client = SupabaseClient::new(url, "test-key").unwrap();
        web::Data::new(AppState::new(Config::default(), Some(Arc::new(client))))
    }

    /// Serve canned PostgREST routes on an ephemeral port. Returns the base URL.
    pub async fn fake_postgrest(routes: fn(&mut web::ServiceConfig)) -> String {
        let server = HttpServer::new(move || App::new().configure(routes))
            .workers(1)
            .disable_signals()
            .bind(("127.0.0.1", 0))
            .unwrap();
        let addr = server.addrs()[0];
        actix_web::rt::spawn(server.run());
        format!("http://{}", addr)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;

    #[derive(Debug, Deserialize)]
    struct Named {
        #[serde(default)]
        name: Option<String>,
    }

    #[test]
    fn test_parse_body_accepts_object() {
        let named: Named = parse_body(b" {} ", "bad").unwrap();
        assert!(named.name.is_none());
    }

    #[test]
    fn test_parse_body_rejects_empty() {
        let resp = parse_body::<Named>(b"", "Failed to add log").unwrap_err();
        assert_eq!(resp.status(), actix_web::http::StatusCode::BAD_REQUEST);
        assert!(parse_body::<Named>(b"  \n", "bad").is_err());
    }

    #[test]
    fn test_parse_body_rejects_garbage() {
        let resp = parse_body::<Named>(b"{not json", "Invalid request body").unwrap_err();
        assert_eq!(resp.status(), actix_web::http::StatusCode::BAD_REQUEST);
    }
}
