use actix_web::{web, HttpResponse, Responder};
use serde::{Deserialize, Serialize};

use super::bad_request;
use crate::db::{DbError, SupabaseClient};
use crate::AppState;

#[derive(Debug, Default, Deserialize)]
struct TestConnectionRequest {
    #[serde(default)]
    url: Option<String>,
    #[serde(default)]
    key: Option<String>,
}

#[derive(Serialize)]
struct TestConnectionResponse {
    success: bool,
    connected: bool,
    /// Whether the server's own credentials were used
    server_credentials: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<String>,
}

pub fn config(cfg: &mut web::ServiceConfig) {
    cfg.service(
        web::resource("/api/settings/test-connection").route(web::post().to(test_connection)),
    );
}

/// Try a trivial query with the supplied credentials, or the server's when none are given.
/// A bare POST with no body checks the server's credentials.
async fn test_connection(state: web::Data<AppState>, body: web::Bytes) -> impl Responder {
    let request = if body.is_empty() {
        TestConnectionRequest::default()
    } else {
        match super::parse_body(&body, "Invalid request body") {
            Ok(request) => request,
            Err(resp) => return resp,
        }
    };

    let supplied = (
        request.url.filter(|u| !u.trim().is_empty()),
        request.key.filter(|k| !k.trim().is_empty()),
    );

    let (client, server_credentials) = match supplied {
        (Some(url), Some(key)) => match SupabaseClient::new(&url, &key) {
            Ok(client) => (client, false),
            Err(e) => return bad_request(e.to_string()),
        },
        (None, None) => match state.db.as_deref() {
            Some(client) => (client.clone(), true),
            None => return super::server_error(DbError::NotConfigured.to_string()),
        },
        _ => return bad_request("Provide both url and key, or neither"),
    };

    // A failed ping is a normal outcome here, not a server error
    let (connected, error) = match client.ping().await {
        Ok(()) => (true, None),
        Err(e) => {
            log::warn!("Connection test against {} failed: {}", client.project_url(), e);
            (false, Some(e.to_string()))
        }
    };

    HttpResponse::Ok().json(TestConnectionResponse {
        success: connected,
        connected,
        server_credentials,
        error,
    })
}
