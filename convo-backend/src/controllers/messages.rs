use actix_web::{web, HttpResponse, Responder};
use serde::Serialize;

use super::{bad_request, db_error};
use crate::db::SupabaseClient;
use crate::models::{ConversationMessage, CreateMessageRequest, MessageRequestError};

#[derive(Serialize)]
pub(super) struct MessageResponse {
    pub success: bool,
    pub message: ConversationMessage,
}

pub fn config(cfg: &mut web::ServiceConfig) {
    cfg.service(web::resource("/api/messages").route(web::post().to(create_message)));
}

/// 400 for a message request that cannot be stored
pub(super) fn reject_message(err: MessageRequestError) -> HttpResponse {
    match err {
        MessageRequestError::MissingFields => {
            bad_request("Missing required fields: session_id, role, content")
        }
        MessageRequestError::InvalidRole(role) => {
            log::warn!("Rejected message with role {:?}", role);
            bad_request("Invalid role: must be one of user, assistant, system")
        }
    }
}

/// Store a message using the credentials carried in the body
async fn create_message(body: web::Bytes) -> impl Responder {
    let request: CreateMessageRequest = match super::parse_body(&body, "Failed to add message") {
        Ok(request) => request,
        Err(resp) => return resp,
    };

    let credentials = (
        request.supabase_url.clone().filter(|u| !u.is_empty()),
        request.supabase_key.clone().filter(|k| !k.is_empty()),
    );
    let (url, key) = match credentials {
        (Some(url), Some(key)) => (url, key),
        _ => return bad_request("Missing supabase_url or supabase_key in request body"),
    };

    let new_message = match request.into_new_message(true) {
        Ok(message) => message,
        Err(e) => return reject_message(e),
    };

    let client = match SupabaseClient::new(&url, &key) {
        Ok(client) => client,
        Err(e) => return bad_request(e.to_string()),
    };

    match client.create_message(&new_message).await {
        Ok(message) => {
            log::info!("Message added: {} to session: {}", message.id, message.session_id);
            HttpResponse::Ok().json(MessageResponse {
                success: true,
                message,
            })
        }
        Err(e) => db_error("Failed to add message", &e),
    }
}
