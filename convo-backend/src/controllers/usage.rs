use actix_web::{web, HttpResponse, Responder};
use serde::Serialize;

use super::{db_error, require_db, USAGE_SESSION_LIMIT};
use crate::usage::{summarize, UsageReport};
use crate::AppState;

#[derive(Serialize)]
struct UsageResponse {
    success: bool,
    #[serde(flatten)]
    report: UsageReport,
}

pub fn config(cfg: &mut web::ServiceConfig) {
    cfg.service(web::resource("/api/usage").route(web::get().to(get_usage)));
}

async fn get_usage(state: web::Data<AppState>) -> impl Responder {
    let db = match require_db(&state) {
        Ok(db) => db,
        Err(resp) => return resp,
    };

    match db.list_session_usage(USAGE_SESSION_LIMIT).await {
        Ok(sessions) => HttpResponse::Ok().json(UsageResponse {
            success: true,
            report: summarize(&sessions),
        }),
        Err(e) => db_error("Failed to fetch usage", &e),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::controllers::test_support::{fake_postgrest, online_state};
    use actix_web::{test, App};
    use serde_json::{json, Value};

    fn usage_rows(cfg: &mut web::ServiceConfig) {
        cfg.route(
            "/rest/v1/conversation_sessions",
            web::get().to(|| async {
                HttpResponse::Ok().json(json!([
                    {"id": "b", "started_at": "2030-01-02T12:00:00+00:00",
                     "total_input_tokens": 300, "total_output_tokens": 100},
                    {"id": "a", "started_at": "2030-01-01T12:00:00+00:00",
                     "total_input_tokens": null, "total_output_tokens": 50}
                ]))
            }),
        );
    }

    #[actix_web::test]
    async fn test_usage_report() {
        let url = fake_postgrest(usage_rows).await;
        let app =
            test::init_service(App::new().app_data(online_state(&url)).configure(config)).await;

        let req = test::TestRequest::get().uri("/api/usage").to_request();
        let body: Value = test::call_and_read_body_json(&app, req).await;

        assert_eq!(body["success"], true);
        assert_eq!(body["totals"]["total_tokens"], 450);
        assert_eq!(body["daily"][0]["date"], "2030-01-01");
        assert_eq!(body["intervals"].as_array().unwrap().len(), 12);
        assert_eq!(body["intervals"][11]["total_tokens"], 400);
    }
}
