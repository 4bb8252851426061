use actix_web::{error, post, web, HttpRequest, HttpResponse, Responder};
use log::warn;
use serde_json::json;

use crate::models::conversation::ChatRequest;
use crate::routes::app_state::AppState;

pub fn init_routes(cfg: &mut web::ServiceConfig) {
    cfg.app_data(web::JsonConfig::default().error_handler(json_error))
        .service(chat);
}

#[post("/api/chat")]
async fn chat(data: web::Data<AppState>, req_body: web::Json<ChatRequest>) -> impl Responder {
    crate::handlers::chat_handler::handle_chat_request(data, req_body.into_inner()).await
}

/// Malformed bodies get the same `{"error": ...}` shape as every other failure.
fn json_error(err: error::JsonPayloadError, _req: &HttpRequest) -> actix_web::Error {
    warn!("Rejected chat payload: {}", err);
    let response = HttpResponse::BadRequest().json(json!({"error": format!("Invalid request body: {}", err)}));
    error::InternalError::from_response(err, response).into()
}
