use actix_web::{web, HttpResponse};
use log::{error, info, warn};
use serde_json::json;

use crate::mailbox::MailboxError;
use crate::models::conversation::{ChatAnswer, ChatRequest};
use crate::routes::app_state::AppState;
use crate::services::{chat_service, email_service};

pub async fn handle_chat_request(data: web::Data<AppState>, request: ChatRequest) -> HttpResponse {
    let (email_id, question) = match (request.email_id, request.question) {
        (Some(id), Some(question)) if !id.as_str().trim().is_empty() && !question.trim().is_empty() => (id, question),
        _ => {
            warn!("Chat request without email_id or question");
            return HttpResponse::BadRequest().json(json!({"error": "Missing required data"}));
        }
    };
    let model = data.model_or_default(request.model);
    info!("Processing question for email {}", email_id);

    // The grounding body is fetched fresh on every turn.
    let message = match email_service::load_message(
        data.connector.clone(),
        data.credentials.clone(),
        email_id,
        data.mailbox_timeout,
    )
    .await
    {
        Ok(message) => message,
        Err(MailboxError::NotFound(id)) => {
            warn!("Email {} not found", id);
            return HttpResponse::NotFound().json(json!({"error": "Could not retrieve email"}));
        }
        Err(e) => {
            error!("Error fetching email for chat: {}", e);
            return HttpResponse::InternalServerError().json(json!({"error": e.to_string()}));
        }
    };

    let answer = chat_service::chat(&data.backend, &message.body, &question, &request.history, &model).await;
    HttpResponse::Ok().json(ChatAnswer { answer })
}
