use actix_web::{web, HttpResponse};
use log::{error, info};
use serde_json::json;

use crate::routes::app_state::AppState;
use crate::services::{email_service, summary_service};

pub async fn handle_summarize_request(
    data: web::Data<AppState>,
    model: Option<String>,
    limit: usize,
) -> HttpResponse {
    let model = data.model_or_default(model);
    info!("Summarize request: last {} emails with model {}", limit, model);

    let messages = match email_service::load_recent(
        data.connector.clone(),
        data.credentials.clone(),
        limit,
        data.mailbox_timeout,
    )
    .await
    {
        Ok(messages) => messages,
        Err(e) => {
            error!("Error fetching emails: {}", e);
            return HttpResponse::InternalServerError().json(json!({"error": e.to_string()}));
        }
    };

    let digests = summary_service::summarize_batch(&data.backend, &messages, &model).await;
    HttpResponse::Ok().json(digests)
}
