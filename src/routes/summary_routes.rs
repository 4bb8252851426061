use actix_web::{get, post, web, Responder};

use crate::config::LEGACY_BATCH_SIZE;
use crate::models::conversation::SummarizeEmailsBody;
use crate::routes::app_state::AppState;

pub fn init_routes(cfg: &mut web::ServiceConfig) {
    cfg.service(summarize_emails)
        .service(summarize_emails_legacy);
}

#[post("/api/summarize-emails")]
async fn summarize_emails(
    data: web::Data<AppState>,
    req_body: Option<web::Json<SummarizeEmailsBody>>,
) -> impl Responder {
    let model = req_body.and_then(|body| body.into_inner().model);
    let limit = data.batch_size;
    crate::handlers::summary_handler::handle_summarize_request(data, model, limit).await
}

/// Route of the single-backend connector: default model, five messages.
#[get("/summarize-emails")]
async fn summarize_emails_legacy(data: web::Data<AppState>) -> impl Responder {
    crate::handlers::summary_handler::handle_summarize_request(data, None, LEGACY_BATCH_SIZE).await
}
