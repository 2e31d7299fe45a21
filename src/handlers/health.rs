use actix_web::{web, HttpResponse};
use chrono::Utc;
use serde_json::json;

use crate::error::QuotationError;
use crate::services::responder::error_response;
use crate::services::storage::QuotationStore;

pub async fn health_check(store: web::Data<dyn QuotationStore>) -> HttpResponse {
    match store.count().await {
        Ok(count) => HttpResponse::Ok().json(json!({
            "status": "ok",
            "stored_quotations": count,
            "timestamp": Utc::now().to_rfc3339(),
        })),
        Err(e) => error_response(&QuotationError::from(e)),
    }
}

pub fn config(cfg: &mut web::ServiceConfig) {
    cfg.route("/health", web::get().to(health_check));
}
