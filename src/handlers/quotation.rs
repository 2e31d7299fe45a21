use actix_web::{web, HttpResponse};

use crate::context::RequestContext;
use crate::error::Result;
use crate::models::Quotation;
use crate::services::pipeline::{Coordinator, Stage};
use crate::services::responder::quotation_response;

/// GET /cotacao
///
/// 客户端断开时 actix 丢弃该 future，正在进行的阶段随之取消
pub async fn get_quotation(coordinator: web::Data<Coordinator<Quotation>>) -> HttpResponse {
    let ctx = RequestContext::background();
    let (stage, result) = coordinator.run_traced(&ctx).await;
    let (stage, response) = respond(stage, result);
    log::debug!("已响应 /cotacao: {} ({})", response.status(), stage);
    response
}

/// 把流水线结果写成 HTTP 响应，并推进到最终状态
fn respond(stage: Stage, result: Result<Quotation>) -> (Stage, HttpResponse) {
    let response = quotation_response(result);
    let stage = stage.respond(response.status().is_success());
    (stage, response)
}

pub fn config(cfg: &mut web::ServiceConfig) {
    cfg.route("/cotacao", web::get().to(get_quotation));
}
