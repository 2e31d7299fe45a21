pub mod health;
pub mod quotation;

use actix_web::web;

pub fn config(cfg: &mut web::ServiceConfig) {
    cfg.configure(health::config)
        .configure(quotation::config);
}
