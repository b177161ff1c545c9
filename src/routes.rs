use actix_web::web;

use crate::handlers;

/// 统一注册 HTTP 路由，方便集中管理
pub fn configure(cfg: &mut web::ServiceConfig) {
    cfg.service(handlers::hello)
        .service(handlers::request_rebuild)
        .service(handlers::get_rebuild_status)
        .service(handlers::get_intensity)
        .service(handlers::get_grid_chunk)
        .service(handlers::get_dump)
        .service(handlers::get_performance);
}
