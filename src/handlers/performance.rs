use actix_web::{HttpResponse, Responder, get, web};
use serde::Deserialize;
use tracing::debug;

use crate::app_state::AppState;

#[derive(Deserialize)]
pub struct PerformanceQuery {
    pub task_id: String,
}

/// 获取指定重建任务的各阶段耗时
#[get("/performance")]
pub async fn get_performance(
    data: web::Data<AppState>,
    query: web::Query<PerformanceQuery>,
) -> impl Responder {
    let records = data.density_cube.performance().get_records(&query.task_id);
    debug!(
        "[性能数据查询] task_id: {}, 记录数: {}",
        query.task_id,
        records.as_ref().map(|r| r.len()).unwrap_or(0)
    );

    // 即使没有记录，也返回空数组，而不是 404 错误
    // 任务可能仍在运行
    HttpResponse::Ok().json(serde_json::json!({
        "task_id": query.task_id,
        "records": records.unwrap_or_default(),
    }))
}
