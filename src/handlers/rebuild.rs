use std::path::{Component, Path};

use actix_web::{HttpResponse, Responder, get, post, web};
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::app_state::AppState;
use crate::dataset::PointDataset;
use crate::error::{DatasetError, RebuildError};
use crate::task::RebuildStatus;

#[derive(Deserialize)]
pub struct RebuildRequest {
    /// 资源目录下的文件名，例如 "particles.csv"
    pub file: String,
    /// 被光栅化的标量列，缺省时使用配置中的列
    pub value_channel: Option<String>,
}

#[derive(Serialize, Clone)]
pub struct RebuildResponse {
    pub task_id: String,
    pub file: String,
    pub value_channel: String,
    pub file_size: u64,
    pub particle_count: usize,
    pub resolution: usize,
}

#[post("/density/rebuild")]
pub async fn request_rebuild(
    data: web::Data<AppState>,
    payload: web::Json<RebuildRequest>,
) -> impl Responder {
    let payload = payload.into_inner();
    match run_rebuild_request(data, payload).await {
        Ok(resp) => HttpResponse::Accepted().json(resp),
        Err(err) => err,
    }
}

/// 加载数据集并提交一次重建
///
/// ## 功能概述
/// 1. 校验文件名只能指向资源目录内部，再根据扩展名查找解析器
/// 2. 检查文件是否存在
/// 3. 只读取表头，确认所需列齐全
/// 4. 在阻塞线程池中完整解析文件并构建数据集（列长度不一致时直接拒绝）
/// 5. 提交重建，立即返回 task_id，光栅化在后台进行
///
/// ## 返回
/// - `Ok(RebuildResponse)`: 重建已开始
/// - `Err(HttpResponse)`: 请求无效、文件不存在或已有重建在运行
pub async fn run_rebuild_request(
    app_state: web::Data<AppState>,
    request: RebuildRequest,
) -> Result<RebuildResponse, HttpResponse> {
    // ==================== 步骤 1: 文件路径与解析器 ====================
    let file = request.file;
    let value_channel = request
        .value_channel
        .unwrap_or_else(|| app_state.value_channel.clone());
    if !is_relative_to_resource_dir(&file) {
        return Err(HttpResponse::BadRequest().json(serde_json::json!({
            "error": "文件名无效，只能是资源目录下的相对路径",
            "file": file,
        })));
    }
    let file_path = format!("{}/{}", app_state.resource_dir, file);

    let parser = match app_state.parser_registry.find_parser_for_file(&file_path) {
        Some((p, _)) => p,
        None => {
            let supported = app_state.parser_registry.supported_extensions();
            return Err(HttpResponse::BadRequest().json(serde_json::json!({
                "error": "不支持的文件格式",
                "file": file,
                "supported_extensions": supported,
            })));
        }
    };

    // ==================== 步骤 2: 获取文件大小 ====================
    let file_size = match std::fs::metadata(&file_path) {
        Ok(metadata) => metadata.len(),
        Err(e) => {
            return Err(HttpResponse::NotFound().json(serde_json::json!({
                "error": "文件不存在或无法访问",
                "file": file,
                "details": e.to_string(),
            })));
        }
    };

    // ==================== 步骤 3: 只读表头，校验列 ====================
    let columns = parser
        .get_columns_from_file(&file_path)
        .map_err(|e| dataset_error_response(&file, parser.name(), &e))?;
    let missing: Vec<&str> = ["x", "y", "z", "h", value_channel.as_str()]
        .into_iter()
        .filter(|name| !columns.iter().any(|c| c.as_str() == *name))
        .collect();
    if !missing.is_empty() {
        return Err(HttpResponse::BadRequest().json(serde_json::json!({
            "error": "缺少数据列",
            "file": file,
            "missing_columns": missing,
            "available_columns": columns,
        })));
    }

    // ==================== 步骤 4: 完整解析并构建数据集 ====================
    let registry = app_state.parser_registry.clone();
    let path = file_path.clone();
    let channel = value_channel.clone();
    let loaded = web::block(move || -> Result<PointDataset, DatasetError> {
        let (parser, _) = registry
            .find_parser_for_file(&path)
            .ok_or_else(|| DatasetError::UnsupportedFormat(path.clone()))?;
        let table = parser.parse_from_file(&path)?;
        PointDataset::from_columns(&table, &channel)
    })
    .await;

    let dataset = match loaded {
        Ok(Ok(dataset)) => dataset,
        Ok(Err(e)) => return Err(dataset_error_response(&file, parser.name(), &e)),
        Err(e) => {
            return Err(HttpResponse::InternalServerError().json(serde_json::json!({
                "error": "加载数据集失败",
                "file": file,
                "details": e.to_string(),
            })));
        }
    };
    let particle_count = dataset.len();
    info!("数据集 {} 加载完成: {} 个粒子", file, particle_count);

    // ==================== 步骤 5: 提交重建 ====================
    // 不等待完成，前端通过状态接口轮询
    let handle = match app_state.density_cube.request_rebuild(&file, dataset) {
        Ok(handle) => handle,
        Err(RebuildError::AlreadyRunning { task_id }) => {
            return Err(HttpResponse::Conflict().json(serde_json::json!({
                "error": "已有重建任务正在运行",
                "running_task": task_id,
            })));
        }
        Err(e) => {
            return Err(HttpResponse::InternalServerError().json(serde_json::json!({
                "error": "启动重建失败",
                "details": e.to_string(),
            })));
        }
    };

    Ok(RebuildResponse {
        task_id: handle.task_id().to_string(),
        file,
        value_channel,
        file_size,
        particle_count,
        resolution: app_state.density_cube.resolution(),
    })
}

/// 非空，且只由普通路径段组成（不含 `..`、`.`、根目录或盘符）
fn is_relative_to_resource_dir(file: &str) -> bool {
    !file.is_empty()
        && Path::new(file)
            .components()
            .all(|component| matches!(component, Component::Normal(_)))
}

fn dataset_error_response(file: &str, parser: &str, error: &DatasetError) -> HttpResponse {
    let body = serde_json::json!({
        "error": "数据集无效",
        "file": file,
        "parser": parser,
        "details": error.to_string(),
    });
    match error {
        DatasetError::Io(_) => HttpResponse::InternalServerError().json(body),
        _ => HttpResponse::BadRequest().json(body),
    }
}

#[derive(Deserialize)]
pub struct StatusQuery {
    pub task_id: String,
}

#[derive(Serialize)]
struct StatusResponse {
    task_id: String,
    source: String,
    particle_count: usize,
    #[serde(flatten)]
    status: RebuildStatus,
}

#[get("/density/rebuild/status")]
pub async fn get_rebuild_status(
    data: web::Data<AppState>,
    query: web::Query<StatusQuery>,
) -> impl Responder {
    let Some(task) = data.density_cube.tasks().get(&query.task_id) else {
        return HttpResponse::NotFound().json(serde_json::json!({
            "error": "无效的 task_id",
            "task_id": query.task_id,
        }));
    };

    HttpResponse::Ok().json(StatusResponse {
        task_id: query.task_id.clone(),
        source: task.source.clone(),
        particle_count: task.particle_count,
        status: task.status(),
    })
}
