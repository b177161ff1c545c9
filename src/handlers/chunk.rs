use actix_web::{HttpResponse, Responder, get, http::header::ContentType, web};
use byteorder::{LittleEndian, WriteBytesExt};
use serde::Deserialize;

use crate::app_state::AppState;

#[derive(Deserialize)]
pub struct ChunkQuery {
    pub chunk_index: usize,
    /// 分块大小（元素数量），缺省时一次返回整个网格
    pub chunk_size: Option<usize>,
}

/// 以小端 f32 二进制返回展平网格的一段
/// 展平索引: x + y * R + z * R * R
#[get("/density/grid/chunk")]
pub async fn get_grid_chunk(
    data: web::Data<AppState>,
    query: web::Query<ChunkQuery>,
) -> impl Responder {
    let Some(field) = data.density_cube.current() else {
        return HttpResponse::NotFound().json(serde_json::json!({
            "error": "密度场尚未生成",
            "running_task": data.density_cube.running_task(),
        }));
    };

    let values = field.flattened();
    let data_length = values.len();
    let chunk_size = query.chunk_size.unwrap_or(data_length).max(1);
    let chunk_count = data_length.div_ceil(chunk_size);
    let start = query.chunk_index.saturating_mul(chunk_size);
    if query.chunk_index >= chunk_count {
        return HttpResponse::BadRequest().json(serde_json::json!({
            "error": "无效的 chunk_index",
            "chunk_index": query.chunk_index,
            "chunk_count": chunk_count,
        }));
    }
    let end = (start + chunk_size).min(data_length);

    // 将 chunk 数据序列化为二进制格式
    let mut bytes = Vec::with_capacity((end - start) * std::mem::size_of::<f32>());
    for value in &values[start..end] {
        if let Err(e) = bytes.write_f32::<LittleEndian>(*value) {
            return HttpResponse::InternalServerError().json(serde_json::json!({
                "error": "写入 chunk 数据失败",
                "details": e.to_string(),
            }));
        }
    }

    HttpResponse::Ok()
        .content_type(ContentType::octet_stream())
        .append_header(("X-Chunk-Index", query.chunk_index.to_string()))
        .append_header(("X-Chunk-Start", start.to_string()))
        .append_header(("X-Chunk-End", end.to_string()))
        .append_header(("X-Chunk-Length", (end - start).to_string()))
        .append_header(("X-Chunk-Count", chunk_count.to_string()))
        .append_header(("X-Grid-Resolution", field.resolution().to_string()))
        .body(bytes)
}

#[cfg(test)]
mod tests {
    use actix_web::{App, http::StatusCode, test};
    use byteorder::{LittleEndian, ReadBytesExt};
    use glam::Vec3;

    use crate::dataset::{Bounds, Particle, PointDataset};
    use crate::handlers::test_support::{TestDir, app_state};
    use crate::utils::voxel_grid::DensityGrid;

    #[actix_web::test]
    async fn chunks_reassemble_into_the_flattened_grid() {
        let dir = TestDir::new();
        let state = app_state(&dir, 4);
        let app = test::init_service(
            App::new()
                .app_data(state.clone())
                .configure(crate::routes::configure),
        )
        .await;

        let req = test::TestRequest::get()
            .uri("/density/grid/chunk?chunk_index=0")
            .to_request();
        assert_eq!(test::call_service(&app, req).await.status(), StatusCode::NOT_FOUND);

        let dataset = PointDataset::new(
            vec![Particle {
                position: Vec3::new(0.3, 0.6, 0.9),
                h: 0.0,
                value: 1.0,
            }],
            Bounds::new(Vec3::ZERO, 1.0).unwrap(),
        );
        state
            .density_cube
            .request_rebuild("inline", dataset)
            .unwrap()
            .wait()
            .unwrap();
        let expected = state.density_cube.current().unwrap();

        let mut values = Vec::new();
        for chunk_index in 0..3 {
            let req = test::TestRequest::get()
                .uri(&format!("/density/grid/chunk?chunk_index={}&chunk_size=30", chunk_index))
                .to_request();
            let bytes = test::call_and_read_body(&app, req).await;
            let mut reader: &[u8] = &bytes;
            while let Ok(value) = reader.read_f32::<LittleEndian>() {
                values.push(value);
            }
        }
        let rebuilt = DensityGrid::from_flat(4, values).unwrap();
        assert_eq!(&rebuilt, expected.grid());

        let req = test::TestRequest::get()
            .uri("/density/grid/chunk?chunk_index=3&chunk_size=30")
            .to_request();
        assert_eq!(test::call_service(&app, req).await.status(), StatusCode::BAD_REQUEST);
    }
}
