use std::io;

use actix_web::{HttpResponse, Responder, get, http::header::ContentType, web};
use flate2::Compression;
use flate2::write::GzEncoder;
use serde::Deserialize;

use crate::app_state::AppState;
use crate::field::DensityField;

#[derive(Deserialize)]
pub struct DumpQuery {
    #[serde(default)]
    pub gzip: bool,
}

/// 文本导出，用于诊断
#[get("/density/dump")]
pub async fn get_dump(data: web::Data<AppState>, query: web::Query<DumpQuery>) -> impl Responder {
    let Some(field) = data.density_cube.current() else {
        return HttpResponse::NotFound().json(serde_json::json!({
            "error": "密度场尚未生成",
        }));
    };

    if !query.gzip {
        return match field.text_dump() {
            Ok(text) => HttpResponse::Ok()
                .content_type(ContentType::plaintext())
                .body(text),
            Err(e) => HttpResponse::InternalServerError().json(serde_json::json!({
                "error": "文本导出失败",
                "details": e.to_string(),
            })),
        };
    }

    match gzip_dump(&field) {
        Ok(bytes) => HttpResponse::Ok()
            .content_type("application/gzip")
            .append_header(("Content-Disposition", "attachment; filename=\"cube.txt.gz\""))
            .body(bytes),
        Err(e) => HttpResponse::InternalServerError().json(serde_json::json!({
            "error": "压缩导出失败",
            "details": e.to_string(),
        })),
    }
}

fn gzip_dump(field: &DensityField) -> io::Result<Vec<u8>> {
    let mut encoder = GzEncoder::new(Vec::new(), Compression::default());
    field.write_text_dump(&mut encoder)?;
    encoder.finish()
}

#[cfg(test)]
mod tests {
    use std::io::Read;

    use actix_web::{App, test};
    use flate2::read::GzDecoder;
    use glam::Vec3;

    use crate::dataset::{Bounds, PointDataset};
    use crate::handlers::test_support::{TestDir, app_state};

    #[actix_web::test]
    async fn gzip_dump_matches_plain_dump() {
        let dir = TestDir::new();
        let state = app_state(&dir, 3);
        state
            .density_cube
            .request_rebuild(
                "empty",
                PointDataset::new(Vec::new(), Bounds::new(Vec3::ZERO, 1.0).unwrap()),
            )
            .unwrap()
            .wait()
            .unwrap();
        let app = test::init_service(
            App::new()
                .app_data(state)
                .configure(crate::routes::configure),
        )
        .await;

        let req = test::TestRequest::get().uri("/density/dump").to_request();
        let plain = test::call_and_read_body(&app, req).await;
        let plain = String::from_utf8(plain.to_vec()).unwrap();
        assert!(plain.starts_with("###### X: 0 ######\n{0 0 0 },\n"));
        assert_eq!(plain.matches("######").count(), 6);

        let req = test::TestRequest::get().uri("/density/dump?gzip=true").to_request();
        let compressed = test::call_and_read_body(&app, req).await;
        let mut decoded = String::new();
        GzDecoder::new(&compressed[..])
            .read_to_string(&mut decoded)
            .unwrap();
        assert_eq!(decoded, plain);
    }
}
