use actix_web::{HttpResponse, Responder, get, web};

use crate::app_state::AppState;

/// 根路径健康检查/服务说明
#[get("/")]
pub async fn hello(data: web::Data<AppState>) -> impl Responder {
    let supported = data.parser_registry.supported_extensions();
    HttpResponse::Ok().json(serde_json::json!({
        "message": "密度立方体服务",
        "endpoints": [
            "POST /density/rebuild",
            "GET /density/rebuild/status?task_id=<id>",
            "GET /density/intensity?x=<x>&y=<y>&z=<z>",
            "GET /density/grid/chunk?chunk_index=<i>&chunk_size=<n>",
            "GET /density/dump?gzip=<bool>",
            "GET /performance?task_id=<id>",
        ],
        "supported_extensions": supported,
        "resource_dir": data.resource_dir,
        "resolution": data.density_cube.resolution(),
        "field_ready": data.density_cube.current().is_some(),
        "running_task": data.density_cube.running_task(),
    }))
}

#[cfg(test)]
mod tests {
    use actix_web::{App, test};

    use crate::handlers::test_support::{TestDir, app_state};

    #[actix_web::test]
    async fn reports_service_info() {
        let dir = TestDir::new();
        let app = test::init_service(
            App::new()
                .app_data(app_state(&dir, 32))
                .configure(crate::routes::configure),
        )
        .await;
        let req = test::TestRequest::get().uri("/").to_request();
        let body: serde_json::Value = test::call_and_read_body_json(&app, req).await;
        assert_eq!(body["resolution"], 32);
        assert_eq!(body["field_ready"], false);
        assert_eq!(body["supported_extensions"], serde_json::json!(["csv", "gz"]));
    }
}
