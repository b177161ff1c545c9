use actix_web::{HttpResponse, Responder, get, web};
use glam::Vec3;
use serde::Deserialize;

use crate::app_state::AppState;

/// 世界坐标（手柄位置）
#[derive(Deserialize)]
pub struct IntensityQuery {
    pub x: f32,
    pub y: f32,
    pub z: f32,
}

/// 触觉强度查询：立方体外或尚未生成密度场时强度为 0
#[get("/density/intensity")]
pub async fn get_intensity(
    data: web::Data<AppState>,
    query: web::Query<IntensityQuery>,
) -> impl Responder {
    let world = Vec3::new(query.x, query.y, query.z);
    let field = data.density_cube.current();
    let pulse = data.probe.pulse_at(field.as_ref(), world);
    let local = data.probe.to_local(world);

    HttpResponse::Ok().json(serde_json::json!({
        "intensity": pulse.amplitude,
        "local": local.to_array(),
        "inside": field.as_ref().and_then(|f| f.voxel_at(local)).is_some(),
        "pulse": pulse,
    }))
}
