use std::path::PathBuf;
use std::sync::Arc;

use actix_web::web;

use crate::app_state::AppState;
use crate::config::{ProbeConfig, PulseConfig, RasterConfig};
use crate::performance::PerformanceStore;
use crate::probe::IntensityProbe;
use crate::rasterizer::DensityRasterizer;
use crate::rebuild::DensityCube;
use crate::task::TaskStore;
use crate::utils::parser_registry::ParserRegistry;

/// 测试用临时资源目录，析构时删除
pub struct TestDir {
    pub path: PathBuf,
}

impl TestDir {
    pub fn new() -> Self {
        let path = std::env::temp_dir().join(format!("density-cube-{}", uuid::Uuid::new_v4()));
        std::fs::create_dir_all(&path).unwrap();
        Self { path }
    }

    pub fn write(&self, name: &str, contents: &str) {
        std::fs::write(self.path.join(name), contents).unwrap();
    }
}

impl Drop for TestDir {
    fn drop(&mut self) {
        let _ = std::fs::remove_dir_all(&self.path);
    }
}

pub fn app_state(dir: &TestDir, resolution: usize) -> web::Data<AppState> {
    let rasterizer = DensityRasterizer::new(RasterConfig {
        resolution,
        ..RasterConfig::default()
    })
    .unwrap();
    let density_cube = DensityCube::new(
        rasterizer,
        Arc::new(TaskStore::new()),
        Arc::new(PerformanceStore::new()),
    );
    web::Data::new(AppState {
        parser_registry: Arc::new(ParserRegistry::new()),
        resource_dir: dir.path.to_string_lossy().into_owned(),
        value_channel: "u".to_string(),
        density_cube: Arc::new(density_cube),
        probe: IntensityProbe::from_config(&ProbeConfig::default(), &PulseConfig::default()),
    })
}
