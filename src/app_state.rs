use std::sync::Arc;

use crate::probe::IntensityProbe;
use crate::rebuild::DensityCube;
use crate::utils::parser_registry::ParserRegistry;

/// 全局应用状态，负责在各个 handler 之间共享解析器、密度立方体与资源目录
pub struct AppState {
    pub parser_registry: Arc<ParserRegistry>,
    pub resource_dir: String,
    /// 未指定时使用的标量列
    pub value_channel: String,
    pub density_cube: Arc<DensityCube>,
    pub probe: IntensityProbe,
}
