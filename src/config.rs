use std::path::Path;
use std::time::Duration;

use glam::{Affine3A, Quat, Vec3};
use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

/// 网格分辨率上限（1024³ 个 f32 约 4 GiB）
pub const MAX_RESOLUTION: usize = 1024;

/// 服务配置，可从 JSON 文件加载；缺失的字段使用默认值
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServiceConfig {
    pub host: String,
    pub port: u16,
    /// 数据文件所在目录
    pub resource_dir: String,
    /// 默认被光栅化的标量列
    pub value_channel: String,
    /// 任务过期时间（秒）
    pub task_ttl_secs: u64,
    /// 后台清理间隔（秒）
    pub cleanup_interval_secs: u64,
    pub raster: RasterConfig,
    pub probe: ProbeConfig,
    pub pulse: PulseConfig,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 8080,
            resource_dir: "test/resource".to_string(),
            value_channel: "u".to_string(),
            task_ttl_secs: 30 * 60,
            cleanup_interval_secs: 5 * 60,
            raster: RasterConfig::default(),
            probe: ProbeConfig::default(),
            pulse: PulseConfig::default(),
        }
    }
}

impl ServiceConfig {
    /// 加载配置：未指定路径时使用默认配置
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let config = match path {
            Some(path) => {
                let text = std::fs::read_to_string(path)?;
                serde_json::from_str::<ServiceConfig>(&text)?
            }
            None => ServiceConfig::default(),
        };
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        self.raster.validate()?;
        self.probe.validate()?;
        if self.cleanup_interval_secs == 0 {
            return Err(invalid("cleanup_interval_secs", "必须大于 0"));
        }
        Ok(())
    }

    pub fn task_ttl(&self) -> Duration {
        Duration::from_secs(self.task_ttl_secs)
    }

    pub fn cleanup_interval(&self) -> Duration {
        Duration::from_secs(self.cleanup_interval_secs)
    }
}

/// 光栅化参数
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct RasterConfig {
    /// 立方体边长（体素数）R
    pub resolution: usize,
    /// 包含的标准差个数
    pub sigma_count: f32,
    /// 最小核尺寸（体素）
    pub min_kernel: u32,
    /// 离群上限：核尺寸达到该值的粒子不参与光栅化
    pub max_kernel: u32,
    /// 高斯均值（以核半径归一化）
    pub mu: f32,
    /// 高斯标准差（以核半径归一化）
    pub sigma: f32,
    pub coef_intensity: f32,
    /// 每批粒子数
    pub batch_size: usize,
    /// 光栅化线程数上限，None 时使用全局线程池
    pub threads: Option<usize>,
}

impl Default for RasterConfig {
    fn default() -> Self {
        Self {
            resolution: 64,
            sigma_count: 3.0,
            min_kernel: 3,
            max_kernel: 150,
            mu: 0.0,
            sigma: 0.15,
            coef_intensity: 1.0,
            batch_size: 1024,
            threads: None,
        }
    }
}

impl RasterConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.resolution == 0 {
            return Err(invalid("raster.resolution", "必须大于 0"));
        }
        if self.resolution > MAX_RESOLUTION {
            return Err(invalid(
                "raster.resolution",
                format!("不能超过 {}，得到 {}", MAX_RESOLUTION, self.resolution),
            ));
        }
        if self.batch_size == 0 {
            return Err(invalid("raster.batch_size", "必须大于 0"));
        }
        if self.threads == Some(0) {
            return Err(invalid("raster.threads", "必须大于 0"));
        }
        if !(self.sigma > 0.0) {
            return Err(invalid("raster.sigma", format!("必须为正数，得到 {}", self.sigma)));
        }
        if !(self.sigma_count > 0.0) {
            return Err(invalid(
                "raster.sigma_count",
                format!("必须为正数，得到 {}", self.sigma_count),
            ));
        }
        // 核尺寸 0 表示排除，存活粒子至少要覆盖一个体素
        if self.min_kernel == 0 {
            return Err(invalid("raster.min_kernel", "必须大于 0"));
        }
        if self.min_kernel >= self.max_kernel {
            return Err(invalid(
                "raster.min_kernel",
                format!(
                    "min_kernel ({}) 必须小于 max_kernel ({})",
                    self.min_kernel, self.max_kernel
                ),
            ));
        }
        Ok(())
    }
}

/// 立方体在世界空间中的摆放（局部 -> 世界）
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct ProbeConfig {
    pub center: [f32; 3],
    pub size: [f32; 3],
    /// 四元数 [x, y, z, w]
    pub rotation: [f32; 4],
}

impl Default for ProbeConfig {
    fn default() -> Self {
        Self {
            center: [0.0, 0.0, 0.0],
            size: [1.0, 1.0, 1.0],
            rotation: [0.0, 0.0, 0.0, 1.0],
        }
    }
}

impl ProbeConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.size.iter().any(|s| !(*s > 0.0) || !s.is_finite()) {
            return Err(invalid("probe.size", format!("各分量必须为正数，得到 {:?}", self.size)));
        }
        if Quat::from_array(self.rotation).length_squared() <= f32::EPSILON {
            return Err(invalid("probe.rotation", "四元数长度不能为 0"));
        }
        Ok(())
    }

    /// 局部空间 [-0.5, 0.5]³ 到世界空间的变换
    pub fn local_to_world(&self) -> Affine3A {
        Affine3A::from_scale_rotation_translation(
            Vec3::from_array(self.size),
            Quat::from_array(self.rotation).normalize(),
            Vec3::from_array(self.center),
        )
    }
}

/// 振动参数，振幅由采样密度决定
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct PulseConfig {
    /// 持续时间（秒）
    pub duration: f32,
    /// 频率（Hz）
    pub frequency: f32,
}

impl Default for PulseConfig {
    fn default() -> Self {
        Self {
            duration: 0.01,
            frequency: 150.0,
        }
    }
}

fn invalid(field: &'static str, reason: impl Into<String>) -> ConfigError {
    ConfigError::Invalid {
        field,
        reason: reason.into(),
    }
}
