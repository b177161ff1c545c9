//! 光滑长度 h 到体素核尺寸的映射

use crate::config::RasterConfig;

/// 将粒子的光滑长度换算成体素空间的核半径
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct KernelSizeMapper {
    resolution: usize,
    side_length: f32,
    sigma_count: f32,
    min_kernel: u32,
    max_kernel: u32,
}

impl KernelSizeMapper {
    /// `side_length` 为数据集包围立方体的边长（原始物理单位）
    pub fn new(config: &RasterConfig, side_length: f32) -> Self {
        Self {
            resolution: config.resolution,
            side_length,
            sigma_count: config.sigma_count,
            min_kernel: config.min_kernel,
            max_kernel: config.max_kernel,
        }
    }

    /// 计算核尺寸：ceil(2 * sigma_count * R * h / L)
    ///
    /// 结果达到 `max_kernel` 的粒子视为离群值，返回 0（不参与光栅化）；
    /// 其余结果至少为 `min_kernel`。按 f32 先乘后除，整数边界处的取整与参考数据一致。
    pub fn kernel_size(&self, h: f32) -> u32 {
        if !h.is_finite() {
            return 0;
        }
        let voxels = (2.0 * self.sigma_count * self.resolution as f32 * h / self.side_length).ceil();
        if !voxels.is_finite() || voxels >= self.max_kernel as f32 {
            return 0;
        }
        (voxels.max(0.0) as u32).max(self.min_kernel)
    }
}
