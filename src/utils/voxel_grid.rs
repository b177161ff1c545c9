use crate::error::GridError;

/// 密度网格数据结构
/// 表示 R×R×R 立方体上的标量场
#[derive(Debug, Clone, PartialEq)]
pub struct DensityGrid {
    /// 立方体边长 R
    resolution: usize,
    /// 数据数组，x 变化最快，y 其次，z 最慢
    /// 索引计算: index = x + y * R + z * R * R
    data: Vec<f32>,
}

impl DensityGrid {
    /// 创建全零网格
    pub fn zeros(resolution: usize) -> Result<Self, GridError> {
        if resolution == 0 {
            return Err(GridError::ZeroResolution);
        }
        Ok(DensityGrid {
            resolution,
            data: vec![0.0; resolution * resolution * resolution],
        })
    }

    /// 由展平数组重建网格
    pub fn from_flat(resolution: usize, data: Vec<f32>) -> Result<Self, GridError> {
        if resolution == 0 {
            return Err(GridError::ZeroResolution);
        }
        let expected = resolution * resolution * resolution;
        if data.len() != expected {
            return Err(GridError::LengthMismatch {
                resolution,
                expected,
                got: data.len(),
            });
        }
        Ok(DensityGrid { resolution, data })
    }

    #[inline]
    pub fn index(&self, x: usize, y: usize, z: usize) -> usize {
        x + y * self.resolution + z * self.resolution * self.resolution
    }

    /// 读取体素值，越界返回 None
    pub fn get(&self, x: usize, y: usize, z: usize) -> Option<f32> {
        let r = self.resolution;
        if x >= r || y >= r || z >= r {
            return None;
        }
        Some(self.data[self.index(x, y, z)])
    }

    pub fn resolution(&self) -> usize {
        self.resolution
    }

    /// 获取整个展平数据的引用
    pub fn as_slice(&self) -> &[f32] {
        &self.data
    }

    pub(crate) fn as_mut_slice(&mut self) -> &mut [f32] {
        &mut self.data
    }

    pub fn into_flat(self) -> Vec<f32> {
        self.data
    }
}
