use std::io::{self, Write};

use glam::Vec3;

use crate::utils::voxel_grid::DensityGrid;

/// 网格在局部空间中的原点（立方体 [-0.5, 0.5]³ 的角点）
pub const FIELD_ORIGIN: Vec3 = Vec3::splat(-0.5);

/// 密度场：网格加上局部坐标查询
/// 构建完成后只读，重建时整体替换
#[derive(Debug, Clone)]
pub struct DensityField {
    grid: DensityGrid,
}

impl DensityField {
    pub fn new(grid: DensityGrid) -> Self {
        Self { grid }
    }

    pub fn resolution(&self) -> usize {
        self.grid.resolution()
    }

    pub fn grid(&self) -> &DensityGrid {
        &self.grid
    }

    /// 局部坐标 -> 体素索引，越界返回 None
    pub fn voxel_at(&self, local: Vec3) -> Option<[usize; 3]> {
        let r = self.grid.resolution() as f32;
        let cell = ((local - FIELD_ORIGIN) * r).floor();
        if !cell.is_finite() || cell.cmplt(Vec3::ZERO).any() || cell.cmpge(Vec3::splat(r)).any() {
            return None;
        }
        Some([cell.x as usize, cell.y as usize, cell.z as usize])
    }

    /// 最近体素采样，不做插值；立方体外返回 0
    pub fn sample_at(&self, local: Vec3) -> f32 {
        match self.voxel_at(local) {
            Some([x, y, z]) => self.grid.get(x, y, z).unwrap_or(0.0),
            None => 0.0,
        }
    }

    /// 展平数组，索引 x + y * R + z * R * R
    pub fn flattened(&self) -> &[f32] {
        self.grid.as_slice()
    }

    /// 文本导出：每个 X 切片一个标题，随后 R 行，每行是沿 Z 方向的一条 Y 行
    pub fn write_text_dump<W: Write>(&self, writer: &mut W) -> io::Result<()> {
        let r = self.grid.resolution();
        for x in 0..r {
            writeln!(writer, "###### X: {} ######", x)?;
            for y in 0..r {
                writer.write_all(b"{")?;
                for z in 0..r {
                    let value = self.grid.get(x, y, z).unwrap_or(0.0);
                    write!(writer, "{} ", value)?;
                }
                writer.write_all(b"},\n")?;
            }
            writeln!(writer)?;
        }
        Ok(())
    }

    pub fn text_dump(&self) -> io::Result<String> {
        let mut buffer = Vec::new();
        self.write_text_dump(&mut buffer)?;
        String::from_utf8(buffer).map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))
    }
}
