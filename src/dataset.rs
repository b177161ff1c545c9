use std::collections::HashMap;

use glam::Vec3;

use crate::error::DatasetError;

/// 只读列存储接口
/// 核心模块只通过列名访问数据，不关心数据来源
pub trait ColumnSource: Send + Sync {
    /// 按名称获取整列数据
    fn column(&self, name: &str) -> Option<&[f32]>;

    /// 获取列的 (min, max)，忽略非有限值
    fn range(&self, name: &str) -> Option<(f32, f32)> {
        let values = self.column(name)?;
        values
            .iter()
            .copied()
            .filter(|v| v.is_finite())
            .fold(None, |acc, v| match acc {
                None => Some((v, v)),
                Some((min, max)) => Some((min.min(v), max.max(v))),
            })
    }
}

/// 内存中的列表格，由解析器产生
#[derive(Debug, Clone, Default)]
pub struct ColumnTable {
    names: Vec<String>,
    columns: HashMap<String, Vec<f32>>,
}

impl ColumnTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// 插入一列，同名列会被覆盖
    pub fn insert(&mut self, name: impl Into<String>, values: Vec<f32>) {
        let name = name.into();
        if !self.columns.contains_key(&name) {
            self.names.push(name.clone());
        }
        self.columns.insert(name, values);
    }

    /// 按插入顺序返回列名
    pub fn names(&self) -> &[String] {
        &self.names
    }
}

impl ColumnSource for ColumnTable {
    fn column(&self, name: &str) -> Option<&[f32]> {
        self.columns.get(name).map(|v| v.as_slice())
    }
}

/// 单个粒子样本，加载后不可变
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Particle {
    pub position: Vec3,
    /// 光滑长度（原始物理单位）
    pub h: f32,
    /// 被光栅化的标量
    pub value: f32,
}

/// 数据集包围立方体
/// 各轴最小值独立，边长统一取 x 轴范围（假定各向同性）
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Bounds {
    pub min: Vec3,
    pub side_length: f32,
}

impl Bounds {
    pub fn new(min: Vec3, side_length: f32) -> Result<Self, DatasetError> {
        if !side_length.is_finite() || side_length <= 0.0 || !min.is_finite() {
            return Err(DatasetError::DegenerateExtent(side_length));
        }
        Ok(Self { min, side_length })
    }

    /// 物理坐标 -> 单位立方体 [0, 1]³
    pub fn normalize(&self, position: Vec3) -> Vec3 {
        (position - self.min) / self.side_length
    }

    /// 物理坐标 -> 场的局部坐标 [-0.5, 0.5]³
    pub fn to_local(&self, position: Vec3) -> Vec3 {
        self.normalize(position) - Vec3::splat(0.5)
    }
}

/// 粒子数据集
#[derive(Debug, Clone)]
pub struct PointDataset {
    particles: Vec<Particle>,
    bounds: Bounds,
}

impl PointDataset {
    pub fn new(particles: Vec<Particle>, bounds: Bounds) -> Self {
        Self { particles, bounds }
    }

    /// 从列存储构建数据集
    /// 要求 x、y、z、h 以及标量列全部存在且等长
    pub fn from_columns(
        source: &dyn ColumnSource,
        value_channel: &str,
    ) -> Result<Self, DatasetError> {
        let names = ["x", "y", "z", "h", value_channel];
        let mut columns = Vec::with_capacity(names.len());
        for name in names {
            let column = source
                .column(name)
                .ok_or_else(|| DatasetError::MissingColumn(name.to_string()))?;
            columns.push(column);
        }

        let expected = columns[0].len();
        for (name, column) in names.iter().zip(&columns) {
            if column.len() != expected {
                return Err(DatasetError::LengthMismatch {
                    column: name.to_string(),
                    expected,
                    got: column.len(),
                });
            }
        }

        let bounds = if expected == 0 {
            Bounds::new(Vec3::ZERO, 1.0)?
        } else {
            let range = |name: &str| {
                source
                    .range(name)
                    .ok_or(DatasetError::DegenerateExtent(f32::NAN))
            };
            let (min_x, max_x) = range("x")?;
            let (min_y, _) = range("y")?;
            let (min_z, _) = range("z")?;
            Bounds::new(Vec3::new(min_x, min_y, min_z), max_x - min_x)?
        };

        let [xs, ys, zs, hs, values] = [columns[0], columns[1], columns[2], columns[3], columns[4]];
        let particles = (0..expected)
            .map(|i| Particle {
                position: Vec3::new(xs[i], ys[i], zs[i]),
                h: hs[i],
                value: values[i],
            })
            .collect();

        Ok(Self { particles, bounds })
    }

    pub fn particles(&self) -> &[Particle] {
        &self.particles
    }

    pub fn bounds(&self) -> Bounds {
        self.bounds
    }

    pub fn len(&self) -> usize {
        self.particles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.particles.is_empty()
    }
}
