//! 粒子 -> 密度网格的高斯溅射（splatting）
//!
//! 每个粒子把自己的标量值按高斯权重累加到核半径内的体素上。
//! 并行执行时粒子按批次分组，每个工作线程写入私有网格，最后逐元素求和，
//! 因此不同粒子对同一体素的写入不会互相覆盖。

use std::sync::Arc;
use std::time::{Duration, Instant};

use glam::IVec3;
use rayon::prelude::*;
use tracing::debug;

use crate::config::RasterConfig;
use crate::dataset::PointDataset;
use crate::error::RebuildError;
use crate::kernel::KernelSizeMapper;
use crate::utils::voxel_grid::DensityGrid;

/// 单次光栅化的统计信息
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RasterStats {
    pub particle_count: usize,
    /// 因核尺寸超过上限而被排除的粒子数
    pub excluded_count: usize,
    pub batch_count: usize,
    pub kernel_time: Duration,
    pub splat_time: Duration,
}

/// 已经换算到体素空间的粒子
#[derive(Debug, Clone, Copy)]
struct Splat {
    voxel: IVec3,
    kernel: u32,
    weight: f32,
}

pub struct DensityRasterizer {
    config: RasterConfig,
    pool: Option<Arc<rayon::ThreadPool>>,
}

impl DensityRasterizer {
    /// 配置了 `threads` 时创建独立线程池，否则使用 rayon 全局线程池
    pub fn new(config: RasterConfig) -> Result<Self, RebuildError> {
        let pool = match config.threads {
            Some(threads) => Some(Arc::new(
                rayon::ThreadPoolBuilder::new()
                    .num_threads(threads)
                    .thread_name(|i| format!("density-raster-{}", i))
                    .build()?,
            )),
            None => None,
        };
        Ok(Self { config, pool })
    }

    pub fn config(&self) -> &RasterConfig {
        &self.config
    }

    /// 生成完整的密度网格
    /// 每次调用都从全零网格开始，不与旧结果合并
    pub fn rasterize(
        &self,
        dataset: &PointDataset,
    ) -> Result<(DensityGrid, RasterStats), RebuildError> {
        match &self.pool {
            Some(pool) => pool.install(|| self.rasterize_inner(dataset)),
            None => self.rasterize_inner(dataset),
        }
    }

    fn rasterize_inner(
        &self,
        dataset: &PointDataset,
    ) -> Result<(DensityGrid, RasterStats), RebuildError> {
        let resolution = self.config.resolution;
        let mut grid = DensityGrid::zeros(resolution)?;
        let mut stats = RasterStats {
            particle_count: dataset.len(),
            ..RasterStats::default()
        };

        // 第一步：计算每个粒子的体素位置与核尺寸
        let kernel_start = Instant::now();
        let bounds = dataset.bounds();
        let mapper = KernelSizeMapper::new(&self.config, bounds.side_length);
        let coef = self.config.coef_intensity;
        // 远离网格的粒子截断到该范围内，避免体素坐标溢出
        let margin = self.config.max_kernel as i32 + 1;
        let voxel_min = IVec3::splat(-margin);
        let voxel_max = IVec3::splat(resolution as i32 + margin);
        let splats: Vec<Splat> = dataset
            .particles()
            .par_iter()
            .map(|particle| {
                let normalized = bounds.normalize(particle.position);
                let kernel = if normalized.is_finite() {
                    mapper.kernel_size(particle.h)
                } else {
                    0
                };
                Splat {
                    voxel: (normalized * resolution as f32)
                        .floor()
                        .as_ivec3()
                        .clamp(voxel_min, voxel_max),
                    kernel,
                    weight: particle.value * coef,
                }
            })
            .collect();
        stats.excluded_count = splats.iter().filter(|s| s.kernel == 0).count();
        stats.kernel_time = kernel_start.elapsed();

        // 第二步：按批次并行溅射，每个线程持有私有网格，最后求和
        let splat_start = Instant::now();
        let batch_size = self.config.batch_size.max(1);
        stats.batch_count = splats.len().div_ceil(batch_size);
        let cells = grid.as_slice().len();
        if !splats.is_empty() {
            let accumulated = splats
                .par_chunks(batch_size)
                .fold(
                    || vec![0.0f32; cells],
                    |mut local, batch| {
                        for splat in batch {
                            self.splat_into(&mut local, splat);
                        }
                        local
                    },
                )
                .reduce(
                    || vec![0.0f32; cells],
                    |mut a, b| {
                        for (dst, src) in a.iter_mut().zip(&b) {
                            *dst += *src;
                        }
                        a
                    },
                );
            grid.as_mut_slice().copy_from_slice(&accumulated);
        }
        stats.splat_time = splat_start.elapsed();

        debug!(
            "光栅化完成: {} 个粒子, {} 个被排除, {} 批",
            stats.particle_count, stats.excluded_count, stats.batch_count
        );
        Ok((grid, stats))
    }

    /// 将单个粒子的高斯贡献累加到网格上
    fn splat_into(&self, grid: &mut [f32], splat: &Splat) {
        if splat.kernel == 0 || splat.weight == 0.0 {
            return;
        }
        let r = self.config.resolution as i32;
        let k = splat.kernel as i32;
        let lo = (splat.voxel - IVec3::splat(k)).max(IVec3::ZERO);
        let hi = (splat.voxel + IVec3::splat(k)).min(IVec3::splat(r - 1));
        if lo.cmpgt(hi).any() {
            return;
        }

        let k_sq = k * k;
        let inv_k = 1.0 / k as f32;
        let mu = self.config.mu;
        let inv_two_sigma_sq = 1.0 / (2.0 * self.config.sigma * self.config.sigma);

        for z in lo.z..=hi.z {
            let dz = z - splat.voxel.z;
            for y in lo.y..=hi.y {
                let dy = y - splat.voxel.y;
                let row = row_start(y, z, self.config.resolution);
                for x in lo.x..=hi.x {
                    let dx = x - splat.voxel.x;
                    let dist_sq = dx * dx + dy * dy + dz * dz;
                    if dist_sq > k_sq {
                        continue;
                    }
                    let t = (dist_sq as f32).sqrt() * inv_k - mu;
                    grid[row + x as usize] += (-t * t * inv_two_sigma_sq).exp() * splat.weight;
                }
            }
        }
    }
}

/// 第 (y, z) 行在扁平数组中的起始下标；y、z 已裁剪到网格内，非负
fn row_start(y: i32, z: i32, resolution: usize) -> usize {
    y as usize * resolution + z as usize * resolution * resolution
}

#[cfg(test)]
mod tests {
    use approx::assert_relative_eq;
    use glam::Vec3;

    use super::*;
    use crate::dataset::{Bounds, Particle};

    fn config(resolution: usize) -> RasterConfig {
        RasterConfig {
            resolution,
            ..RasterConfig::default()
        }
    }

    /// 单位立方体 [0, 1]³ 中的数据集
    fn unit_dataset(particles: Vec<Particle>) -> PointDataset {
        PointDataset::new(particles, Bounds::new(Vec3::ZERO, 1.0).unwrap())
    }

    fn particle(x: f32, y: f32, z: f32, h: f32, value: f32) -> Particle {
        Particle {
            position: Vec3::new(x, y, z),
            h,
            value,
        }
    }

    #[test]
    fn empty_dataset_gives_zero_grid() {
        let rasterizer = DensityRasterizer::new(config(16)).unwrap();
        let (grid, stats) = rasterizer.rasterize(&unit_dataset(Vec::new())).unwrap();
        assert!(grid.as_slice().iter().all(|v| *v == 0.0));
        assert_eq!(grid.as_slice().len(), 16 * 16 * 16);
        assert_eq!(stats.particle_count, 0);
        assert_eq!(stats.batch_count, 0);
    }

    #[test]
    fn row_start_does_not_wrap_for_large_grids() {
        assert_eq!(row_start(1, 2, 4), 4 + 32);
        let r = 1500usize;
        assert_eq!(row_start(1499, 1499, r), 1499 * r + 1499 * r * r);
    }

    #[test]
    fn outlier_particle_contributes_nothing() {
        let rasterizer = DensityRasterizer::new(config(64)).unwrap();
        // h = 0.5 -> 192 个体素 >= 150
        let dataset = unit_dataset(vec![particle(0.5, 0.5, 0.5, 0.5, 10.0)]);
        let (grid, stats) = rasterizer.rasterize(&dataset).unwrap();
        assert!(grid.as_slice().iter().all(|v| *v == 0.0));
        assert_eq!(stats.excluded_count, 1);
    }

    #[test]
    fn single_particle_peaks_at_center_and_falls_off_symmetrically() {
        let r = 32;
        let rasterizer = DensityRasterizer::new(config(r)).unwrap();
        // ceil(2 * 3 * 32 * 0.3) = 58 个体素，覆盖整个网格
        let dataset = unit_dataset(vec![particle(0.5, 0.5, 0.5, 0.3, 2.0)]);
        let (grid, _) = rasterizer.rasterize(&dataset).unwrap();

        let c = r / 2;
        let peak = grid.get(c, c, c).unwrap();
        assert_relative_eq!(peak, 2.0);
        assert!(grid.as_slice().iter().all(|v| *v <= peak));

        for d in 1..c {
            let axis = [
                grid.get(c + d, c, c).unwrap(),
                grid.get(c - d, c, c).unwrap(),
                grid.get(c, c + d, c).unwrap(),
                grid.get(c, c - d, c).unwrap(),
                grid.get(c, c, c + d).unwrap(),
                grid.get(c, c, c - d).unwrap(),
            ];
            for value in axis {
                assert_eq!(value, axis[0]);
            }
            assert!(axis[0] <= grid.get(c + d - 1, c, c).unwrap());
        }
        assert!(grid.get(c + 1, c, c).unwrap() < peak);
    }

    #[test]
    fn contribution_follows_gaussian_of_normalized_distance() {
        let rasterizer = DensityRasterizer::new(config(64)).unwrap();
        // h = 0.05 -> 核尺寸 20
        let dataset = unit_dataset(vec![particle(0.5, 0.5, 0.5, 0.05, 1.0)]);
        let (grid, _) = rasterizer.rasterize(&dataset).unwrap();
        let t: f32 = 3.0 / 20.0;
        let expected = (-t * t / (2.0 * 0.15 * 0.15)).exp();
        assert_relative_eq!(grid.get(35, 32, 32).unwrap(), expected, max_relative = 1e-5);
        // 核半径之外为 0
        assert_eq!(grid.get(32 + 21, 32, 32).unwrap(), 0.0);
    }

    #[test]
    fn overlapping_particles_accumulate() {
        let rasterizer = DensityRasterizer::new(config(32)).unwrap();
        let a = particle(0.5, 0.5, 0.5, 0.05, 1.0);
        let b = particle(0.55, 0.5, 0.5, 0.05, 3.0);

        let (grid_a, _) = rasterizer.rasterize(&unit_dataset(vec![a])).unwrap();
        let (grid_b, _) = rasterizer.rasterize(&unit_dataset(vec![b])).unwrap();
        let (both, _) = rasterizer.rasterize(&unit_dataset(vec![a, b])).unwrap();

        for i in 0..both.as_slice().len() {
            assert_relative_eq!(
                both.as_slice()[i],
                grid_a.as_slice()[i] + grid_b.as_slice()[i],
                epsilon = 1e-5
            );
        }
    }

    #[test]
    fn batching_does_not_change_result() {
        let particles: Vec<Particle> = (0..500)
            .map(|i| {
                let f = i as f32 / 500.0;
                particle(f, (f * 7.0).fract(), (f * 13.0).fract(), 0.02 + f * 0.03, 1.0 + f)
            })
            .collect();
        let dataset = unit_dataset(particles);

        let sequential = DensityRasterizer::new(RasterConfig {
            resolution: 24,
            batch_size: 500,
            threads: Some(1),
            ..RasterConfig::default()
        })
        .unwrap();
        let parallel = DensityRasterizer::new(RasterConfig {
            resolution: 24,
            batch_size: 7,
            threads: Some(4),
            ..RasterConfig::default()
        })
        .unwrap();

        let (a, stats_a) = sequential.rasterize(&dataset).unwrap();
        let (b, stats_b) = parallel.rasterize(&dataset).unwrap();
        assert_eq!(stats_a.batch_count, 1);
        assert_eq!(stats_b.batch_count, 72);
        for (x, y) in a.as_slice().iter().zip(b.as_slice()) {
            assert_relative_eq!(*x, *y, epsilon = 1e-3, max_relative = 1e-4);
        }
    }

    #[test]
    fn particles_near_the_edge_are_clipped() {
        let rasterizer = DensityRasterizer::new(config(16)).unwrap();
        let dataset = unit_dataset(vec![
            particle(0.0, 0.0, 0.0, 0.1, 1.0),
            particle(1.0, 1.0, 1.0, 0.1, 1.0),
            particle(5.0, 5.0, 5.0, 0.1, 1.0),
        ]);
        let (grid, stats) = rasterizer.rasterize(&dataset).unwrap();
        assert_eq!(stats.excluded_count, 0);
        assert_relative_eq!(grid.get(0, 0, 0).unwrap(), 1.0);
        // x = 1.0 落在体素 16，刚好在网格外，只有邻近体素受到影响
        assert!(grid.get(15, 15, 15).unwrap() > 0.0);
        assert!(grid.get(15, 15, 15).unwrap() < 1.0);
    }

    #[test]
    fn non_finite_positions_are_excluded() {
        let rasterizer = DensityRasterizer::new(config(8)).unwrap();
        let dataset = unit_dataset(vec![
            particle(f32::NAN, 0.5, 0.5, 0.1, 1.0),
            particle(f32::INFINITY, 0.5, 0.5, 0.1, 1.0),
        ]);
        let (grid, stats) = rasterizer.rasterize(&dataset).unwrap();
        assert_eq!(stats.excluded_count, 2);
        assert!(grid.as_slice().iter().all(|v| *v == 0.0));
    }

    #[test]
    fn coefficient_scales_contributions() {
        let rasterizer = DensityRasterizer::new(RasterConfig {
            resolution: 16,
            coef_intensity: 0.5,
            ..RasterConfig::default()
        })
        .unwrap();
        let dataset = unit_dataset(vec![particle(0.5, 0.5, 0.5, 0.0, 4.0)]);
        let (grid, _) = rasterizer.rasterize(&dataset).unwrap();
        assert_relative_eq!(grid.get(8, 8, 8).unwrap(), 2.0);
    }
}
