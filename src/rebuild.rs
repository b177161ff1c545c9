//! 密度场重建调度
//!
//! 重建在独立线程上运行，完成后整体替换当前密度场。
//! 读者要么看到完整的旧场，要么看到完整的新场。

use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::Instant;

use parking_lot::{Mutex, RwLock};
use tracing::{info, warn};

use crate::dataset::PointDataset;
use crate::error::RebuildError;
use crate::field::DensityField;
use crate::performance::{PerformanceRecord, PerformanceStore};
use crate::rasterizer::DensityRasterizer;
use crate::task::{RebuildReport, RebuildStatus, RebuildTask, TaskStore};

/// 重建完成句柄
pub struct RebuildHandle {
    task_id: String,
    join: JoinHandle<Result<RebuildReport, RebuildError>>,
}

impl RebuildHandle {
    pub fn task_id(&self) -> &str {
        &self.task_id
    }

    pub fn is_finished(&self) -> bool {
        self.join.is_finished()
    }

    /// 阻塞等待重建结束
    pub fn wait(self) -> Result<RebuildReport, RebuildError> {
        self.join
            .join()
            .map_err(|payload| RebuildError::WorkerPanicked(panic_message(payload.as_ref())))?
    }
}

/// 运行中标记，析构时释放
struct ActiveGuard {
    slot: Arc<Mutex<Option<String>>>,
}

impl Drop for ActiveGuard {
    fn drop(&mut self) {
        *self.slot.lock() = None;
    }
}

/// 密度立方体：持有当前密度场并负责重建
pub struct DensityCube {
    rasterizer: Arc<DensityRasterizer>,
    field: Arc<RwLock<Option<Arc<DensityField>>>>,
    tasks: Arc<TaskStore>,
    performance: Arc<PerformanceStore>,
    /// 正在运行的任务 id
    active: Arc<Mutex<Option<String>>>,
}

impl DensityCube {
    pub fn new(
        rasterizer: DensityRasterizer,
        tasks: Arc<TaskStore>,
        performance: Arc<PerformanceStore>,
    ) -> Self {
        Self {
            rasterizer: Arc::new(rasterizer),
            field: Arc::new(RwLock::new(None)),
            tasks,
            performance,
            active: Arc::new(Mutex::new(None)),
        }
    }

    pub fn resolution(&self) -> usize {
        self.rasterizer.config().resolution
    }

    /// 当前密度场快照；克隆 Arc 后即可无锁采样
    pub fn current(&self) -> Option<Arc<DensityField>> {
        self.field.read().clone()
    }

    pub fn running_task(&self) -> Option<String> {
        self.active.lock().clone()
    }

    pub fn tasks(&self) -> &TaskStore {
        &self.tasks
    }

    pub fn performance(&self) -> &PerformanceStore {
        &self.performance
    }

    /// 占用重建槽位并登记任务；已有重建运行时拒绝
    fn begin(
        &self,
        source: &str,
        particle_count: usize,
    ) -> Result<(String, Arc<RebuildTask>, ActiveGuard), RebuildError> {
        let mut active = self.active.lock();
        if let Some(task_id) = active.as_ref() {
            return Err(RebuildError::AlreadyRunning {
                task_id: task_id.clone(),
            });
        }
        let (task_id, task) = self
            .tasks
            .insert(RebuildTask::new(source.to_string(), particle_count));
        *active = Some(task_id.clone());
        let guard = ActiveGuard {
            slot: self.active.clone(),
        };
        Ok((task_id, task, guard))
    }

    /// 请求一次完整重建，立即返回完成句柄
    pub fn request_rebuild(
        &self,
        source: &str,
        dataset: PointDataset,
    ) -> Result<RebuildHandle, RebuildError> {
        let (task_id, task, guard) = self.begin(source, dataset.len())?;
        info!(
            "重建任务 {} 开始: 来源 {}, {} 个粒子, 分辨率 {}",
            task_id,
            source,
            dataset.len(),
            self.resolution()
        );

        let rasterizer = self.rasterizer.clone();
        let slot = self.field.clone();
        let performance = self.performance.clone();
        let worker_task = task.clone();
        let worker_id = task_id.clone();

        let spawned = std::thread::Builder::new()
            .name("density-rebuild".to_string())
            .spawn(move || {
                let _guard = guard;
                let result = panic::catch_unwind(AssertUnwindSafe(|| {
                    run_rebuild(&worker_id, &rasterizer, &dataset, &slot, &performance)
                }))
                .unwrap_or_else(|payload| {
                    Err(RebuildError::WorkerPanicked(panic_message(payload.as_ref())))
                });

                match &result {
                    Ok(report) => worker_task.set_status(RebuildStatus::Completed {
                        report: report.clone(),
                    }),
                    Err(e) => {
                        warn!("重建任务 {} 失败: {}", worker_id, e);
                        worker_task.set_status(RebuildStatus::Failed {
                            message: e.to_string(),
                        });
                    }
                }
                result
            });

        match spawned {
            Ok(join) => Ok(RebuildHandle { task_id, join }),
            Err(e) => {
                task.set_status(RebuildStatus::Failed {
                    message: e.to_string(),
                });
                Err(RebuildError::Spawn(e))
            }
        }
    }
}

fn run_rebuild(
    task_id: &str,
    rasterizer: &DensityRasterizer,
    dataset: &PointDataset,
    slot: &RwLock<Option<Arc<DensityField>>>,
    performance: &PerformanceStore,
) -> Result<RebuildReport, RebuildError> {
    let start = Instant::now();
    let (grid, stats) = rasterizer.rasterize(dataset)?;

    // 新网格完整生成后才替换
    let commit_start = Instant::now();
    let resolution = grid.resolution();
    let field = Arc::new(DensityField::new(grid));
    *slot.write() = Some(field);
    let commit_time = commit_start.elapsed();

    performance.add_records(
        task_id,
        vec![
            PerformanceRecord::from_elapsed(
                "rebuild",
                "kernel_sizes",
                stats.kernel_time,
                format!("{} 个粒子被排除", stats.excluded_count),
            ),
            PerformanceRecord::from_elapsed(
                "rebuild",
                "rasterize",
                stats.splat_time,
                format!("{} 个粒子, {} 批", stats.particle_count, stats.batch_count),
            ),
            PerformanceRecord::from_elapsed("rebuild", "commit", commit_time, String::new()),
        ],
    );

    let report = RebuildReport {
        task_id: task_id.to_string(),
        particle_count: stats.particle_count,
        excluded_count: stats.excluded_count,
        batch_count: stats.batch_count,
        resolution,
        elapsed_ms: start.elapsed().as_millis() as u64,
    };
    if report.excluded_count > 0 {
        warn!(
            "重建任务 {}: {} 个粒子核尺寸超过上限，已排除",
            task_id, report.excluded_count
        );
    }
    info!(
        "重建任务 {} 完成，耗时 {}ms，新密度场已生效",
        task_id, report.elapsed_ms
    );
    Ok(report)
}

fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        message.to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "未知错误".to_string()
    }
}
