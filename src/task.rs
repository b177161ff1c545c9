use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use parking_lot::RwLock;
use serde::Serialize;
use uuid::Uuid;

/// 重建完成后的摘要
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct RebuildReport {
    pub task_id: String,
    pub particle_count: usize,
    /// 因核尺寸超过上限被排除的粒子数
    pub excluded_count: usize,
    pub batch_count: usize,
    pub resolution: usize,
    pub elapsed_ms: u64,
}

/// 重建任务状态
#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum RebuildStatus {
    Running,
    Completed { report: RebuildReport },
    Failed { message: String },
}

/// 一次重建请求的记录
pub struct RebuildTask {
    /// 数据来源描述（文件名等）
    pub source: String,
    pub particle_count: usize,
    pub status: RwLock<RebuildStatus>,
    /// 任务创建时间，用于 TTL 过期检查
    pub created_at: Instant,
}

impl RebuildTask {
    pub fn new(source: String, particle_count: usize) -> Self {
        Self {
            source,
            particle_count,
            status: RwLock::new(RebuildStatus::Running),
            created_at: Instant::now(),
        }
    }

    pub fn set_status(&self, status: RebuildStatus) {
        *self.status.write() = status;
    }

    pub fn status(&self) -> RebuildStatus {
        self.status.read().clone()
    }

    pub fn is_running(&self) -> bool {
        matches!(*self.status.read(), RebuildStatus::Running)
    }
}

pub struct TaskStore {
    tasks: RwLock<HashMap<String, Arc<RebuildTask>>>,
    /// TTL（Time-To-Live）默认过期时间
    default_ttl: Duration,
}

impl TaskStore {
    pub fn new() -> Self {
        Self::with_ttl(Duration::from_secs(30 * 60))
    }

    /// 创建带自定义 TTL 的 TaskStore
    pub fn with_ttl(ttl: Duration) -> Self {
        Self {
            tasks: RwLock::new(HashMap::new()),
            default_ttl: ttl,
        }
    }

    pub fn insert(&self, task: RebuildTask) -> (String, Arc<RebuildTask>) {
        let task_id = Uuid::new_v4().to_string();
        let task = Arc::new(task);
        self.tasks.write().insert(task_id.clone(), task.clone());
        (task_id, task)
    }

    pub fn get(&self, task_id: &str) -> Option<Arc<RebuildTask>> {
        self.tasks.read().get(task_id).cloned()
    }

    /// 清理过期的任务（运行中的任务不清理）
    /// 返回清理的任务数量
    pub fn cleanup_expired(&self) -> usize {
        let now = Instant::now();
        let mut tasks = self.tasks.write();
        let before_count = tasks.len();

        tasks.retain(|_, task| {
            task.is_running() || now.duration_since(task.created_at) < self.default_ttl
        });

        before_count - tasks.len()
    }

    /// 获取当前任务数量
    pub fn task_count(&self) -> usize {
        self.tasks.read().len()
    }

    /// 获取默认 TTL
    pub fn default_ttl(&self) -> Duration {
        self.default_ttl
    }
}

impl Default for TaskStore {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn inserted_task_is_running() {
        let store = TaskStore::new();
        let (task_id, task) = store.insert(RebuildTask::new("a.csv".to_string(), 10));
        assert!(task.is_running());
        assert_eq!(store.get(&task_id).unwrap().source, "a.csv");
        assert_eq!(store.task_count(), 1);
    }

    #[test]
    fn cleanup_keeps_running_tasks() {
        let store = TaskStore::with_ttl(Duration::ZERO);
        let (_, running) = store.insert(RebuildTask::new("a.csv".to_string(), 1));
        let (_, done) = store.insert(RebuildTask::new("b.csv".to_string(), 1));
        done.set_status(RebuildStatus::Failed {
            message: "boom".to_string(),
        });

        assert_eq!(store.cleanup_expired(), 1);
        assert_eq!(store.task_count(), 1);
        assert!(running.is_running());
    }

    #[test]
    fn status_serializes_with_tag() {
        let json = serde_json::to_value(RebuildStatus::Running).unwrap();
        assert_eq!(json, serde_json::json!({ "status": "running" }));
    }
}
