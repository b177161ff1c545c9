use std::collections::HashMap;
use std::time::{Duration, Instant, SystemTime, UNIX_EPOCH};

use parking_lot::RwLock;
use serde::{Deserialize, Serialize};

/// 性能数据记录（一个重建阶段）
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PerformanceRecord {
    /// 开始时间 (Unix 时间戳，毫秒)
    pub start_time: u64,
    /// 结束时间 (Unix 时间戳，毫秒)
    pub end_time: u64,
    /// 阶段组，例如 "rebuild"
    pub channel_group: String,
    /// 阶段名，例如 "kernel_sizes"、"rasterize"、"commit"
    pub channel_index: String,
    /// 附加信息
    pub msg: String,
}

impl PerformanceRecord {
    /// 由结束时刻和耗时反推开始时间
    pub fn from_elapsed(
        channel_group: &str,
        channel_index: &str,
        elapsed: Duration,
        msg: String,
    ) -> Self {
        let end_time = get_unix_timestamp_ms();
        Self {
            start_time: end_time.saturating_sub(elapsed.as_millis() as u64),
            end_time,
            channel_group: channel_group.to_string(),
            channel_index: channel_index.to_string(),
            msg,
        }
    }
}

/// 性能数据存储
/// 按 task_id 存储性能记录
pub struct PerformanceStore {
    records: RwLock<HashMap<String, Vec<PerformanceRecord>>>,
    /// task_id -> 首条记录时间
    task_times: RwLock<HashMap<String, Instant>>,
    default_ttl: Duration,
}

impl PerformanceStore {
    pub fn new() -> Self {
        Self::with_ttl(Duration::from_secs(30 * 60))
    }

    pub fn with_ttl(ttl: Duration) -> Self {
        Self {
            records: RwLock::new(HashMap::new()),
            task_times: RwLock::new(HashMap::new()),
            default_ttl: ttl,
        }
    }

    /// 添加性能记录
    pub fn add_record(&self, task_id: &str, record: PerformanceRecord) {
        self.add_records(task_id, vec![record]);
    }

    /// 批量添加性能记录
    pub fn add_records(&self, task_id: &str, records: Vec<PerformanceRecord>) {
        let mut all_records = self.records.write();
        all_records
            .entry(task_id.to_string())
            .or_default()
            .extend(records);

        self.task_times
            .write()
            .entry(task_id.to_string())
            .or_insert_with(Instant::now);
    }

    /// 获取指定任务的所有性能记录
    pub fn get_records(&self, task_id: &str) -> Option<Vec<PerformanceRecord>> {
        self.records.read().get(task_id).cloned()
    }

    /// 清理过期的记录，返回清理的任务数量
    pub fn cleanup_expired(&self) -> usize {
        let now = Instant::now();
        let mut records = self.records.write();
        let mut task_times = self.task_times.write();
        let before_count = records.len();

        task_times.retain(|_, created_at| now.duration_since(*created_at) < self.default_ttl);
        records.retain(|task_id, _| task_times.contains_key(task_id));

        before_count - records.len()
    }
}

impl Default for PerformanceStore {
    fn default() -> Self {
        Self::new()
    }
}

/// 获取 Unix 时间戳（毫秒）
pub fn get_unix_timestamp_ms() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or(0)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn records_accumulate_per_task() {
        let store = PerformanceStore::new();
        let record = PerformanceRecord::from_elapsed(
            "rebuild",
            "rasterize",
            Duration::from_millis(40),
            String::new(),
        );
        assert_eq!(record.end_time - record.start_time, 40);

        store.add_record("a", record.clone());
        store.add_records("a", vec![record.clone(), record]);
        assert_eq!(store.get_records("a").unwrap().len(), 3);
        assert!(store.get_records("b").is_none());
    }

    #[test]
    fn expired_records_are_removed() {
        let store = PerformanceStore::with_ttl(Duration::ZERO);
        let record =
            PerformanceRecord::from_elapsed("rebuild", "commit", Duration::ZERO, String::new());
        store.add_record("a", record);
        assert_eq!(store.cleanup_expired(), 1);
        assert!(store.get_records("a").is_none());
    }
}
