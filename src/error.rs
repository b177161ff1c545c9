use thiserror::Error;

/// 数据集加载与校验错误
/// 所有这些错误都在光栅化开始之前报告，不接受部分数据集
#[derive(Error, Debug)]
pub enum DatasetError {
    #[error("读取数据文件失败: {0}")]
    Io(#[from] std::io::Error),

    #[error("第 {line} 行解析失败: {reason}")]
    Parse { line: usize, reason: String },

    #[error("缺少数据列 '{0}'")]
    MissingColumn(String),

    /// 并行数组不变量被破坏：所有列必须等长
    #[error("数据列 '{column}' 长度为 {got}，但期望 {expected}")]
    LengthMismatch {
        column: String,
        expected: usize,
        got: usize,
    },

    #[error("数据集空间范围无效: 边长 {0}")]
    DegenerateExtent(f32),

    #[error("不支持的文件格式: {0}")]
    UnsupportedFormat(String),
}

/// 配置错误（启动时致命）
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("读取配置文件失败: {0}")]
    Io(#[from] std::io::Error),

    #[error("配置文件格式错误: {0}")]
    Json(#[from] serde_json::Error),

    #[error("配置项 {field} 无效: {reason}")]
    Invalid { field: &'static str, reason: String },
}

/// 网格数据错误
#[derive(Error, Debug)]
pub enum GridError {
    #[error("数据量不匹配: 分辨率 {resolution} 需要 {expected} 个元素，但提供了 {got} 个")]
    LengthMismatch {
        resolution: usize,
        expected: usize,
        got: usize,
    },

    #[error("分辨率必须大于 0")]
    ZeroResolution,
}

/// 重建请求错误
#[derive(Error, Debug)]
pub enum RebuildError {
    /// 同一时间只允许一个重建任务写入网格
    #[error("已有重建任务 {task_id} 正在运行")]
    AlreadyRunning { task_id: String },

    #[error("重建线程异常退出: {0}")]
    WorkerPanicked(String),

    #[error("创建光栅化线程池失败: {0}")]
    ThreadPool(#[from] rayon::ThreadPoolBuildError),

    #[error("启动重建线程失败: {0}")]
    Spawn(#[from] std::io::Error),

    #[error(transparent)]
    Grid(#[from] GridError),
}
