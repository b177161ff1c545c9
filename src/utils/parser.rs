use crate::dataset::ColumnTable;
use crate::error::DatasetError;

/// 粒子数据集解析器 trait
/// 不同文件格式需要实现这个 trait
pub trait DatasetParser: Send + Sync {
    /// 获取支持的文件扩展名（不含点号），例如: "csv"
    fn supported_extensions(&self) -> Vec<&'static str>;

    /// 检查文件扩展名是否被支持
    fn supports(&self, extension: &str) -> bool {
        self.supported_extensions()
            .iter()
            .any(|ext| ext.eq_ignore_ascii_case(extension))
    }

    /// 从文件路径解析全部数据列
    fn parse_from_file(&self, file_path: &str) -> Result<ColumnTable, DatasetError>;

    /// 快速获取文件的列名（只读取表头，不解析数据）
    /// 用于在加载前校验所需列是否存在
    fn get_columns_from_file(&self, file_path: &str) -> Result<Vec<String>, DatasetError>;

    /// 获取解析器名称（用于日志和错误信息）
    fn name(&self) -> &'static str;
}
