mod csv;

pub use csv::CsvParser;

/// 获取所有可用的解析器
pub fn get_all_parsers() -> Vec<Box<dyn crate::utils::parser::DatasetParser>> {
    vec![Box::new(CsvParser::new())]
}
