use std::fs::File;
use std::io::{BufRead, BufReader, Read};

use flate2::read::GzDecoder;

use crate::dataset::ColumnTable;
use crate::error::DatasetError;
use crate::utils::parser::DatasetParser;

/// CSV 文件格式解析器
/// 第一行为列名，其余每行一个粒子；以 .gz 结尾的文件按 gzip 解压读取
pub struct CsvParser;

impl CsvParser {
    pub fn new() -> Self {
        CsvParser
    }

    fn open(file_path: &str) -> Result<BufReader<Box<dyn Read>>, DatasetError> {
        let file = File::open(file_path)?;
        let is_gzip = std::path::Path::new(file_path)
            .extension()
            .and_then(|ext| ext.to_str())
            .is_some_and(|ext| ext.eq_ignore_ascii_case("gz"));
        let reader: Box<dyn Read> = if is_gzip {
            Box::new(GzDecoder::new(file))
        } else {
            Box::new(file)
        };
        Ok(BufReader::new(reader))
    }

    fn parse_header(line: &str) -> Vec<String> {
        line.split(',')
            .map(|name| name.trim().trim_matches('"').to_string())
            .collect()
    }

    /// 从任意读取器解析
    pub fn parse_reader<R: BufRead>(reader: R) -> Result<ColumnTable, DatasetError> {
        let mut lines = reader.lines().enumerate();

        // 跳过开头的空行，第一行非空内容为表头
        let header = loop {
            match lines.next() {
                Some((_, line)) => {
                    let line = line?;
                    if !line.trim().is_empty() {
                        break Self::parse_header(&line);
                    }
                }
                None => return Ok(ColumnTable::new()),
            }
        };

        let mut columns: Vec<Vec<f32>> = vec![Vec::new(); header.len()];
        for (index, line) in lines {
            let line = line?;
            if line.trim().is_empty() {
                continue;
            }
            let line_number = index + 1;
            let cells: Vec<&str> = line.split(',').collect();
            if cells.len() != header.len() {
                return Err(DatasetError::Parse {
                    line: line_number,
                    reason: format!("应有 {} 列，但得到 {} 列", header.len(), cells.len()),
                });
            }
            for (column, cell) in columns.iter_mut().zip(cells) {
                // 支持科学计数法（如 1.46E-01）
                let value = cell.trim().parse::<f32>().map_err(|e| DatasetError::Parse {
                    line: line_number,
                    reason: format!("无法解析值 '{}': {}", cell.trim(), e),
                })?;
                column.push(value);
            }
        }

        let mut table = ColumnTable::new();
        for (name, values) in header.into_iter().zip(columns) {
            table.insert(name, values);
        }
        Ok(table)
    }
}

impl Default for CsvParser {
    fn default() -> Self {
        Self::new()
    }
}

impl DatasetParser for CsvParser {
    fn supported_extensions(&self) -> Vec<&'static str> {
        vec!["csv", "gz"]
    }

    fn name(&self) -> &'static str {
        "CSV Parser"
    }

    fn parse_from_file(&self, file_path: &str) -> Result<ColumnTable, DatasetError> {
        Self::parse_reader(Self::open(file_path)?)
    }

    fn get_columns_from_file(&self, file_path: &str) -> Result<Vec<String>, DatasetError> {
        let reader = Self::open(file_path)?;
        for line in reader.lines() {
            let line = line?;
            if !line.trim().is_empty() {
                return Ok(Self::parse_header(&line));
            }
        }
        Ok(Vec::new())
    }
}
