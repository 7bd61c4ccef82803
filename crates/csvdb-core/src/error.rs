use std::{io, path::PathBuf};

use thiserror::Error;

use crate::driver::DriverError;

#[derive(Error, Debug)]
pub enum ImportError {
    #[error("表名不合法: {0:?}")]
    InvalidTableName(String),

    #[error("参数不合法: {0}")]
    InvalidOption(String),

    #[error("文件不存在: {}", .0.display())]
    FileNotFound(PathBuf),

    #[error("无法读取文件 {}: {source}", .path.display())]
    FileUnreadable {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("文件没有表头: {}", .0.display())]
    EmptyFile(PathBuf),

    #[error("第 {line} 行格式错误: {message}")]
    MalformedRow { line: u64, message: String },

    #[error("列不存在: {0}")]
    UnknownColumn(String),

    #[error("表已存在: {0}")]
    TableExists(String),

    #[error("违反约束: {0}")]
    Constraint(String),

    #[error(transparent)]
    Driver(DriverError),

    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    #[error("未知错误: {0}")]
    Unexpected(String),
}

impl From<DriverError> for ImportError {
    fn from(err: DriverError) -> Self {
        match err {
            DriverError::TableExists(message) => ImportError::TableExists(message),
            DriverError::Constraint(message) => ImportError::Constraint(message),
            other => ImportError::Driver(other),
        }
    }
}

impl From<csv::Error> for ImportError {
    fn from(err: csv::Error) -> Self {
        if err.is_io_error() {
            return ImportError::Io(io::Error::from(err));
        }

        let line = err.position().map(|pos| pos.line()).unwrap_or_default();
        match err.kind() {
            csv::ErrorKind::UnequalLengths { expected_len, len, .. } => ImportError::MalformedRow {
                line,
                message: format!("期望 {} 个字段，实际 {} 个", expected_len, len),
            },
            csv::ErrorKind::Utf8 { err: utf8, .. } => ImportError::MalformedRow {
                line,
                message: format!("非 UTF-8 内容: {}", utf8),
            },
            _ => ImportError::Unexpected(err.to_string()),
        }
    }
}
