//! 单次运行的事件通知。
//!
//! 连接、删表和导入都通过注入的 [`ImportObserver`] 报告进度与失败，
//! 不依赖全局日志配置。

use tracing::Level;

#[derive(Debug, Clone, PartialEq)]
pub enum ImportEvent {
    Connecting { endpoint: String },
    Connected { endpoint: String },
    ConnectFailed { endpoint: String, error: String },
    TableDropped { table: String },
    TableNotFound { table: String },
    DropFailed { table: String, error: String },
    TableCreated { table: String, columns: Vec<String> },
    ChunkWritten {
        index: usize,
        /// 分块第一行所在的文件行号
        first_line: u64,
        rows: usize,
        total_rows: u64,
    },
    ImportFinished { table: String, total_rows: u64, chunks: usize },
    ImportFailed { table: String, error: String },
}

impl ImportEvent {
    pub fn level(&self) -> Level {
        match self {
            ImportEvent::Connecting { .. } => Level::DEBUG,
            ImportEvent::ConnectFailed { .. } | ImportEvent::DropFailed { .. } | ImportEvent::ImportFailed { .. } => {
                Level::ERROR
            }
            _ => Level::INFO,
        }
    }

    pub fn message(&self) -> String {
        match self {
            ImportEvent::Connecting { endpoint } => format!("正在连接数据库: {}", endpoint),
            ImportEvent::Connected { endpoint } => format!("数据库连接成功: {}", endpoint),
            ImportEvent::ConnectFailed { endpoint, error } => {
                format!("无法连接数据库 {}，请检查连接信息后重试: {}", endpoint, error)
            }
            ImportEvent::TableDropped { table } => format!("表 {} 已删除", table),
            ImportEvent::TableNotFound { table } => format!("表 {} 不存在，无需删除", table),
            ImportEvent::DropFailed { table, error } => format!("删除表 {} 时发生错误: {}", table, error),
            ImportEvent::TableCreated { table, columns } => {
                format!("已创建表 {} ({})", table, columns.join(", "))
            }
            ImportEvent::ChunkWritten {
                first_line,
                rows,
                total_rows,
                ..
            } => format!("已导入 {} 行 (第 {} 行起 {} 行)", total_rows, first_line, rows),
            ImportEvent::ImportFinished {
                table,
                total_rows,
                chunks,
            } => format!("导入完成: 表 {}，共 {} 行，{} 个分块", table, total_rows, chunks),
            ImportEvent::ImportFailed { table, error } => format!("导入表 {} 失败: {}", table, error),
        }
    }
}

pub trait ImportObserver {
    fn notify(
        &mut self,
        event: &ImportEvent,
    );
}

impl<F> ImportObserver for F
where
    F: FnMut(&ImportEvent),
{
    fn notify(
        &mut self,
        event: &ImportEvent,
    ) {
        self(event)
    }
}

/// 把事件写入 tracing 日志
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingObserver;

impl ImportObserver for TracingObserver {
    fn notify(
        &mut self,
        event: &ImportEvent,
    ) {
        let message = event.message();
        match event.level() {
            Level::ERROR => tracing::error!("{}", message),
            Level::WARN => tracing::warn!("{}", message),
            Level::INFO => tracing::info!("{}", message),
            Level::DEBUG => tracing::debug!("{}", message),
            _ => tracing::trace!("{}", message),
        }
    }
}

/// 记录全部事件，供调用方在运行结束后检查
#[derive(Debug, Default)]
pub struct RecordingObserver {
    pub events: Vec<ImportEvent>,
}

impl RecordingObserver {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn at_level(
        &self,
        level: Level,
    ) -> impl Iterator<Item = &ImportEvent> {
        self.events.iter().filter(move |e| e.level() == level)
    }
}

impl ImportObserver for RecordingObserver {
    fn notify(
        &mut self,
        event: &ImportEvent,
    ) {
        self.events.push(event.clone());
    }
}
