use std::error::Error;
use std::fs;
use std::io::stderr;
use std::path::{Path, PathBuf};
use std::process::exit;

use chrono::Utc;
use clap::Parser;
use serde::{Deserialize, Serialize};
use tracing_appender::{non_blocking, rolling::never};
use tracing_subscriber::{EnvFilter, fmt::layer, layer::SubscriberExt, util::SubscriberInitExt};
use uuid::Uuid;

use csvdb_core::{
    ColumnRef, ColumnTransform, DEFAULT_CHUNK_SIZE, DEFAULT_INSERT_BATCH, DEFAULT_TEXT_COLUMN, DataSourceOptions,
    ImportError, ImportOptions, ImportPlan,
};

mod check;
mod import;

#[derive(Debug, Parser)]
#[command(name = "csvdb-task", version, about = "分块导入 CSV 文件到数据库")]
struct Args {
    /// 任务目录，包含 config.json，日志写入 task.log
    #[arg(long)]
    task_dir: PathBuf,
}

/// 操作类型
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Operation {
    Check,  // 测试连接
    Import, // CSV -> DB
}

/// 导入配置
#[derive(Debug, Deserialize)]
pub struct ImportConfig {
    pub file: PathBuf,
    pub table: String,
    #[serde(default = "default_delimiter")]
    pub delimiter: String,
    #[serde(default = "default_chunk_size")]
    pub chunk_size: usize,
    #[serde(default = "default_insert_batch_size")]
    pub insert_batch: usize,
    #[serde(default = "default_text_columns")]
    pub text_columns: Vec<ColumnRef>,
    #[serde(default)]
    pub transforms: Vec<ColumnTransform>,
    #[serde(default = "default_drop_existing")]
    pub drop_existing: bool,
    #[serde(default)]
    pub strict_table_name: bool,
}

fn default_delimiter() -> String {
    ";".into()
}

fn default_chunk_size() -> usize {
    DEFAULT_CHUNK_SIZE
}

fn default_insert_batch_size() -> usize {
    DEFAULT_INSERT_BATCH
}

fn default_text_columns() -> Vec<ColumnRef> {
    vec![ColumnRef::Index(DEFAULT_TEXT_COLUMN)]
}

fn default_drop_existing() -> bool {
    true
}

impl ImportConfig {
    pub fn plan(&self) -> Result<ImportPlan, ImportError> {
        let delimiter = match self.delimiter.as_bytes() {
            [byte] => *byte,
            _ => {
                return Err(ImportError::InvalidOption(format!(
                    "分隔符必须是单个字节: {:?}",
                    self.delimiter
                )));
            }
        };

        Ok(ImportPlan {
            options: ImportOptions {
                delimiter,
                chunk_size: self.chunk_size,
                insert_batch: self.insert_batch,
                text_columns: self.text_columns.clone(),
                transforms: self.transforms.clone(),
                strict_table_name: self.strict_table_name,
                ..ImportOptions::new(&self.file, &self.table)
            },
            drop_existing: self.drop_existing,
        })
    }
}

/// 统一的任务配置
#[derive(Deserialize)]
pub struct TaskConfig {
    #[serde(default = "new_task_id")]
    pub task_id: String,
    pub operation: Operation,
    #[serde(default = "now")]
    pub created_at: String,
    pub source: DataSourceOptions,

    // 仅 import 操作需要
    #[serde(default)]
    pub import: Option<ImportConfig>,
}

fn new_task_id() -> String {
    Uuid::new_v4().to_string()
}

fn now() -> String {
    Utc::now().to_rfc3339()
}

/// 进度输出消息（写入 stdout 的 JSON Lines）
#[derive(Debug, Serialize)]
pub struct ProgressMessage {
    kind: MessageKind,
    data: serde_json::Value,
}

/// 消息类型
#[derive(Debug, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum MessageKind {
    Progress,
    Status,
    Error,
    Completed,
}

/// 初始化任务日志系统；stdout 只留给 JSON Lines
fn init_task_logging(task_dir: &Path) -> non_blocking::WorkerGuard {
    let log_file = never(task_dir, "task.log");
    let (non_blocking, guard) = non_blocking(log_file);
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    tracing_subscriber::registry()
        .with(filter)
        .with(layer().with_writer(stderr))
        .with(layer().with_writer(non_blocking).with_ansi(false))
        .init();

    guard
}

fn main() {
    // 1. 解析命令行参数
    let args = Args::parse();
    let task_dir = args.task_dir;
    if let Err(e) = fs::create_dir_all(&task_dir) {
        print_error("fatal", &format!("无法创建任务目录: {}", e));
        exit(1);
    }

    // 2. 初始化日志系统
    let _log_guard = init_task_logging(&task_dir);
    tracing::info!("任务进程启动，task_dir: {:?}", task_dir);

    // 3. 读取并解析任务配置
    let config = match load_config(&task_dir.join("config.json")) {
        Ok(cfg) => cfg,
        Err(e) => {
            report_fatal(&e.to_string());
            exit(1);
        }
    };
    tracing::info!(
        "任务配置解析成功: task_id={}, operation={:?}, created_at={}",
        config.task_id,
        config.operation,
        config.created_at
    );

    // 4. 根据 operation 分发处理
    let result = match config.operation {
        Operation::Check => check::run(&config.source),
        Operation::Import => match config.import.as_ref() {
            Some(import_config) => import::run(&config.source, import_config),
            None => Err(ImportError::InvalidOption("import 配置缺失".into())),
        },
    };

    if let Err(e) = result {
        report_fatal(&e.to_string());
        exit(1);
    }
}

/// 失败同时写入任务日志和 stdout
fn report_fatal(message: &str) {
    tracing::error!("任务失败: {}", message);
    print_error("fatal", message);
}

fn load_config(path: &Path) -> Result<TaskConfig, Box<dyn Error>> {
    let content = fs::read_to_string(path).map_err(|e| format!("无法读取配置文件: {}", e))?;
    let config = serde_json::from_str(&content).map_err(|e| format!("配置文件格式错误: {}", e))?;
    Ok(config)
}

pub fn print_error(
    severity: &str,
    message: &str,
) {
    print_progress(ProgressMessage {
        kind: MessageKind::Error,
        data: serde_json::json!({
            "severity": severity,
            "message": message,
        }),
    });
}

pub fn print_status(message: &str) {
    print_progress(ProgressMessage {
        kind: MessageKind::Status,
        data: serde_json::json!({ "message": message }),
    });
}

pub fn print_completed(data: serde_json::Value) {
    print_progress(ProgressMessage {
        kind: MessageKind::Completed,
        data,
    });
}

pub fn print_progress(msg: ProgressMessage) {
    if let Ok(json) = serde_json::to_string(&msg) {
        println!("{}", json);
    }
}
