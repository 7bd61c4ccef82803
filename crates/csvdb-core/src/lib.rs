use std::path::Path;

use serde::{Deserialize, Serialize};

// 核心模块导出
pub mod driver;
pub mod error;
pub mod import;
pub mod manager;
pub mod observer;
pub mod pipeline;
pub mod reader;
pub mod schema;
pub mod sql;
pub mod transform;

pub use driver::{DatabaseDriver, DatabaseSession, DriverError, create_connection};
pub use error::ImportError;
pub use import::{ImportOptions, ImportSummary, TableName, import_data};
pub use manager::{DropOutcome, check_connection, connect, drop_table};
pub use observer::{ImportEvent, ImportObserver, RecordingObserver, TracingObserver};
pub use pipeline::{ImportPlan, run_import};
pub use reader::{Chunk, ChunkReader};
pub use schema::{CellValue, ColumnDef, ColumnKind};
pub use sql::Dialect;
pub use transform::{ColumnRef, ColumnTransform, TransformKind, digits_only};

/// 默认分块行数
pub const DEFAULT_CHUNK_SIZE: usize = 100_000;

/// 默认分隔符
pub const DEFAULT_DELIMITER: u8 = b';';

/// 单条 INSERT 语句包含的最大行数
pub const DEFAULT_INSERT_BATCH: usize = 1000;

/// 默认强制按文本读取的列（从 0 开始）
pub const DEFAULT_TEXT_COLUMN: usize = 13;

#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DataSourceKind {
    MySQL,
    SQLite,
    Postgres,
}

impl DataSourceKind {
    pub fn label(&self) -> &'static str {
        match self {
            DataSourceKind::MySQL => "MySQL",
            DataSourceKind::SQLite => "SQLite",
            DataSourceKind::Postgres => "PostgreSQL",
        }
    }

    pub fn dialect(&self) -> Dialect {
        match self {
            DataSourceKind::MySQL => Dialect::MySQL,
            DataSourceKind::SQLite => Dialect::SQLite,
            DataSourceKind::Postgres => Dialect::Postgres,
        }
    }
}

#[derive(Clone, Serialize, Deserialize)]
pub struct MySQLOptions {
    pub host: String,
    #[serde(default = "default_mysql_port")]
    pub port: String,
    pub username: String,
    pub password: String,
    pub database: String,
    #[serde(default)]
    pub use_tls: bool,
}

fn default_mysql_port() -> String {
    "3306".into()
}

impl Default for MySQLOptions {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".into(),
            port: default_mysql_port(),
            username: "root".into(),
            password: "".into(),
            database: String::new(),
            use_tls: false,
        }
    }
}

impl MySQLOptions {
    pub fn endpoint(&self) -> String {
        let scheme = if self.use_tls { "mysqls" } else { "mysql" };
        let db = self.database.trim();
        if db.is_empty() {
            format!("{}://{}:{}", scheme, self.host, self.port)
        } else {
            format!("{}://{}:{}/{}", scheme, self.host, self.port, db)
        }
    }
}

#[derive(Clone, Default, Serialize, Deserialize)]
pub struct SQLiteOptions {
    #[serde(default)]
    pub readonly: bool,
    pub filepath: String,
}

impl SQLiteOptions {
    pub fn endpoint(&self) -> String {
        let path = self.filepath.trim();
        if path.is_empty() {
            return "sqlite://<未配置文件>".into();
        }

        let name = Path::new(path)
            .file_name()
            .and_then(|name| name.to_str())
            .unwrap_or(path);

        if self.readonly {
            format!("sqlite://{}?mode=ro", name)
        } else {
            format!("sqlite://{}", name)
        }
    }
}

#[derive(Clone, Serialize, Deserialize)]
pub struct PostgresOptions {
    pub host: String,
    #[serde(default = "default_postgres_port")]
    pub port: String,
    pub database: String,
    pub username: String,
    pub password: String,
    #[serde(default)]
    pub use_tls: bool,
}

fn default_postgres_port() -> String {
    "5432".into()
}

impl Default for PostgresOptions {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".into(),
            port: default_postgres_port(),
            database: String::new(),
            username: "postgres".into(),
            password: "".into(),
            use_tls: false,
        }
    }
}

impl PostgresOptions {
    pub fn endpoint(&self) -> String {
        let db = self.database.trim();
        let suffix = if db.is_empty() {
            String::new()
        } else {
            format!("/{}", db)
        };
        format!("postgres://{}:{}{}", self.host, self.port, suffix)
    }
}

/// 连接描述，按后端区分
#[derive(Clone, Serialize, Deserialize)]
pub enum DataSourceOptions {
    MySQL(MySQLOptions),
    SQLite(SQLiteOptions),
    Postgres(PostgresOptions),
}

impl DataSourceOptions {
    pub fn kind(&self) -> DataSourceKind {
        match self {
            DataSourceOptions::MySQL(_) => DataSourceKind::MySQL,
            DataSourceOptions::SQLite(_) => DataSourceKind::SQLite,
            DataSourceOptions::Postgres(_) => DataSourceKind::Postgres,
        }
    }

    /// 不含密码的连接地址，用于日志
    pub fn endpoint(&self) -> String {
        match self {
            DataSourceOptions::MySQL(opts) => opts.endpoint(),
            DataSourceOptions::SQLite(opts) => opts.endpoint(),
            DataSourceOptions::Postgres(opts) => opts.endpoint(),
        }
    }
}
