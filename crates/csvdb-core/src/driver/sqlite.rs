use std::{fs, path::Path};

use rusqlite::{Connection, ErrorCode, OpenFlags};

use crate::{SQLiteOptions, sql::Dialect};

use super::{DatabaseDriver, DatabaseSession, DriverError, escape_quote, validate_sql};

#[derive(Debug, Clone, Copy)]
pub struct SQLiteDriver;

struct SQLiteConnection {
    conn: Connection,
}

impl SQLiteConnection {
    fn new(conn: Connection) -> Self {
        Self { conn }
    }
}

impl DatabaseSession for SQLiteConnection {
    fn dialect(&self) -> Dialect {
        Dialect::SQLite
    }

    fn exec(
        &mut self,
        sql: &str,
    ) -> Result<u64, DriverError> {
        validate_sql(sql)?;
        let affected = self.conn.execute(sql, []).map_err(map_sqlite_err)?;
        Ok(affected as u64)
    }

    fn exec_batch(
        &mut self,
        statements: &[String],
    ) -> Result<(), DriverError> {
        let tx = self
            .conn
            .transaction()
            .map_err(|err| DriverError::Other(format!("开启事务失败: {}", err)))?;
        for sql in statements {
            validate_sql(sql)?;
            tx.execute_batch(sql).map_err(map_sqlite_err)?;
        }
        tx.commit()
            .map_err(|err| DriverError::Other(format!("提交事务失败: {}", err)))
    }

    fn table_exists(
        &mut self,
        table: &str,
    ) -> Result<bool, DriverError> {
        let count = self
            .conn
            .query_row(
                "SELECT COUNT(*) FROM sqlite_master WHERE type = 'table' AND name = ?1 COLLATE NOCASE",
                [table],
                |row| row.get::<_, i64>(0),
            )
            .map_err(|err| DriverError::Other(format!("查询表信息失败: {}", err)))?;
        Ok(count > 0)
    }

    fn row_count(
        &mut self,
        table: &str,
    ) -> Result<u64, DriverError> {
        self.conn
            .query_row(
                &format!("SELECT COUNT(*) FROM \"{}\"", escape_quote(table)),
                [],
                |row| row.get::<_, i64>(0),
            )
            .map(|n| n as u64)
            .map_err(|err| DriverError::Other(format!("统计行数失败: {}", err)))
    }
}

impl DatabaseDriver for SQLiteDriver {
    type Config = SQLiteOptions;

    fn check_connection(
        &self,
        config: &Self::Config,
    ) -> Result<(), DriverError> {
        let conn = open_conn(config)?;
        conn.query_row("SELECT 1", [], |_| Ok::<_, rusqlite::Error>(()))
            .map_err(|err| DriverError::Other(format!("校验查询失败: {}", err)))?;
        Ok(())
    }

    fn create_connection(
        &self,
        config: &Self::Config,
    ) -> Result<Box<dyn DatabaseSession>, DriverError> {
        let conn = open_conn(config)?;
        Ok(Box::new(SQLiteConnection::new(conn)))
    }
}

fn open_conn(config: &SQLiteOptions) -> Result<Connection, DriverError> {
    let path_str = config.filepath.trim();
    if path_str.is_empty() {
        return Err(DriverError::MissingField("file_path".into()));
    }

    let path = Path::new(path_str);

    if config.readonly {
        if !path.exists() {
            return Err(DriverError::InvalidField("file_path 不存在".into()));
        }
    } else if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent).map_err(|err| DriverError::Other(format!("创建目录失败: {}", err)))?;
        }
    }

    let flags = if config.readonly {
        OpenFlags::SQLITE_OPEN_READ_ONLY
    } else {
        OpenFlags::SQLITE_OPEN_READ_WRITE | OpenFlags::SQLITE_OPEN_CREATE
    };

    Connection::open_with_flags(path, flags).map_err(|err| DriverError::Connection(format!("打开 SQLite 失败: {}", err)))
}

fn map_sqlite_err(err: rusqlite::Error) -> DriverError {
    match &err {
        rusqlite::Error::SqliteFailure(failure, _) if failure.code == ErrorCode::ConstraintViolation => {
            DriverError::Constraint(err.to_string())
        }
        // SQLite 对重复建表只返回通用错误码，只能按消息判断；
        // 语句在 prepare 阶段就会失败
        rusqlite::Error::SqlInputError { msg, .. } if msg.contains("already exists") => {
            DriverError::TableExists(msg.clone())
        }
        rusqlite::Error::SqliteFailure(_, Some(message)) if message.contains("already exists") => {
            DriverError::TableExists(message.clone())
        }
        _ => DriverError::Other(format!("执行失败: {}", err)),
    }
}
