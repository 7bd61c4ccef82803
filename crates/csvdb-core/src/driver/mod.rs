use crate::{DataSourceOptions, sql::Dialect};

pub use mysql::MySQLDriver;
pub use postgres::PostgresDriver;
pub use sqlite::SQLiteDriver;

mod mysql;
mod postgres;
mod sqlite;

#[derive(Debug, thiserror::Error)]
pub enum DriverError {
    #[error("{0}")]
    Other(String),
    #[error("配置字段缺失: {0}")]
    MissingField(String),
    #[error("配置字段非法: {0}")]
    InvalidField(String),
    #[error("连接失败: {0}")]
    Connection(String),
    #[error("表已存在: {0}")]
    TableExists(String),
    #[error("违反约束: {0}")]
    Constraint(String),
}

pub trait DatabaseDriver {
    type Config;

    fn check_connection(
        &self,
        config: &Self::Config,
    ) -> Result<(), DriverError>;

    fn create_connection(
        &self,
        config: &Self::Config,
    ) -> Result<Box<dyn DatabaseSession>, DriverError>;
}

pub trait DatabaseSession: Send {
    fn dialect(&self) -> Dialect;

    /// 执行单条语句，返回影响行数
    fn exec(
        &mut self,
        sql: &str,
    ) -> Result<u64, DriverError>;

    /// 在同一个事务中依次执行，任一失败则整体回滚
    fn exec_batch(
        &mut self,
        statements: &[String],
    ) -> Result<(), DriverError>;

    fn table_exists(
        &mut self,
        table: &str,
    ) -> Result<bool, DriverError>;

    fn row_count(
        &mut self,
        table: &str,
    ) -> Result<u64, DriverError>;
}

pub fn check_connection(opts: &DataSourceOptions) -> Result<(), DriverError> {
    match opts {
        DataSourceOptions::MySQL(config) => MySQLDriver.check_connection(config),
        DataSourceOptions::SQLite(config) => SQLiteDriver.check_connection(config),
        DataSourceOptions::Postgres(config) => PostgresDriver.check_connection(config),
    }
}

pub fn create_connection(opts: &DataSourceOptions) -> Result<Box<dyn DatabaseSession>, DriverError> {
    match opts {
        DataSourceOptions::MySQL(config) => MySQLDriver.create_connection(config),
        DataSourceOptions::SQLite(config) => SQLiteDriver.create_connection(config),
        DataSourceOptions::Postgres(config) => PostgresDriver.create_connection(config),
    }
}

pub fn validate_sql(sql: &str) -> Result<(), DriverError> {
    if sql.trim().is_empty() {
        return Err(DriverError::InvalidField("sql".into()));
    }
    Ok(())
}

pub fn escape_quote(s: &str) -> String {
    s.replace('"', "\"\"")
}

pub fn escape_backtick(s: &str) -> String {
    s.replace('`', "``")
}

/// 网络连接前统一校验必填字段
pub(crate) fn require_fields(fields: &[(&str, &str)]) -> Result<(), DriverError> {
    for (name, value) in fields {
        if value.trim().is_empty() {
            return Err(DriverError::MissingField((*name).into()));
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{MySQLOptions, PostgresOptions};

    fn postgres(
        host: &str,
        username: &str,
        password: &str,
        database: &str,
    ) -> DataSourceOptions {
        DataSourceOptions::Postgres(PostgresOptions {
            host: host.into(),
            username: username.into(),
            password: password.into(),
            database: database.into(),
            ..Default::default()
        })
    }

    fn missing_field(opts: &DataSourceOptions) -> String {
        match create_connection(opts) {
            Err(DriverError::MissingField(field)) => field,
            Err(other) => panic!("期望字段缺失错误，实际: {other}"),
            Ok(_) => panic!("空字段不应建立连接"),
        }
    }

    #[test]
    fn postgres_rejects_each_empty_field() {
        assert_eq!(missing_field(&postgres("", "u", "p", "d")), "host");
        assert_eq!(missing_field(&postgres("h", "", "p", "d")), "username");
        assert_eq!(missing_field(&postgres("h", "u", "", "d")), "password");
        assert_eq!(missing_field(&postgres("h", "u", "p", "  ")), "database");
    }

    #[test]
    fn mysql_rejects_empty_password() {
        let opts = DataSourceOptions::MySQL(MySQLOptions {
            host: "h".into(),
            username: "u".into(),
            password: String::new(),
            database: "d".into(),
            ..Default::default()
        });
        assert_eq!(missing_field(&opts), "password");
        assert!(matches!(check_connection(&opts), Err(DriverError::MissingField(_))));
    }

    #[test]
    fn validate_sql_rejects_blank() {
        assert!(validate_sql("   ").is_err());
        assert!(validate_sql("SELECT 1").is_ok());
    }
}
