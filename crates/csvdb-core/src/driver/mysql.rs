use mysql::{Conn, Error as MySqlError, Opts, OptsBuilder, SslOpts, TxOpts, prelude::Queryable};

use crate::{MySQLOptions, sql::Dialect};

use super::{DatabaseDriver, DatabaseSession, DriverError, escape_backtick, require_fields, validate_sql};

// 参考: https://dev.mysql.com/doc/mysql-errors/8.0/en/server-error-reference.html
const ER_TABLE_EXISTS_ERROR: u16 = 1050;
const ER_DUP_ENTRY: u16 = 1062;
const ER_BAD_NULL_ERROR: u16 = 1048;

#[derive(Debug, Clone, Copy)]
pub struct MySQLDriver;

impl DatabaseDriver for MySQLDriver {
    type Config = MySQLOptions;

    fn check_connection(
        &self,
        config: &Self::Config,
    ) -> Result<(), DriverError> {
        let mut conn = open_conn(config)?;
        conn.ping()
            .map_err(|err| DriverError::Other(format!("ping 失败: {}", err)))?;
        Ok(())
    }

    fn create_connection(
        &self,
        config: &Self::Config,
    ) -> Result<Box<dyn DatabaseSession>, DriverError> {
        let conn = open_conn(config)?;
        Ok(Box::new(MySQLSession::new(conn)))
    }
}

struct MySQLSession {
    conn: Conn,
}

impl MySQLSession {
    fn new(conn: Conn) -> Self {
        Self { conn }
    }
}

impl DatabaseSession for MySQLSession {
    fn dialect(&self) -> Dialect {
        Dialect::MySQL
    }

    fn exec(
        &mut self,
        sql: &str,
    ) -> Result<u64, DriverError> {
        validate_sql(sql)?;
        self.conn.query_drop(sql).map_err(map_mysql_err)?;
        Ok(self.conn.affected_rows())
    }

    fn exec_batch(
        &mut self,
        statements: &[String],
    ) -> Result<(), DriverError> {
        let mut tx = self
            .conn
            .start_transaction(TxOpts::default())
            .map_err(|err| DriverError::Other(format!("开启事务失败: {}", err)))?;
        for sql in statements {
            validate_sql(sql)?;
            tx.query_drop(sql).map_err(map_mysql_err)?;
        }
        tx.commit()
            .map_err(|err| DriverError::Other(format!("提交事务失败: {}", err)))
    }

    fn table_exists(
        &mut self,
        table: &str,
    ) -> Result<bool, DriverError> {
        let sql = "SELECT COUNT(*) FROM information_schema.tables
            WHERE table_schema = DATABASE() AND table_name = ?";
        let count = self
            .conn
            .exec_first::<u64, _, _>(sql, (table.to_string(),))
            .map_err(|err| DriverError::Other(format!("查询表信息失败: {}", err)))?;
        Ok(count.unwrap_or(0) > 0)
    }

    fn row_count(
        &mut self,
        table: &str,
    ) -> Result<u64, DriverError> {
        let sql = format!("SELECT COUNT(*) FROM `{}`", escape_backtick(table));
        let count = self
            .conn
            .query_first::<u64, _>(sql)
            .map_err(|err| DriverError::Other(format!("统计行数失败: {}", err)))?;
        Ok(count.unwrap_or(0))
    }
}

fn open_conn(config: &MySQLOptions) -> Result<Conn, DriverError> {
    require_fields(&[
        ("host", &config.host),
        ("username", &config.username),
        ("password", &config.password),
        ("database", &config.database),
    ])?;

    let port = config
        .port
        .trim()
        .parse::<u16>()
        .map_err(|_| DriverError::InvalidField(format!("port: {}", config.port)))?;

    let mut builder = OptsBuilder::new();
    builder = builder.ip_or_hostname(Some(config.host.trim().to_string()));
    builder = builder.tcp_port(port);
    builder = builder.user(Some(config.username.clone()));
    builder = builder.pass(Some(config.password.clone()));
    builder = builder.db_name(Some(config.database.trim().to_string()));

    if config.use_tls {
        builder = builder.ssl_opts(Some(SslOpts::default()));
    }
    let opts = Opts::from(builder);
    Conn::new(opts).map_err(|err| DriverError::Connection(err.to_string()))
}

fn map_mysql_err(err: MySqlError) -> DriverError {
    match &err {
        MySqlError::MySqlError(server) if server.code == ER_TABLE_EXISTS_ERROR => {
            DriverError::TableExists(server.message.clone())
        }
        MySqlError::MySqlError(server) if server.code == ER_DUP_ENTRY || server.code == ER_BAD_NULL_ERROR => {
            DriverError::Constraint(server.message.clone())
        }
        _ => DriverError::Other(format!("执行失败: {}", err)),
    }
}
