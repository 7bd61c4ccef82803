use postgres::{Client, Config, Error as PostgresError, NoTls, error::SqlState};

use crate::{PostgresOptions, sql::Dialect};

use super::{DatabaseDriver, DatabaseSession, DriverError, escape_quote, require_fields, validate_sql};

#[derive(Debug, Clone, Copy)]
pub struct PostgresDriver;

impl DatabaseDriver for PostgresDriver {
    type Config = PostgresOptions;

    fn check_connection(
        &self,
        config: &Self::Config,
    ) -> Result<(), DriverError> {
        let mut client = open_conn(config)?;
        client
            .simple_query("SELECT 1")
            .map_err(|err| DriverError::Other(format!("校验查询失败: {}", err)))?;
        Ok(())
    }

    fn create_connection(
        &self,
        config: &Self::Config,
    ) -> Result<Box<dyn DatabaseSession>, DriverError> {
        let client = open_conn(config)?;
        Ok(Box::new(PostgresSession::new(client)))
    }
}

struct PostgresSession {
    client: Client,
}

impl PostgresSession {
    fn new(client: Client) -> Self {
        Self { client }
    }
}

impl DatabaseSession for PostgresSession {
    fn dialect(&self) -> Dialect {
        Dialect::Postgres
    }

    fn exec(
        &mut self,
        sql: &str,
    ) -> Result<u64, DriverError> {
        validate_sql(sql)?;
        self.client.execute(sql, &[]).map_err(map_pg_err)
    }

    fn exec_batch(
        &mut self,
        statements: &[String],
    ) -> Result<(), DriverError> {
        let mut tx = self
            .client
            .transaction()
            .map_err(|err| DriverError::Other(format!("开启事务失败: {}", err)))?;
        for sql in statements {
            validate_sql(sql)?;
            // 出错时 tx 被 drop，自动回滚
            tx.batch_execute(sql).map_err(map_pg_err)?;
        }
        tx.commit()
            .map_err(|err| DriverError::Other(format!("提交事务失败: {}", err)))
    }

    fn table_exists(
        &mut self,
        table: &str,
    ) -> Result<bool, DriverError> {
        let sql = "SELECT EXISTS (
            SELECT 1 FROM information_schema.tables
            WHERE table_schema = current_schema() AND table_name = $1
        )";
        let row = self
            .client
            .query_one(sql, &[&table])
            .map_err(|err| DriverError::Other(format!("查询表信息失败: {}", err)))?;
        Ok(row.get::<_, bool>(0))
    }

    fn row_count(
        &mut self,
        table: &str,
    ) -> Result<u64, DriverError> {
        let sql = format!("SELECT COUNT(*) FROM \"{}\"", escape_quote(table));
        let row = self
            .client
            .query_one(sql.as_str(), &[])
            .map_err(|err| DriverError::Other(format!("统计行数失败: {}", err)))?;
        Ok(row.get::<_, i64>(0) as u64)
    }
}

fn open_conn(config: &PostgresOptions) -> Result<Client, DriverError> {
    require_fields(&[
        ("host", &config.host),
        ("username", &config.username),
        ("password", &config.password),
        ("database", &config.database),
    ])?;
    if config.use_tls {
        return Err(DriverError::Other("PostgreSQL 暂未支持 TLS 连接".into()));
    }

    let port = config
        .port
        .trim()
        .parse()
        .map_err(|_| DriverError::InvalidField(format!("port: {}", config.port)))?;

    let mut pg_config = Config::new();
    pg_config.host(config.host.trim());
    pg_config.port(port);
    pg_config.user(config.username.trim());
    pg_config.password(config.password.as_str());
    pg_config.dbname(config.database.trim());

    pg_config
        .connect(NoTls)
        .map_err(|err| DriverError::Connection(err.to_string()))
}

fn map_pg_err(err: PostgresError) -> DriverError {
    match err.code() {
        Some(code) if *code == SqlState::DUPLICATE_TABLE => DriverError::TableExists(err.to_string()),
        Some(code)
            if *code == SqlState::UNIQUE_VIOLATION
                || *code == SqlState::NOT_NULL_VIOLATION
                || *code == SqlState::FOREIGN_KEY_VIOLATION
                || *code == SqlState::CHECK_VIOLATION =>
        {
            DriverError::Constraint(err.to_string())
        }
        _ => DriverError::Other(format!("执行失败: {}", err)),
    }
}
