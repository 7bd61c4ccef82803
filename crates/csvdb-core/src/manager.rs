use crate::{
    DataSourceOptions,
    driver::{self, DatabaseSession, DriverError},
    error::ImportError,
    import::TableName,
    observer::{ImportEvent, ImportObserver},
};

/// 删表结果；表不存在不是错误
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DropOutcome {
    Dropped,
    NotFound,
}

/// 建立数据库连接。必填字段在任何网络调用之前校验，失败时通知观察者后原样返回。
pub fn connect(
    opts: &DataSourceOptions,
    observer: &mut dyn ImportObserver,
) -> Result<Box<dyn DatabaseSession>, DriverError> {
    let endpoint = opts.endpoint();
    observer.notify(&ImportEvent::Connecting {
        endpoint: endpoint.clone(),
    });
    tracing::debug!("使用 {} 驱动", opts.kind().label());

    match driver::create_connection(opts) {
        Ok(session) => {
            observer.notify(&ImportEvent::Connected { endpoint });
            Ok(session)
        }
        Err(err) => {
            observer.notify(&ImportEvent::ConnectFailed {
                endpoint,
                error: err.to_string(),
            });
            Err(err)
        }
    }
}

/// 测试连接：连上并执行一次探测查询
pub fn check_connection(
    opts: &DataSourceOptions,
    observer: &mut dyn ImportObserver,
) -> Result<(), DriverError> {
    let endpoint = opts.endpoint();
    observer.notify(&ImportEvent::Connecting {
        endpoint: endpoint.clone(),
    });

    match driver::check_connection(opts) {
        Ok(()) => {
            observer.notify(&ImportEvent::Connected { endpoint });
            Ok(())
        }
        Err(err) => {
            observer.notify(&ImportEvent::ConnectFailed {
                endpoint,
                error: err.to_string(),
            });
            Err(err)
        }
    }
}

/// 删除目标表。表不存在时返回 [`DropOutcome::NotFound`]，按信息级别记录。
pub fn drop_table(
    session: &mut dyn DatabaseSession,
    name: &str,
    strict: bool,
    observer: &mut dyn ImportObserver,
) -> Result<DropOutcome, ImportError> {
    let result = TableName::parse(name, strict).and_then(|table| drop_existing(session, &table));

    match result {
        Ok(DropOutcome::Dropped) => {
            observer.notify(&ImportEvent::TableDropped { table: name.trim().into() });
            Ok(DropOutcome::Dropped)
        }
        Ok(DropOutcome::NotFound) => {
            observer.notify(&ImportEvent::TableNotFound { table: name.trim().into() });
            Ok(DropOutcome::NotFound)
        }
        Err(err) => {
            observer.notify(&ImportEvent::DropFailed {
                table: name.to_string(),
                error: err.to_string(),
            });
            Err(err)
        }
    }
}

fn drop_existing(
    session: &mut dyn DatabaseSession,
    table: &TableName,
) -> Result<DropOutcome, ImportError> {
    if !session.table_exists(table.as_str())? {
        return Ok(DropOutcome::NotFound);
    }
    let sql = session.dialect().drop_table(table.as_str());
    session.exec(&sql)?;
    Ok(DropOutcome::Dropped)
}
