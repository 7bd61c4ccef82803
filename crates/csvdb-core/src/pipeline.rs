use crate::{
    DataSourceOptions,
    error::ImportError,
    import::{ImportOptions, ImportSummary, TableName, import_data},
    manager::{connect, drop_table},
    observer::{ImportEvent, ImportObserver},
};

#[derive(Debug, Clone)]
pub struct ImportPlan {
    pub options: ImportOptions,
    /// 导入前先删除同名表
    pub drop_existing: bool,
}

impl ImportPlan {
    pub fn new(options: ImportOptions) -> Self {
        Self {
            options,
            drop_existing: true,
        }
    }
}

/// 完整的一次导入：连接、按需删表、分块导入。
///
/// 表名在连接之前校验。连接在函数返回时关闭。
pub fn run_import(
    source: &DataSourceOptions,
    plan: &ImportPlan,
    observer: &mut dyn ImportObserver,
) -> Result<ImportSummary, ImportError> {
    let options = &plan.options;
    if let Err(err) = TableName::parse(&options.table, options.strict_table_name) {
        observer.notify(&ImportEvent::ImportFailed {
            table: options.table.clone(),
            error: err.to_string(),
        });
        return Err(err);
    }

    let mut session = connect(source, observer)?;

    if plan.drop_existing {
        drop_table(session.as_mut(), &options.table, options.strict_table_name, observer)?;
    }

    import_data(session.as_mut(), options, observer)
}
