use std::{
    path::PathBuf,
    time::{Duration, Instant},
};

use crate::{
    DEFAULT_CHUNK_SIZE, DEFAULT_DELIMITER, DEFAULT_INSERT_BATCH, DEFAULT_TEXT_COLUMN,
    driver::DatabaseSession,
    error::ImportError,
    observer::{ImportEvent, ImportObserver},
    reader::{Chunk, ChunkReader},
    schema::{ColumnDef, coerce_rows, infer_columns},
    transform::{self, ColumnRef, ColumnTransform},
};

/// 校验过的目标表名
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TableName(String);

impl TableName {
    /// 表名不能为空；`strict` 时还不允许包含空白字符
    pub fn parse(
        name: &str,
        strict: bool,
    ) -> Result<Self, ImportError> {
        let trimmed = name.trim();
        if trimmed.is_empty() {
            return Err(ImportError::InvalidTableName(name.to_string()));
        }
        if strict && trimmed.chars().any(char::is_whitespace) {
            return Err(ImportError::InvalidTableName(name.to_string()));
        }
        Ok(Self(trimmed.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for TableName {
    fn fmt(
        &self,
        f: &mut std::fmt::Formatter<'_>,
    ) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Debug, Clone)]
pub struct ImportOptions {
    pub file: PathBuf,
    pub table: String,
    pub delimiter: u8,
    /// 每个分块的最大行数
    pub chunk_size: usize,
    /// 单条 INSERT 的最大行数
    pub insert_batch: usize,
    /// 固定按文本导入的列
    pub text_columns: Vec<ColumnRef>,
    pub transforms: Vec<ColumnTransform>,
    pub strict_table_name: bool,
}

impl ImportOptions {
    pub fn new(
        file: impl Into<PathBuf>,
        table: impl Into<String>,
    ) -> Self {
        Self {
            file: file.into(),
            table: table.into(),
            delimiter: DEFAULT_DELIMITER,
            chunk_size: DEFAULT_CHUNK_SIZE,
            insert_batch: DEFAULT_INSERT_BATCH,
            text_columns: vec![ColumnRef::Index(DEFAULT_TEXT_COLUMN)],
            transforms: vec![],
            strict_table_name: false,
        }
    }
}

#[derive(Debug, Clone)]
pub struct ImportSummary {
    pub table: String,
    pub total_rows: u64,
    pub chunks: usize,
    /// 本次运行是否创建了目标表
    pub created: bool,
    pub elapsed: Duration,
}

/// 分块读取文件并依次追加到目标表。
///
/// 每个分块在单独的事务中写入。任何分块失败都会立即中止：
/// 已写入的分块保留，失败的分块回滚，之后的分块不再读取。
pub fn import_data(
    session: &mut dyn DatabaseSession,
    options: &ImportOptions,
    observer: &mut dyn ImportObserver,
) -> Result<ImportSummary, ImportError> {
    // 表名校验必须先于任何文件读取
    let table = match TableName::parse(&options.table, options.strict_table_name) {
        Ok(table) => table,
        Err(err) => {
            observer.notify(&ImportEvent::ImportFailed {
                table: options.table.clone(),
                error: err.to_string(),
            });
            return Err(err);
        }
    };

    match run(session, &table, options, observer) {
        Ok(summary) => {
            observer.notify(&ImportEvent::ImportFinished {
                table: summary.table.clone(),
                total_rows: summary.total_rows,
                chunks: summary.chunks,
            });
            Ok(summary)
        }
        Err(err) => {
            observer.notify(&ImportEvent::ImportFailed {
                table: table.to_string(),
                error: err.to_string(),
            });
            Err(err)
        }
    }
}

fn run(
    session: &mut dyn DatabaseSession,
    table: &TableName,
    options: &ImportOptions,
    observer: &mut dyn ImportObserver,
) -> Result<ImportSummary, ImportError> {
    if options.insert_batch == 0 {
        return Err(ImportError::InvalidOption("insert_batch 必须大于 0".into()));
    }

    let start = Instant::now();
    let chunks = ChunkReader::open(&options.file, options.delimiter, options.chunk_size)?;
    let headers = chunks.headers().to_vec();
    let transforms = transform::bind(&options.transforms, &headers)?;
    let text_columns = text_column_indexes(options, &headers, &transforms);

    tracing::debug!(
        "导入配置: file={}, table={}, chunk_size={}, insert_batch={}, columns={}",
        options.file.display(),
        table,
        options.chunk_size,
        options.insert_batch,
        headers.len()
    );

    let dialect = session.dialect();
    let mut columns: Option<Vec<ColumnDef>> = None;
    let mut created = false;
    let mut total_rows = 0u64;
    let mut written = 0usize;

    for chunk in chunks {
        let Chunk {
            index,
            first_line,
            mut rows,
        } = chunk?;
        transform::apply_all(&transforms, &mut rows);

        // 列类型由第一个分块决定
        if columns.is_none() {
            let defs = infer_columns(&headers, &rows, &text_columns);
            if !session.table_exists(table.as_str())? {
                session.exec(&dialect.create_table(table.as_str(), &defs))?;
                created = true;
                observer.notify(&ImportEvent::TableCreated {
                    table: table.to_string(),
                    columns: defs
                        .iter()
                        .map(|c| format!("{} {}", c.name, c.kind.label()))
                        .collect(),
                });
            } else {
                let existing = session.row_count(table.as_str())?;
                tracing::debug!("表 {} 已存在 ({} 行)，追加导入", table, existing);
            }
            columns = Some(defs);
        }
        let defs = columns.as_deref().unwrap_or_default();

        let values = coerce_rows(defs, &rows);
        let statements = dialect.insert_rows(table.as_str(), defs, &values, options.insert_batch);
        session.exec_batch(&statements)?;

        total_rows += rows.len() as u64;
        written += 1;
        observer.notify(&ImportEvent::ChunkWritten {
            index,
            first_line,
            rows: rows.len(),
            total_rows,
        });
    }

    Ok(ImportSummary {
        table: table.to_string(),
        total_rows,
        chunks: written,
        created,
        elapsed: start.elapsed(),
    })
}

/// 强制文本列与被转换的列都按文本导入；文件中不存在的强制列忽略
fn text_column_indexes(
    options: &ImportOptions,
    headers: &[String],
    transforms: &[transform::BoundTransform],
) -> Vec<usize> {
    let mut indexes = vec![];
    for column in &options.text_columns {
        match column.resolve(headers) {
            Some(idx) => indexes.push(idx),
            None => tracing::debug!("文本列 {} 不在文件中，已忽略", column),
        }
    }
    indexes.extend(transforms.iter().map(|t| t.column));
    indexes
}

#[cfg(test)]
mod tests {
    use std::{fs, path::Path};

    use rusqlite::Connection;

    use super::*;
    use crate::{
        SQLiteOptions,
        driver::{DatabaseDriver, SQLiteDriver},
        observer::RecordingObserver,
        transform::TransformKind,
    };

    struct Fixture {
        dir: tempfile::TempDir,
    }

    impl Fixture {
        fn new() -> Self {
            Self {
                dir: tempfile::tempdir().unwrap(),
            }
        }

        fn db_path(&self) -> std::path::PathBuf {
            self.dir.path().join("import.db")
        }

        fn session(&self) -> Box<dyn DatabaseSession> {
            let opts = SQLiteOptions {
                readonly: false,
                filepath: self.db_path().to_string_lossy().into_owned(),
            };
            SQLiteDriver.create_connection(&opts).unwrap()
        }

        fn write_csv(
            &self,
            name: &str,
            content: &str,
        ) -> std::path::PathBuf {
            let path = self.dir.path().join(name);
            fs::write(&path, content).unwrap();
            path
        }

        fn ids(
            &self,
            table: &str,
        ) -> Vec<i64> {
            let conn = Connection::open(self.db_path()).unwrap();
            let mut stmt = conn
                .prepare(&format!("SELECT id FROM \"{}\" ORDER BY rowid", table))
                .unwrap();
            stmt.query_map([], |row| row.get(0))
                .unwrap()
                .collect::<Result<Vec<i64>, _>>()
                .unwrap()
        }
    }

    fn numbered(rows: usize) -> String {
        let mut data = String::from("id;nome;telefone\n");
        for i in 1..=rows {
            data.push_str(&format!("{i};cliente {i};(11) 9{i:04}-0000\n"));
        }
        data
    }

    fn options(
        file: &Path,
        table: &str,
        chunk_size: usize,
    ) -> ImportOptions {
        ImportOptions {
            chunk_size,
            ..ImportOptions::new(file, table)
        }
    }

    fn chunk_sizes(observer: &RecordingObserver) -> Vec<usize> {
        observer
            .events
            .iter()
            .filter_map(|e| match e {
                ImportEvent::ChunkWritten { rows, .. } => Some(*rows),
                _ => None,
            })
            .collect()
    }

    #[test]
    fn writes_every_row_in_ceil_chunks_preserving_order() {
        let fx = Fixture::new();
        let file = fx.write_csv("clientes.csv", &numbered(10));
        let mut session = fx.session();
        let mut observer = RecordingObserver::new();

        let summary = import_data(session.as_mut(), &options(&file, "clientes", 4), &mut observer).unwrap();

        assert_eq!(summary.total_rows, 10);
        assert_eq!(summary.chunks, 3);
        assert!(summary.created);
        assert_eq!(chunk_sizes(&observer), vec![4, 4, 2]);
        assert_eq!(fx.ids("clientes"), (1..=10).collect::<Vec<_>>());
        assert!(matches!(
            observer.events.last(),
            Some(ImportEvent::ImportFinished { total_rows: 10, chunks: 3, .. })
        ));
    }

    #[test]
    fn running_total_is_monotonic() {
        let fx = Fixture::new();
        let file = fx.write_csv("c.csv", &numbered(5));
        let mut session = fx.session();
        let mut observer = RecordingObserver::new();

        import_data(session.as_mut(), &options(&file, "c", 2), &mut observer).unwrap();

        let totals = observer
            .events
            .iter()
            .filter_map(|e| match e {
                ImportEvent::ChunkWritten { total_rows, .. } => Some(*total_rows),
                _ => None,
            })
            .collect::<Vec<_>>();
        assert_eq!(totals, vec![2, 4, 5]);
    }

    #[test]
    fn empty_table_name_fails_before_file_io() {
        let fx = Fixture::new();
        let mut session = fx.session();
        let mut observer = RecordingObserver::new();
        // 文件不存在：若先读文件会得到 FileNotFound
        let missing = fx.dir.path().join("nao-existe.csv");

        let err = import_data(session.as_mut(), &options(&missing, "  ", 10), &mut observer).unwrap_err();

        assert!(matches!(err, ImportError::InvalidTableName(_)), "实际: {err}");
        assert!(matches!(observer.events.as_slice(), [ImportEvent::ImportFailed { .. }]));
    }

    #[test]
    fn strict_table_name_rejects_whitespace() {
        let fx = Fixture::new();
        let file = fx.write_csv("c.csv", &numbered(1));
        let mut session = fx.session();
        let opts = ImportOptions {
            strict_table_name: true,
            ..options(&file, "minha tabela", 10)
        };

        let err = import_data(session.as_mut(), &opts, &mut RecordingObserver::new()).unwrap_err();
        assert!(matches!(err, ImportError::InvalidTableName(_)));
        assert!(!session.table_exists("minha tabela").unwrap());

        let relaxed = options(&file, "minha tabela", 10);
        import_data(session.as_mut(), &relaxed, &mut RecordingObserver::new()).unwrap();
        assert_eq!(session.row_count("minha tabela").unwrap(), 1);
    }

    #[test]
    fn missing_file_is_reported_and_logged() {
        let fx = Fixture::new();
        let mut session = fx.session();
        let mut observer = RecordingObserver::new();
        let missing = fx.dir.path().join("nao-existe.csv");

        let err = import_data(session.as_mut(), &options(&missing, "t", 10), &mut observer).unwrap_err();

        assert!(matches!(err, ImportError::FileNotFound(_)));
        assert_eq!(observer.at_level(tracing::Level::ERROR).count(), 1);
    }

    #[test]
    fn malformed_row_keeps_only_previous_chunks() {
        let fx = Fixture::new();
        // 分块大小 3：前两个分块 (1..=6) 有效，第三个分块读到 id=8 时字段数错误
        let mut data = numbered(7);
        data.push_str("8;cliente 8;(11) 0;extra\n");
        data.push_str("9;cliente 9;(11) 1\n");
        let file = fx.write_csv("c.csv", &data);
        let mut session = fx.session();
        let mut observer = RecordingObserver::new();

        let err = import_data(session.as_mut(), &options(&file, "c", 3), &mut observer).unwrap_err();

        match err {
            ImportError::MalformedRow { line, .. } => assert_eq!(line, 9),
            other => panic!("期望格式错误，实际: {other}"),
        }
        assert_eq!(chunk_sizes(&observer), vec![3, 3]);
        assert_eq!(fx.ids("c"), (1..=6).collect::<Vec<_>>());
    }

    #[test]
    fn short_rows_import_missing_fields_as_null() {
        let fx = Fixture::new();
        let file = fx.write_csv("c.csv", "id;nome;tel\n1;a;x\n2;b\n");
        let mut session = fx.session();

        let summary = import_data(session.as_mut(), &options(&file, "c", 10), &mut RecordingObserver::new()).unwrap();

        assert_eq!(summary.total_rows, 2);
        let conn = Connection::open(fx.db_path()).unwrap();
        let tel: Option<String> = conn
            .query_row("SELECT tel FROM c WHERE id = 2", [], |row| row.get(0))
            .unwrap();
        assert_eq!(tel, None);
    }

    #[test]
    fn chunk_events_carry_first_line() {
        let fx = Fixture::new();
        let file = fx.write_csv("c.csv", &numbered(5));
        let mut session = fx.session();
        let mut observer = RecordingObserver::new();

        import_data(session.as_mut(), &options(&file, "c", 2), &mut observer).unwrap();

        let lines = observer
            .events
            .iter()
            .filter_map(|e| match e {
                ImportEvent::ChunkWritten { first_line, .. } => Some(*first_line),
                _ => None,
            })
            .collect::<Vec<_>>();
        assert_eq!(lines, vec![2, 4, 6]);
    }

    #[test]
    fn failing_write_aborts_and_keeps_committed_chunks() {
        let fx = Fixture::new();
        let mut session = fx.session();
        session
            .exec("CREATE TABLE \"c\" (\"id\" INTEGER PRIMARY KEY, \"nome\" TEXT, \"telefone\" TEXT)")
            .unwrap();
        // 第二个分块中 id=2 重复
        let file = fx.write_csv("c.csv", "id;nome;telefone\n1;a;x\n2;b;y\n3;c;z\n2;d;w\n5;e;v\n");
        let mut observer = RecordingObserver::new();

        let err = import_data(session.as_mut(), &options(&file, "c", 2), &mut observer).unwrap_err();

        assert!(matches!(err, ImportError::Constraint(_)), "实际: {err}");
        assert_eq!(fx.ids("c"), vec![1, 2]);
        assert_eq!(chunk_sizes(&observer), vec![2]);
    }

    #[test]
    fn appends_to_existing_table() {
        let fx = Fixture::new();
        let file = fx.write_csv("c.csv", &numbered(3));
        let mut session = fx.session();

        let first = import_data(session.as_mut(), &options(&file, "c", 10), &mut RecordingObserver::new()).unwrap();
        let second = import_data(session.as_mut(), &options(&file, "c", 10), &mut RecordingObserver::new()).unwrap();

        assert!(first.created);
        assert!(!second.created);
        assert_eq!(session.row_count("c").unwrap(), 6);
    }

    #[test]
    fn phone_transform_and_text_columns_are_applied() {
        let fx = Fixture::new();
        let file = fx.write_csv("c.csv", "id;telefone;cep\n1;(11) 98765-4321;01310100\n");
        let mut session = fx.session();
        let opts = ImportOptions {
            transforms: vec![ColumnTransform::new(
                ColumnRef::Name("telefone".into()),
                TransformKind::DigitsOnly,
            )],
            text_columns: vec![ColumnRef::Name("cep".into()), ColumnRef::Index(13)],
            ..options(&file, "c", 10)
        };

        import_data(session.as_mut(), &opts, &mut RecordingObserver::new()).unwrap();

        let conn = Connection::open(fx.db_path()).unwrap();
        let (telefone, cep): (String, String) = conn
            .query_row("SELECT telefone, cep FROM c", [], |row| Ok((row.get(0)?, row.get(1)?)))
            .unwrap();
        assert_eq!(telefone, "11987654321");
        assert_eq!(cep, "01310100");
    }

    #[test]
    fn header_only_file_creates_nothing() {
        let fx = Fixture::new();
        let file = fx.write_csv("c.csv", "id;nome\n");
        let mut session = fx.session();

        let summary = import_data(session.as_mut(), &options(&file, "c", 10), &mut RecordingObserver::new()).unwrap();

        assert_eq!(summary.total_rows, 0);
        assert_eq!(summary.chunks, 0);
        assert!(!session.table_exists("c").unwrap());
    }

    #[test]
    fn unknown_transform_column_fails_before_writing() {
        let fx = Fixture::new();
        let file = fx.write_csv("c.csv", &numbered(2));
        let mut session = fx.session();
        let opts = ImportOptions {
            transforms: vec![ColumnTransform::new(ColumnRef::Name("fax".into()), TransformKind::DigitsOnly)],
            ..options(&file, "c", 10)
        };

        let err = import_data(session.as_mut(), &opts, &mut RecordingObserver::new()).unwrap_err();

        assert!(matches!(err, ImportError::UnknownColumn(_)));
        assert!(!session.table_exists("c").unwrap());
    }
}
