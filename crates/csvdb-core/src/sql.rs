//! 按方言生成建表、删表与批量插入语句。
//!
//! 插入使用字面量多行 `INSERT ... VALUES`，类型转换交给数据库完成，
//! 与导出任务生成 SQL 文件的方式保持一致。

use crate::{
    driver::{escape_backtick, escape_quote},
    schema::{CellValue, ColumnDef, ColumnKind},
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Dialect {
    MySQL,
    Postgres,
    SQLite,
}

impl Dialect {
    pub fn quote_ident(
        &self,
        name: &str,
    ) -> String {
        match self {
            Dialect::MySQL => format!("`{}`", escape_backtick(name)),
            Dialect::Postgres | Dialect::SQLite => format!("\"{}\"", escape_quote(name)),
        }
    }

    pub fn type_name(
        &self,
        kind: ColumnKind,
    ) -> &'static str {
        match (self, kind) {
            (Dialect::SQLite, ColumnKind::BigInt) => "INTEGER",
            (_, ColumnKind::BigInt) => "BIGINT",
            (Dialect::Postgres, ColumnKind::Double) => "DOUBLE PRECISION",
            (Dialect::MySQL, ColumnKind::Double) => "DOUBLE",
            (Dialect::SQLite, ColumnKind::Double) => "REAL",
            (Dialect::SQLite, ColumnKind::Boolean) => "INTEGER",
            (_, ColumnKind::Boolean) => "BOOLEAN",
            (_, ColumnKind::Text) => "TEXT",
        }
    }

    pub fn literal(
        &self,
        value: &CellValue,
    ) -> String {
        match value {
            CellValue::Null => "NULL".to_string(),
            CellValue::Int(int) => int.to_string(),
            CellValue::Float(float) => float.to_string(),
            CellValue::Bool(b) => {
                let (yes, no) = match self {
                    Dialect::SQLite => ("1", "0"),
                    Dialect::MySQL | Dialect::Postgres => ("TRUE", "FALSE"),
                };
                String::from(if *b { yes } else { no })
            }
            CellValue::Text(text) => self.string_literal(text),
        }
    }

    fn string_literal(
        &self,
        text: &str,
    ) -> String {
        let escaped = text.replace('\'', "''");
        match self {
            // MySQL 默认把反斜杠当作转义符
            Dialect::MySQL => format!("'{}'", escaped.replace('\\', "\\\\")),
            Dialect::Postgres | Dialect::SQLite => format!("'{}'", escaped),
        }
    }

    pub fn drop_table(
        &self,
        table: &str,
    ) -> String {
        format!("DROP TABLE {}", self.quote_ident(table))
    }

    pub fn create_table(
        &self,
        table: &str,
        columns: &[ColumnDef],
    ) -> String {
        let defs = columns
            .iter()
            .map(|col| format!("{} {}", self.quote_ident(&col.name), self.type_name(col.kind)))
            .collect::<Vec<_>>()
            .join(", ");
        format!("CREATE TABLE {} ({})", self.quote_ident(table), defs)
    }

    /// 按 `batch` 行一条拆分 INSERT 语句
    pub fn insert_rows(
        &self,
        table: &str,
        columns: &[ColumnDef],
        rows: &[Vec<CellValue>],
        batch: usize,
    ) -> Vec<String> {
        if rows.is_empty() {
            return vec![];
        }

        let cols = columns
            .iter()
            .map(|col| self.quote_ident(&col.name))
            .collect::<Vec<_>>()
            .join(", ");
        let head = format!("INSERT INTO {} ({}) VALUES ", self.quote_ident(table), cols);

        rows.chunks(batch.max(1))
            .map(|chunk| {
                let values = chunk
                    .iter()
                    .map(|row| {
                        let row = row.iter().map(|v| self.literal(v)).collect::<Vec<_>>();
                        format!("({})", row.join(", "))
                    })
                    .collect::<Vec<_>>()
                    .join(", ");
                format!("{}{}", head, values)
            })
            .collect()
    }
}
