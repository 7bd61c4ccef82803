use serde::{Deserialize, Serialize};

use crate::error::ImportError;

/// 按序号（从 0 开始）或表头名称引用一列
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ColumnRef {
    Index(usize),
    Name(String),
}

impl ColumnRef {
    pub fn resolve(
        &self,
        headers: &[String],
    ) -> Option<usize> {
        match self {
            ColumnRef::Index(idx) => (*idx < headers.len()).then_some(*idx),
            ColumnRef::Name(name) => headers.iter().position(|h| h == name),
        }
    }
}

impl std::fmt::Display for ColumnRef {
    fn fmt(
        &self,
        f: &mut std::fmt::Formatter<'_>,
    ) -> std::fmt::Result {
        match self {
            ColumnRef::Index(idx) => write!(f, "#{}", idx),
            ColumnRef::Name(name) => write!(f, "{}", name),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TransformKind {
    /// 只保留数字，用于清洗电话号码
    DigitsOnly,
}

impl TransformKind {
    pub fn apply(
        &self,
        value: &str,
    ) -> String {
        match self {
            TransformKind::DigitsOnly => digits_only(value),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ColumnTransform {
    pub column: ColumnRef,
    pub kind: TransformKind,
}

impl ColumnTransform {
    pub fn new(
        column: ColumnRef,
        kind: TransformKind,
    ) -> Self {
        Self { column, kind }
    }
}

/// 已定位到列序号的转换
#[derive(Debug, Clone, Copy)]
pub(crate) struct BoundTransform {
    pub column: usize,
    pub kind: TransformKind,
}

pub(crate) fn bind(
    transforms: &[ColumnTransform],
    headers: &[String],
) -> Result<Vec<BoundTransform>, ImportError> {
    transforms
        .iter()
        .map(|t| {
            let column = t
                .column
                .resolve(headers)
                .ok_or_else(|| ImportError::UnknownColumn(t.column.to_string()))?;
            Ok(BoundTransform { column, kind: t.kind })
        })
        .collect()
}

pub(crate) fn apply_all(
    transforms: &[BoundTransform],
    rows: &mut [Vec<String>],
) {
    if transforms.is_empty() {
        return;
    }
    for row in rows.iter_mut() {
        for t in transforms {
            if let Some(value) = row.get_mut(t.column) {
                *value = t.kind.apply(value);
            }
        }
    }
}

pub fn digits_only(value: &str) -> String {
    value.chars().filter(char::is_ascii_digit).collect()
}
