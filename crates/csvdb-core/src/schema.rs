//! 列类型推断与取值转换。

/// 视为空值的字段内容，与常见表格库的默认缺失值标记一致
#[rustfmt::skip]
const NA_VALUES: [&str; 19] = [
    "", "#N/A", "#N/A N/A", "#NA", "-1.#IND", "-1.#QNAN", "-NaN", "-nan",
    "1.#IND", "1.#QNAN", "<NA>", "N/A", "NA", "NULL", "NaN", "None",
    "n/a", "nan", "null",
];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ColumnKind {
    BigInt,
    Double,
    Boolean,
    Text,
}

impl ColumnKind {
    pub fn label(&self) -> &'static str {
        match self {
            ColumnKind::BigInt => "BIGINT",
            ColumnKind::Double => "DOUBLE",
            ColumnKind::Boolean => "BOOLEAN",
            ColumnKind::Text => "TEXT",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ColumnDef {
    pub name: String,
    pub kind: ColumnKind,
}

impl ColumnDef {
    pub fn new(
        name: impl Into<String>,
        kind: ColumnKind,
    ) -> Self {
        Self {
            name: name.into(),
            kind,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum CellValue {
    Null,
    Int(i64),
    Float(f64),
    Bool(bool),
    Text(String),
}

impl CellValue {
    /// 按列类型转换原始字段；无法转换时保留原文，由数据库决定是否接受
    pub fn coerce(
        raw: &str,
        kind: ColumnKind,
    ) -> Self {
        if is_null(raw) {
            return CellValue::Null;
        }

        let parsed = match kind {
            ColumnKind::BigInt => parse_int(raw).map(CellValue::Int),
            ColumnKind::Double => parse_float(raw).map(CellValue::Float),
            ColumnKind::Boolean => parse_bool(raw).map(CellValue::Bool),
            ColumnKind::Text => None,
        };
        parsed.unwrap_or_else(|| CellValue::Text(raw.to_string()))
    }
}

pub fn is_null(raw: &str) -> bool {
    NA_VALUES.contains(&raw)
}

fn parse_int(raw: &str) -> Option<i64> {
    raw.trim().parse().ok()
}

fn parse_float(raw: &str) -> Option<f64> {
    raw.trim().parse::<f64>().ok().filter(|f| f.is_finite())
}

fn parse_bool(raw: &str) -> Option<bool> {
    let raw = raw.trim();
    if raw.eq_ignore_ascii_case("true") {
        Some(true)
    } else if raw.eq_ignore_ascii_case("false") {
        Some(false)
    } else {
        None
    }
}

/// 推断单列类型：全部非空值可解析为整数则为 BIGINT，其次浮点、布尔，否则为 TEXT。
/// 没有任何非空值的列按 TEXT 处理。
pub fn infer_kind<'a>(values: impl IntoIterator<Item = &'a str>) -> ColumnKind {
    let (mut int, mut float, mut boolean) = (true, true, true);
    let mut seen = false;

    for raw in values {
        if is_null(raw) {
            continue;
        }
        seen = true;
        int = int && parse_int(raw).is_some();
        float = float && parse_float(raw).is_some();
        boolean = boolean && parse_bool(raw).is_some();
        if !(int || float || boolean) {
            return ColumnKind::Text;
        }
    }

    match (seen, int, float, boolean) {
        (false, ..) => ColumnKind::Text,
        (true, true, ..) => ColumnKind::BigInt,
        (true, false, true, _) => ColumnKind::Double,
        (true, false, false, true) => ColumnKind::Boolean,
        _ => ColumnKind::Text,
    }
}

/// 根据一个分块推断全部列定义，`text_columns` 中的列固定为 TEXT
pub fn infer_columns(
    headers: &[String],
    rows: &[Vec<String>],
    text_columns: &[usize],
) -> Vec<ColumnDef> {
    headers
        .iter()
        .enumerate()
        .map(|(idx, name)| {
            let kind = if text_columns.contains(&idx) {
                ColumnKind::Text
            } else {
                infer_kind(rows.iter().filter_map(|row| row.get(idx).map(String::as_str)))
            };
            ColumnDef::new(name.clone(), kind)
        })
        .collect()
}

/// 按列定义转换一个分块
pub fn coerce_rows(
    columns: &[ColumnDef],
    rows: &[Vec<String>],
) -> Vec<Vec<CellValue>> {
    rows.iter()
        .map(|row| {
            columns
                .iter()
                .zip(row)
                .map(|(col, raw)| CellValue::coerce(raw, col.kind))
                .collect()
        })
        .collect()
}
