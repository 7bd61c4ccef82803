use std::{
    collections::HashSet,
    fs::File,
    io::{self, Read},
    path::Path,
};

use csv::{ReaderBuilder, StringRecord};

use crate::error::ImportError;

/// 一个分块：若干行原始字段，保持文件中的顺序
#[derive(Debug, Clone)]
pub struct Chunk {
    /// 分块序号，从 0 开始
    pub index: usize,
    /// 分块第一行所在的文件行号
    pub first_line: u64,
    pub rows: Vec<Vec<String>>,
}

/// 按固定行数惰性读取分隔文本文件。
///
/// 每次迭代最多读取 `chunk_size` 行；遇到错误后迭代结束，
/// 之后的内容不会再被读取。字段少于表头的行用空值补齐，
/// 字段多于表头的行视为格式错误。
pub struct ChunkReader<R: Read> {
    reader: csv::Reader<R>,
    headers: Vec<String>,
    chunk_size: usize,
    next_index: usize,
    record: StringRecord,
    done: bool,
}

impl ChunkReader<File> {
    pub fn open(
        path: &Path,
        delimiter: u8,
        chunk_size: usize,
    ) -> Result<Self, ImportError> {
        let file = File::open(path).map_err(|err| match err.kind() {
            io::ErrorKind::NotFound => ImportError::FileNotFound(path.to_path_buf()),
            _ => ImportError::FileUnreadable {
                path: path.to_path_buf(),
                source: err,
            },
        })?;
        Self::from_reader(file, delimiter, chunk_size).map_err(|err| match err {
            ImportError::EmptyFile(_) => ImportError::EmptyFile(path.to_path_buf()),
            other => other,
        })
    }
}

impl<R: Read> ChunkReader<R> {
    pub fn from_reader(
        rdr: R,
        delimiter: u8,
        chunk_size: usize,
    ) -> Result<Self, ImportError> {
        if chunk_size == 0 {
            return Err(ImportError::InvalidOption("chunk_size 必须大于 0".into()));
        }

        let mut reader = ReaderBuilder::new()
            .delimiter(delimiter)
            .has_headers(true)
            .flexible(true)
            .from_reader(rdr);

        let raw = reader.headers()?.clone();
        if raw.is_empty() {
            return Err(ImportError::EmptyFile(Default::default()));
        }

        Ok(Self {
            reader,
            headers: normalize_headers(&raw),
            chunk_size,
            next_index: 0,
            record: StringRecord::new(),
            done: false,
        })
    }

    pub fn headers(&self) -> &[String] {
        &self.headers
    }

    fn read_chunk(&mut self) -> Result<Option<Chunk>, ImportError> {
        let mut rows = Vec::with_capacity(self.chunk_size.min(4096));
        let mut first_line = 0;

        while rows.len() < self.chunk_size {
            if !self.reader.read_record(&mut self.record)? {
                break;
            }
            let line = self.record.position().map(|pos| pos.line()).unwrap_or_default();
            let width = self.headers.len();
            if self.record.len() > width {
                return Err(ImportError::MalformedRow {
                    line,
                    message: format!("期望 {} 个字段，实际 {} 个", width, self.record.len()),
                });
            }
            if rows.is_empty() {
                first_line = line;
            }

            let mut row: Vec<String> = self.record.iter().map(str::to_string).collect();
            row.resize(width, String::new());
            rows.push(row);
        }

        if rows.is_empty() {
            return Ok(None);
        }

        let chunk = Chunk {
            index: self.next_index,
            first_line,
            rows,
        };
        self.next_index += 1;
        Ok(Some(chunk))
    }
}

impl<R: Read> Iterator for ChunkReader<R> {
    type Item = Result<Chunk, ImportError>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }
        match self.read_chunk() {
            Ok(Some(chunk)) => Some(Ok(chunk)),
            Ok(None) => {
                self.done = true;
                None
            }
            Err(err) => {
                self.done = true;
                Some(Err(err))
            }
        }
    }
}

/// 空列名改为 `Unnamed: <序号>`，重复列名依次追加 `.1`、`.2`
fn normalize_headers(raw: &StringRecord) -> Vec<String> {
    let mut seen = HashSet::new();
    raw.iter()
        .enumerate()
        .map(|(idx, name)| {
            let base = if name.is_empty() {
                format!("Unnamed: {}", idx)
            } else {
                name.to_string()
            };

            let mut candidate = base.clone();
            let mut suffix = 1;
            while !seen.insert(candidate.clone()) {
                candidate = format!("{}.{}", base, suffix);
                suffix += 1;
            }
            candidate
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use std::io::Cursor;

    use super::*;

    fn reader(
        data: &str,
        chunk_size: usize,
    ) -> ChunkReader<Cursor<Vec<u8>>> {
        ChunkReader::from_reader(Cursor::new(data.as_bytes().to_vec()), b';', chunk_size).unwrap()
    }

    fn numbered(rows: usize) -> String {
        let mut data = String::from("id;nome\n");
        for i in 1..=rows {
            data.push_str(&format!("{i};linha {i}\n"));
        }
        data
    }

    #[test]
    fn splits_into_ceil_chunks_in_order() {
        let chunks = reader(&numbered(7), 3).collect::<Result<Vec<_>, _>>().unwrap();

        assert_eq!(chunks.iter().map(|c| c.rows.len()).collect::<Vec<_>>(), vec![3, 3, 1]);
        assert_eq!(chunks.iter().map(|c| c.index).collect::<Vec<_>>(), vec![0, 1, 2]);
        let ids = chunks
            .iter()
            .flat_map(|c| c.rows.iter().map(|r| r[0].clone()))
            .collect::<Vec<_>>();
        assert_eq!(ids, (1..=7).map(|i| i.to_string()).collect::<Vec<_>>());
        assert_eq!(chunks[1].first_line, 5);
    }

    #[test]
    fn exact_multiple_has_no_trailing_empty_chunk() {
        let chunks = reader(&numbered(4), 2).collect::<Result<Vec<_>, _>>().unwrap();
        assert_eq!(chunks.len(), 2);
    }

    #[test]
    fn malformed_row_stops_iteration() {
        let data = "a;b\n1;2\n3;4\n5;6;7\n8;9\n";
        let mut chunks = reader(data, 2);

        assert_eq!(chunks.next().unwrap().unwrap().rows.len(), 2);
        match chunks.next() {
            Some(Err(ImportError::MalformedRow { line, message })) => {
                assert_eq!(line, 4);
                assert!(message.contains("实际 3"));
            }
            other => panic!("期望格式错误，实际: {:?}", other.map(|r| r.map(|c| c.rows.len()))),
        }
        assert!(chunks.next().is_none());
    }

    #[test]
    fn short_rows_are_padded_with_missing_values() {
        let mut chunks = reader("id;nome;tel\n1;a;x\n2;b\n3\n", 10);
        let chunk = chunks.next().unwrap().unwrap();

        assert_eq!(chunk.rows.len(), 3);
        assert_eq!(chunk.rows[1], vec!["2", "b", ""]);
        assert_eq!(chunk.rows[2], vec!["3", "", ""]);
        assert!(chunks.next().is_none());
    }

    #[test]
    fn quoted_fields_and_custom_delimiter() {
        let data = "nome,obs\n\"Silva, J\",\"diz \"\"oi\"\"\"\n";
        let mut chunks = ChunkReader::from_reader(Cursor::new(data), b',', 10).unwrap();
        let chunk = chunks.next().unwrap().unwrap();
        assert_eq!(chunk.rows[0], vec!["Silva, J".to_string(), "diz \"oi\"".to_string()]);
    }

    #[test]
    fn headers_are_deduplicated() {
        let chunks = reader("id;;id;nome;id\n", 10);
        assert_eq!(chunks.headers(), &["id", "Unnamed: 1", "id.1", "nome", "id.2"]);
    }

    #[test]
    fn header_text_is_kept_as_is() {
        let chunks = reader("id; nome ;tel\n", 10);
        assert_eq!(chunks.headers(), &["id", " nome ", "tel"]);
    }

    #[test]
    fn header_only_file_yields_nothing() {
        assert!(reader("id;nome\n", 10).next().is_none());
    }

    #[test]
    fn empty_input_is_rejected() {
        let result = ChunkReader::from_reader(Cursor::new(""), b';', 10);
        assert!(matches!(result, Err(ImportError::EmptyFile(_))));
    }

    #[test]
    fn zero_chunk_size_is_rejected() {
        let result = ChunkReader::from_reader(Cursor::new("a\n1\n"), b';', 0);
        assert!(matches!(result, Err(ImportError::InvalidOption(_))));
    }

    #[test]
    fn missing_file_is_reported() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nao-existe.csv");
        match ChunkReader::open(&path, b';', 10) {
            Err(ImportError::FileNotFound(missing)) => assert_eq!(missing, path),
            Err(other) => panic!("期望文件不存在，实际: {other}"),
            Ok(_) => panic!("不应打开不存在的文件"),
        }
    }
}
