//! Row source: encoding-aware, delimiter-aware CSV reader.
//!
//! Produces rows as plain lists of decoded text cells. No header handling and
//! no field logic here; the processor decides which rows and columns matter.

use encoding_rs::Encoding;
use std::io::Cursor;
use std::path::Path;

use crate::config::HarvestOptions;
use crate::error::{ReaderError, ReaderResult};

/// One row read from the source
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Row {
    /// 1-based row number
    pub number: usize,
    pub cells: Vec<String>,
}

/// Detect the encoding of raw bytes using chardet
pub fn detect_encoding(bytes: &[u8]) -> String {
    let charset = chardet::detect(bytes).0;

    match charset.to_lowercase().as_str() {
        "" | "ascii" | "utf-8" | "utf8" => "utf-8".to_string(),
        "iso-8859-1" | "iso-8859-15" | "latin-1" | "latin1" => "iso-8859-1".to_string(),
        "windows-1252" | "cp1252" => "windows-1252".to_string(),
        _ => charset,
    }
}

/// Decode bytes using an encoding label (`"auto"` to detect it).
///
/// Returns the text and the label actually used. A leading byte order mark
/// is removed.
pub fn decode_content(bytes: &[u8], encoding: &str) -> ReaderResult<(String, String)> {
    let label = if encoding.eq_ignore_ascii_case("auto") {
        detect_encoding(bytes)
    } else {
        encoding.to_string()
    };

    let codec = Encoding::for_label(label.trim().as_bytes())
        .ok_or_else(|| ReaderError::new(0, format!("Unknown encoding '{}'", label)))?;
    let (text, _, had_errors) = codec.decode(bytes);
    if had_errors {
        tracing::debug!(encoding = %label, "undecodable bytes replaced");
    }

    Ok((text.into_owned(), label))
}

/// Lazy, finite sequence of rows.
pub struct RowReader {
    rows: Box<dyn Iterator<Item = ReaderResult<Vec<String>>>>,
    position: usize,
    encoding: String,
}

impl RowReader {
    /// Read CSV bytes with the encoding and delimiter of `options`.
    pub fn from_bytes(bytes: &[u8], options: &HarvestOptions) -> ReaderResult<Self> {
        let delimiter = options
            .delimiter_byte()
            .map_err(|e| ReaderError::new(0, e.to_string()))?;
        let (content, encoding) = decode_content(bytes, &options.encoding)?;

        let reader = csv::ReaderBuilder::new()
            .has_headers(false)
            .flexible(true)
            .delimiter(delimiter)
            .from_reader(Cursor::new(content.into_bytes()));

        let rows = reader.into_records().map(|record| {
            record
                .map(|r| r.iter().map(str::to_string).collect())
                .map_err(ReaderError::from)
        });

        Ok(Self {
            rows: Box::new(rows),
            position: 0,
            encoding,
        })
    }

    pub fn from_path(path: impl AsRef<Path>, options: &HarvestOptions) -> ReaderResult<Self> {
        let path = path.as_ref();
        let bytes = std::fs::read(path).map_err(|e| {
            ReaderError::new(0, format!("Cannot read file '{}': {}", path.display(), e))
        })?;
        Self::from_bytes(&bytes, options)
    }

    /// Rows already in memory.
    pub fn from_rows<I>(rows: I) -> Self
    where
        I: IntoIterator<Item = Vec<String>>,
        I::IntoIter: 'static,
    {
        Self {
            rows: Box::new(rows.into_iter().map(Ok)),
            position: 0,
            encoding: "utf-8".to_string(),
        }
    }

    /// Discard up to `count` rows. Returns how many were discarded.
    pub fn skip_rows(&mut self, count: usize) -> ReaderResult<usize> {
        let mut skipped = 0;
        while skipped < count {
            match self.next() {
                Some(row) => {
                    row?;
                    skipped += 1;
                }
                None => break,
            }
        }
        Ok(skipped)
    }

    /// Number of the last row produced.
    pub fn position(&self) -> usize {
        self.position
    }

    /// Encoding label used to decode the source.
    pub fn encoding(&self) -> &str {
        &self.encoding
    }
}

impl Iterator for RowReader {
    type Item = ReaderResult<Row>;

    fn next(&mut self) -> Option<Self::Item> {
        let cells = self.rows.next()?;
        self.position += 1;
        let number = self.position;
        Some(cells.map(|cells| Row { number, cells }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cells(reader: RowReader) -> Vec<Vec<String>> {
        reader.map(|row| row.unwrap().cells).collect()
    }

    #[test]
    fn test_comma_rows() {
        let reader = RowReader::from_bytes(b"a,b,c\n1,2,3\n", &HarvestOptions::default()).unwrap();
        assert_eq!(cells(reader), vec![vec!["a", "b", "c"], vec!["1", "2", "3"]]);
    }

    #[test]
    fn test_tabs() {
        let options = HarvestOptions {
            tabs: true,
            ..HarvestOptions::default()
        };
        let reader = RowReader::from_bytes(b"a\tb,c\n", &options).unwrap();
        assert_eq!(cells(reader), vec![vec!["a", "b,c"]]);
    }

    #[test]
    fn test_quoted_values() {
        let csv = "name,note\n\"Smith, J\",\"said \"\"hi\"\"\"\n";
        let reader = RowReader::from_bytes(csv.as_bytes(), &HarvestOptions::default()).unwrap();
        let rows = cells(reader);
        assert_eq!(rows[1], vec!["Smith, J", "said \"hi\""]);
    }

    #[test]
    fn test_ragged_rows_allowed() {
        let reader = RowReader::from_bytes(b"a,b\n1\n1,2,3\n", &HarvestOptions::default()).unwrap();
        let lengths: Vec<usize> = cells(reader).iter().map(Vec::len).collect();
        assert_eq!(lengths, vec![2, 1, 3]);
    }

    #[test]
    fn test_row_numbers_and_skip() {
        let mut reader =
            RowReader::from_bytes(b"h1\nh2\nx\ny\n", &HarvestOptions::default()).unwrap();
        assert_eq!(reader.skip_rows(2).unwrap(), 2);
        let row = reader.next().unwrap().unwrap();
        assert_eq!(row.number, 3);
        assert_eq!(row.cells, vec!["x"]);
        assert_eq!(reader.skip_rows(10).unwrap(), 1);
        assert!(reader.next().is_none());
    }

    #[test]
    fn test_latin1_decoding() {
        // "Société" in ISO-8859-1
        let bytes: &[u8] = &[0x53, 0x6F, 0x63, 0x69, 0xE9, 0x74, 0xE9];
        let (decoded, label) = decode_content(bytes, "iso-8859-1").unwrap();
        assert_eq!(decoded, "Société");
        assert_eq!(label, "iso-8859-1");
    }

    #[test]
    fn test_utf8_bom_removed() {
        let bytes = b"\xEF\xBB\xBFname\n";
        let reader = RowReader::from_bytes(bytes, &HarvestOptions::default()).unwrap();
        assert_eq!(cells(reader), vec![vec!["name"]]);
    }

    #[test]
    fn test_auto_detects_plain_ascii() {
        let (decoded, label) = decode_content(b"a,b\n1,2\n", "auto").unwrap();
        assert_eq!(label, "utf-8");
        assert!(decoded.starts_with("a,b"));
    }

    #[test]
    fn test_unknown_encoding_error() {
        let err = decode_content(b"x", "klingon").unwrap_err();
        assert!(err.message.contains("klingon"));
    }

    #[test]
    fn test_from_rows() {
        let mut reader = RowReader::from_rows(vec![vec!["a".to_string()], vec!["b".to_string()]]);
        assert_eq!(reader.encoding(), "utf-8");
        reader.next();
        assert_eq!(reader.position(), 1);
    }
}
