// 📥 Extract Reader - Raw pipe-delimited lobbyist registrations
//
// Source format wraps every field in '|' and separates fields with ',':
//   |SOPR|,|ID|,|Full Name|,|LID|,|2016|,|y|
// Splitting on '|' without quoting leaves empty tokens and stray ","
// tokens between the real fields. Both are dropped BEFORE any column
// position is read, so an empty source field shifts later columns left.
// Fields are read as bytes; a token that is not UTF-8 is decoded as Latin-1.

use crate::error::ExtractError;
use csv::{ByteRecord, Reader, ReaderBuilder};
use indexmap::IndexMap;
use std::fs::File;
use std::io::Read;
use std::path::Path;

// ============================================================================
// COLUMN LAYOUT (positions after token filtering)
// ============================================================================

pub const SOPR_COL: usize = 0;
pub const NAME_COL: usize = 2;
pub const LID_COL: usize = 3;
pub const YEAR_COL: usize = 4;

/// Minimum number of tokens for a row to carry every column we read
pub const MIN_COLUMNS: usize = YEAR_COL + 1;

// ============================================================================
// EXTRACT ROW
// ============================================================================

/// One cleaned row of the lobbyist extract
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExtractRow {
    /// Source report id, the firm's natural key
    pub sopr: String,
    pub full_name: String,
    /// Lobbyist natural key (LID)
    pub lobbyist_id: String,
    pub report_year: String,
    /// Raw former-congressman flag, taken from the last column
    pub former_congressman: String,
    /// 1-based line in the source file
    pub line: u64,
}

impl ExtractRow {
    /// Build a row from already-cleaned tokens
    pub fn from_tokens(tokens: &[String], line: u64) -> Result<Self, ExtractError> {
        if tokens.len() < MIN_COLUMNS {
            return Err(ExtractError::MalformedRow {
                line,
                columns: tokens.len(),
                required: MIN_COLUMNS,
            });
        }

        Ok(ExtractRow {
            sopr: tokens[SOPR_COL].clone(),
            full_name: tokens[NAME_COL].clone(),
            lobbyist_id: tokens[LID_COL].clone(),
            report_year: tokens[YEAR_COL].clone(),
            former_congressman: tokens[tokens.len() - 1].clone(),
            line,
        })
    }
}

// ============================================================================
// READING
// ============================================================================

fn decode_token(token: &[u8]) -> String {
    match std::str::from_utf8(token) {
        Ok(text) => text.to_string(),
        Err(_) => token.iter().map(|&b| b as char).collect(),
    }
}

/// Drop empty and stray-comma tokens from a raw record
pub fn clean_row(record: &ByteRecord) -> Vec<String> {
    record
        .iter()
        .filter(|token| !token.is_empty() && *token != b",")
        .map(decode_token)
        .collect()
}

fn extract_reader<R: Read>(reader: R) -> Reader<R> {
    ReaderBuilder::new()
        .delimiter(b'|')
        .quoting(false)
        .has_headers(false)
        .flexible(true)
        .from_reader(reader)
}

fn open(path: &Path) -> Result<File, ExtractError> {
    File::open(path).map_err(|source| ExtractError::Open {
        path: path.display().to_string(),
        source,
    })
}

/// Iterate cleaned token rows together with their 1-based line numbers
fn cleaned_rows<R: Read>(
    reader: R,
) -> impl Iterator<Item = Result<(u64, Vec<String>), ExtractError>> {
    extract_reader(reader)
        .into_byte_records()
        .enumerate()
        .map(|(index, result)| {
            let fallback_line = index as u64 + 1;
            let record = result.map_err(|source| ExtractError::Read {
                line: fallback_line,
                source,
            })?;
            let line = record
                .position()
                .map(|p| p.line())
                .unwrap_or(fallback_line);
            Ok((line, clean_row(&record)))
        })
}

/// Parse every row of an extract from any reader
pub fn read_extract_from<R: Read>(reader: R) -> Result<Vec<ExtractRow>, ExtractError> {
    cleaned_rows(reader)
        .map(|row| {
            let (line, tokens) = row?;
            ExtractRow::from_tokens(&tokens, line)
        })
        .collect()
}

/// Parse every row of the extract file; the first malformed row aborts
pub fn read_extract(path: &Path) -> Result<Vec<ExtractRow>, ExtractError> {
    read_extract_from(open(path)?)
}

// ============================================================================
// INDEXING
// ============================================================================

/// Group the `value_col` column by the `key_col` column
///
/// Values for a key keep their order of first appearance and repeated
/// values are kept once. Keys keep first-seen insertion order so that
/// downstream output is deterministic.
pub fn index_by_reader<R: Read>(
    reader: R,
    key_col: usize,
    value_col: usize,
) -> Result<IndexMap<String, Vec<String>>, ExtractError> {
    let required = key_col.max(value_col) + 1;
    let mut store: IndexMap<String, Vec<String>> = IndexMap::new();

    for row in cleaned_rows(reader) {
        let (line, tokens) = row?;
        if tokens.len() < required {
            return Err(ExtractError::MalformedRow {
                line,
                columns: tokens.len(),
                required,
            });
        }

        let values = store.entry(tokens[key_col].clone()).or_default();
        let value = &tokens[value_col];
        if !values.contains(value) {
            values.push(value.clone());
        }
    }

    Ok(store)
}

/// Same as [`index_by_reader`], reading from a file
pub fn index_by(
    path: &Path,
    key_col: usize,
    value_col: usize,
) -> Result<IndexMap<String, Vec<String>>, ExtractError> {
    index_by_reader(open(path)?, key_col, value_col)
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = "\
|F1|,|1|,|Jane Doe|,|L1|,|2016|,|n|
|F2|,|2|,|Jane Doe|,|L1|,|2017|,|n|
|F1|,|3|,|John Roe|,|L2|,|2016|,|y|
";

    #[test]
    fn test_clean_row_drops_separators() {
        let record = ByteRecord::from(vec!["", "A", ",", "B", ",", "", ",", "C", ""]);
        assert_eq!(clean_row(&record), vec!["A", "B", "C"]);
    }

    #[test]
    fn test_read_extract_columns() {
        let rows = read_extract_from(SAMPLE.as_bytes()).unwrap();

        assert_eq!(rows.len(), 3);
        assert_eq!(rows[0].sopr, "F1");
        assert_eq!(rows[0].full_name, "Jane Doe");
        assert_eq!(rows[0].lobbyist_id, "L1");
        assert_eq!(rows[0].report_year, "2016");
        assert_eq!(rows[2].former_congressman, "y");
        assert_eq!(rows[2].line, 3);
    }

    #[test]
    fn test_latin1_name_is_decoded() {
        let data: &[u8] = b"|F1|,|1|,|Jos\xe9 Doe|,|L1|,|2016|,|n|\n";

        let rows = read_extract_from(data).unwrap();
        assert_eq!(rows[0].full_name, "Jos\u{e9} Doe");
        assert_eq!(rows[0].lobbyist_id, "L1");

        let index = index_by_reader(data, LID_COL, SOPR_COL).unwrap();
        assert_eq!(index["L1"], vec!["F1"]);
    }

    #[test]
    fn test_utf8_name_is_kept() {
        let rows = read_extract_from("|F1|,|1|,|Zoë Roe|,|L1|,|2016|,|n|\n".as_bytes()).unwrap();
        assert_eq!(rows[0].full_name, "Zoë Roe");
    }

    #[test]
    fn test_empty_field_shifts_columns() {
        // Empty name field: LID moves into the name position
        let rows = read_extract_from("|F1|,|1|,||,|L1|,|2016|,|x|,|n|\n".as_bytes()).unwrap();
        assert_eq!(rows[0].full_name, "L1");
        assert_eq!(rows[0].lobbyist_id, "2016");
    }

    #[test]
    fn test_short_row_is_fatal() {
        let err = read_extract_from("|F1|,|1|,|Jane|\n".as_bytes()).unwrap_err();
        match err {
            ExtractError::MalformedRow { line, columns, required } => {
                assert_eq!(line, 1);
                assert_eq!(columns, 3);
                assert_eq!(required, MIN_COLUMNS);
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_index_by_groups_in_first_seen_order() {
        let index = index_by_reader(SAMPLE.as_bytes(), LID_COL, SOPR_COL).unwrap();

        let keys: Vec<&String> = index.keys().collect();
        assert_eq!(keys, vec!["L1", "L2"]);
        assert_eq!(index["L1"], vec!["F1", "F2"]);
        assert_eq!(index["L2"], vec!["F1"]);
    }

    #[test]
    fn test_index_by_keeps_repeated_value_once() {
        let data = "|F1|,|1|,|A|,|L1|,|2016|,|n|\n|F1|,|2|,|A|,|L1|,|2017|,|n|\n";
        let index = index_by_reader(data.as_bytes(), LID_COL, SOPR_COL).unwrap();
        assert_eq!(index["L1"], vec!["F1"]);
    }

    #[test]
    fn test_index_by_rejects_short_row() {
        let err = index_by_reader("|F1|,|1|\n".as_bytes(), LID_COL, SOPR_COL).unwrap_err();
        assert!(matches!(err, ExtractError::MalformedRow { required: 4, .. }));
    }

    #[test]
    fn test_index_by_missing_file() {
        let err = index_by(Path::new("/nonexistent/lob_lobbyist.txt"), 3, 0).unwrap_err();
        assert!(matches!(err, ExtractError::Open { .. }));
    }
}
