// Row-oriented data as read from the files, before shaping.

use std::path::Path;

use crate::atlas::*;

/// The raw content of a source: a header and string fields.
///
/// Line numbers follow the file, starting at 1, so that errors point at the
/// right place.
#[derive(PartialEq, Debug, Clone)]
pub struct RawTable {
    pub path: String,
    pub header: Vec<String>,
    pub rows: Vec<(usize, Vec<String>)>,
}

impl RawTable {
    pub fn column_index(&self, column: &str) -> AtlasResult<usize> {
        self.header
            .iter()
            .position(|h| h == column)
            .context(MissingColumnSnafu {
                path: self.path.clone(),
                column,
                header: self.header.clone(),
            })
    }

    pub fn check_expected(&self, source: &SourceConfig) -> AtlasResult<()> {
        if let Some(cols) = &source.expected_columns {
            for c in cols.iter() {
                self.column_index(c)?;
            }
        }
        if let Some(expected) = source.expected_column_count {
            for (lineno, row) in self.rows.iter() {
                ensure!(
                    row.len() == expected,
                    RowLengthSnafu {
                        path: self.path.clone(),
                        lineno: *lineno,
                        expected,
                        found: row.len(),
                    }
                );
            }
        }
        Ok(())
    }

    /// The field of a row, empty when the row is too short.
    pub fn field<'a>(row: &'a [String], idx: usize) -> &'a str {
        row.get(idx).map(|s| s.as_str()).unwrap_or("")
    }
}

pub fn simplify_file_name(path: &str) -> String {
    Path::new(path)
        .file_name()
        .and_then(|s| s.to_str())
        .unwrap_or(path)
        .to_string()
}

/// Reads a vote count. Thousands separators are accepted and blank fields are
/// treated as absent.
pub fn parse_number(raw: &RawTable, lineno: usize, column: &str, content: &str) -> AtlasResult<Option<f64>> {
    let cleaned: String = content.trim().chars().filter(|c| *c != ',').collect();
    if cleaned.is_empty() {
        return Ok(None);
    }
    match cleaned.parse::<f64>() {
        Ok(x) if x.is_finite() => Ok(Some(x)),
        _ => NotANumberSnafu {
            path: raw.path.clone(),
            lineno,
            column,
            content,
        }
        .fail(),
    }
}
