// Primitives for reading and writing CSV files.

use crate::atlas::io_common::RawTable;
use crate::atlas::*;

/// Reads a CSV file.
///
/// The first line is the header unless the source names its columns with
/// `headers`. Rows may have any length here: lengths are checked against
/// `expectedColumnCount` afterwards.
pub fn read_csv_table(path: &str, source: &SourceConfig) -> AtlasResult<RawTable> {
    let rdr = csv::ReaderBuilder::new()
        .has_headers(false)
        .flexible(true)
        .from_path(path)
        .context(CsvOpenSnafu { path })?;
    let mut records = rdr.into_records();

    let (header, first_lineno) = match &source.headers {
        Some(h) => (h.clone(), 1),
        None => {
            let first = match records.next() {
                Some(line_r) => line_r.context(CsvLineParseSnafu { path, lineno: 1usize })?,
                None => whatever!("CSV file {} is empty", path),
            };
            (first.iter().map(|s| s.trim().to_string()).collect(), 2)
        }
    };
    debug!("read_csv_table: {} header: {:?}", path, header);

    let mut rows: Vec<(usize, Vec<String>)> = Vec::new();
    for (idx, line_r) in records.enumerate() {
        let lineno = idx + first_lineno;
        let line = line_r.context(CsvLineParseSnafu { path, lineno })?;
        // Trailing blank lines
        if line.iter().all(|s| s.trim().is_empty()) {
            continue;
        }
        rows.push((lineno, line.iter().map(|s| s.to_string()).collect()));
    }
    info!("read_csv_table: {}: {} rows", path, rows.len());
    Ok(RawTable {
        path: path.to_string(),
        header,
        rows,
    })
}

/// Writes a table with the key as first column. Missing cells are left empty.
pub fn write_table_csv(path: &str, table: &Table) -> AtlasResult<()> {
    let mut wtr = csv::Writer::from_path(path).context(WritingCsvSnafu { path })?;
    let mut header: Vec<&str> = vec!["key"];
    header.extend(table.columns.iter().map(|s| s.as_str()));
    wtr.write_record(&header).context(WritingCsvSnafu { path })?;
    for (key, cells) in table.rows.iter() {
        let mut record: Vec<String> = vec![key.to_string()];
        record.extend(cells.iter().map(|c| c.to_string()));
        wtr.write_record(&record).context(WritingCsvSnafu { path })?;
    }
    wtr.flush().context(WritingOutputSnafu { path })?;
    Ok(())
}
