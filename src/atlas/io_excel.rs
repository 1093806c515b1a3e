use calamine::{open_workbook, DataType, Reader, Xlsx};

use crate::atlas::io_common::{simplify_file_name, RawTable};
use crate::atlas::*;

/// Reads a worksheet: the named one, or the first one of the workbook.
/// The first row is the header unless the source provides `headers`.
pub fn read_xlsx_table(path: &str, source: &SourceConfig) -> AtlasResult<RawTable> {
    let mut workbook: Xlsx<_> = open_workbook(path).context(OpeningExcelSnafu { path })?;
    let range_o = match &source.worksheet {
        Some(name) => workbook.worksheet_range(name),
        None => workbook.worksheet_range_at(0),
    };
    let wrange = range_o
        .context(EmptyExcelSnafu {
            path,
            reason: format!("no worksheet {:?}", source.worksheet),
        })?
        .context(OpeningExcelSnafu { path })?;

    let mut iter = wrange.rows();
    let (header, first_lineno) = match &source.headers {
        Some(h) => (h.clone(), 1),
        None => {
            let first = iter.next().context(EmptyExcelSnafu {
                path,
                reason: "no header row".to_string(),
            })?;
            (first.iter().map(|c| cell_to_string(c).trim().to_string()).collect(), 2)
        }
    };
    debug!(
        "read_xlsx_table: {}: header: {:?}",
        simplify_file_name(path),
        header
    );

    let mut rows: Vec<(usize, Vec<String>)> = Vec::new();
    for (idx, row) in iter.enumerate() {
        let fields: Vec<String> = row.iter().map(cell_to_string).collect();
        if fields.iter().all(|s| s.trim().is_empty()) {
            continue;
        }
        rows.push((idx + first_lineno, fields));
    }
    info!("read_xlsx_table: {}: {} rows", path, rows.len());
    Ok(RawTable {
        path: path.to_string(),
        header,
        rows,
    })
}

/// Excel stores every number as a float: integral values are written without
/// a decimal part so that codes such as FIPS survive.
fn cell_to_string(cell: &DataType) -> String {
    match cell {
        DataType::String(s) => s.clone(),
        DataType::Int(i) => i.to_string(),
        DataType::Float(f) if f.fract() == 0.0 && f.abs() < 1e15 => format!("{}", *f as i64),
        DataType::Float(f) => f.to_string(),
        DataType::Bool(b) => b.to_string(),
        DataType::Empty => "".to_string(),
        x => {
            warn!("cell_to_string: unexpected cell {:?}", x);
            "".to_string()
        }
    }
}
