// Turns raw rows into a keyed table: filters, key normalization, output
// columns, pivots and swaps.

use std::collections::HashSet;

use election_join::builder::TableBuilder;
use election_join::keys::KeySpec;

use crate::atlas::io_common::{parse_number, RawTable};
use crate::atlas::*;

struct ColumnPlan {
    name: String,
    sum: Vec<(String, usize)>,
    text: Option<usize>,
}

struct PivotPlan {
    label_idx: usize,
    value_column: String,
    value_idx: usize,
    // (output column, labels)
    columns: Vec<(String, HashSet<String>)>,
}

enum FilterPlan {
    OneOf(usize, HashSet<String>),
    NotEmpty(usize),
}

fn plan_filters(raw: &RawTable, source: &SourceConfig) -> AtlasResult<Vec<FilterPlan>> {
    let mut res: Vec<FilterPlan> = Vec::new();
    for f in source.filters.iter() {
        let idx = raw.column_index(&f.column)?;
        match (&f.one_of, f.not_empty) {
            (Some(values), _) => {
                res.push(FilterPlan::OneOf(idx, values.iter().cloned().collect()));
                if f.not_empty == Some(true) {
                    res.push(FilterPlan::NotEmpty(idx));
                }
            }
            (None, Some(true)) => res.push(FilterPlan::NotEmpty(idx)),
            _ => whatever!(
                "Source {}: filter on {} needs oneOf or notEmpty",
                source.name,
                f.column
            ),
        }
    }
    Ok(res)
}

fn keep_row(filters: &[FilterPlan], row: &[String]) -> bool {
    filters.iter().all(|f| match f {
        FilterPlan::OneOf(idx, values) => values.contains(RawTable::field(row, *idx).trim()),
        FilterPlan::NotEmpty(idx) => !RawTable::field(row, *idx).trim().is_empty(),
    })
}

fn plan_columns(raw: &RawTable, source: &SourceConfig) -> AtlasResult<Vec<ColumnPlan>> {
    let mut res: Vec<ColumnPlan> = Vec::new();
    for c in source.columns.iter() {
        let sum = match &c.sum {
            Some(cols) => cols
                .iter()
                .map(|s| raw.column_index(s).map(|idx| (s.clone(), idx)))
                .collect::<AtlasResult<Vec<(String, usize)>>>()?,
            None => vec![],
        };
        let text = match &c.text {
            Some(t) => Some(raw.column_index(t)?),
            None => None,
        };
        res.push(ColumnPlan {
            name: c.name.clone(),
            sum,
            text,
        });
    }
    Ok(res)
}

fn plan_pivot(raw: &RawTable, pivot: &PivotConfig) -> AtlasResult<PivotPlan> {
    Ok(PivotPlan {
        label_idx: raw.column_index(&pivot.label_column)?,
        value_column: pivot.value_column.clone(),
        value_idx: raw.column_index(&pivot.value_column)?,
        columns: pivot
            .columns
            .iter()
            .map(|c| (c.name.clone(), c.labels.iter().cloned().collect()))
            .collect(),
    })
}

/// Reads a swap flag: any non-zero number or `true` is set, zero, `false`
/// and blank are not. Anything else is an error.
fn parse_flag(raw: &RawTable, lineno: usize, column: &str, content: &str) -> AtlasResult<bool> {
    let s = content.trim();
    if s.is_empty() {
        return Ok(false);
    }
    if s.eq_ignore_ascii_case("true") {
        return Ok(true);
    }
    if s.eq_ignore_ascii_case("false") {
        return Ok(false);
    }
    match s.parse::<f64>() {
        Ok(x) if !x.is_nan() => Ok(x != 0.0),
        _ => InvalidFlagSnafu {
            path: raw.path.clone(),
            lineno,
            column,
            content: s,
        }
        .fail(),
    }
}

/// Builds the table of one source.
pub fn shape_source(raw: &RawTable, source: &SourceConfig, key_spec: &KeySpec) -> AtlasResult<Table> {
    let key_idxs: Vec<usize> = key_spec
        .columns()
        .iter()
        .map(|c| raw.column_index(c))
        .collect::<AtlasResult<Vec<usize>>>()?;
    let filters = plan_filters(raw, source)?;
    let column_plans = plan_columns(raw, source)?;
    let pivot_plan = match &source.pivot {
        Some(p) => Some(plan_pivot(raw, p)?),
        None => None,
    };
    let swap_idxs = match &source.swap {
        Some(s) => Some((
            s.flag_column.as_str(),
            raw.column_index(&s.flag_column)?,
            raw.column_index(&s.columns[0])?,
            raw.column_index(&s.columns[1])?,
        )),
        None => None,
    };
    let excluded: Vec<String> = source.exclude_keys_containing.clone().unwrap_or_default();
    let skip_invalid = source.skip_invalid_keys.unwrap_or(false);

    let mut output_columns: Vec<String> = column_plans.iter().map(|c| c.name.clone()).collect();
    if let Some(p) = &pivot_plan {
        output_columns.extend(p.columns.iter().map(|(name, _)| name.clone()));
    }
    let numeric_columns: Vec<usize> = output_columns
        .iter()
        .enumerate()
        .filter(|(idx, _)| match column_plans.get(*idx) {
            Some(c) => c.text.is_none(),
            None => true,
        })
        .map(|(idx, _)| idx)
        .collect();

    let table_err = || TableDataSnafu {
        table: source.name.clone(),
    };
    let mut builder = TableBuilder::new(&source.name, &output_columns);
    let mut filtered = 0;
    let mut skipped = 0;
    for (lineno, row0) in raw.rows.iter() {
        let lineno = *lineno;
        if !keep_row(&filters, row0) {
            filtered += 1;
            continue;
        }
        let key_fields: Vec<&str> = key_idxs.iter().map(|idx| RawTable::field(row0, *idx)).collect();
        let key = match key_spec.normalize(&key_fields) {
            Ok(k) => k,
            Err(e) if skip_invalid => {
                warn!("{}: line {}: skipping row: {}", raw.path, lineno, e);
                skipped += 1;
                continue;
            }
            Err(e) => {
                return Err(e).context(InvalidKeySnafu {
                    path: raw.path.clone(),
                    lineno,
                })
            }
        };
        if excluded.iter().any(|x| key.as_str().contains(x.as_str())) {
            debug!("shape_source: {}: excluding key {}", source.name, key);
            filtered += 1;
            continue;
        }

        let mut row: Vec<String> = row0.clone();
        if let Some((flag, flag_idx, a, b)) = swap_idxs {
            let set = parse_flag(raw, lineno, flag, RawTable::field(&row, flag_idx))?;
            if set && a < row.len() && b < row.len() {
                row.swap(a, b);
            }
        }

        builder.touch(&key);
        for plan in column_plans.iter() {
            let cell = if let Some(idx) = plan.text {
                let s = RawTable::field(&row, idx).trim();
                if s.is_empty() {
                    Cell::Missing
                } else {
                    Cell::Text(s.to_string())
                }
            } else {
                let mut total: Option<f64> = None;
                for (name, idx) in plan.sum.iter() {
                    if let Some(x) = parse_number(raw, lineno, name, RawTable::field(&row, *idx))? {
                        total = Some(total.unwrap_or(0.0) + x);
                    }
                }
                total.map(Cell::Number).unwrap_or(Cell::Missing)
            };
            builder.add(&key, &plan.name, cell).with_context(|_| table_err())?;
        }
        if let Some(p) = &pivot_plan {
            let label = RawTable::field(&row, p.label_idx).trim();
            for (name, labels) in p.columns.iter() {
                if labels.contains(label) {
                    let value = parse_number(
                        raw,
                        lineno,
                        &p.value_column,
                        RawTable::field(&row, p.value_idx),
                    )?;
                    if let Some(x) = value {
                        builder.add(&key, name, Cell::Number(x)).with_context(|_| table_err())?;
                    }
                }
            }
        }
    }

    if let Some(tf) = &source.total_filter {
        let (min, max) = (tf.min, tf.max);
        builder.retain(|key, cells| {
            let total: f64 = numeric_columns
                .iter()
                .filter_map(|idx| cells.get(*idx).and_then(|c| c.as_number()))
                .sum();
            let keep = min.map(|m| total >= m).unwrap_or(true) && max.map(|m| total <= m).unwrap_or(true);
            if !keep {
                debug!("shape_source: dropping {} with total {}", key, total);
            }
            keep
        });
    }

    let table = builder.build();
    info!(
        "shape_source: {}: {} keys ({} rows filtered, {} rows with invalid keys)",
        source.name,
        table.len(),
        filtered,
        skipped
    );
    Ok(table)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::atlas::config_reader::validate_source;

    fn raw(header: &[&str], rows: &[&[&str]]) -> RawTable {
        RawTable {
            path: "test.csv".to_string(),
            header: header.iter().map(|s| s.to_string()).collect(),
            rows: rows
                .iter()
                .enumerate()
                .map(|(i, r)| (i + 2, r.iter().map(|s| s.to_string()).collect()))
                .collect(),
        }
    }

    fn source(js: JSValue) -> SourceConfig {
        serde_json::from_value(js).unwrap()
    }

    fn shape(raw: &RawTable, source: &SourceConfig) -> AtlasResult<Table> {
        let spec = validate_source(source)?;
        shape_source(raw, source, &spec)
    }

    fn key(s: &str) -> CanonicalKey {
        CanonicalKey(s.to_string())
    }

    #[test]
    fn fusion_lines_and_precinct_keys() {
        let r = raw(
            &["AD", "ED", "Rep", "Con", "Dem"],
            &[
                &["65", "1", "100", "20", "300"],
                &["65", "2", "", "", "50"],
                &["61", "7", "1", "1", "1"],
            ],
        );
        let s = source(json!({
            "name": "nyc",
            "provider": "csv",
            "filePath": "x.csv",
            "key": {"parts": [
                {"column": "ED", "rules": ["integer", "zeroPad:3"]},
                {"column": "AD", "rules": ["integer"]}
            ], "separator": "/"},
            "columns": [
                {"name": "trump", "sum": ["Rep", "Con"]},
                {"name": "biden", "sum": ["Dem"]}
            ],
            "excludeKeysContaining": ["/61"]
        }));
        let t = shape(&r, &s).unwrap();
        assert_eq!(t.len(), 2);
        assert_eq!(t.get(&key("001/65"), "trump").unwrap(), &Cell::Number(120.0));
        assert_eq!(t.get(&key("002/65"), "trump").unwrap(), &Cell::Missing);
        assert_eq!(t.get(&key("002/65"), "biden").unwrap(), &Cell::Number(50.0));
    }

    #[test]
    fn pivot_with_filter() {
        let r = raw(
            &["year", "county_fips", "party", "candidatevotes"],
            &[
                &["2020", "1001", "DEMOCRAT", "40"],
                &["2020", "1001", "REPUBLICAN", "50"],
                &["2020", "1001", "REPUBLICAN", "10"],
                &["2020", "1001", "GREEN", "3"],
                &["2016", "1001", "DEMOCRAT", "999"],
            ],
        );
        let s = source(json!({
            "name": "counties",
            "provider": "csv",
            "filePath": "x.csv",
            "key": {"parts": [{"column": "county_fips", "rules": ["integer", "zeroPad:5"]}]},
            "filters": [{"column": "year", "oneOf": ["2020"]}],
            "pivot": {
                "labelColumn": "party",
                "valueColumn": "candidatevotes",
                "columns": [
                    {"name": "dem", "labels": ["DEMOCRAT"]},
                    {"name": "rep", "labels": ["REPUBLICAN"]}
                ]
            }
        }));
        let t = shape(&r, &s).unwrap();
        assert_eq!(t.len(), 1);
        assert_eq!(t.get(&key("01001"), "dem").unwrap(), &Cell::Number(40.0));
        assert_eq!(t.get(&key("01001"), "rep").unwrap(), &Cell::Number(60.0));
    }

    #[test]
    fn swap_and_total_filter() {
        let r = raw(
            &["fips", "Switch", "a", "b"],
            &[&["01001", "1", "10", "30"], &["01003", "0", "0", "0"]],
        );
        let s = source(json!({
            "name": "feed",
            "provider": "csv",
            "filePath": "x.csv",
            "key": {"parts": [{"column": "fips"}]},
            "columns": [{"name": "biden", "sum": ["a"]}, {"name": "trump", "sum": ["b"]}],
            "swap": {"flagColumn": "Switch", "columns": ["a", "b"]},
            "totalFilter": {"min": 1}
        }));
        let t = shape(&r, &s).unwrap();
        assert_eq!(t.len(), 1);
        assert_eq!(t.get(&key("01001"), "biden").unwrap(), &Cell::Number(30.0));
        assert_eq!(t.get(&key("01001"), "trump").unwrap(), &Cell::Number(10.0));
    }

    fn swap_source() -> SourceConfig {
        source(json!({
            "name": "feed",
            "provider": "csv",
            "filePath": "x.csv",
            "key": {"parts": [{"column": "fips"}]},
            "columns": [{"name": "biden", "sum": ["a"]}, {"name": "trump", "sum": ["b"]}],
            "swap": {"flagColumn": "Switch", "columns": ["a", "b"]}
        }))
    }

    #[test]
    fn numeric_and_boolean_flags() {
        let r = raw(
            &["fips", "Switch", "a", "b"],
            &[
                &["01001", "1.0", "10", "30"],
                &["01003", "-1", "20", "40"],
                &["01005", "0.0", "50", "60"],
                &["01007", "", "70", "80"],
                &["01009", "TRUE", "1", "2"],
                &["01011", "false", "3", "4"],
            ],
        );
        let t = shape(&r, &swap_source()).unwrap();
        assert_eq!(t.get(&key("01001"), "biden").unwrap(), &Cell::Number(30.0));
        assert_eq!(t.get(&key("01003"), "biden").unwrap(), &Cell::Number(40.0));
        assert_eq!(t.get(&key("01005"), "biden").unwrap(), &Cell::Number(50.0));
        assert_eq!(t.get(&key("01007"), "biden").unwrap(), &Cell::Number(70.0));
        assert_eq!(t.get(&key("01009"), "biden").unwrap(), &Cell::Number(2.0));
        assert_eq!(t.get(&key("01011"), "biden").unwrap(), &Cell::Number(3.0));
    }

    #[test]
    fn unreadable_flag() {
        let r = raw(
            &["fips", "Switch", "a", "b"],
            &[&["01001", "0", "10", "30"], &["01003", "maybe", "20", "40"]],
        );
        match shape(&r, &swap_source()) {
            Err(AtlasError::InvalidFlag {
                lineno, column, content, ..
            }) => {
                assert_eq!(lineno, 3);
                assert_eq!(column, "Switch");
                assert_eq!(content, "maybe");
            }
            x => panic!("unexpected result: {:?}", x.map(|t| t.len())),
        }
    }

    #[test]
    fn invalid_keys() {
        let r = raw(&["state", "votes"], &[&["Atlantis", "3"], &["Ohio", "5"]]);
        let mut s = source(json!({
            "name": "states",
            "provider": "csv",
            "filePath": "x.csv",
            "key": {"parts": [{"column": "state", "rules": ["stateName"]}]},
            "columns": [{"name": "votes", "sum": ["votes"]}]
        }));
        assert!(matches!(
            shape(&r, &s),
            Err(AtlasError::InvalidKey { lineno: 2, .. })
        ));
        s.skip_invalid_keys = Some(true);
        let t = shape(&r, &s).unwrap();
        assert_eq!(t.len(), 1);
        assert_eq!(t.get(&key("OH"), "votes").unwrap(), &Cell::Number(5.0));
    }

    #[test]
    fn bad_number() {
        let r = raw(&["fips", "votes"], &[&["01001", "12"], &["01003", "many"]]);
        let s = source(json!({
            "name": "counties",
            "provider": "csv",
            "filePath": "x.csv",
            "key": {"parts": [{"column": "fips"}]},
            "columns": [{"name": "votes", "sum": ["votes"]}]
        }));
        assert!(matches!(
            shape(&r, &s),
            Err(AtlasError::NotANumber { lineno: 3, .. })
        ));
    }
}
