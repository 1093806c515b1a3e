use log::{debug, info, warn};

use election_join::*;
use snafu::{prelude::*, Snafu};

use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use serde_json::json;
use serde_json::Map as JSMap;
use serde_json::Value as JSValue;
use text_diff::print_diff;

use crate::atlas::config_reader::*;
use crate::atlas::derived::*;
use crate::atlas::io_common::RawTable;

mod config_reader;
mod derived;
mod inset;
mod io_common;
mod io_csv;
mod io_excel;
mod io_geo;
mod io_nyt;
mod shape;

#[derive(Debug, Snafu)]
pub enum AtlasError {
    #[snafu(display("Error opening file {path}"))]
    OpeningJson {
        source: std::io::Error,
        path: String,
    },
    #[snafu(display("Error parsing JSON file {path}"))]
    ParsingJson {
        source: serde_json::Error,
        path: String,
    },
    #[snafu(display("Error opening CSV file {path}"))]
    CsvOpen { source: csv::Error, path: String },
    #[snafu(display("{path}: line {lineno} could not be read"))]
    CsvLineParse {
        source: csv::Error,
        path: String,
        lineno: usize,
    },
    #[snafu(display("{path}: line {lineno} has {found} fields, expected {expected}"))]
    RowLength {
        path: String,
        lineno: usize,
        expected: usize,
        found: usize,
    },
    #[snafu(display("{path}: no column named {column:?} in header {header:?}"))]
    MissingColumn {
        path: String,
        column: String,
        header: Vec<String>,
    },
    #[snafu(display("{path}: line {lineno}: column {column:?} is not a number: {content:?}"))]
    NotANumber {
        path: String,
        lineno: usize,
        column: String,
        content: String,
    },
    #[snafu(display("{path}: line {lineno}: column {column:?} is not a flag: {content:?}"))]
    InvalidFlag {
        path: String,
        lineno: usize,
        column: String,
        content: String,
    },
    #[snafu(display("Error opening Excel file {path}"))]
    OpeningExcel {
        source: calamine::XlsxError,
        path: String,
    },
    #[snafu(display("Excel file {path}: {reason}"))]
    EmptyExcel { path: String, reason: String },
    #[snafu(display("Error reading GeoJSON file {path}"))]
    ParsingGeoJson {
        source: geojson::Error,
        path: String,
    },
    #[snafu(display("{path}: line {lineno}: invalid key"))]
    InvalidKey {
        source: DataErrors,
        path: String,
        lineno: usize,
    },
    #[snafu(display("Error in table {table}"))]
    TableData { source: DataErrors, table: String },
    #[snafu(display("Error writing {path}"))]
    WritingOutput {
        source: std::io::Error,
        path: String,
    },
    #[snafu(display("Error writing CSV file {path}"))]
    WritingCsv { source: csv::Error, path: String },
    #[snafu(display("Configuration file {path} has no parent directory"))]
    MissingParentDir { path: String },

    #[snafu(whatever, display("{message}"))]
    Whatever {
        message: String,
        #[snafu(source(from(Box<dyn std::error::Error>, Some)))]
        source: Option<Box<dyn std::error::Error>>,
    },
}

pub type AtlasResult<T> = Result<T, AtlasError>;

const DEFAULT_PERCENTILES: [f64; 3] = [0.25, 0.5, 0.75];

fn read_source(path: &str, source: &SourceConfig) -> AtlasResult<RawTable> {
    info!("Attempting to read source {} from {:?}", source.name, path);
    let raw = match source.provider.as_str() {
        "csv" => io_csv::read_csv_table(path, source)?,
        "xlsx" => io_excel::read_xlsx_table(path, source)?,
        "nytHouse" => io_nyt::read_nyt_house(path)?,
        x => whatever!("Provider not implemented {:?}", x),
    };
    raw.check_expected(source)?;
    Ok(raw)
}

fn resolve(root: &Path, file: &str) -> String {
    let p: PathBuf = [root, Path::new(file)].iter().collect();
    p.as_path().display().to_string()
}

// Rounded to a tenth of a percent: 0.07 is "7%", 0.975 is "97.5%".
fn percentile_label(p: f64) -> String {
    format!("{}%", (p * 1000.0).round() / 10.0)
}

fn summary_to_json(s: &Summary) -> JSValue {
    let mut percentiles: JSMap<String, JSValue> = JSMap::new();
    for (p, v) in s.percentiles.iter() {
        percentiles.insert(percentile_label(*p), json!(v));
    }
    json!({
        "count": s.count,
        "mean": s.mean,
        "std": s.std,
        "min": s.min,
        "max": s.max,
        "percentiles": percentiles,
    })
}

fn numeric_column(table: &Table, column: &str) -> AtlasResult<Vec<f64>> {
    let cells = table.column(column).context(TableDataSnafu {
        table: table.name.clone(),
    })?;
    Ok(cells.iter().filter_map(|(_, c)| c.as_number()).collect())
}

fn value_counts(table: &Table, column: &str) -> AtlasResult<JSValue> {
    let cells = table.column(column).context(TableDataSnafu {
        table: table.name.clone(),
    })?;
    let mut counts: JSMap<String, JSValue> = JSMap::new();
    let mut tally: std::collections::BTreeMap<String, u64> = std::collections::BTreeMap::new();
    for (_, c) in cells {
        if !c.is_missing() {
            *tally.entry(c.to_string()).or_insert(0) += 1;
        }
    }
    for (k, v) in tally {
        counts.insert(k, json!(v));
    }
    Ok(JSValue::Object(counts))
}

fn build_summary_js(
    config: &AtlasConfig,
    table: &Table,
    regressions: &[RegressionResult],
    map_features: Option<usize>,
) -> AtlasResult<JSValue> {
    let mut summaries: JSMap<String, JSValue> = JSMap::new();
    for sc in config.summaries.iter() {
        let values = numeric_column(table, &sc.column)?;
        let percentiles = sc
            .percentiles
            .clone()
            .unwrap_or_else(|| DEFAULT_PERCENTILES.to_vec());
        let s = stats::describe(&values, &percentiles).context(TableDataSnafu {
            table: sc.column.clone(),
        })?;
        summaries.insert(sc.column.clone(), summary_to_json(&s));
    }

    let mut sums: JSMap<String, JSValue> = JSMap::new();
    for sc in config.sums.iter() {
        let label = sc.name.clone().unwrap_or_else(|| sc.column.clone());
        sums.insert(label, json!(conditional_sum(table, sc)?));
    }

    let mut counts: JSMap<String, JSValue> = JSMap::new();
    for column in config.counts.iter() {
        counts.insert(column.clone(), value_counts(table, column)?);
    }

    let electoral_votes = match &config.electoral_votes {
        Some(column) => {
            let winners: Vec<(CanonicalKey, String)> = table
                .column(column)
                .context(TableDataSnafu {
                    table: table.name.clone(),
                })?
                .into_iter()
                .filter_map(|(k, c)| c.as_text().map(|s| (k.clone(), s.to_string())))
                .collect();
            json!(metrics::electoral_vote_tally(&winners))
        }
        None => JSValue::Null,
    };

    let regs: Vec<JSValue> = regressions
        .iter()
        .map(|r| {
            json!({
                "x": r.x,
                "y": r.y,
                "n": r.n,
                "slope": r.fit.slope,
                "intercept": r.fit.intercept,
                "pearson": r.pearson,
            })
        })
        .collect();

    Ok(json!({
        "analysis": config.output_settings.analysis_name,
        "rows": table.len(),
        "columns": table.columns,
        "regressions": regs,
        "summaries": summaries,
        "sums": sums,
        "counts": counts,
        "electoralVotes": electoral_votes,
        "mapFeatures": map_features,
    }))
}

/// Runs one analysis end to end.
///
/// Arguments:
/// * `config_path` the JSON description of the analysis. The paths it mentions are
/// relative to its directory.
/// * `out` overrides the output directory. `stdout` only prints the summary.
/// * `check_summary_path` a reference summary that the computed one must match.
pub fn run_analysis(
    config_path: &str,
    out: Option<String>,
    check_summary_path: Option<String>,
) -> AtlasResult<JSValue> {
    let config = read_config(config_path)?;
    debug!("config: {:?}", config);
    let root_p = Path::new(config_path)
        .parent()
        .context(MissingParentDirSnafu { path: config_path })?;

    if config.sources.is_empty() {
        whatever!("No source in configuration {}", config_path);
    }
    validate_source_names(&config.sources)?;
    let join_kind = validate_join(&config.join)?;
    let metrics: Vec<Metric> = config
        .metrics
        .iter()
        .map(validate_metric)
        .collect::<AtlasResult<Vec<Metric>>>()?;

    let mut tables: Vec<Table> = Vec::new();
    for source in config.sources.iter() {
        let key_spec = validate_source(source)?;
        let path = resolve(root_p, &source.file_path);
        let raw = read_source(&path, source)?;
        let table = shape::shape_source(&raw, source, &key_spec)?;
        info!(
            "Source {}: {} rows, columns {:?}",
            table.name,
            table.len(),
            table.columns
        );
        tables.push(table);
    }

    let mut joined = join_tables(&tables, join_kind).context(TableDataSnafu {
        table: "join".to_string(),
    })?;
    info!("Joined table: {} rows", joined.len());

    apply_metrics(&mut joined, &metrics)?;
    let regressions = run_regressions(&mut joined, &config.regressions)?;

    let map = match &config.geometry {
        Some(gc) => {
            let path = resolve(root_p, &gc.file_path);
            Some(io_geo::merge_geometry(&path, gc, &joined)?)
        }
        None => None,
    };

    let summary_js = build_summary_js(
        &config,
        &joined,
        &regressions,
        map.as_ref().map(|m| m.features.len()),
    )?;
    let pretty_js_stats = serde_json::to_string_pretty(&summary_js).context(ParsingJsonSnafu {
        path: "summary".to_string(),
    })?;

    let out_dir = out.or_else(|| config.output_settings.output_directory.clone());
    match out_dir.as_deref() {
        Some("stdout") => {
            println!("{}", pretty_js_stats);
        }
        _ => {
            let dir = match &out_dir {
                Some(d) => PathBuf::from(d),
                None => root_p.to_path_buf(),
            };
            fs::create_dir_all(&dir).context(WritingOutputSnafu {
                path: dir.display().to_string(),
            })?;
            let dir_s = dir.display().to_string();
            let settings = &config.output_settings;

            let table_path = resolve(&dir, settings.table_file.as_deref().unwrap_or("table.csv"));
            io_csv::write_table_csv(&table_path, &joined)?;
            info!("Wrote table to {}", table_path);

            if let Some(fc) = &map {
                let map_path = resolve(&dir, settings.map_file.as_deref().unwrap_or("map.geojson"));
                io_geo::write_geojson(&map_path, fc)?;
                info!("Wrote map to {}", map_path);
            }

            let summary_path = resolve(
                &dir,
                settings.summary_file.as_deref().unwrap_or("summary.json"),
            );
            fs::write(&summary_path, &pretty_js_stats).context(WritingOutputSnafu {
                path: summary_path.clone(),
            })?;
            info!("Wrote summary to {} (output directory {})", summary_path, dir_s);
        }
    }

    // The reference summary, if provided for comparison
    if let Some(summary_p) = check_summary_path {
        let summary_ref = read_summary(&summary_p)?;
        let pretty_js_summary_ref =
            serde_json::to_string_pretty(&summary_ref).context(ParsingJsonSnafu {
                path: summary_p.clone(),
            })?;
        if pretty_js_summary_ref != pretty_js_stats {
            warn!("Found differences with the reference summary {}", summary_p);
            print_diff(
                pretty_js_summary_ref.as_str(),
                pretty_js_stats.as_ref(),
                "\n",
            );
            whatever!("Difference detected between calculated summary and reference summary")
        }
    }
    Ok(summary_js)
}
