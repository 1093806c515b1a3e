use crate::atlas::*;

use election_join::keys::{KeyPart, KeyRule, KeySpec};

#[derive(PartialEq, Debug, Clone, Serialize, Deserialize)]
pub struct OutputSettings {
    #[serde(rename = "analysisName")]
    pub analysis_name: String,
    #[serde(rename = "outputDirectory")]
    pub output_directory: Option<String>,
    #[serde(rename = "tableFile")]
    pub table_file: Option<String>,
    #[serde(rename = "mapFile")]
    pub map_file: Option<String>,
    #[serde(rename = "summaryFile")]
    pub summary_file: Option<String>,
}

#[derive(PartialEq, Debug, Clone, Serialize, Deserialize)]
pub struct KeyPartConfig {
    pub column: String,
    #[serde(default)]
    pub rules: Vec<String>,
}

#[derive(PartialEq, Debug, Clone, Serialize, Deserialize)]
pub struct KeyConfig {
    pub parts: Vec<KeyPartConfig>,
    #[serde(default)]
    pub separator: String,
    #[serde(default)]
    pub rules: Vec<String>,
}

#[derive(PartialEq, Debug, Clone, Serialize, Deserialize)]
pub struct FilterConfig {
    pub column: String,
    #[serde(rename = "oneOf")]
    pub one_of: Option<Vec<String>>,
    #[serde(rename = "notEmpty")]
    pub not_empty: Option<bool>,
}

/// An output column, either the sum of raw numeric columns or a raw text column.
#[derive(PartialEq, Debug, Clone, Serialize, Deserialize)]
pub struct ColumnConfig {
    pub name: String,
    pub sum: Option<Vec<String>>,
    pub text: Option<String>,
}

#[derive(PartialEq, Debug, Clone, Serialize, Deserialize)]
pub struct PivotColumnConfig {
    pub name: String,
    pub labels: Vec<String>,
}

/// Turns long rows (one row per key and label) into one column per label group.
#[derive(PartialEq, Debug, Clone, Serialize, Deserialize)]
pub struct PivotConfig {
    #[serde(rename = "labelColumn")]
    pub label_column: String,
    #[serde(rename = "valueColumn")]
    pub value_column: String,
    pub columns: Vec<PivotColumnConfig>,
}

#[derive(PartialEq, Debug, Clone, Serialize, Deserialize)]
pub struct SwapConfig {
    #[serde(rename = "flagColumn")]
    pub flag_column: String,
    pub columns: Vec<String>,
}

#[derive(PartialEq, Debug, Clone, Serialize, Deserialize)]
pub struct TotalFilterConfig {
    pub min: Option<f64>,
    pub max: Option<f64>,
}

#[derive(PartialEq, Debug, Clone, Serialize, Deserialize)]
pub struct SourceConfig {
    pub name: String,
    pub provider: String,
    #[serde(rename = "filePath")]
    pub file_path: String,
    /// Names of the columns of a file without a header row, by position.
    pub headers: Option<Vec<String>>,
    #[serde(rename = "expectedColumns")]
    pub expected_columns: Option<Vec<String>>,
    #[serde(rename = "expectedColumnCount")]
    pub expected_column_count: Option<usize>,
    pub worksheet: Option<String>,
    pub key: KeyConfig,
    #[serde(default)]
    pub filters: Vec<FilterConfig>,
    #[serde(default)]
    pub columns: Vec<ColumnConfig>,
    pub pivot: Option<PivotConfig>,
    pub swap: Option<SwapConfig>,
    #[serde(rename = "totalFilter")]
    pub total_filter: Option<TotalFilterConfig>,
    #[serde(rename = "excludeKeysContaining")]
    pub exclude_keys_containing: Option<Vec<String>>,
    #[serde(rename = "skipInvalidKeys")]
    pub skip_invalid_keys: Option<bool>,
}

#[derive(PartialEq, Debug, Clone, Serialize, Deserialize)]
pub struct MetricConfig {
    pub kind: String,
    pub output: String,
    pub democrat: Option<String>,
    pub republican: Option<String>,
    #[serde(rename = "democratBefore")]
    pub democrat_before: Option<String>,
    #[serde(rename = "republicanBefore")]
    pub republican_before: Option<String>,
    pub total: Option<String>,
    pub candidates: Option<Vec<String>>,
    pub house: Option<String>,
    pub column: Option<String>,
    pub left: Option<String>,
    pub right: Option<String>,
    pub factor: Option<f64>,
}

#[derive(PartialEq, Debug, Clone, Serialize, Deserialize)]
pub struct RegressionConfig {
    pub x: String,
    pub y: String,
    #[serde(rename = "residualOutput")]
    pub residual_output: Option<String>,
}

#[derive(PartialEq, Debug, Clone, Serialize, Deserialize)]
pub struct SummaryConfig {
    pub column: String,
    pub percentiles: Option<Vec<f64>>,
}

#[derive(PartialEq, Debug, Clone, Serialize, Deserialize)]
pub struct WhereConfig {
    pub column: String,
    pub equals: String,
}

/// Total of a numeric column, optionally over the rows where another column
/// has a given value.
#[derive(PartialEq, Debug, Clone, Serialize, Deserialize)]
pub struct SumConfig {
    pub name: Option<String>,
    pub column: String,
    #[serde(rename = "where")]
    pub where_: Option<WhereConfig>,
}

#[derive(PartialEq, Debug, Clone, Serialize, Deserialize)]
pub struct InsetConfig {
    pub property: String,
    pub value: String,
    pub scale: Option<[f64; 2]>,
    pub translate: Option<[f64; 2]>,
}

#[derive(PartialEq, Debug, Clone, Serialize, Deserialize)]
pub struct GeometryConfig {
    #[serde(rename = "filePath")]
    pub file_path: String,
    pub key: KeyConfig,
    pub join: Option<String>,
    pub insets: Option<Vec<InsetConfig>>,
    #[serde(rename = "skipInvalidKeys")]
    pub skip_invalid_keys: Option<bool>,
}

#[derive(PartialEq, Debug, Clone, Serialize, Deserialize)]
pub struct AtlasConfig {
    #[serde(rename = "outputSettings")]
    pub output_settings: OutputSettings,
    pub sources: Vec<SourceConfig>,
    pub join: Option<String>,
    #[serde(default)]
    pub metrics: Vec<MetricConfig>,
    #[serde(default)]
    pub regressions: Vec<RegressionConfig>,
    #[serde(default)]
    pub summaries: Vec<SummaryConfig>,
    #[serde(default)]
    pub sums: Vec<SumConfig>,
    #[serde(default)]
    pub counts: Vec<String>,
    #[serde(rename = "electoralVotes")]
    pub electoral_votes: Option<String>,
    pub geometry: Option<GeometryConfig>,
}

pub fn read_config(path: &str) -> AtlasResult<AtlasConfig> {
    let contents = fs::read_to_string(path).context(OpeningJsonSnafu { path })?;
    let config: AtlasConfig =
        serde_json::from_str(&contents).context(ParsingJsonSnafu { path })?;
    Ok(config)
}

pub fn read_summary(path: &str) -> AtlasResult<JSValue> {
    let contents = fs::read_to_string(path).context(OpeningJsonSnafu { path })?;
    let js: JSValue = serde_json::from_str(contents.as_str()).context(ParsingJsonSnafu { path })?;
    Ok(js)
}

pub fn validate_rule(rule: &str) -> AtlasResult<KeyRule> {
    let (name, arg) = match rule.split_once(':') {
        Some((n, a)) => (n, Some(a)),
        None => (rule, None),
    };
    let res = match (name, arg) {
        ("trim", None) => KeyRule::Trim,
        ("upper", None) => KeyRule::Upper,
        ("zeroPad", Some(n)) => match n.parse::<usize>() {
            Ok(width) if width > 0 => KeyRule::ZeroPad(width),
            x => whatever!("Invalid width in key rule {:?}: {:?}", rule, x),
        },
        ("integer", None) => KeyRule::Integer,
        ("takeAfter", Some(sep)) if !sep.is_empty() => KeyRule::TakeAfter(sep.to_string()),
        ("stripPrefix", Some(p)) if !p.is_empty() => KeyRule::StripPrefix(p.to_string()),
        ("stateName", None) => KeyRule::StateName,
        ("stateFips", None) => KeyRule::StateFips,
        ("congressionalDistrict", None) => KeyRule::CongressionalDistrict,
        _ => whatever!("Unknown key rule {:?}", rule),
    };
    Ok(res)
}

fn validate_rules(rules: &[String]) -> AtlasResult<Vec<KeyRule>> {
    rules.iter().map(|r| validate_rule(r)).collect()
}

pub fn validate_key(key: &KeyConfig) -> AtlasResult<KeySpec> {
    if key.parts.is_empty() {
        whatever!("A key needs at least one column");
    }
    let mut parts: Vec<KeyPart> = Vec::new();
    for p in key.parts.iter() {
        parts.push(KeyPart {
            column: p.column.clone(),
            rules: validate_rules(&p.rules)?,
        });
    }
    Ok(KeySpec {
        parts,
        separator: key.separator.clone(),
        rules: validate_rules(&key.rules)?,
    })
}

pub fn validate_join(join: &Option<String>) -> AtlasResult<JoinKind> {
    match join.as_deref() {
        None | Some("inner") => Ok(JoinKind::Inner),
        Some("outer") => Ok(JoinKind::Outer),
        Some(x) => whatever!("Unknown join type {:?}: expected inner or outer", x),
    }
}

pub fn validate_source_names(sources: &[SourceConfig]) -> AtlasResult<()> {
    for (idx, source) in sources.iter().enumerate() {
        if sources[..idx].iter().any(|s| s.name == source.name) {
            whatever!("Source name {:?} is used more than once", source.name);
        }
    }
    Ok(())
}

/// Checks the parts of a source that do not depend on the data.
pub fn validate_source(source: &SourceConfig) -> AtlasResult<KeySpec> {
    match source.provider.as_str() {
        "csv" | "xlsx" | "nytHouse" => {}
        x => whatever!("Source {}: provider not implemented {:?}", source.name, x),
    }
    if source.columns.is_empty() && source.pivot.is_none() {
        whatever!("Source {}: no columns and no pivot", source.name);
    }
    for c in source.columns.iter() {
        match (&c.sum, &c.text) {
            (Some(cols), None) if !cols.is_empty() => {}
            (None, Some(_)) => {}
            _ => whatever!(
                "Source {}: column {} needs either a non-empty sum or a text column",
                source.name,
                c.name
            ),
        }
    }
    if let Some(swap) = &source.swap {
        if swap.columns.len() != 2 {
            whatever!("Source {}: swap needs exactly 2 columns", source.name);
        }
    }
    validate_key(&source.key)
}

pub fn validate_metric(m: &MetricConfig) -> AtlasResult<Metric> {
    fn req(m: &MetricConfig, field: &Option<String>, name: &str) -> AtlasResult<String> {
        match field {
            Some(x) => Ok(x.clone()),
            None => whatever!("Metric {} ({}): missing field {:?}", m.output, m.kind, name),
        }
    }
    let kind = match m.kind.as_str() {
        "twoPartyShare" => MetricKind::TwoPartyShare {
            democrat: req(m, &m.democrat, "democrat")?,
            republican: req(m, &m.republican, "republican")?,
        },
        "margin" => MetricKind::Margin {
            democrat: req(m, &m.democrat, "democrat")?,
            republican: req(m, &m.republican, "republican")?,
        },
        "swing" => MetricKind::Swing {
            before: (
                req(m, &m.democrat_before, "democratBefore")?,
                req(m, &m.republican_before, "republicanBefore")?,
            ),
            after: (
                req(m, &m.democrat, "democrat")?,
                req(m, &m.republican, "republican")?,
            ),
        },
        "lead" => MetricKind::Lead {
            democrat: req(m, &m.democrat, "democrat")?,
            republican: req(m, &m.republican, "republican")?,
            total: req(m, &m.total, "total")?,
        },
        "winner" => MetricKind::Winner {
            democrat: req(m, &m.democrat, "democrat")?,
            republican: req(m, &m.republican, "republican")?,
        },
        "plurality" => match &m.candidates {
            Some(c) if !c.is_empty() => MetricKind::Plurality {
                candidates: c.clone(),
            },
            _ => whatever!("Metric {}: plurality needs candidates", m.output),
        },
        "concordance" => MetricKind::Concordance {
            democrat: req(m, &m.democrat, "democrat")?,
            republican: req(m, &m.republican, "republican")?,
            house: req(m, &m.house, "house")?,
        },
        "scaleByMax" => MetricKind::ScaleByMax {
            column: req(m, &m.column, "column")?,
        },
        "difference" => MetricKind::Difference {
            left: req(m, &m.left, "left")?,
            right: req(m, &m.right, "right")?,
        },
        "ratio" => {
            let factor = m.factor.unwrap_or(1.0);
            if !factor.is_finite() {
                whatever!("Metric {}: invalid factor {}", m.output, factor);
            }
            MetricKind::Ratio {
                numerator: req(m, &m.left, "left")?,
                denominator: m.right.clone(),
                factor,
            }
        }
        x => whatever!("Metric {}: kind not implemented {:?}", m.output, x),
    };
    Ok(Metric {
        output: m.output.clone(),
        kind,
    })
}
