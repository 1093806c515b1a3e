// ********* Table data structures ***********

use std::collections::BTreeMap;
use std::error::Error;
use std::fmt::Display;

/// A join key after normalization.
///
/// All the tables merged in one analysis must produce their keys through a
/// [`crate::keys::KeySpec`] so that they agree on padding, case and district
/// numbering.
#[derive(Eq, PartialEq, Debug, Clone, Hash, Ord, PartialOrd)]
pub struct CanonicalKey(pub String);

impl CanonicalKey {
    pub fn as_str(&self) -> &str {
        self.0.as_str()
    }
}

impl Display for CanonicalKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// The content of one column for one row.
#[derive(PartialEq, Debug, Clone)]
pub enum Cell {
    Number(f64),
    Text(String),
    /// No value for this key in this column. Outer joins use it for the
    /// tables that do not contain a key.
    Missing,
}

impl Cell {
    pub fn as_number(&self) -> Option<f64> {
        match self {
            Cell::Number(x) => Some(*x),
            _ => None,
        }
    }

    pub fn as_text(&self) -> Option<&str> {
        match self {
            Cell::Text(s) => Some(s.as_str()),
            _ => None,
        }
    }

    pub fn is_missing(&self) -> bool {
        matches!(self, Cell::Missing)
    }
}

impl Display for Cell {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Cell::Number(x) => write!(f, "{}", x),
            Cell::Text(s) => write!(f, "{}", s),
            Cell::Missing => Ok(()),
        }
    }
}

/// A table of results keyed by canonical key.
///
/// Rows are kept sorted by key. Every row holds exactly one cell per column.
#[derive(PartialEq, Debug, Clone)]
pub struct Table {
    pub name: String,
    pub columns: Vec<String>,
    pub rows: BTreeMap<CanonicalKey, Vec<Cell>>,
}

impl Table {
    pub fn new(name: &str, columns: &[String]) -> Table {
        Table {
            name: name.to_string(),
            columns: columns.to_vec(),
            rows: BTreeMap::new(),
        }
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn column_index(&self, column: &str) -> Result<usize, DataErrors> {
        self.columns
            .iter()
            .position(|c| c == column)
            .ok_or_else(|| DataErrors::UnknownColumn {
                table: self.name.clone(),
                column: column.to_string(),
            })
    }

    pub fn get(&self, key: &CanonicalKey, column: &str) -> Result<&Cell, DataErrors> {
        let idx = self.column_index(column)?;
        let row = self
            .rows
            .get(key)
            .ok_or_else(|| DataErrors::UnknownKey {
                table: self.name.clone(),
                key: key.clone(),
            })?;
        Ok(&row[idx])
    }

    /// All the cells of one column, in key order.
    pub fn column(&self, column: &str) -> Result<Vec<(&CanonicalKey, &Cell)>, DataErrors> {
        let idx = self.column_index(column)?;
        Ok(self.rows.iter().map(|(k, row)| (k, &row[idx])).collect())
    }

    /// Appends a derived column. The cells are given in key order.
    pub fn push_column(&mut self, column: &str, cells: Vec<Cell>) -> Result<(), DataErrors> {
        if self.columns.iter().any(|c| c == column) {
            return Err(DataErrors::DuplicateColumn {
                table: self.name.clone(),
                column: column.to_string(),
            });
        }
        if cells.len() != self.rows.len() {
            return Err(DataErrors::LengthMismatch {
                expected: self.rows.len(),
                found: cells.len(),
            });
        }
        self.columns.push(column.to_string());
        for (row, cell) in self.rows.values_mut().zip(cells) {
            row.push(cell);
        }
        Ok(())
    }
}

/// How rows without a match in every table are treated.
#[derive(Eq, PartialEq, Debug, Clone, Copy)]
pub enum JoinKind {
    /// Keep only the keys present in all the tables.
    Inner,
    /// Keep all the keys. The absent side is filled with `Cell::Missing`.
    Outer,
}

// ******** Derived values *********

/// The two main parties, as reported in result feeds.
#[derive(Eq, PartialEq, Debug, Clone, Copy, Hash, Ord, PartialOrd)]
pub enum Party {
    Democrat,
    Republican,
}

impl Party {
    /// Reads the party labels found in the feeds ("democrat", "DEM", "D", ...).
    pub fn parse(label: &str) -> Option<Party> {
        match label.trim().to_lowercase().as_str() {
            "democrat" | "democratic" | "dem" | "d" => Some(Party::Democrat),
            "republican" | "rep" | "gop" | "r" => Some(Party::Republican),
            _ => None,
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            Party::Democrat => "democrat",
            Party::Republican => "republican",
        }
    }
}

/// Outcome of a two-way contest.
#[derive(Eq, PartialEq, Debug, Clone, Copy, Hash)]
pub enum Winner {
    Democrat,
    Republican,
    /// Equal totals. Also used for races that are not called yet.
    Tie,
}

impl Winner {
    pub fn label(&self) -> &'static str {
        match self {
            Winner::Democrat => "democrat",
            Winner::Republican => "republican",
            Winner::Tie => "uncalled",
        }
    }

    pub fn party(&self) -> Option<Party> {
        match self {
            Winner::Democrat => Some(Party::Democrat),
            Winner::Republican => Some(Party::Republican),
            Winner::Tie => None,
        }
    }
}

/// Agreement between the presidential and house results of one district.
#[derive(Eq, PartialEq, Debug, Clone, Copy, Hash)]
pub enum Concordance {
    ConcordantDemocrat,
    ConcordantRepublican,
    /// Republican presidential winner, Democratic house winner.
    SplitRepublicanPresident,
    /// Democratic presidential winner, Republican house winner.
    SplitDemocratPresident,
    Unavailable,
}

impl Concordance {
    /// The map color code historically used for each category.
    pub fn code(&self) -> &'static str {
        match self {
            Concordance::ConcordantDemocrat => "b",
            Concordance::ConcordantRepublican => "r",
            Concordance::SplitRepublicanPresident => "c",
            Concordance::SplitDemocratPresident => "m",
            Concordance::Unavailable => "gray",
        }
    }
}

/// Result of a degree-1 least squares fit.
#[derive(PartialEq, Debug, Clone, Copy)]
pub struct LinearFit {
    pub intercept: f64,
    pub slope: f64,
}

impl LinearFit {
    pub fn predict(&self, x: f64) -> f64 {
        self.intercept + self.slope * x
    }
}

/// Descriptive statistics of one column.
#[derive(PartialEq, Debug, Clone)]
pub struct Summary {
    pub count: usize,
    pub mean: f64,
    /// Sample standard deviation. Not defined for a single value.
    pub std: Option<f64>,
    pub min: f64,
    pub max: f64,
    pub percentiles: Vec<(f64, f64)>,
}

// ******** Errors *********

/// Errors raised while normalizing, assembling or analysing tables.
#[derive(PartialEq, Debug, Clone)]
pub enum DataErrors {
    /// A raw key could not be mapped by a rule.
    InvalidKey { rule: String, value: String },
    /// The key specification did not receive one value per part.
    KeyArity { expected: usize, found: usize },
    UnknownColumn { table: String, column: String },
    UnknownKey { table: String, key: CanonicalKey },
    DuplicateColumn { table: String, column: String },
    /// Two different values were written into the same cell.
    ConflictingCell {
        table: String,
        key: CanonicalKey,
        column: String,
    },
    LengthMismatch { expected: usize, found: usize },
    NoTables,
    /// The numeric preconditions of a statistic were not met.
    Degenerate { statistic: &'static str, reason: String },
}

impl Error for DataErrors {}

impl Display for DataErrors {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DataErrors::InvalidKey { rule, value } => {
                write!(f, "key rule {} cannot normalize {:?}", rule, value)
            }
            DataErrors::KeyArity { expected, found } => {
                write!(f, "expected {} key parts, found {}", expected, found)
            }
            DataErrors::UnknownColumn { table, column } => {
                write!(f, "table {}: no column named {:?}", table, column)
            }
            DataErrors::UnknownKey { table, key } => {
                write!(f, "table {}: no row with key {}", table, key)
            }
            DataErrors::DuplicateColumn { table, column } => {
                write!(f, "table {}: column {:?} already exists", table, column)
            }
            DataErrors::ConflictingCell { table, key, column } => write!(
                f,
                "table {}: conflicting values for key {} in column {:?}",
                table, key, column
            ),
            DataErrors::LengthMismatch { expected, found } => {
                write!(f, "expected {} values, found {}", expected, found)
            }
            DataErrors::NoTables => write!(f, "no table to join"),
            DataErrors::Degenerate { statistic, reason } => {
                write!(f, "cannot compute {}: {}", statistic, reason)
            }
        }
    }
}
