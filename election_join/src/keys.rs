//! Normalization of join keys.
//!
//! Result feeds disagree on how they spell the same place: county FIPS codes
//! lose their leading zeros, states appear by name or by numeric code, at-large
//! districts are labeled `AL`, `00` or `01`. Every source goes through a
//! [`KeySpec`] before it is merged with anything else.

use log::debug;

use crate::config::{CanonicalKey, DataErrors};

/// One US state (or DC / Puerto Rico).
#[derive(Eq, PartialEq, Debug, Clone, Copy)]
pub struct State {
    pub name: &'static str,
    pub code: &'static str,
    pub fips: &'static str,
    /// Electoral votes, 2012-2020 apportionment.
    pub electoral_votes: u32,
}

/// 2^53: the first integer that a float cannot tell from its neighbour.
const MAX_EXACT_INTEGER: f64 = 9007199254740992.0;

const fn st(name: &'static str, code: &'static str, fips: &'static str, ev: u32) -> State {
    State {
        name,
        code,
        fips,
        electoral_votes: ev,
    }
}

pub const STATES: [State; 52] = [
    st("Alabama", "AL", "01", 9),
    st("Alaska", "AK", "02", 3),
    st("Arizona", "AZ", "04", 11),
    st("Arkansas", "AR", "05", 6),
    st("California", "CA", "06", 55),
    st("Colorado", "CO", "08", 9),
    st("Connecticut", "CT", "09", 7),
    st("Delaware", "DE", "10", 3),
    st("District of Columbia", "DC", "11", 3),
    st("Florida", "FL", "12", 29),
    st("Georgia", "GA", "13", 16),
    st("Hawaii", "HI", "15", 4),
    st("Idaho", "ID", "16", 4),
    st("Illinois", "IL", "17", 20),
    st("Indiana", "IN", "18", 11),
    st("Iowa", "IA", "19", 6),
    st("Kansas", "KS", "20", 6),
    st("Kentucky", "KY", "21", 8),
    st("Louisiana", "LA", "22", 8),
    st("Maine", "ME", "23", 4),
    st("Maryland", "MD", "24", 10),
    st("Massachusetts", "MA", "25", 11),
    st("Michigan", "MI", "26", 16),
    st("Minnesota", "MN", "27", 10),
    st("Mississippi", "MS", "28", 6),
    st("Missouri", "MO", "29", 10),
    st("Montana", "MT", "30", 3),
    st("Nebraska", "NE", "31", 5),
    st("Nevada", "NV", "32", 6),
    st("New Hampshire", "NH", "33", 4),
    st("New Jersey", "NJ", "34", 14),
    st("New Mexico", "NM", "35", 5),
    st("New York", "NY", "36", 29),
    st("North Carolina", "NC", "37", 15),
    st("North Dakota", "ND", "38", 3),
    st("Ohio", "OH", "39", 18),
    st("Oklahoma", "OK", "40", 7),
    st("Oregon", "OR", "41", 7),
    st("Pennsylvania", "PA", "42", 20),
    st("Rhode Island", "RI", "44", 4),
    st("South Carolina", "SC", "45", 9),
    st("South Dakota", "SD", "46", 3),
    st("Tennessee", "TN", "47", 11),
    st("Texas", "TX", "48", 38),
    st("Utah", "UT", "49", 6),
    st("Vermont", "VT", "50", 3),
    st("Virginia", "VA", "51", 13),
    st("Washington", "WA", "53", 12),
    st("West Virginia", "WV", "54", 5),
    st("Wisconsin", "WI", "55", 10),
    st("Wyoming", "WY", "56", 3),
    st("Puerto Rico", "PR", "72", 0),
];

pub fn state_by_code(code: &str) -> Option<&'static State> {
    STATES.iter().find(|s| s.code.eq_ignore_ascii_case(code))
}

pub fn state_by_name(name: &str) -> Option<&'static State> {
    STATES.iter().find(|s| s.name.eq_ignore_ascii_case(name))
}

pub fn state_by_fips(fips: &str) -> Option<&'static State> {
    if fips.is_empty() || fips.len() > 2 || !fips.chars().all(|c| c.is_ascii_digit()) {
        return None;
    }
    let padded = format!("{:0>2}", fips);
    STATES.iter().find(|s| s.fips == padded)
}

/// One normalization step.
///
/// Every rule is idempotent: applying it to its own output returns the output
/// unchanged.
#[derive(Eq, PartialEq, Debug, Clone)]
pub enum KeyRule {
    Trim,
    Upper,
    ZeroPad(usize),
    /// An integral number, possibly written as a float ("1001.0").
    Integer,
    /// The text after the last occurrence of the separator.
    TakeAfter(String),
    StripPrefix(String),
    /// Full state name to its two-letter code.
    StateName,
    /// Numeric state FIPS code to its two-letter code.
    StateFips,
    /// `ST-N` to `ST-NN`, with at-large districts numbered 01.
    CongressionalDistrict,
}

impl KeyRule {
    fn name(&self) -> String {
        match self {
            KeyRule::Trim => "trim".to_string(),
            KeyRule::Upper => "upper".to_string(),
            KeyRule::ZeroPad(n) => format!("zeroPad:{}", n),
            KeyRule::Integer => "integer".to_string(),
            KeyRule::TakeAfter(sep) => format!("takeAfter:{}", sep),
            KeyRule::StripPrefix(p) => format!("stripPrefix:{}", p),
            KeyRule::StateName => "stateName".to_string(),
            KeyRule::StateFips => "stateFips".to_string(),
            KeyRule::CongressionalDistrict => "congressionalDistrict".to_string(),
        }
    }

    fn invalid(&self, value: &str) -> DataErrors {
        DataErrors::InvalidKey {
            rule: self.name(),
            value: value.to_string(),
        }
    }

    pub fn apply(&self, value: &str) -> Result<String, DataErrors> {
        match self {
            KeyRule::Trim => Ok(value.trim().to_string()),
            KeyRule::Upper => Ok(value.to_ascii_uppercase()),
            KeyRule::ZeroPad(width) => {
                if value.is_empty() || !value.chars().all(|c| c.is_ascii_digit()) {
                    return Err(self.invalid(value));
                }
                Ok(format!("{:0>width$}", value, width = *width))
            }
            KeyRule::Integer => {
                let s = value.trim();
                if s.contains(|c| c == 'e' || c == 'E') {
                    return Err(self.invalid(value));
                }
                let x: f64 = s.parse().map_err(|_| self.invalid(value))?;
                // Beyond 2^53, distinct codes collapse onto the same float.
                if !x.is_finite() || x.fract() != 0.0 || x.abs() >= MAX_EXACT_INTEGER {
                    return Err(self.invalid(value));
                }
                Ok(format!("{}", x as i64))
            }
            KeyRule::TakeAfter(sep) => match value.rfind(sep.as_str()) {
                Some(idx) if !sep.is_empty() => Ok(value[idx + sep.len()..].to_string()),
                _ => Ok(value.to_string()),
            },
            KeyRule::StripPrefix(prefix) if prefix.is_empty() => Ok(value.to_string()),
            // Repeated prefixes are all removed, so that the rule stays idempotent.
            KeyRule::StripPrefix(prefix) => Ok(value.trim_start_matches(prefix.as_str()).to_string()),
            KeyRule::StateName => state_by_name(value.trim())
                .or_else(|| state_by_code(value.trim()))
                .map(|s| s.code.to_string())
                .ok_or_else(|| self.invalid(value)),
            KeyRule::StateFips => state_by_fips(value.trim())
                .or_else(|| state_by_code(value.trim()))
                .map(|s| s.code.to_string())
                .ok_or_else(|| self.invalid(value)),
            KeyRule::CongressionalDistrict => {
                normalize_district(value).ok_or_else(|| self.invalid(value))
            }
        }
    }
}

fn normalize_district(value: &str) -> Option<String> {
    let (state, district) = value.trim().split_once('-')?;
    let state = state_by_code(state.trim())?;
    let district = district.trim();
    let number: u32 = match district.to_ascii_uppercase().as_str() {
        "AL" => 1,
        d if !d.is_empty() && d.chars().all(|c| c.is_ascii_digit()) => d.parse().ok()?,
        _ => return None,
    };
    // Single-member states are numbered 00 in the census files.
    let number = if number == 0 { 1 } else { number };
    Some(format!("{}-{:02}", state.code, number))
}

/// A part of a composite key: one raw column and its own rules.
#[derive(Eq, PartialEq, Debug, Clone)]
pub struct KeyPart {
    pub column: String,
    pub rules: Vec<KeyRule>,
}

/// How to build the canonical key of a row.
///
/// The parts are normalized one by one, concatenated with the separator, and
/// the whole key goes through the final rules.
#[derive(Eq, PartialEq, Debug, Clone)]
pub struct KeySpec {
    pub parts: Vec<KeyPart>,
    pub separator: String,
    pub rules: Vec<KeyRule>,
}

impl KeySpec {
    /// A key read from a single column.
    pub fn single(column: &str, rules: &[KeyRule]) -> KeySpec {
        KeySpec {
            parts: vec![KeyPart {
                column: column.to_string(),
                rules: rules.to_vec(),
            }],
            separator: String::new(),
            rules: vec![],
        }
    }

    pub fn columns(&self) -> Vec<&str> {
        self.parts.iter().map(|p| p.column.as_str()).collect()
    }

    /// Builds the key from the raw values of the key columns, in part order.
    pub fn normalize(&self, raw: &[&str]) -> Result<CanonicalKey, DataErrors> {
        if raw.len() != self.parts.len() {
            return Err(DataErrors::KeyArity {
                expected: self.parts.len(),
                found: raw.len(),
            });
        }
        let mut pieces: Vec<String> = Vec::with_capacity(raw.len());
        for (part, value) in self.parts.iter().zip(raw) {
            pieces.push(apply_rules(&part.rules, value)?);
        }
        let joined = pieces.join(self.separator.as_str());
        let key = apply_rules(&self.rules, &joined)?;
        debug!("normalize: {:?} -> {:?}", raw, key);
        Ok(CanonicalKey(key))
    }
}

pub fn apply_rules(rules: &[KeyRule], value: &str) -> Result<String, DataErrors> {
    let mut cur = value.to_string();
    for rule in rules {
        cur = rule.apply(&cur)?;
    }
    Ok(cur)
}
