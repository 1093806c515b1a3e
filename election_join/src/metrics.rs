//! Per-row derived values: vote shares, margins, swings and winners.

use std::collections::BTreeMap;

use log::{debug, warn};

use crate::config::{CanonicalKey, Concordance, Party, Winner};
use crate::keys::state_by_code;

/// Share of the two-party vote going to `d`, in percent.
///
/// Returns `None` when neither side has any vote.
pub fn two_party_share(d: f64, r: f64) -> Option<f64> {
    let total = d + r;
    if total == 0.0 {
        None
    } else {
        Some(d / total * 100.0)
    }
}

/// Two-party margin of `d` over `r`, in percentage points.
/// Positive values are a lead for `d`.
pub fn margin(d: f64, r: f64) -> Option<f64> {
    let total = d + r;
    if total == 0.0 {
        None
    } else {
        Some((d - r) / total * 100.0)
    }
}

/// Change of the two-party share of `d` between two elections.
pub fn swing(before: (f64, f64), after: (f64, f64)) -> Option<f64> {
    let b = two_party_share(before.0, before.1)?;
    let a = two_party_share(after.0, after.1)?;
    Some(a - b)
}

/// Lead of `a` over `b` as a share of all the votes, including third parties.
pub fn lead(a: f64, b: f64, total: f64) -> Option<f64> {
    if total == 0.0 {
        None
    } else {
        Some((a - b) / total * 100.0)
    }
}

pub fn difference(a: f64, b: f64) -> f64 {
    a - b
}

/// `a / b * factor`, or `a * factor` without a denominator.
///
/// Returns `None` when the denominator is zero.
pub fn ratio(a: f64, b: Option<f64>, factor: f64) -> Option<f64> {
    match b {
        Some(d) if d == 0.0 => None,
        Some(d) => Some(a / d * factor),
        None => Some(a * factor),
    }
}

pub fn classify_winner(d: f64, r: f64) -> Winner {
    if d > r {
        Winner::Democrat
    } else if r > d {
        Winner::Republican
    } else {
        Winner::Tie
    }
}

/// The outcome of a contest between any number of candidates.
#[derive(Eq, PartialEq, Debug, Clone)]
pub enum Plurality {
    Winner(String),
    /// Several candidates share the top total.
    Tie(Vec<String>),
    NoVotes,
}

pub fn plurality_winner(totals: &[(String, f64)]) -> Plurality {
    let best = totals.iter().map(|(_, v)| *v).fold(f64::NEG_INFINITY, f64::max);
    if totals.is_empty() || best <= 0.0 {
        return Plurality::NoVotes;
    }
    let leaders: Vec<String> = totals
        .iter()
        .filter(|(_, v)| *v == best)
        .map(|(name, _)| name.clone())
        .collect();
    match leaders.as_slice() {
        [single] => Plurality::Winner(single.clone()),
        _ => Plurality::Tie(leaders),
    }
}

/// Compares the presidential and the house winners of the same district.
pub fn concordance(president: Option<Winner>, house: Option<Party>) -> Concordance {
    match (president.and_then(|w| w.party()), house) {
        (Some(Party::Democrat), Some(Party::Democrat)) => Concordance::ConcordantDemocrat,
        (Some(Party::Republican), Some(Party::Republican)) => Concordance::ConcordantRepublican,
        (Some(Party::Republican), Some(Party::Democrat)) => {
            Concordance::SplitRepublicanPresident
        }
        (Some(Party::Democrat), Some(Party::Republican)) => Concordance::SplitDemocratPresident,
        _ => Concordance::Unavailable,
    }
}

/// Divides every value by the largest one.
pub fn scale_by_max(values: &[Option<f64>]) -> Vec<Option<f64>> {
    let max = values
        .iter()
        .flatten()
        .cloned()
        .fold(f64::NEG_INFINITY, f64::max);
    if !max.is_finite() || max == 0.0 {
        debug!("scale_by_max: no usable maximum ({})", max);
        return values.iter().map(|_| None).collect();
    }
    values.iter().map(|v| v.map(|x| x / max)).collect()
}

/// Electoral votes won by each winner label.
///
/// The keys are expected to be two-letter state codes. Other keys are skipped.
pub fn electoral_vote_tally(winners: &[(CanonicalKey, String)]) -> BTreeMap<String, u32> {
    let mut tally: BTreeMap<String, u32> = BTreeMap::new();
    for (key, winner) in winners.iter() {
        match state_by_code(key.as_str()) {
            Some(state) => {
                *tally.entry(winner.clone()).or_insert(0) += state.electoral_votes;
            }
            None => {
                warn!("electoral_vote_tally: {} is not a state code, skipping", key);
            }
        }
    }
    tally
}

#[cfg(test)]
mod tests {
    use super::*;

    fn close(a: f64, b: f64) -> bool {
        (a - b).abs() < 1e-9
    }

    #[test]
    fn share_is_bounded_and_complementary() {
        let samples = [(0.0, 1.0), (1.0, 0.0), (3.0, 7.0), (123456.0, 98765.0), (0.5, 0.5)];
        for (d, r) in samples {
            let s = two_party_share(d, r).unwrap();
            assert!((0.0..=100.0).contains(&s));
            assert!(close(s + two_party_share(r, d).unwrap(), 100.0));
        }
        assert_eq!(two_party_share(0.0, 0.0), None);
    }

    #[test]
    fn margin_values() {
        assert!(close(margin(60.0, 40.0).unwrap(), 20.0));
        assert!(close(margin(40.0, 60.0).unwrap(), -20.0));
        assert_eq!(margin(0.0, 0.0), None);
    }

    #[test]
    fn swing_is_antisymmetric() {
        let t1 = (45.0, 55.0);
        let t2 = (52.0, 48.0);
        let forward = swing(t1, t2).unwrap();
        let backward = swing(t2, t1).unwrap();
        assert!(close(forward, 7.0));
        assert!(close(forward, -backward));
    }

    #[test]
    fn differences_and_ratios() {
        assert!(close(difference(52.5, 47.5), 5.0));
        assert!(close(difference(47.5, 52.5), -5.0));
        assert!(close(ratio(25.0, Some(200.0), 100.0).unwrap(), 12.5));
        assert!(close(ratio(1500.0, None, 0.001).unwrap(), 1.5));
        assert_eq!(ratio(3.0, Some(0.0), 1.0), None);
    }

    #[test]
    fn lead_uses_total() {
        assert!(close(lead(40.0, 30.0, 100.0).unwrap(), 10.0));
        assert!(close(lead(30.0, 40.0, 100.0).unwrap(), -10.0));
        assert_eq!(lead(1.0, 1.0, 0.0), None);
    }

    #[test]
    fn winners() {
        assert_eq!(classify_winner(100.0, 200.0), Winner::Republican);
        assert_eq!(classify_winner(200.0, 100.0), Winner::Democrat);
        assert_eq!(classify_winner(5.0, 5.0), Winner::Tie);
        assert_eq!(Winner::Tie.label(), "uncalled");
    }

    #[test]
    fn plurality() {
        let t = vec![
            ("adams".to_string(), 30.0),
            ("garcia".to_string(), 12.0),
            ("yang".to_string(), 30.0),
        ];
        assert_eq!(
            plurality_winner(&t),
            Plurality::Tie(vec!["adams".to_string(), "yang".to_string()])
        );
        assert_eq!(
            plurality_winner(&t[1..2]),
            Plurality::Winner("garcia".to_string())
        );
        assert_eq!(plurality_winner(&[]), Plurality::NoVotes);
    }

    #[test]
    fn concordance_categories() {
        let d = Some(Winner::Democrat);
        let r = Some(Winner::Republican);
        assert_eq!(concordance(d, Some(Party::Democrat)).code(), "b");
        assert_eq!(concordance(r, Some(Party::Republican)).code(), "r");
        assert_eq!(concordance(r, Some(Party::Democrat)).code(), "c");
        assert_eq!(concordance(d, Some(Party::Republican)).code(), "m");
        assert_eq!(concordance(Some(Winner::Tie), Some(Party::Democrat)).code(), "gray");
        assert_eq!(concordance(d, None).code(), "gray");
    }

    #[test]
    fn scaled() {
        let v = scale_by_max(&[Some(2.0), None, Some(4.0)]);
        assert_eq!(v, vec![Some(0.5), None, Some(1.0)]);
        assert_eq!(scale_by_max(&[None]), vec![None]);
    }

    #[test]
    fn electoral_votes() {
        let winners = vec![
            (CanonicalKey("CA".to_string()), "democrat".to_string()),
            (CanonicalKey("TX".to_string()), "republican".to_string()),
            (CanonicalKey("NY".to_string()), "democrat".to_string()),
            (CanonicalKey("ZZ".to_string()), "democrat".to_string()),
        ];
        let tally = electoral_vote_tally(&winners);
        assert_eq!(tally.get("democrat"), Some(&84));
        assert_eq!(tally.get("republican"), Some(&38));
    }
}
