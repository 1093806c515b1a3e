// Derived columns and regressions over the joined table.

use crate::atlas::*;

/// A derived column and how to compute it.
#[derive(PartialEq, Debug, Clone)]
pub struct Metric {
    pub output: String,
    pub kind: MetricKind,
}

#[derive(PartialEq, Debug, Clone)]
pub enum MetricKind {
    TwoPartyShare {
        democrat: String,
        republican: String,
    },
    Margin {
        democrat: String,
        republican: String,
    },
    /// Democrat and republican columns of both elections.
    Swing {
        before: (String, String),
        after: (String, String),
    },
    Lead {
        democrat: String,
        republican: String,
        total: String,
    },
    Winner {
        democrat: String,
        republican: String,
    },
    Plurality {
        candidates: Vec<String>,
    },
    /// Presidential totals against the party of the house winner.
    Concordance {
        democrat: String,
        republican: String,
        house: String,
    },
    ScaleByMax {
        column: String,
    },
    /// `left - right`.
    Difference {
        left: String,
        right: String,
    },
    /// `numerator / denominator * factor`. Without a denominator, only the
    /// factor applies.
    Ratio {
        numerator: String,
        denominator: Option<String>,
        factor: f64,
    },
}

/// The outcome of one regression, for the summary.
#[derive(PartialEq, Debug, Clone)]
pub struct RegressionResult {
    pub x: String,
    pub y: String,
    pub n: usize,
    pub fit: LinearFit,
    pub pearson: Option<f64>,
}

fn numbers(table: &Table, column: &str) -> AtlasResult<Vec<Option<f64>>> {
    let cells = table.column(column).context(TableDataSnafu {
        table: table.name.clone(),
    })?;
    Ok(cells.iter().map(|(_, c)| c.as_number()).collect())
}

fn texts(table: &Table, column: &str) -> AtlasResult<Vec<Option<String>>> {
    let cells = table.column(column).context(TableDataSnafu {
        table: table.name.clone(),
    })?;
    Ok(cells
        .iter()
        .map(|(_, c)| c.as_text().map(|s| s.to_string()))
        .collect())
}

fn number_cell(x: Option<f64>) -> Cell {
    x.map(Cell::Number).unwrap_or(Cell::Missing)
}

fn pairwise<F>(table: &Table, a: &str, b: &str, f: F) -> AtlasResult<Vec<Cell>>
where
    F: Fn(f64, f64) -> Cell,
{
    let xs = numbers(table, a)?;
    let ys = numbers(table, b)?;
    Ok(xs
        .into_iter()
        .zip(ys)
        .map(|p| match p {
            (Some(x), Some(y)) => f(x, y),
            _ => Cell::Missing,
        })
        .collect())
}

fn compute(table: &Table, kind: &MetricKind) -> AtlasResult<Vec<Cell>> {
    let cells = match kind {
        MetricKind::TwoPartyShare {
            democrat,
            republican,
        } => pairwise(table, democrat, republican, |d, r| {
            number_cell(metrics::two_party_share(d, r))
        })?,
        MetricKind::Margin {
            democrat,
            republican,
        } => pairwise(table, democrat, republican, |d, r| {
            number_cell(metrics::margin(d, r))
        })?,
        MetricKind::Winner {
            democrat,
            republican,
        } => pairwise(table, democrat, republican, |d, r| {
            Cell::Text(metrics::classify_winner(d, r).label().to_string())
        })?,
        MetricKind::Swing { before, after } => {
            let d1 = numbers(table, &before.0)?;
            let r1 = numbers(table, &before.1)?;
            let d2 = numbers(table, &after.0)?;
            let r2 = numbers(table, &after.1)?;
            (0..table.len())
                .map(|i| match (d1[i], r1[i], d2[i], r2[i]) {
                    (Some(a), Some(b), Some(c), Some(d)) => {
                        number_cell(metrics::swing((a, b), (c, d)))
                    }
                    _ => Cell::Missing,
                })
                .collect()
        }
        MetricKind::Lead {
            democrat,
            republican,
            total,
        } => {
            let ds = numbers(table, democrat)?;
            let rs = numbers(table, republican)?;
            let ts = numbers(table, total)?;
            (0..table.len())
                .map(|i| match (ds[i], rs[i], ts[i]) {
                    (Some(d), Some(r), Some(t)) => number_cell(metrics::lead(d, r, t)),
                    _ => Cell::Missing,
                })
                .collect()
        }
        MetricKind::Plurality { candidates } => {
            let columns = candidates
                .iter()
                .map(|c| numbers(table, c))
                .collect::<AtlasResult<Vec<Vec<Option<f64>>>>>()?;
            (0..table.len())
                .map(|i| {
                    if columns.iter().all(|col| col[i].is_none()) {
                        return Cell::Missing;
                    }
                    let totals: Vec<(String, f64)> = candidates
                        .iter()
                        .zip(columns.iter())
                        .map(|(name, col)| (name.clone(), col[i].unwrap_or(0.0)))
                        .collect();
                    match metrics::plurality_winner(&totals) {
                        metrics::Plurality::Winner(name) => Cell::Text(name),
                        metrics::Plurality::Tie(_) => Cell::Text("tie".to_string()),
                        metrics::Plurality::NoVotes => Cell::Missing,
                    }
                })
                .collect()
        }
        MetricKind::Concordance {
            democrat,
            republican,
            house,
        } => {
            let ds = numbers(table, democrat)?;
            let rs = numbers(table, republican)?;
            let hs = texts(table, house)?;
            (0..table.len())
                .map(|i| {
                    let president = match (ds[i], rs[i]) {
                        (Some(d), Some(r)) => Some(metrics::classify_winner(d, r)),
                        _ => None,
                    };
                    let house = hs[i].as_deref().and_then(Party::parse);
                    Cell::Text(metrics::concordance(president, house).code().to_string())
                })
                .collect()
        }
        MetricKind::ScaleByMax { column } => {
            let xs = numbers(table, column)?;
            metrics::scale_by_max(&xs)
                .into_iter()
                .map(number_cell)
                .collect()
        }
        MetricKind::Difference { left, right } => pairwise(table, left, right, |a, b| {
            Cell::Number(metrics::difference(a, b))
        })?,
        MetricKind::Ratio {
            numerator,
            denominator: Some(denominator),
            factor,
        } => pairwise(table, numerator, denominator, |a, b| {
            number_cell(metrics::ratio(a, Some(b), *factor))
        })?,
        MetricKind::Ratio {
            numerator,
            denominator: None,
            factor,
        } => numbers(table, numerator)?
            .into_iter()
            .map(|x| number_cell(x.and_then(|a| metrics::ratio(a, None, *factor))))
            .collect(),
    };
    Ok(cells)
}

/// Sums a numeric column, restricted to the rows matching the `where` clause
/// when there is one. Missing cells count as zero.
pub fn conditional_sum(table: &Table, sc: &SumConfig) -> AtlasResult<f64> {
    let values = numbers(table, &sc.column)?;
    let selected: Vec<bool> = match &sc.where_ {
        Some(w) => table
            .column(&w.column)
            .context(TableDataSnafu {
                table: table.name.clone(),
            })?
            .iter()
            .map(|(_, c)| !c.is_missing() && c.to_string() == w.equals)
            .collect(),
        None => vec![true; values.len()],
    };
    let total: f64 = values
        .iter()
        .zip(selected)
        .filter(|(_, keep)| *keep)
        .filter_map(|(x, _)| *x)
        .sum();
    debug!("conditional_sum: {}: {}", sc.column, total);
    Ok(total)
}

/// Appends the derived columns, in order. A metric may use the output of the
/// metrics before it.
pub fn apply_metrics(table: &mut Table, metrics: &[Metric]) -> AtlasResult<()> {
    for m in metrics.iter() {
        let cells = compute(table, &m.kind)?;
        let present = cells.iter().filter(|c| !c.is_missing()).count();
        info!(
            "apply_metrics: {}: {} values, {} missing",
            m.output,
            present,
            cells.len() - present
        );
        table.push_column(&m.output, cells).context(TableDataSnafu {
            table: table.name.clone(),
        })?;
    }
    Ok(())
}

/// Fits each configured pair of columns, over the rows where both are present.
///
/// A fit that cannot be computed stops the analysis. A correlation that cannot
/// be computed is reported as absent.
pub fn run_regressions(
    table: &mut Table,
    regressions: &[RegressionConfig],
) -> AtlasResult<Vec<RegressionResult>> {
    let mut res: Vec<RegressionResult> = Vec::new();
    for rc in regressions.iter() {
        let label = format!("{} ~ {}", rc.y, rc.x);
        let xs_o = numbers(table, &rc.x)?;
        let ys_o = numbers(table, &rc.y)?;
        let mut used: Vec<usize> = Vec::new();
        let mut xs: Vec<f64> = Vec::new();
        let mut ys: Vec<f64> = Vec::new();
        for (i, p) in xs_o.iter().zip(ys_o.iter()).enumerate() {
            if let (Some(x), Some(y)) = p {
                used.push(i);
                xs.push(*x);
                ys.push(*y);
            }
        }
        let fit = stats::fit_line(&xs, &ys).context(TableDataSnafu {
            table: label.clone(),
        })?;
        let pearson = match stats::pearson(&xs, &ys) {
            Ok(r) => Some(r),
            Err(e) => {
                warn!("run_regressions: {}: no correlation: {}", label, e);
                None
            }
        };
        info!(
            "run_regressions: {}: n={} slope={} intercept={} r={:?}",
            label,
            xs.len(),
            fit.slope,
            fit.intercept,
            pearson
        );
        if let Some(output) = &rc.residual_output {
            let residuals = stats::studentized_residuals(&xs, &ys).context(TableDataSnafu {
                table: label.clone(),
            })?;
            let mut cells: Vec<Cell> = vec![Cell::Missing; table.len()];
            for (i, r) in used.iter().zip(residuals) {
                cells[*i] = Cell::Number(r);
            }
            table.push_column(output, cells).context(TableDataSnafu {
                table: table.name.clone(),
            })?;
        }
        res.push(RegressionResult {
            x: rc.x.clone(),
            y: rc.y.clone(),
            n: xs.len(),
            fit,
            pearson,
        });
    }
    Ok(res)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeMap;

    fn table(columns: &[&str], rows: &[(&str, Vec<Cell>)]) -> Table {
        let mut data: BTreeMap<CanonicalKey, Vec<Cell>> = BTreeMap::new();
        for (k, cells) in rows.iter() {
            data.insert(CanonicalKey(k.to_string()), cells.clone());
        }
        Table {
            name: "test".to_string(),
            columns: columns.iter().map(|s| s.to_string()).collect(),
            rows: data,
        }
    }

    fn n(x: f64) -> Cell {
        Cell::Number(x)
    }

    fn t(s: &str) -> Cell {
        Cell::Text(s.to_string())
    }

    fn metric(output: &str, kind: MetricKind) -> Metric {
        Metric {
            output: output.to_string(),
            kind,
        }
    }

    #[test]
    fn shares_winners_and_missing_values() {
        let mut tb = table(
            &["d", "r"],
            &[
                ("AK", vec![n(40.0), n(60.0)]),
                ("DE", vec![n(5.0), n(5.0)]),
                ("HI", vec![n(1.0), Cell::Missing]),
            ],
        );
        let ms = vec![
            metric(
                "share",
                MetricKind::TwoPartyShare {
                    democrat: "d".to_string(),
                    republican: "r".to_string(),
                },
            ),
            metric(
                "winner",
                MetricKind::Winner {
                    democrat: "d".to_string(),
                    republican: "r".to_string(),
                },
            ),
        ];
        apply_metrics(&mut tb, &ms).unwrap();
        let key = |s: &str| CanonicalKey(s.to_string());
        assert_eq!(tb.get(&key("AK"), "share").unwrap(), &n(40.0));
        assert_eq!(tb.get(&key("AK"), "winner").unwrap(), &t("republican"));
        assert_eq!(tb.get(&key("DE"), "winner").unwrap(), &t("uncalled"));
        assert_eq!(tb.get(&key("HI"), "share").unwrap(), &Cell::Missing);
        assert_eq!(tb.get(&key("HI"), "winner").unwrap(), &Cell::Missing);
        // The output column already exists.
        assert!(apply_metrics(&mut tb, &ms).is_err());
    }

    #[test]
    fn plurality_and_concordance() {
        let mut tb = table(
            &["biden", "trump", "jorgensen", "house"],
            &[
                ("NY-01", vec![n(10.0), n(20.0), n(1.0), t("republican")]),
                ("NY-02", vec![n(20.0), n(20.0), Cell::Missing, t("democrat")]),
                ("NY-03", vec![Cell::Missing, Cell::Missing, Cell::Missing, Cell::Missing]),
            ],
        );
        let ms = vec![
            metric(
                "top",
                MetricKind::Plurality {
                    candidates: vec!["biden".to_string(), "trump".to_string(), "jorgensen".to_string()],
                },
            ),
            metric(
                "category",
                MetricKind::Concordance {
                    democrat: "biden".to_string(),
                    republican: "trump".to_string(),
                    house: "house".to_string(),
                },
            ),
        ];
        apply_metrics(&mut tb, &ms).unwrap();
        let top: Vec<Cell> = tb.column("top").unwrap().into_iter().map(|(_, c)| c.clone()).collect();
        assert_eq!(top, vec![t("trump"), t("tie"), Cell::Missing]);
        let cat: Vec<Cell> = tb
            .column("category")
            .unwrap()
            .into_iter()
            .map(|(_, c)| c.clone())
            .collect();
        assert_eq!(cat, vec![t("r"), t("gray"), t("gray")]);
    }

    #[test]
    fn differences_and_ratios() {
        let mut tb = table(
            &["share20", "share16", "votes", "total"],
            &[
                ("01001", vec![n(55.0), n(50.0), n(30.0), n(200.0)]),
                ("01003", vec![n(40.0), Cell::Missing, n(5.0), n(0.0)]),
            ],
        );
        let ms = vec![
            metric(
                "swing",
                MetricKind::Difference {
                    left: "share20".to_string(),
                    right: "share16".to_string(),
                },
            ),
            metric(
                "pct",
                MetricKind::Ratio {
                    numerator: "votes".to_string(),
                    denominator: Some("total".to_string()),
                    factor: 100.0,
                },
            ),
            metric(
                "votes_half",
                MetricKind::Ratio {
                    numerator: "votes".to_string(),
                    denominator: None,
                    factor: 0.5,
                },
            ),
        ];
        apply_metrics(&mut tb, &ms).unwrap();
        let key = |s: &str| CanonicalKey(s.to_string());
        assert_eq!(tb.get(&key("01001"), "swing").unwrap(), &n(5.0));
        assert_eq!(tb.get(&key("01003"), "swing").unwrap(), &Cell::Missing);
        let pct = tb.get(&key("01001"), "pct").unwrap().as_number().unwrap();
        assert!((pct - 15.0).abs() < 1e-9);
        assert_eq!(tb.get(&key("01003"), "pct").unwrap(), &Cell::Missing);
        assert_eq!(tb.get(&key("01001"), "votes_half").unwrap(), &n(15.0));
        assert_eq!(tb.get(&key("01003"), "votes_half").unwrap(), &n(2.5));
    }

    #[test]
    fn sums_over_matching_rows() {
        let tb = table(
            &["biden", "house"],
            &[
                ("NY-01", vec![n(150.0), t("republican")]),
                ("NY-02", vec![n(300.0), t("democrat")]),
                ("NY-03", vec![n(10.0), Cell::Missing]),
                ("VT-01", vec![n(250.0), t("republican")]),
                ("WY-01", vec![Cell::Missing, t("republican")]),
            ],
        );
        let all = SumConfig {
            name: None,
            column: "biden".to_string(),
            where_: None,
        };
        assert_eq!(conditional_sum(&tb, &all).unwrap(), 710.0);
        let red = SumConfig {
            name: Some("red".to_string()),
            column: "biden".to_string(),
            where_: Some(WhereConfig {
                column: "house".to_string(),
                equals: "republican".to_string(),
            }),
        };
        assert_eq!(conditional_sum(&tb, &red).unwrap(), 400.0);
        let unknown = SumConfig {
            where_: Some(WhereConfig {
                column: "senate".to_string(),
                equals: "republican".to_string(),
            }),
            ..red
        };
        assert!(conditional_sum(&tb, &unknown).is_err());
    }

    #[test]
    fn regression_with_residual_column() {
        let mut tb = table(
            &["x", "y"],
            &[
                ("a", vec![n(0.0), n(0.0)]),
                ("b", vec![n(1.0), n(2.0)]),
                ("c", vec![n(2.0), n(1.0)]),
                ("d", vec![n(3.0), n(3.0)]),
                ("e", vec![Cell::Missing, n(3.0)]),
            ],
        );
        let rc = RegressionConfig {
            x: "x".to_string(),
            y: "y".to_string(),
            residual_output: Some("resid".to_string()),
        };
        let res = run_regressions(&mut tb, &[rc]).unwrap();
        assert_eq!(res[0].n, 4);
        assert!((res[0].fit.slope - 0.8).abs() < 1e-9);
        assert!(res[0].pearson.is_some());
        let e = tb.get(&CanonicalKey("e".to_string()), "resid").unwrap();
        assert_eq!(e, &Cell::Missing);
        assert!(tb
            .get(&CanonicalKey("b".to_string()), "resid")
            .unwrap()
            .as_number()
            .is_some());
    }

    #[test]
    fn regression_on_constant_x_fails() {
        let mut tb = table(
            &["x", "y"],
            &[("a", vec![n(1.0), n(0.0)]), ("b", vec![n(1.0), n(2.0)])],
        );
        let rc = RegressionConfig {
            x: "x".to_string(),
            y: "y".to_string(),
            residual_output: None,
        };
        assert!(matches!(
            run_regressions(&mut tb, &[rc]),
            Err(AtlasError::TableData { .. })
        ));
    }
}
