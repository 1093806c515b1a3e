pub mod builder;
mod config;
pub mod keys;
pub mod manual;
pub mod metrics;
pub mod stats;

use log::{debug, info};

use std::collections::{BTreeMap, BTreeSet, HashMap};

pub use crate::config::*;

/// Joins tables on their canonical keys.
///
/// Arguments:
/// * `tables` the tables to merge, in output column order
/// * `kind` inner joins keep the keys present in every table, outer joins keep
/// all the keys and mark the absent cells as `Cell::Missing`
///
/// Column names present in more than one table are suffixed with the name of
/// their table.
pub fn join_tables(tables: &[Table], kind: JoinKind) -> Result<Table, DataErrors> {
    let (first, rest) = tables.split_first().ok_or(DataErrors::NoTables)?;
    if rest.is_empty() {
        return Ok(first.clone());
    }
    info!(
        "join_tables: joining {:?} with {:?}",
        tables
            .iter()
            .map(|t| (t.name.as_str(), t.len()))
            .collect::<Vec<_>>(),
        kind
    );

    let columns = joined_columns(tables)?;

    let keys: BTreeSet<&CanonicalKey> = match kind {
        JoinKind::Inner => first
            .rows
            .keys()
            .filter(|k| rest.iter().all(|t| t.rows.contains_key(*k)))
            .collect(),
        JoinKind::Outer => tables.iter().flat_map(|t| t.rows.keys()).collect(),
    };

    let mut rows: BTreeMap<CanonicalKey, Vec<Cell>> = BTreeMap::new();
    for key in keys.iter() {
        let mut row: Vec<Cell> = Vec::with_capacity(columns.len());
        for t in tables.iter() {
            match t.rows.get(*key) {
                Some(cells) => row.extend(cells.iter().cloned()),
                None => row.extend(std::iter::repeat(Cell::Missing).take(t.columns.len())),
            }
        }
        rows.insert((*key).clone(), row);
    }

    for t in tables.iter() {
        let unmatched = t.rows.keys().filter(|k| !rows.contains_key(*k)).count();
        if unmatched > 0 {
            info!(
                "join_tables: {} keys of table {} have no match in every table and were dropped",
                unmatched, t.name
            );
        }
    }
    debug!("join_tables: {} rows, columns {:?}", rows.len(), columns);

    let name: Vec<&str> = tables.iter().map(|t| t.name.as_str()).collect();
    Ok(Table {
        name: name.join("+"),
        columns,
        rows,
    })
}

/// Output column names. A qualified name that is already taken is an error:
/// the column could not be addressed unambiguously.
fn joined_columns(tables: &[Table]) -> Result<Vec<String>, DataErrors> {
    let mut occurrences: HashMap<&str, usize> = HashMap::new();
    for t in tables.iter() {
        for c in t.columns.iter() {
            *occurrences.entry(c.as_str()).or_insert(0) += 1;
        }
    }
    let mut columns: Vec<String> = Vec::new();
    for t in tables.iter() {
        for c in t.columns.iter() {
            let name = if occurrences.get(c.as_str()).cloned().unwrap_or(0) > 1 {
                format!("{}_{}", c, t.name)
            } else {
                c.clone()
            };
            if columns.contains(&name) {
                return Err(DataErrors::DuplicateColumn {
                    table: t.name.clone(),
                    column: name,
                });
            }
            columns.push(name);
        }
    }
    Ok(columns)
}

#[cfg(test)]
mod tests {
    use super::builder::TableBuilder;
    use super::*;

    fn key(s: &str) -> CanonicalKey {
        CanonicalKey(s.to_string())
    }

    fn table(name: &str, column: &str, rows: &[(&str, f64)]) -> Table {
        let mut b = TableBuilder::new(name, &[column.to_string()]);
        for (k, v) in rows {
            b.add(&key(k), column, Cell::Number(*v)).unwrap();
        }
        b.build()
    }

    #[test]
    fn inner_join_is_intersection() {
        let a = table("a", "x", &[("01", 1.0), ("02", 2.0), ("03", 3.0)]);
        let b = table("b", "y", &[("02", 20.0), ("03", 30.0), ("04", 40.0)]);
        let j = join_tables(&[a, b], JoinKind::Inner).unwrap();
        let keys: Vec<&str> = j.rows.keys().map(|k| k.as_str()).collect();
        assert_eq!(keys, vec!["02", "03"]);
        assert_eq!(j.columns, vec!["x".to_string(), "y".to_string()]);
        assert_eq!(j.get(&key("03"), "y"), Ok(&Cell::Number(30.0)));
    }

    #[test]
    fn outer_join_marks_missing() {
        let _ = env_logger::builder().is_test(true).try_init();
        let a = table("a", "x", &[("01", 1.0), ("02", 2.0)]);
        let b = table("b", "y", &[("02", 20.0), ("04", 40.0)]);
        let j = join_tables(&[a, b], JoinKind::Outer).unwrap();
        assert_eq!(j.len(), 3);
        assert_eq!(j.get(&key("01"), "y"), Ok(&Cell::Missing));
        assert_eq!(j.get(&key("04"), "x"), Ok(&Cell::Missing));
        assert_eq!(j.get(&key("02"), "x"), Ok(&Cell::Number(2.0)));
    }

    #[test]
    fn three_way_inner_join() {
        let a = table("a", "x", &[("01", 1.0), ("02", 2.0)]);
        let b = table("b", "y", &[("01", 1.0), ("02", 2.0)]);
        let c = table("c", "z", &[("02", 2.0)]);
        let j = join_tables(&[a, b, c], JoinKind::Inner).unwrap();
        assert_eq!(j.len(), 1);
        assert_eq!(j.name, "a+b+c");
    }

    #[test]
    fn colliding_columns_are_qualified() {
        let a = table("y2016", "democrat", &[("01", 1.0)]);
        let b = table("y2020", "democrat", &[("01", 2.0)]);
        let j = join_tables(&[a, b], JoinKind::Inner).unwrap();
        assert_eq!(
            j.columns,
            vec!["democrat_y2016".to_string(), "democrat_y2020".to_string()]
        );
    }

    #[test]
    fn qualified_name_already_taken() {
        let mut b = TableBuilder::new("b", &["dem".to_string(), "dem_a".to_string()]);
        b.add(&key("01"), "dem", Cell::Number(1.0)).unwrap();
        b.add(&key("01"), "dem_a", Cell::Number(2.0)).unwrap();
        let a = table("a", "dem", &[("01", 3.0)]);
        assert_eq!(
            join_tables(&[b.build(), a], JoinKind::Inner),
            Err(DataErrors::DuplicateColumn {
                table: "a".to_string(),
                column: "dem_a".to_string()
            })
        );
    }

    #[test]
    fn tables_with_the_same_name() {
        let a = table("s", "dem", &[("01", 10.0)]);
        let b = table("s", "dem", &[("01", 20.0)]);
        assert!(matches!(
            join_tables(&[a, b], JoinKind::Outer),
            Err(DataErrors::DuplicateColumn { .. })
        ));
    }

    #[test]
    fn no_tables() {
        assert_eq!(join_tables(&[], JoinKind::Inner), Err(DataErrors::NoTables));
    }

    #[test]
    fn district_classification_example() {
        let mut pres = TableBuilder::new("pres", &["biden".to_string(), "trump".to_string()]);
        pres.add_row(&key("NY-01"), vec![Cell::Number(100.0), Cell::Number(200.0)])
            .unwrap();
        let mut house = TableBuilder::new("house", &["house_winner".to_string()]);
        house
            .add(&key("NY-01"), "house_winner", Cell::Text("republican".to_string()))
            .unwrap();
        let j = join_tables(&[pres.build(), house.build()], JoinKind::Inner).unwrap();

        let k = key("NY-01");
        let pres_winner = metrics::classify_winner(
            j.get(&k, "biden").unwrap().as_number().unwrap(),
            j.get(&k, "trump").unwrap().as_number().unwrap(),
        );
        let house_winner = j
            .get(&k, "house_winner")
            .unwrap()
            .as_text()
            .and_then(Party::parse);
        let c = metrics::concordance(Some(pres_winner), house_winner);
        assert_eq!(c.code(), "r");
    }
}
