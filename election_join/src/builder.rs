use std::collections::BTreeMap;

use log::debug;

pub use crate::config::*;

/// A builder for assembling a table from raw rows.
///
/// Values written twice for the same key and column are aggregated the way a
/// pivot with a sum does: numbers add up, text must agree.
///
/// ```
/// use election_join::builder::TableBuilder;
/// use election_join::{CanonicalKey, Cell};
/// # use election_join::DataErrors;
///
/// let mut builder = TableBuilder::new("nyc_2020", &["trump".to_string(), "biden".to_string()]);
/// let key = CanonicalKey("001/65".to_string());
///
/// // Republican and Conservative lines both count for the same candidate.
/// builder.add(&key, "trump", Cell::Number(120.0))?;
/// builder.add(&key, "trump", Cell::Number(15.0))?;
/// builder.add(&key, "biden", Cell::Number(300.0))?;
///
/// let table = builder.build();
/// assert_eq!(table.get(&key, "trump")?, &Cell::Number(135.0));
/// # Ok::<(), DataErrors>(())
/// ```
pub struct TableBuilder {
    pub(crate) _name: String,
    pub(crate) _columns: Vec<String>,
    pub(crate) _rows: BTreeMap<CanonicalKey, Vec<Cell>>,
}

impl TableBuilder {
    pub fn new(name: &str, columns: &[String]) -> TableBuilder {
        TableBuilder {
            _name: name.to_string(),
            _columns: columns.to_vec(),
            _rows: BTreeMap::new(),
        }
    }

    /// Registers a key without any value. All its cells start as missing.
    pub fn touch(&mut self, key: &CanonicalKey) {
        let width = self._columns.len();
        self._rows
            .entry(key.clone())
            .or_insert_with(|| vec![Cell::Missing; width]);
    }

    /// Writes one cell, aggregating with what is already there.
    pub fn add(&mut self, key: &CanonicalKey, column: &str, cell: Cell) -> Result<(), DataErrors> {
        let idx = self
            ._columns
            .iter()
            .position(|c| c == column)
            .ok_or_else(|| DataErrors::UnknownColumn {
                table: self._name.clone(),
                column: column.to_string(),
            })?;
        self.touch(key);
        let slot = self
            ._rows
            .get_mut(key)
            .and_then(|row| row.get_mut(idx))
            .ok_or_else(|| DataErrors::UnknownKey {
                table: self._name.clone(),
                key: key.clone(),
            })?;
        let merged = match (&*slot, cell) {
            (_, Cell::Missing) => return Ok(()),
            (Cell::Missing, c) => c,
            (Cell::Number(a), Cell::Number(b)) => {
                debug!("add: {}: aggregating {} + {} in {}", key, a, b, column);
                Cell::Number(a + b)
            }
            (Cell::Text(a), Cell::Text(b)) if *a == b => Cell::Text(b),
            _ => {
                return Err(DataErrors::ConflictingCell {
                    table: self._name.clone(),
                    key: key.clone(),
                    column: column.to_string(),
                })
            }
        };
        *slot = merged;
        Ok(())
    }

    /// Writes a full row, in column order.
    pub fn add_row(&mut self, key: &CanonicalKey, cells: Vec<Cell>) -> Result<(), DataErrors> {
        if cells.len() != self._columns.len() {
            return Err(DataErrors::LengthMismatch {
                expected: self._columns.len(),
                found: cells.len(),
            });
        }
        let columns = self._columns.clone();
        for (column, cell) in columns.iter().zip(cells) {
            self.add(key, column, cell)?;
        }
        Ok(())
    }

    /// Drops the keys for which the predicate is false.
    pub fn retain<F>(&mut self, mut keep: F)
    where
        F: FnMut(&CanonicalKey, &[Cell]) -> bool,
    {
        self._rows.retain(|k, row| keep(k, row.as_slice()));
    }

    pub fn build(self) -> Table {
        Table {
            name: self._name,
            columns: self._columns,
            rows: self._rows,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn key(s: &str) -> CanonicalKey {
        CanonicalKey(s.to_string())
    }

    #[test]
    fn pivot_leaves_unwritten_cells_missing() {
        let mut b = TableBuilder::new("t", &["democrat".to_string(), "republican".to_string()]);
        b.add(&key("01001"), "democrat", Cell::Number(5.0)).unwrap();
        let t = b.build();
        assert_eq!(t.get(&key("01001"), "republican"), Ok(&Cell::Missing));
    }

    #[test]
    fn text_must_agree() {
        let mut b = TableBuilder::new("t", &["winner".to_string()]);
        let k = key("NY-01");
        b.add(&k, "winner", Cell::Text("republican".to_string())).unwrap();
        b.add(&k, "winner", Cell::Text("republican".to_string())).unwrap();
        let err = b.add(&k, "winner", Cell::Text("democrat".to_string()));
        assert!(matches!(err, Err(DataErrors::ConflictingCell { .. })));
    }

    #[test]
    fn unknown_column() {
        let mut b = TableBuilder::new("t", &["a".to_string()]);
        assert!(b.add(&key("x"), "b", Cell::Number(1.0)).is_err());
    }

    #[test]
    fn retain_rows() {
        let mut b = TableBuilder::new("t", &["total".to_string()]);
        b.add(&key("a"), "total", Cell::Number(0.0)).unwrap();
        b.add(&key("b"), "total", Cell::Number(60.0)).unwrap();
        b.retain(|_, row| row[0].as_number().unwrap_or(0.0) >= 50.0);
        let t = b.build();
        assert_eq!(t.len(), 1);
        assert!(t.rows.contains_key(&key("b")));
    }
}
