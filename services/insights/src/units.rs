//! Measure units and the normalizer that rescales categorized result rows to
//! one base unit.

use crate::error::ShapeError;
use crate::table::{Table, Value};
use serde::Serialize;
use std::collections::BTreeMap;

/// Indian numbering units. 1 crore = 100 lakh.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Unit {
    Lakh,
    Crore,
}

impl Unit {
    fn in_lakh(self) -> f64 {
        match self {
            Unit::Lakh => 1.0,
            Unit::Crore => 100.0,
        }
    }

    /// Multiplier converting an amount in `self` into `base`.
    pub fn factor_to(self, base: Unit) -> f64 {
        self.in_lakh() / base.in_lakh()
    }
}

/// Static category -> unit mapping consulted by [`normalize`].
#[derive(Debug, Clone, PartialEq)]
pub struct UnitTable {
    base: Unit,
    units: BTreeMap<String, Unit>,
}

impl UnitTable {
    pub fn new(base: Unit) -> Self {
        Self {
            base,
            units: BTreeMap::new(),
        }
    }

    pub fn with(mut self, category: impl Into<String>, unit: Unit) -> Self {
        self.units.insert(category.into(), unit);
        self
    }

    pub fn insert(&mut self, category: impl Into<String>, unit: Unit) {
        self.units.insert(category.into(), unit);
    }

    pub fn base(&self) -> Unit {
        self.base
    }

    /// `None` for categories that are already in the base unit.
    pub fn factor(&self, category: &str) -> Option<f64> {
        self.units.get(category).map(|u| u.factor_to(self.base))
    }
}

/// Rescale `measure` in every row by the factor of the row's `category`.
///
/// Categories absent from `units` pass through untouched. Callers normalize a
/// table once; running it twice scales twice.
pub fn normalize(
    mut table: Table,
    category: &str,
    measure: &str,
    units: &UnitTable,
) -> Result<Table, ShapeError> {
    let cat_idx = table
        .position(category)
        .ok_or_else(|| ShapeError::MissingColumn(category.to_string()))?;
    let measure_idx = table
        .position(measure)
        .ok_or_else(|| ShapeError::MissingColumn(measure.to_string()))?;

    for row in &mut table.rows {
        let Some(factor) = row[cat_idx].as_str().and_then(|c| units.factor(c)) else {
            continue;
        };
        let scaled = match &row[measure_idx] {
            Value::Null => Value::Null,
            Value::Int(i) => Value::Float(*i as f64 * factor),
            Value::Float(f) => Value::Float(f * factor),
            Value::Text(_) => {
                return Err(ShapeError::NotNumeric {
                    column: measure.to_string(),
                })
            }
        };
        row[measure_idx] = scaled;
    }
    Ok(table)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn summary(rows: Vec<Vec<Value>>) -> Table {
        Table::new(["SANCTIONYEAR", "AMOUNT", "CATEGORY"]).with_rows(rows)
    }

    #[test]
    fn crore_rows_are_scaled_to_lakh() {
        let units = UnitTable::new(Unit::Lakh).with("Pilgrimage", Unit::Crore);
        let table = summary(vec![
            vec!["2019".into(), Value::Float(12.5), "Pilgrimage".into()],
            vec!["2019".into(), Value::Int(40), "Festival".into()],
        ]);

        let out = normalize(table, "CATEGORY", "AMOUNT", &units).expect("normalize");
        assert_eq!(out.rows[0][1], Value::Float(1250.0));
        // untagged category passes through unchanged
        assert!(matches!(out.rows[1][1], Value::Int(40)));
    }

    #[test]
    fn lakh_rows_scale_down_into_crore_base() {
        let units = UnitTable::new(Unit::Crore).with("Festival", Unit::Lakh);
        let table = summary(vec![vec!["2020".into(), Value::Float(250.0), "Festival".into()]]);
        let out = normalize(table, "CATEGORY", "AMOUNT", &units).expect("normalize");
        assert_eq!(out.rows[0][1], Value::Float(2.5));
    }

    #[test]
    fn null_measure_stays_null() {
        let units = UnitTable::new(Unit::Lakh).with("Pilgrimage", Unit::Crore);
        let table = summary(vec![vec!["2021".into(), Value::Null, "Pilgrimage".into()]]);
        let out = normalize(table, "CATEGORY", "AMOUNT", &units).expect("normalize");
        assert!(out.rows[0][1].is_null());
    }

    #[test]
    fn missing_or_textual_measure_is_a_shape_error() {
        let units = UnitTable::new(Unit::Lakh).with("Pilgrimage", Unit::Crore);
        let err = normalize(summary(vec![]), "CATEGORY", "COST", &units).unwrap_err();
        assert_eq!(err, ShapeError::MissingColumn("COST".into()));

        let table = summary(vec![vec!["2021".into(), "n/a".into(), "Pilgrimage".into()]]);
        let err = normalize(table, "CATEGORY", "AMOUNT", &units).unwrap_err();
        assert!(matches!(err, ShapeError::NotNumeric { .. }));
    }
}
