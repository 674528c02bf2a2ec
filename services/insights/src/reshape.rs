//! Wide-to-long pivoting of per-year metric columns and row counting over
//! detail tables.

use crate::error::ShapeError;
use crate::table::{Table, Value};
use std::collections::BTreeMap;

/// Maps a per-period column name such as `DTV19` to a display period `2019`.
///
/// The name must be exactly a prefix of `prefix_len` characters followed by
/// two ASCII digits. When an exact prefix is given, columns of any other
/// metric family are rejected too.
#[derive(Debug, Clone, PartialEq)]
pub struct PeriodLabelRule {
    prefix_len: usize,
    prefix: Option<String>,
    century: &'static str,
}

impl PeriodLabelRule {
    /// Strip any `prefix_len` characters.
    pub fn strip(prefix_len: usize) -> Self {
        Self {
            prefix_len,
            prefix: None,
            century: "20",
        }
    }

    /// Strip exactly `prefix`.
    pub fn prefixed(prefix: &str) -> Self {
        Self {
            prefix_len: prefix.chars().count(),
            prefix: Some(prefix.to_string()),
            century: "20",
        }
    }

    pub fn label(&self, column: &str) -> Result<String, ShapeError> {
        let mismatch = || ShapeError::PeriodPattern {
            column: column.to_string(),
            expected: self.describe(),
        };
        let chars: Vec<char> = column.chars().collect();
        if chars.len() != self.prefix_len + 2 {
            return Err(mismatch());
        }
        let (head, suffix) = chars.split_at(self.prefix_len);
        if !suffix.iter().all(char::is_ascii_digit) {
            return Err(mismatch());
        }
        if let Some(prefix) = &self.prefix {
            if head.iter().collect::<String>() != *prefix {
                return Err(mismatch());
            }
        }
        Ok(format!("{}{}", self.century, suffix.iter().collect::<String>()))
    }

    fn describe(&self) -> String {
        match &self.prefix {
            Some(p) => format!("{p}NN"),
            None => format!("{}NN", "?".repeat(self.prefix_len)),
        }
    }
}

/// Pivot `value_columns` of a wide table into `(id, period, value)` rows.
///
/// Every column name is checked against `rule` before any row is produced.
/// Rows come out entity by entity, periods in the declared column order.
pub fn melt(
    table: &Table,
    id_column: &str,
    value_columns: &[&str],
    rule: &PeriodLabelRule,
    period_name: &str,
    value_name: &str,
) -> Result<Table, ShapeError> {
    let id_idx = table
        .position(id_column)
        .ok_or_else(|| ShapeError::MissingColumn(id_column.to_string()))?;

    let mut periods = Vec::with_capacity(value_columns.len());
    for column in value_columns {
        let period = rule.label(column)?;
        let idx = table
            .position(column)
            .ok_or_else(|| ShapeError::MissingColumn(column.to_string()))?;
        periods.push((idx, period));
    }

    let mut out = Table::new([id_column, period_name, value_name]);
    for row in &table.rows {
        for (idx, period) in &periods {
            out.push(vec![
                row[id_idx].clone(),
                Value::text(period.as_str()),
                row[*idx].clone(),
            ]);
        }
    }
    Ok(out)
}

/// Number of rows per distinct combination of `group_columns`, ordered by
/// the group key. Combinations that never occur are not emitted.
pub fn group_count(
    table: &Table,
    group_columns: &[&str],
    count_name: &str,
) -> Result<Table, ShapeError> {
    let indices = group_columns
        .iter()
        .map(|c| {
            table
                .position(c)
                .ok_or_else(|| ShapeError::MissingColumn(c.to_string()))
        })
        .collect::<Result<Vec<_>, _>>()?;

    let mut counts: BTreeMap<Vec<Value>, i64> = BTreeMap::new();
    for row in &table.rows {
        let key: Vec<Value> = indices.iter().map(|&i| row[i].clone()).collect();
        *counts.entry(key).or_insert(0) += 1;
    }

    let mut out = Table::new(group_columns.iter().copied().chain([count_name]));
    for (mut key, count) in counts {
        key.push(Value::Int(count));
        out.push(key);
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn melt_emits_one_row_per_period() {
        let wide = Table::new(["id", "M16", "M17"])
            .with_rows(vec![vec!["X".into(), Value::Int(1), Value::Int(2)]]);
        let long = melt(
            &wide,
            "id",
            &["M16", "M17"],
            &PeriodLabelRule::strip(1),
            "period",
            "value",
        )
        .expect("melt");
        assert_eq!(long.columns, vec!["id", "period", "value"]);
        assert_eq!(
            long.rows,
            vec![
                vec!["X".into(), "2016".into(), Value::Int(1)],
                vec!["X".into(), "2017".into(), Value::Int(2)],
            ]
        );
    }

    #[test]
    fn malformed_column_fails_instead_of_emitting_bad_period() {
        let wide = Table::new(["id", "M16", "Misc"])
            .with_rows(vec![vec!["X".into(), Value::Int(1), Value::Int(9)]]);
        let err = melt(
            &wide,
            "id",
            &["M16", "Misc"],
            &PeriodLabelRule::strip(1),
            "period",
            "value",
        )
        .unwrap_err();
        assert!(matches!(err, ShapeError::PeriodPattern { ref column, .. } if column == "Misc"));
    }

    #[test]
    fn exact_prefix_keeps_metric_families_apart() {
        let rule = PeriodLabelRule::prefixed("DTV");
        assert_eq!(rule.label("DTV19").expect("label"), "2019");
        assert!(rule.label("FTV19").is_err());
        assert!(rule.label("DTV2019").is_err());
        assert!(rule.label("DTVxx").is_err());
    }

    #[test]
    fn melt_reports_missing_columns() {
        let wide = Table::new(["STATE", "DTV19"]);
        let err = melt(
            &wide,
            "STATE",
            &["DTV20"],
            &PeriodLabelRule::prefixed("DTV"),
            "YEAR",
            "VISITS",
        )
        .unwrap_err();
        assert_eq!(err, ShapeError::MissingColumn("DTV20".into()));
    }

    #[test]
    fn group_count_only_counts_observed_combinations() {
        let detail = Table::new(["S", "T"]).with_rows(vec![
            vec!["A".into(), "x".into()],
            vec!["A".into(), "x".into()],
            vec!["B".into(), "y".into()],
        ]);
        let counts = group_count(&detail, &["S", "T"], "n").expect("group_count");
        assert_eq!(counts.columns, vec!["S", "T", "n"]);
        assert_eq!(
            counts.rows,
            vec![
                vec!["A".into(), "x".into(), Value::Int(2)],
                vec!["B".into(), "y".into(), Value::Int(1)],
            ]
        );
        assert!(!counts
            .rows
            .iter()
            .any(|r| r[0] == Value::text("A") && r[1] == Value::text("y")));
    }

    #[test]
    fn group_count_of_empty_table_is_empty() {
        let detail = Table::new(["STATE"]);
        let counts = group_count(&detail, &["STATE"], "Peak Count").expect("group_count");
        assert!(counts.is_empty());
        assert_eq!(counts.columns, vec!["STATE", "Peak Count"]);
    }
}
