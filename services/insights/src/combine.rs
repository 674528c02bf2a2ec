use crate::error::ShapeError;
use crate::table::Table;

/// Row-wise union of categorized result tables, ordered by `period` then
/// `category` ascending. Empty inputs contribute no rows and their columns are
/// not checked; non-empty inputs must share one schema. When every input is
/// empty the result keeps the columns of the first one that has any.
pub fn combine(tables: Vec<Table>, period: &str, category: &str) -> Result<Table, ShapeError> {
    let mut schema: Option<Vec<String>> = None;
    let mut fallback: Option<Vec<String>> = None;
    let mut rows = Vec::new();

    for table in tables {
        if table.is_empty() {
            if fallback.is_none() && !table.columns.is_empty() {
                fallback = Some(table.columns);
            }
            continue;
        }
        if let Some(expected) = &schema {
            if !same_columns(expected, &table.columns) {
                return Err(ShapeError::SchemaMismatch {
                    expected: expected.clone(),
                    found: table.columns,
                });
            }
        } else {
            schema = Some(table.columns.clone());
        }
        rows.extend(table.rows);
    }

    let Some(columns) = schema else {
        return Ok(match fallback {
            Some(columns) => Table::new(columns),
            None => Table::new([period, category]),
        });
    };
    let out = Table {
        columns,
        rows: Vec::new(),
    };
    let period_idx = out
        .position(period)
        .ok_or_else(|| ShapeError::MissingColumn(period.to_string()))?;
    let category_idx = out
        .position(category)
        .ok_or_else(|| ShapeError::MissingColumn(category.to_string()))?;

    // stable: rows tied on both keys keep their input order
    rows.sort_by(|a, b| {
        a[period_idx]
            .cmp(&b[period_idx])
            .then_with(|| a[category_idx].cmp(&b[category_idx]))
    });
    Ok(out.with_rows(rows))
}

fn same_columns(a: &[String], b: &[String]) -> bool {
    a.len() == b.len() && a.iter().zip(b).all(|(x, y)| x.eq_ignore_ascii_case(y))
}
