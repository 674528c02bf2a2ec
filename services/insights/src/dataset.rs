//! Declared warehouse tables: their columns, region column, sentinel rows and
//! measure unit. The warehouse schema is an external contract; these
//! declarations are the side of it this crate relies on.

use crate::region::RegionColumn;
use crate::table::Value;
use crate::units::Unit;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ColumnKind {
    Text,
    Number,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ColumnSpec {
    pub name: String,
    pub kind: ColumnKind,
}

impl ColumnSpec {
    pub fn text(name: &str) -> Self {
        Self {
            name: name.to_string(),
            kind: ColumnKind::Text,
        }
    }

    pub fn number(name: &str) -> Self {
        Self {
            name: name.to_string(),
            kind: ColumnKind::Number,
        }
    }
}

/// How a sentinel row is recognised.
#[derive(Debug, Clone, PartialEq)]
pub enum SentinelMatch {
    Exact(String),
    ContainsIgnoreCase(String),
    /// The cell is NULL.
    Missing,
}

/// A row-exclusion predicate: rows whose `column` matches are not real data.
#[derive(Debug, Clone, PartialEq)]
pub struct Exclusion {
    pub column: String,
    pub rule: SentinelMatch,
}

impl Exclusion {
    pub fn exact(column: &str, value: &str) -> Self {
        Self {
            column: column.to_string(),
            rule: SentinelMatch::Exact(value.to_string()),
        }
    }

    pub fn containing(column: &str, needle: &str) -> Self {
        Self {
            column: column.to_string(),
            rule: SentinelMatch::ContainsIgnoreCase(needle.to_string()),
        }
    }

    pub fn missing(column: &str) -> Self {
        Self {
            column: column.to_string(),
            rule: SentinelMatch::Missing,
        }
    }

    /// True when the value is a sentinel. NULL only matches `Missing`.
    pub fn excludes(&self, value: &Value) -> bool {
        let Some(text) = value.to_text() else {
            return self.rule == SentinelMatch::Missing;
        };
        match &self.rule {
            SentinelMatch::Missing => false,
            SentinelMatch::Exact(s) => text == *s,
            SentinelMatch::ContainsIgnoreCase(needle) => {
                text.to_lowercase().contains(&needle.to_lowercase())
            }
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Dataset {
    pub table: String,
    pub columns: Vec<ColumnSpec>,
    pub region: RegionColumn,
    /// Applied to every query against this table.
    pub exclusions: Vec<Exclusion>,
    pub unit: Option<Unit>,
}

impl Dataset {
    pub fn new(table: &str, region: RegionColumn) -> Self {
        Self {
            table: table.to_string(),
            columns: Vec::new(),
            region,
            exclusions: Vec::new(),
            unit: None,
        }
    }

    pub fn column(mut self, spec: ColumnSpec) -> Self {
        self.columns.push(spec);
        self
    }

    pub fn exclude(mut self, exclusion: Exclusion) -> Self {
        self.exclusions.push(exclusion);
        self
    }

    pub fn unit(mut self, unit: Unit) -> Self {
        self.unit = Some(unit);
        self
    }

    pub fn column_spec(&self, name: &str) -> Option<&ColumnSpec> {
        self.columns.iter().find(|c| c.name.eq_ignore_ascii_case(name))
    }

    /// DDL used by the loader when the table does not exist yet.
    pub fn create_table_sql(&self) -> String {
        let cols: Vec<String> = self
            .columns
            .iter()
            .map(|c| {
                let ty = match c.kind {
                    ColumnKind::Text => "TEXT",
                    ColumnKind::Number => "DOUBLE PRECISION",
                };
                format!("{} {}", c.name, ty)
            })
            .collect();
        format!(
            "CREATE TABLE IF NOT EXISTS {} ({})",
            self.table,
            cols.join(", ")
        )
    }
}
