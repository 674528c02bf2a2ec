use crate::dataset::ColumnKind;
use crate::error::QueryError;
use crate::query::{AggregateQuery, Direction, Predicate, SelectExpr};
use crate::table::{Table, Value};
use crate::warehouse::Warehouse;
use std::cmp::Ordering;
use std::collections::{BTreeMap, BTreeSet};

/// Evaluates [`AggregateQuery`]s over tables held in memory, with the same
/// filtering, grouping, ordering and limit semantics as the SQL rendering.
#[derive(Debug, Clone, Default)]
pub struct MemoryWarehouse {
    tables: BTreeMap<String, Table>,
}

impl MemoryWarehouse {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_table(mut self, name: &str, table: Table) -> Self {
        self.insert(name, table);
        self
    }

    pub fn insert(&mut self, name: &str, table: Table) {
        self.tables.insert(name.to_ascii_uppercase(), table);
    }

    pub fn run(&self, query: &AggregateQuery) -> Result<Table, QueryError> {
        let source = self
            .tables
            .get(&query.table.to_ascii_uppercase())
            .ok_or_else(|| QueryError::UnknownTable(query.table.clone()))?;
        for column in referenced_columns(query) {
            if source.position(column).is_none() {
                return Err(QueryError::UnknownColumn {
                    table: query.table.clone(),
                    column: column.to_string(),
                });
            }
        }

        let matching: Vec<&Vec<Value>> = source
            .rows
            .iter()
            .filter(|row| query.predicates.iter().all(|p| p.matches(source, row)))
            .collect();

        let mut out = Table::new(query.columns());
        if query.is_grouped() {
            out.rows = grouped_rows(query, source, &matching);
        } else {
            let mut seen = BTreeSet::new();
            for row in matching {
                let projected: Vec<Value> = query
                    .select
                    .iter()
                    .map(|s| scalar(&s.expr, source, row))
                    .collect();
                if query.distinct && !seen.insert(projected.clone()) {
                    continue;
                }
                out.push(projected);
            }
        }

        let order: Vec<(usize, Direction)> = query
            .order
            .iter()
            .filter_map(|o| out.position(&o.alias).map(|i| (i, o.direction)))
            .collect();
        out.rows.sort_by(|a, b| {
            order.iter().fold(Ordering::Equal, |acc, &(i, dir)| {
                acc.then_with(|| match dir {
                    Direction::Asc => warehouse_cmp(&a[i], &b[i]),
                    Direction::Desc => warehouse_cmp(&b[i], &a[i]),
                })
            })
        });
        if let Some(n) = query.limit {
            out.rows.truncate(n as usize);
        }
        Ok(out)
    }
}

impl Warehouse for MemoryWarehouse {
    async fn fetch(&self, query: &AggregateQuery) -> Result<Table, QueryError> {
        self.run(query)
    }
}

fn referenced_columns(query: &AggregateQuery) -> Vec<&str> {
    let mut columns = Vec::new();
    for item in &query.select {
        match &item.expr {
            SelectExpr::Column { name, .. } | SelectExpr::Sum(name) | SelectExpr::CountOf(name) => {
                columns.push(name.as_str())
            }
            SelectExpr::Region(region) => columns.push(region.column.as_str()),
            SelectExpr::Count | SelectExpr::Literal(_) => {}
        }
    }
    for predicate in &query.predicates {
        match predicate {
            Predicate::Exclude(ex) => columns.push(ex.column.as_str()),
            Predicate::RegionEquals { region, .. } => columns.push(region.column.as_str()),
        }
    }
    columns
}

/// Groups keep first-seen order, like an unordered warehouse scan.
fn grouped_rows(query: &AggregateQuery, source: &Table, rows: &[&Vec<Value>]) -> Vec<Vec<Value>> {
    let key_of = |row: &Vec<Value>| -> Vec<Value> {
        query
            .select
            .iter()
            .filter(|s| s.expr.is_group_key())
            .map(|s| scalar(&s.expr, source, row))
            .collect()
    };

    let mut index: BTreeMap<Vec<Value>, usize> = BTreeMap::new();
    let mut groups: Vec<Vec<&Vec<Value>>> = Vec::new();
    for &row in rows {
        let key = key_of(row);
        let slot = *index.entry(key).or_insert_with(|| {
            groups.push(Vec::new());
            groups.len() - 1
        });
        groups[slot].push(row);
    }
    // an aggregate without group keys always yields exactly one row
    if groups.is_empty() && !query.select.iter().any(|s| s.expr.is_group_key()) {
        groups.push(Vec::new());
    }

    groups
        .into_iter()
        .map(|members| {
            query
                .select
                .iter()
                .map(|s| match &s.expr {
                    SelectExpr::Sum(column) => {
                        let values: Vec<f64> = members
                            .iter()
                            .filter_map(|r| source.get(r, column).and_then(as_number))
                            .collect();
                        if values.is_empty() {
                            Value::Null
                        } else {
                            Value::Float(values.iter().sum())
                        }
                    }
                    SelectExpr::Count => Value::Int(members.len() as i64),
                    SelectExpr::CountOf(column) => Value::Int(
                        members
                            .iter()
                            .filter(|r| source.get(r, column).is_some_and(|v| !v.is_null()))
                            .count() as i64,
                    ),
                    expr => members
                        .first()
                        .map(|r| scalar(expr, source, r))
                        .unwrap_or(Value::Null),
                })
                .collect()
        })
        .collect()
}

fn scalar(expr: &SelectExpr, source: &Table, row: &[Value]) -> Value {
    let read = |column: &str| source.get(row, column).cloned().unwrap_or(Value::Null);
    match expr {
        SelectExpr::Column {
            name,
            kind: ColumnKind::Text,
        } => read(name).to_text().map(Value::Text).unwrap_or(Value::Null),
        SelectExpr::Column {
            name,
            kind: ColumnKind::Number,
        } => as_number(&read(name)).map(Value::Float).unwrap_or(Value::Null),
        SelectExpr::Region(region) => read(&region.column)
            .to_text()
            .map(|raw| Value::Text(region.canonicalize(&raw)))
            .unwrap_or(Value::Null),
        SelectExpr::Literal(value) => Value::text(value.as_str()),
        SelectExpr::Sum(_) | SelectExpr::Count | SelectExpr::CountOf(_) => Value::Null,
    }
}

fn as_number(value: &Value) -> Option<f64> {
    match value {
        Value::Text(s) => s.trim().parse().ok(),
        other => other.as_f64(),
    }
}

/// NULLs sort after every value, as in the warehouse's default ordering.
fn warehouse_cmp(a: &Value, b: &Value) -> Ordering {
    match (a.is_null(), b.is_null()) {
        (true, true) => Ordering::Equal,
        (true, false) => Ordering::Greater,
        (false, true) => Ordering::Less,
        (false, false) => a.cmp(b),
    }
}
