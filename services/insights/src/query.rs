//! Aggregate definitions and the builder that turns a definition plus a region
//! filter into a concrete [`AggregateQuery`].
//!
//! Predicates are kept as a structured list and joined by a single `AND` when
//! rendered, so the `WHERE` clause is correct whichever of the sentinel
//! exclusions and the region filter are present.

use crate::dataset::{ColumnKind, Dataset, Exclusion, SentinelMatch};
use crate::error::QueryError;
use crate::region::{Casing, Filter, RegionColumn};
use crate::table::{Table, Value};
use sqlx::{Postgres, QueryBuilder};
use std::sync::Arc;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Asc,
    Desc,
}

#[derive(Debug, Clone, PartialEq)]
pub struct OrderBy {
    pub alias: String,
    pub direction: Direction,
}

#[derive(Debug, Clone, PartialEq)]
enum DimensionSource {
    Column(String),
    Region,
}

#[derive(Debug, Clone, PartialEq)]
struct Dimension {
    source: DimensionSource,
    alias: String,
}

#[derive(Debug, Clone, PartialEq)]
enum Measure {
    Sum { column: String, alias: String },
    Count { alias: String },
    CountOf { column: String, alias: String },
}

/// What to aggregate, independent of the region filter.
#[derive(Debug, Clone)]
pub struct AggregateDefinition {
    dataset: Arc<Dataset>,
    dimensions: Vec<Dimension>,
    measures: Vec<Measure>,
    label: Option<(String, String)>,
    exclusions: Vec<Exclusion>,
    distinct: bool,
    order: Vec<OrderBy>,
    limit: Option<u32>,
}

impl AggregateDefinition {
    pub fn on(dataset: &Arc<Dataset>) -> Self {
        Self {
            dataset: Arc::clone(dataset),
            dimensions: Vec::new(),
            measures: Vec::new(),
            label: None,
            exclusions: Vec::new(),
            distinct: false,
            order: Vec::new(),
            limit: None,
        }
    }

    /// Output a raw column. Becomes a group key when the definition has
    /// measures.
    pub fn column(mut self, column: &str, alias: &str) -> Self {
        self.dimensions.push(Dimension {
            source: DimensionSource::Column(column.to_string()),
            alias: alias.to_string(),
        });
        self
    }

    /// Output the canonical region of each row.
    pub fn region(mut self, alias: &str) -> Self {
        self.dimensions.push(Dimension {
            source: DimensionSource::Region,
            alias: alias.to_string(),
        });
        self
    }

    pub fn sum(mut self, column: &str, alias: &str) -> Self {
        self.measures.push(Measure::Sum {
            column: column.to_string(),
            alias: alias.to_string(),
        });
        self
    }

    pub fn count(mut self, alias: &str) -> Self {
        self.measures.push(Measure::Count {
            alias: alias.to_string(),
        });
        self
    }

    /// Count of non-null values of `column`.
    pub fn count_of(mut self, column: &str, alias: &str) -> Self {
        self.measures.push(Measure::CountOf {
            column: column.to_string(),
            alias: alias.to_string(),
        });
        self
    }

    /// Constant category tag appended as the last output column.
    pub fn label(mut self, alias: &str, value: &str) -> Self {
        self.label = Some((alias.to_string(), value.to_string()));
        self
    }

    /// Extra exclusion on top of the dataset's sentinel rows.
    pub fn exclude(mut self, exclusion: Exclusion) -> Self {
        self.exclusions.push(exclusion);
        self
    }

    pub fn distinct(mut self) -> Self {
        self.distinct = true;
        self
    }

    pub fn order_by(mut self, alias: &str, direction: Direction) -> Self {
        self.order.push(OrderBy {
            alias: alias.to_string(),
            direction,
        });
        self
    }

    pub fn limit(mut self, n: u32) -> Self {
        self.limit = Some(n);
        self
    }

    pub fn dataset(&self) -> &Arc<Dataset> {
        &self.dataset
    }

    /// The `(alias, value)` category tag, if any.
    pub fn label_tag(&self) -> Option<(&str, &str)> {
        self.label.as_ref().map(|(a, v)| (a.as_str(), v.as_str()))
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum SelectExpr {
    Column { name: String, kind: ColumnKind },
    Region(RegionColumn),
    Sum(String),
    Count,
    CountOf(String),
    Literal(String),
}

impl SelectExpr {
    pub fn is_aggregate(&self) -> bool {
        matches!(self, SelectExpr::Sum(_) | SelectExpr::Count | SelectExpr::CountOf(_))
    }

    pub fn is_group_key(&self) -> bool {
        matches!(self, SelectExpr::Column { .. } | SelectExpr::Region(_))
    }

    fn sql(&self) -> String {
        match self {
            SelectExpr::Column {
                name,
                kind: ColumnKind::Text,
            } => format!("CAST({name} AS TEXT)"),
            SelectExpr::Column {
                name,
                kind: ColumnKind::Number,
            } => format!("CAST({name} AS DOUBLE PRECISION)"),
            SelectExpr::Region(region) => region_sql(region),
            SelectExpr::Sum(column) => format!("CAST(SUM({column}) AS DOUBLE PRECISION)"),
            SelectExpr::Count => "COUNT(*)".to_string(),
            SelectExpr::CountOf(column) => format!("COUNT({column})"),
            SelectExpr::Literal(value) => format!("CAST({} AS TEXT)", quote_literal(value)),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct SelectItem {
    pub expr: SelectExpr,
    pub alias: String,
}

/// One conjunct of the `WHERE` clause.
#[derive(Debug, Clone, PartialEq)]
pub enum Predicate {
    Exclude(Exclusion),
    RegionEquals { region: RegionColumn, value: String },
}

impl Predicate {
    /// Evaluate against one row of a table holding the source columns.
    /// Missing columns read as NULL.
    pub fn matches(&self, table: &Table, row: &[Value]) -> bool {
        match self {
            Predicate::Exclude(exclusion) => !table
                .get(row, &exclusion.column)
                .is_some_and(|v| exclusion.excludes(v)),
            Predicate::RegionEquals { region, value } => table
                .get(row, &region.column)
                .and_then(Value::to_text)
                .is_some_and(|raw| region.canonicalize(&raw) == *value),
        }
    }

    /// SQL condition and the bound right-hand value, if it takes one.
    fn sql(&self) -> (String, Option<String>) {
        match self {
            Predicate::Exclude(Exclusion { column, rule }) => {
                let text = format!("COALESCE(CAST({column} AS TEXT), '')");
                match rule {
                    SentinelMatch::Exact(value) => {
                        (format!("{text} <> "), Some(value.clone()))
                    }
                    SentinelMatch::ContainsIgnoreCase(needle) => (
                        format!("{text} NOT ILIKE "),
                        Some(format!("%{}%", escape_like(needle))),
                    ),
                    SentinelMatch::Missing => (format!("{column} IS NOT NULL"), None),
                }
            }
            Predicate::RegionEquals { region, value } => {
                (format!("{} = ", region_sql(region)), Some(value.clone()))
            }
        }
    }
}

/// A fully specified aggregation request, ready for a warehouse.
#[derive(Debug, Clone, PartialEq)]
pub struct AggregateQuery {
    pub table: String,
    pub select: Vec<SelectItem>,
    pub predicates: Vec<Predicate>,
    pub distinct: bool,
    pub order: Vec<OrderBy>,
    pub limit: Option<u32>,
}

impl AggregateQuery {
    pub fn columns(&self) -> Vec<String> {
        self.select.iter().map(|s| s.alias.clone()).collect()
    }

    pub fn is_grouped(&self) -> bool {
        self.select.iter().any(|s| s.expr.is_aggregate())
    }

    /// Render for Postgres. The region value and sentinel values are bound
    /// parameters; everything else is validated static configuration.
    pub fn to_sql(&self) -> QueryBuilder<'static, Postgres> {
        let mut qb = QueryBuilder::new("SELECT ");
        if self.distinct {
            qb.push("DISTINCT ");
        }
        let items: Vec<String> = self
            .select
            .iter()
            .map(|s| format!("{} AS \"{}\"", s.expr.sql(), s.alias))
            .collect();
        qb.push(items.join(", "));
        qb.push(" FROM ");
        qb.push(&self.table);

        if !self.predicates.is_empty() {
            qb.push(" WHERE ");
            let mut clauses = qb.separated(" AND ");
            for predicate in &self.predicates {
                let (condition, value) = predicate.sql();
                clauses.push(condition);
                if let Some(value) = value {
                    clauses.push_bind_unseparated(value);
                }
            }
        }

        if self.is_grouped() {
            let keys: Vec<String> = self
                .select
                .iter()
                .enumerate()
                .filter(|(_, s)| s.expr.is_group_key())
                .map(|(i, _)| (i + 1).to_string())
                .collect();
            if !keys.is_empty() {
                qb.push(" GROUP BY ");
                qb.push(keys.join(", "));
            }
        }

        if !self.order.is_empty() {
            let keys: Vec<String> = self
                .order
                .iter()
                .map(|o| match o.direction {
                    Direction::Asc => format!("\"{}\" ASC", o.alias),
                    Direction::Desc => format!("\"{}\" DESC", o.alias),
                })
                .collect();
            qb.push(" ORDER BY ");
            qb.push(keys.join(", "));
        }

        if let Some(n) = self.limit {
            qb.push(" LIMIT ");
            qb.push(n);
        }
        qb
    }
}

/// Compose a definition with a filter.
///
/// The base predicates are the dataset's sentinel exclusions followed by the
/// definition's own; a concrete region adds one equality on the canonical
/// region expression. Ties in the ordering are left to the warehouse's
/// stable row order.
pub fn build(def: &AggregateDefinition, filter: &Filter) -> Result<AggregateQuery, QueryError> {
    let dataset = &def.dataset;
    ensure_identifier(&dataset.table)?;
    ensure_declared(dataset, &dataset.region.column)?;

    let mut select = Vec::new();
    for dim in &def.dimensions {
        let expr = match &dim.source {
            DimensionSource::Column(name) => SelectExpr::Column {
                name: name.clone(),
                kind: ensure_declared(dataset, name)?,
            },
            DimensionSource::Region => SelectExpr::Region(dataset.region.clone()),
        };
        select.push(SelectItem {
            expr,
            alias: dim.alias.clone(),
        });
    }
    for measure in &def.measures {
        let (expr, alias) = match measure {
            Measure::Sum { column, alias } => {
                ensure_declared(dataset, column)?;
                (SelectExpr::Sum(column.clone()), alias)
            }
            Measure::Count { alias } => (SelectExpr::Count, alias),
            Measure::CountOf { column, alias } => {
                ensure_declared(dataset, column)?;
                (SelectExpr::CountOf(column.clone()), alias)
            }
        };
        select.push(SelectItem {
            expr,
            alias: alias.clone(),
        });
    }
    if let Some((alias, value)) = &def.label {
        select.push(SelectItem {
            expr: SelectExpr::Literal(value.clone()),
            alias: alias.clone(),
        });
    }
    for item in &select {
        ensure_identifier(&item.alias)?;
    }

    for order in &def.order {
        if !select.iter().any(|s| s.alias == order.alias) {
            return Err(QueryError::UnknownColumn {
                table: dataset.table.clone(),
                column: order.alias.clone(),
            });
        }
    }

    let mut predicates = Vec::new();
    for exclusion in dataset.exclusions.iter().chain(&def.exclusions) {
        ensure_declared(dataset, &exclusion.column)?;
        predicates.push(Predicate::Exclude(exclusion.clone()));
    }
    if let Some(region) = filter.region() {
        predicates.push(Predicate::RegionEquals {
            region: dataset.region.clone(),
            value: region.as_str().to_string(),
        });
    }

    Ok(AggregateQuery {
        table: dataset.table.clone(),
        select,
        predicates,
        distinct: def.distinct,
        order: def.order.clone(),
        limit: def.limit,
    })
}

fn ensure_identifier(ident: &str) -> Result<(), QueryError> {
    let mut chars = ident.chars();
    let valid = chars
        .next()
        .is_some_and(|c| c.is_ascii_alphabetic() || c == '_')
        && chars.all(|c| c.is_ascii_alphanumeric() || c == '_');
    if valid {
        Ok(())
    } else {
        Err(QueryError::InvalidIdentifier(ident.to_string()))
    }
}

fn ensure_declared(dataset: &Dataset, column: &str) -> Result<ColumnKind, QueryError> {
    ensure_identifier(column)?;
    dataset
        .column_spec(column)
        .map(|c| c.kind)
        .ok_or_else(|| QueryError::UnknownColumn {
            table: dataset.table.clone(),
            column: column.to_string(),
        })
}

fn region_sql(region: &RegionColumn) -> String {
    let base = match region.casing {
        Casing::AsIs => format!("BTRIM({})", region.column),
        Casing::Title => format!("INITCAP(BTRIM({}))", region.column),
    };
    if region.synonyms.is_empty() {
        return base;
    }
    let mut sql = String::from("CASE");
    for (alias, canonical) in &region.synonyms {
        sql.push_str(&format!(
            " WHEN {base} = {} THEN {}",
            quote_literal(alias),
            quote_literal(canonical)
        ));
    }
    sql.push_str(&format!(" ELSE {base} END"));
    sql
}

fn quote_literal(value: &str) -> String {
    format!("'{}'", value.replace('\'', "''"))
}

fn escape_like(needle: &str) -> String {
    needle
        .replace('\\', "\\\\")
        .replace('%', "\\%")
        .replace('_', "\\_")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dataset::ColumnSpec;
    use crate::region::Region;

    fn providers(with_sentinel: bool) -> Arc<Dataset> {
        let mut ds = Dataset::new(
            "TRAVELPROVIDERS",
            RegionColumn::new("STATE").synonym("Uttrakhand", "Uttarakhand"),
        )
        .column(ColumnSpec::text("STATE"))
        .column(ColumnSpec::text("CATEGORY"))
        .column(ColumnSpec::text("ORGANISATION"));
        if with_sentinel {
            ds = ds.exclude(Exclusion::exact("STATE", "State"));
        }
        Arc::new(ds)
    }

    fn detail(ds: &Arc<Dataset>) -> AggregateDefinition {
        AggregateDefinition::on(ds)
            .region("STATE")
            .column("ORGANISATION", "ORGANISATION")
    }

    fn goa() -> Filter {
        Filter::Region(Region::new("Goa"))
    }

    fn synthetic() -> Table {
        Table::new(["STATE", "CATEGORY", "ORGANISATION"]).with_rows(vec![
            vec!["State".into(), "Category".into(), "Organisation".into()],
            vec!["Goa".into(), "Tour Operator".into(), "Sea Trails".into()],
            vec!["Kerala".into(), "Travel Agent".into(), "Backwater Co".into()],
            vec!["Uttrakhand".into(), "Adventure".into(), "Peak Hikers".into()],
            vec!["Goa".into(), "Travel Agent".into(), "Coast Line".into()],
        ])
    }

    fn kept(query: &AggregateQuery) -> Vec<String> {
        let table = synthetic();
        table
            .rows
            .iter()
            .filter(|row| query.predicates.iter().all(|p| p.matches(&table, row)))
            .map(|row| row[2].as_str().unwrap_or_default().to_string())
            .collect()
    }

    #[test]
    fn no_exclusions_and_no_filter_renders_no_where() {
        let q = build(&detail(&providers(false)), &Filter::All).expect("build");
        let sql = q.to_sql().sql().to_string();
        assert!(!sql.contains("WHERE"), "{sql}");
        assert_eq!(kept(&q).len(), 5);
    }

    #[test]
    fn exclusions_only_renders_single_clause() {
        let q = build(&detail(&providers(true)), &Filter::All).expect("build");
        let sql = q.to_sql().sql().to_string();
        assert!(
            sql.ends_with(" WHERE COALESCE(CAST(STATE AS TEXT), '') <> $1"),
            "{sql}"
        );
        assert!(!sql.contains(" AND "));
        assert_eq!(
            kept(&q),
            vec!["Sea Trails", "Backwater Co", "Peak Hikers", "Coast Line"]
        );
    }

    #[test]
    fn filter_only_renders_single_clause() {
        let q = build(&detail(&providers(false)), &goa()).expect("build");
        let sql = q.to_sql().sql().to_string();
        assert!(
            sql.contains(" WHERE CASE WHEN BTRIM(STATE) = 'Uttrakhand'"),
            "{sql}"
        );
        assert!(sql.ends_with("ELSE BTRIM(STATE) END = $1"), "{sql}");
        assert!(!sql.contains(" AND "));
        assert_eq!(kept(&q), vec!["Sea Trails", "Coast Line"]);
    }

    #[test]
    fn exclusions_and_filter_are_conjoined_once() {
        let q = build(&detail(&providers(true)), &goa()).expect("build");
        let sql = q.to_sql().sql().to_string();
        assert_eq!(sql.matches(" WHERE ").count(), 1, "{sql}");
        assert_eq!(sql.matches(" AND ").count(), 1, "{sql}");
        assert!(sql.contains("<> $1 AND CASE WHEN"), "{sql}");
        assert_eq!(kept(&q), vec!["Sea Trails", "Coast Line"]);
    }

    #[test]
    fn region_filter_matches_synonym_rows() {
        let filter = Filter::Region(Region::new("Uttarakhand"));
        let q = build(&detail(&providers(true)), &filter).expect("build");
        assert_eq!(kept(&q), vec!["Peak Hikers"]);
    }

    #[test]
    fn top_n_renders_grouping_order_and_limit() {
        let fairs = Arc::new(
            Dataset::new("FAIRSANDCARNIVALSBYSTATE", RegionColumn::new("STATE"))
                .column(ColumnSpec::text("STATE"))
                .column(ColumnSpec::text("NAMEOFFAIRS"))
                .column(ColumnSpec::number("AMOUNTRELEASED")),
        );
        let def = AggregateDefinition::on(&fairs)
            .region("STATE")
            .column("NAMEOFFAIRS", "NAME")
            .sum("AMOUNTRELEASED", "AMOUNT")
            .order_by("AMOUNT", Direction::Desc)
            .limit(6);
        let q = build(&def, &Filter::All).expect("build");
        assert_eq!(
            q.to_sql().sql(),
            "SELECT BTRIM(STATE) AS \"STATE\", CAST(NAMEOFFAIRS AS TEXT) AS \"NAME\", \
             CAST(SUM(AMOUNTRELEASED) AS DOUBLE PRECISION) AS \"AMOUNT\" \
             FROM FAIRSANDCARNIVALSBYSTATE GROUP BY 1, 2 ORDER BY \"AMOUNT\" DESC LIMIT 6"
        );
        assert_eq!(q.columns(), vec!["STATE", "NAME", "AMOUNT"]);
    }

    #[test]
    fn label_and_count_render_after_dimensions() {
        let ds = providers(true);
        let def = AggregateDefinition::on(&ds)
            .column("CATEGORY", "CATEGORY")
            .count_of("ORGANISATION", "NUMBER_OF_ORGANISATIONS")
            .label("SOURCE", "Provider's list");
        let q = build(&def, &Filter::All).expect("build");
        let sql = q.to_sql().sql().to_string();
        assert!(
            sql.contains("COUNT(ORGANISATION) AS \"NUMBER_OF_ORGANISATIONS\", CAST('Provider''s list' AS TEXT) AS \"SOURCE\""),
            "{sql}"
        );
        assert!(sql.ends_with("GROUP BY 1"), "{sql}");
    }

    #[test]
    fn title_cased_region_uses_initcap() {
        let ds = Arc::new(
            Dataset::new("MOUNTAINSPORTS", RegionColumn::new("STATE").title_cased())
                .column(ColumnSpec::text("STATE")),
        );
        let q = build(&AggregateDefinition::on(&ds).region("STATE"), &goa()).expect("build");
        assert!(q.to_sql().sql().ends_with("WHERE INITCAP(BTRIM(STATE)) = $1"));
    }

    #[test]
    fn substring_exclusion_uses_escaped_ilike() {
        let ds = providers(false);
        let def = detail(&ds).exclude(Exclusion::containing("ORGANISATION", "100%"));
        let q = build(&def, &Filter::All).expect("build");
        assert!(q
            .to_sql()
            .sql()
            .ends_with("COALESCE(CAST(ORGANISATION AS TEXT), '') NOT ILIKE $1"));
        let (_, bound) = q.predicates[0].sql();
        assert_eq!(bound.as_deref(), Some("%100\\%%"));
    }

    #[test]
    fn missing_exclusion_renders_without_a_bind() {
        let ds = providers(true);
        let def = detail(&ds).exclude(Exclusion::missing("ORGANISATION"));
        let q = build(&def, &goa()).expect("build");
        let sql = q.to_sql().sql().to_string();
        assert!(
            sql.contains("<> $1 AND ORGANISATION IS NOT NULL AND CASE WHEN"),
            "{sql}"
        );
        assert!(sql.ends_with("END = $2"), "{sql}");
    }

    #[test]
    fn undeclared_column_is_rejected() {
        let ds = providers(false);
        let err = build(&detail(&ds).column("PHONE", "PHONE"), &Filter::All).unwrap_err();
        assert!(matches!(err, QueryError::UnknownColumn { ref column, .. } if column == "PHONE"));

        let err = build(
            &detail(&ds).order_by("AMOUNT", Direction::Desc),
            &Filter::All,
        )
        .unwrap_err();
        assert!(matches!(err, QueryError::UnknownColumn { .. }));
    }

    #[test]
    fn unsafe_alias_is_rejected() {
        let ds = providers(false);
        let err = build(&detail(&ds).column("CATEGORY", "x\" ; DROP"), &Filter::All).unwrap_err();
        assert!(matches!(err, QueryError::InvalidIdentifier(_)));
    }
}
