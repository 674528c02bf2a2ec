//! Pages and sections of the dashboard.
//!
//! Every page variant is configuration for the same renderer: a section names
//! its aggregate definitions and the reshape applied to their results.

use crate::catalog::resolve_regions;
use crate::combine::combine;
use crate::dataset::Dataset;
use crate::error::{ResolutionError, SectionError};
use crate::query::{build, AggregateDefinition};
use crate::region::{Filter, Region};
use crate::reshape::{group_count, melt, PeriodLabelRule};
use crate::table::Table;
use crate::units::{normalize, Unit, UnitTable};
use crate::warehouse::Warehouse;
use serde::Serialize;
use std::sync::Arc;
use tracing::{info, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Visibility {
    Always,
    /// Only rendered when a concrete region is selected.
    RegionOnly,
}

/// One metric family of a wide per-year table, e.g. domestic visits `DTVyy`.
#[derive(Debug, Clone)]
pub struct MetricFamily {
    pub name: String,
    pub prefix: String,
    pub columns: Vec<String>,
}

impl MetricFamily {
    /// Columns `{prefix}{yy}` for each two-digit year.
    pub fn years(name: &str, prefix: &str, years: impl IntoIterator<Item = u8>) -> Self {
        Self {
            name: name.to_string(),
            prefix: prefix.to_string(),
            columns: years
                .into_iter()
                .map(|yy| format!("{prefix}{yy:02}"))
                .collect(),
        }
    }
}

#[derive(Debug, Clone)]
pub enum SectionKind {
    /// Categorized aggregates stacked into one table, measures rescaled to
    /// `base` using each part's dataset unit.
    Combined {
        parts: Vec<AggregateDefinition>,
        period: String,
        category: String,
        measure: String,
        base: Unit,
    },
    /// A single aggregate passed through as-is.
    Table(AggregateDefinition),
    /// Detail rows plus a row count per group. The grouping differs with and
    /// without a selected region.
    Counted {
        rows: AggregateDefinition,
        all_groups: Vec<String>,
        region_groups: Vec<String>,
        count: String,
    },
    /// Wide per-year rows, melted separately per metric family.
    Trend {
        rows: AggregateDefinition,
        id: String,
        families: Vec<MetricFamily>,
        period: String,
        value: String,
    },
}

#[derive(Debug, Clone)]
pub struct Section {
    pub id: String,
    pub title: String,
    pub visibility: Visibility,
    pub kind: SectionKind,
}

impl Section {
    pub fn new(id: &str, title: &str, kind: SectionKind) -> Self {
        Self {
            id: id.to_string(),
            title: title.to_string(),
            visibility: Visibility::Always,
            kind,
        }
    }

    pub fn region_only(mut self) -> Self {
        self.visibility = Visibility::RegionOnly;
        self
    }

    pub fn is_visible(&self, filter: &Filter) -> bool {
        match self.visibility {
            Visibility::Always => true,
            Visibility::RegionOnly => filter.region().is_some(),
        }
    }

    /// Run this section's queries in order and reshape the results.
    pub async fn render<W: Warehouse>(
        &self,
        warehouse: &W,
        filter: &Filter,
    ) -> Result<Vec<NamedTable>, SectionError> {
        match &self.kind {
            SectionKind::Combined {
                parts,
                period,
                category,
                measure,
                base,
            } => {
                let mut units = UnitTable::new(*base);
                let mut tables = Vec::with_capacity(parts.len());
                for part in parts {
                    if let (Some((_, tag)), Some(unit)) = (part.label_tag(), part.dataset().unit) {
                        units.insert(tag, unit);
                    }
                    tables.push(warehouse.fetch(&build(part, filter)?).await?);
                }
                let combined = combine(tables, period, category)?;
                let summary = normalize(combined, category, measure, &units)?;
                Ok(vec![NamedTable::new("summary", summary)])
            }
            SectionKind::Table(def) => {
                let rows = warehouse.fetch(&build(def, filter)?).await?;
                Ok(vec![NamedTable::new("rows", rows)])
            }
            SectionKind::Counted {
                rows,
                all_groups,
                region_groups,
                count,
            } => {
                let detail = warehouse.fetch(&build(rows, filter)?).await?;
                let groups: Vec<&str> = match filter {
                    Filter::All => all_groups.iter().map(String::as_str).collect(),
                    Filter::Region(_) => region_groups.iter().map(String::as_str).collect(),
                };
                let counts = group_count(&detail, &groups, count)?;
                Ok(vec![
                    NamedTable::new("counts", counts),
                    NamedTable::new("rows", detail),
                ])
            }
            SectionKind::Trend {
                rows,
                id,
                families,
                period,
                value,
            } => {
                let wide = warehouse.fetch(&build(rows, filter)?).await?;
                let mut out = Vec::with_capacity(families.len());
                for family in families {
                    let columns: Vec<&str> = family.columns.iter().map(String::as_str).collect();
                    let rule = PeriodLabelRule::prefixed(&family.prefix);
                    let long = melt(&wide, id, &columns, &rule, period, value)?;
                    out.push(NamedTable::new(&family.name, long));
                }
                Ok(out)
            }
        }
    }
}

#[derive(Debug, Clone)]
pub struct Page {
    pub id: String,
    pub title: String,
    /// Datasets whose regions make up this page's filter options.
    pub catalog: Vec<Arc<Dataset>>,
    pub sections: Vec<Section>,
}

impl Page {
    pub async fn regions<W: Warehouse>(&self, warehouse: &W) -> Result<Vec<Region>, ResolutionError> {
        resolve_regions(warehouse, &self.catalog).await
    }

    /// Render every visible section. A failing section is reported in its
    /// view and does not stop the others.
    pub async fn render<W: Warehouse>(&self, warehouse: &W, filter: &Filter) -> PageView {
        let mut sections = Vec::new();
        for section in self.sections.iter().filter(|s| s.is_visible(filter)) {
            let view = match section.render(warehouse, filter).await {
                Ok(tables) if tables.iter().all(|t| t.table.is_empty()) => SectionView {
                    id: section.id.clone(),
                    title: section.title.clone(),
                    status: SectionStatus::Empty,
                    tables,
                    error: None,
                },
                Ok(tables) => SectionView {
                    id: section.id.clone(),
                    title: section.title.clone(),
                    status: SectionStatus::Ok,
                    tables,
                    error: None,
                },
                Err(e) => {
                    warn!(page = %self.id, section = %section.id, error = %e, "section failed");
                    SectionView {
                        id: section.id.clone(),
                        title: section.title.clone(),
                        status: SectionStatus::Error,
                        tables: Vec::new(),
                        error: Some(e.to_string()),
                    }
                }
            };
            sections.push(view);
        }

        info!(
            page = %self.id,
            scope = filter.scope_label(),
            sections = sections.len(),
            "page rendered"
        );
        PageView {
            page: self.id.clone(),
            title: self.title.clone(),
            scope: filter.scope_label().to_string(),
            sections,
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct Dashboard {
    pages: Vec<Page>,
}

impl Dashboard {
    pub fn new(pages: Vec<Page>) -> Self {
        Self { pages }
    }

    pub fn pages(&self) -> &[Page] {
        &self.pages
    }

    pub fn page(&self, id: &str) -> Option<&Page> {
        self.pages.iter().find(|p| p.id == id)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NamedTable {
    pub name: String,
    #[serde(flatten)]
    pub table: Table,
}

impl NamedTable {
    pub fn new(name: &str, table: Table) -> Self {
        Self {
            name: name.to_string(),
            table,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum SectionStatus {
    Ok,
    Empty,
    Error,
}

#[derive(Debug, Clone, Serialize)]
pub struct SectionView {
    pub id: String,
    pub title: String,
    pub status: SectionStatus,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub tables: Vec<NamedTable>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl SectionView {
    pub fn table(&self, name: &str) -> Option<&Table> {
        self.tables.iter().find(|t| t.name == name).map(|t| &t.table)
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct PageView {
    pub page: String,
    pub title: String,
    pub scope: String,
    pub sections: Vec<SectionView>,
}

impl PageView {
    pub fn section(&self, id: &str) -> Option<&SectionView> {
        self.sections.iter().find(|s| s.id == id)
    }
}
