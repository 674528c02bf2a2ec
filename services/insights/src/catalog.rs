use crate::dataset::Dataset;
use crate::error::ResolutionError;
use crate::query::{build, AggregateDefinition};
use crate::region::{Filter, Region};
use crate::warehouse::Warehouse;
use std::collections::BTreeSet;
use std::sync::Arc;
use tracing::debug;

/// Canonical, deduplicated, sorted regions found across `datasets`.
///
/// Sentinel rows are dropped by each dataset's exclusions, raw values are
/// canonicalized (trim, casing, then synonyms). Any failing dataset fails the
/// whole resolution.
pub async fn resolve_regions<W: Warehouse>(
    warehouse: &W,
    datasets: &[Arc<Dataset>],
) -> Result<Vec<Region>, ResolutionError> {
    let mut regions = BTreeSet::new();

    for dataset in datasets {
        let fail = |source| ResolutionError {
            table: dataset.table.clone(),
            source,
        };
        let def = AggregateDefinition::on(dataset)
            .column(&dataset.region.column, "REGION")
            .distinct();
        let query = build(&def, &Filter::All).map_err(fail)?;
        let table = warehouse.fetch(&query).await.map_err(fail)?;

        let before = regions.len();
        for row in &table.rows {
            let Some(raw) = row.first().and_then(|v| v.as_str()) else {
                continue;
            };
            let canonical = dataset.region.canonicalize(raw);
            if !canonical.is_empty() {
                regions.insert(Region::new(canonical));
            }
        }
        debug!(
            table = %dataset.table,
            distinct = table.len(),
            added = regions.len() - before,
            "resolved regions"
        );
    }

    Ok(regions.into_iter().collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dataset::{ColumnSpec, Exclusion};
    use crate::error::QueryError;
    use crate::region::RegionColumn;
    use crate::table::Table;
    use crate::warehouse::MemoryWarehouse;

    fn providers() -> Arc<Dataset> {
        Arc::new(
            Dataset::new(
                "TRAVELPROVIDERS",
                RegionColumn::new("STATE").synonym("Uttrakhand", "Uttarakhand"),
            )
            .column(ColumnSpec::text("STATE"))
            .exclude(Exclusion::exact("STATE", "State")),
        )
    }

    fn peaks() -> Arc<Dataset> {
        Arc::new(
            Dataset::new("MOUNTAINSPORTS", RegionColumn::new("STATE").title_cased())
                .column(ColumnSpec::text("STATE"))
                .exclude(Exclusion::exact("STATE", "State")),
        )
    }

    fn states(values: &[&str]) -> Table {
        Table::new(["STATE"]).with_rows(values.iter().map(|v| vec![(*v).into()]).collect())
    }

    #[tokio::test]
    async fn synonyms_and_sentinels_never_surface() {
        let warehouse = MemoryWarehouse::new()
            .with_table(
                "TRAVELPROVIDERS",
                states(&["State", "Uttrakhand", "Goa", "Uttarakhand", "Goa"]),
            )
            .with_table("MOUNTAINSPORTS", states(&["State", "SIKKIM", "UTTARAKHAND"]));

        let regions = resolve_regions(&warehouse, &[providers(), peaks()])
            .await
            .expect("regions");
        let names: Vec<&str> = regions.iter().map(Region::as_str).collect();
        assert_eq!(names, vec!["Goa", "Sikkim", "Uttarakhand"]);
    }

    #[tokio::test]
    async fn unreachable_dataset_fails_the_whole_catalog() {
        let warehouse = MemoryWarehouse::new().with_table("TRAVELPROVIDERS", states(&["Goa"]));
        let err = resolve_regions(&warehouse, &[providers(), peaks()])
            .await
            .unwrap_err();
        assert_eq!(err.table, "MOUNTAINSPORTS");
        assert!(matches!(err.source, QueryError::UnknownTable(_)));
    }

    #[tokio::test]
    async fn null_and_blank_regions_are_skipped() {
        let mut table = states(&["  ", "Kerala"]);
        table.push(vec![crate::table::Value::Null]);
        let warehouse = MemoryWarehouse::new().with_table("TRAVELPROVIDERS", table);
        let regions = resolve_regions(&warehouse, &[providers()]).await.expect("regions");
        assert_eq!(regions, vec![Region::new("Kerala")]);
    }
}
