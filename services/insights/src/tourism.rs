//! The tourism and culture funding datasets published by the Government of
//! India, and the dashboard pages built on them.

use crate::dashboard::{Dashboard, MetricFamily, Page, Section, SectionKind};
use crate::dataset::{ColumnSpec, Dataset, Exclusion};
use crate::query::{AggregateDefinition, Direction};
use crate::region::RegionColumn;
use crate::units::Unit;
use std::sync::Arc;

pub const PRASHAD: &str = "PRASHAD";
pub const FAIRS: &str = "FAIRSANDCARNIVALSBYSTATE";
pub const TRAVEL_PROVIDERS: &str = "TRAVELPROVIDERS";
pub const EXPERIENCES: &str = "SANCTIONEDPROJECTS23TO25";
pub const MOUNTAIN_SPORTS: &str = "MOUNTAINSPORTS";
pub const VISITS: &str = "VISITSBYSTATE";

/// Two-digit years covered by the visitor statistics.
const VISIT_YEARS: [u8; 5] = [19, 20, 21, 22, 23];

/// Top-N cap for ranking sections.
const TOP_N: u32 = 6;

#[derive(Debug, Clone)]
pub struct Datasets {
    pub prashad: Arc<Dataset>,
    pub fairs: Arc<Dataset>,
    pub travel_providers: Arc<Dataset>,
    pub experiences: Arc<Dataset>,
    pub mountain_sports: Arc<Dataset>,
    pub visits: Arc<Dataset>,
}

impl Datasets {
    pub fn standard() -> Self {
        Self {
            prashad: Arc::new(prashad()),
            fairs: Arc::new(fairs()),
            travel_providers: Arc::new(travel_providers()),
            experiences: Arc::new(experiences()),
            mountain_sports: Arc::new(mountain_sports()),
            visits: Arc::new(visits()),
        }
    }

    pub fn all(&self) -> Vec<Arc<Dataset>> {
        vec![
            Arc::clone(&self.prashad),
            Arc::clone(&self.fairs),
            Arc::clone(&self.travel_providers),
            Arc::clone(&self.experiences),
            Arc::clone(&self.mountain_sports),
            Arc::clone(&self.visits),
        ]
    }

    pub fn find(&self, table: &str) -> Option<Arc<Dataset>> {
        self.all()
            .into_iter()
            .find(|d| d.table.eq_ignore_ascii_case(table))
    }
}

fn prashad() -> Dataset {
    Dataset::new(PRASHAD, RegionColumn::new("STATE"))
        .column(ColumnSpec::text("STATE"))
        .column(ColumnSpec::text("PROJECTNAME"))
        .column(ColumnSpec::number("APPROVEDCOST"))
        .column(ColumnSpec::text("SANCTIONYEAR"))
        .exclude(Exclusion::exact("STATE", "Total"))
        .exclude(Exclusion::containing("PROJECTNAME", "total"))
        .exclude(Exclusion::containing("SANCTIONYEAR", "total"))
        .unit(Unit::Crore)
}

fn fairs() -> Dataset {
    Dataset::new(FAIRS, RegionColumn::new("STATE"))
        .column(ColumnSpec::text("STATE"))
        .column(ColumnSpec::text("NAMEOFFAIRS"))
        .column(ColumnSpec::number("AMOUNTRELEASED"))
        .column(ColumnSpec::text("SANCTIONYEAR"))
        .exclude(Exclusion::exact("STATE", "Total"))
        .exclude(Exclusion::containing("NAMEOFFAIRS", "total"))
        .exclude(Exclusion::containing("SANCTIONYEAR", "total"))
        .unit(Unit::Lakh)
}

fn travel_providers() -> Dataset {
    Dataset::new(
        TRAVEL_PROVIDERS,
        RegionColumn::new("STATE").synonym("Uttrakhand", "Uttarakhand"),
    )
    .column(ColumnSpec::text("STATE"))
    .column(ColumnSpec::text("CATEGORY"))
    .column(ColumnSpec::text("ORGANISATION"))
    .exclude(Exclusion::exact("STATE", "State"))
}

fn experiences() -> Dataset {
    Dataset::new(EXPERIENCES, RegionColumn::new("STATE").title_cased())
        .column(ColumnSpec::text("STATE"))
        .column(ColumnSpec::text("DESTINATION"))
        .column(ColumnSpec::text("NAME_OF_EXPERIENCE"))
        .exclude(Exclusion::exact("STATE", "Total"))
}

fn mountain_sports() -> Dataset {
    Dataset::new(MOUNTAIN_SPORTS, RegionColumn::new("STATE").title_cased())
        .column(ColumnSpec::text("STATE"))
        .column(ColumnSpec::text("PEAKNAME"))
        .column(ColumnSpec::number("HEIGHT"))
        .column(ColumnSpec::text("SPORTS"))
        .exclude(Exclusion::exact("STATE", "State"))
}

fn visits() -> Dataset {
    let mut ds = Dataset::new(VISITS, RegionColumn::new("STATE"))
        .column(ColumnSpec::text("STATE"))
        .exclude(Exclusion::containing("STATE", "total"));
    for family in visit_families() {
        for column in &family.columns {
            ds = ds.column(ColumnSpec::number(column));
        }
    }
    ds
}

fn visit_families() -> Vec<MetricFamily> {
    vec![
        MetricFamily::years("domestic", "DTV", VISIT_YEARS),
        MetricFamily::years("foreign", "FTV", VISIT_YEARS),
    ]
}

/// Yearly funding with its project/festival count, tagged by category.
fn funding_by_year(dataset: &Arc<Dataset>, amount: &str, category: &str) -> AggregateDefinition {
    AggregateDefinition::on(dataset)
        .column("SANCTIONYEAR", "SANCTIONYEAR")
        .sum(amount, "AMOUNT_RELEASED_BY_GOV")
        .count("PROJECT_OR_FESTIVAL_COUNT")
        .label("CATEGORY", category)
}

pub fn festivals_page(ds: &Datasets) -> Page {
    let sections = vec![
        Section::new(
            "funding_summary",
            "Combined Yearly Summary (₹ lakh)",
            SectionKind::Combined {
                parts: vec![
                    funding_by_year(&ds.fairs, "AMOUNTRELEASED", "Festival"),
                    funding_by_year(&ds.prashad, "APPROVEDCOST", "Pilgrimage"),
                ],
                period: "SANCTIONYEAR".into(),
                category: "CATEGORY".into(),
                measure: "AMOUNT_RELEASED_BY_GOV".into(),
                base: Unit::Lakh,
            },
        ),
        Section::new(
            "top_festivals",
            "Top 6 Funded Festivals",
            SectionKind::Table(
                AggregateDefinition::on(&ds.fairs)
                    .region("STATE")
                    .column("NAMEOFFAIRS", "NAME")
                    .sum("AMOUNTRELEASED", "AMOUNT")
                    .order_by("AMOUNT", Direction::Desc)
                    .limit(TOP_N),
            ),
        ),
        Section::new(
            "top_pilgrimage_projects",
            "Top 6 Pilgrimage Projects by Approved Cost",
            SectionKind::Table(
                AggregateDefinition::on(&ds.prashad)
                    .column("PROJECTNAME", "NAME")
                    .sum("APPROVEDCOST", "AMOUNT")
                    .order_by("AMOUNT", Direction::Desc)
                    .limit(TOP_N),
            ),
        ),
        Section::new(
            "travel_providers",
            "Travel Providers by State and Category",
            SectionKind::Table(
                AggregateDefinition::on(&ds.travel_providers)
                    .region("STATE")
                    .column("CATEGORY", "CATEGORY")
                    .count_of("ORGANISATION", "NUMBER_OF_ORGANISATIONS")
                    .order_by("NUMBER_OF_ORGANISATIONS", Direction::Desc),
            ),
        ),
        Section::new(
            "travel_provider_directory",
            "Travel Provider Details",
            SectionKind::Table(
                AggregateDefinition::on(&ds.travel_providers)
                    .region("STATE")
                    .column("CATEGORY", "CATEGORY")
                    .column("ORGANISATION", "ORGANISATION")
                    .distinct()
                    .order_by("STATE", Direction::Asc)
                    .order_by("CATEGORY", Direction::Asc)
                    .order_by("ORGANISATION", Direction::Asc),
            ),
        ),
    ];

    Page {
        id: "festivals".into(),
        title: "Festivals and Pilgrimage".into(),
        catalog: vec![
            Arc::clone(&ds.prashad),
            Arc::clone(&ds.fairs),
            Arc::clone(&ds.travel_providers),
        ],
        sections,
    }
}

pub fn adventure_page(ds: &Datasets) -> Page {
    let sections = vec![
        Section::new(
            "experiences",
            "Newly Funded Experiences",
            SectionKind::Counted {
                rows: AggregateDefinition::on(&ds.experiences)
                    .region("STATE")
                    .column("DESTINATION", "DESTINATION")
                    .column("NAME_OF_EXPERIENCE", "NAME_OF_EXPERIENCE"),
                all_groups: vec!["STATE".into()],
                region_groups: vec!["DESTINATION".into()],
                count: "EXPERIENCE_COUNT".into(),
            },
        ),
        Section::new(
            "experience_list",
            "List of Experiences",
            SectionKind::Table(
                AggregateDefinition::on(&ds.experiences)
                    .column("NAME_OF_EXPERIENCE", "NAME_OF_EXPERIENCE")
                    .exclude(Exclusion::missing("NAME_OF_EXPERIENCE"))
                    .distinct()
                    .order_by("NAME_OF_EXPERIENCE", Direction::Asc),
            ),
        )
        .region_only(),
        Section::new(
            "mountain_peaks",
            "Mountain Peaks and Sports",
            SectionKind::Counted {
                rows: AggregateDefinition::on(&ds.mountain_sports)
                    .region("STATE")
                    .column("PEAKNAME", "PEAKNAME")
                    .column("HEIGHT", "HEIGHT")
                    .column("SPORTS", "SPORTS"),
                all_groups: vec!["STATE".into()],
                region_groups: vec!["STATE".into()],
                count: "PEAK_COUNT".into(),
            },
        ),
    ];

    Page {
        id: "adventure".into(),
        title: "Experience & Adventure Sports".into(),
        catalog: vec![Arc::clone(&ds.experiences), Arc::clone(&ds.mountain_sports)],
        sections,
    }
}

pub fn visitors_page(ds: &Datasets) -> Page {
    let families = visit_families();
    let mut rows = AggregateDefinition::on(&ds.visits).region("STATE");
    for family in &families {
        for column in &family.columns {
            rows = rows.column(column, column);
        }
    }

    Page {
        id: "visitors".into(),
        title: "Domestic and Foreign Visits".into(),
        catalog: vec![Arc::clone(&ds.visits)],
        sections: vec![Section::new(
            "visitor_trends",
            "Visitor Trends by Year",
            SectionKind::Trend {
                rows,
                id: "STATE".into(),
                families,
                period: "YEAR".into(),
                value: "VISITS".into(),
            },
        )],
    }
}

pub fn dashboard(ds: &Datasets) -> Dashboard {
    Dashboard::new(vec![
        festivals_page(ds),
        adventure_page(ds),
        visitors_page(ds),
    ])
}
