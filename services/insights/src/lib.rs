//! Parameterized aggregate reporting over the tourism and culture funding
//! warehouse: region catalog, query builder, unit normalization, result
//! combining and reshaping, and the dashboard pages built from them.

pub mod catalog;
pub mod combine;
pub mod config;
pub mod dashboard;
pub mod dataset;
pub mod error;
pub mod query;
pub mod region;
pub mod reshape;
pub mod table;
pub mod telemetry;
pub mod tourism;
pub mod units;
pub mod warehouse;

pub use config::Settings;
pub use dashboard::{Dashboard, Page, PageView, SectionStatus, SectionView};
pub use error::{ConfigError, QueryError, ResolutionError, SectionError, ShapeError};
pub use region::{Filter, Region};
pub use table::{Table, Value};
pub use warehouse::{MemoryWarehouse, PgWarehouse, Warehouse};
