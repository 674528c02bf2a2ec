//! Access to the data warehouse. The handle is created once per process and
//! passed explicitly to everything that queries.

mod memory;
mod postgres;

pub use memory::MemoryWarehouse;
pub use postgres::PgWarehouse;

use crate::error::QueryError;
use crate::query::AggregateQuery;
use crate::table::Table;
use std::future::Future;

pub trait Warehouse: Send + Sync {
    /// Run one query. Failures are returned as-is; there is no retry.
    fn fetch(
        &self,
        query: &AggregateQuery,
    ) -> impl Future<Output = Result<Table, QueryError>> + Send;
}
