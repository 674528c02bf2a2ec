use crate::config::Settings;
use crate::error::QueryError;
use crate::query::AggregateQuery;
use crate::table::{Table, Value};
use crate::warehouse::Warehouse;
use sqlx::postgres::{PgPoolOptions, PgRow};
use sqlx::{Column, PgPool, Row, TypeInfo};
use tracing::debug;

#[derive(Debug, Clone)]
pub struct PgWarehouse {
    pool: PgPool,
}

impl PgWarehouse {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub async fn connect(settings: &Settings) -> Result<Self, QueryError> {
        let pool = PgPoolOptions::new()
            .max_connections(settings.db_max_connections)
            .connect(&settings.db_url)
            .await?;
        Ok(Self { pool })
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }
}

impl Warehouse for PgWarehouse {
    async fn fetch(&self, query: &AggregateQuery) -> Result<Table, QueryError> {
        let mut qb = query.to_sql();
        debug!(table = %query.table, sql = qb.sql(), "executing aggregate query");

        let rows = qb.build().fetch_all(&self.pool).await?;

        let mut table = Table::new(query.columns());
        for row in &rows {
            table.push(decode_row(row)?);
        }
        Ok(table)
    }
}

/// Measures are cast to DOUBLE PRECISION / BIGINT and dimensions to TEXT or
/// DOUBLE PRECISION when rendered, so only a handful of types show up here.
fn decode_row(row: &PgRow) -> Result<Vec<Value>, sqlx::Error> {
    row.columns()
        .iter()
        .map(|col| {
            let idx = col.ordinal();
            let value = match col.type_info().name() {
                "TEXT" | "VARCHAR" | "BPCHAR" | "NAME" => {
                    row.try_get::<Option<String>, _>(idx)?.map(Value::Text)
                }
                "INT2" => row
                    .try_get::<Option<i16>, _>(idx)?
                    .map(|v| Value::Int(v.into())),
                "INT4" => row
                    .try_get::<Option<i32>, _>(idx)?
                    .map(|v| Value::Int(v.into())),
                "INT8" => row.try_get::<Option<i64>, _>(idx)?.map(Value::Int),
                "FLOAT4" => row
                    .try_get::<Option<f32>, _>(idx)?
                    .map(|v| Value::Float(v.into())),
                "FLOAT8" => row.try_get::<Option<f64>, _>(idx)?.map(Value::Float),
                other => {
                    return Err(sqlx::Error::Decode(
                        format!("unsupported column type {other} for {}", col.name()).into(),
                    ))
                }
            };
            Ok(value.unwrap_or(Value::Null))
        })
        .collect()
}
