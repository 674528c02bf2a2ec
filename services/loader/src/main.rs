//! Loader - Loads a published CSV into its warehouse table
//!
//! Responsibilities:
//! - Match the CSV header to the dataset's declared columns
//! - Parse numeric columns strictly (halt on the first bad value)
//! - Create the table if missing and insert every row in one transaction

use anyhow::{Context, Result};
use clap::Parser;
use insights::dataset::{ColumnKind, Dataset};
use insights::telemetry::init_tracing;
use insights::tourism::Datasets;
use insights::{Settings, Value};
use sqlx::postgres::PgPoolOptions;
use sqlx::{PgPool, Postgres, QueryBuilder};
use std::path::PathBuf;
use tokio::fs;
use tracing::info;

const MAX_CONNECTIONS: u32 = 5;

/// Rows per INSERT statement.
const CHUNK_SIZE: usize = 500;

#[derive(Parser, Debug)]
#[command(name = "loader", about = "Loads a source CSV into its warehouse table")]
struct Args {
    /// Warehouse table to load, e.g. PRASHAD
    #[arg(long)]
    dataset: String,

    /// CSV file exported from the publishing portal
    #[arg(long)]
    file: PathBuf,

    /// Delete existing rows before inserting
    #[arg(long, default_value = "false")]
    replace: bool,

    /// Dry run - parse and validate only
    #[arg(long, default_value = "false")]
    dry_run: bool,
}

/// Map each declared column to its position in the CSV header.
fn header_positions(headers: &[String], dataset: &Dataset) -> Result<Vec<usize>> {
    for header in headers {
        if dataset.column_spec(header).is_none() {
            anyhow::bail!(
                "AMBIGUITY: Column '{}' is not declared on {}",
                header,
                dataset.table
            );
        }
    }

    let mut positions = Vec::with_capacity(dataset.columns.len());
    for spec in &dataset.columns {
        let matches: Vec<usize> = headers
            .iter()
            .enumerate()
            .filter(|(_, h)| h.eq_ignore_ascii_case(&spec.name))
            .map(|(i, _)| i)
            .collect();
        match matches.as_slice() {
            [i] => positions.push(*i),
            [] => anyhow::bail!("AMBIGUITY: Missing column '{}'", spec.name),
            _ => anyhow::bail!("AMBIGUITY: Column '{}' appears more than once", spec.name),
        }
    }
    Ok(positions)
}

/// Parse a numeric cell. Thousands separators are allowed, blank is NULL.
fn parse_number(raw: &str) -> Result<Option<f64>, std::num::ParseFloatError> {
    let cleaned: String = raw.chars().filter(|c| *c != ',').collect();
    let cleaned = cleaned.trim();
    if cleaned.is_empty() {
        return Ok(None);
    }
    cleaned.parse().map(Some)
}

/// Parse CSV content into rows ordered like the dataset's declared columns.
fn parse_csv(content: &str, dataset: &Dataset) -> Result<Vec<Vec<Value>>> {
    // Remove UTF-8 BOM if present
    let content = content.strip_prefix('\u{feff}').unwrap_or(content);

    let mut reader = csv::ReaderBuilder::new()
        .flexible(false)
        .trim(csv::Trim::All)
        .from_reader(content.as_bytes());

    let headers: Vec<String> = reader
        .headers()
        .context("Failed to read CSV headers")?
        .iter()
        .map(|h| h.to_string())
        .collect();
    let positions = header_positions(&headers, dataset)?;

    let mut rows = Vec::new();
    for (line_idx, result) in reader.records().enumerate() {
        let line_num = line_idx + 2; // +1 for 0-index, +1 for header
        let record = result.with_context(|| format!("Line {line_num}: CSV parse error"))?;

        let mut row = Vec::with_capacity(positions.len());
        for (spec, &pos) in dataset.columns.iter().zip(&positions) {
            let raw = record.get(pos).unwrap_or("");
            let value = match spec.kind {
                ColumnKind::Text if raw.is_empty() => Value::Null,
                ColumnKind::Text => Value::text(raw),
                ColumnKind::Number => match parse_number(raw) {
                    Ok(Some(n)) => Value::Float(n),
                    Ok(None) => Value::Null,
                    Err(e) => anyhow::bail!(
                        "Line {}: Invalid '{}' value '{}': {}",
                        line_num,
                        spec.name,
                        raw,
                        e
                    ),
                },
            };
            row.push(value);
        }
        rows.push(row);
    }

    if rows.is_empty() {
        anyhow::bail!("AMBIGUITY: No rows found in CSV");
    }
    Ok(rows)
}

async fn load(pool: &PgPool, dataset: &Dataset, rows: &[Vec<Value>], replace: bool) -> Result<u64> {
    let mut tx = pool.begin().await.context("Failed to open transaction")?;

    sqlx::query(&dataset.create_table_sql())
        .execute(&mut *tx)
        .await
        .with_context(|| format!("Failed to create table {}", dataset.table))?;

    if replace {
        let deleted = sqlx::query(&format!("DELETE FROM {}", dataset.table))
            .execute(&mut *tx)
            .await
            .context("Failed to clear existing rows")?;
        info!(table = %dataset.table, rows = deleted.rows_affected(), "cleared existing rows");
    }

    let names: Vec<&str> = dataset.columns.iter().map(|c| c.name.as_str()).collect();
    let mut inserted = 0;
    for chunk in rows.chunks(CHUNK_SIZE) {
        let mut qb: QueryBuilder<Postgres> = QueryBuilder::new(format!(
            "INSERT INTO {} ({}) ",
            dataset.table,
            names.join(", ")
        ));
        qb.push_values(chunk, |mut b, row| {
            for (spec, value) in dataset.columns.iter().zip(row) {
                match spec.kind {
                    ColumnKind::Text => {
                        b.push_bind(value.to_text());
                    }
                    ColumnKind::Number => {
                        b.push_bind(value.as_f64());
                    }
                }
            }
        });
        let result = qb
            .build()
            .execute(&mut *tx)
            .await
            .context("Failed to insert rows")?;
        inserted += result.rows_affected();
    }

    tx.commit().await.context("Failed to commit")?;
    Ok(inserted)
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    let args = Args::parse();
    let settings = Settings::from_env().context("Invalid configuration")?;
    init_tracing(settings.log_json);

    let datasets = Datasets::standard();
    let dataset = datasets.find(&args.dataset).with_context(|| {
        let known: Vec<String> = datasets.all().iter().map(|d| d.table.clone()).collect();
        format!("Unknown dataset '{}'. Known: {}", args.dataset, known.join(", "))
    })?;

    info!(
        table = %dataset.table,
        file = %args.file.display(),
        mode = if args.dry_run { "dry-run" } else { "live" },
        "loading dataset"
    );

    let content = fs::read_to_string(&args.file)
        .await
        .with_context(|| format!("Failed to read {}", args.file.display()))?;
    let rows = parse_csv(&content, &dataset)?;
    info!(rows = rows.len(), "parsed csv");

    if args.dry_run {
        info!("dry run - no rows saved to database");
        return Ok(());
    }

    let pool = PgPoolOptions::new()
        .max_connections(MAX_CONNECTIONS)
        .connect(&settings.db_url)
        .await
        .context("Failed to connect to database")?;

    let inserted = load(&pool, &dataset, &rows, args.replace).await?;
    info!(table = %dataset.table, inserted, "load complete");

    Ok(())
}
