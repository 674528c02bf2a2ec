use thiserror::Error;

/// An aggregate query could not be built or executed. Never retried.
#[derive(Error, Debug)]
pub enum QueryError {
    #[error("Invalid identifier: {0}")]
    InvalidIdentifier(String),

    #[error("Column {column} is not declared on {table}")]
    UnknownColumn { table: String, column: String },

    #[error("Table not found: {0}")]
    UnknownTable(String),

    #[error("Warehouse error: {0}")]
    Warehouse(#[from] sqlx::Error),
}

/// A reshape step met a table that does not have the expected shape.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ShapeError {
    #[error("Missing column: {0}")]
    MissingColumn(String),

    #[error("Column {column} does not match period pattern {expected}")]
    PeriodPattern { column: String, expected: String },

    #[error("Schema mismatch: expected {expected:?}, found {found:?}")]
    SchemaMismatch {
        expected: Vec<String>,
        found: Vec<String>,
    },

    #[error("Column {column} holds a non-numeric value")]
    NotNumeric { column: String },
}

/// The region catalog could not be built. Fail-closed: no partial list.
#[derive(Error, Debug)]
#[error("Region catalog unavailable ({table}): {source}")]
pub struct ResolutionError {
    pub table: String,
    #[source]
    pub source: QueryError,
}

/// Failure of one dashboard section. Other sections are unaffected.
#[derive(Error, Debug)]
pub enum SectionError {
    #[error(transparent)]
    Query(#[from] QueryError),

    #[error(transparent)]
    Shape(#[from] ShapeError),
}

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("{0} env var missing")]
    Missing(&'static str),

    #[error("{name} has an invalid value: {value}")]
    Invalid { name: &'static str, value: String },
}
