use std::path::PathBuf;

use serde::Deserialize;

use crate::shared::{PgConnectionConfig, ValidationError};

/// Where a row source reads its rows from.
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum SourceConfig {
    Postgres(PostgresSourceConfig),
    File(FileSourceConfig),
}

impl SourceConfig {
    pub fn validate(&self) -> Result<(), ValidationError> {
        match self {
            SourceConfig::Postgres(config) => config.validate(),
            SourceConfig::File(config) => config.validate(),
        }
    }
}

/// A query executed against Postgres on every iteration of the source.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct PostgresSourceConfig {
    pub connection: PgConnectionConfig,
    pub query: QueryConfig,
}

impl PostgresSourceConfig {
    pub fn validate(&self) -> Result<(), ValidationError> {
        self.connection.validate()?;
        self.query.validate()
    }
}

/// Query text, either written out or generated from a table description.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QueryConfig {
    /// Raw SQL, executed as is.
    Sql(String),
    /// A `select .. from .. [where ..] [group by ..]` built from its parts.
    Table(TableQueryConfig),
}

impl QueryConfig {
    pub fn validate(&self) -> Result<(), ValidationError> {
        match self {
            QueryConfig::Sql(sql) if sql.trim().is_empty() => {
                Err(ValidationError::InvalidFieldValue {
                    field: "query.sql".to_string(),
                    constraint: "must not be empty".to_string(),
                })
            }
            QueryConfig::Sql(_) => Ok(()),
            QueryConfig::Table(table) => table.validate(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct TableQueryConfig {
    /// Table name, optionally schema qualified (`schema.table`).
    pub name: String,
    /// Selected expressions. Plain identifiers are quoted, anything else is passed through.
    pub columns: Vec<String>,
    /// Optional filter appended as a `where` clause.
    #[serde(default)]
    pub filter: Option<String>,
    #[serde(default)]
    pub group_by: Vec<String>,
}

impl TableQueryConfig {
    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.name.is_empty() {
            return Err(ValidationError::InvalidFieldValue {
                field: "query.table.name".to_string(),
                constraint: "must not be empty".to_string(),
            });
        }

        if self.columns.is_empty() {
            return Err(ValidationError::InvalidFieldValue {
                field: "query.table.columns".to_string(),
                constraint: "must list at least one column".to_string(),
            });
        }

        Ok(())
    }
}

/// A delimited text file with a header line.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct FileSourceConfig {
    pub path: PathBuf,
    /// Number of records read per chunk.
    #[serde(default = "default_chunk_size")]
    pub chunk_size: usize,
    /// Single byte field delimiter.
    #[serde(default = "default_delimiter")]
    pub delimiter: String,
    /// Columns to keep. All columns are kept when omitted.
    #[serde(default)]
    pub columns: Option<Vec<String>>,
    /// Columns whose values are never parsed as numbers or booleans.
    #[serde(default)]
    pub text_columns: Vec<String>,
}

impl FileSourceConfig {
    pub const DEFAULT_CHUNK_SIZE: usize = 10_000;

    pub const DEFAULT_DELIMITER: u8 = b',';

    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.chunk_size == 0 {
            return Err(ValidationError::InvalidFieldValue {
                field: "chunk_size".to_string(),
                constraint: "must be greater than 0".to_string(),
            });
        }

        self.delimiter_byte().map(|_| ())
    }

    /// Returns the delimiter as a single byte.
    pub fn delimiter_byte(&self) -> Result<u8, ValidationError> {
        match self.delimiter.as_bytes() {
            [byte] => Ok(*byte),
            _ => Err(ValidationError::InvalidFieldValue {
                field: "delimiter".to_string(),
                constraint: "must be a single ASCII character".to_string(),
            }),
        }
    }
}

fn default_chunk_size() -> usize {
    FileSourceConfig::DEFAULT_CHUNK_SIZE
}

fn default_delimiter() -> String {
    char::from(FileSourceConfig::DEFAULT_DELIMITER).to_string()
}
