//! Relational engine adapters.
//!
//! The replication layer only needs two capabilities from an engine: execute a
//! mutating statement and run a read query. [`Database`] captures those plus
//! the engine-specific notion of a "database" namespace, and [`Executor`]
//! turns protocol mutations into guarded statements on top of it.

use std::fmt::{self, Debug};
use std::str::FromStr;
use async_trait::async_trait;
use serde::ser::{Serialize, SerializeMap, Serializer};
use std::sync::Arc;

/// Engine errors
pub mod error;
/// Backend configuration
pub mod config;
/// Mutation execution over a [`Database`]
pub mod executor;
/// SQLite backend
pub mod sqlite;
/// PostgreSQL backend
#[cfg(feature = "postgres")]
pub mod postgres;
/// Statement assembly and validation
pub mod statement;

pub use error::{Error, Result};
pub use config::DatabaseConfig;
pub use executor::Executor;
pub use statement::{GuardMode, Identifier, StatementGuard};

/// Database driver type
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DatabaseType {
    /// SQLite database
    #[default]
    SQLite,
    /// PostgreSQL database
    PostgreSQL,
}

impl FromStr for DatabaseType {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "sqlite" => Ok(DatabaseType::SQLite),
            "postgres" | "postgresql" => Ok(DatabaseType::PostgreSQL),
            other => Err(Error::Config(format!("unknown backend: {}", other))),
        }
    }
}

impl fmt::Display for DatabaseType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DatabaseType::SQLite => write!(f, "sqlite"),
            DatabaseType::PostgreSQL => write!(f, "postgres"),
        }
    }
}

/// Engine capability consumed by the replication layer.
///
/// Every `database` argument has already been validated as an identifier
/// and is lowercase. Statements address tables as `database.table`.
#[async_trait]
pub trait Database: Send + Sync + Debug {
    /// Engine flavour, used to pick the statement dialect
    fn db_type(&self) -> DatabaseType;

    /// Pings the database to check connectivity
    async fn ping(&self) -> Result<()>;

    /// Creates the named database if it does not exist yet
    async fn create_database(&self, name: &str) -> Result<()>;

    /// Drops the named database if it exists
    async fn drop_database(&self, name: &str) -> Result<()>;

    /// Executes a statement against `database` that returns no rows, reporting rows affected
    async fn execute(&self, database: &str, sql: &str) -> Result<u64>;

    /// Executes a query against `database` that returns rows
    async fn query(&self, database: &str, sql: &str) -> Result<Vec<Row>>;
}

/// Row represents a database row
#[derive(Debug, Clone, PartialEq)]
pub struct Row {
    columns: Vec<String>,
    values: Vec<Value>,
}

impl Row {
    /// Creates a row from parallel column and value lists
    pub fn new(columns: Vec<String>, values: Vec<Value>) -> Self {
        Self { columns, values }
    }

    /// Gets a column value by name
    pub fn get(&self, column: &str) -> Option<&Value> {
        self.columns
            .iter()
            .position(|c| c == column)
            .map(|idx| &self.values[idx])
    }

    /// Column names in result order
    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    /// Number of columns
    pub fn len(&self) -> usize {
        self.columns.len()
    }

    /// Whether the row has no columns
    pub fn is_empty(&self) -> bool {
        self.columns.is_empty()
    }
}

impl Serialize for Row {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.columns.len()))?;
        for (column, value) in self.columns.iter().zip(&self.values) {
            map.serialize_entry(column, value)?;
        }
        map.end()
    }
}

/// Value represents a database value
#[derive(Debug, Clone, PartialEq, serde::Serialize)]
#[serde(untagged)]
pub enum Value {
    /// SQL NULL
    Null,
    /// Boolean
    Bool(bool),
    /// Any integer column
    Int(i64),
    /// Any floating point column
    Float(f64),
    /// Text
    Text(String),
    /// Blob, serialized as a byte array
    Bytes(Vec<u8>),
}

/// Opens the engine described by `config`
pub async fn connect(config: &DatabaseConfig) -> Result<Arc<dyn Database>> {
    config.validate()?;

    match config.db_type {
        DatabaseType::SQLite => {
            let db = sqlite::SQLiteDatabase::open(config)?;
            Ok(Arc::new(db))
        }
        #[cfg(feature = "postgres")]
        DatabaseType::PostgreSQL => {
            let db = postgres::PostgresDatabase::connect(config).await?;
            Ok(Arc::new(db))
        }
        #[cfg(not(feature = "postgres"))]
        DatabaseType::PostgreSQL => Err(Error::Config(
            "built without the `postgres` feature".into(),
        )),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_backend_parsing() {
        assert_eq!("sqlite".parse::<DatabaseType>().unwrap(), DatabaseType::SQLite);
        assert_eq!("PostgreSQL".parse::<DatabaseType>().unwrap(), DatabaseType::PostgreSQL);
        assert!("mysql".parse::<DatabaseType>().is_err());
    }

    #[test]
    fn test_row_serializes_as_object() {
        let row = Row::new(
            vec!["id".into(), "name".into(), "score".into(), "note".into()],
            vec![Value::Int(1), Value::Text("a".into()), Value::Float(2.5), Value::Null],
        );
        let json = serde_json::to_value(&row).unwrap();
        assert_eq!(json, serde_json::json!({"id": 1, "name": "a", "score": 2.5, "note": null}));
        assert_eq!(row.get("name"), Some(&Value::Text("a".into())));
        assert_eq!(row.get("missing"), None);
    }

    #[tokio::test]
    async fn test_connect_in_memory() {
        let db = connect(&DatabaseConfig::in_memory()).await.unwrap();
        assert_eq!(db.db_type(), DatabaseType::SQLite);
        db.ping().await.unwrap();
    }
}
