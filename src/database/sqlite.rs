use std::path::{Path, PathBuf};
use std::sync::Arc;
use async_trait::async_trait;
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use rusqlite::types::ValueRef;
use rusqlite::Connection;
use tokio::sync::Mutex;

use super::{Database, DatabaseConfig, DatabaseType, Error, Result, Row, Value};

/// SQLite database implementation.
///
/// Each logical database gets its own connection with a single attachment
/// named after it: a `<name>.db` file under the data directory, or an
/// in-memory database when no directory is configured. Statements address
/// tables as `name.table`. One connection per database keeps SQLite's limit
/// on attachments per connection out of the way.
#[derive(Debug)]
pub struct SQLiteDatabase {
    databases: DashMap<String, Arc<Mutex<Connection>>>,
    data_dir: Option<PathBuf>,
}

impl SQLiteDatabase {
    /// Opens the engine and reopens databases left by a previous run
    pub fn open(config: &DatabaseConfig) -> Result<Self> {
        let db = Self {
            databases: DashMap::new(),
            data_dir: config.data_dir.clone(),
        };

        if let Some(dir) = &config.data_dir {
            std::fs::create_dir_all(dir).map_err(|e| {
                Error::Config(format!("cannot create data dir {}: {}", dir.display(), e))
            })?;

            for name in existing_databases(dir)? {
                let conn = db.open_connection(&name)?;
                db.databases.insert(name.clone(), Arc::new(Mutex::new(conn)));
                tracing::info!(database = %name, "reopened database");
            }
        }

        Ok(db)
    }

    fn open_connection(&self, name: &str) -> Result<Connection> {
        let conn = Connection::open_in_memory().map_err(|e| Error::Connection(e.to_string()))?;

        // Enable foreign keys
        conn.execute("PRAGMA foreign_keys = ON", [])
            .map_err(|e| Error::Connection(e.to_string()))?;

        let location = match &self.data_dir {
            Some(dir) => database_file(dir, name),
            None => PathBuf::from(":memory:"),
        };
        let location = location.to_string_lossy();
        conn.execute(&format!("ATTACH DATABASE ?1 AS {}", name), [location.as_ref()])?;
        Ok(conn)
    }

    fn connection(&self, name: &str) -> Result<Arc<Mutex<Connection>>> {
        self.databases
            .get(name)
            .map(|conn| conn.value().clone())
            .ok_or_else(|| Error::Query(format!("no such database: {}", name)))
    }
}

fn database_file(dir: &Path, name: &str) -> PathBuf {
    dir.join(format!("{}.db", name))
}

fn existing_databases(dir: &Path) -> Result<Vec<String>> {
    let entries = std::fs::read_dir(dir)
        .map_err(|e| Error::Config(format!("cannot read data dir {}: {}", dir.display(), e)))?;

    let mut names = Vec::new();
    for entry in entries.flatten() {
        let path = entry.path();
        if path.extension().and_then(|e| e.to_str()) != Some("db") {
            continue;
        }
        let Some(stem) = path.file_stem().and_then(|s| s.to_str()) else {
            continue;
        };
        match super::Identifier::database(stem) {
            Ok(name) if name.as_str() == stem => names.push(stem.to_string()),
            _ => tracing::warn!(file = %path.display(), "ignoring file that is not a database name"),
        }
    }
    names.sort();
    Ok(names)
}

#[async_trait]
impl Database for SQLiteDatabase {
    fn db_type(&self) -> DatabaseType {
        DatabaseType::SQLite
    }

    async fn ping(&self) -> Result<()> {
        let conn = Connection::open_in_memory().map_err(|e| Error::Connection(e.to_string()))?;
        conn.query_row("SELECT 1", [], |_| Ok(()))
            .map_err(|e| Error::Connection(e.to_string()))
    }

    async fn create_database(&self, name: &str) -> Result<()> {
        match self.databases.entry(name.to_string()) {
            Entry::Occupied(_) => Ok(()),
            Entry::Vacant(entry) => {
                let conn = self.open_connection(name)?;
                entry.insert(Arc::new(Mutex::new(conn)));
                tracing::debug!(database = %name, "created database");
                Ok(())
            }
        }
    }

    async fn drop_database(&self, name: &str) -> Result<()> {
        if let Some((_, conn)) = self.databases.remove(name) {
            // Waits for statements in flight on this database.
            let conn = conn.lock().await;
            conn.execute(&format!("DETACH DATABASE {}", name), [])?;
        }
        if let Some(dir) = &self.data_dir {
            match std::fs::remove_file(database_file(dir, name)) {
                Ok(()) => {}
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
                Err(e) => return Err(Error::Query(format!("cannot remove database file: {}", e))),
            }
        }
        Ok(())
    }

    async fn execute(&self, database: &str, sql: &str) -> Result<u64> {
        let conn = self.connection(database)?;
        let conn = conn.lock().await;
        conn.execute(sql, [])
            .map(|rows| rows as u64)
            .map_err(|e| Error::Query(e.to_string()))
    }

    async fn query(&self, database: &str, sql: &str) -> Result<Vec<Row>> {
        let conn = self.connection(database)?;
        let conn = conn.lock().await;
        let mut stmt = conn.prepare(sql)
            .map_err(|e| Error::Query(e.to_string()))?;

        let column_names: Vec<String> = stmt.column_names()
            .iter()
            .map(|&name| name.to_string())
            .collect();

        let rows = stmt.query_map([], |row| {
            let mut values = Vec::with_capacity(column_names.len());
            for i in 0..column_names.len() {
                let value = match row.get_ref(i)? {
                    ValueRef::Null => Value::Null,
                    ValueRef::Integer(i) => Value::Int(i),
                    ValueRef::Real(f) => Value::Float(f),
                    ValueRef::Text(s) => Value::Text(String::from_utf8_lossy(s).into_owned()),
                    ValueRef::Blob(b) => Value::Bytes(b.to_vec()),
                };
                values.push(value);
            }
            Ok(Row::new(column_names.clone(), values))
        })
        .map_err(|e| Error::Query(e.to_string()))?;

        let mut result = Vec::new();
        for row in rows {
            result.push(row.map_err(|e| Error::Query(e.to_string()))?);
        }
        Ok(result)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::database::{Executor, GuardMode};
    use crate::protocol::Mutation;
    use tempfile::tempdir;

    #[tokio::test]
    async fn test_sqlite_database() {
        let db = SQLiteDatabase::open(&DatabaseConfig::in_memory()).unwrap();

        db.create_database("shop").await.unwrap();
        db.execute("shop", "CREATE TABLE IF NOT EXISTS shop.items (id INTEGER, name TEXT)")
            .await
            .unwrap();
        assert_eq!(db.execute("shop", "INSERT INTO shop.items VALUES (1,'a')").await.unwrap(), 1);

        let rows = db.query("shop", "SELECT * FROM shop.items").await.unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].get("id"), Some(&Value::Int(1)));
        assert_eq!(rows[0].get("name"), Some(&Value::Text("a".into())));
    }

    #[tokio::test]
    async fn test_create_and_drop_are_idempotent() {
        let db = SQLiteDatabase::open(&DatabaseConfig::in_memory()).unwrap();

        db.create_database("shop").await.unwrap();
        db.execute("shop", "CREATE TABLE shop.items (id INTEGER)").await.unwrap();
        // A second create keeps existing tables.
        db.create_database("shop").await.unwrap();
        assert!(db.query("shop", "SELECT * FROM shop.items").await.unwrap().is_empty());

        db.drop_database("shop").await.unwrap();
        db.drop_database("shop").await.unwrap();

        let err = db.query("shop", "SELECT * FROM shop.items").await.unwrap_err();
        assert!(matches!(err, Error::Query(_)));
    }

    #[tokio::test]
    async fn test_many_databases() {
        let dir = tempdir().unwrap();
        let db = SQLiteDatabase::open(&DatabaseConfig::new_sqlite(dir.path())).unwrap();

        for i in 0..16 {
            db.create_database(&format!("db{}", i)).await.unwrap();
        }
        db.execute("db15", "CREATE TABLE db15.items (id INTEGER)").await.unwrap();
        db.execute("db15", "INSERT INTO db15.items VALUES (15)").await.unwrap();

        let rows = db.query("db15", "SELECT id FROM db15.items").await.unwrap();
        assert_eq!(rows[0].get("id"), Some(&Value::Int(15)));

        // Every one of them comes back after a restart.
        drop(db);
        let db = SQLiteDatabase::open(&DatabaseConfig::new_sqlite(dir.path())).unwrap();
        assert_eq!(db.databases.len(), 16);
        let rows = db.query("db15", "SELECT id FROM db15.items").await.unwrap();
        assert_eq!(rows.len(), 1);
    }

    #[tokio::test]
    async fn test_databases_survive_reopen() {
        let dir = tempdir().unwrap();
        let config = DatabaseConfig::new_sqlite(dir.path());

        {
            let db = SQLiteDatabase::open(&config).unwrap();
            db.create_database("shop").await.unwrap();
            db.execute("shop", "CREATE TABLE shop.items (id INTEGER)").await.unwrap();
            db.execute("shop", "INSERT INTO shop.items VALUES (7)").await.unwrap();
        }
        assert!(dir.path().join("shop.db").exists());

        let db = SQLiteDatabase::open(&config).unwrap();
        let rows = db.query("shop", "SELECT id FROM shop.items").await.unwrap();
        assert_eq!(rows[0].get("id"), Some(&Value::Int(7)));

        db.drop_database("shop").await.unwrap();
        assert!(!dir.path().join("shop.db").exists());
    }

    #[tokio::test]
    async fn test_names_differing_in_case_share_one_file() {
        let dir = tempdir().unwrap();
        let config = DatabaseConfig::new_sqlite(dir.path());
        let db = Arc::new(SQLiteDatabase::open(&config).unwrap());
        let executor = Executor::new(db, GuardMode::On);

        executor.apply(&Mutation::CreateDatabase { name: "Shop".into() }).await.unwrap();
        executor
            .apply(&Mutation::CreateTable {
                dbname: "SHOP".into(),
                table: "items".into(),
                schema: "id INTEGER".into(),
            })
            .await
            .unwrap();
        assert!(executor.select("shop", "items").await.unwrap().is_empty());

        executor.apply(&Mutation::DropDatabase { name: "shop".into() }).await.unwrap();
        let files: Vec<_> = std::fs::read_dir(dir.path()).unwrap().flatten().collect();
        assert!(files.is_empty(), "left behind: {:?}", files);

        // Nothing comes back after a restart.
        let db = SQLiteDatabase::open(&config).unwrap();
        assert!(db.databases.is_empty());
    }
}
