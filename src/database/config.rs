use std::path::PathBuf;
use std::time::Duration;
use super::DatabaseType;

/// Database configuration
#[derive(Debug, Clone)]
pub struct DatabaseConfig {
    /// Database type (SQLite or PostgreSQL)
    pub db_type: DatabaseType,

    /// Directory holding one SQLite file per logical database (SQLite only).
    ///
    /// When `None`, every logical database is an in-memory attachment and is
    /// lost on restart.
    pub data_dir: Option<PathBuf>,

    /// Database host (PostgreSQL only)
    pub host: Option<String>,

    /// Database port (PostgreSQL only)
    pub port: Option<u16>,

    /// Database user (PostgreSQL only)
    pub user: Option<String>,

    /// Database password (PostgreSQL only)
    pub password: Option<String>,

    /// Database to connect to (PostgreSQL only); logical databases are schemas inside it
    pub database: String,

    /// Maximum number of connections in the pool
    pub max_connections: u32,

    /// Connection timeout
    pub connect_timeout: Duration,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            db_type: DatabaseType::default(),
            data_dir: None,
            host: None,
            port: None,
            user: None,
            password: None,
            database: String::from("rhizome"),
            max_connections: 10,
            connect_timeout: Duration::from_secs(10),
        }
    }
}

impl DatabaseConfig {
    /// Creates a SQLite configuration storing databases under `dir`
    pub fn new_sqlite(dir: impl Into<PathBuf>) -> Self {
        Self {
            db_type: DatabaseType::SQLite,
            data_dir: Some(dir.into()),
            ..Default::default()
        }
    }

    /// Creates a SQLite configuration with in-memory databases
    pub fn in_memory() -> Self {
        Self {
            db_type: DatabaseType::SQLite,
            data_dir: None,
            ..Default::default()
        }
    }

    /// Creates a new PostgreSQL configuration
    pub fn new_postgres(
        host: impl Into<String>,
        port: u16,
        user: impl Into<String>,
        password: impl Into<String>,
        database: impl Into<String>,
    ) -> Self {
        Self {
            db_type: DatabaseType::PostgreSQL,
            host: Some(host.into()),
            port: Some(port),
            user: Some(user.into()),
            password: Some(password.into()),
            database: database.into(),
            ..Default::default()
        }
    }

    /// Validates the configuration
    pub fn validate(&self) -> super::Result<()> {
        match self.db_type {
            DatabaseType::SQLite => {
                if let Some(dir) = &self.data_dir {
                    if dir.exists() && !dir.is_dir() {
                        return Err(super::Error::Config(format!(
                            "data dir {} is not a directory",
                            dir.display()
                        )));
                    }
                }
            }
            DatabaseType::PostgreSQL => {
                if self.host.is_none() {
                    return Err(super::Error::Config("PostgreSQL host is required".into()));
                }
                if self.user.is_none() {
                    return Err(super::Error::Config("PostgreSQL user is required".into()));
                }
                if self.database.is_empty() {
                    return Err(super::Error::Config("PostgreSQL database is required".into()));
                }
            }
        }
        if self.max_connections == 0 {
            return Err(super::Error::Config("max_connections must be positive".into()));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sqlite_config_validation() {
        assert!(DatabaseConfig::in_memory().validate().is_ok());

        let file = tempfile::NamedTempFile::new().unwrap();
        let config = DatabaseConfig::new_sqlite(file.path());
        assert!(matches!(config.validate(), Err(super::super::Error::Config(_))));
    }

    #[test]
    fn test_postgres_config_validation() {
        let config = DatabaseConfig::new_postgres("localhost", 5432, "postgres", "", "rhizome");
        assert!(config.validate().is_ok());

        let config = DatabaseConfig {
            db_type: DatabaseType::PostgreSQL,
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }
}
