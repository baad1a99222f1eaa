use async_trait::async_trait;
use bb8_postgres::bb8::Pool;
use bb8_postgres::PostgresConnectionManager;
use tokio_postgres::{Config, NoTls};

use super::{Database, DatabaseConfig, DatabaseType, Error, Result, Row, Value};

/// PostgreSQL database implementation.
///
/// A logical database is a schema inside the configured server database, so
/// `shop.items` resolves to table `items` in schema `shop`.
#[derive(Debug)]
pub struct PostgresDatabase {
    pool: Pool<PostgresConnectionManager<NoTls>>,
}

impl PostgresDatabase {
    /// Builds the connection pool and checks that the server answers
    pub async fn connect(config: &DatabaseConfig) -> Result<Self> {
        let mut pg_config = Config::new();
        pg_config.host(config.host.as_deref().unwrap_or("localhost"));
        pg_config.port(config.port.unwrap_or(5432));
        pg_config.user(config.user.as_deref().unwrap_or("postgres"));
        pg_config.password(config.password.as_deref().unwrap_or(""));
        pg_config.dbname(&config.database);
        pg_config.connect_timeout(config.connect_timeout);

        let manager = PostgresConnectionManager::new(pg_config, NoTls);
        let pool = Pool::builder()
            .max_size(config.max_connections)
            .connection_timeout(config.connect_timeout)
            .build(manager)
            .await
            .map_err(|e| Error::Connection(e.to_string()))?;

        let db = Self { pool };
        db.ping().await?;
        Ok(db)
    }

    async fn batch(&self, sql: &str) -> Result<()> {
        let client = self.pool.get().await
            .map_err(|e| Error::Connection(e.to_string()))?;

        client.batch_execute(sql)
            .await
            .map_err(|e| Error::Query(e.to_string()))
    }
}

fn column_value(row: &tokio_postgres::Row, i: usize) -> Value {
    let ty = row.columns()[i].type_().name();
    let value = match ty {
        "int2" => row.try_get::<_, Option<i16>>(i).map(|v| v.map(|v| Value::Int(v.into()))),
        "int4" => row.try_get::<_, Option<i32>>(i).map(|v| v.map(|v| Value::Int(v.into()))),
        "int8" => row.try_get::<_, Option<i64>>(i).map(|v| v.map(Value::Int)),
        "float4" => row.try_get::<_, Option<f32>>(i).map(|v| v.map(|v| Value::Float(v.into()))),
        "float8" => row.try_get::<_, Option<f64>>(i).map(|v| v.map(Value::Float)),
        "bool" => row.try_get::<_, Option<bool>>(i).map(|v| v.map(Value::Bool)),
        "bytea" => row.try_get::<_, Option<Vec<u8>>>(i).map(|v| v.map(Value::Bytes)),
        _ => row.try_get::<_, Option<String>>(i).map(|v| v.map(Value::Text)),
    };

    // Types without a text decoding (numeric, timestamps) come back as null.
    match value {
        Ok(Some(v)) => v,
        Ok(None) => Value::Null,
        Err(e) => {
            tracing::debug!(column = i, %ty, error = %e, "undecodable column value");
            Value::Null
        }
    }
}

#[async_trait]
impl Database for PostgresDatabase {
    fn db_type(&self) -> DatabaseType {
        DatabaseType::PostgreSQL
    }

    async fn ping(&self) -> Result<()> {
        let client = self.pool.get().await
            .map_err(|e| Error::Connection(e.to_string()))?;

        client.execute("SELECT 1", &[])
            .await
            .map(|_| ())
            .map_err(|e| Error::Connection(e.to_string()))
    }

    async fn create_database(&self, name: &str) -> Result<()> {
        self.batch(&format!("CREATE SCHEMA IF NOT EXISTS {}", name)).await
    }

    async fn drop_database(&self, name: &str) -> Result<()> {
        self.batch(&format!("DROP SCHEMA IF EXISTS {} CASCADE", name)).await
    }

    async fn execute(&self, _database: &str, sql: &str) -> Result<u64> {
        let client = self.pool.get().await
            .map_err(|e| Error::Connection(e.to_string()))?;

        client.execute(sql, &[])
            .await
            .map_err(|e| Error::Query(e.to_string()))
    }

    async fn query(&self, _database: &str, sql: &str) -> Result<Vec<Row>> {
        let client = self.pool.get().await
            .map_err(|e| Error::Connection(e.to_string()))?;

        let rows = client.query(sql, &[])
            .await
            .map_err(|e| Error::Query(e.to_string()))?;

        let mut result = Vec::with_capacity(rows.len());
        for row in rows {
            let columns: Vec<String> = row.columns()
                .iter()
                .map(|col| col.name().to_string())
                .collect();

            let values = (0..columns.len()).map(|i| column_value(&row, i)).collect();
            result.push(Row::new(columns, values));
        }

        Ok(result)
    }
}
