use std::sync::Arc;

use crate::protocol::Mutation;
use super::statement::{self, Identifier, StatementKind};
use super::{Database, GuardMode, Result, Row, StatementGuard};

/// Applies protocol mutations and read queries against a [`Database`].
///
/// Callers are expected to have run [`Mutation::validate`] first; blank names
/// are still refused here as invalid identifiers.
#[derive(Debug, Clone)]
pub struct Executor {
    db: Arc<dyn Database>,
    guard: StatementGuard,
}

impl Executor {
    /// Create an executor over `db`
    pub fn new(db: Arc<dyn Database>, mode: GuardMode) -> Self {
        let guard = StatementGuard::new(mode, db.db_type());
        Self { db, guard }
    }

    /// Statement guard mode in effect
    pub fn guard_mode(&self) -> GuardMode {
        self.guard.mode()
    }

    /// Apply a mutation, returning the rows affected
    pub async fn apply(&self, mutation: &Mutation) -> Result<u64> {
        match mutation {
            Mutation::CreateDatabase { name } => {
                let db = Identifier::database(name)?;
                self.db.create_database(db.as_str()).await?;
                Ok(0)
            }
            Mutation::DropDatabase { name } => {
                let db = Identifier::database(name)?;
                self.db.drop_database(db.as_str()).await?;
                Ok(0)
            }
            Mutation::CreateTable { dbname, table, schema } => {
                let (db, table) = Self::target(dbname, table)?;
                let sql = statement::create_table(&db, &table, schema);
                self.run(&db, &sql, StatementKind::CreateTable).await
            }
            Mutation::Insert { dbname, table, values } => {
                let (db, table) = Self::target(dbname, table)?;
                let sql = statement::insert(&db, &table, values);
                self.run(&db, &sql, StatementKind::Insert).await
            }
            Mutation::Update { dbname, table, set, filter } => {
                let (db, table) = Self::target(dbname, table)?;
                let sql = statement::update(&db, &table, set, filter);
                self.run(&db, &sql, StatementKind::Update).await
            }
            Mutation::Delete { dbname, table, filter } => {
                let (db, table) = Self::target(dbname, table)?;
                let sql = statement::delete(&db, &table, filter);
                self.run(&db, &sql, StatementKind::Delete).await
            }
        }
    }

    /// Read every row of `dbname.table`
    pub async fn select(&self, dbname: &str, table: &str) -> Result<Vec<Row>> {
        let (db, table) = Self::target(dbname, table)?;
        self.db.query(db.as_str(), &statement::select_all(&db, &table)).await
    }

    fn target(dbname: &str, table: &str) -> Result<(Identifier, Identifier)> {
        Ok((Identifier::database(dbname)?, Identifier::table(table)?))
    }

    async fn run(&self, db: &Identifier, sql: &str, kind: StatementKind) -> Result<u64> {
        self.guard.check(sql, kind)?;
        tracing::debug!(database = %db, %sql, "executing statement");
        self.db.execute(db.as_str(), sql).await
    }
}
