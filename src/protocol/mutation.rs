use serde::{Deserialize, Serialize};
use std::fmt;

/// How a mutation's parameters travel over the wire
#[derive(Debug, Clone, PartialEq)]
pub enum Wire<'a> {
    /// Query-string parameters
    Query(Vec<(&'static str, &'a str)>),
    /// JSON request body
    Body(serde_json::Value),
}

/// Mutation kinds, one per replicated endpoint pair
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MutationKind {
    /// Create a database
    CreateDatabase,
    /// Drop a database
    DropDatabase,
    /// Create a table
    CreateTable,
    /// Insert a row
    Insert,
    /// Update rows
    Update,
    /// Delete rows
    Delete,
}

impl MutationKind {
    /// Path clients use against the primary
    pub fn client_path(&self) -> &'static str {
        match self {
            MutationKind::CreateDatabase => "/createdb",
            MutationKind::DropDatabase => "/dropdb",
            MutationKind::CreateTable => "/createtable",
            MutationKind::Insert => "/insert",
            MutationKind::Update => "/update",
            MutationKind::Delete => "/delete",
        }
    }

    /// Path the primary forwards to on each replica
    pub fn replicate_path(&self) -> &'static str {
        match self {
            MutationKind::CreateDatabase => "/replicate/db",
            MutationKind::DropDatabase => "/replicate/dropdb",
            MutationKind::CreateTable => "/replicate/table",
            MutationKind::Insert => "/replicate/insert",
            MutationKind::Update => "/replicate/update",
            MutationKind::Delete => "/replicate/delete",
        }
    }

    /// Whether parameters are carried as a JSON body rather than a query string
    pub fn has_body(&self) -> bool {
        matches!(self, MutationKind::Insert | MutationKind::Update | MutationKind::Delete)
    }
}

impl fmt::Display for MutationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            MutationKind::CreateDatabase => "create_database",
            MutationKind::DropDatabase => "drop_database",
            MutationKind::CreateTable => "create_table",
            MutationKind::Insert => "insert",
            MutationKind::Update => "update",
            MutationKind::Delete => "delete",
        };
        f.write_str(name)
    }
}

/// A schema or data change, exactly as the client supplied it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum Mutation {
    /// Create a database if absent
    CreateDatabase {
        /// Database name
        name: String,
    },
    /// Drop a database if present
    DropDatabase {
        /// Database name
        name: String,
    },
    /// Create a table if absent
    CreateTable {
        /// Database name
        dbname: String,
        /// Table name
        table: String,
        /// Column definitions, spliced verbatim
        schema: String,
    },
    /// Insert one row
    Insert {
        /// Database name
        dbname: String,
        /// Table name
        table: String,
        /// Value list, spliced verbatim
        values: String,
    },
    /// Update matching rows
    Update {
        /// Database name
        dbname: String,
        /// Table name
        table: String,
        /// SET clause, spliced verbatim
        set: String,
        /// WHERE clause, spliced verbatim
        #[serde(rename = "where")]
        filter: String,
    },
    /// Delete matching rows
    Delete {
        /// Database name
        dbname: String,
        /// Table name
        table: String,
        /// WHERE clause, spliced verbatim
        #[serde(rename = "where")]
        filter: String,
    },
}

/// A mutation with at least one blank required field
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MissingFields(&'static str);

impl fmt::Display for MissingFields {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.0)
    }
}

impl std::error::Error for MissingFields {}

impl Mutation {
    /// The mutation's kind
    pub fn kind(&self) -> MutationKind {
        match self {
            Mutation::CreateDatabase { .. } => MutationKind::CreateDatabase,
            Mutation::DropDatabase { .. } => MutationKind::DropDatabase,
            Mutation::CreateTable { .. } => MutationKind::CreateTable,
            Mutation::Insert { .. } => MutationKind::Insert,
            Mutation::Update { .. } => MutationKind::Update,
            Mutation::Delete { .. } => MutationKind::Delete,
        }
    }

    /// Name of the database the mutation targets
    pub fn database(&self) -> &str {
        match self {
            Mutation::CreateDatabase { name } | Mutation::DropDatabase { name } => name,
            Mutation::CreateTable { dbname, .. }
            | Mutation::Insert { dbname, .. }
            | Mutation::Update { dbname, .. }
            | Mutation::Delete { dbname, .. } => dbname,
        }
    }

    /// Rejects mutations with any empty required field
    pub fn validate(&self) -> Result<(), MissingFields> {
        let complete = match self {
            Mutation::CreateDatabase { name } | Mutation::DropDatabase { name } => !name.is_empty(),
            Mutation::CreateTable { dbname, table, schema } => {
                !dbname.is_empty() && !table.is_empty() && !schema.is_empty()
            }
            Mutation::Insert { dbname, table, values } => {
                !dbname.is_empty() && !table.is_empty() && !values.is_empty()
            }
            Mutation::Update { dbname, table, set, filter } => {
                !dbname.is_empty() && !table.is_empty() && !set.is_empty() && !filter.is_empty()
            }
            Mutation::Delete { dbname, table, filter } => {
                !dbname.is_empty() && !table.is_empty() && !filter.is_empty()
            }
        };
        if complete {
            return Ok(());
        }

        Err(MissingFields(match self.kind() {
            MutationKind::CreateDatabase | MutationKind::DropDatabase => "Database name is required",
            MutationKind::CreateTable => "All parameters (dbname, table, schema) are required",
            MutationKind::Insert => "All fields (dbname, table, values) are required",
            MutationKind::Update => "All fields (dbname, table, set, where) are required",
            MutationKind::Delete => "All fields (dbname, table, where) are required",
        }))
    }

    /// Parameters in the shape the replication endpoint expects
    pub fn wire(&self) -> Wire<'_> {
        match self {
            Mutation::CreateDatabase { name } | Mutation::DropDatabase { name } => {
                Wire::Query(vec![("name", name.as_str())])
            }
            Mutation::CreateTable { dbname, table, schema } => Wire::Query(vec![
                ("dbname", dbname.as_str()),
                ("table", table.as_str()),
                ("schema", schema.as_str()),
            ]),
            Mutation::Insert { dbname, table, values } => Wire::Body(serde_json::json!({
                "dbname": dbname,
                "table": table,
                "values": values,
            })),
            Mutation::Update { dbname, table, set, filter } => Wire::Body(serde_json::json!({
                "dbname": dbname,
                "table": table,
                "set": set,
                "where": filter,
            })),
            Mutation::Delete { dbname, table, filter } => Wire::Body(serde_json::json!({
                "dbname": dbname,
                "table": table,
                "where": filter,
            })),
        }
    }
}
