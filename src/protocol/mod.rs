//! Wire protocol shared by the HTTP endpoints and the replication client.
//!
//! Schema mutations travel as query parameters, data mutations as JSON
//! bodies. The structs here are the exact shapes on the wire; [`Mutation`]
//! is the in-process form both sides convert to.

use serde::{Deserialize, Serialize};

/// Mutation kinds and their wire encoding
mod mutation;

pub use mutation::{MissingFields, Mutation, MutationKind, Wire};

/// Body returned by `/ping`
pub const PONG: &str = "pong";

/// Header carrying the id of a forwarded mutation, for log correlation
pub const MUTATION_ID_HEADER: &str = "x-rhizome-mutation-id";

/// Query parameters of the database-level endpoints
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct NameParams {
    /// Database name
    #[serde(default)]
    pub name: String,
}

/// Query parameters of the table-level endpoints
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TableParams {
    /// Database name
    #[serde(default)]
    pub dbname: String,
    /// Table name
    #[serde(default)]
    pub table: String,
    /// Column definitions (create-table only)
    #[serde(default)]
    pub schema: String,
}

/// Body of `/insert` and `/replicate/insert`
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct InsertBody {
    /// Database name
    #[serde(default)]
    pub dbname: String,
    /// Table name
    #[serde(default)]
    pub table: String,
    /// Value list
    #[serde(default)]
    pub values: String,
}

/// Body of `/update` and `/replicate/update`
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct UpdateBody {
    /// Database name
    #[serde(default)]
    pub dbname: String,
    /// Table name
    #[serde(default)]
    pub table: String,
    /// SET clause
    #[serde(default)]
    pub set: String,
    /// WHERE clause
    #[serde(default, rename = "where")]
    pub filter: String,
}

/// Body of `/delete` and `/replicate/delete`
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DeleteBody {
    /// Database name
    #[serde(default)]
    pub dbname: String,
    /// Table name
    #[serde(default)]
    pub table: String,
    /// WHERE clause
    #[serde(default, rename = "where")]
    pub filter: String,
}

impl From<InsertBody> for Mutation {
    fn from(body: InsertBody) -> Self {
        Mutation::Insert { dbname: body.dbname, table: body.table, values: body.values }
    }
}

impl From<UpdateBody> for Mutation {
    fn from(body: UpdateBody) -> Self {
        Mutation::Update {
            dbname: body.dbname,
            table: body.table,
            set: body.set,
            filter: body.filter,
        }
    }
}

impl From<DeleteBody> for Mutation {
    fn from(body: DeleteBody) -> Self {
        Mutation::Delete { dbname: body.dbname, table: body.table, filter: body.filter }
    }
}

/// Body returned by `/is-master`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct IsMasterResponse {
    /// Whether the answering node believes itself primary
    #[serde(rename = "isMaster")]
    pub is_master: bool,
}

/// Body returned by every successful mutation endpoint
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MutationResponse {
    /// Human-readable outcome
    pub message: String,
    /// Target database, for schema operations
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub dbname: Option<String>,
    /// Target table, for create-table
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub table: Option<String>,
    /// Rows touched, for data operations
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub rows_affected: Option<u64>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_body_fields_default_to_empty() {
        let body: UpdateBody = serde_json::from_str(r#"{"dbname":"shop","set":"a = 1"}"#).unwrap();
        let mutation = Mutation::from(body);
        assert!(mutation.validate().is_err());
    }

    #[test]
    fn test_response_shapes() {
        let resp = MutationResponse {
            message: "Record inserted successfully".into(),
            dbname: None,
            table: None,
            rows_affected: Some(1),
        };
        assert_eq!(
            serde_json::to_value(&resp).unwrap(),
            serde_json::json!({"message": "Record inserted successfully", "rowsAffected": 1})
        );

        let resp = IsMasterResponse { is_master: true };
        assert_eq!(serde_json::to_string(&resp).unwrap(), r#"{"isMaster":true}"#);
    }
}
