//! HTTP request handlers and shared application state.
//!
//! Client mutation endpoints are only served by the primary; anywhere else
//! they redirect to the node believed to be primary. Replication endpoints
//! apply what the primary forwards and never forward again.

use std::sync::Arc;
use axum::body::Bytes;
use axum::extract::rejection::QueryRejection;
use axum::extract::{Query, State};
use axum::http::{HeaderMap, Uri};
use axum::Json;
use serde::de::DeserializeOwned;

use crate::api::errors::ApiError;
use crate::api::models::StatusResponse;
use crate::config::EligibilityPolicy;
use crate::database::{Executor, Row};
use crate::protocol::{
    DeleteBody, InsertBody, IsMasterResponse, Mutation, MutationKind, MutationResponse,
    NameParams, TableParams, UpdateBody, MUTATION_ID_HEADER, PONG,
};
use crate::replication::{MetricsCollector, NodeState, Replicator};

/// Shared application state passed to every handler via Axum's `State` extractor.
#[derive(Debug, Clone)]
pub struct AppState {
    /// Role state
    pub node: NodeState,
    /// Local engine
    pub executor: Executor,
    /// Fan-out to replicas, used while primary
    pub replicator: Replicator,
    /// Replication counters
    pub metrics: Arc<MetricsCollector>,
    /// Promotion policy, reported by the status endpoint
    pub eligibility: EligibilityPolicy,
}

/// Redirect client mutations to the primary when this node is not it.
fn check_primary(state: &AppState, uri: &Uri) -> Result<(), ApiError> {
    if state.node.is_primary() {
        return Ok(());
    }
    let target = uri.path_and_query().map(|pq| pq.as_str()).unwrap_or_else(|| uri.path());
    Err(ApiError::Redirect(format!("{}{}", state.node.primary_address(), target)))
}

fn query_params<T>(params: Result<Query<T>, QueryRejection>) -> Result<T, ApiError> {
    params
        .map(|Query(params)| params)
        .map_err(|e| ApiError::BadRequest(e.body_text()))
}

fn json_body<T: DeserializeOwned>(body: &Bytes) -> Result<T, ApiError> {
    serde_json::from_slice(body).map_err(|_| ApiError::BadRequest("Invalid request body".into()))
}

fn failure_context(kind: MutationKind) -> &'static str {
    match kind {
        MutationKind::CreateDatabase => "Failed to create database",
        MutationKind::DropDatabase => "Failed to drop database",
        MutationKind::CreateTable => "Failed to create table",
        MutationKind::Insert => "Failed to insert record",
        MutationKind::Update => "Failed to update record",
        MutationKind::Delete => "Failed to delete record",
    }
}

fn success_response(mutation: &Mutation, rows_affected: u64, replicated: bool) -> MutationResponse {
    let (message, dbname, table, rows) = match mutation {
        Mutation::CreateDatabase { name } => {
            let message = if replicated {
                "Database replicated successfully"
            } else {
                "Database created successfully"
            };
            (message, Some(name.clone()), None, None)
        }
        Mutation::DropDatabase { name } => {
            ("Database dropped successfully", Some(name.clone()), None, None)
        }
        Mutation::CreateTable { dbname, table, .. } => {
            let message = if replicated {
                "Table replicated successfully"
            } else {
                "Table created successfully"
            };
            (message, Some(dbname.clone()), Some(table.clone()), None)
        }
        Mutation::Insert { .. } => ("Record inserted successfully", None, None, Some(rows_affected)),
        Mutation::Update { .. } => ("Record updated successfully", None, None, Some(rows_affected)),
        Mutation::Delete { .. } => ("Record deleted successfully", None, None, Some(rows_affected)),
    };

    MutationResponse {
        message: message.to_string(),
        dbname,
        table,
        rows_affected: rows,
    }
}

async fn apply(executor: &Executor, mutation: &Mutation) -> Result<u64, ApiError> {
    mutation
        .validate()
        .map_err(|e| ApiError::BadRequest(e.to_string()))?;
    executor
        .apply(mutation)
        .await
        .map_err(|e| ApiError::from_database(failure_context(mutation.kind()), e))
}

/// Applies a client mutation locally, then forwards it to every replica.
async fn apply_and_forward(
    state: &AppState,
    mutation: Mutation,
) -> Result<Json<MutationResponse>, ApiError> {
    let rows = apply(&state.executor, &mutation).await?;
    let response = success_response(&mutation, rows, false);

    let dispatch = state.replicator.forward(mutation);
    tracing::debug!(mutation_id = %dispatch.mutation_id, "mutation applied, forwarding");

    Ok(Json(response))
}

/// Applies a mutation forwarded by the primary.
async fn apply_replicated(
    state: &AppState,
    headers: &HeaderMap,
    mutation: Mutation,
) -> Result<Json<MutationResponse>, ApiError> {
    let mutation_id = headers
        .get(MUTATION_ID_HEADER)
        .and_then(|v| v.to_str().ok())
        .unwrap_or("-");
    tracing::debug!(%mutation_id, kind = %mutation.kind(), "applying replicated mutation");

    let rows = apply(&state.executor, &mutation).await?;
    Ok(Json(success_response(&mutation, rows, true)))
}

fn create_database(params: NameParams) -> Mutation {
    Mutation::CreateDatabase { name: params.name }
}

fn drop_database(params: NameParams) -> Mutation {
    Mutation::DropDatabase { name: params.name }
}

fn create_table(params: TableParams) -> Mutation {
    Mutation::CreateTable {
        dbname: params.dbname,
        table: params.table,
        schema: params.schema,
    }
}

/// `GET /ping`
pub async fn ping() -> &'static str {
    PONG
}

/// `GET /is-master`
pub async fn is_master(State(state): State<AppState>) -> Json<IsMasterResponse> {
    Json(IsMasterResponse {
        is_master: state.node.is_primary(),
    })
}

/// `GET /select?dbname=&table=`
pub async fn select(
    State(state): State<AppState>,
    params: Result<Query<TableParams>, QueryRejection>,
) -> Result<Json<Vec<Row>>, ApiError> {
    let params = query_params(params)?;
    if params.dbname.is_empty() || params.table.is_empty() {
        return Err(ApiError::BadRequest(
            "Both dbname and table parameters are required".into(),
        ));
    }

    let rows = state
        .executor
        .select(&params.dbname, &params.table)
        .await
        .map_err(|e| ApiError::from_database("Failed to query records", e))?;
    Ok(Json(rows))
}

/// `GET /replication/status`
pub async fn replication_status(State(state): State<AppState>) -> Json<StatusResponse> {
    let snapshot = state.node.snapshot();
    Json(StatusResponse {
        role: snapshot.role,
        self_address: state.node.self_address().to_string(),
        primary_address: snapshot.primary,
        election_in_progress: snapshot.election_in_progress,
        eligibility: state.eligibility.to_string(),
        statement_guard: state.executor.guard_mode().to_string(),
        replicas: state.metrics.get_all_replica_metrics(),
        metrics: state.metrics.get_metrics(),
        uptime_secs: state.metrics.uptime(),
    })
}

/// `POST /createdb?name=`
pub async fn client_create_database(
    State(state): State<AppState>,
    uri: Uri,
    params: Result<Query<NameParams>, QueryRejection>,
) -> Result<Json<MutationResponse>, ApiError> {
    check_primary(&state, &uri)?;
    apply_and_forward(&state, create_database(query_params(params)?)).await
}

/// `POST /dropdb?name=`
pub async fn client_drop_database(
    State(state): State<AppState>,
    uri: Uri,
    params: Result<Query<NameParams>, QueryRejection>,
) -> Result<Json<MutationResponse>, ApiError> {
    check_primary(&state, &uri)?;
    apply_and_forward(&state, drop_database(query_params(params)?)).await
}

/// `POST /createtable?dbname=&table=&schema=`
pub async fn client_create_table(
    State(state): State<AppState>,
    uri: Uri,
    params: Result<Query<TableParams>, QueryRejection>,
) -> Result<Json<MutationResponse>, ApiError> {
    check_primary(&state, &uri)?;
    apply_and_forward(&state, create_table(query_params(params)?)).await
}

/// `POST /insert`
pub async fn client_insert(
    State(state): State<AppState>,
    uri: Uri,
    body: Bytes,
) -> Result<Json<MutationResponse>, ApiError> {
    check_primary(&state, &uri)?;
    let body: InsertBody = json_body(&body)?;
    apply_and_forward(&state, body.into()).await
}

/// `POST /update`
pub async fn client_update(
    State(state): State<AppState>,
    uri: Uri,
    body: Bytes,
) -> Result<Json<MutationResponse>, ApiError> {
    check_primary(&state, &uri)?;
    let body: UpdateBody = json_body(&body)?;
    apply_and_forward(&state, body.into()).await
}

/// `POST /delete`
pub async fn client_delete(
    State(state): State<AppState>,
    uri: Uri,
    body: Bytes,
) -> Result<Json<MutationResponse>, ApiError> {
    check_primary(&state, &uri)?;
    let body: DeleteBody = json_body(&body)?;
    apply_and_forward(&state, body.into()).await
}

/// `GET /replicate/db?name=`
pub async fn replicate_database(
    State(state): State<AppState>,
    headers: HeaderMap,
    params: Result<Query<NameParams>, QueryRejection>,
) -> Result<Json<MutationResponse>, ApiError> {
    apply_replicated(&state, &headers, create_database(query_params(params)?)).await
}

/// `GET /replicate/dropdb?name=`
pub async fn replicate_drop_database(
    State(state): State<AppState>,
    headers: HeaderMap,
    params: Result<Query<NameParams>, QueryRejection>,
) -> Result<Json<MutationResponse>, ApiError> {
    apply_replicated(&state, &headers, drop_database(query_params(params)?)).await
}

/// `GET /replicate/table?dbname=&table=&schema=`
pub async fn replicate_table(
    State(state): State<AppState>,
    headers: HeaderMap,
    params: Result<Query<TableParams>, QueryRejection>,
) -> Result<Json<MutationResponse>, ApiError> {
    apply_replicated(&state, &headers, create_table(query_params(params)?)).await
}

/// `POST /replicate/insert`
pub async fn replicate_insert(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Json<MutationResponse>, ApiError> {
    let body: InsertBody = json_body(&body)?;
    apply_replicated(&state, &headers, body.into()).await
}

/// `POST /replicate/update`
pub async fn replicate_update(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Json<MutationResponse>, ApiError> {
    let body: UpdateBody = json_body(&body)?;
    apply_replicated(&state, &headers, body.into()).await
}

/// `POST /replicate/delete`
pub async fn replicate_delete(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Json<MutationResponse>, ApiError> {
    let body: DeleteBody = json_body(&body)?;
    apply_replicated(&state, &headers, body.into()).await
}
