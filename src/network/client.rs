use std::time::Duration;
use reqwest::{redirect, Client, RequestBuilder, Response};
use uuid::Uuid;

use crate::protocol::{IsMasterResponse, Mutation, MutationResponse, Wire, MUTATION_ID_HEADER};
use super::NetworkError;

type Result<T> = std::result::Result<T, NetworkError>;

/// HTTP client for calls between nodes.
///
/// Cheap to clone; clones share one connection pool.
#[derive(Debug, Clone)]
pub struct ReplicationClient {
    http: Client,
}

impl ReplicationClient {
    /// Creates a client. Redirects are never followed.
    pub fn new() -> Result<Self> {
        let http = Client::builder()
            .redirect(redirect::Policy::none())
            .user_agent(concat!("rhizome/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| NetworkError::Unreachable(format!("failed to build HTTP client: {}", e)))?;
        Ok(Self { http })
    }

    /// `GET {addr}/ping`; any non-2xx answer counts as failure
    pub async fn ping(&self, addr: &str, timeout: Duration) -> Result<()> {
        let request = self.http.get(format!("{}/ping", addr)).timeout(timeout);
        send(request).await.map(|_| ())
    }

    /// `GET {addr}/is-master`
    pub async fn is_master(&self, addr: &str, timeout: Duration) -> Result<bool> {
        let request = self.http.get(format!("{}/is-master", addr)).timeout(timeout);
        let response = send(request).await?;
        let body: IsMasterResponse = response.json().await?;
        Ok(body.is_master)
    }

    /// Sends `mutation` to the replica endpoint on `addr`
    pub async fn forward(
        &self,
        addr: &str,
        mutation: &Mutation,
        id: Uuid,
        timeout: Duration,
    ) -> Result<MutationResponse> {
        let url = format!("{}{}", addr, mutation.kind().replicate_path());
        let request = match mutation.wire() {
            Wire::Query(params) => self.http.get(url).query(&params),
            Wire::Body(body) => self.http.post(url).json(&body),
        };
        let request = request
            .header(MUTATION_ID_HEADER, id.to_string())
            .timeout(timeout);

        let response = send(request).await?;
        Ok(response.json().await?)
    }
}

async fn send(request: RequestBuilder) -> Result<Response> {
    let response = request.send().await?;
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    // Error bodies are `{"error": "..."}`; fall back to raw text.
    let text = response.text().await.unwrap_or_default();
    let message = serde_json::from_str::<serde_json::Value>(&text)
        .ok()
        .and_then(|v| v.get("error").and_then(|e| e.as_str()).map(str::to_string))
        .unwrap_or_else(|| {
            if text.is_empty() {
                status.canonical_reason().unwrap_or("unknown status").to_string()
            } else {
                text
            }
        });

    Err(NetworkError::Status {
        status: status.as_u16(),
        message,
    })
}
