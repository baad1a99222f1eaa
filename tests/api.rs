mod common;

use common::{bind, client, config, spawn, TestNode};
use reqwest::{Method, StatusCode};
use serde_json::{json, Value};

async fn standalone() -> TestNode {
    let (listener, addr) = bind().await;
    spawn(listener, config(&addr, &addr, &[])).await
}

async fn error_of(resp: reqwest::Response) -> String {
    let body: Value = resp.json().await.unwrap();
    body["error"].as_str().unwrap_or_default().to_string()
}

#[tokio::test]
async fn test_ping_and_is_master() {
    let node = standalone().await;
    let http = client();

    let resp = http.get(format!("{}/ping", node.addr)).send().await.unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    assert_eq!(resp.text().await.unwrap(), "pong");

    let body: Value = http
        .get(format!("{}/is-master", node.addr))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(body, json!({"isMaster": true}));

    node.stop().await;
}

#[tokio::test]
async fn test_cors_headers() {
    let node = standalone().await;
    let http = client();

    let resp = http
        .get(format!("{}/ping", node.addr))
        .header("Origin", "http://example.com")
        .send()
        .await
        .unwrap();
    assert_eq!(resp.headers()["access-control-allow-origin"], "*");

    let resp = http
        .request(Method::OPTIONS, format!("{}/insert", node.addr))
        .header("Origin", "http://example.com")
        .header("Access-Control-Request-Method", "POST")
        .header("Access-Control-Request-Headers", "content-type")
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    assert_eq!(resp.headers()["access-control-allow-origin"], "*");
    let methods = resp.headers()["access-control-allow-methods"].to_str().unwrap().to_string();
    for method in ["GET", "POST", "PUT", "DELETE", "OPTIONS"] {
        assert!(methods.contains(method), "{} missing from {}", method, methods);
    }

    let resp = http
        .request(Method::OPTIONS, format!("{}/createdb", node.addr))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    assert!(resp.text().await.unwrap().is_empty());

    node.stop().await;
}

#[tokio::test]
async fn test_select_validation() {
    let node = standalone().await;
    let http = client();

    let resp = http
        .get(format!("{}/select?dbname=shop", node.addr))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    assert_eq!(error_of(resp).await, "Both dbname and table parameters are required");

    http.get(format!("{}/createdb?name=shop", node.addr)).send().await.unwrap();
    http.get(format!("{}/createtable?dbname=shop&table=items&schema=id%20INTEGER", node.addr))
        .send()
        .await
        .unwrap();

    let resp = http
        .get(format!("{}/select?dbname=shop&table=items", node.addr))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    let rows: Value = resp.json().await.unwrap();
    assert_eq!(rows, json!([]));

    node.stop().await;
}

#[tokio::test]
async fn test_mutation_validation() {
    let node = standalone().await;
    let http = client();

    let resp = http.post(format!("{}/createdb", node.addr)).send().await.unwrap();
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    assert_eq!(error_of(resp).await, "Database name is required");

    let resp = http
        .post(format!("{}/insert", node.addr))
        .json(&json!({"dbname": "shop", "table": "items"}))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    assert_eq!(error_of(resp).await, "All fields (dbname, table, values) are required");

    let resp = http
        .post(format!("{}/update", node.addr))
        .body("{not json")
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    assert_eq!(error_of(resp).await, "Invalid request body");

    let resp = http
        .post(format!("{}/createdb?name=bad%20name", node.addr))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);

    node.stop().await;
}

#[tokio::test]
async fn test_guard_rejects_smuggled_statement() {
    let node = standalone().await;
    let http = client();

    http.post(format!("{}/createdb?name=shop", node.addr)).send().await.unwrap();
    http.post(format!("{}/createtable", node.addr))
        .query(&[("dbname", "shop"), ("table", "items"), ("schema", "id INTEGER, name TEXT")])
        .send()
        .await
        .unwrap();

    let resp = http
        .post(format!("{}/delete", node.addr))
        .json(&json!({"dbname": "shop", "table": "items", "where": "1 = 1; DROP TABLE shop.items"}))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    assert!(!error_of(resp).await.is_empty());

    // The table survived.
    let resp = http
        .get(format!("{}/select?dbname=shop&table=items", node.addr))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::OK);

    node.stop().await;
}

#[tokio::test]
async fn test_status_reports_role() {
    let node = standalone().await;

    let status: Value = client()
        .get(format!("{}/replication/status", node.addr))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(status["role"], "primary");
    assert_eq!(status["self_address"], node.addr.as_str());
    assert_eq!(status["primary_address"], node.addr.as_str());
    assert_eq!(status["election_in_progress"], false);
    assert_eq!(status["statement_guard"], "on");
    assert_eq!(status["replicas"], json!([]));

    node.stop().await;
}
