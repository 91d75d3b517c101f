//! REST API integration tests
//!
//! Each test builds the router over a file store in a temporary directory and
//! sends requests through `tower::ServiceExt::oneshot`.

use arbor_core::db::FileStore;
use arbor_core::TreeService;
use arbor_server::{create_router, AppState};
use axum::body::Body;
use axum::http::{HeaderValue, Method, Request, StatusCode};
use axum::Router;
use http_body_util::BodyExt;
use serde_json::{json, Value};
use std::sync::Arc;
use tempfile::TempDir;
use tower::ServiceExt; // for `.oneshot()`

/// Router plus the id of the map root
async fn setup() -> (Router, String, TempDir) {
    let temp_dir = TempDir::new().expect("tempdir");
    let store = FileStore::new(temp_dir.path()).expect("store");
    let service = TreeService::new(Arc::new(store));
    let tree = service.initialize().await.expect("initialize");
    let root_id = tree
        .nodes_of_type(arbor_core::NodeType::Map)
        .next()
        .expect("map root")
        .id
        .clone();

    let router = create_router(
        AppState::new(service),
        vec![HeaderValue::from_static("http://localhost:5173")],
    );
    (router, root_id, temp_dir)
}

fn json_request(method: Method, uri: &str, body: Option<Value>) -> Request<Body> {
    let builder = Request::builder()
        .method(method)
        .uri(uri)
        .header("content-type", "application/json");
    match body {
        Some(val) => builder.body(Body::from(val.to_string())).unwrap(),
        None => builder.body(Body::empty()).unwrap(),
    }
}

async fn send(router: &Router, request: Request<Body>) -> (StatusCode, Value) {
    let response = router.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    let body = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
    (status, body)
}

async fn create(router: &Router, parent_id: &str, node: Value) -> Value {
    let (status, body) = send(
        router,
        json_request(
            Method::POST,
            "/nodes",
            Some(json!({ "node": node, "parentNodeId": parent_id })),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::OK, "{body}");
    body
}

#[tokio::test]
async fn health_reports_ok() {
    let (router, _, _tmp) = setup().await;

    let (status, body) = send(&router, json_request(Method::GET, "/api/health", None)).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "ok");
}

#[tokio::test]
async fn list_returns_map_keyed_by_id() {
    let (router, root_id, _tmp) = setup().await;

    let (status, body) = send(&router, json_request(Method::GET, "/nodes", None)).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body[&root_id]["id"], root_id.as_str());
    assert_eq!(body.as_object().unwrap().len(), 3);
}

#[tokio::test]
async fn create_returns_node_and_delta() {
    let (router, root_id, _tmp) = setup().await;

    let body = create(
        &router,
        &root_id,
        json!({ "title": "Direct air capture", "setMetrics": { "readinessLevel": 4 } }),
    )
    .await;

    let node_id = body["node"]["id"].as_str().unwrap();
    assert_eq!(body["node"]["parentId"], root_id.as_str());
    assert_eq!(body["node"]["calculatedMetrics"]["readinessLevel"], 4.0);
    assert_eq!(body["delta"]["updated"][&root_id]["childrenIds"], json!([node_id]));
    assert_eq!(body["delta"]["updated"][&root_id]["calculatedMetrics"]["readinessLevel"], 4.0);
}

#[tokio::test]
async fn negative_index_appends() {
    let (router, root_id, _tmp) = setup().await;
    let first = create(&router, &root_id, json!({ "title": "First" })).await;

    let (status, body) = send(
        &router,
        json_request(
            Method::POST,
            "/nodes",
            Some(json!({
                "node": { "title": "Second" },
                "parentNodeId": root_id.as_str(),
                "insertAtIndex": -1
            })),
        ),
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(
        body["delta"]["updated"][&root_id]["childrenIds"],
        json!([first["node"]["id"], body["node"]["id"]])
    );
}

#[tokio::test]
async fn patch_and_subtree() {
    let (router, root_id, _tmp) = setup().await;
    let child = create(&router, &root_id, json!({ "title": "Child" })).await;
    let child_id = child["node"]["id"].as_str().unwrap().to_string();

    let (status, delta) = send(
        &router,
        json_request(
            Method::PATCH,
            &format!("/nodes/{child_id}"),
            Some(json!({ "title": "Renamed", "setMetrics": { "readinessLevel": 9 } })),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(delta["updated"][&child_id]["title"], "Renamed");

    let (status, tree) = send(
        &router,
        json_request(Method::GET, &format!("/nodes/{root_id}/tree"), None),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(tree["calculatedMetrics"]["readinessLevel"], 9.0);
    assert_eq!(tree["children"][0]["title"], "Renamed");
}

#[tokio::test]
async fn reparent_into_descendant_is_bad_request() {
    let (router, root_id, _tmp) = setup().await;
    let parent = create(&router, &root_id, json!({ "title": "Parent" })).await;
    let parent_id = parent["node"]["id"].as_str().unwrap().to_string();
    let child = create(&router, &parent_id, json!({ "title": "Child" })).await;
    let child_id = child["node"]["id"].as_str().unwrap();

    let (status, body) = send(
        &router,
        json_request(
            Method::PUT,
            &format!("/nodes/{parent_id}/parent"),
            Some(json!({ "newParentId": child_id })),
        ),
    )
    .await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["code"], "INVALID_STRUCTURAL_MOVE");
}

#[tokio::test]
async fn reparent_moves_node() {
    let (router, root_id, _tmp) = setup().await;
    let a = create(&router, &root_id, json!({ "title": "A" })).await;
    let b = create(&router, &root_id, json!({ "title": "B" })).await;
    let a_id = a["node"]["id"].as_str().unwrap().to_string();
    let b_id = b["node"]["id"].as_str().unwrap().to_string();

    let (status, delta) = send(
        &router,
        json_request(
            Method::PUT,
            &format!("/nodes/{b_id}/parent"),
            Some(json!({ "newParentId": a_id.as_str(), "insertAtIndex": 0 })),
        ),
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(delta["updated"][&b_id]["parentId"], a_id.as_str());
    assert_eq!(delta["updated"][&root_id]["childrenIds"], json!([a_id]));
}

#[tokio::test]
async fn delete_returns_removed_subtree() {
    let (router, root_id, _tmp) = setup().await;
    let branch = create(&router, &root_id, json!({ "title": "Branch" })).await;
    let branch_id = branch["node"]["id"].as_str().unwrap().to_string();
    create(&router, &branch_id, json!({ "title": "Leaf" })).await;

    let (status, delta) = send(
        &router,
        json_request(Method::DELETE, &format!("/nodes/{branch_id}"), None),
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(delta["removed"].as_object().unwrap().len(), 2);

    let (status, body) = send(
        &router,
        json_request(Method::DELETE, &format!("/nodes/{branch_id}"), None),
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["code"], "NODE_NOT_FOUND");
}

#[tokio::test]
async fn invalid_metric_is_validation_error() {
    let (router, root_id, _tmp) = setup().await;

    let (status, body) = send(
        &router,
        json_request(
            Method::POST,
            "/nodes",
            Some(json!({
                "node": { "title": "Bad", "setMetrics": { "readinessLevel": 12 } },
                "parentNodeId": root_id.as_str()
            })),
        ),
    )
    .await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["code"], "VALIDATION_ERROR");
}

#[tokio::test]
async fn cross_type_create_is_type_mismatch() {
    let (router, root_id, _tmp) = setup().await;

    let (status, body) = send(
        &router,
        json_request(
            Method::POST,
            "/nodes",
            Some(json!({
                "node": { "title": "Wrong", "type": "user" },
                "parentNodeId": root_id.as_str()
            })),
        ),
    )
    .await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["code"], "TYPE_MISMATCH");
}
