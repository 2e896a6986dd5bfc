//! In-process tests for the HTTP API.

use axum::body::Body;
use axum::http::{Request, StatusCode};
use evox::commands;
use evox::config::Settings;
use evox::server::{AppState, build_router};
use evox::storage::Storage;
use evox::webhook::{self, SIGNATURE_HEADER};
use serde_json::{Value, json};
use tower::ServiceExt;

const SECRET: &str = "whsec_integration";

fn state_with(settings: Settings) -> AppState {
    let mut storage = Storage::open_in_memory().unwrap();
    commands::seed(&mut storage, &settings).unwrap();
    AppState::new(storage, settings)
}

fn state() -> AppState {
    let mut settings = Settings::default();
    settings.webhook_secret = Some(SECRET.to_string());
    state_with(settings)
}

async fn send(state: &AppState, request: Request<Body>) -> (StatusCode, Value) {
    let response = build_router(state.clone()).oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    (status, serde_json::from_slice(&bytes).unwrap())
}

fn get(uri: &str) -> Request<Body> {
    Request::builder().uri(uri).body(Body::empty()).unwrap()
}

fn post_json(uri: &str, body: &Value) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri(uri)
        .header("content-type", "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

fn webhook_request(body: &[u8], signature: &str) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri("/api/webhooks/linear")
        .header("content-type", "application/json")
        .header(SIGNATURE_HEADER, signature)
        .body(Body::from(body.to_vec()))
        .unwrap()
}

fn in_review_issue() -> Vec<u8> {
    json!({
        "action": "create",
        "type": "Issue",
        "data": {
            "id": "lin-uuid-42",
            "identifier": "AGT-42",
            "title": "Polish onboarding copy",
            "description": "Nothing assigned in here",
            "state": { "name": "In Review" },
            "priority": 2,
            "url": "https://linear.app/acme/issue/AGT-42"
        }
    })
    .to_string()
    .into_bytes()
}

#[tokio::test]
async fn test_health() {
    let (status, body) = send(&state(), get("/api/health")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "ok");
    assert_eq!(body["version"], env!("CARGO_PKG_VERSION"));
    assert!(body["commit"].is_string());
}

#[tokio::test]
async fn test_webhook_info() {
    let (status, body) = send(&state(), get("/api/webhooks/linear")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["signatureHeader"], SIGNATURE_HEADER);
}

#[tokio::test]
async fn test_webhook_bad_signature_rejected_without_writes() {
    let state = state();
    let (status, body) = send(&state, webhook_request(&in_review_issue(), "deadbeef")).await;

    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["success"], false);
    assert_eq!(body["kind"], "authentication");

    let storage = state.storage.lock().await;
    assert_eq!(storage.count_tasks().unwrap(), 0);
    assert!(storage.list_activities(None).unwrap().is_empty());
}

#[tokio::test]
async fn test_webhook_new_issue_in_review() {
    let state = state();
    let body = in_review_issue();
    let signature = webhook::sign(&body, SECRET).unwrap();

    let (status, response) = send(&state, webhook_request(&body, &signature)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(response["success"], true);
    assert_eq!(response["linearIdentifier"], "AGT-42");
    assert_eq!(response["status"], "review");
    assert_eq!(response["created"], true);

    let storage = state.storage.lock().await;
    let task = storage.find_task_by_external_id("lin-uuid-42").unwrap().unwrap();
    let max = storage.find_agent_by_name("max").unwrap().unwrap();
    assert_eq!(task.status.as_str(), "review");
    assert_eq!(task.priority.as_str(), "high");
    assert_eq!(task.assignee.as_deref(), Some(max.id.as_str()));
    assert_eq!(task.owner.as_deref(), Some("max"));
    assert_eq!(storage.list_activities(None).unwrap().len(), 1);
}

#[tokio::test]
async fn test_webhook_replay_is_idempotent() {
    let state = state();
    let body = in_review_issue();
    let signature = webhook::sign(&body, SECRET).unwrap();

    send(&state, webhook_request(&body, &signature)).await;
    let (status, response) = send(&state, webhook_request(&body, &signature)).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(response["created"], false);
    assert_eq!(response["statusChanged"], false);

    let storage = state.storage.lock().await;
    assert_eq!(storage.count_tasks().unwrap(), 1);
    assert_eq!(storage.list_activities(None).unwrap().len(), 1);
}

#[tokio::test]
async fn test_webhook_skips_other_entities() {
    let state = state();
    let body = json!({ "action": "create", "type": "Comment", "data": {} })
        .to_string()
        .into_bytes();
    let signature = webhook::sign(&body, SECRET).unwrap();

    let (status, response) = send(&state, webhook_request(&body, &signature)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(response["skipped"], true);
    assert_eq!(response["reason"], "Ignoring Comment event");
}

#[tokio::test]
async fn test_webhook_malformed_body_is_validation_error() {
    let state = state();
    let body = b"{not json".to_vec();
    let signature = webhook::sign(&body, SECRET).unwrap();

    let (status, response) = send(&state, webhook_request(&body, &signature)).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(response["kind"], "validation");
}

#[tokio::test]
async fn test_webhook_missing_target_project_is_configuration_error() {
    let mut settings = Settings::default();
    settings.target_project = "ELSEWHERE".to_string();
    let state = AppState::new(Storage::open_in_memory().unwrap(), settings);

    let body = in_review_issue();
    let (status, response) = send(&state, webhook_request(&body, "unsigned")).await;
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(response["kind"], "configuration");
}

#[tokio::test]
async fn test_assign_creates_and_assigns_task() {
    let state = state();
    let request = json!({
        "title": "Add login API endpoint",
        "description": "JWT auth on the server",
        "priority": "high",
        "projectId": "EVOX",
        "assignedBy": "max"
    });

    let (status, body) = send(&state, post_json("/api/agent/assign", &request)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["success"], true);
    assert_eq!(body["assignedTo"]["name"], "SAM");
    assert_eq!(body["assignedTo"]["role"], "backend");
    assert_eq!(body["notification"]["sent"], false);
    assert_eq!(body["notification"]["reason"], "Agent has no gateway config");

    let task_id = body["taskId"].as_str().unwrap().to_string();
    let storage = state.storage.lock().await;
    let sam = storage.find_agent_by_name("sam").unwrap().unwrap();
    assert_eq!(sam.current_task.as_deref(), Some(task_id.as_str()));
    assert_eq!(storage.get_task(&task_id).unwrap().status.as_str(), "todo");
}

#[tokio::test]
async fn test_assign_missing_fields() {
    let (status, body) = send(
        &state(),
        post_json("/api/agent/assign", &json!({ "title": "No description" })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["kind"], "validation");
}

#[tokio::test]
async fn test_assign_unknown_project() {
    let request = json!({
        "title": "Anything",
        "description": "at all",
        "priority": "low",
        "projectId": "NOPE"
    });
    let (status, body) = send(&state(), post_json("/api/agent/assign", &request)).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["kind"], "not_found");
}

#[tokio::test]
async fn test_suggest_does_not_create_tasks() {
    let state = state();
    let (status, body) = send(
        &state,
        get("/api/agent/assign?title=Responsive%20layout&description=css%20component"),
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["determinedRole"], "frontend");
    assert_eq!(body["suggestions"][0]["name"], "LEO");
    assert_eq!(body["suggestions"][0]["recommended"], true);
    assert_eq!(state.storage.lock().await.count_tasks().unwrap(), 0);
}

#[tokio::test]
async fn test_feeds() {
    let state = state();
    let (status, body) = send(&state, get("/api/agents")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["agents"].as_array().unwrap().len(), 3);

    let (status, body) = send(&state, get("/api/tasks?status=todo")).await;
    assert_eq!(status, StatusCode::OK);
    assert!(body["tasks"].as_array().unwrap().is_empty());

    let (status, body) = send(&state, get("/api/tasks?status=shipped")).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["kind"], "validation");

    let (status, body) = send(&state, get("/api/activities?limit=ten")).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["kind"], "validation");
}

#[tokio::test]
async fn test_repeated_query_params_are_json_validation_errors() {
    let state = state();
    for uri in [
        "/api/agent/assign?title=a&title=b",
        "/api/tasks?status=todo&status=done",
        "/api/activities?limit=1&limit=2",
    ] {
        let response = build_router(state.clone()).oneshot(get(uri)).await.unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST, "{}", uri);
        assert_eq!(
            response.headers()["content-type"],
            "application/json",
            "{}",
            uri
        );

        let (status, body) = send(&state, get(uri)).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["success"], false);
        assert_eq!(body["kind"], "validation");
        assert!(body["error"].as_str().unwrap().contains("duplicate field"));
    }
}

#[tokio::test]
async fn test_unknown_route_is_json_404() {
    let (status, body) = send(&state(), get("/api/nothing-here")).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["success"], false);
}

#[tokio::test]
async fn test_sync_endpoint() {
    let mut server = mockito::Server::new_async().await;
    let _mock = server
        .mock("POST", "/graphql")
        .with_status(200)
        .with_body(
            json!({ "data": { "issues": { "nodes": [
                {
                    "id": "lin-7",
                    "identifier": "AGT-7",
                    "title": "Wire up the dashboard",
                    "description": "## Agent: Leo",
                    "state": { "name": "Todo" },
                    "priority": 3
                },
                {
                    "id": "lin-8",
                    "identifier": "AGT-8",
                    "title": "Ship it",
                    "state": { "name": "Done" }
                }
            ] } } })
            .to_string(),
        )
        .create_async()
        .await;

    let mut settings = Settings::default();
    settings.linear.api_url = format!("{}/graphql", server.url());
    settings.linear.api_key = Some("lin_api_test".to_string());
    settings.linear.project_id = Some("proj-1".to_string());
    let state = state_with(settings);

    let (status, body) = send(&state, post_json("/api/sync", &json!({}))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["total"], 2);
    assert_eq!(body["created"], 2);
    assert_eq!(body["truncated"], false);
    assert_eq!(body["message"], "Synced 2 tasks: 2 created, 0 updated");

    let storage = state.storage.lock().await;
    let task = storage.find_task_by_external_id("lin-7").unwrap().unwrap();
    let leo = storage.find_agent_by_name("leo").unwrap().unwrap();
    assert_eq!(task.assignee.as_deref(), Some(leo.id.as_str()));
}

#[tokio::test]
async fn test_sync_without_credentials() {
    let (status, body) = send(&state(), post_json("/api/sync", &json!({}))).await;
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(body["kind"], "configuration");
}
