use axum::{
    body::Bytes,
    extract::{Path, Query, State},
    http::{HeaderMap, StatusCode},
    response::IntoResponse,
    routing::{get, post},
    Json, Router,
};
use serde_json::{json, Value};
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use tasksync_client::{AirtableClient, ClientError, PageQuery, RemoteTable, Settings};
use tasksync_core::{
    to_remote_fields, RemoteFields, SyncError, TaskDate, TaskDraft, TaskStatus,
};
use uuid::Uuid;

#[derive(Debug, Clone)]
struct SeenRequest {
    method: &'static str,
    path: Vec<String>,
    query: HashMap<String, String>,
    authorization: Option<String>,
    body: Option<Value>,
}

#[derive(Clone, Default)]
struct ServerState {
    seen: Arc<Mutex<Vec<SeenRequest>>>,
}

impl ServerState {
    fn record(&self, request: SeenRequest) {
        self.seen.lock().unwrap().push(request);
    }

    fn requests(&self) -> Vec<SeenRequest> {
        self.seen.lock().unwrap().clone()
    }
}

fn authorization(headers: &HeaderMap) -> Option<String> {
    headers
        .get("authorization")
        .and_then(|value| value.to_str().ok())
        .map(str::to_string)
}

async fn list_records(
    State(state): State<ServerState>,
    Path((base, table)): Path<(String, String)>,
    Query(query): Query<HashMap<String, String>>,
    headers: HeaderMap,
) -> Json<Value> {
    state.record(SeenRequest {
        method: "GET",
        path: vec![base, table],
        query,
        authorization: authorization(&headers),
        body: None,
    });
    Json(json!({
        "records": [
            {
                "id": "recA",
                "createdTime": "2024-01-01T08:00:00.000Z",
                "fields": {
                    "Task": "Water plants",
                    "Status": "In progress",
                    "To Do Date": "2024-01-05",
                    "Photos": [{"id": "att1", "url": "https://img.example/fern.png", "filename": "fern.png"}]
                }
            },
            { "id": "recB", "fields": { "Task": "Sparse record" } }
        ],
        "offset": "itrNEXT/recB"
    }))
}

async fn create_record(
    State(state): State<ServerState>,
    Path((base, table)): Path<(String, String)>,
    headers: HeaderMap,
    Json(body): Json<Value>,
) -> Json<Value> {
    state.record(SeenRequest {
        method: "POST",
        path: vec![base, table],
        query: HashMap::new(),
        authorization: authorization(&headers),
        body: Some(body.clone()),
    });
    Json(json!({
        "id": format!("rec{}", Uuid::new_v4().simple()),
        "createdTime": "2024-01-01T08:00:00.000Z",
        "fields": body["fields"],
    }))
}

async fn update_record(
    State(state): State<ServerState>,
    Path((base, table, id)): Path<(String, String, String)>,
    headers: HeaderMap,
    Json(body): Json<Value>,
) -> Json<Value> {
    state.record(SeenRequest {
        method: "PATCH",
        path: vec![base, table, id.clone()],
        query: HashMap::new(),
        authorization: authorization(&headers),
        body: Some(body.clone()),
    });
    Json(json!({ "id": id, "fields": body["fields"] }))
}

async fn rejecting() -> impl IntoResponse {
    (
        StatusCode::UNPROCESSABLE_ENTITY,
        Json(json!({
            "error": {
                "type": "INVALID_VALUE_FOR_COLUMN",
                "message": "Field \"Status\" cannot accept the provided value"
            }
        })),
    )
}

async fn unauthorized() -> impl IntoResponse {
    (
        StatusCode::UNAUTHORIZED,
        Json(json!({ "error": "AUTHENTICATION_REQUIRED" })),
    )
}

async fn broken_gateway() -> impl IntoResponse {
    (StatusCode::BAD_GATEWAY, "<html>upstream down</html>")
}

async fn list_bases(State(state): State<ServerState>, headers: HeaderMap) -> Json<Value> {
    state.record(SeenRequest {
        method: "GET",
        path: vec!["meta".into(), "bases".into()],
        query: HashMap::new(),
        authorization: authorization(&headers),
        body: None,
    });
    Json(json!({
        "bases": [
            { "id": "appChores", "name": "Chores", "permissionLevel": "create" },
            { "id": "appWork", "name": "Work", "permissionLevel": "read" }
        ]
    }))
}

async fn list_tables(Path(base): Path<String>) -> Json<Value> {
    Json(json!({
        "tables": [
            { "id": "tblTasks", "name": format!("Tasks of {}", base), "fields": [] }
        ]
    }))
}

async fn upload(headers: HeaderMap, body: Bytes) -> Json<Value> {
    let content_type = headers
        .get("content-type")
        .and_then(|value| value.to_str().ok())
        .unwrap_or_default()
        .to_string();
    let body = String::from_utf8_lossy(&body).to_string();
    assert!(content_type.starts_with("multipart/form-data"));
    assert!(body.contains("name=\"file\""));
    assert!(body.contains("filename=\"fern.png\""));
    assert!(body.contains("PNGDATA"));
    Json(json!({ "url": "https://cdn.example/fern.png" }))
}

async fn spawn(router: Router) -> String {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, router).await.unwrap();
    });
    format!("http://{}", addr)
}

async fn records_server() -> (String, ServerState) {
    let state = ServerState::default();
    let router = Router::new()
        .route("/v0/:base/:table", get(list_records).post(create_record))
        .route("/v0/:base/:table/:id", axum::routing::patch(update_record))
        .with_state(state.clone());
    (spawn(router).await, state)
}

async fn meta_server() -> (String, ServerState) {
    let state = ServerState::default();
    let router = Router::new()
        .route("/v0/meta/bases", get(list_bases))
        .route("/v0/meta/bases/:base/tables", get(list_tables))
        .route("/upload", post(upload))
        .with_state(state.clone());
    (spawn(router).await, state)
}

fn client(api_url: &str) -> AirtableClient {
    let mut settings = Settings::new("pat123", "appChores", "My Tasks");
    settings.api_url = api_url.to_string();
    AirtableClient::new(settings)
}

#[tokio::test]
async fn test_select_page_sends_sort_and_cursor() {
    let (url, state) = records_server().await;
    let client = client(&url);

    let records = client
        .select_page(&PageQuery::by_due_date(25, Some("recPrev")))
        .await
        .unwrap();

    assert_eq!(records.len(), 2);
    assert_eq!(records[0].id, "recA");
    assert_eq!(records[0].fields.status.as_deref(), Some("In progress"));
    assert_eq!(records[1].fields.due_date, None);

    let seen = state.requests();
    assert_eq!(seen.len(), 1);
    let request = &seen[0];
    assert_eq!(request.path, vec!["appChores", "My Tasks"]);
    assert_eq!(request.authorization.as_deref(), Some("Bearer pat123"));
    assert_eq!(request.query.get("pageSize").map(String::as_str), Some("25"));
    assert_eq!(
        request.query.get("sort[0][field]").map(String::as_str),
        Some("To Do Date")
    );
    assert_eq!(
        request.query.get("sort[0][direction]").map(String::as_str),
        Some("asc")
    );
    assert_eq!(request.query.get("offset").map(String::as_str), Some("recPrev"));
}

#[tokio::test]
async fn test_first_page_has_no_offset_param() {
    let (url, state) = records_server().await;

    client(&url)
        .select_page(&PageQuery::by_due_date(10, None))
        .await
        .unwrap();

    let request = &state.requests()[0];
    assert!(!request.query.contains_key("offset"));
    assert_eq!(request.query.get("pageSize").map(String::as_str), Some("10"));
}

#[tokio::test]
async fn test_create_posts_fields_and_returns_new_id() {
    let (url, state) = records_server().await;
    let mut draft = TaskDraft::new("Water plants", TaskDate::from_ymd(2024, 1, 5));
    draft.images = vec!["https://img.example/fern.png".to_string()];

    let record = client(&url)
        .create_record(tasksync_core::draft_to_remote_fields(&draft))
        .await
        .unwrap();

    assert!(record.id.starts_with("rec"));
    assert_eq!(record.fields.title.as_deref(), Some("Water plants"));

    let request = &state.requests()[0];
    assert_eq!(request.method, "POST");
    assert_eq!(
        request.body,
        Some(json!({
            "fields": {
                "Task": "Water plants",
                "Notes": "",
                "Status": "To do",
                "To Do Date": "2024-01-05",
                "Photos": [{ "url": "https://img.example/fern.png" }]
            }
        }))
    );
}

#[tokio::test]
async fn test_update_patches_record_with_full_fields() {
    let (url, state) = records_server().await;
    let mut task = TaskDraft::new("Water plants", TaskDate::from_ymd(2024, 1, 5)).into_task("recA");
    task.status = TaskStatus::Done;
    task.completed_date = Some(TaskDate::parse("2024-01-06T18:20:00.000Z"));

    let record = client(&url)
        .update_record("recA", to_remote_fields(&task))
        .await
        .unwrap();
    assert_eq!(record.id, "recA");

    let request = &state.requests()[0];
    assert_eq!(request.method, "PATCH");
    assert_eq!(request.path, vec!["appChores", "My Tasks", "recA"]);
    let fields = &request.body.as_ref().unwrap()["fields"];
    assert_eq!(fields["Status"], "Done");
    assert_eq!(fields["Completed Date"], "2024-01-06");
    assert_eq!(fields["To Do Date"], "2024-01-05");
}

#[tokio::test]
async fn test_invalid_due_date_is_left_out_of_payload() {
    let (url, state) = records_server().await;
    let task = TaskDraft::new("Someday", TaskDate::Invalid).into_task("recA");

    client(&url)
        .update_record("recA", to_remote_fields(&task))
        .await
        .unwrap();

    let requests = state.requests();
    let fields = &requests[0].body.as_ref().unwrap()["fields"];
    assert!(fields.get("To Do Date").is_none());
    assert_eq!(fields["Task"], "Someday");
}

#[tokio::test]
async fn test_error_body_becomes_remote_error() {
    let router = Router::new()
        .route("/v0/:base/:table/:id", axum::routing::patch(rejecting))
        .route("/v0/:base/:table", get(unauthorized).post(broken_gateway));
    let url = spawn(router).await;
    let client = client(&url);

    let err = client
        .update_record("recA", RemoteFields::default())
        .await
        .unwrap_err();
    match err {
        ClientError::Remote { status, message } => {
            assert_eq!(status, 422);
            assert_eq!(
                message,
                "INVALID_VALUE_FOR_COLUMN: Field \"Status\" cannot accept the provided value"
            );
        }
        other => panic!("unexpected error: {other:?}"),
    }

    let err = client
        .select_page(&PageQuery::by_due_date(25, None))
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        ClientError::Remote { status: 401, ref message } if message == "AUTHENTICATION_REQUIRED"
    ));
    assert!(err.is_transient());

    let err = client
        .create_record(RemoteFields::default())
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        ClientError::Remote { status: 502, ref message } if message == "Bad Gateway"
    ));
}

#[tokio::test]
async fn test_missing_configuration_fails_before_request() {
    let (url, state) = records_server().await;
    let mut settings = Settings::new("pat123", "", "My Tasks");
    settings.api_url = url;
    let client = AirtableClient::new(settings);

    let err = client
        .select_page(&PageQuery::by_due_date(25, None))
        .await
        .unwrap_err();

    assert!(matches!(err, ClientError::Sync(SyncError::MissingConfiguration)));
    assert!(state.requests().is_empty());
}

#[tokio::test]
async fn test_fetch_bases_and_tables() {
    let (url, state) = meta_server().await;
    let client = client(&url);

    let bases = client.fetch_bases().await.unwrap();
    assert_eq!(bases.len(), 2);
    assert_eq!(bases[0].id, "appChores");
    assert_eq!(bases[0].permission_level.as_deref(), Some("create"));
    assert_eq!(
        state.requests()[0].authorization.as_deref(),
        Some("Bearer pat123")
    );

    let tables = client.fetch_tables("appWork").await.unwrap();
    assert_eq!(tables.len(), 1);
    assert_eq!(tables[0].id, "tblTasks");
    assert_eq!(tables[0].name, "Tasks of appWork");
}

#[tokio::test]
async fn test_upload_image_posts_multipart_file() {
    let (url, _) = meta_server().await;
    let mut settings = Settings::new("pat123", "appChores", "My Tasks");
    settings.upload_endpoint = Some(format!("{}/upload", url));
    let client = AirtableClient::new(settings);

    let stored = client
        .upload_image("fern.png", b"PNGDATA".to_vec())
        .await
        .unwrap();

    assert_eq!(stored, "https://cdn.example/fern.png");
}

#[tokio::test]
async fn test_upload_requires_endpoint() {
    let client = client("http://127.0.0.1:9");

    let err = client
        .upload_image("fern.png", b"PNGDATA".to_vec())
        .await
        .unwrap_err();

    assert!(matches!(err, ClientError::Sync(SyncError::UploadNotConfigured)));
}
