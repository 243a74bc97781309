use axum::{
    Router,
    body::Body,
    http::{
        Request, StatusCode,
        header::{AUTHORIZATION, CONTENT_LENGTH, CONTENT_TYPE},
    },
};
use http_body_util::BodyExt;
use serde_json::{Value, json};
use tempfile::TempDir;
use tower::ServiceExt;

use crate::{
    app,
    config::{Config, StoreBackend},
    memory::MemoryStore,
    state::AppState,
};

const BOUNDARY: &str = "notebook-test-boundary";
const PASSWORD: &str = "admin123";

fn config(upload_dir: &TempDir) -> Config {
    Config {
        port: 0,
        store: StoreBackend::Memory,
        redis_url: String::new(),
        jwt_secret: "router-test-secret".to_string(),
        admin_username: "admin".to_string(),
        admin_password: PASSWORD.to_string(),
        token_ttl_secs: 3600,
        upload_dir: upload_dir.path().to_path_buf(),
        max_upload_bytes: 10 * 1024 * 1024,
        protect_edits: true,
        cors_origins: vec!["http://localhost:5173".to_string()],
    }
}

async fn make_app(config: Config) -> Router {
    let state = AppState::new(config, MemoryStore::default()).await.unwrap();
    app(state)
}

async fn default_app() -> (Router, TempDir) {
    let dir = tempfile::tempdir().unwrap();
    (make_app(config(&dir)).await, dir)
}

async fn send(app: &Router, request: Request<Body>) -> (StatusCode, Value) {
    let res = app.clone().oneshot(request).await.unwrap();
    let status = res.status();
    let body = res.into_body().collect().await.unwrap().to_bytes();

    (status, serde_json::from_slice(&body).unwrap_or(Value::Null))
}

fn json_request(method: &str, uri: &str, token: Option<&str>, body: Value) -> Request<Body> {
    let mut builder = Request::builder()
        .method(method)
        .uri(uri)
        .header(CONTENT_TYPE, "application/json");

    if let Some(token) = token {
        builder = builder.header(AUTHORIZATION, format!("Bearer {token}"));
    }

    builder.body(Body::from(body.to_string())).unwrap()
}

fn empty_request(method: &str, uri: &str, token: Option<&str>) -> Request<Body> {
    let mut builder = Request::builder().method(method).uri(uri);

    if let Some(token) = token {
        builder = builder.header(AUTHORIZATION, format!("Bearer {token}"));
    }

    builder.body(Body::empty()).unwrap()
}

fn multipart_body(title: Option<&str>, author: Option<&str>, file: Option<(&str, &str, &[u8])>) -> Vec<u8> {
    let mut body = Vec::new();

    for (name, value) in [("title", title), ("author", author)] {
        if let Some(value) = value {
            body.extend_from_slice(
                format!("--{BOUNDARY}\r\nContent-Disposition: form-data; name=\"{name}\"\r\n\r\n{value}\r\n").as_bytes(),
            );
        }
    }

    if let Some((file_name, content_type, bytes)) = file {
        body.extend_from_slice(
            format!(
                "--{BOUNDARY}\r\nContent-Disposition: form-data; name=\"file\"; filename=\"{file_name}\"\r\nContent-Type: {content_type}\r\n\r\n"
            )
            .as_bytes(),
        );
        body.extend_from_slice(bytes);
        body.extend_from_slice(b"\r\n");
    }

    body.extend_from_slice(format!("--{BOUNDARY}--\r\n").as_bytes());
    body
}

fn upload_request(body: Vec<u8>) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri("/api/pdfs/upload")
        .header(CONTENT_TYPE, format!("multipart/form-data; boundary={BOUNDARY}"))
        .body(Body::from(body))
        .unwrap()
}

async fn login(app: &Router) -> String {
    let (status, body) = send(
        app,
        json_request("POST", "/api/login", None, json!({ "username": "admin", "password": PASSWORD })),
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    body["token"].as_str().unwrap().to_string()
}

async fn upload(app: &Router, title: &str, author: &str, size: usize) -> Value {
    let payload = vec![b'%'; size];
    let body = multipart_body(Some(title), Some(author), Some(("notes.pdf", "application/pdf", &payload)));

    let (status, note) = send(app, upload_request(body)).await;
    assert_eq!(status, StatusCode::CREATED);
    note
}

#[tokio::test]
async fn test_runs_the_upload_approve_track_delete_scenario() {
    let (app, _dir) = default_app().await;
    let token = login(&app).await;

    let note = upload(&app, "Calculus Notes", "Jane", 5000).await;
    let id = note["_id"].as_str().unwrap().to_string();
    assert_eq!(note["fileSize"], 5000);
    assert_eq!(note["isApproved"], false);
    assert_eq!(note["views"], 0);
    assert_eq!(note["downloads"], 0);

    let (_, public) = send(&app, empty_request("GET", "/api/pdfs", None)).await;
    assert_eq!(public, json!([]));

    let (status, all) = send(&app, empty_request("GET", "/api/pdfs/admin", Some(&token))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(all.as_array().unwrap().len(), 1);

    let (status, approved) = send(
        &app,
        empty_request("PATCH", &format!("/api/pdfs/{id}/approve"), Some(&token)),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(approved["isApproved"], true);

    for expected in 1..=3 {
        let (status, body) = send(&app, empty_request("POST", &format!("/api/pdfs/{id}/view"), None)).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, json!({ "views": expected }));
    }

    let (_, body) = send(&app, empty_request("POST", &format!("/api/pdfs/{id}/download"), None)).await;
    assert_eq!(body, json!({ "downloads": 1 }));

    let (status, fetched) = send(&app, empty_request("GET", &format!("/api/pdfs/{id}"), None)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(fetched["views"], 3);

    let file_url = note["fileUrl"].as_str().unwrap();
    let res = app.clone().oneshot(empty_request("GET", file_url, None)).await.unwrap();
    assert_eq!(res.status(), StatusCode::OK);
    assert_eq!(res.into_body().collect().await.unwrap().to_bytes().len(), 5000);

    let (status, body) = send(&app, empty_request("DELETE", &format!("/api/pdfs/{id}"), Some(&token))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, json!({ "message": "PDF deleted successfully" }));

    let (status, body) = send(&app, empty_request("GET", &format!("/api/pdfs/{id}"), Some(&token))).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body, json!({ "message": "PDF not found" }));

    let (status, _) = send(&app, empty_request("POST", &format!("/api/pdfs/{id}/view"), None)).await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let res = app.clone().oneshot(empty_request("GET", file_url, None)).await.unwrap();
    assert_eq!(res.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_guards_admin_routes() {
    let (app, _dir) = default_app().await;
    let note = upload(&app, "t", "a", 10).await;
    let approve = format!("/api/pdfs/{}/approve", note["_id"].as_str().unwrap());

    let (status, body) = send(&app, empty_request("GET", "/api/pdfs/admin", None)).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body, json!({ "message": "Access token is required" }));

    let (status, body) = send(&app, empty_request("GET", "/api/pdfs/admin", Some("forged"))).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(body, json!({ "message": "Invalid or expired token" }));

    let (status, _) = send(&app, empty_request("PATCH", &approve, None)).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let (status, _) = send(&app, empty_request("PATCH", &approve, Some("forged"))).await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, _) = send(&app, empty_request("PATCH", "/api/pdfs/missing/approve", Some(&login(&app).await))).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_rejects_bad_logins() {
    let (app, _dir) = default_app().await;

    let (status, body) = send(
        &app,
        json_request("POST", "/api/login", None, json!({ "username": "admin", "password": "nope" })),
    )
    .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body, json!({ "message": "Invalid credentials" }));

    let (status, _) = send(&app, json_request("POST", "/api/login", None, json!({ "username": "admin" }))).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_validates_uploads() {
    let dir = tempfile::tempdir().unwrap();
    let mut config = config(&dir);
    config.max_upload_bytes = 1024;
    let app = make_app(config).await;

    let (status, body) = send(&app, upload_request(multipart_body(Some("t"), Some("a"), None))).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body, json!({ "message": "No file uploaded" }));

    let png = multipart_body(Some("t"), Some("a"), Some(("notes.png", "image/png", b"\x89PNG")));
    let (status, _) = send(&app, upload_request(png)).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let untitled = multipart_body(None, Some("a"), Some(("notes.pdf", "application/pdf", b"%PDF")));
    let (status, _) = send(&app, upload_request(untitled)).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let payload = vec![b'%'; 4096];
    let oversized = multipart_body(Some("t"), Some("a"), Some(("notes.pdf", "application/pdf", &payload)));
    let (status, _) = send(&app, upload_request(oversized)).await;
    assert_eq!(status, StatusCode::PAYLOAD_TOO_LARGE);

    let (status, _) = send(&app, json_request("POST", "/api/pdfs/upload", None, json!({ "title": "t" }))).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let token = login(&app).await;
    let (_, all) = send(&app, empty_request("GET", "/api/pdfs/admin", Some(&token))).await;
    assert_eq!(all, json!([]));
}

#[tokio::test]
async fn test_stores_every_upload_as_pdf() {
    let (app, _dir) = default_app().await;

    let body = multipart_body(
        Some("t"),
        Some("a"),
        Some(("evil.html", "application/pdf", b"<script>alert(1)</script>")),
    );
    let (status, note) = send(&app, upload_request(body)).await;
    assert_eq!(status, StatusCode::CREATED);

    let file_url = note["fileUrl"].as_str().unwrap();
    assert!(file_url.ends_with(".pdf"));

    let res = app.clone().oneshot(empty_request("GET", file_url, None)).await.unwrap();
    assert_eq!(res.status(), StatusCode::OK);
    assert_eq!(res.headers()[CONTENT_TYPE], "application/pdf");
}

#[tokio::test]
async fn test_rejects_declared_oversized_body_as_json() {
    let dir = tempfile::tempdir().unwrap();
    let mut config = config(&dir);
    config.max_upload_bytes = 1024;
    let app = make_app(config).await;

    let payload = vec![b'%'; 200 * 1024];
    let body = multipart_body(Some("t"), Some("a"), Some(("notes.pdf", "application/pdf", &payload)));
    let request = Request::builder()
        .method("POST")
        .uri("/api/pdfs/upload")
        .header(CONTENT_TYPE, format!("multipart/form-data; boundary={BOUNDARY}"))
        .header(CONTENT_LENGTH, body.len())
        .body(Body::from(body))
        .unwrap();

    let (status, body) = send(&app, request).await;
    assert_eq!(status, StatusCode::PAYLOAD_TOO_LARGE);
    assert!(body["message"].is_string());
}

#[tokio::test]
async fn test_requires_auth_for_edits_by_default() {
    let (app, _dir) = default_app().await;
    let note = upload(&app, "Calculus", "Jane", 10).await;
    let uri = format!("/api/pdfs/{}", note["_id"].as_str().unwrap());

    let (status, _) = send(&app, json_request("PATCH", &uri, None, json!({ "title": "Hacked" }))).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let (status, _) = send(&app, empty_request("DELETE", &uri, None)).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let token = login(&app).await;
    let (status, edited) = send(&app, json_request("PUT", &uri, Some(&token), json!({ "title": "Calculus II" }))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(edited["title"], "Calculus II");
    assert_eq!(edited["author"], "Jane");
    assert_eq!(edited["_id"], note["_id"]);
    assert_eq!(edited["fileUrl"], note["fileUrl"]);
    assert_eq!(edited["createdAt"], note["createdAt"]);

    let (status, _) = send(&app, json_request("PATCH", &uri, Some(&token), json!({}))).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, _) = send(
        &app,
        json_request("PATCH", "/api/pdfs/missing", Some(&token), json!({ "title": "x" })),
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_allows_open_edits_when_unprotected() {
    let dir = tempfile::tempdir().unwrap();
    let mut config = config(&dir);
    config.protect_edits = false;
    let app = make_app(config).await;

    let note = upload(&app, "Calculus", "Jane", 10).await;
    let uri = format!("/api/pdfs/{}", note["_id"].as_str().unwrap());

    let (status, edited) = send(&app, json_request("PATCH", &uri, None, json!({ "author": "Jane Doe" }))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(edited["author"], "Jane Doe");

    let (status, _) = send(&app, empty_request("DELETE", &uri, None)).await;
    assert_eq!(status, StatusCode::OK);

    // deleting again is still a success
    let (status, _) = send(&app, empty_request("DELETE", &uri, None)).await;
    assert_eq!(status, StatusCode::OK);
}

#[tokio::test]
async fn test_hides_pending_notes_from_public_lookups() {
    let (app, _dir) = default_app().await;
    let note = upload(&app, "t", "a", 10).await;
    let uri = format!("/api/pdfs/{}", note["_id"].as_str().unwrap());

    let (status, _) = send(&app, empty_request("GET", &uri, None)).await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, fetched) = send(&app, empty_request("GET", &uri, Some(&login(&app).await))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(fetched["isApproved"], false);
}

#[tokio::test]
async fn test_searches_and_sorts_public_list() {
    let (app, _dir) = default_app().await;
    let token = login(&app).await;

    for (title, author, size) in [("Calculus", "Jane", 300), ("algebra", "Omar", 100), ("Biology", "jane", 200)] {
        let note = upload(&app, title, author, size).await;
        let uri = format!("/api/pdfs/{}/approve", note["_id"].as_str().unwrap());
        send(&app, empty_request("PATCH", &uri, Some(&token))).await;
    }

    let titles = |body: &Value| -> Vec<String> {
        body.as_array()
            .unwrap()
            .iter()
            .map(|n| n["title"].as_str().unwrap().to_string())
            .collect()
    };

    let (_, body) = send(&app, empty_request("GET", "/api/pdfs?sort=titleAsc", None)).await;
    assert_eq!(titles(&body), ["algebra", "Biology", "Calculus"]);

    let (_, body) = send(&app, empty_request("GET", "/api/pdfs?sort=sizeLarge", None)).await;
    assert_eq!(titles(&body), ["Calculus", "Biology", "algebra"]);

    let (_, body) = send(&app, empty_request("GET", "/api/pdfs?q=JANE&sort=sizeSmall", None)).await;
    assert_eq!(titles(&body), ["Biology", "Calculus"]);

    let (status, _) = send(&app, empty_request("GET", "/api/pdfs?sort=popular", None)).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_counts_concurrent_downloads() {
    let (app, _dir) = default_app().await;
    let note = upload(&app, "t", "a", 10).await;
    let uri = format!("/api/pdfs/{}/download", note["_id"].as_str().unwrap());

    let handles: Vec<_> = (0..25)
        .map(|_| {
            let app = app.clone();
            let uri = uri.clone();
            tokio::spawn(async move { app.oneshot(empty_request("POST", &uri, None)).await.unwrap().status() })
        })
        .collect();

    for handle in handles {
        assert_eq!(handle.await.unwrap(), StatusCode::OK);
    }

    let token = login(&app).await;
    let uri = format!("/api/pdfs/{}", note["_id"].as_str().unwrap());
    let (_, fetched) = send(&app, empty_request("GET", &uri, Some(&token))).await;
    assert_eq!(fetched["downloads"], 25);
}

#[tokio::test]
async fn test_accepts_unbounded_upload_limit() {
    let dir = tempfile::tempdir().unwrap();
    let mut config = config(&dir);
    config.max_upload_bytes = usize::MAX;
    let app = make_app(config).await;

    let note = upload(&app, "t", "a", 10).await;
    assert_eq!(note["fileSize"], 10);
}
