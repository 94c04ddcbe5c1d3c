//! Upload service integration tests
//!
//! Each test binds a server on an OS-assigned port, backed by an in-memory
//! store, and talks to it over real HTTP.

use kb_uploadr::config::Config;
use kb_uploadr::s3::MemoryStore;
use kb_uploadr::server::Server;
use reqwest::multipart::{Form, Part};
use serde_json::Value;
use std::net::SocketAddr;
use std::sync::Arc;

fn test_config() -> Config {
    let mut config = Config::for_bucket("kb", "us-east-1");
    config.server.address = "127.0.0.1:0".into();
    config
}

async fn start(config: Config, store: Arc<MemoryStore>) -> SocketAddr {
    let server = Server::new(&config, store)
        .await
        .expect("Failed to create server");
    let addr = server.local_addr();
    tokio::spawn(async move { server.run().await });
    addr
}

fn upload_form(filename: &str, body: &'static [u8], category: &str) -> Form {
    Form::new()
        .part(
            "file",
            Part::bytes(body)
                .file_name(filename.to_string())
                .mime_str("application/pdf")
                .unwrap(),
        )
        .text("type", category.to_string())
}

#[tokio::test]
async fn test_root_and_health() {
    let addr = start(test_config(), Arc::new(MemoryStore::new("kb"))).await;
    let client = reqwest::Client::new();

    let root: Value = client
        .get(format!("http://{}/", addr))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(root["status"], "healthy");
    assert!(root["service"].is_string());

    let response = client
        .get(format!("http://{}/health", addr))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), 200);
    let health: Value = response.json().await.unwrap();
    assert_eq!(health, serde_json::json!({ "status": "ok" }));
}

#[tokio::test]
async fn test_get_upload_url_personality() {
    let addr = start(test_config(), Arc::new(MemoryStore::new("kb"))).await;

    let response = reqwest::Client::new()
        .post(format!("http://{}/api/get-upload-url", addr))
        .multipart(upload_form("x.pdf", b"whatever the content is", "personality"))
        .send()
        .await
        .unwrap();

    assert_eq!(response.status(), 200);
    let body: Value = response.json().await.unwrap();
    assert_eq!(body["key"], "personality/x.pdf");
    assert!(body["uploadUrl"]
        .as_str()
        .unwrap()
        .starts_with("memory://kb/personality/x.pdf"));
    assert!(body["expiresAt"].is_string());
    assert!(body.get("language").is_none());
}

#[tokio::test]
async fn test_get_upload_url_tier_routes_by_language() {
    let addr = start(test_config(), Arc::new(MemoryStore::new("kb"))).await;

    let text: &'static [u8] = "Financial planning is essential to reach economic freedom. \
        It is important to save part of your income every month and to diversify your \
        investments in order to reduce long term risks."
        .as_bytes();
    let form = Form::new()
        .part("file", Part::bytes(text).file_name("plan.txt"))
        .text("type", "Tier2");

    let body: Value = reqwest::Client::new()
        .post(format!("http://{}/api/get-upload-url", addr))
        .multipart(form)
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();

    assert_eq!(body["key"], "Tier 2-english/plan.txt");
    assert_eq!(body["language"], "english");
}

#[tokio::test]
async fn test_get_upload_url_missing_type() {
    let addr = start(test_config(), Arc::new(MemoryStore::new("kb"))).await;

    let form = Form::new().part("file", Part::bytes(&b"data"[..]).file_name("x.pdf"));
    let response = reqwest::Client::new()
        .post(format!("http://{}/api/get-upload-url", addr))
        .multipart(form)
        .send()
        .await
        .unwrap();

    assert_eq!(response.status(), 400);
    let body: Value = response.json().await.unwrap();
    assert_eq!(body["code"], "missing_field");
}

#[tokio::test]
async fn test_get_upload_url_storage_unavailable() {
    let store = Arc::new(MemoryStore::new("kb"));
    store.disable_presign();
    let addr = start(test_config(), store).await;

    let response = reqwest::Client::new()
        .post(format!("http://{}/api/get-upload-url", addr))
        .multipart(upload_form("x.pdf", b"data", "personality"))
        .send()
        .await
        .unwrap();

    assert_eq!(response.status(), 502);
    let body: Value = response.json().await.unwrap();
    assert_eq!(body["code"], "storage_unavailable");
}

#[tokio::test]
async fn test_get_upload_url_too_large() {
    let mut config = test_config();
    config.server.max_upload_bytes = 1024;
    let addr = start(config, Arc::new(MemoryStore::new("kb"))).await;

    static BIG: [u8; 8192] = [b'a'; 8192];
    let response = reqwest::Client::new()
        .post(format!("http://{}/api/get-upload-url", addr))
        .multipart(upload_form("big.pdf", &BIG, "personality"))
        .send()
        .await
        .unwrap();

    assert_eq!(response.status(), 413);
}

#[tokio::test]
async fn test_cors_allows_any_origin() {
    let addr = start(test_config(), Arc::new(MemoryStore::new("kb"))).await;

    let response = reqwest::Client::new()
        .get(format!("http://{}/health", addr))
        .header("Origin", "https://kb.example.com")
        .send()
        .await
        .unwrap();

    assert_eq!(
        response
            .headers()
            .get("access-control-allow-origin")
            .unwrap(),
        "*"
    );
}

#[tokio::test]
async fn test_upload_page_served() {
    let addr = start(test_config(), Arc::new(MemoryStore::new("kb"))).await;

    let response = reqwest::get(format!("http://{}/ui", addr)).await.unwrap();
    assert_eq!(response.status(), 200);
    let html = response.text().await.unwrap();
    assert!(html.contains("Tier 1 Documents"));
}

#[cfg(feature = "metrics")]
#[tokio::test]
async fn test_metrics_endpoint() {
    let addr = start(test_config(), Arc::new(MemoryStore::new("kb"))).await;
    let client = reqwest::Client::new();

    client
        .post(format!("http://{}/api/get-upload-url", addr))
        .multipart(upload_form("m.pdf", b"data", "instructions"))
        .send()
        .await
        .unwrap();

    let text = client
        .get(format!("http://{}/metrics", addr))
        .send()
        .await
        .unwrap()
        .text()
        .await
        .unwrap();
    assert!(text.contains("kb_upload_authorizations_total"));
}

#[tokio::test]
async fn test_metrics_disabled() {
    let mut config = test_config();
    config.metrics.enabled = false;
    let addr = start(config, Arc::new(MemoryStore::new("kb"))).await;

    let response = reqwest::get(format!("http://{}/metrics", addr)).await.unwrap();
    assert_eq!(response.status(), 404);
}
