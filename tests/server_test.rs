use reqwest::multipart::{Form, Part};
use serde::Deserialize;
use std::process::{Child, Command};
use std::sync::atomic::{AtomicU16, Ordering};
use std::time::Duration;

// Use atomic counter to give each test a unique port
static PORT_COUNTER: AtomicU16 = AtomicU16::new(9500);

#[derive(Debug, Deserialize)]
struct Detection {
    number_plate: String,
    confidence: f32,
    bounding_box: Option<serde_json::Value>,
}

#[derive(Debug, Deserialize)]
#[allow(dead_code)]
struct DetectResponse {
    success: bool,
    detection: Detection,
    filename: String,
    record: serde_json::Value,
}

#[derive(Debug, Deserialize)]
struct ErrorResponse {
    success: bool,
    code: String,
}

#[derive(Debug, Deserialize)]
#[allow(dead_code)]
struct InfoResponse {
    version: String,
    engine: String,
    profiles: Vec<String>,
    allowed_extensions: Vec<String>,
    max_file_size_bytes: usize,
}

#[derive(Debug, Deserialize)]
struct HealthResponse {
    status: String,
    version: String,
}

struct TestServer {
    child: Child,
    port: u16,
}

impl TestServer {
    async fn start() -> Self {
        let port = PORT_COUNTER.fetch_add(1, Ordering::SeqCst);

        let child = Command::new(env!("CARGO_BIN_EXE_plate-reader"))
            .args(["serve", "--host", "127.0.0.1", "--port", &port.to_string()])
            .spawn()
            .expect("Failed to start server");

        let server = Self { child, port };
        server.wait_ready().await;
        server
    }

    async fn wait_ready(&self) {
        let client = reqwest::Client::new();
        for _ in 0..50 {
            if client
                .get(format!("{}/health", self.base_url()))
                .send()
                .await
                .is_ok()
            {
                return;
            }
            tokio::time::sleep(Duration::from_millis(100)).await;
        }
        panic!("server on port {} did not become ready", self.port);
    }

    fn base_url(&self) -> String {
        format!("http://127.0.0.1:{}", self.port)
    }
}

impl Drop for TestServer {
    fn drop(&mut self) {
        let _ = self.child.kill();
    }
}

async fn upload(base_url: &str, filename: &str, bytes: Vec<u8>) -> reqwest::Response {
    let part = Part::bytes(bytes)
        .file_name(filename.to_string())
        .mime_str("application/octet-stream")
        .unwrap();
    let form = Form::new().part("file", part);

    reqwest::Client::new()
        .post(format!("{}/detect", base_url))
        .multipart(form)
        .send()
        .await
        .expect("Failed to send request")
}

#[tokio::test]
async fn test_health_endpoint() {
    let server = TestServer::start().await;

    let response: HealthResponse = reqwest::get(format!("{}/health", server.base_url()))
        .await
        .expect("Failed to send request")
        .json()
        .await
        .expect("Failed to parse response");

    assert_eq!(response.status, "ok");
    assert!(!response.version.is_empty());
}

#[tokio::test]
async fn test_info_endpoint() {
    let server = TestServer::start().await;

    let response: InfoResponse = reqwest::get(format!("{}/info", server.base_url()))
        .await
        .expect("Failed to send request")
        .json()
        .await
        .expect("Failed to parse response");

    assert_eq!(response.engine, "tesseract-cli");
    assert_eq!(response.max_file_size_bytes, 16 * 1024 * 1024);
    assert!(response.profiles.contains(&"single_line".to_string()));
    assert!(response.allowed_extensions.contains(&"jpeg".to_string()));
}

#[tokio::test]
async fn test_detect_rejects_unsupported_extension() {
    let server = TestServer::start().await;

    let response = upload(&server.base_url(), "notes.txt", b"hello".to_vec()).await;

    assert_eq!(response.status(), reqwest::StatusCode::BAD_REQUEST);
    let body: ErrorResponse = response.json().await.unwrap();
    assert!(!body.success);
    assert_eq!(body.code, "UNSUPPORTED_TYPE");
}

#[tokio::test]
async fn test_detect_reports_unreadable_image() {
    let server = TestServer::start().await;

    let response = upload(&server.base_url(), "car.jpg", b"not really a jpeg".to_vec()).await;

    assert!(response.status().is_success());
    let body: DetectResponse = response.json().await.unwrap();
    assert!(body.success);
    assert_eq!(body.detection.number_plate, "Error: Could not read image");
    assert_eq!(body.detection.confidence, 0.0);
    assert!(body.detection.bounding_box.is_none());
    assert!(body.filename.ends_with(".jpg"));
    assert_eq!(body.record["status"], "Failed");
}

#[tokio::test]
async fn test_detect_blank_image_reports_no_plate() {
    let server = TestServer::start().await;

    let img = image::GrayImage::from_pixel(200, 150, image::Luma([128]));
    let mut png = Vec::new();
    img.write_to(&mut std::io::Cursor::new(&mut png), image::ImageFormat::Png)
        .unwrap();

    let response = upload(&server.base_url(), "blank.png", png).await;

    let body: DetectResponse = response.json().await.unwrap();
    assert_eq!(body.detection.number_plate, "No plate detected");
}

#[tokio::test]
async fn test_lookup_and_history_start_empty() {
    let server = TestServer::start().await;
    let client = reqwest::Client::new();

    let lookup: serde_json::Value = client
        .post(format!("{}/lookup", server.base_url()))
        .json(&serde_json::json!({"plate": "TN09AB1234"}))
        .send()
        .await
        .expect("Failed to send request")
        .json()
        .await
        .expect("Failed to parse response");
    assert_eq!(lookup["found"], false);

    let _ = upload(&server.base_url(), "car.jpg", b"not really a jpeg".to_vec()).await;

    let history: serde_json::Value = client
        .get(format!("{}/history", server.base_url()))
        .send()
        .await
        .expect("Failed to send request")
        .json()
        .await
        .expect("Failed to parse response");
    assert_eq!(history["count"], 0);
    assert_eq!(history["total"], 1);
}
