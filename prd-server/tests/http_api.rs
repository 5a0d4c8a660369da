//! HTTP API acceptance tests.
//!
//! Starts the real router on an ephemeral port with a scripted chat backend
//! and drives it with reqwest.

use std::io::Read as _;
use std::net::SocketAddr;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use prd_agents::llm::{ChatBackend, ChatRequest, LlmError};
use prd_server::config::ServerConfig;
use prd_server::server::Server;
use serde_json::{Value, json};
use tempfile::TempDir;

const DECLARED_FILES: [&str; 4] = [
    "development_guide.md",
    "product_requirements_document.md",
    "quality_review_report.md",
    "technology_stack_recommendations.md",
];

/// Answers every step with a Markdown document naming which idea it saw.
struct ScriptedBackend {
    calls: AtomicUsize,
    delay: Duration,
}

impl ScriptedBackend {
    fn new(delay_ms: u64) -> Arc<Self> {
        Arc::new(Self {
            calls: AtomicUsize::new(0),
            delay: Duration::from_millis(delay_ms),
        })
    }
}

#[async_trait]
impl ChatBackend for ScriptedBackend {
    async fn complete(&self, request: &ChatRequest) -> Result<String, LlmError> {
        let n = self.calls.fetch_add(1, Ordering::SeqCst);
        tokio::time::sleep(self.delay).await;
        let prompt = &request.messages[1].content;
        let marker = if prompt.contains("alpha") {
            "alpha"
        } else if prompt.contains("beta") {
            "beta"
        } else {
            "unknown"
        };
        Ok(format!("# Deliverable {n}\n\nGenerated for idea {marker}."))
    }
}

struct DownBackend;

#[async_trait]
impl ChatBackend for DownBackend {
    async fn complete(&self, _request: &ChatRequest) -> Result<String, LlmError> {
        Err(LlmError::Status {
            status: 503,
            body: "overloaded".into(),
        })
    }
}

/// Start a server writing into a fresh temp dir.
async fn start_server(backend: Option<Arc<dyn ChatBackend>>) -> (SocketAddr, TempDir) {
    let dir = tempfile::tempdir().unwrap();
    let config = ServerConfig {
        host: "127.0.0.1".to_string(),
        port: 0,
        output_dir: dir.path().join("outputs"),
        ..Default::default()
    };
    let server = match backend {
        Some(backend) => Server::with_backend(config, backend),
        None => Server::new(config),
    };
    let (addr, _handle) = server.start().await.unwrap();
    (addr, dir)
}

async fn generate(addr: SocketAddr, body: Value) -> reqwest::Response {
    reqwest::Client::new()
        .post(format!("http://{addr}/generate-prd"))
        .json(&body)
        .send()
        .await
        .unwrap()
}

async fn file_list(addr: SocketAddr) -> Value {
    reqwest::get(format!("http://{addr}/files"))
        .await
        .unwrap()
        .json()
        .await
        .unwrap()
}

// ── Basic endpoints ────────────────────────────────────────────────────

#[tokio::test]
async fn health_is_static() {
    let (addr, _dir) = start_server(None).await;
    let body: Value = reqwest::get(format!("http://{addr}/health"))
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(body["status"], "healthy");
    assert_eq!(body["service"], "PRD Agent System");
    assert_eq!(body["status_code"], 200);
    assert!(body["timestamp"].is_string());
    assert!(body["version"].is_string());
}

#[tokio::test]
async fn index_serves_the_form() {
    let (addr, _dir) = start_server(None).await;
    let resp = reqwest::get(format!("http://{addr}/")).await.unwrap();
    assert_eq!(resp.status(), 200);
    let html = resp.text().await.unwrap();
    assert!(html.contains("/generate-prd"));
}

// ── Generation ─────────────────────────────────────────────────────────

#[tokio::test]
async fn short_idea_is_rejected_and_writes_nothing() {
    let backend = ScriptedBackend::new(0);
    let (addr, _dir) = start_server(Some(backend.clone())).await;

    for idea in ["", "too short", "   tiny    "] {
        let resp = generate(addr, json!({ "idea_description": idea })).await;
        assert_eq!(resp.status(), 400, "idea {idea:?}");
        let body: Value = resp.json().await.unwrap();
        assert_eq!(body["detail"], "Idea description is required (minimum 10 characters)");
    }
    let resp = generate(addr, json!({})).await;
    assert_eq!(resp.status(), 400);

    assert_eq!(file_list(addr).await["total"], 0);
    assert_eq!(backend.calls.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn idea_length_counts_trimmed_characters() {
    let backend = ScriptedBackend::new(0);
    let (addr, _dir) = start_server(Some(backend.clone())).await;

    // Nine characters after trimming, however much padding surrounds them.
    for idea in ["   abcdefghi  ", "\u{e9}\u{e9}\u{e9}\u{e9}\u{e9}\u{e9}\u{e9}\u{e9}\u{e9}"] {
        let resp = generate(addr, json!({ "idea_description": idea })).await;
        assert_eq!(resp.status(), 400, "idea {idea:?}");
    }
    assert_eq!(backend.calls.load(Ordering::SeqCst), 0);

    // Exactly ten characters passes, in ASCII and multibyte form.
    for idea in ["abcdefghij", "  \u{e9}\u{e9}\u{e9}\u{e9}\u{e9}\u{1F680}\u{1F680}\u{1F680}\u{1F680}\u{1F680} "] {
        let resp = generate(addr, json!({ "idea_description": idea })).await;
        assert_eq!(resp.status(), 200, "idea {idea:?}");
    }
    assert!(backend.calls.load(Ordering::SeqCst) > 0);
}

#[tokio::test]
async fn malformed_json_is_a_bad_request() {
    let (addr, _dir) = start_server(Some(ScriptedBackend::new(0))).await;
    let resp = reqwest::Client::new()
        .post(format!("http://{addr}/generate-prd"))
        .header("content-type", "application/json")
        .body("{not json")
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 400);
    let body: Value = resp.json().await.unwrap();
    assert!(body["detail"].is_string());
}

#[tokio::test]
async fn generate_without_provider_is_500() {
    let (addr, _dir) = start_server(None).await;
    let resp = generate(addr, json!({ "idea_description": "A habit tracking app with social features" })).await;
    assert_eq!(resp.status(), 500);
    let body: Value = resp.json().await.unwrap();
    assert_eq!(body["detail"], "PRD Generator service not initialized");

    let status: Value = reqwest::get(format!("http://{addr}/status"))
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(status["state"], "unavailable");
}

#[tokio::test]
async fn generate_writes_declared_files() {
    let (addr, _dir) = start_server(Some(ScriptedBackend::new(0))).await;

    let resp = generate(
        addr,
        json!({
            "idea_description": "A habit tracking app with social features",
            "session_id": "session-42",
            "timestamp": "2026-02-01T09:30:00"
        }),
    )
    .await;
    assert_eq!(resp.status(), 200);
    let body: Value = resp.json().await.unwrap();
    assert_eq!(body["status"], "completed");
    assert_eq!(body["message"], "PRD and development guide generated successfully");
    assert_eq!(body["session_id"], "session-42");
    assert_eq!(body["timestamp"], "2026-02-01T09:30:00");
    assert!(body["result_summary"].as_str().unwrap().contains("product_requirements_document.md"));

    let list = file_list(addr).await;
    assert_eq!(list["total"], 4);
    let files = list["files"].as_array().unwrap();
    let names: Vec<&str> = files.iter().map(|f| f["filename"].as_str().unwrap()).collect();
    assert_eq!(names, DECLARED_FILES);
    for f in files {
        assert!(f["size"].as_u64().unwrap() > 0);
        let name = f["filename"].as_str().unwrap();
        assert_eq!(f["download_url"], format!("/download/{name}"));
        assert_eq!(f["copy_url"], format!("/copy/{name}"));
        assert!(chrono::DateTime::parse_from_rfc3339(f["modified"].as_str().unwrap()).is_ok());
    }

    let status: Value = reqwest::get(format!("http://{addr}/status"))
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(status["state"], "completed");
}

#[tokio::test]
async fn default_session_id_is_generated() {
    let (addr, _dir) = start_server(Some(ScriptedBackend::new(0))).await;
    let resp = generate(addr, json!({ "idea_description": "A recipe sharing platform for home cooks" })).await;
    assert_eq!(resp.status(), 200);
    let body: Value = resp.json().await.unwrap();
    assert!(body["session_id"].as_str().unwrap().starts_with("api_"));
    assert!(body["timestamp"].is_string());
}

#[tokio::test]
async fn provider_failure_is_500_with_message() {
    let (addr, _dir) = start_server(Some(Arc::new(DownBackend))).await;
    let resp = generate(addr, json!({ "idea_description": "A habit tracking app with social features" })).await;
    assert_eq!(resp.status(), 500);
    let body: Value = resp.json().await.unwrap();
    let detail = body["detail"].as_str().unwrap();
    assert!(detail.starts_with("PRD generation failed:"), "{detail}");
    assert!(detail.contains("analyze_requirements"));

    let status: Value = reqwest::get(format!("http://{addr}/status"))
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(status["state"], "failed");
    assert_eq!(status["step"], 1);
    assert_eq!(status["step_name"], "analyze_requirements");
    assert_eq!(file_list(addr).await["total"], 0);
}

#[tokio::test]
async fn concurrent_generations_leave_one_runs_files() {
    let (addr, _dir) = start_server(Some(ScriptedBackend::new(15))).await;

    let (a, b) = tokio::join!(
        generate(
            addr,
            json!({ "idea_description": "Project alpha: a habit tracker", "session_id": "run-alpha" })
        ),
        generate(
            addr,
            json!({ "idea_description": "Project beta: a budgeting tool", "session_id": "run-beta" })
        ),
    );
    assert_eq!(a.status(), 200);
    assert_eq!(b.status(), 200);

    let client = reqwest::Client::new();
    let mut markers = Vec::new();
    for name in DECLARED_FILES {
        let text = client
            .get(format!("http://{addr}/download/{name}"))
            .send()
            .await
            .unwrap()
            .text()
            .await
            .unwrap();
        let marker = if text.contains("idea alpha") {
            "alpha"
        } else if text.contains("idea beta") {
            "beta"
        } else {
            "unknown"
        };
        markers.push(marker);
    }
    assert_ne!(markers[0], "unknown");
    assert!(
        markers.iter().all(|m| *m == markers[0]),
        "artifacts mix two runs: {markers:?}"
    );
}

// ── Artifacts ──────────────────────────────────────────────────────────

#[tokio::test]
async fn download_returns_exact_bytes_or_404() {
    let (addr, dir) = start_server(None).await;
    let content = "# Notes\n\nbytes: \u{e9}\u{1F680}\n";
    std::fs::write(dir.path().join("outputs/notes.md"), content).unwrap();

    let resp = reqwest::get(format!("http://{addr}/download/notes.md")).await.unwrap();
    assert_eq!(resp.status(), 200);
    assert_eq!(resp.headers()["content-type"], "application/octet-stream");
    assert_eq!(resp.bytes().await.unwrap().as_ref(), content.as_bytes());

    let resp = reqwest::get(format!("http://{addr}/download/missing.md")).await.unwrap();
    assert_eq!(resp.status(), 404);
    let body: Value = resp.json().await.unwrap();
    assert_eq!(body["detail"], "File not found");
}

#[tokio::test]
async fn every_listed_download_url_resolves() {
    let (addr, dir) = start_server(None).await;
    let files = [("v1..final.md", "final draft"), ("plain.md", "plain")];
    for (name, content) in files {
        std::fs::write(dir.path().join("outputs").join(name), content).unwrap();
    }

    let list = file_list(addr).await;
    assert_eq!(list["total"], 2);
    for entry in list["files"].as_array().unwrap() {
        let name = entry["filename"].as_str().unwrap();
        let url = entry["download_url"].as_str().unwrap();
        let resp = reqwest::get(format!("http://{addr}{url}")).await.unwrap();
        assert_eq!(resp.status(), 200, "{url}");
        let expected = files.iter().find(|(n, _)| *n == name).unwrap().1;
        assert_eq!(resp.text().await.unwrap(), expected);

        let url = entry["copy_url"].as_str().unwrap();
        let resp = reqwest::get(format!("http://{addr}{url}")).await.unwrap();
        assert_eq!(resp.status(), 200, "{url}");
    }
}

#[tokio::test]
async fn directories_are_not_found() {
    let (addr, dir) = start_server(None).await;
    std::fs::create_dir(dir.path().join("outputs/sub")).unwrap();

    for path in ["download", "copy"] {
        let resp = reqwest::get(format!("http://{addr}/{path}/sub")).await.unwrap();
        assert_eq!(resp.status(), 404, "/{path}/sub");
        let body: Value = resp.json().await.unwrap();
        assert_eq!(body["detail"], "File not found");
    }
}

#[tokio::test]
async fn names_cannot_escape_the_output_dir() {
    let (addr, dir) = start_server(None).await;
    std::fs::write(dir.path().join("secret.md"), "top secret").unwrap();

    for path in ["download", "copy"] {
        let resp = reqwest::get(format!("http://{addr}/{path}/..%2Fsecret.md"))
            .await
            .unwrap();
        assert_eq!(resp.status(), 404, "/{path} escaped the output dir");
    }
}

#[tokio::test]
async fn copy_returns_content() {
    let (addr, dir) = start_server(None).await;
    std::fs::write(dir.path().join("outputs/guide.md"), "# Guide").unwrap();

    let body: Value = reqwest::get(format!("http://{addr}/copy/guide.md"))
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(body, json!({ "filename": "guide.md", "content": "# Guide", "size": 7 }));

    std::fs::write(dir.path().join("outputs/u.md"), "h\u{e9}llo\u{1F680}").unwrap();
    let body: Value = reqwest::get(format!("http://{addr}/copy/u.md"))
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(body["content"], "h\u{e9}llo\u{1F680}");
    assert_eq!(body["size"], 6);

    let resp = reqwest::get(format!("http://{addr}/copy/nope.md")).await.unwrap();
    assert_eq!(resp.status(), 404);
}

#[tokio::test]
async fn files_lists_only_markdown() {
    let (addr, dir) = start_server(None).await;
    std::fs::write(dir.path().join("outputs/b.md"), "b").unwrap();
    std::fs::write(dir.path().join("outputs/a.md"), "aa").unwrap();
    std::fs::write(dir.path().join("outputs/skip.txt"), "x").unwrap();

    let list = file_list(addr).await;
    assert_eq!(list["total"], 2);
    assert_eq!(list["files"][0]["filename"], "a.md");
    assert_eq!(list["files"][0]["size"], 2);
    assert_eq!(list["files"][1]["filename"], "b.md");
}

#[tokio::test]
async fn download_all_zips_markdown_files() {
    let (addr, dir) = start_server(None).await;

    let resp = reqwest::get(format!("http://{addr}/download-all")).await.unwrap();
    assert_eq!(resp.status(), 200);
    let empty = resp.bytes().await.unwrap().to_vec();
    assert_eq!(zip::ZipArchive::new(std::io::Cursor::new(empty)).unwrap().len(), 0);

    std::fs::write(dir.path().join("outputs/prd.md"), "# PRD").unwrap();
    std::fs::write(dir.path().join("outputs/guide.md"), "# Guide").unwrap();

    let resp = reqwest::get(format!("http://{addr}/download-all")).await.unwrap();
    assert_eq!(resp.headers()["content-type"], "application/zip");
    assert_eq!(
        resp.headers()["content-disposition"],
        "attachment; filename=prd_documents.zip"
    );
    let bytes = resp.bytes().await.unwrap().to_vec();
    let mut archive = zip::ZipArchive::new(std::io::Cursor::new(bytes)).unwrap();
    assert_eq!(archive.len(), 2);
    let mut content = String::new();
    archive
        .by_name("prd.md")
        .unwrap()
        .read_to_string(&mut content)
        .unwrap();
    assert_eq!(content, "# PRD");
}
