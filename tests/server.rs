//! End-to-end tests for the HTTP server with a scripted generator.

use std::collections::VecDeque;
use std::fs;
use std::path::PathBuf;
use std::sync::{Arc, Mutex};

use anyhow::Result;
use async_trait::async_trait;
use crm_filler::config::{Config, ExtractionConfig, LlmConfig, ServerConfig, StoreConfig};
use crm_filler::llm::Generator;
use crm_filler::server::run_server_with_service;
use crm_filler::service::CrmService;
use serde_json::{json, Value};
use tempfile::TempDir;

/// Replies from a fixed script; once it runs out, repeats the last reply.
struct ScriptedGenerator {
    replies: Mutex<VecDeque<String>>,
    last: Mutex<String>,
}

impl ScriptedGenerator {
    fn new(replies: &[&str]) -> Self {
        Self {
            replies: Mutex::new(replies.iter().map(|r| r.to_string()).collect()),
            last: Mutex::new(String::new()),
        }
    }
}

#[async_trait]
impl Generator for ScriptedGenerator {
    fn model_name(&self) -> &str {
        "scripted"
    }

    async fn generate(&self, _system: &str, _user: &str) -> Result<String> {
        let next = self.replies.lock().unwrap().pop_front();
        let mut last = self.last.lock().unwrap();
        if let Some(reply) = next {
            *last = reply;
        }
        Ok(last.clone())
    }
}

fn find_free_port() -> u16 {
    let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
    listener.local_addr().unwrap().port()
}

async fn wait_for_server(port: u16) {
    let client = reqwest::Client::new();
    let url = format!("http://127.0.0.1:{}/health", port);
    for _ in 0..50 {
        tokio::time::sleep(std::time::Duration::from_millis(100)).await;
        if let Ok(resp) = client.get(&url).send().await {
            if resp.status().is_success() {
                return;
            }
        }
    }
    panic!("Server did not become ready within 5 seconds");
}

fn test_config(tmp: &TempDir, port: u16) -> Config {
    let data_dir = tmp.path().join("data");
    fs::create_dir_all(&data_dir).unwrap();
    fs::write(
        data_dir.join("existing_companies.json"),
        r#"[{"company_id": "CO-2001", "name": "Mercury Consultants", "industry": "IT Services",
             "size": "500", "location": "Pune"}]"#,
    )
    .unwrap();

    Config {
        store: StoreConfig {
            dir: PathBuf::from(&data_dir),
            companies: None,
            contacts: None,
            deals: None,
            meetings: None,
        },
        llm: LlmConfig {
            provider: "openai".to_string(),
            model: "scripted".to_string(),
            url: None,
            temperature: 0.0,
            max_output_tokens: 1024,
            timeout_secs: 5,
        },
        extraction: ExtractionConfig {
            max_attempts: 3,
            retry_delay_ms: 0,
        },
        server: ServerConfig {
            bind: format!("127.0.0.1:{}", port),
        },
    }
}

async fn start(tmp: &TempDir, replies: &[&str]) -> (u16, tokio::task::JoinHandle<()>) {
    let port = find_free_port();
    let cfg = test_config(tmp, port);
    let generator = Arc::new(ScriptedGenerator::new(replies));
    let service = Arc::new(CrmService::with_generator(&cfg, generator));

    let bind = cfg.server.bind.clone();
    let handle = tokio::spawn(async move {
        run_server_with_service(&bind, service).await.ok();
    });
    wait_for_server(port).await;
    (port, handle)
}

#[tokio::test]
async fn test_health_reports_version() {
    let tmp = TempDir::new().unwrap();
    let (port, server_handle) = start(&tmp, &[]).await;

    let body: Value = reqwest::get(format!("http://127.0.0.1:{}/health", port))
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(body["status"], "ok");
    assert_eq!(body["version"], env!("CARGO_PKG_VERSION"));

    server_handle.abort();
}

#[tokio::test]
async fn test_extract_then_apply_round_trip() {
    let tmp = TempDir::new().unwrap();
    let reply = json!({
        "companies": [{"temp_id": "co1", "existing_id": "CO-2001", "name": "Mercury Consultants",
                       "industry": "IT Services", "size": "500", "location": "Pune"}],
        "contacts": [{"temp_id": "c1", "existing_id": null, "name": "Sonal",
                      "job_title": "Compliance Head", "email": "", "phone": "",
                      "decision_power": "maybe"}],
        "deals": [],
        "actions": [{"entity": "contact", "operation": "create", "target_temp_id": "c1",
                     "reason": "New stakeholder"}]
    })
    .to_string();
    let (port, server_handle) = start(&tmp, &["garbage", reply.as_str()]).await;
    let client = reqwest::Client::new();

    let resp = client
        .post(format!("http://127.0.0.1:{}/extract", port))
        .json(&json!({
            "meeting_text": "Sonal flagged DPDP compliance timelines.",
            "company_name": "Mercury Consulting"
        }))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 200);
    let body: Value = resp.json().await.unwrap();
    let extracted = body["extracted"].clone();
    assert_eq!(extracted["contacts"][0]["name"], "Sonal");

    let resp = client
        .post(format!("http://127.0.0.1:{}/apply", port))
        .json(&json!({ "gpt_json": extracted }))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 200);
    let body: Value = resp.json().await.unwrap();
    assert_eq!(body["mapping"], json!({"co1": "CO-2001", "c1": "C-2001"}));
    assert_eq!(body["warnings"], json!([]));
    assert_eq!(body["crm_state"]["contacts"][0]["company_id"], "CO-2001");

    let state: Value = client
        .get(format!("http://127.0.0.1:{}/crm-state", port))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(state, body["crm_state"]);

    server_handle.abort();
}

#[tokio::test]
async fn test_extract_falls_back_to_empty_result() {
    let tmp = TempDir::new().unwrap();
    let (port, server_handle) = start(&tmp, &["no json here"]).await;

    let body: Value = reqwest::Client::new()
        .post(format!("http://127.0.0.1:{}/extract", port))
        .json(&json!({"meeting_text": "Short call."}))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(
        body["extracted"],
        json!({"contacts": [], "companies": [], "deals": [], "actions": []})
    );

    server_handle.abort();
}

#[tokio::test]
async fn test_empty_meeting_text_is_bad_request() {
    let tmp = TempDir::new().unwrap();
    let (port, server_handle) = start(&tmp, &[]).await;

    let resp = reqwest::Client::new()
        .post(format!("http://127.0.0.1:{}/extract", port))
        .json(&json!({"meeting_text": "   "}))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 400);
    let body: Value = resp.json().await.unwrap();
    assert_eq!(body["error"]["code"], "bad_request");

    server_handle.abort();
}

#[tokio::test]
async fn test_apply_table_payload_and_bad_payloads() {
    let tmp = TempDir::new().unwrap();
    let (port, server_handle) = start(&tmp, &[]).await;
    let client = reqwest::Client::new();
    let url = format!("http://127.0.0.1:{}/apply", port);

    let body: Value = client
        .post(&url)
        .json(&json!({"gpt_json": {
            "company": [{"name": "Venus Logistics"}],
            "deal": [{"name": "Fleet tracking", "competitors": "Acme"}]
        }}))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(body["mapping"], json!({"co1": "CO-2002", "d1": "D-2001"}));
    assert_eq!(body["crm_state"]["deals"][0]["company_name"], "Venus Logistics");

    for bad in [json!({}), json!("text"), json!({"unrelated": true})] {
        let resp = client
            .post(&url)
            .json(&json!({ "gpt_json": bad }))
            .send()
            .await
            .unwrap();
        assert_eq!(resp.status(), 400, "payload {} accepted", bad);
        let body: Value = resp.json().await.unwrap();
        assert_eq!(body["error"]["code"], "bad_request");
    }

    server_handle.abort();
}

#[tokio::test]
async fn test_cors_allows_any_origin() {
    let tmp = TempDir::new().unwrap();
    let (port, server_handle) = start(&tmp, &[]).await;

    let resp = reqwest::Client::new()
        .get(format!("http://127.0.0.1:{}/crm-state", port))
        .header("Origin", "http://example.test")
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 200);
    assert_eq!(
        resp.headers()
            .get("access-control-allow-origin")
            .and_then(|v| v.to_str().ok()),
        Some("*")
    );

    server_handle.abort();
}
