//! HTTP server tests: a real listener on a free port, driven with reqwest.

mod common;

use reqwest::multipart::{Form, Part};
use serde_json::Value;
use tempfile::TempDir;

use docingest::config::Config;
use docingest::server::run_server;

use common::{encrypted_pdf, pdf_with_pages, test_config};

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

async fn start(cfg: Config, port: u16) -> tokio::task::JoinHandle<()> {
    let handle = tokio::spawn(async move {
        run_server(&cfg).await.ok();
    });
    wait_for_server(port).await;
    handle
}

fn pdf_form(bytes: Vec<u8>, filename: &str, mime: &str) -> Form {
    Form::new().part(
        "file",
        Part::bytes(bytes)
            .file_name(filename.to_string())
            .mime_str(mime)
            .unwrap(),
    )
}

#[tokio::test]
async fn test_health() {
    let port = find_free_port();
    let tmp = TempDir::new().unwrap();
    let cfg = test_config(&tmp, "", &format!("[server]\nbind = \"127.0.0.1:{}\"", port));
    let server = start(cfg, port).await;

    let body: Value = reqwest::get(format!("http://127.0.0.1:{}/health", port))
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(body["status"], "ok");
    assert_eq!(body["version"], env!("CARGO_PKG_VERSION"));

    server.abort();
}

#[tokio::test]
async fn test_upload_then_fetch() {
    let port = find_free_port();
    let tmp = TempDir::new().unwrap();
    let cfg = test_config(&tmp, "", &format!("[server]\nbind = \"127.0.0.1:{}\"", port));
    let server = start(cfg, port).await;
    let client = reqwest::Client::new();

    let form = pdf_form(
        pdf_with_pages(&["Quarterly revenue grew by ten percent.\nCosts stayed flat."]),
        "q3.pdf",
        "application/pdf",
    )
    .text("title", "Q3 Report")
    .text("user_id", "analyst-1");
    let resp = client
        .post(format!("http://127.0.0.1:{}/documents", port))
        .multipart(form)
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 201);
    let body: Value = resp.json().await.unwrap();
    assert_eq!(body["status"], "completed");
    assert_eq!(body["chunk_count"], 1);
    assert_eq!(body["page_count"], 1);
    let id = body["document_id"].as_str().unwrap().to_string();

    let resp = client
        .get(format!("http://127.0.0.1:{}/documents/{}", port, id))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 200);
    let doc: Value = resp.json().await.unwrap();
    assert_eq!(doc["title"], "Q3 Report");
    assert_eq!(doc["user_id"], "analyst-1");
    assert_eq!(doc["status"], "completed");
    assert_eq!(doc["chunks"].as_array().unwrap().len(), 1);
    assert!(doc["chunks"][0]["text"]
        .as_str()
        .unwrap()
        .contains("Quarterly revenue"));

    server.abort();
}

#[tokio::test]
async fn test_upload_errors() {
    let port = find_free_port();
    let tmp = TempDir::new().unwrap();
    let cfg = test_config(&tmp, "", &format!("[server]\nbind = \"127.0.0.1:{}\"", port));
    let server = start(cfg, port).await;
    let client = reqwest::Client::new();
    let url = format!("http://127.0.0.1:{}/documents", port);

    // Encrypted: 400 with a recorded failed document.
    let resp = client
        .post(&url)
        .multipart(pdf_form(encrypted_pdf("Hidden."), "x.pdf", "application/pdf"))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 400);
    let body: Value = resp.json().await.unwrap();
    assert_eq!(body["error"]["code"], "encrypted");
    let id = body["error"]["document_id"].as_str().unwrap().to_string();

    let doc: Value = client
        .get(format!("http://127.0.0.1:{}/documents/{}", port, id))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(doc["status"], "failed");
    assert_eq!(doc["chunks"].as_array().unwrap().len(), 0);

    // Wrong declared type.
    let resp = client
        .post(&url)
        .multipart(pdf_form(pdf_with_pages(&["Text."]), "x.txt", "text/plain"))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 400);
    let body: Value = resp.json().await.unwrap();
    assert_eq!(body["error"]["code"], "invalid_type");

    // No file part at all.
    let resp = client
        .post(&url)
        .multipart(Form::new().text("title", "nothing"))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 400);
    let body: Value = resp.json().await.unwrap();
    assert_eq!(body["error"]["code"], "bad_request");

    // Unknown document.
    let resp = client
        .get(format!("http://127.0.0.1:{}/documents/does-not-exist", port))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 404);
    let body: Value = resp.json().await.unwrap();
    assert_eq!(body["error"]["code"], "not_found");

    server.abort();
}

#[tokio::test]
async fn test_oversized_upload_is_413() {
    let port = find_free_port();
    let tmp = TempDir::new().unwrap();
    let pdf = pdf_with_pages(&["This upload is one byte over the configured limit."]);
    let extra = format!(
        "[upload]\nmax_bytes = {}\n\n[server]\nbind = \"127.0.0.1:{}\"",
        pdf.len() - 1,
        port
    );
    let cfg = test_config(&tmp, "", &extra);
    let server = start(cfg, port).await;

    let resp = reqwest::Client::new()
        .post(format!("http://127.0.0.1:{}/documents", port))
        .multipart(pdf_form(pdf, "big.pdf", "application/pdf"))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 413);
    let body: Value = resp.json().await.unwrap();
    assert_eq!(body["error"]["code"], "too_large");
    assert!(body["error"]["document_id"].is_string());

    server.abort();
}
