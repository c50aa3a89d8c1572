#![allow(missing_docs, clippy::expect_used, clippy::unwrap_used)]

use std::fs;

use predicates::prelude::*;
use serde_json::Value;
use tempfile::tempdir;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

mod common;
use common::llmsx_cmd;

const MANIFEST: &str = "# Hono\n\nIntro text\n\n## Routing\n\nRoutes\n\n## Middleware\n\nLayers";

async fn manifest_server() -> MockServer {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/llms-full.txt"))
        .respond_with(ResponseTemplate::new(404))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/llms.txt"))
        .respond_with(ResponseTemplate::new(200).set_body_string(MANIFEST))
        .mount(&server)
        .await;
    server
}

#[tokio::test]
async fn extract_prints_json_result() -> anyhow::Result<()> {
    let server = manifest_server().await;

    let output = llmsx_cmd()
        .args(["extract", &server.uri(), "--format", "json"])
        .assert()
        .success()
        .get_output()
        .stdout
        .clone();
    let json: Value = serde_json::from_slice(&output)?;

    assert_eq!(json["url"], server.uri());
    assert!(json["sourceUrl"].as_str().unwrap().ends_with("/llms.txt"));
    assert_eq!(json["stats"]["documentCount"], 3);

    let titles: Vec<_> = json["documents"]
        .as_array()
        .unwrap()
        .iter()
        .map(|doc| doc["title"].as_str().unwrap().to_string())
        .collect();
    assert_eq!(titles, ["Hono", "Routing", "Middleware"]);
    Ok(())
}

#[tokio::test]
async fn extract_writes_documents_to_out_dir() -> anyhow::Result<()> {
    let server = manifest_server().await;
    let out = tempdir()?;
    let dir = out.path().join("hono");

    llmsx_cmd()
        .args(["extract", &server.uri(), "--format", "text", "--out"])
        .arg(&dir)
        .assert()
        .success()
        .stdout(predicate::str::contains("3 documents"))
        .stdout(predicate::str::contains("Wrote 5 files"));

    for name in ["01-hono.md", "02-routing.md", "03-middleware.md", "llms-full.md", "AGENT_GUIDE.md"] {
        assert!(dir.join(name).is_file(), "missing {name}");
    }
    assert!(fs::read_to_string(dir.join("02-routing.md"))?.starts_with("# Routing\n"));
    assert!(fs::read_to_string(dir.join("AGENT_GUIDE.md"))?.contains("03-middleware.md"));
    Ok(())
}

#[tokio::test]
async fn missing_manifest_exits_not_found() {
    let server = MockServer::start().await;

    llmsx_cmd()
        .args(["extract", &server.uri(), "--format", "json"])
        .assert()
        .code(3)
        .stderr(predicate::str::contains("llms.txt"));
}

#[test]
fn invalid_url_is_a_usage_error() {
    llmsx_cmd()
        .args(["extract", "ftp://example.com", "--format", "json"])
        .assert()
        .code(2)
        .stdout(predicate::str::is_empty());
}

#[test]
fn zero_rate_limit_override_is_a_usage_error() {
    llmsx_cmd()
        .env("LLMSX_RATE_LIMIT", "0")
        .args(["extract", "example.com"])
        .assert()
        .code(2)
        .stderr(predicate::str::contains("rate_limit.limit"));
}
