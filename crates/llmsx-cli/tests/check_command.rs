#![allow(missing_docs, clippy::expect_used, clippy::unwrap_used)]

use std::time::Duration;

use predicates::prelude::*;
use serde_json::Value;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

mod common;
use common::llmsx_cmd;

#[tokio::test]
async fn check_reports_published_manifest() -> anyhow::Result<()> {
    let server = MockServer::start().await;
    Mock::given(method("HEAD"))
        .and(path("/llms-full.txt"))
        .respond_with(ResponseTemplate::new(200))
        .mount(&server)
        .await;

    let output = llmsx_cmd()
        .args(["check", &server.uri(), "-f", "json"])
        .assert()
        .success()
        .get_output()
        .stdout
        .clone();
    let json: Value = serde_json::from_slice(&output)?;

    assert_eq!(json["exists"], true);
    assert_eq!(json["sourceUrl"], format!("{}/llms-full.txt", server.uri()));
    Ok(())
}

#[tokio::test]
async fn check_without_manifest_exits_3() {
    let server = MockServer::start().await;

    llmsx_cmd()
        .args(["check", &server.uri(), "--format", "text"])
        .assert()
        .code(3)
        .stdout(predicate::str::contains("publishes no llms.txt manifest"));
}

#[tokio::test]
async fn check_that_times_out_exits_6() {
    let server = MockServer::start().await;
    Mock::given(method("HEAD"))
        .respond_with(ResponseTemplate::new(200).set_delay(Duration::from_secs(2)))
        .mount(&server)
        .await;

    llmsx_cmd()
        .env("LLMSX_FETCH_TIMEOUT_MS", "100")
        .args(["check", &server.uri(), "--format", "json"])
        .assert()
        .code(6)
        .stdout(predicate::str::is_empty())
        .stderr(predicate::str::contains("timeout"));
}

#[test]
fn check_rejects_non_http_scheme() {
    llmsx_cmd()
        .args(["check", "file:///etc/passwd"])
        .assert()
        .code(2);
}
