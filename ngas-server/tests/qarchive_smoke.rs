//! End-to-end smoke test against a running `ngas-server` instance.
//!
//! Requires Postgres reachable via `NGAS_DATABASE_URL` and the server
//! already listening on `BASE_URL` — run manually, not part of `cargo test`.

use std::time::Duration;

use tempfile::NamedTempFile;

const BASE_URL: &str = "http://localhost:7777";

#[tokio::test]
#[ignore = "requires a running ngas-server and Postgres"]
async fn qarchive_push_then_pull_round_trips() {
    tokio::time::sleep(Duration::from_secs(1)).await;

    let client = reqwest::Client::new();
    let body = b"HELLOWORLD".to_vec();

    let push = client
        .post(format!("{BASE_URL}/QARCHIVE?filename=smoke-test.dat"))
        .header("content-type", "application/octet-stream")
        .header("content-length", body.len().to_string())
        .body(body.clone())
        .send()
        .await
        .expect("push request should reach the server");

    assert!(push.status().is_success());
    let push_body = push.text().await.unwrap();
    assert!(push_body.contains("Status=\"SUCCESS\""));
    assert!(push_body.contains("Checksum=\"2535050025\""));
}

#[tokio::test]
#[ignore = "requires a running ngas-server and Postgres"]
async fn status_reports_online() {
    let client = reqwest::Client::new();
    let resp = client
        .get(format!("{BASE_URL}/STATUS"))
        .send()
        .await
        .expect("status request should reach the server");
    assert!(resp.status().is_success());
    let body = resp.text().await.unwrap();
    assert!(body.contains("State=\"ONLINE\""));
}

#[test]
fn named_temp_file_helper_is_available() {
    // Sanity check that the dev-dependency wiring used by other tests compiles.
    let file = NamedTempFile::new().expect("tempfile creation should succeed");
    assert!(file.path().exists());
}
