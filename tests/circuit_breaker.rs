// Scenario: the media engine is unreachable. The first calls surface a
// transport-level failure; once consecutive failures cross the configured
// threshold the breaker opens and further calls fail fast with
// `circuit open` instead of dialing out again.

mod common;

use camera_orchestrator::{auth::Role, config::Config};
use serde_json::json;
use std::sync::Arc;

#[tokio::test(flavor = "multi_thread")]
async fn repeated_failures_trip_the_circuit_breaker() {
    let mut config = Config::default();
    // nothing listens here; every call fails at connect.
    config.mediamtx.base_url = "http://127.0.0.1".to_owned();
    config.mediamtx.api_port = 1;
    config.mediamtx.retry_attempts = 1;
    config.mediamtx.circuit_failure_threshold = 2;
    config.mediamtx.circuit_recovery_timeout = std::time::Duration::from_secs(60).into();

    let probe = Arc::new(common::StubProbe::new(&[]));
    let harness = common::spawn(config, probe).await;

    let mut client = harness.connect().await;
    let token = harness.state.tokens.issue("admin-1", Role::Admin).unwrap();
    client.authenticate(&token).await;

    let first = client.call("get_metrics", json!({})).await;
    assert!(first.get("error").is_some());
    let second = client.call("get_metrics", json!({})).await;
    assert!(second.get("error").is_some());

    // threshold crossed on the second failure; the third call never
    // dials out, it fails fast from the breaker itself.
    let third = client.call("get_metrics", json!({})).await;
    assert_eq!(third["error"]["code"], json!(-32020));
    assert_eq!(third["error"]["message"], json!("circuit open"));

    harness.shutdown().await;
}
