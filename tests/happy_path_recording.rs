// Scenario: operator starts a recording against a connected camera and
// the media engine accepts the path, then lists it back.

mod common;

use camera_orchestrator::{auth::Role, config::Config};
use serde_json::json;
use std::sync::Arc;
use wiremock::{
    matchers::{method, path},
    Mock, MockServer, ResponseTemplate,
};

#[tokio::test(flavor = "multi_thread")]
async fn start_recording_against_a_connected_camera_succeeds() {
    let media_engine = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/v3/config/paths/get/camera0"))
        .respond_with(ResponseTemplate::new(404))
        .mount(&media_engine)
        .await;
    Mock::given(method("POST"))
        .and(path("/v3/config/paths/add/camera0"))
        .respond_with(ResponseTemplate::new(200))
        .mount(&media_engine)
        .await;
    Mock::given(method("PATCH"))
        .and(path("/v3/config/paths/patch/camera0"))
        .respond_with(ResponseTemplate::new(200))
        .mount(&media_engine)
        .await;

    let mut config = Config::default();
    config.mediamtx.base_url = format!("http://{}", media_engine.address().ip());
    config.mediamtx.api_port = media_engine.address().port();
    config.recording.path = std::env::temp_dir().join("camera-orchestrator-test-recordings");

    let probe = Arc::new(common::StubProbe::new(&[0]));
    let harness = common::spawn(config, probe).await;

    // let the monitor's first sweep discover camera0 before we touch it.
    tokio::time::timeout(std::time::Duration::from_secs(5), harness.state.monitor.subscribe_to_readiness().wait())
        .await
        .expect("monitor never completed its first sweep");

    let mut client = harness.connect().await;
    let token = harness.state.tokens.issue("operator-1", Role::Operator).unwrap();
    let auth = client.authenticate(&token).await;
    assert!(auth["result"]["authenticated"].as_bool().unwrap());

    let response = client
        .call("start_recording", json!({ "device": "camera0" }))
        .await;
    assert!(response.get("error").is_none(), "unexpected error: {response:?}");
    assert_eq!(response["result"]["status"], json!("recording"));
    let session_id = response["result"]["id"].as_str().unwrap().to_owned();

    let listed = client.call("list_recordings", json!({})).await;
    let recordings = listed["result"]["recordings"].as_array().unwrap();
    assert!(recordings.iter().any(|session| session["id"] == session_id));

    harness.shutdown().await;
}
