// Scenario: a token forged with a different signing algorithm than the
// service issues (but claiming the same secret) is rejected end to end
// through the `authenticate` method, not just at the `TokenService` unit
// level.

mod common;

use camera_orchestrator::config::Config;
use jsonwebtoken::{Algorithm, EncodingKey, Header};
use serde::Serialize;
use serde_json::json;
use std::sync::Arc;

#[derive(Serialize)]
struct ForgedClaims {
    sub: String,
    role: String,
    iat: i64,
    exp: i64,
}

#[tokio::test(flavor = "multi_thread")]
async fn token_signed_with_a_different_algorithm_is_rejected_over_the_wire() {
    let mut config = Config::default();
    config.mediamtx.base_url = "http://127.0.0.1".to_owned();
    config.mediamtx.api_port = 1;
    config.security.jwt_secret = "end-to-end-test-secret".to_owned();

    let secret = config.security.jwt_secret.clone();
    let probe = Arc::new(common::StubProbe::new(&[]));
    let harness = common::spawn(config, probe).await;

    let now = chrono::Utc::now().timestamp();
    let claims = ForgedClaims { sub: "attacker".to_owned(), role: "admin".to_owned(), iat: now, exp: now + 3600 };
    let forged = jsonwebtoken::encode(&Header::new(Algorithm::HS384), &claims, &EncodingKey::from_secret(secret.as_bytes()))
        .expect("encode forged token");

    let mut client = harness.connect().await;
    let response = client.authenticate(&forged).await;
    assert_eq!(response["error"]["code"], json!(-32001));

    // the connection never got authenticated, so a viewer-level method
    // still bounces with auth_required rather than running as admin.
    let status = client.call("get_system_status", json!({})).await;
    assert_eq!(status["error"]["code"], json!(-32001));

    harness.shutdown().await;
}
