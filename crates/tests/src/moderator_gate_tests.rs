use serde_json::json;

use crate::fixtures::{make_token, TestApp, WsClient};

/// Scenario 6 (spec.md §8): only an admin-authenticated client may join as
/// moderator.
#[tokio::test]
async fn moderator_gate() {
    let app = TestApp::spawn_with(|s| s.auth.enable_auth = true).await;

    let admin_token = make_token("admin-user", true);
    let plain_token = make_token("plain-user", false);

    let mut plain = WsClient::connect(&app.ws_url(Some(&plain_token))).await;
    plain.recv_type("id").await;
    plain.send("join", json!({ "room": "R", "role": "moderator" })).await;
    let err = plain.recv_type("error").await;
    assert_eq!(err["message"], "policy: only admin users can join as moderator");

    let mut admin = WsClient::connect(&app.ws_url(Some(&admin_token))).await;
    let id_msg = admin.recv_type("id").await;
    let admin_client_id = id_msg["id"].as_str().unwrap().to_string();

    admin.send("join", json!({ "room": "R", "role": "moderator" })).await;
    let joined = admin.recv_type("joined").await;
    assert_eq!(joined["role"], "moderator");

    admin.send("admin.roomInfo", json!({ "room": "R" })).await;
    let info = admin.recv_type("admin.roomInfo").await;
    let members = info["members"].as_array().unwrap();
    assert!(members.iter().any(|m| m == admin_client_id.as_str()));
}

/// A missing or invalid bearer token does not block the upgrade; the
/// channel opens, receives `error{"unauthorized"}`, then closes (spec.md
/// §6, §4.5's state machine).
#[tokio::test]
async fn unauthenticated_upgrade_is_closed_after_an_error_frame() {
    let app = TestApp::spawn_with(|s| s.auth.enable_auth = true).await;

    let mut client = WsClient::connect(&app.ws_url(None)).await;
    let err = client.recv_type("error").await;
    assert_eq!(err["message"], "auth: unauthorized");
    client.expect_close().await;
}
