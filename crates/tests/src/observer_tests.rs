use serde_json::json;

use crate::fixtures::{TestApp, WsClient};

/// Scenario 3 (spec.md §8): an observer's `sfu.produce` is rejected by the
/// role check, before the adapter ever looks at the (here, bogus)
/// transport id or RTP parameters. Requires the media engine enabled since
/// the feature-availability check runs ahead of the role check (spec.md
/// §4.4's validation order) and would otherwise short-circuit first.
#[tokio::test]
async fn observer_cannot_produce() {
    let app = TestApp::spawn_with(|s| s.sfu.enabled = true).await;

    let mut observer = WsClient::connect(&app.ws_url(None)).await;
    observer.recv_type("id").await;
    observer.send("join", json!({ "room": "R", "role": "observer" })).await;
    observer.recv_type("joined").await;
    observer.recv_type("sfu.producers").await;

    observer
        .send(
            "sfu.produce",
            json!({
                "transportId": "nonexistent",
                "kind": "video",
                "rtpParameters": {},
                "room": "R",
            }),
        )
        .await;

    let err = observer.recv_type("error").await;
    assert_eq!(err["message"], "policy: observers cannot produce");
}

/// A room that disallows observers must refuse the join outright, and must
/// not leave behind an empty room created just to run the policy check
/// against (spec.md §8 invariant 4).
#[tokio::test]
async fn observers_disallowed_by_room_policy() {
    let app = TestApp::spawn_with(|s| s.room.allow_observers = false).await;

    let mut observer = WsClient::connect(&app.ws_url(None)).await;
    observer.recv_type("id").await;
    observer.send("join", json!({ "room": "R", "role": "observer" })).await;

    let err = observer.recv_type("error").await;
    assert_eq!(err["message"], "policy: observers are not allowed in this room");

    observer.send("rooms", json!({})).await;
    let rooms = observer.recv_type("rooms").await;
    assert_eq!(rooms["rooms"].as_array().unwrap().len(), 0);
}
