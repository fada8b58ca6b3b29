use serde_json::json;

use crate::fixtures::{TestApp, WsClient};

/// Round-trip law (spec.md §8): `join(room) → leaveRoom(room)` returns
/// membership to its pre-join content.
#[tokio::test]
async fn leave_room_round_trip_restores_membership() {
    let app = TestApp::spawn().await;

    let mut a = WsClient::connect(&app.ws_url(None)).await;
    a.recv_type("id").await;
    a.send("join", json!({ "room": "R", "role": "publisher" })).await;
    a.recv_type("joined").await;

    a.send("rooms", json!({})).await;
    let before = a.recv_type("rooms").await;
    assert_eq!(before["rooms"][0]["count"], 1);

    a.send("leaveRoom", json!({ "room": "R" })).await;
    a.recv_type("left").await;

    a.send("rooms", json!({})).await;
    let after = a.recv_type("rooms").await;
    assert_eq!(after["rooms"].as_array().unwrap().len(), 0);
}

/// Scenario 4 (spec.md §8), membership/ownership half: when the owner's
/// channel closes, the room keeps its remaining member and reassigns
/// `ownerId`, and that remaining member is told who left.
#[tokio::test]
async fn disconnect_reassigns_owner_and_notifies_remaining_member() {
    let app = TestApp::spawn().await;

    let mut a = WsClient::connect(&app.ws_url(None)).await;
    let a_id = a.recv_type("id").await["id"].as_str().unwrap().to_string();
    a.send("join", json!({ "room": "R", "role": "publisher" })).await;
    a.recv_type("joined").await;

    let mut b = WsClient::connect(&app.ws_url(None)).await;
    b.recv_type("id").await;
    b.send("join", json!({ "room": "R", "role": "publisher" })).await;
    b.recv_type("joined").await;
    a.recv_type("member-joined").await;

    drop(a);

    let member_left = b.recv_type("member-left").await;
    assert_eq!(member_left["id"], a_id);

    b.send("admin.roomInfo", json!({ "room": "R" })).await;
    let err = b.recv_type("error").await;
    assert!(err["message"].as_str().unwrap().contains("admin"));
}

/// A room with no members left must not be observable afterward (spec.md
/// §8 invariant 4).
#[tokio::test]
async fn room_is_deleted_once_empty() {
    let app = TestApp::spawn().await;

    let mut a = WsClient::connect(&app.ws_url(None)).await;
    a.recv_type("id").await;
    a.send("join", json!({ "room": "solo", "role": "publisher" })).await;
    a.recv_type("joined").await;
    a.send("leaveRoom", json!({ "room": "solo" })).await;
    a.recv_type("left").await;

    a.send("rooms", json!({})).await;
    let rooms = a.recv_type("rooms").await;
    assert_eq!(rooms["rooms"].as_array().unwrap().len(), 0);
}
