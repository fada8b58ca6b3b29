use crate::ids::ClientId;
use crate::ids::RoomName;
use crate::registry::{ClientRegistry, RoomRegistry};

/// Sends `payload` (an already-serialized wire message) to every member of
/// `room`, skipping `exclude` when given. Grounded on the teacher's
/// dispatcher broadcast loop: collect the recipient ids first, then send
/// without holding the room lock across the awaits (spec.md §5).
pub async fn broadcast_to_room(
    clients: &ClientRegistry,
    rooms: &RoomRegistry,
    room: &RoomName,
    payload: &str,
    exclude: Option<&ClientId>,
) {
    let recipients: Vec<ClientId> = match rooms.get(room) {
        Some(room) => room
            .member_roles
            .keys()
            .filter(|id| exclude != Some(*id))
            .cloned()
            .collect(),
        None => return,
    };

    for id in recipients {
        if let Some(session) = clients.get(&id) {
            if !session.sink.is_closed() {
                session.sink.send_text(payload.to_string()).await;
            }
        }
    }
}

/// Sends `payload` to a single client if it is still connected. Used for
/// direct replies and targeted notifications (e.g. "your producer was
/// closed by the engine").
pub async fn send_to_client(clients: &ClientRegistry, target: &ClientId, payload: &str) {
    if let Some(session) = clients.get(target) {
        if !session.sink.is_closed() {
            session.sink.send_text(payload.to_string()).await;
        }
    }
}
