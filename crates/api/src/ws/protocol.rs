use relaymesh_core::Role;
use serde::{Deserialize, Serialize};

/// Client -> Server signaling messages (spec.md §6), one internally tagged
/// enum per direction: `type` sits flat alongside each variant's own fields
/// rather than nesting them under a `data` key, matching spec.md §6/§7's
/// literal flat wire examples (`{type:"joined", room, id, role}`,
/// `{type:"error", message}`). `request_id` is just another sibling field.
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "type")]
pub enum ClientMessage {
    #[serde(rename = "join")]
    Join {
        room: String,
        #[serde(default)]
        role: Option<Role>,
        #[serde(default)]
        request_id: Option<String>,
    },

    #[serde(rename = "leaveRoom")]
    LeaveRoom {
        room: String,
        #[serde(default)]
        request_id: Option<String>,
    },

    #[serde(rename = "leave")]
    Leave {},

    #[serde(rename = "list")]
    List {
        #[serde(default)]
        request_id: Option<String>,
    },

    #[serde(rename = "rooms")]
    Rooms {
        #[serde(default)]
        request_id: Option<String>,
    },

    #[serde(rename = "ice")]
    Ice {
        candidate: serde_json::Value,
        #[serde(default)]
        to: Option<String>,
        #[serde(default)]
        room: Option<String>,
    },

    #[serde(rename = "offer")]
    Offer(RelayEnvelope),
    #[serde(rename = "answer")]
    Answer(RelayEnvelope),
    #[serde(rename = "candidate")]
    Candidate(RelayEnvelope),

    #[serde(rename = "sfu.createTransport")]
    SfuCreateTransport {
        room: String,
        #[serde(default)]
        direction: Option<String>,
        #[serde(default)]
        request_id: Option<String>,
    },

    #[serde(rename = "sfu.connectTransport")]
    SfuConnectTransport {
        #[serde(rename = "transportId")]
        transport_id: String,
        #[serde(rename = "dtlsParameters")]
        dtls_parameters: serde_json::Value,
        #[serde(default)]
        request_id: Option<String>,
    },

    #[serde(rename = "sfu.produce")]
    SfuProduce {
        #[serde(rename = "transportId")]
        transport_id: String,
        kind: relaymesh_core::MediaKind,
        #[serde(rename = "rtpParameters")]
        rtp_parameters: serde_json::Value,
        room: String,
        #[serde(default)]
        request_id: Option<String>,
    },

    #[serde(rename = "sfu.consume")]
    SfuConsume {
        #[serde(rename = "transportId")]
        transport_id: String,
        #[serde(rename = "producerId")]
        producer_id: String,
        #[serde(rename = "rtpCapabilities")]
        rtp_capabilities: serde_json::Value,
        room: String,
        #[serde(default)]
        request_id: Option<String>,
    },

    #[serde(rename = "sfu.listProducers")]
    SfuListProducers {
        room: String,
        #[serde(default)]
        request_id: Option<String>,
    },

    #[serde(rename = "sfu.closeProducer")]
    SfuCloseProducer {
        #[serde(rename = "producerId")]
        producer_id: String,
        #[serde(default)]
        request_id: Option<String>,
    },

    #[serde(rename = "startRecording")]
    StartRecording {
        room: String,
        #[serde(rename = "producerId")]
        producer_id: String,
        #[serde(default)]
        request_id: Option<String>,
    },

    #[serde(rename = "stopRecording")]
    StopRecording {
        room: String,
        #[serde(rename = "producerId")]
        producer_id: String,
        #[serde(default)]
        request_id: Option<String>,
    },

    #[serde(rename = "admin.rooms")]
    AdminRooms {
        #[serde(default)]
        request_id: Option<String>,
    },

    #[serde(rename = "admin.roomInfo")]
    AdminRoomInfo {
        room: String,
        #[serde(default)]
        request_id: Option<String>,
    },

    #[serde(rename = "admin.metrics")]
    AdminMetrics {
        #[serde(default)]
        request_id: Option<String>,
    },
}

/// Shared shape for the legacy `offer`/`answer`/`candidate` relay messages
/// (spec.md §6: "unchanged message is annotated with `from` and either
/// forwarded to `to` or broadcast to the room minus sender"). The payload is
/// opaque to the control plane — it's relayed verbatim plus `from`.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct RelayEnvelope {
    #[serde(default)]
    pub to: Option<String>,
    #[serde(default)]
    pub room: Option<String>,
    #[serde(default)]
    pub from: Option<String>,
    #[serde(flatten)]
    pub rest: serde_json::Map<String, serde_json::Value>,
}

/// Server -> Client messages (spec.md §6), flattened the same way as
/// `ClientMessage` — `type` is a sibling of each variant's own fields, not
/// a wrapper around a nested `data` object.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type")]
pub enum ServerMessage {
    #[serde(rename = "id")]
    Id { id: String },

    #[serde(rename = "error")]
    Error { message: String },

    #[serde(rename = "joined")]
    Joined { room: String, id: String, role: Role },

    #[serde(rename = "member-joined")]
    MemberJoined { room: String, id: String, role: Role },

    #[serde(rename = "left")]
    Left { room: String, id: String },

    #[serde(rename = "member-left")]
    MemberLeft { room: String, id: String },

    #[serde(rename = "leave")]
    Leave { id: String },

    #[serde(rename = "list")]
    List { clients: Vec<String> },

    #[serde(rename = "rooms")]
    Rooms { rooms: Vec<RoomSummary> },

    #[serde(rename = "ice")]
    Ice {
        from: String,
        candidate: serde_json::Value,
    },

    #[serde(rename = "sfu.transportCreated")]
    SfuTransportCreated {
        #[serde(rename = "transportId")]
        transport_id: String,
        #[serde(rename = "iceParameters")]
        ice_parameters: serde_json::Value,
        #[serde(rename = "iceCandidates")]
        ice_candidates: serde_json::Value,
        #[serde(rename = "dtlsParameters")]
        dtls_parameters: serde_json::Value,
        #[serde(rename = "iceServers")]
        ice_servers: Vec<relaymesh_config::IceServer>,
        #[serde(rename = "routerRtpCapabilities")]
        router_rtp_capabilities: serde_json::Value,
        direction: String,
    },

    #[serde(rename = "sfu.transportConnected")]
    SfuTransportConnected {
        #[serde(rename = "transportId")]
        transport_id: String,
    },

    #[serde(rename = "sfu.produced")]
    SfuProduced {
        #[serde(rename = "producerId")]
        producer_id: String,
        kind: relaymesh_core::MediaKind,
    },

    #[serde(rename = "sfu.newProducer")]
    SfuNewProducer {
        room: String,
        #[serde(rename = "producerId")]
        producer_id: String,
        #[serde(rename = "clientId")]
        client_id: String,
        #[serde(rename = "producerUser")]
        producer_user: Option<String>,
        kind: relaymesh_core::MediaKind,
    },

    #[serde(rename = "sfu.consumed")]
    SfuConsumed {
        #[serde(rename = "consumerId")]
        consumer_id: String,
        #[serde(rename = "producerId")]
        producer_id: String,
        kind: relaymesh_core::MediaKind,
        #[serde(rename = "rtpParameters")]
        rtp_parameters: serde_json::Value,
    },

    #[serde(rename = "sfu.producers")]
    SfuProducers {
        room: String,
        producers: Vec<ProducerSummary>,
    },

    #[serde(rename = "sfu.producerClosed")]
    SfuProducerClosed {
        room: String,
        #[serde(rename = "producerId")]
        producer_id: String,
        #[serde(rename = "clientId")]
        client_id: String,
    },

    #[serde(rename = "recordingStarted")]
    RecordingStarted {
        room: String,
        #[serde(rename = "producerId")]
        producer_id: String,
        #[serde(rename = "outputFile")]
        output_file: String,
    },

    #[serde(rename = "recordingStopped")]
    RecordingStopped {
        room: String,
        #[serde(rename = "producerId")]
        producer_id: String,
    },

    #[serde(rename = "recording-started")]
    RecordingStartedBroadcast {
        room: String,
        #[serde(rename = "producerId")]
        producer_id: String,
    },

    #[serde(rename = "recording-stopped")]
    RecordingStoppedBroadcast {
        room: String,
        #[serde(rename = "producerId")]
        producer_id: String,
    },

    #[serde(rename = "admin.rooms")]
    AdminRooms { rooms: Vec<RoomSummary> },

    #[serde(rename = "admin.roomInfo")]
    AdminRoomInfo {
        room: String,
        members: Vec<String>,
        #[serde(rename = "ownerId")]
        owner_id: Option<String>,
        producers: Vec<ProducerSummary>,
    },

    #[serde(rename = "admin.metrics")]
    AdminMetrics { metrics: serde_json::Value },
}

#[derive(Debug, Clone, Serialize)]
pub struct RoomSummary {
    pub name: String,
    pub count: usize,
}

#[derive(Debug, Clone, Serialize)]
pub struct ProducerSummary {
    #[serde(rename = "producerId")]
    pub producer_id: String,
    pub kind: relaymesh_core::MediaKind,
    #[serde(rename = "clientId")]
    pub client_id: String,
}

impl ServerMessage {
    pub fn to_text(&self) -> String {
        serde_json::to_string(self).unwrap_or_else(|_| {
            r#"{"type":"error","message":"internal: failed to encode response"}"#.to_string()
        })
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self::Error {
            message: message.into(),
        }
    }
}
