use std::sync::Arc;

use dashmap::DashMap;
use event_listener_primitives::HandlerId;
use mediasoup::consumer::{Consumer, ConsumerOptions};
use mediasoup::data_structures::{DtlsParameters, ListenInfo, Protocol};
use mediasoup::producer::{Producer, ProducerOptions};
use mediasoup::router::{Router, RouterOptions};
use mediasoup::rtp_parameters::{MediaKind as MsMediaKind, RtpCapabilities, RtpParameters};
use mediasoup::transport::Transport;
use mediasoup::webrtc_transport::{
    WebRtcTransport, WebRtcTransportListenInfos, WebRtcTransportOptions,
    WebRtcTransportRemoteParameters,
};
use relaymesh_config::{ListenIp, SfuSettings};
use relaymesh_core::{ClientId, ConsumerId, MediaKind, ProducerId, RoomName, TransportId};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio::sync::broadcast;
use tracing::{debug, info, warn};

use crate::codecs::media_codecs;
use crate::events::{EngineEvent, EngineEventReceiver, EVENT_CHANNEL_CAPACITY};
use crate::worker_pool::WorkerPool;

#[derive(Debug, Error)]
pub enum EngineError {
    #[error("room not found")]
    RoomNotFound,
    #[error("participant not found")]
    ParticipantNotFound,
    #[error("transport not found")]
    TransportNotFound,
    #[error("router cannot consume this producer with the given capabilities")]
    IncompatibleCapabilities,
    #[error("mediasoup error: {0}")]
    Mediasoup(String),
    #[error("invalid parameters: {0}")]
    InvalidParameters(#[from] serde_json::Error),
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TransportInfo {
    pub id: String,
    pub ice_parameters: serde_json::Value,
    pub ice_candidates: serde_json::Value,
    pub dtls_parameters: serde_json::Value,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TransportPair {
    pub send: TransportInfo,
    pub recv: TransportInfo,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConsumerInfo {
    pub id: String,
    pub producer_id: String,
    pub kind: MediaKind,
    pub rtp_parameters: serde_json::Value,
}

#[derive(Debug, Clone, Copy, Serialize)]
pub struct EngineMetrics {
    pub worker_count: usize,
    pub room_count: usize,
    pub participant_count: usize,
}

struct EngineRoom {
    router: Router,
}

/// Holds the producer alongside the `HandlerId`s for its close-family
/// callbacks. Field order matters: `producer` drops (and so fires `close()`
/// and any still-registered handlers) before the handlers themselves drop,
/// so a plain `HashMap::remove` still reports the close to the event bridge.
/// `close_producer_silent` reverses that by dropping the handlers first.
struct ProducerHandle {
    producer: Producer,
    close_handler: HandlerId,
    transport_close_handler: HandlerId,
}

struct EngineParticipant {
    send_transport: WebRtcTransport,
    recv_transport: WebRtcTransport,
    producers: std::collections::HashMap<ProducerId, ProducerHandle>,
    consumers: std::collections::HashMap<ConsumerId, Consumer>,
}

/// The sole component in the system that holds real `mediasoup` handles
/// (spec.md §4.3). Rooms are keyed by name, participants by (room, client)
/// so the same client id can never collide across rooms.
pub struct EngineAdapter {
    rooms: DashMap<RoomName, EngineRoom>,
    participants: DashMap<(RoomName, ClientId), EngineParticipant>,
    worker_pool: Arc<WorkerPool>,
    listen_ips: Vec<ListenIp>,
    events_tx: broadcast::Sender<EngineEvent>,
}

impl EngineAdapter {
    pub async fn new(settings: &SfuSettings) -> anyhow::Result<(Arc<Self>, EngineEventReceiver)> {
        let worker_pool = Arc::new(WorkerPool::new(settings).await?);
        let (events_tx, events_rx) = broadcast::channel(EVENT_CHANNEL_CAPACITY);

        let adapter = Arc::new(Self {
            rooms: DashMap::new(),
            participants: DashMap::new(),
            worker_pool,
            listen_ips: settings.listen_ips.clone(),
            events_tx,
        });

        Ok((adapter, events_rx))
    }

    pub fn metrics(&self) -> EngineMetrics {
        EngineMetrics {
            worker_count: self.worker_pool.worker_count(),
            room_count: self.rooms.len(),
            participant_count: self.participants.len(),
        }
    }

    /// Creates the room's Router if it doesn't exist yet, returning its RTP
    /// capabilities. Idempotent: calling this for an already-created room
    /// just returns the existing capabilities (spec.md §4.2 implicit room
    /// creation on first join).
    pub async fn ensure_room(&self, room: &RoomName) -> Result<serde_json::Value, EngineError> {
        if let Some(existing) = self.rooms.get(room) {
            return Ok(serde_json::to_value(existing.router.rtp_capabilities())
                .map_err(EngineError::InvalidParameters)?);
        }

        let worker = self.worker_pool.get_worker();
        let router = worker
            .create_router(RouterOptions::new(media_codecs()))
            .await
            .map_err(|e| EngineError::Mediasoup(e.to_string()))?;

        let caps = serde_json::to_value(router.rtp_capabilities())
            .map_err(EngineError::InvalidParameters)?;

        info!(%room, "router created");
        self.rooms.insert(room.clone(), EngineRoom { router });
        Ok(caps)
    }

    /// Drops the room, which drops its Router and every transport,
    /// producer, and consumer created on it (spec.md §4.3: closing the
    /// router is how the adapter tears down a room's engine state).
    pub fn remove_room(&self, room: &RoomName) {
        if self.rooms.remove(room).is_some() {
            self.participants.retain(|(r, _), _| r != room);
            info!(%room, "router removed");
        }
    }

    pub fn has_room(&self, room: &RoomName) -> bool {
        self.rooms.contains_key(room)
    }

    pub async fn create_transports(
        &self,
        room: &RoomName,
        client: &ClientId,
    ) -> Result<TransportPair, EngineError> {
        let router = self
            .rooms
            .get(room)
            .map(|r| r.router.clone())
            .ok_or(EngineError::RoomNotFound)?;

        let send_transport = self.create_webrtc_transport(&router).await?;
        let recv_transport = self.create_webrtc_transport(&router).await?;

        let send_info = transport_info(&send_transport);
        let recv_info = transport_info(&recv_transport);

        self.register_transport_close(room.clone(), client.clone(), &send_transport);
        self.register_transport_close(room.clone(), client.clone(), &recv_transport);

        self.participants.insert(
            (room.clone(), client.clone()),
            EngineParticipant {
                send_transport,
                recv_transport,
                producers: std::collections::HashMap::new(),
                consumers: std::collections::HashMap::new(),
            },
        );

        debug!(%room, %client, "transports created");
        Ok(TransportPair {
            send: send_info,
            recv: recv_info,
        })
    }

    pub async fn connect_transport(
        &self,
        room: &RoomName,
        client: &ClientId,
        transport_id: &TransportId,
        dtls_parameters: serde_json::Value,
    ) -> Result<(), EngineError> {
        let participant = self
            .participants
            .get(&(room.clone(), client.clone()))
            .ok_or(EngineError::ParticipantNotFound)?;

        let dtls_parameters: DtlsParameters = serde_json::from_value(dtls_parameters)?;
        let remote = WebRtcTransportRemoteParameters { dtls_parameters };

        if participant.send_transport.id().to_string() == *transport_id {
            participant
                .send_transport
                .connect(remote)
                .await
                .map_err(|e| EngineError::Mediasoup(e.to_string()))?;
        } else if participant.recv_transport.id().to_string() == *transport_id {
            participant
                .recv_transport
                .connect(remote)
                .await
                .map_err(|e| EngineError::Mediasoup(e.to_string()))?;
        } else {
            return Err(EngineError::TransportNotFound);
        }

        debug!(%room, %client, %transport_id, "transport connected");
        Ok(())
    }

    pub async fn produce(
        &self,
        room: &RoomName,
        client: &ClientId,
        kind: MediaKind,
        rtp_parameters: serde_json::Value,
    ) -> Result<ProducerId, EngineError> {
        let mut participant = self
            .participants
            .get_mut(&(room.clone(), client.clone()))
            .ok_or(EngineError::ParticipantNotFound)?;

        let rtp_parameters: RtpParameters = serde_json::from_value(rtp_parameters)?;
        let options = ProducerOptions::new(to_ms_kind(kind), rtp_parameters);

        let producer = participant
            .send_transport
            .produce(options)
            .await
            .map_err(|e| EngineError::Mediasoup(e.to_string()))?;

        let producer_id = producer.id().to_string();
        let (close_handler, transport_close_handler) =
            self.register_producer_hooks(room.clone(), client.clone(), &producer);
        participant.producers.insert(
            producer_id.clone(),
            ProducerHandle {
                producer,
                close_handler,
                transport_close_handler,
            },
        );

        debug!(%room, %client, %producer_id, "producer created");
        Ok(producer_id)
    }

    pub async fn consume(
        &self,
        room: &RoomName,
        client: &ClientId,
        producer_id: &ProducerId,
        rtp_capabilities: serde_json::Value,
    ) -> Result<ConsumerInfo, EngineError> {
        let router = self
            .rooms
            .get(room)
            .map(|r| r.router.clone())
            .ok_or(EngineError::RoomNotFound)?;

        let rtp_capabilities: RtpCapabilities = serde_json::from_value(rtp_capabilities)?;
        let ms_producer_id = producer_id
            .parse()
            .map_err(|_| EngineError::Mediasoup("invalid producer id".into()))?;

        if !router.can_consume(&ms_producer_id, &rtp_capabilities) {
            return Err(EngineError::IncompatibleCapabilities);
        }

        let mut participant = self
            .participants
            .get_mut(&(room.clone(), client.clone()))
            .ok_or(EngineError::ParticipantNotFound)?;

        let options = ConsumerOptions::new(ms_producer_id, rtp_capabilities);
        let consumer = participant
            .recv_transport
            .consume(options)
            .await
            .map_err(|e| EngineError::Mediasoup(e.to_string()))?;

        let info = ConsumerInfo {
            id: consumer.id().to_string(),
            producer_id: consumer.producer_id().to_string(),
            kind: from_ms_kind(consumer.kind()),
            rtp_parameters: serde_json::to_value(consumer.rtp_parameters())?,
        };

        self.register_consumer_close(room.clone(), client.clone(), &consumer);

        if let Err(e) = consumer.resume().await {
            warn!(%room, %client, consumer_id = %info.id, error = %e, "consumer resume failed");
        }

        participant.consumers.insert(info.id.clone(), consumer);

        debug!(%room, %client, consumer_id = %info.id, "consumer created");

        Ok(info)
    }

    /// Closes one producer without touching the rest of the participant's
    /// state, leaving its close-family handlers registered so the event
    /// bridge is told about it (disconnect/leave-room cleanup, spec.md §4.4:
    /// those paths broadcast `sfu.producerClosed` purely through the engine
    /// event, the same way an engine-initiated close does). Returns whether
    /// a producer was actually found and dropped, so callers can tell an
    /// explicit close from a no-op (spec.md §5 idempotent cleanup).
    pub fn close_producer(&self, room: &RoomName, client: &ClientId, producer_id: &ProducerId) -> bool {
        self.participants
            .get_mut(&(room.clone(), client.clone()))
            .map(|mut p| p.producers.remove(producer_id).is_some())
            .unwrap_or(false)
    }

    /// Closes one producer without re-emitting its close event. Used by the
    /// explicit `sfu.closeProducer` handler, which already sends its own
    /// reply and room broadcast (spec.md §6) — without this, the producer's
    /// `Drop` would also fire `on_close`/`on_transport_close` and the event
    /// bridge would broadcast a second, unsolicited `sfu.producerClosed`
    /// (one more than the round-trip law in spec.md §8 allows).
    pub fn close_producer_silent(&self, room: &RoomName, client: &ClientId, producer_id: &ProducerId) -> bool {
        let Some(mut participant) = self.participants.get_mut(&(room.clone(), client.clone())) else {
            return false;
        };
        let Some(handle) = participant.producers.remove(producer_id) else {
            return false;
        };
        drop(handle.close_handler);
        drop(handle.transport_close_handler);
        drop(handle.producer);
        true
    }

    /// Drops every transport/producer/consumer owned by `client` in `room`.
    /// Dropping the handles closes them on the engine side.
    pub fn remove_participant(&self, room: &RoomName, client: &ClientId) {
        self.participants.remove(&(room.clone(), client.clone()));
        debug!(%room, %client, "participant media state removed");
    }

    async fn create_webrtc_transport(&self, router: &Router) -> Result<WebRtcTransport, EngineError> {
        let mut listen_infos: Option<WebRtcTransportListenInfos> = None;
        for listen_ip in &self.listen_ips {
            let ip = listen_ip
                .ip
                .parse()
                .map_err(|_| EngineError::Mediasoup("invalid listen ip".into()))?;
            let udp = ListenInfo {
                protocol: Protocol::Udp,
                ip,
                announced_address: listen_ip.announced_ip.clone(),
                port: None,
                port_range: None,
                flags: None,
                send_buffer_size: None,
                recv_buffer_size: None,
                expose_internal_ip: false,
            };
            listen_infos = Some(match listen_infos {
                None => WebRtcTransportListenInfos::new(udp),
                Some(infos) => infos.insert(udp),
            });
        }
        let listen_infos = listen_infos.ok_or(EngineError::Mediasoup("no listen ips configured".into()))?;

        let mut options = WebRtcTransportOptions::new(listen_infos);
        options.enable_udp = true;
        options.enable_tcp = true;
        options.prefer_udp = true;

        router
            .create_webrtc_transport(options)
            .await
            .map_err(|e| EngineError::Mediasoup(e.to_string()))
    }

    fn register_transport_close(&self, room: RoomName, client: ClientId, transport: &WebRtcTransport) {
        let tx = self.events_tx.clone();
        let transport_id = transport.id().to_string();
        transport
            .on_close(move || {
                let _ = tx.send(EngineEvent::TransportClosed {
                    room: room.clone(),
                    owner: client.clone(),
                    transport_id: transport_id.clone(),
                });
            })
            .detach();
    }

    /// Wires both members of a producer's close family (spec.md §4.3: a
    /// producer is cleaned up on `transportclose` as well as plain `close`,
    /// e.g. the owning transport dying doesn't emit a separate `close`).
    /// Returns the `HandlerId`s un-detached so `close_producer_silent` can
    /// unsubscribe them ahead of an explicit close.
    fn register_producer_hooks(
        &self,
        room: RoomName,
        client: ClientId,
        producer: &Producer,
    ) -> (HandlerId, HandlerId) {
        let close_handler = {
            let tx = self.events_tx.clone();
            let room = room.clone();
            let client = client.clone();
            let producer_id = producer.id().to_string();
            producer.on_close(move || {
                let _ = tx.send(EngineEvent::ProducerClosed {
                    room,
                    owner: client,
                    producer_id,
                });
            })
        };
        let transport_close_handler = {
            let tx = self.events_tx.clone();
            let producer_id = producer.id().to_string();
            producer.on_transport_close(move || {
                let _ = tx.send(EngineEvent::ProducerClosed {
                    room,
                    owner: client,
                    producer_id,
                });
            })
        };
        (close_handler, transport_close_handler)
    }

    /// Wires a consumer's full close family: its producer closing,
    /// its transport closing, and the consumer itself closing directly
    /// (spec.md §4.3) — all three remove it from the client's `consumers`.
    fn register_consumer_close(&self, room: RoomName, client: ClientId, consumer: &Consumer) {
        let producer_close = {
            let tx = self.events_tx.clone();
            let room = room.clone();
            let client = client.clone();
            let consumer_id = consumer.id().to_string();
            move || {
                let _ = tx.send(EngineEvent::ConsumerClosed {
                    room,
                    owner: client,
                    consumer_id,
                });
            }
        };
        let transport_close = {
            let tx = self.events_tx.clone();
            let room = room.clone();
            let client = client.clone();
            let consumer_id = consumer.id().to_string();
            move || {
                let _ = tx.send(EngineEvent::ConsumerClosed {
                    room,
                    owner: client,
                    consumer_id,
                });
            }
        };
        let close = {
            let tx = self.events_tx.clone();
            let consumer_id = consumer.id().to_string();
            move || {
                let _ = tx.send(EngineEvent::ConsumerClosed {
                    room,
                    owner: client,
                    consumer_id,
                });
            }
        };
        consumer.on_producer_close(producer_close).detach();
        consumer.on_transport_close(transport_close).detach();
        consumer.on_close(close).detach();
    }
}

fn transport_info(transport: &WebRtcTransport) -> TransportInfo {
    TransportInfo {
        id: transport.id().to_string(),
        ice_parameters: serde_json::to_value(transport.ice_parameters()).unwrap_or_default(),
        ice_candidates: serde_json::to_value(transport.ice_candidates()).unwrap_or_default(),
        dtls_parameters: serde_json::to_value(transport.dtls_parameters()).unwrap_or_default(),
    }
}

fn to_ms_kind(kind: MediaKind) -> MsMediaKind {
    match kind {
        MediaKind::Audio => MsMediaKind::Audio,
        MediaKind::Video => MsMediaKind::Video,
    }
}

fn from_ms_kind(kind: MsMediaKind) -> MediaKind {
    match kind {
        MsMediaKind::Audio => MediaKind::Audio,
        MsMediaKind::Video => MediaKind::Video,
    }
}
