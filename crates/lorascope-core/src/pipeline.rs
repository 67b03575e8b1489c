//! The packet pipeline: one owner, strict per-frame ordering.
//!
//! ```text
//! transport ──► decode ──► PHY parse ──► enrich ──► session ──► persist
//!   demux        (wire)      (phy)      (operator,   stamp        │
//!                                        airtime)                 ▼
//!                                                              dispatch
//! ```
//!
//! Each inbound frame runs the whole path before the next one starts,
//! so session-state transitions follow exact arrival order. The
//! [`Pipeline::run`] loop owns all mutable state: frames, subscriber
//! changes, and operator-table reloads arrive as commands on one
//! channel, and the session sweep fires from an interval timer inside
//! the same loop. Nothing here needs a lock.

use crate::airtime::time_on_air_us;
use crate::dispatch::{Dispatcher, LiveFilter};
use crate::operator::OperatorTable;
use crate::packet::{PacketKind, ParsedPacket, RawFrameEvent};
use crate::phy::{self, PhyPayload};
use crate::session::{SessionConfig, SessionTracker};
use crate::wire::{self, Frame, LoraModulationInfo};
use chrono::Utc;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, oneshot};
use tracing::{debug, info};

/// Downstream persistence sink; implemented by the storage layer,
/// called once per accepted packet.
pub trait PacketStore: Send {
    fn persist(&mut self, packet: &ParsedPacket);
}

/// Store that drops everything; for pipelines that only dispatch.
#[derive(Debug, Default)]
pub struct NullStore;

impl PacketStore for NullStore {
    fn persist(&mut self, _packet: &ParsedPacket) {}
}

/// Commands accepted by the pipeline loop.
#[derive(Debug)]
pub enum PipelineCommand {
    /// A raw frame from the transport demultiplexer.
    Frame(RawFrameEvent),
    /// Register a live subscriber; the id is returned on the reply
    /// channel when one is supplied.
    Subscribe {
        filter: LiveFilter,
        sender: mpsc::UnboundedSender<Arc<str>>,
        reply: Option<oneshot::Sender<u64>>,
    },
    /// Remove a live subscriber.
    Unsubscribe(u64),
    /// Swap in a freshly built operator table.
    ReloadOperators(OperatorTable),
}

/// How often the session sweep runs.
pub const SWEEP_INTERVAL: Duration = Duration::from_secs(60);

/// The single-owner packet pipeline.
pub struct Pipeline<S: PacketStore> {
    operators: Arc<OperatorTable>,
    sessions: SessionTracker,
    dispatcher: Dispatcher,
    store: S,
}

impl<S: PacketStore> Pipeline<S> {
    pub fn new(operators: OperatorTable, session_config: SessionConfig, store: S) -> Self {
        Self {
            operators: Arc::new(operators),
            sessions: SessionTracker::new(session_config),
            dispatcher: Dispatcher::new(),
            store,
        }
    }

    pub fn dispatcher_mut(&mut self) -> &mut Dispatcher {
        &mut self.dispatcher
    }

    pub fn sessions(&self) -> &SessionTracker {
        &self.sessions
    }

    /// Replace the operator table (config reload).
    pub fn set_operators(&mut self, table: OperatorTable) {
        self.operators = Arc::new(table);
    }

    /// Run one frame through the full path. Returns the finished
    /// packet, or `None` when the frame was discarded as malformed.
    pub fn handle_frame(&mut self, event: RawFrameEvent) -> Option<ParsedPacket> {
        let Some(frame) = wire::decode_frame(&event.payload, event.kind, event.format) else {
            debug!(kind = ?event.kind, "frame discarded: missing payload or unparseable");
            return None;
        };

        let gateway_id = frame
            .gateway_id()
            .map(str::to_string)
            .or_else(|| event.gateway_id.clone());

        let packet = match frame {
            Frame::Uplink(uplink) => self.build_uplink_packet(uplink, gateway_id, &event)?,
            Frame::Downlink(downlink) => self.build_downlink_packet(downlink, gateway_id, &event)?,
            Frame::TxAck(ack) => {
                let mut packet = ParsedPacket::new(PacketKind::TxAck, event.received_at);
                packet.gateway_id = gateway_id;
                packet.tx_ack_status = ack.items.first().copied();
                packet
            }
        };

        self.store.persist(&packet);
        self.dispatcher.publish(&packet);
        Some(packet)
    }

    fn build_uplink_packet(
        &mut self,
        uplink: wire::UplinkFrame,
        gateway_id: Option<String>,
        event: &RawFrameEvent,
    ) -> Option<ParsedPacket> {
        match phy::parse_uplink(&uplink.phy_payload) {
            Some(PhyPayload::JoinRequest(join)) => {
                let mut packet =
                    base_uplink_packet(PacketKind::JoinRequest, &uplink, gateway_id, event);
                packet.join_eui = Some(join.join_eui);
                packet.dev_eui = Some(join.dev_eui);
                packet.operator = self.operators.resolve_join_eui(join.join_eui).to_string();
                self.sessions.record_join_request(
                    join.dev_eui,
                    join.join_eui,
                    packet.gateway_id.clone(),
                    event.received_at,
                );
                Some(packet)
            }
            Some(PhyPayload::Data(data)) => {
                let mut packet = base_uplink_packet(PacketKind::Data, &uplink, gateway_id, event);
                packet.dev_addr = Some(data.dev_addr);
                packet.f_cnt = Some(data.f_cnt);
                packet.f_port = data.f_port;
                packet.confirmed = Some(data.confirmed);
                packet.operator = self.operators.resolve_dev_addr(data.dev_addr).to_string();
                let stamp =
                    self.sessions
                        .record_uplink(data.dev_addr, Some(data.f_cnt), event.received_at);
                packet.session_id = Some(stamp.session_id);
                if packet.dev_eui.is_none() {
                    packet.dev_eui = stamp.dev_eui;
                }
                Some(packet)
            }
            Some(PhyPayload::Other(mac_type)) => {
                debug!(?mac_type, "uplink discarded: undecoded MAC type");
                None
            }
            None => {
                debug!(len = uplink.phy_payload.len(), "uplink discarded: undersized payload");
                None
            }
        }
    }

    fn build_downlink_packet(
        &mut self,
        downlink: wire::DownlinkFrame,
        gateway_id: Option<String>,
        event: &RawFrameEvent,
    ) -> Option<ParsedPacket> {
        // First item carrying a payload is the transmitted one.
        let item = downlink
            .items
            .iter()
            .find(|item| !item.phy_payload.is_empty())?;

        let mut packet = ParsedPacket::new(PacketKind::Downlink, event.received_at);
        packet.gateway_id = gateway_id;
        packet.payload_size = item.phy_payload.len();

        if let Some(tx) = &item.tx_info {
            packet.frequency = Some(tx.frequency);
            apply_modulation(&mut packet, tx.modulation.as_ref());
        }

        match phy::parse_downlink(&item.phy_payload) {
            Some(PhyPayload::Data(data)) => {
                packet.dev_addr = Some(data.dev_addr);
                packet.f_cnt = Some(data.f_cnt);
                packet.f_port = data.f_port;
                packet.confirmed = Some(data.confirmed);
                packet.operator = self.operators.resolve_dev_addr(data.dev_addr).to_string();
            }
            // Join accepts and other types still count as downlink
            // traffic, just without address fields.
            Some(_) => {}
            None => {
                debug!(len = item.phy_payload.len(), "downlink discarded: undersized payload");
                return None;
            }
        }

        Some(packet)
    }

    /// GC pass for pending joins and stale sessions.
    pub fn sweep(&mut self, now: chrono::DateTime<Utc>) {
        self.sessions.sweep(now);
    }

    /// Drive the pipeline from a command channel until all senders
    /// drop. The sweep runs on its own interval, independent of
    /// arrivals.
    pub async fn run(mut self, mut commands: mpsc::Receiver<PipelineCommand>) {
        let mut sweep = tokio::time::interval(SWEEP_INTERVAL);
        sweep.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
        info!("pipeline started");

        loop {
            tokio::select! {
                command = commands.recv() => match command {
                    Some(PipelineCommand::Frame(event)) => {
                        self.handle_frame(event);
                    }
                    Some(PipelineCommand::Subscribe { filter, sender, reply }) => {
                        let id = self.dispatcher.attach(filter, sender);
                        if let Some(reply) = reply {
                            let _ = reply.send(id);
                        }
                    }
                    Some(PipelineCommand::Unsubscribe(id)) => {
                        self.dispatcher.detach(id);
                    }
                    Some(PipelineCommand::ReloadOperators(table)) => {
                        self.set_operators(table);
                        info!("operator table reloaded");
                    }
                    None => break,
                },
                _ = sweep.tick() => {
                    self.sweep(Utc::now());
                }
            }
        }
        info!("pipeline stopped");
    }
}

/// Packet fields common to every uplink kind: identity, size, and RX
/// and TX metadata from the event frame.
fn base_uplink_packet(
    kind: PacketKind,
    uplink: &wire::UplinkFrame,
    gateway_id: Option<String>,
    event: &RawFrameEvent,
) -> ParsedPacket {
    let mut packet = ParsedPacket::new(kind, event.received_at);
    packet.gateway_id = gateway_id;
    packet.payload_size = uplink.phy_payload.len();

    if let Some(rx) = &uplink.rx_info {
        packet.rssi = Some(rx.rssi);
        packet.snr = Some(rx.snr);
    }
    if let Some(tx) = &uplink.tx_info {
        packet.frequency = Some(tx.frequency);
        apply_modulation(&mut packet, tx.modulation.as_ref());
    }
    packet
}

fn apply_modulation(packet: &mut ParsedPacket, modulation: Option<&LoraModulationInfo>) {
    let Some(lora) = modulation else { return };
    if lora.spreading_factor > 0 {
        packet.spreading_factor = Some(lora.spreading_factor);
    }
    if lora.bandwidth > 0 {
        packet.bandwidth = Some(lora.bandwidth);
    }
    if let (Some(sf), Some(bw)) = (packet.spreading_factor, packet.bandwidth) {
        let cr = lora.code_rate.denominator().unwrap_or(5);
        packet.airtime_us = Some(time_on_air_us(sf, bw, packet.payload_size, cr));
    }
}
