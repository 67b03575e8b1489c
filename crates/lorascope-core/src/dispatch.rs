//! Live packet fan-out under per-subscriber filters.
//!
//! Each live client registers a structural filter and a transport
//! handle (an unbounded channel sender; the live-transport layer owns
//! the far end). Every published packet is evaluated against every
//! client independently; non-applicable clauses always pass. A send
//! failure removes that client without touching delivery to others.

use crate::operator::prefix_mask;
use crate::packet::{PacketKind, ParsedPacket};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::{debug, warn};

/// Direction of the ownership clause.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OwnershipMode {
    /// No ownership filtering.
    #[default]
    All,
    /// Accept only addresses matching one of the client's prefixes.
    Owned,
    /// Accept only addresses matching none of the client's prefixes.
    Foreign,
}

/// A DevAddr prefix owned by a subscriber.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct OwnershipPrefix {
    pub prefix: u32,
    pub width: u8,
}

impl OwnershipPrefix {
    pub fn matches(&self, dev_addr: u32) -> bool {
        let mask = prefix_mask(self.width, 32) as u32;
        dev_addr & mask == self.prefix & mask
    }
}

/// Structural filter for one live subscription. Read-only for the
/// life of the connection.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct LiveFilter {
    /// Only packets from this gateway; `None` = all gateways.
    pub gateway_id: Option<String>,
    /// Accepted kinds; `None` = all kinds.
    pub kinds: Option<Vec<PacketKind>>,
    /// RSSI bounds for signal-bearing kinds; unset side = unbounded.
    pub rssi_min: Option<i32>,
    pub rssi_max: Option<i32>,
    pub ownership: OwnershipMode,
    pub prefixes: Vec<OwnershipPrefix>,
}

impl LiveFilter {
    /// Structural evaluation; every clause must pass, non-applicable
    /// clauses pass by definition.
    pub fn accepts(&self, packet: &ParsedPacket) -> bool {
        if let Some(gateway) = &self.gateway_id {
            if packet.gateway_id.as_deref() != Some(gateway.as_str()) {
                return false;
            }
        }

        if let Some(kinds) = &self.kinds {
            if !kinds.contains(&packet.kind) {
                return false;
            }
        }

        if packet.kind.is_signal_bearing() {
            if let Some(rssi) = packet.rssi {
                if self.rssi_min.is_some_and(|min| rssi < min) {
                    return false;
                }
                if self.rssi_max.is_some_and(|max| rssi > max) {
                    return false;
                }
            }
        }

        if packet.kind.is_address_bearing() && self.ownership != OwnershipMode::All {
            if let Some(dev_addr) = packet.dev_addr {
                let owned = self.prefixes.iter().any(|p| p.matches(dev_addr));
                match self.ownership {
                    OwnershipMode::Owned if !owned => return false,
                    OwnershipMode::Foreign if owned => return false,
                    _ => {}
                }
            }
        }

        true
    }
}

/// One registered subscriber.
#[derive(Debug)]
struct LiveClient {
    id: u64,
    filter: LiveFilter,
    sender: mpsc::UnboundedSender<Arc<str>>,
}

/// Owns the subscription set and fans packets out.
///
/// Mutation (subscribe/unsubscribe) and publication both go through
/// the owning pipeline task, so the set needs no interior locking.
#[derive(Debug, Default)]
pub struct Dispatcher {
    clients: Vec<LiveClient>,
    next_id: u64,
}

impl Dispatcher {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn client_count(&self) -> usize {
        self.clients.len()
    }

    /// Register a subscriber with a transport handle supplied by the
    /// live-transport layer. Returns the subscription id.
    pub fn attach(&mut self, filter: LiveFilter, sender: mpsc::UnboundedSender<Arc<str>>) -> u64 {
        self.next_id += 1;
        let id = self.next_id;
        debug!(id, "live client attached");
        self.clients.push(LiveClient { id, filter, sender });
        id
    }

    /// Convenience for in-process subscribers: create the channel
    /// here and hand back the receiving end.
    pub fn subscribe(&mut self, filter: LiveFilter) -> (u64, mpsc::UnboundedReceiver<Arc<str>>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (self.attach(filter, tx), rx)
    }

    /// Remove a subscriber; true when it existed.
    pub fn detach(&mut self, id: u64) -> bool {
        let before = self.clients.len();
        self.clients.retain(|c| c.id != id);
        before != self.clients.len()
    }

    /// Evaluate the packet against every subscriber and forward it to
    /// the matches. Serialized once, shared across subscribers. A
    /// failed send drops only that subscriber.
    pub fn publish(&mut self, packet: &ParsedPacket) {
        if self.clients.is_empty() {
            return;
        }
        let serialized: Arc<str> = match serde_json::to_string(packet) {
            Ok(json) => json.into(),
            Err(err) => {
                warn!(%err, "packet not serializable, skipping dispatch");
                return;
            }
        };
        self.clients.retain(|client| {
            if !client.filter.accepts(packet) {
                return true;
            }
            match client.sender.send(serialized.clone()) {
                Ok(()) => true,
                Err(_) => {
                    warn!(id = client.id, "live client transport gone, removing");
                    false
                }
            }
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn packet(kind: PacketKind) -> ParsedPacket {
        let mut p = ParsedPacket::new(kind, Utc::now());
        p.gateway_id = Some("gw-01".to_string());
        if kind.is_address_bearing() {
            p.dev_addr = Some(0x27AB_CDEF);
        }
        if kind.is_signal_bearing() {
            p.rssi = Some(-50);
        }
        p
    }

    #[test]
    fn empty_filter_accepts_everything() {
        let filter = LiveFilter::default();
        for kind in [
            PacketKind::Data,
            PacketKind::JoinRequest,
            PacketKind::Downlink,
            PacketKind::TxAck,
        ] {
            assert!(filter.accepts(&packet(kind)));
        }
    }

    #[test]
    fn gateway_clause() {
        let filter = LiveFilter {
            gateway_id: Some("gw-01".to_string()),
            ..Default::default()
        };
        assert!(filter.accepts(&packet(PacketKind::Data)));

        let mut other = packet(PacketKind::Data);
        other.gateway_id = Some("gw-02".to_string());
        assert!(!filter.accepts(&other));

        // No gateway on the packet: an explicit gateway filter fails.
        let mut anonymous = packet(PacketKind::Data);
        anonymous.gateway_id = None;
        assert!(!filter.accepts(&anonymous));
    }

    #[test]
    fn kind_clause() {
        let filter = LiveFilter {
            kinds: Some(vec![PacketKind::JoinRequest, PacketKind::TxAck]),
            ..Default::default()
        };
        assert!(filter.accepts(&packet(PacketKind::JoinRequest)));
        assert!(!filter.accepts(&packet(PacketKind::Data)));
    }

    #[test]
    fn rssi_bounds_apply_to_signal_bearing_kinds_only() {
        let filter = LiveFilter {
            rssi_min: Some(-100),
            rssi_max: Some(-30),
            ..Default::default()
        };

        let mut quiet = packet(PacketKind::Data);
        quiet.rssi = Some(-110);
        assert!(!filter.accepts(&quiet));

        let mut fine = packet(PacketKind::Data);
        fine.rssi = Some(-50);
        assert!(filter.accepts(&fine));

        // Downlinks carry no RSSI; the clause is non-applicable.
        assert!(filter.accepts(&packet(PacketKind::Downlink)));
    }

    #[test]
    fn ownership_owned_and_foreign() {
        let prefixes = vec![OwnershipPrefix {
            prefix: 0x2600_0000,
            width: 7,
        }];

        let owned = LiveFilter {
            ownership: OwnershipMode::Owned,
            prefixes: prefixes.clone(),
            ..Default::default()
        };
        // 27ABCDEF falls under 26000000/7.
        assert!(owned.accepts(&packet(PacketKind::Data)));
        let mut outside = packet(PacketKind::Data);
        outside.dev_addr = Some(0x1000_0000);
        assert!(!owned.accepts(&outside));

        let foreign = LiveFilter {
            ownership: OwnershipMode::Foreign,
            prefixes,
            ..Default::default()
        };
        assert!(!foreign.accepts(&packet(PacketKind::Data)));
        assert!(foreign.accepts(&outside));

        // Join requests carry no DevAddr; ownership is non-applicable.
        assert!(owned.accepts(&packet(PacketKind::JoinRequest)));
    }

    #[test]
    fn publish_fans_out_to_matching_clients() {
        let mut dispatcher = Dispatcher::new();
        let (_, mut all_rx) = dispatcher.subscribe(LiveFilter::default());
        let (_, mut join_rx) = dispatcher.subscribe(LiveFilter {
            kinds: Some(vec![PacketKind::JoinRequest]),
            ..Default::default()
        });

        dispatcher.publish(&packet(PacketKind::Data));
        assert!(all_rx.try_recv().is_ok());
        assert!(join_rx.try_recv().is_err());

        dispatcher.publish(&packet(PacketKind::JoinRequest));
        assert!(all_rx.try_recv().is_ok());
        let json = join_rx.try_recv().unwrap();
        assert!(json.contains("\"kind\":\"join_request\""));
    }

    #[test]
    fn dead_client_is_removed_others_still_served() {
        let mut dispatcher = Dispatcher::new();
        let (_, dead_rx) = dispatcher.subscribe(LiveFilter::default());
        let (_, mut live_rx) = dispatcher.subscribe(LiveFilter::default());
        drop(dead_rx);

        dispatcher.publish(&packet(PacketKind::Data));
        assert_eq!(dispatcher.client_count(), 1);
        assert!(live_rx.try_recv().is_ok());
    }

    #[test]
    fn detach_removes_client() {
        let mut dispatcher = Dispatcher::new();
        let (id, _rx) = dispatcher.subscribe(LiveFilter::default());
        assert!(dispatcher.detach(id));
        assert!(!dispatcher.detach(id));
        assert_eq!(dispatcher.client_count(), 0);
    }
}
