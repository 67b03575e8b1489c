//! Canonical packet types shared across the pipeline.
//!
//! A [`RawFrameEvent`] is what the upstream transport demultiplexer
//! hands us: raw frame bytes tagged with a frame kind, a wire format,
//! a receive timestamp, and the gateway the transport associated with
//! the frame. The pipeline turns it into a [`ParsedPacket`], the one
//! immutable record that storage and live dispatch both consume.

use crate::wire::TxAckStatus;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Frame kind as tagged by the transport layer ('up'/'down'/'ack').
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FrameKind {
    Up,
    Down,
    Ack,
}

/// Encoding of the raw frame bytes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum WireFormat {
    Binary,
    Json,
}

/// Classification of a finished packet.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PacketKind {
    /// Data uplink (confirmed or unconfirmed).
    Data,
    /// Over-the-air activation request.
    JoinRequest,
    /// Network-to-device transmission.
    Downlink,
    /// Gateway acknowledgment of a downlink transmission.
    TxAck,
}

impl PacketKind {
    /// Kinds received over the air, i.e. carrying RSSI/SNR.
    pub fn is_signal_bearing(self) -> bool {
        matches!(self, PacketKind::Data | PacketKind::JoinRequest)
    }

    /// Kinds carrying a 32-bit device address.
    pub fn is_address_bearing(self) -> bool {
        matches!(self, PacketKind::Data | PacketKind::Downlink)
    }
}

/// A raw frame as pushed in by the transport demultiplexer.
#[derive(Debug, Clone)]
pub struct RawFrameEvent {
    /// Undecoded frame bytes (binary TLV or JSON text).
    pub payload: Vec<u8>,
    pub kind: FrameKind,
    pub format: WireFormat,
    /// When the transport received the frame.
    pub received_at: DateTime<Utc>,
    /// Gateway id derived from transport naming, used when the frame
    /// itself does not carry one.
    pub gateway_id: Option<String>,
}

mod hex32 {
    use serde::Serializer;

    pub fn serialize<S: Serializer>(v: &Option<u32>, s: S) -> Result<S::Ok, S::Error> {
        match v {
            Some(v) => s.serialize_some(&format!("{v:08x}")),
            None => s.serialize_none(),
        }
    }
}

mod hex64 {
    use serde::Serializer;

    pub fn serialize<S: Serializer>(v: &Option<u64>, s: S) -> Result<S::Ok, S::Error> {
        match v {
            Some(v) => s.serialize_some(&format!("{v:016x}")),
            None => s.serialize_none(),
        }
    }
}

/// The canonical, fully enriched packet record.
///
/// Exactly one of `dev_addr` / `join_eui` is meaningful per kind:
/// data and downlink packets carry an address, join requests carry the
/// join/device identifiers, TX acks carry neither. RSSI and SNR are
/// only present for kinds received over the air.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ParsedPacket {
    pub received_at: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub gateway_id: Option<String>,
    pub kind: PacketKind,
    #[serde(skip_serializing_if = "Option::is_none", with = "hex32")]
    pub dev_addr: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none", with = "hex64")]
    pub join_eui: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none", with = "hex64")]
    pub dev_eui: Option<u64>,
    /// Owning network operator label, "Unknown" when unresolved.
    pub operator: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub frequency: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub spreading_factor: Option<u8>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub bandwidth: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rssi: Option<i32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub snr: Option<f32>,
    /// Physical payload size in bytes.
    pub payload_size: usize,
    /// Computed time-on-air in microseconds.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub airtime_us: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub f_cnt: Option<u16>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub f_port: Option<u8>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub confirmed: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub session_id: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tx_ack_status: Option<TxAckStatus>,
}

impl ParsedPacket {
    /// Empty packet of the given kind; the pipeline fills in the rest.
    pub fn new(kind: PacketKind, received_at: DateTime<Utc>) -> Self {
        Self {
            received_at,
            gateway_id: None,
            kind,
            dev_addr: None,
            join_eui: None,
            dev_eui: None,
            operator: crate::operator::UNKNOWN_OPERATOR.to_string(),
            frequency: None,
            spreading_factor: None,
            bandwidth: None,
            rssi: None,
            snr: None,
            payload_size: 0,
            airtime_us: None,
            f_cnt: None,
            f_port: None,
            confirmed: None,
            session_id: None,
            tx_ack_status: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn kind_classification() {
        assert!(PacketKind::Data.is_signal_bearing());
        assert!(PacketKind::JoinRequest.is_signal_bearing());
        assert!(!PacketKind::Downlink.is_signal_bearing());
        assert!(!PacketKind::TxAck.is_signal_bearing());

        assert!(PacketKind::Data.is_address_bearing());
        assert!(PacketKind::Downlink.is_address_bearing());
        assert!(!PacketKind::JoinRequest.is_address_bearing());
    }

    #[test]
    fn serializes_ids_as_hex() {
        let mut packet = ParsedPacket::new(PacketKind::Data, Utc::now());
        packet.dev_addr = Some(0x27AB_CDEF);
        packet.dev_eui = Some(0x0011_2233_4455_6677);

        let json = serde_json::to_value(&packet).unwrap();
        assert_eq!(json["devAddr"], "27abcdef");
        assert_eq!(json["devEui"], "0011223344556677");
        assert_eq!(json["kind"], "data");
        // Absent options are omitted entirely.
        assert!(json.get("rssi").is_none());
    }
}
