//! Gateway event wire frames and their decoders.
//!
//! The network server publishes one event per gateway frame, in either
//! a tag/length/value binary form or an equivalent JSON form. Three
//! frame types exist, keyed by the transport's kind tag:
//!
//! - `up`   → [`UplinkFrame`] (device → network, with RX metadata)
//! - `down` → [`DownlinkFrame`] (network → device, with TX settings)
//! - `ack`  → [`DownlinkTxAck`] (gateway's verdict on a downlink)
//!
//! Decoding is a pure transform and never fails loudly: corrupt input
//! yields a best-effort partial frame, and [`decode_frame`] returns
//! `None` only when the mandatory physical payload is absent.

pub mod binary;
pub mod cursor;
pub mod json;

use crate::packet::{FrameKind, WireFormat};
use serde::{Deserialize, Serialize};

/// LoRa modulation parameters attached to a frame.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct LoraModulationInfo {
    /// Bandwidth in Hz.
    pub bandwidth: u32,
    pub spreading_factor: u8,
    pub code_rate: CodeRate,
}

/// Forward error correction rate.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum CodeRate {
    #[default]
    #[serde(rename = "CODE_RATE_UNDEFINED")]
    Undefined,
    #[serde(rename = "CR_4_5")]
    Cr4_5,
    #[serde(rename = "CR_4_6")]
    Cr4_6,
    #[serde(rename = "CR_4_7")]
    Cr4_7,
    #[serde(rename = "CR_4_8")]
    Cr4_8,
}

impl CodeRate {
    pub fn from_wire(value: u64) -> Self {
        match value {
            1 => CodeRate::Cr4_5,
            2 => CodeRate::Cr4_6,
            3 => CodeRate::Cr4_7,
            4 => CodeRate::Cr4_8,
            _ => CodeRate::Undefined,
        }
    }

    /// Coding-rate denominator (4/5 → 5), `None` when undefined.
    pub fn denominator(self) -> Option<u8> {
        match self {
            CodeRate::Undefined => None,
            CodeRate::Cr4_5 => Some(5),
            CodeRate::Cr4_6 => Some(6),
            CodeRate::Cr4_7 => Some(7),
            CodeRate::Cr4_8 => Some(8),
        }
    }
}

/// Transmit settings the device used for an uplink.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct UplinkTxInfo {
    /// Center frequency in Hz.
    pub frequency: u32,
    pub modulation: Option<LoraModulationInfo>,
}

/// Reception metadata from the gateway that heard an uplink.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct UplinkRxInfo {
    pub gateway_id: String,
    /// Received signal strength in dBm.
    pub rssi: i32,
    /// Signal-to-noise ratio in dB.
    pub snr: f32,
}

/// An uplink event frame.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct UplinkFrame {
    /// Raw LoRaWAN PHY payload.
    pub phy_payload: Vec<u8>,
    pub tx_info: Option<UplinkTxInfo>,
    pub rx_info: Option<UplinkRxInfo>,
}

/// Transmit settings for a queued downlink.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DownlinkTxInfo {
    /// Center frequency in Hz.
    pub frequency: u32,
    /// Transmit power in dBm.
    pub power: i32,
    pub modulation: Option<LoraModulationInfo>,
}

/// One transmission attempt within a downlink frame.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DownlinkFrameItem {
    pub phy_payload: Vec<u8>,
    pub tx_info: Option<DownlinkTxInfo>,
}

/// A downlink event frame. The network server may queue several
/// items (e.g. RX1 and RX2 attempts); the gateway sends one.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DownlinkFrame {
    pub downlink_id: u32,
    pub gateway_id: String,
    pub items: Vec<DownlinkFrameItem>,
}

/// Gateway verdict for one downlink item.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TxAckStatus {
    Ignored,
    Ok,
    TooLate,
    TooEarly,
    CollisionPacket,
    CollisionBeacon,
    TxFreq,
    TxPower,
    GpsUnlocked,
    QueueFull,
    InternalError,
    DutyCycleOverflow,
}

impl TxAckStatus {
    pub fn from_wire(value: u64) -> Self {
        match value {
            1 => TxAckStatus::Ok,
            2 => TxAckStatus::TooLate,
            3 => TxAckStatus::TooEarly,
            4 => TxAckStatus::CollisionPacket,
            5 => TxAckStatus::CollisionBeacon,
            6 => TxAckStatus::TxFreq,
            7 => TxAckStatus::TxPower,
            8 => TxAckStatus::GpsUnlocked,
            9 => TxAckStatus::QueueFull,
            10 => TxAckStatus::InternalError,
            11 => TxAckStatus::DutyCycleOverflow,
            _ => TxAckStatus::Ignored,
        }
    }
}

/// A downlink transmission acknowledgment frame.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DownlinkTxAck {
    pub downlink_id: u32,
    pub gateway_id: String,
    pub items: Vec<TxAckStatus>,
}

/// A decoded gateway event frame of any kind.
#[derive(Debug, Clone, PartialEq)]
pub enum Frame {
    Uplink(UplinkFrame),
    Downlink(DownlinkFrame),
    TxAck(DownlinkTxAck),
}

impl Frame {
    /// Gateway id carried inside the frame, if any.
    pub fn gateway_id(&self) -> Option<&str> {
        match self {
            Frame::Uplink(f) => f
                .rx_info
                .as_ref()
                .filter(|rx| !rx.gateway_id.is_empty())
                .map(|rx| rx.gateway_id.as_str()),
            Frame::Downlink(f) if !f.gateway_id.is_empty() => Some(&f.gateway_id),
            Frame::TxAck(f) if !f.gateway_id.is_empty() => Some(&f.gateway_id),
            _ => None,
        }
    }

    /// Physical payload of the frame, for kinds that carry one.
    pub fn phy_payload(&self) -> Option<&[u8]> {
        match self {
            Frame::Uplink(f) => Some(&f.phy_payload),
            Frame::Downlink(f) => f
                .items
                .iter()
                .map(|item| item.phy_payload.as_slice())
                .find(|p| !p.is_empty()),
            Frame::TxAck(_) => None,
        }
    }
}

/// Decode a raw event buffer into a typed frame.
///
/// Returns `None` when the mandatory physical payload is absent (for
/// uplink and downlink kinds) or when a JSON buffer is unparseable.
/// Corrupt binary input decodes to whatever fields were readable.
pub fn decode_frame(buf: &[u8], kind: FrameKind, format: WireFormat) -> Option<Frame> {
    let frame = match (kind, format) {
        (FrameKind::Up, WireFormat::Binary) => Frame::Uplink(binary::decode_uplink(buf)),
        (FrameKind::Down, WireFormat::Binary) => Frame::Downlink(binary::decode_downlink(buf)),
        (FrameKind::Ack, WireFormat::Binary) => Frame::TxAck(binary::decode_tx_ack(buf)),
        (FrameKind::Up, WireFormat::Json) => Frame::Uplink(json::decode_uplink(buf)?),
        (FrameKind::Down, WireFormat::Json) => Frame::Downlink(json::decode_downlink(buf)?),
        (FrameKind::Ack, WireFormat::Json) => Frame::TxAck(json::decode_tx_ack(buf)?),
    };

    // TX acks legitimately carry no payload; everything else must.
    match &frame {
        Frame::TxAck(_) => Some(frame),
        _ => {
            if frame.phy_payload().is_some_and(|p| !p.is_empty()) {
                Some(frame)
            } else {
                None
            }
        }
    }
}
