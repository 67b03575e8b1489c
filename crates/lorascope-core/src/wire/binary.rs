//! Binary decoders for the gateway event schema.
//!
//! Field dispatch per message, on (field number, wire type):
//!
//! ```text
//! UplinkFrame        1: phy_payload (len)   4: tx_info (len)    5: rx_info (len)
//! UplinkTxInfo       1: frequency (varint)  2: modulation (len)
//! Modulation         3: lora (len)          other oneof arms skipped
//! LoraModulationInfo 1: bandwidth (varint)  2: spreading_factor (varint)
//!                    4: code_rate (varint)  3: legacy string skipped
//! UplinkRxInfo       1: gateway_id (len)    6: rssi (int32, widened varint)
//!                    7: snr (float, fixed32)
//! DownlinkFrame      1: downlink_id (varint) 3: items (len, repeated)
//!                    5: gateway_id (len)
//! DownlinkFrameItem  1: phy_payload (len)   3: tx_info (len)
//! DownlinkTxInfo     1: frequency (varint)  2: power (varint)   3: modulation (len)
//! DownlinkTxAck      2: downlink_id (varint) 3: items (len, repeated; 1: status)
//!                    5: gateway_id (len)
//! ```
//!
//! Unrecognized field numbers are skipped by wire type; a read that
//! runs off the buffer ends the loop with whatever was decoded so far.

use super::cursor::{WireCursor, WT_LEN, WT_VARINT};
use super::{
    DownlinkFrame, DownlinkFrameItem, DownlinkTxAck, DownlinkTxInfo, LoraModulationInfo,
    TxAckStatus, UplinkFrame, UplinkRxInfo, UplinkTxInfo,
};
use super::CodeRate;
use tracing::trace;

fn read_string(cur: &mut WireCursor<'_>) -> Option<String> {
    cur.read_length_delimited()
        .map(|b| String::from_utf8_lossy(b).into_owned())
}

fn decode_lora_modulation(buf: &[u8]) -> LoraModulationInfo {
    let mut cur = WireCursor::new(buf);
    let mut info = LoraModulationInfo::default();
    while let Some((field, wire)) = cur.read_tag() {
        match (field, wire) {
            (1, WT_VARINT) => match cur.read_varint() {
                Some(v) => info.bandwidth = v as u32,
                None => break,
            },
            (2, WT_VARINT) => match cur.read_varint() {
                Some(v) => info.spreading_factor = v as u8,
                None => break,
            },
            (4, WT_VARINT) => match cur.read_varint() {
                Some(v) => info.code_rate = CodeRate::from_wire(v),
                None => break,
            },
            _ => {
                if !cur.skip(wire) {
                    break;
                }
            }
        }
    }
    info
}

/// The modulation message is a oneof wrapper; only the LoRa arm is of
/// interest, FSK and LR-FHSS arms are skipped like unknown fields.
fn decode_modulation(buf: &[u8]) -> Option<LoraModulationInfo> {
    let mut cur = WireCursor::new(buf);
    let mut lora = None;
    while let Some((field, wire)) = cur.read_tag() {
        match (field, wire) {
            (3, WT_LEN) => match cur.read_length_delimited() {
                Some(b) => lora = Some(decode_lora_modulation(b)),
                None => break,
            },
            _ => {
                if !cur.skip(wire) {
                    break;
                }
            }
        }
    }
    lora
}

fn decode_uplink_tx_info(buf: &[u8]) -> UplinkTxInfo {
    let mut cur = WireCursor::new(buf);
    let mut info = UplinkTxInfo::default();
    while let Some((field, wire)) = cur.read_tag() {
        match (field, wire) {
            (1, WT_VARINT) => match cur.read_varint() {
                Some(v) => info.frequency = v as u32,
                None => break,
            },
            (2, WT_LEN) => match cur.read_length_delimited() {
                Some(b) => info.modulation = decode_modulation(b),
                None => break,
            },
            _ => {
                if !cur.skip(wire) {
                    break;
                }
            }
        }
    }
    info
}

fn decode_uplink_rx_info(buf: &[u8]) -> UplinkRxInfo {
    let mut cur = WireCursor::new(buf);
    let mut info = UplinkRxInfo::default();
    while let Some((field, wire)) = cur.read_tag() {
        match (field, wire) {
            (1, WT_LEN) => match read_string(&mut cur) {
                Some(s) => info.gateway_id = s,
                None => break,
            },
            // RSSI is negative in practice, so it arrives as a widened
            // 64-bit varint; truncate back to i32.
            (6, WT_VARINT) => match cur.read_int32() {
                Some(v) => info.rssi = v,
                None => break,
            },
            (7, 5) => match cur.read_float() {
                Some(v) => info.snr = v,
                None => break,
            },
            _ => {
                if !cur.skip(wire) {
                    break;
                }
            }
        }
    }
    info
}

/// Decode an uplink event frame. Best-effort: corrupt trailing bytes
/// leave earlier fields intact.
pub fn decode_uplink(buf: &[u8]) -> UplinkFrame {
    let mut cur = WireCursor::new(buf);
    let mut frame = UplinkFrame::default();
    while let Some((field, wire)) = cur.read_tag() {
        match (field, wire) {
            (1, WT_LEN) => match cur.read_length_delimited() {
                Some(b) => frame.phy_payload = b.to_vec(),
                None => break,
            },
            (4, WT_LEN) => match cur.read_length_delimited() {
                Some(b) => frame.tx_info = Some(decode_uplink_tx_info(b)),
                None => break,
            },
            (5, WT_LEN) => match cur.read_length_delimited() {
                Some(b) => frame.rx_info = Some(decode_uplink_rx_info(b)),
                None => break,
            },
            _ => {
                if !cur.skip(wire) {
                    trace!(field, wire, "unskippable field, stopping uplink decode");
                    break;
                }
            }
        }
    }
    frame
}

fn decode_downlink_tx_info(buf: &[u8]) -> DownlinkTxInfo {
    let mut cur = WireCursor::new(buf);
    let mut info = DownlinkTxInfo::default();
    while let Some((field, wire)) = cur.read_tag() {
        match (field, wire) {
            (1, WT_VARINT) => match cur.read_varint() {
                Some(v) => info.frequency = v as u32,
                None => break,
            },
            (2, WT_VARINT) => match cur.read_int32() {
                Some(v) => info.power = v,
                None => break,
            },
            (3, WT_LEN) => match cur.read_length_delimited() {
                Some(b) => info.modulation = decode_modulation(b),
                None => break,
            },
            _ => {
                if !cur.skip(wire) {
                    break;
                }
            }
        }
    }
    info
}

fn decode_downlink_item(buf: &[u8]) -> DownlinkFrameItem {
    let mut cur = WireCursor::new(buf);
    let mut item = DownlinkFrameItem::default();
    while let Some((field, wire)) = cur.read_tag() {
        match (field, wire) {
            (1, WT_LEN) => match cur.read_length_delimited() {
                Some(b) => item.phy_payload = b.to_vec(),
                None => break,
            },
            (3, WT_LEN) => match cur.read_length_delimited() {
                Some(b) => item.tx_info = Some(decode_downlink_tx_info(b)),
                None => break,
            },
            _ => {
                if !cur.skip(wire) {
                    break;
                }
            }
        }
    }
    item
}

/// Decode a downlink event frame.
pub fn decode_downlink(buf: &[u8]) -> DownlinkFrame {
    let mut cur = WireCursor::new(buf);
    let mut frame = DownlinkFrame::default();
    while let Some((field, wire)) = cur.read_tag() {
        match (field, wire) {
            (1, WT_VARINT) => match cur.read_varint() {
                Some(v) => frame.downlink_id = v as u32,
                None => break,
            },
            (3, WT_LEN) => match cur.read_length_delimited() {
                Some(b) => frame.items.push(decode_downlink_item(b)),
                None => break,
            },
            (5, WT_LEN) => match read_string(&mut cur) {
                Some(s) => frame.gateway_id = s,
                None => break,
            },
            _ => {
                if !cur.skip(wire) {
                    break;
                }
            }
        }
    }
    frame
}

fn decode_tx_ack_item(buf: &[u8]) -> TxAckStatus {
    let mut cur = WireCursor::new(buf);
    let mut status = TxAckStatus::Ignored;
    while let Some((field, wire)) = cur.read_tag() {
        match (field, wire) {
            (1, WT_VARINT) => match cur.read_varint() {
                Some(v) => status = TxAckStatus::from_wire(v),
                None => break,
            },
            _ => {
                if !cur.skip(wire) {
                    break;
                }
            }
        }
    }
    status
}

/// Decode a downlink TX acknowledgment frame.
pub fn decode_tx_ack(buf: &[u8]) -> DownlinkTxAck {
    let mut cur = WireCursor::new(buf);
    let mut frame = DownlinkTxAck::default();
    while let Some((field, wire)) = cur.read_tag() {
        match (field, wire) {
            (2, WT_VARINT) => match cur.read_varint() {
                Some(v) => frame.downlink_id = v as u32,
                None => break,
            },
            (3, WT_LEN) => match cur.read_length_delimited() {
                Some(b) => frame.items.push(decode_tx_ack_item(b)),
                None => break,
            },
            (5, WT_LEN) => match read_string(&mut cur) {
                Some(s) => frame.gateway_id = s,
                None => break,
            },
            _ => {
                if !cur.skip(wire) {
                    break;
                }
            }
        }
    }
    frame
}
