//! LoRaWAN PHY payload parsing.
//!
//! Works on the raw physical payload carried inside a decoded gateway
//! frame. Only the fields the pipeline needs are extracted: MAC
//! message type, join identifiers, device address, frame counter and
//! port. Everything is length-guarded; undersized buffers yield
//! `None`, never a panic — gateway links routinely deliver corrupt
//! frames.
//!
//! ```text
//! Data MAC payload:
//! ┌──────┬─────────┬───────┬──────┬─────────┬───────┬─────────┬─────┐
//! │ MHDR │ DevAddr │ FCtrl │ FCnt │  FOpts  │ FPort │ Payload │ MIC │
//! │ (1B) │ (4B LE) │ (1B)  │ (2B) │ (0-15B) │ (0/1B)│         │ (4B)│
//! └──────┴─────────┴───────┴──────┴─────────┴───────┴─────────┴─────┘
//!
//! Join request:
//! ┌──────┬─────────────┬────────────┬──────────┬─────┐
//! │ MHDR │ JoinEUI (8B)│ DevEUI (8B)│ Nonce(2B)│ MIC │
//! └──────┴─────────────┴────────────┴──────────┴─────┘
//! ```

/// MAC message type, top 3 bits of the MHDR byte.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MacMessageType {
    JoinRequest,
    JoinAccept,
    UnconfirmedDataUp,
    UnconfirmedDataDown,
    ConfirmedDataUp,
    ConfirmedDataDown,
    RejoinRequest,
    Proprietary,
}

impl MacMessageType {
    /// Classify an MHDR byte.
    pub fn from_mhdr(mhdr: u8) -> Self {
        match mhdr >> 5 {
            0 => MacMessageType::JoinRequest,
            1 => MacMessageType::JoinAccept,
            2 => MacMessageType::UnconfirmedDataUp,
            3 => MacMessageType::UnconfirmedDataDown,
            4 => MacMessageType::ConfirmedDataUp,
            5 => MacMessageType::ConfirmedDataDown,
            6 => MacMessageType::RejoinRequest,
            _ => MacMessageType::Proprietary,
        }
    }

    pub fn is_data_uplink(self) -> bool {
        matches!(
            self,
            MacMessageType::UnconfirmedDataUp | MacMessageType::ConfirmedDataUp
        )
    }

    pub fn is_data_downlink(self) -> bool {
        matches!(
            self,
            MacMessageType::UnconfirmedDataDown | MacMessageType::ConfirmedDataDown
        )
    }

    pub fn is_confirmed(self) -> bool {
        matches!(
            self,
            MacMessageType::ConfirmedDataUp | MacMessageType::ConfirmedDataDown
        )
    }
}

/// Extracted join-request fields.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JoinRequestPayload {
    /// Join server identifier (8 bytes, wire order little-endian).
    pub join_eui: u64,
    /// Device identifier (8 bytes, wire order little-endian).
    pub dev_eui: u64,
    pub dev_nonce: u16,
}

/// Extracted data-message fields (uplink or downlink).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DataPayload {
    pub dev_addr: u32,
    pub f_ctrl: u8,
    pub f_cnt: u16,
    /// Present only when the buffer holds bytes beyond FOpts + MIC.
    pub f_port: Option<u8>,
    pub confirmed: bool,
}

/// A parsed PHY payload.
#[derive(Debug, Clone, PartialEq)]
pub enum PhyPayload {
    JoinRequest(JoinRequestPayload),
    Data(DataPayload),
    /// Recognized MAC type with no further decoding (join accept,
    /// rejoin, proprietary).
    Other(MacMessageType),
}

/// Minimum join request: MHDR + JoinEUI + DevEUI + DevNonce + MIC.
pub const MIN_JOIN_REQUEST_LEN: usize = 1 + 8 + 8 + 2 + 4;
/// Minimum data message: MHDR + DevAddr + FCtrl + FCnt + MIC.
pub const MIN_DATA_LEN: usize = 1 + 4 + 1 + 2 + 4;

/// EUIs are transmitted least-significant-byte first; reading them as
/// little-endian yields the canonical (byte-reversed) hex form.
fn read_eui(bytes: &[u8]) -> u64 {
    let mut raw = [0u8; 8];
    raw.copy_from_slice(&bytes[..8]);
    u64::from_le_bytes(raw)
}

fn parse_join_request(payload: &[u8]) -> Option<PhyPayload> {
    if payload.len() < MIN_JOIN_REQUEST_LEN {
        return None;
    }
    Some(PhyPayload::JoinRequest(JoinRequestPayload {
        join_eui: read_eui(&payload[1..9]),
        dev_eui: read_eui(&payload[9..17]),
        dev_nonce: u16::from_le_bytes([payload[17], payload[18]]),
    }))
}

fn parse_data(payload: &[u8], mac_type: MacMessageType) -> Option<PhyPayload> {
    if payload.len() < MIN_DATA_LEN {
        return None;
    }
    let dev_addr = u32::from_le_bytes([payload[1], payload[2], payload[3], payload[4]]);
    let f_ctrl = payload[5];
    let f_cnt = u16::from_le_bytes([payload[6], payload[7]]);
    let f_opts_len = usize::from(f_ctrl & 0x0F);

    // FPort is present only when the frame extends past
    // MHDR + DevAddr + FCtrl + FCnt + FOpts + MIC.
    let port_offset = 8 + f_opts_len;
    let f_port = if payload.len() > port_offset + 4 {
        Some(payload[port_offset])
    } else {
        None
    };

    Some(PhyPayload::Data(DataPayload {
        dev_addr,
        f_ctrl,
        f_cnt,
        f_port,
        confirmed: mac_type.is_confirmed(),
    }))
}

/// Parse an uplink PHY payload. `None` on any length violation.
pub fn parse_uplink(payload: &[u8]) -> Option<PhyPayload> {
    let mac_type = MacMessageType::from_mhdr(*payload.first()?);
    match mac_type {
        MacMessageType::JoinRequest => parse_join_request(payload),
        t if t.is_data_uplink() => parse_data(payload, mac_type),
        other => Some(PhyPayload::Other(other)),
    }
}

/// Parse a gateway-side downlink PHY payload; symmetric to
/// [`parse_uplink`] but dispatching on the downlink data types.
pub fn parse_downlink(payload: &[u8]) -> Option<PhyPayload> {
    let mac_type = MacMessageType::from_mhdr(*payload.first()?);
    match mac_type {
        t if t.is_data_downlink() => parse_data(payload, mac_type),
        other => Some(PhyPayload::Other(other)),
    }
}
