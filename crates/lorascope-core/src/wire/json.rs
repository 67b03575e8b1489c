//! JSON form of the gateway event frames.
//!
//! The network server can publish the same events as camelCase JSON
//! with base64-encoded physical payloads. These DTOs mirror the binary
//! schema field for field and convert into the shared frame types.

use super::{
    CodeRate, DownlinkFrame, DownlinkFrameItem, DownlinkTxAck, DownlinkTxInfo,
    LoraModulationInfo, TxAckStatus, UplinkFrame, UplinkRxInfo, UplinkTxInfo,
};
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use serde::Deserialize;
use tracing::debug;

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
struct LoraModulationJson {
    bandwidth: u32,
    spreading_factor: u8,
    code_rate: Option<CodeRate>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
struct ModulationJson {
    lora: Option<LoraModulationJson>,
}

impl ModulationJson {
    fn into_lora(self) -> Option<LoraModulationInfo> {
        self.lora.map(|m| LoraModulationInfo {
            bandwidth: m.bandwidth,
            spreading_factor: m.spreading_factor,
            code_rate: m.code_rate.unwrap_or_default(),
        })
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
struct UplinkTxInfoJson {
    frequency: u32,
    modulation: Option<ModulationJson>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
struct UplinkRxInfoJson {
    gateway_id: String,
    rssi: i32,
    snr: f32,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
struct UplinkFrameJson {
    phy_payload: String,
    tx_info: Option<UplinkTxInfoJson>,
    rx_info: Option<UplinkRxInfoJson>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
struct DownlinkTxInfoJson {
    frequency: u32,
    power: i32,
    modulation: Option<ModulationJson>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
struct DownlinkItemJson {
    phy_payload: String,
    tx_info: Option<DownlinkTxInfoJson>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
struct DownlinkFrameJson {
    downlink_id: u32,
    gateway_id: String,
    items: Vec<DownlinkItemJson>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
struct TxAckItemJson {
    status: Option<TxAckStatus>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
struct DownlinkTxAckJson {
    downlink_id: u32,
    gateway_id: String,
    items: Vec<TxAckItemJson>,
}

fn decode_b64(data: &str) -> Vec<u8> {
    BASE64.decode(data).unwrap_or_else(|err| {
        if !data.is_empty() {
            debug!(%err, "discarding undecodable base64 payload");
        }
        Vec::new()
    })
}

fn parse<T: for<'de> Deserialize<'de>>(buf: &[u8]) -> Option<T> {
    match serde_json::from_slice(buf) {
        Ok(value) => Some(value),
        Err(err) => {
            debug!(%err, "unparseable JSON event frame");
            None
        }
    }
}

/// Decode a JSON uplink event, `None` when unparseable.
pub fn decode_uplink(buf: &[u8]) -> Option<UplinkFrame> {
    let dto: UplinkFrameJson = parse(buf)?;
    Some(UplinkFrame {
        phy_payload: decode_b64(&dto.phy_payload),
        tx_info: dto.tx_info.map(|tx| UplinkTxInfo {
            frequency: tx.frequency,
            modulation: tx.modulation.and_then(ModulationJson::into_lora),
        }),
        rx_info: dto.rx_info.map(|rx| UplinkRxInfo {
            gateway_id: rx.gateway_id,
            rssi: rx.rssi,
            snr: rx.snr,
        }),
    })
}

/// Decode a JSON downlink event, `None` when unparseable.
pub fn decode_downlink(buf: &[u8]) -> Option<DownlinkFrame> {
    let dto: DownlinkFrameJson = parse(buf)?;
    Some(DownlinkFrame {
        downlink_id: dto.downlink_id,
        gateway_id: dto.gateway_id,
        items: dto
            .items
            .into_iter()
            .map(|item| DownlinkFrameItem {
                phy_payload: decode_b64(&item.phy_payload),
                tx_info: item.tx_info.map(|tx| DownlinkTxInfo {
                    frequency: tx.frequency,
                    power: tx.power,
                    modulation: tx.modulation.and_then(ModulationJson::into_lora),
                }),
            })
            .collect(),
    })
}

/// Decode a JSON TX-ack event, `None` when unparseable.
pub fn decode_tx_ack(buf: &[u8]) -> Option<DownlinkTxAck> {
    let dto: DownlinkTxAckJson = parse(buf)?;
    Some(DownlinkTxAck {
        downlink_id: dto.downlink_id,
        gateway_id: dto.gateway_id,
        items: dto
            .items
            .into_iter()
            .map(|item| item.status.unwrap_or(TxAckStatus::Ignored))
            .collect(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decodes_uplink_json() {
        let raw = br#"{
            "phyPayload": "QAECAwQA",
            "txInfo": {
                "frequency": 868100000,
                "modulation": {
                    "lora": {
                        "bandwidth": 125000,
                        "spreadingFactor": 7,
                        "codeRate": "CR_4_5"
                    }
                }
            },
            "rxInfo": {"gatewayId": "gw-01", "rssi": -95, "snr": 7.25}
        }"#;

        let frame = decode_uplink(raw).unwrap();
        assert_eq!(frame.phy_payload, [0x40, 0x01, 0x02, 0x03, 0x04, 0x00]);
        let tx = frame.tx_info.unwrap();
        assert_eq!(tx.frequency, 868_100_000);
        let lora = tx.modulation.unwrap();
        assert_eq!(lora.spreading_factor, 7);
        assert_eq!(lora.code_rate.denominator(), Some(5));
        let rx = frame.rx_info.unwrap();
        assert_eq!(rx.rssi, -95);
        assert_eq!(rx.snr, 7.25);
    }

    #[test]
    fn missing_optional_sections() {
        let frame = decode_uplink(br#"{"phyPayload": "QAECAwQA"}"#).unwrap();
        assert!(frame.tx_info.is_none());
        assert!(frame.rx_info.is_none());
        assert!(!frame.phy_payload.is_empty());
    }

    #[test]
    fn bad_json_is_none_and_bad_base64_is_empty() {
        assert!(decode_uplink(b"{not json").is_none());
        let frame = decode_uplink(br#"{"phyPayload": "!!!"}"#).unwrap();
        assert!(frame.phy_payload.is_empty());
    }

    #[test]
    fn decodes_tx_ack_json() {
        let raw = br#"{"downlinkId": 9, "gatewayId": "gw-02", "items": [{"status": "TOO_EARLY"}]}"#;
        let frame = decode_tx_ack(raw).unwrap();
        assert_eq!(frame.downlink_id, 9);
        assert_eq!(frame.items, vec![TxAckStatus::TooEarly]);
    }
}
