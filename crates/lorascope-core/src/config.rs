//! Operator prefix configuration.
//!
//! The configuration source (outside this core) supplies prefix
//! entries at startup and on change; this module turns them into
//! validated [`OperatorPrefix`] values merged over the built-in
//! table. The shape is deliberately serde-generic so the entries can
//! come from JSON, TOML, or anything else the host embeds.

use crate::error::{CoreError, Result};
use crate::operator::{OperatorPrefix, OperatorTable, PrefixScope};
use serde::{Deserialize, Serialize};

fn default_priority() -> i32 {
    100
}

/// One configured operator prefix, as deserialized from the host's
/// configuration source.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PrefixEntry {
    /// Hex prefix value, e.g. `"26000000"`.
    pub prefix: String,
    /// Significant leading bits.
    pub width: u8,
    pub name: String,
    /// Defaults above the built-in table so configured entries win.
    #[serde(default = "default_priority")]
    pub priority: i32,
    #[serde(default)]
    pub scope: PrefixScope,
}

impl PrefixEntry {
    /// Validate and convert into a table entry.
    pub fn parse(&self) -> Result<OperatorPrefix> {
        let value = u64::from_str_radix(self.prefix.trim(), 16).map_err(|e| {
            CoreError::InvalidPrefix {
                prefix: self.prefix.clone(),
                reason: e.to_string(),
            }
        })?;
        let max_width = match self.scope {
            PrefixScope::DevAddr => 32,
            PrefixScope::JoinEui => 64,
        };
        if self.width > max_width {
            return Err(CoreError::InvalidPrefix {
                prefix: self.prefix.clone(),
                reason: format!("width {} exceeds {max_width} bits", self.width),
            });
        }
        if self.scope == PrefixScope::DevAddr && value > u64::from(u32::MAX) {
            return Err(CoreError::InvalidPrefix {
                prefix: self.prefix.clone(),
                reason: "device address prefix wider than 32 bits".to_string(),
            });
        }
        Ok(OperatorPrefix::new(
            value,
            self.width,
            self.scope,
            &self.name,
            self.priority,
        ))
    }
}

/// Build the runtime operator table: built-in defaults plus every
/// configured entry. Fails on the first invalid entry so bad config
/// is caught at load time, not per packet.
pub fn build_operator_table(entries: &[PrefixEntry]) -> Result<OperatorTable> {
    let parsed = entries
        .iter()
        .map(PrefixEntry::parse)
        .collect::<Result<Vec<_>>>()?;
    for (i, entry) in parsed.iter().enumerate() {
        let clash = parsed[..i].iter().any(|other| {
            other.scope == entry.scope && other.prefix == entry.prefix && other.width == entry.width
        });
        if clash {
            return Err(CoreError::Config(format!(
                "duplicate prefix entry {:x}/{}",
                entry.prefix, entry.width
            )));
        }
    }
    Ok(OperatorTable::with_entries(parsed))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_config_entries() {
        let entries: Vec<PrefixEntry> = serde_json::from_str(
            r#"[
                {"prefix": "FC000000", "width": 10, "name": "Private fleet"},
                {"prefix": "70B3D57ED0000000", "width": 40, "name": "Acme", "scope": "join_eui", "priority": 50}
            ]"#,
        )
        .unwrap();

        let table = build_operator_table(&entries).unwrap();
        assert_eq!(table.resolve_dev_addr(0xFC12_3456), "Private fleet");
        assert_eq!(table.resolve_join_eui(0x70B3_D57E_D012_3456), "Acme");
        // Built-ins still present underneath.
        assert_eq!(table.resolve_dev_addr(0x2601_0000), "The Things Network");
    }

    #[test]
    fn rejects_bad_hex_and_width() {
        let bad_hex = PrefixEntry {
            prefix: "xyz".into(),
            width: 7,
            name: "n".into(),
            priority: 100,
            scope: PrefixScope::DevAddr,
        };
        assert!(bad_hex.parse().is_err());

        let bad_width = PrefixEntry {
            prefix: "26000000".into(),
            width: 40,
            name: "n".into(),
            priority: 100,
            scope: PrefixScope::DevAddr,
        };
        assert!(bad_width.parse().is_err());
    }

    #[test]
    fn rejects_duplicate_entries() {
        let entries: Vec<PrefixEntry> = serde_json::from_str(
            r#"[
                {"prefix": "FC000000", "width": 10, "name": "Fleet A"},
                {"prefix": "FC000000", "width": 10, "name": "Fleet B"}
            ]"#,
        )
        .unwrap();
        let err = build_operator_table(&entries).unwrap_err();
        assert!(matches!(err, CoreError::Config(_)));
    }

    #[test]
    fn priority_defaults_above_builtin() {
        let entries: Vec<PrefixEntry> =
            serde_json::from_str(r#"[{"prefix": "26000000", "width": 7, "name": "Override"}]"#)
                .unwrap();
        let table = build_operator_table(&entries).unwrap();
        assert_eq!(table.resolve_dev_addr(0x2700_0000), "Override");
    }
}
