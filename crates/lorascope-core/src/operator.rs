//! Network operator resolution from address prefixes.
//!
//! Every LoRaWAN operator is assigned a NetID, which maps onto a
//! DevAddr prefix of a fixed bit width. Matching a packet's address
//! against a prefix table labels the owning operator. The table is
//! built once (built-in defaults plus configured entries), sorted by
//! (priority desc, specificity desc), and read-only afterwards: the
//! first structural match wins, so configured overrides beat built-in
//! defaults and narrower prefixes beat wider ones at equal priority.
//! Reload builds a fresh table and swaps it in whole.

use serde::{Deserialize, Serialize};
use tracing::info;

/// Label returned when no prefix matches.
pub const UNKNOWN_OPERATOR: &str = "Unknown";

/// Priority assigned to the built-in table; configured entries
/// default higher so they win ties.
pub const BUILTIN_PRIORITY: i32 = 0;

/// Which identifier space a prefix applies to.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PrefixScope {
    /// 32-bit device network address.
    #[default]
    DevAddr,
    /// 64-bit join server identifier.
    JoinEui,
}

impl PrefixScope {
    fn value_bits(self) -> u8 {
        match self {
            PrefixScope::DevAddr => 32,
            PrefixScope::JoinEui => 64,
        }
    }
}

/// One prefix table entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OperatorPrefix {
    /// Prefix value, left-aligned within the scope's bit width.
    pub prefix: u64,
    /// Number of significant leading bits.
    pub width: u8,
    pub scope: PrefixScope,
    pub name: String,
    pub priority: i32,
}

impl OperatorPrefix {
    pub fn new(prefix: u64, width: u8, scope: PrefixScope, name: &str, priority: i32) -> Self {
        Self {
            prefix,
            width,
            scope,
            name: name.to_string(),
            priority,
        }
    }

    /// Bit mask covering the significant leading bits.
    pub fn mask(&self) -> u64 {
        prefix_mask(self.width, self.scope.value_bits())
    }

    /// Structural match: the candidate value, masked, equals the
    /// masked prefix.
    pub fn matches(&self, value: u64, scope: PrefixScope) -> bool {
        if self.scope != scope {
            return false;
        }
        let mask = self.mask();
        value & mask == self.prefix & mask
    }
}

/// Mask with `width` leading ones within a `bits`-wide value.
pub fn prefix_mask(width: u8, bits: u8) -> u64 {
    let bits = u32::from(bits.min(64));
    if bits == 0 {
        return 0;
    }
    let width = u32::from(width).min(bits);
    let ones = !0u64 >> (64 - bits);
    if width == 0 {
        0
    } else if width == bits {
        ones
    } else {
        ones & !(ones >> width)
    }
}

/// Immutable, pre-sorted operator prefix table.
#[derive(Debug, Clone, Default)]
pub struct OperatorTable {
    entries: Vec<OperatorPrefix>,
}

impl OperatorTable {
    /// Build a table from entries, sorting by (priority desc,
    /// specificity desc). Entry order beyond that is load order.
    pub fn new(mut entries: Vec<OperatorPrefix>) -> Self {
        entries.sort_by(|a, b| {
            b.priority
                .cmp(&a.priority)
                .then_with(|| b.width.cmp(&a.width))
        });
        info!(entries = entries.len(), "operator prefix table built");
        Self { entries }
    }

    /// Built-in DevAddr prefixes for well-known public operators,
    /// derived from their NetID assignments.
    pub fn builtin() -> Self {
        let defaults = [
            (0x2600_0000u64, 7u8, "The Things Network"),
            (0x0400_0000, 7, "Actility"),
            (0x1E00_0000, 7, "Orange"),
            (0x0800_0000, 7, "Swisscom"),
            (0x1000_0000, 7, "Everynet"),
            (0x3A00_0000, 7, "KPN"),
            (0x2000_0000, 7, "machineQ"),
        ];
        Self::new(
            defaults
                .into_iter()
                .map(|(prefix, width, name)| {
                    OperatorPrefix::new(prefix, width, PrefixScope::DevAddr, name, BUILTIN_PRIORITY)
                })
                .collect(),
        )
    }

    /// Built-in table extended with configured entries.
    pub fn with_entries(extra: Vec<OperatorPrefix>) -> Self {
        let mut entries = Self::builtin().entries;
        entries.extend(extra);
        Self::new(entries)
    }

    pub fn entries(&self) -> &[OperatorPrefix] {
        &self.entries
    }

    /// Resolve a value to its operator label, first match wins.
    pub fn resolve(&self, value: u64, scope: PrefixScope) -> &str {
        self.entries
            .iter()
            .find(|e| e.matches(value, scope))
            .map(|e| e.name.as_str())
            .unwrap_or(UNKNOWN_OPERATOR)
    }

    /// Resolve a 32-bit device address.
    pub fn resolve_dev_addr(&self, dev_addr: u32) -> &str {
        self.resolve(u64::from(dev_addr), PrefixScope::DevAddr)
    }

    /// Resolve a 64-bit join identifier.
    pub fn resolve_join_eui(&self, join_eui: u64) -> &str {
        self.resolve(join_eui, PrefixScope::JoinEui)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mask_widths() {
        assert_eq!(prefix_mask(0, 32), 0);
        assert_eq!(prefix_mask(7, 32), 0xFE00_0000);
        assert_eq!(prefix_mask(32, 32), 0xFFFF_FFFF);
        assert_eq!(prefix_mask(16, 64), 0xFFFF_0000_0000_0000);
        assert_eq!(prefix_mask(64, 64), u64::MAX);
    }

    #[test]
    fn builtin_resolves_ttn_range() {
        let table = OperatorTable::builtin();
        // 26xxxxxx and 27xxxxxx both fall under 26000000/7.
        assert_eq!(table.resolve_dev_addr(0x2601_2345), "The Things Network");
        assert_eq!(table.resolve_dev_addr(0x27AB_CDEF), "The Things Network");
        assert_eq!(table.resolve_dev_addr(0x0123_4567), UNKNOWN_OPERATOR);
    }

    #[test]
    fn narrower_prefix_wins_at_equal_priority() {
        let table = OperatorTable::new(vec![
            OperatorPrefix::new(0x2600_0000, 7, PrefixScope::DevAddr, "Wide", 0),
            OperatorPrefix::new(0x2640_0000, 12, PrefixScope::DevAddr, "Narrow", 0),
        ]);
        assert_eq!(table.resolve_dev_addr(0x2640_1234), "Narrow");
        assert_eq!(table.resolve_dev_addr(0x2700_0000), "Wide");
    }

    #[test]
    fn higher_priority_wins_at_equal_specificity() {
        let table = OperatorTable::new(vec![
            OperatorPrefix::new(0x2600_0000, 7, PrefixScope::DevAddr, "Default", 0),
            OperatorPrefix::new(0x2600_0000, 7, PrefixScope::DevAddr, "Override", 100),
        ]);
        assert_eq!(table.resolve_dev_addr(0x2612_3456), "Override");
    }

    #[test]
    fn configured_entries_override_builtin() {
        let table = OperatorTable::with_entries(vec![OperatorPrefix::new(
            0x2600_0000,
            7,
            PrefixScope::DevAddr,
            "Private TTN deployment",
            100,
        )]);
        assert_eq!(table.resolve_dev_addr(0x2601_0000), "Private TTN deployment");
        // Unrelated builtins unaffected.
        assert_eq!(table.resolve_dev_addr(0x1E11_2233), "Orange");
    }

    #[test]
    fn join_eui_scope_is_independent() {
        let table = OperatorTable::with_entries(vec![OperatorPrefix::new(
            0x70B3_D500_0000_0000,
            32,
            PrefixScope::JoinEui,
            "Acme Join Server",
            100,
        )]);
        assert_eq!(
            table.resolve_join_eui(0x70B3_D500_1234_5678),
            "Acme Join Server"
        );
        // A DevAddr that would collide numerically does not match a
        // JoinEui-scoped entry.
        assert_eq!(table.resolve_dev_addr(0x70B3_D500), UNKNOWN_OPERATOR);
    }

    #[test]
    fn zero_width_matches_everything_last() {
        let table = OperatorTable::new(vec![
            OperatorPrefix::new(0, 0, PrefixScope::DevAddr, "Catch-all", -1),
            OperatorPrefix::new(0x2600_0000, 7, PrefixScope::DevAddr, "TTN", 0),
        ]);
        assert_eq!(table.resolve_dev_addr(0x2600_0001), "TTN");
        assert_eq!(table.resolve_dev_addr(0xDEAD_BEEF), "Catch-all");
    }
}
