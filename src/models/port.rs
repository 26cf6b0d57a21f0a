// Per-port observed state, classification tags

use serde::{Deserialize, Serialize};

/// Operational link status. Four distinct states, never collapsed into a bool.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum PortStatus {
    Up,
    Down,
    Disabled,
    ErrDisabled,
}

impl PortStatus {
    pub fn is_up(self) -> bool {
        matches!(self, PortStatus::Up)
    }
}

/// Administrative tagging mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PortMode {
    Access,
    Trunk,
    General,
    Unknown,
}

impl PortMode {
    /// Parses the mode keyword of `switchport mode <x>` or a status-table mode column.
    pub fn from_token(token: &str) -> Option<Self> {
        match token.to_ascii_lowercase().as_str() {
            "a" | "access" => Some(PortMode::Access),
            "t" | "trnk" | "trunk" => Some(PortMode::Trunk),
            "g" | "gen" | "general" => Some(PortMode::General),
            _ => None,
        }
    }
}

/// Fresh snapshot of one port, produced by parsing. Never mutated in place.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PortRecord {
    pub name: String,
    pub status: PortStatus,
    pub mode: PortMode,
    /// Access VLAN, or native/PVID for trunk and general ports.
    pub vlan: Option<u16>,
    /// Tagged / allowed VLANs, sorted and deduplicated.
    pub tagged_vlans: Vec<u16>,
    pub description: String,
}

/// Uplink vs. access-style port, used for classification and result ordering.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PortType {
    Access,
    Uplink,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum CautionKind {
    WirelessAp,
    Uplink,
    Trunk,
}

/// Advisory annotation shown to operators next to a trace result.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Caution {
    #[serde(rename = "type")]
    pub kind: CautionKind,
    pub message: String,
}
