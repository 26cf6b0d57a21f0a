// Port classification: uplink detection, wireless AP heuristic, caution annotations

use crate::models::{Caution, CautionKind, PortMode, PortType};
use crate::parsers::InterfaceName;

/// Access / uplink port prefix convention of one hardware family.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ModelFamily {
    pub name: &'static str,
    /// Model tag prefixes belonging to the family, matched case-insensitively.
    pub tags: &'static [&'static str],
    pub access_prefixes: &'static [&'static str],
    pub uplink_prefixes: &'static [&'static str],
}

pub const MODEL_FAMILIES: &[ModelFamily] = &[
    ModelFamily {
        name: "N2000",
        tags: &["N20", "N2024", "N2048"],
        access_prefixes: &["Gi"],
        uplink_prefixes: &["Te"],
    },
    ModelFamily {
        name: "N3000",
        tags: &["N30"],
        access_prefixes: &["Gi"],
        uplink_prefixes: &["Te", "Fo"],
    },
    ModelFamily {
        name: "N3200",
        tags: &["N32"],
        access_prefixes: &["Gi", "Tw"],
        uplink_prefixes: &["Te", "Hu"],
    },
    ModelFamily {
        name: "N4000",
        tags: &["N40", "8024"],
        access_prefixes: &["Te"],
        uplink_prefixes: &["Fo"],
    },
];

/// Used when the model tag matches no family.
const GENERIC_UPLINK_PREFIXES: &[&str] = &["Te", "Tw", "Fo", "Hu"];

const UPLINK_KEYWORDS: &[&str] = &[
    "uplink", "trunk", "core", "distribution", "dist-", "backbone", "to-sw", "to sw", "stack",
];
const AP_KEYWORDS: &[&str] = &["wireless", "wifi", "wi-fi", "access point", "wap"];

/// More distinct VLANs than this on one port is itself an AP signal.
pub const AP_VLAN_THRESHOLD: usize = 5;

pub fn model_family(model: &str) -> Option<&'static ModelFamily> {
    let model = model.trim().to_ascii_uppercase();
    if model.is_empty() {
        return None;
    }
    MODEL_FAMILIES
        .iter()
        .find(|f| f.tags.iter().any(|t| model.starts_with(&t.to_ascii_uppercase())))
}

fn has_prefix(iface: &InterfaceName, prefixes: &[&str]) -> bool {
    prefixes.iter().any(|p| iface.prefix.eq_ignore_ascii_case(p))
}

fn description_says_uplink(description: &str) -> bool {
    let d = description.to_ascii_lowercase();
    UPLINK_KEYWORDS.iter().any(|k| d.contains(k))
}

/// Priority: link aggregation name, description keywords, model prefix table, generic prefixes.
pub fn is_uplink(port: &str, model: &str, description: &str) -> bool {
    let Some(iface) = InterfaceName::parse(port) else {
        return description_says_uplink(description);
    };
    if iface.is_port_channel() {
        return true;
    }
    if description_says_uplink(description) {
        return true;
    }
    if let Some(family) = model_family(model) {
        if has_prefix(&iface, family.uplink_prefixes) {
            return true;
        }
        if has_prefix(&iface, family.access_prefixes) {
            return false;
        }
    }
    has_prefix(&iface, GENERIC_UPLINK_PREFIXES)
}

/// Name-only check used where no description is known (VLAN change target filtering).
pub fn is_uplink_name(port: &str, model: &str) -> bool {
    is_uplink(port, model, "")
}

pub fn port_type(port: &str, model: &str, description: &str) -> PortType {
    if is_uplink(port, model, description) {
        PortType::Uplink
    } else {
        PortType::Access
    }
}

fn description_says_ap(description: &str) -> bool {
    let d = description.to_ascii_lowercase();
    if AP_KEYWORDS.iter().any(|k| d.contains(k)) {
        return true;
    }
    // "AP" only as a whole word: `AP-Lobby`, `lobby ap`, not `laptop`.
    d.split(|c: char| !c.is_ascii_alphanumeric())
        .any(|w| w == "ap")
}

/// `vlans` is every VLAN seen on the port (primary + tagged, any notation already expanded).
pub fn is_wireless_ap(description: &str, vlans: &[u16]) -> bool {
    if description_says_ap(description) {
        return true;
    }
    let mut distinct = vlans.to_vec();
    distinct.sort_unstable();
    distinct.dedup();
    distinct.len() > AP_VLAN_THRESHOLD
}

/// Inputs describing one port for caution annotation.
#[derive(Debug, Clone, Copy)]
pub struct PortFacts<'a> {
    pub port: &'a str,
    pub model: &'a str,
    pub description: &'a str,
    pub mode: PortMode,
    pub vlans: &'a [u16],
}

/// Ordered advisory list. An AP-classified port gets only the AP caution.
pub fn cautions(facts: &PortFacts<'_>) -> Vec<Caution> {
    if is_wireless_ap(facts.description, facts.vlans) {
        return vec![Caution {
            kind: CautionKind::WirelessAp,
            message: format!(
                "{} looks like a wireless access point; the client may roam between APs",
                facts.port
            ),
        }];
    }

    let mut out = Vec::new();
    if is_uplink(facts.port, facts.model, facts.description) {
        out.push(Caution {
            kind: CautionKind::Uplink,
            message: format!(
                "{} is an uplink; the device is probably behind another switch",
                facts.port
            ),
        });
    }
    if matches!(facts.mode, PortMode::Trunk | PortMode::General) && !facts.vlans.is_empty() {
        out.push(Caution {
            kind: CautionKind::Trunk,
            message: format!(
                "{} carries {} VLANs in {} mode",
                facts.port,
                facts.vlans.len(),
                if facts.mode == PortMode::Trunk { "trunk" } else { "general" }
            ),
        });
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn port_channel_always_uplink() {
        assert!(is_uplink("Po1", "N2048", ""));
        assert!(is_uplink("Po1", "", "desk"));
    }

    #[test]
    fn description_keywords_win_over_model_table() {
        assert!(is_uplink("Gi1/0/48", "N2048", "Uplink to core"));
        assert!(!is_uplink("Gi1/0/48", "N2048", "Printer"));
    }

    #[test]
    fn model_table_prefixes() {
        assert!(is_uplink("Te1/0/1", "N2048P", ""));
        // N4000 uses Te for access ports.
        assert!(!is_uplink("Te1/0/1", "N4032", ""));
        assert!(is_uplink("Fo1/1/1", "N4032", ""));
    }

    #[test]
    fn generic_fallback_for_unknown_model() {
        assert!(is_uplink("Te1/0/1", "", ""));
        assert!(!is_uplink("Gi1/0/1", "unknown-model", ""));
    }

    #[test]
    fn ap_by_keyword_or_vlan_count() {
        assert!(is_wireless_ap("AP-Lobby", &[]));
        assert!(is_wireless_ap("Wireless 2nd floor", &[]));
        assert!(!is_wireless_ap("laptop dock", &[10]));
        assert!(is_wireless_ap("", &[10, 20, 30, 40, 50, 60]));
        assert!(!is_wireless_ap("", &[10, 20, 30, 40, 50]));
    }

    #[test]
    fn ap_port_never_gets_uplink_caution() {
        let vlans: Vec<u16> = (10..20).collect();
        let facts = PortFacts {
            port: "Te1/0/1",
            model: "N2048",
            description: "trunk to AP",
            mode: PortMode::Trunk,
            vlans: &vlans,
        };
        let out = cautions(&facts);
        assert_eq!(out.len(), 1);
        assert_eq!(out[0].kind, CautionKind::WirelessAp);
    }

    #[test]
    fn uplink_then_trunk_caution_order() {
        let facts = PortFacts {
            port: "Te1/0/1",
            model: "N2048",
            description: "",
            mode: PortMode::Trunk,
            vlans: &[10, 20],
        };
        let kinds: Vec<_> = cautions(&facts).into_iter().map(|c| c.kind).collect();
        assert_eq!(kinds, vec![CautionKind::Uplink, CautionKind::Trunk]);
    }
}
