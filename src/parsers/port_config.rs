// Port configuration parser for `show running-config interface <port>` blocks

use crate::models::PortMode;

use super::vlan_list;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PortConfig {
    pub description: String,
    pub mode: PortMode,
    /// Access VLAN, or native / PVID for trunk and general mode.
    pub vlan: Option<u16>,
    pub tagged_vlans: Vec<u16>,
}

impl Default for PortConfig {
    fn default() -> Self {
        Self {
            description: String::new(),
            mode: PortMode::Unknown,
            vlan: None,
            tagged_vlans: Vec::new(),
        }
    }
}

/// Missing fields stay empty / unknown. Ports without an explicit mode line but with an
/// access VLAN are reported as access (the device default).
pub fn parse_port_config(raw: &str) -> PortConfig {
    let mut cfg = PortConfig::default();
    let mut access_vlan = None;
    let mut native_vlan = None;
    let mut tagged = Vec::new();

    for line in raw.lines() {
        let line = line.trim();
        let lower = line.to_ascii_lowercase();

        if lower.starts_with("description ") {
            cfg.description = unquote(line["description ".len()..].trim());
        } else if let Some(rest) = lower.strip_prefix("switchport mode ") {
            if let Some(mode) = rest.split_whitespace().next().and_then(PortMode::from_token) {
                cfg.mode = mode;
            }
        } else if let Some(rest) = lower.strip_prefix("switchport access vlan ") {
            access_vlan = first_vlan(rest);
        } else if let Some(rest) = lower
            .strip_prefix("switchport general pvid ")
            .or_else(|| lower.strip_prefix("switchport trunk native vlan "))
        {
            native_vlan = first_vlan(rest);
        } else if let Some(rest) = lower
            .strip_prefix("switchport general allowed vlan add ")
            .or_else(|| lower.strip_prefix("switchport trunk allowed vlan add "))
            .or_else(|| lower.strip_prefix("switchport trunk allowed vlan "))
        {
            let list = rest.split_whitespace().next().unwrap_or("");
            let untagged = rest.split_whitespace().any(|w| w == "untagged");
            if !untagged {
                tagged.extend(vlan_list::expand(list));
            }
        }
    }

    if cfg.mode == PortMode::Unknown && access_vlan.is_some() {
        cfg.mode = PortMode::Access;
    }
    cfg.vlan = match cfg.mode {
        PortMode::Trunk | PortMode::General => native_vlan.or(access_vlan),
        _ => access_vlan.or(native_vlan),
    };
    tagged.sort_unstable();
    tagged.dedup();
    cfg.tagged_vlans = tagged;
    cfg
}

fn first_vlan(rest: &str) -> Option<u16> {
    rest.split_whitespace()
        .next()?
        .parse::<u16>()
        .ok()
        .filter(|v| (1..=4094).contains(v))
}

fn unquote(s: &str) -> String {
    let s = s.trim();
    let s = s
        .strip_prefix('"')
        .and_then(|v| v.strip_suffix('"'))
        .or_else(|| s.strip_prefix('\'').and_then(|v| v.strip_suffix('\'')))
        .unwrap_or(s);
    s.trim().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn access_port() {
        let raw = "interface Gi1/0/5\ndescription \"Room 101 desk\"\nswitchport access vlan 100\nexit\n";
        let cfg = parse_port_config(raw);
        assert_eq!(cfg.description, "Room 101 desk");
        assert_eq!(cfg.mode, PortMode::Access);
        assert_eq!(cfg.vlan, Some(100));
        assert!(cfg.tagged_vlans.is_empty());
    }

    #[test]
    fn general_port_with_tagged_lists() {
        let raw = "\
interface Gi1/0/12
description 'AP-Lobby'
switchport mode general
switchport general pvid 20
switchport general allowed vlan add 20 untagged
switchport general allowed vlan add 30,40-42 tagged
exit";
        let cfg = parse_port_config(raw);
        assert_eq!(cfg.mode, PortMode::General);
        assert_eq!(cfg.vlan, Some(20));
        assert_eq!(cfg.tagged_vlans, vec![30, 40, 41, 42]);
        assert_eq!(cfg.description, "AP-Lobby");
    }

    #[test]
    fn trunk_port() {
        let raw = "switchport mode trunk\nswitchport trunk native vlan 5\nswitchport trunk allowed vlan 5,10-11\n";
        let cfg = parse_port_config(raw);
        assert_eq!(cfg.mode, PortMode::Trunk);
        assert_eq!(cfg.vlan, Some(5));
        assert_eq!(cfg.tagged_vlans, vec![5, 10, 11]);
    }

    #[test]
    fn empty_block_defaults() {
        assert_eq!(parse_port_config(""), PortConfig::default());
        assert_eq!(parse_port_config("% Invalid input detected"), PortConfig::default());
    }
}
