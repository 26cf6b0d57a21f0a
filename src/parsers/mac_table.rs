// Address-table parser: finds the row for one MAC in `show mac address-table` output

use crate::models::{MacAddress, strip_separators};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MacEntry {
    pub vlan: u16,
    pub entry_type: String,
    pub port: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MacLookup {
    Found(MacEntry),
    NotFound(String),
}

pub const REASON_NOT_FOUND: &str = "MAC address not found";
pub const REASON_NO_OUTPUT: &str = "MAC address not found (no output from device)";

/// Scans `raw` for `target`. Rows on excluded uplink ports are reported as not found.
pub fn parse_mac_table(raw: &str, target: &MacAddress, uplink_exclusions: &[String]) -> MacLookup {
    if raw.trim().is_empty() {
        return MacLookup::NotFound(REASON_NO_OUTPUT.to_string());
    }

    let mut uplink_hit: Option<String> = None;
    for line in raw.lines() {
        let Some(entry) = parse_row(line, target) else {
            continue;
        };
        if is_excluded_port(&entry.port, uplink_exclusions) {
            uplink_hit.get_or_insert(entry.port);
            continue;
        }
        return MacLookup::Found(entry);
    }

    match uplink_hit {
        Some(port) => MacLookup::NotFound(format!(
            "MAC address only learned on uplink port {}",
            port
        )),
        None => MacLookup::NotFound(REASON_NOT_FOUND.to_string()),
    }
}

/// One candidate row. Column order differs between firmware, so the address is located by
/// shape rather than position: VLAN is the first numeric field, port the last field.
fn parse_row(line: &str, target: &MacAddress) -> Option<MacEntry> {
    let trimmed = line.trim();
    if trimmed.is_empty() || trimmed.starts_with('-') {
        return None;
    }
    let fields: Vec<&str> = trimmed.split_whitespace().collect();
    if fields.len() < 3 {
        return None;
    }
    let mac_idx = fields
        .iter()
        .position(|f| strip_separators(f) == target.canonical())?;
    let port_idx = fields.len() - 1;
    if mac_idx == port_idx {
        return None;
    }
    let vlan = fields
        .iter()
        .enumerate()
        .filter(|(i, _)| *i != mac_idx)
        .find_map(|(_, f)| f.parse::<u16>().ok())
        .filter(|v| (1..=4094).contains(v))?;
    let entry_type = fields
        .iter()
        .enumerate()
        .filter(|(i, f)| *i != mac_idx && *i != port_idx && f.parse::<u16>().is_err())
        .map(|(_, f)| f.to_string())
        .next()
        .unwrap_or_else(|| "Unknown".to_string());

    Some(MacEntry {
        vlan,
        entry_type,
        port: fields[port_idx].to_string(),
    })
}

/// Exact port names match case-insensitively; purely alphabetic entries (`Po`, `Te`) are prefixes.
pub fn is_excluded_port(port: &str, exclusions: &[String]) -> bool {
    let port_lower = port.to_ascii_lowercase();
    exclusions.iter().any(|entry| {
        let entry_lower = entry.to_ascii_lowercase();
        if entry_lower.chars().all(|c| c.is_ascii_alphabetic()) {
            port_lower.starts_with(&entry_lower)
                && port_lower[entry_lower.len()..]
                    .chars()
                    .next()
                    .is_some_and(|c| c.is_ascii_digit())
        } else {
            port_lower == entry_lower
        }
    })
}
