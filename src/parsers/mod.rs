// Pure CLI output parsers. Total functions: malformed input yields an empty / not-found
// result, never an error.

pub mod interface;
pub mod mac_table;
pub mod port_config;
pub mod status_table;
pub mod vlan_list;
pub mod vlan_show;

pub use interface::InterfaceName;
pub use mac_table::{MacEntry, MacLookup, parse_mac_table};
pub use port_config::{PortConfig, parse_port_config};
pub use status_table::parse_status_table;
pub use vlan_show::{VlanInfo, parse_vlan_show};

/// Line prefixes the device uses when it refuses a command. Matched on the trimmed,
/// lowercased line.
pub const ERROR_PREFIXES: &[&str] = &[
    "%",
    "error",
    "invalid input",
    "incomplete command",
    "ambiguous command",
    "command not",
    "failed",
];

/// First line of `raw` where the device refused `command`. Echoes of the command itself never
/// count, whatever free text the command carries.
pub fn device_error<'a>(raw: &'a str, command: &str) -> Option<&'a str> {
    let sent = command.trim();
    raw.lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .filter(|line| sent.is_empty() || !line.contains(sent))
        .find(|line| {
            let lower = line.to_ascii_lowercase();
            ERROR_PREFIXES.iter().any(|p| lower.starts_with(p))
        })
}
