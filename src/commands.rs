// Device CLI dialect. The only place outbound command text is built.
//
// Every interpolated value is validated before it gets here: MAC addresses are
// `MacAddress`, VLAN names and descriptions passed the workflow whitelist, port
// names came out of `InterfaceName`.

use crate::models::MacAddress;

pub const DISABLE_PAGING: &str = "terminal length 0";
pub const SHOW_INTERFACES_STATUS: &str = "show interfaces status";
pub const CONFIGURE: &str = "configure";
pub const EXIT: &str = "exit";
pub const END: &str = "end";
pub const LOGOUT: &str = "exit";
pub const SWITCHPORT_MODE_ACCESS: &str = "switchport mode access";

pub fn show_mac_address(mac: &MacAddress) -> String {
    format!("show mac address-table address {}", mac.dotted())
}

pub fn show_running_interface(port: &str) -> String {
    format!("show running-config interface {}", port)
}

pub fn show_interface_status(port: &str) -> String {
    format!("show interfaces status {}", port)
}

pub fn show_vlan(vlan_id: u16) -> String {
    format!("show vlan id {}", vlan_id)
}

/// Enters VLAN database context; follow with [`vlan_name`] and [`EXIT`].
pub fn vlan(vlan_id: u16) -> String {
    format!("vlan {}", vlan_id)
}

pub fn vlan_name(name: &str) -> String {
    format!("name \"{}\"", name)
}

pub fn interface(port: &str) -> String {
    format!("interface {}", port)
}

pub fn interface_range(range: &str) -> String {
    format!("interface range {}", range)
}

pub fn switchport_access_vlan(vlan_id: u16) -> String {
    format!("switchport access vlan {}", vlan_id)
}

pub fn description(text: &str) -> String {
    format!("description \"{}\"", text)
}
