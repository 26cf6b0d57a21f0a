// Device inventory: read-only lookup of devices by group or address

use std::collections::BTreeMap;

use crate::config::GroupConfig;
use crate::models::Device;

pub trait Inventory: Send + Sync + 'static {
    /// Devices of one logical group, or `None` when the group is unknown.
    fn devices(&self, group: &str) -> Option<Vec<Device>>;

    fn find_device(&self, address: &str) -> Option<Device>;

    fn groups(&self) -> Vec<String>;
}

/// Inventory loaded once from the `[[groups]]` config tables.
#[derive(Debug, Clone, Default)]
pub struct StaticInventory {
    groups: BTreeMap<String, Vec<Device>>,
}

impl StaticInventory {
    pub fn from_config(groups: &[GroupConfig]) -> Self {
        let mut map: BTreeMap<String, Vec<Device>> = BTreeMap::new();
        for g in groups {
            map.entry(g.name.clone())
                .or_default()
                .extend(g.devices.iter().cloned());
        }
        Self { groups: map }
    }
}

impl Inventory for StaticInventory {
    fn devices(&self, group: &str) -> Option<Vec<Device>> {
        self.groups.get(group).cloned()
    }

    fn find_device(&self, address: &str) -> Option<Device> {
        self.groups
            .values()
            .flatten()
            .find(|d| d.address.eq_ignore_ascii_case(address))
            .cloned()
    }

    fn groups(&self) -> Vec<String> {
        self.groups.keys().cloned().collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn inventory() -> StaticInventory {
        StaticInventory::from_config(&[
            GroupConfig {
                name: "bldg-a".into(),
                devices: vec![Device::new("10.0.0.1", "a-1", "N2048")],
            },
            GroupConfig {
                name: "bldg-a".into(),
                devices: vec![Device::new("10.0.0.2", "a-2", "N3248")],
            },
        ])
    }

    #[test]
    fn repeated_group_tables_merge() {
        let inv = inventory();
        assert_eq!(inv.devices("bldg-a").unwrap().len(), 2);
        assert!(inv.devices("bldg-b").is_none());
        assert_eq!(inv.groups(), vec!["bldg-a".to_string()]);
    }

    #[test]
    fn find_by_address() {
        assert_eq!(inventory().find_device("10.0.0.2").unwrap().name, "a-2");
    }
}
