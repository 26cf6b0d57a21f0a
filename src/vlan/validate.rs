// Input validation for VLAN changes. Every field checked here ends up in device command text.

use std::collections::HashSet;
use std::sync::LazyLock;

use regex::Regex;

use crate::error::ValidationError;
use crate::models::VlanChangeRequest;
use crate::parsers::InterfaceName;

/// Upper bound on ports in one request.
pub const MAX_PORTS: usize = 256;

/// Reserved by the switch OS (legacy token ring / FDDI defaults).
pub const RESERVED_VLANS: std::ops::RangeInclusive<u16> = 1002..=1005;

static VLAN_NAME: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[A-Za-z0-9_.-]{1,32}$").expect("VLAN name regex"));

static DESCRIPTION: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[A-Za-z0-9_.,:/#@() -]{1,64}$").expect("description regex")
});

/// A request that passed every rule. Only this type reaches the device.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidatedRequest {
    pub ports: Vec<InterfaceName>,
    pub vlan_id: u16,
    pub vlan_name: Option<String>,
    pub description: Option<String>,
}

/// Rules run in order; the first failure is returned.
pub fn validate_request(request: &VlanChangeRequest) -> Result<ValidatedRequest, ValidationError> {
    let ports = expand_port_spec(&request.ports)?;
    validate_vlan_id(request.vlan_id)?;
    let vlan_name = match non_blank(&request.vlan_name) {
        Some(name) if VLAN_NAME.is_match(name) => Some(name.to_string()),
        Some(_) => return Err(ValidationError::VlanName),
        None => None,
    };
    let description = match non_blank(&request.description) {
        Some(text) if DESCRIPTION.is_match(text) => Some(text.to_string()),
        Some(_) => return Err(ValidationError::Description),
        None => None,
    };
    Ok(ValidatedRequest {
        ports,
        vlan_id: request.vlan_id,
        vlan_name,
        description,
    })
}

fn non_blank(value: &Option<String>) -> Option<&str> {
    value.as_deref().map(str::trim).filter(|s| !s.is_empty())
}

pub fn validate_vlan_id(vlan_id: u16) -> Result<(), ValidationError> {
    if !(1..=4094).contains(&vlan_id) || RESERVED_VLANS.contains(&vlan_id) {
        return Err(ValidationError::VlanId(vlan_id));
    }
    Ok(())
}

/// Expands `Gi1/0/1-Gi1/0/3,Gi1/0/7` or `Gi1/0/1-3` into individual ports, first-seen order,
/// duplicates removed.
pub fn expand_port_spec(spec: &str) -> Result<Vec<InterfaceName>, ValidationError> {
    let invalid = || ValidationError::PortSpec(spec.to_string());
    let mut seen = HashSet::new();
    let mut out = Vec::new();
    for item in spec.split(',').map(str::trim) {
        if item.is_empty() {
            return Err(invalid());
        }
        for port in expand_item(item).ok_or_else(invalid)? {
            if seen.insert(port.to_string().to_ascii_lowercase()) {
                out.push(port);
            }
            if out.len() > MAX_PORTS {
                return Err(invalid());
            }
        }
    }
    if out.is_empty() {
        return Err(invalid());
    }
    Ok(out)
}

fn expand_item(item: &str) -> Option<Vec<InterfaceName>> {
    if let Some(single) = InterfaceName::parse(item) {
        return Some(vec![single]);
    }
    // Prefixes may contain '-' (`Port-channel`), so try every split point.
    item.match_indices('-').find_map(|(i, _)| {
        let first = InterfaceName::parse(&item[..i])?;
        let right = &item[i + 1..];
        let last_number = if right.chars().all(|c| c.is_ascii_digit()) {
            right.parse::<u32>().ok()?
        } else {
            let last = InterfaceName::parse(right)?;
            if !first.same_group(&last) {
                return None;
            }
            last.number
        };
        if last_number < first.number || (last_number - first.number) as usize >= MAX_PORTS {
            return None;
        }
        Some(
            (first.number..=last_number)
                .map(|number| InterfaceName {
                    number,
                    ..first.clone()
                })
                .collect(),
        )
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn names(spec: &str) -> Vec<String> {
        expand_port_spec(spec)
            .unwrap()
            .iter()
            .map(|p| p.to_string())
            .collect()
    }

    #[test]
    fn full_and_short_ranges() {
        assert_eq!(names("Gi1/0/1-Gi1/0/3"), ["Gi1/0/1", "Gi1/0/2", "Gi1/0/3"]);
        assert_eq!(names("Gi1/0/1-2, Gi1/0/2,Te1/0/1"), ["Gi1/0/1", "Gi1/0/2", "Te1/0/1"]);
    }

    #[test]
    fn bad_specs() {
        for spec in [
            "",
            "Gi1/0/1,",
            "Gi1/0/3-Gi1/0/1",
            "Gi1/0/1-Gi2/0/3",
            "Gi1/0/1;reload",
            "Gi1/0/1\nshutdown",
            "Gi1/0/1-9999",
        ] {
            assert!(expand_port_spec(spec).is_err(), "{spec:?} should be rejected");
        }
    }

    #[test]
    fn vlan_id_bounds() {
        assert!(validate_vlan_id(1).is_ok());
        assert!(validate_vlan_id(4094).is_ok());
        assert_eq!(validate_vlan_id(0), Err(ValidationError::VlanId(0)));
        assert_eq!(validate_vlan_id(4095), Err(ValidationError::VlanId(4095)));
        assert_eq!(validate_vlan_id(1003), Err(ValidationError::VlanId(1003)));
    }

    #[test]
    fn free_text_whitelist() {
        let mut req = VlanChangeRequest {
            ports: "Gi1/0/1".into(),
            vlan_id: 100,
            vlan_name: Some("Users_2".into()),
            description: Some("Room 101 (east)".into()),
            ..Default::default()
        };
        assert!(validate_request(&req).is_ok());

        req.vlan_name = Some("Users\"; reload".into());
        assert_eq!(validate_request(&req), Err(ValidationError::VlanName));

        req.vlan_name = None;
        req.description = Some("desk\nend".into());
        assert_eq!(validate_request(&req), Err(ValidationError::Description));
    }

    #[test]
    fn first_failing_rule_wins() {
        let req = VlanChangeRequest {
            ports: "bogus".into(),
            vlan_id: 0,
            ..Default::default()
        };
        assert!(matches!(
            validate_request(&req),
            Err(ValidationError::PortSpec(_))
        ));
    }
}
