// `show vlan id <n>` parser: does the VLAN exist, and under which name

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VlanInfo {
    pub exists: bool,
    pub name: Option<String>,
}

pub fn parse_vlan_show(raw: &str, vlan_id: u16) -> VlanInfo {
    let id = vlan_id.to_string();
    for line in raw.lines() {
        let mut fields = line.split_whitespace();
        if fields.next() != Some(id.as_str()) {
            continue;
        }
        let name = fields.next().map(str::to_string);
        return VlanInfo { exists: true, name };
    }
    VlanInfo {
        exists: false,
        name: None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn existing_vlan_with_name() {
        let raw = "
VLAN   Name                             Ports          Type
-----  ---------------                  -------------  --------------
100    Users                            Gi1/0/1-5      Static
";
        assert_eq!(
            parse_vlan_show(raw, 100),
            VlanInfo {
                exists: true,
                name: Some("Users".into())
            }
        );
    }

    #[test]
    fn missing_vlan() {
        let raw = "ERROR: This VLAN does not exist.\n";
        assert!(!parse_vlan_show(raw, 100).exists);
        assert!(!parse_vlan_show("", 100).exists);
    }
}
