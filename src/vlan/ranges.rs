// Interface range compaction: consecutive ports of one group become a single range command

use std::fmt;

use crate::parsers::InterfaceName;

/// `first` through `last` inclusive, all in `first`'s group.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InterfaceRange {
    pub first: InterfaceName,
    pub last: u32,
}

impl InterfaceRange {
    pub fn is_single(&self) -> bool {
        self.first.number == self.last
    }

    pub fn ports(&self) -> Vec<InterfaceName> {
        (self.first.number..=self.last)
            .map(|number| InterfaceName {
                number,
                ..self.first.clone()
            })
            .collect()
    }
}

/// Range syntax accepted by `interface range`: `Gi1/0/1-4`.
impl fmt::Display for InterfaceRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_single() {
            write!(f, "{}", self.first)
        } else {
            write!(f, "{}-{}", self.first, self.last)
        }
    }
}

fn sort_key(p: &InterfaceName) -> (String, String, u32) {
    (p.prefix.to_ascii_lowercase(), p.group.clone(), p.number)
}

/// Sorts, dedups and merges. Recomputed per change, never stored.
pub fn compact(ports: &[InterfaceName]) -> Vec<InterfaceRange> {
    let mut sorted: Vec<&InterfaceName> = ports.iter().collect();
    sorted.sort_by_key(|p| sort_key(p));
    sorted.dedup_by_key(|p| sort_key(p));

    let mut out: Vec<InterfaceRange> = Vec::new();
    for port in sorted {
        if let Some(current) = out.last_mut()
            && current.first.same_group(port)
            && port.number == current.last + 1
        {
            current.last = port.number;
            continue;
        }
        out.push(InterfaceRange {
            first: port.clone(),
            last: port.number,
        });
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ports(names: &[&str]) -> Vec<InterfaceName> {
        names.iter().map(|n| InterfaceName::parse(n).unwrap()).collect()
    }

    fn rendered(names: &[&str]) -> Vec<String> {
        compact(&ports(names)).iter().map(|r| r.to_string()).collect()
    }

    #[test]
    fn consecutive_ports_merge() {
        assert_eq!(
            rendered(&["Gi1/0/3", "Gi1/0/1", "Gi1/0/2", "Gi1/0/7"]),
            ["Gi1/0/1-3", "Gi1/0/7"]
        );
    }

    #[test]
    fn groups_never_merge() {
        assert_eq!(
            rendered(&["Gi1/0/48", "Gi2/0/1", "Te1/0/1", "Te1/0/2"]),
            ["Gi1/0/48", "Gi2/0/1", "Te1/0/1-2"]
        );
    }

    #[test]
    fn duplicates_collapse() {
        let r = compact(&ports(&["Gi1/0/5", "gi1/0/5", "Gi1/0/6"]));
        assert_eq!(r.len(), 1);
        assert_eq!(r[0].ports().len(), 2);
    }
}
