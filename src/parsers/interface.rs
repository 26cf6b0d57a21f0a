// Interface names: `Gi1/0/5`, `Te1/0/1`, `Po12`

use std::fmt;
use std::sync::LazyLock;

use regex::Regex;

static INTERFACE_NAME: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^([A-Za-z][A-Za-z-]{0,24}?)((?:\d{1,3}/){0,3})(\d{1,4})$").expect("interface regex")
});

/// Parsed interface: alphabetic prefix, slash-delimited group path, final port number.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct InterfaceName {
    pub prefix: String,
    /// Everything between the prefix and the port number, e.g. `1/0/`. Empty for `Po1`.
    pub group: String,
    pub number: u32,
}

impl InterfaceName {
    pub fn parse(raw: &str) -> Option<Self> {
        let caps = INTERFACE_NAME.captures(raw.trim())?;
        Some(Self {
            prefix: caps.get(1)?.as_str().to_string(),
            group: caps.get(2).map(|m| m.as_str().to_string()).unwrap_or_default(),
            number: caps.get(3)?.as_str().parse().ok()?,
        })
    }

    /// Ports in the same physical group can be combined into one range.
    pub fn same_group(&self, other: &InterfaceName) -> bool {
        self.prefix.eq_ignore_ascii_case(&other.prefix) && self.group == other.group
    }

    pub fn is_port_channel(&self) -> bool {
        let p = self.prefix.to_ascii_lowercase();
        p == "po" || p.starts_with("port-channel") || p == "ch" || p == "lag"
    }
}

impl fmt::Display for InterfaceName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}{}", self.prefix, self.group, self.number)
    }
}

/// Rejects header words (`Port`, `Interface`) and separators that share the first column.
pub fn looks_like_port(token: &str) -> bool {
    InterfaceName::parse(token).is_some()
}
