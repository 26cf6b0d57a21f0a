// Lookup key: hardware address normalized to 12 lowercase hex digits

use std::fmt;
use std::str::FromStr;
use std::sync::LazyLock;

use regex::Regex;
use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::error::ValidationError;

/// Accepted input spellings: colon or hyphen pairs, dotted quads, or bare hex.
static MAC_FORMAT: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"^(?:[0-9A-Fa-f]{2}(?::[0-9A-Fa-f]{2}){5}|[0-9A-Fa-f]{2}(?:-[0-9A-Fa-f]{2}){5}|[0-9A-Fa-f]{4}(?:\.[0-9A-Fa-f]{4}){2}|[0-9A-Fa-f]{12})$",
    )
    .expect("MAC format regex")
});

/// The only piece of user input that is forwarded into remote command text,
/// so it can only be built through [`MacAddress::parse`].
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct MacAddress(String);

impl MacAddress {
    pub fn parse(input: &str) -> Result<Self, ValidationError> {
        let trimmed = input.trim();
        if !MAC_FORMAT.is_match(trimmed) {
            return Err(ValidationError::MacAddress(input.to_string()));
        }
        Ok(Self(strip_separators(trimmed)))
    }

    /// Canonical form: `001b638445e6`.
    pub fn canonical(&self) -> &str {
        &self.0
    }

    /// Dotted form used by the switch CLI: `001b.6384.45e6`.
    pub fn dotted(&self) -> String {
        format!("{}.{}.{}", &self.0[0..4], &self.0[4..8], &self.0[8..12])
    }

    /// Colon form for display: `00:1b:63:84:45:e6`.
    pub fn colon(&self) -> String {
        self.0
            .as_bytes()
            .chunks(2)
            .map(|pair| String::from_utf8_lossy(pair).into_owned())
            .collect::<Vec<_>>()
            .join(":")
    }
}

/// Lowercase and drop `:`, `-`, `.`. Used on both user input and address-table fields.
pub fn strip_separators(raw: &str) -> String {
    raw.chars()
        .filter(|c| !matches!(c, ':' | '-' | '.'))
        .map(|c| c.to_ascii_lowercase())
        .collect()
}

impl FromStr for MacAddress {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl fmt::Display for MacAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.colon())
    }
}

impl Serialize for MacAddress {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.0)
    }
}

impl<'de> Deserialize<'de> for MacAddress {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        MacAddress::parse(&raw).map_err(serde::de::Error::custom)
    }
}
