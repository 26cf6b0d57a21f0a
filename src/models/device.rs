// Device identity as supplied by the inventory collaborator

use serde::{Deserialize, Serialize};

/// One switch. Immutable for the duration of an operation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Device {
    pub address: String,
    pub name: String,
    /// Hardware model tag, e.g. `N3248TE`. Drives port naming and parser dialect.
    #[serde(default)]
    pub model: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub note: Option<String>,
}

impl Device {
    pub fn new(address: impl Into<String>, name: impl Into<String>, model: impl Into<String>) -> Self {
        Self {
            address: address.into(),
            name: name.into(),
            model: model.into(),
            note: None,
        }
    }

    pub fn to_ref(&self) -> DeviceRef {
        DeviceRef {
            address: self.address.clone(),
            name: self.name.clone(),
        }
    }
}

/// Identity carried in every outcome.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeviceRef {
    pub address: String,
    pub name: String,
}

/// Shared username/password for every device session.
#[derive(Clone, Deserialize)]
pub struct Credentials {
    pub username: String,
    pub password: String,
}

impl std::fmt::Debug for Credentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Credentials")
            .field("username", &self.username)
            .field("password", &"***")
            .finish()
    }
}
