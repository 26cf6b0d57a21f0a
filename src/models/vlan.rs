// VLAN mutation request and report types

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VlanChangeRequest {
    /// Port specification, e.g. `Gi1/0/1-Gi1/0/3,Gi1/0/7`.
    pub ports: String,
    pub vlan_id: u16,
    #[serde(default)]
    pub vlan_name: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    /// Allow uplink / port-channel ports in the target set.
    #[serde(default)]
    pub override_uplink: bool,
    /// Proceed even when link-up non-access ports are in the target set.
    #[serde(default)]
    pub force: bool,
    /// Drop link-up non-access ports from the target set instead of asking.
    #[serde(default)]
    pub skip_unsafe: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum VlanAction {
    Created,
    Renamed,
    Existing,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PortFailure {
    pub port: String,
    pub reason: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VlanChangeReport {
    pub vlan_id: u16,
    pub vlan_action: VlanAction,
    pub ports_changed: Vec<String>,
    /// Already at the target VLAN; no command issued.
    pub ports_already_set: Vec<String>,
    pub ports_skipped_unsafe: Vec<String>,
    pub ports_excluded_uplink: Vec<String>,
    pub ports_failed: Vec<PortFailure>,
    /// Interface expressions actually sent, e.g. `Gi1/0/1-3`.
    pub ranges_applied: Vec<String>,
}

/// Terminal state of the workflow.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "result", rename_all = "snake_case")]
pub enum VlanChangeResult {
    Completed(VlanChangeReport),
    ConfirmationNeeded {
        blocking: Vec<String>,
        safe: Vec<String>,
    },
    /// `kind` is one of the error taxonomy tags (validation_error, connection_rejected, ...).
    Failed { kind: String, message: String },
}
