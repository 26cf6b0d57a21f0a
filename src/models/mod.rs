// Domain models: devices, lookup key, port state, outcomes, VLAN change types

mod device;
mod mac;
mod outcome;
mod port;
mod vlan;

pub use device::{Credentials, Device, DeviceRef};
pub use mac::{MacAddress, strip_separators};
pub use outcome::{TraceBatch, TraceOutcome};
pub use port::{Caution, CautionKind, PortMode, PortRecord, PortStatus, PortType};
pub use vlan::{
    PortFailure, VlanAction, VlanChangeReport, VlanChangeRequest, VlanChangeResult,
};
