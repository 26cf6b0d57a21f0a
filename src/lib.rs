// Library for tests to access modules

pub mod audit;
pub mod classify;
pub mod commands;
pub mod config;
pub mod device_limits;
pub mod error;
pub mod inventory;
pub mod load;
pub mod models;
pub mod orchestrator;
pub mod parsers;
pub mod routes;
pub mod transport;
pub mod version;
pub mod vlan;
