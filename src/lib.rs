//! castlink - Wi-Fi Display P2P connection management.
//!
//! Drives a wpa_supplicant style D-Bus service to discover Miracast peers,
//! negotiate a P2P group, bring IPv4 addressing onto the group link and
//! advertise Wi-Fi Display capabilities in management frames. The embedding
//! application deals with [`NetworkDevice`]s and [`NetworkEvent`]s; the
//! radio, DHCP endpoints and firmware loading stay behind narrow seams.

pub mod config;
pub mod device;
pub mod dhcp;
pub mod error;
pub mod firmware;
pub mod property;
pub mod proxy;
pub mod types;
pub mod wfd;
pub mod wps;

mod events;
mod host;
mod link;
mod net;
mod selector;
mod service;
mod session;

pub use config::Config;
pub use device::NetworkDevice;
pub use error::Error;
pub use events::NetworkEvent;
pub use service::P2pService;
pub use types::{Capability, DeviceRole, DeviceState};
