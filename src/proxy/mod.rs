//! D-Bus proxies for the supplicant and the hostname service.

pub mod hostname;
pub mod interface;
pub mod p2p_device;
pub mod peer;
pub mod supplicant;
