//! P2P peer objects announced by the supplicant.

use zbus::proxy;

/// A discovered P2P peer.
#[proxy(
    default_service = "fi.w1.wpa_supplicant1",
    interface = "fi.w1.wpa_supplicant1.Peer"
)]
pub trait Peer {
    /// Friendly name the peer announces.
    #[zbus(property)]
    fn device_name(&self) -> zbus::Result<String>;

    /// P2P device address of the peer (six bytes).
    #[zbus(property)]
    fn device_address(&self) -> zbus::Result<Vec<u8>>;
}
