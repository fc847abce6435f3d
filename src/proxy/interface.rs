//! Per interface control object of the supplicant.

use zbus::proxy;

/// A network interface managed by the supplicant.
#[proxy(
    default_service = "fi.w1.wpa_supplicant1",
    interface = "fi.w1.wpa_supplicant1.Interface"
)]
pub trait Interface {
    /// Kernel name of the interface.
    #[zbus(property)]
    fn ifname(&self) -> zbus::Result<String>;

    /// Driver backing the interface.
    #[zbus(property)]
    fn driver(&self) -> zbus::Result<String>;

    /// Supplicant state of the interface.
    #[zbus(property)]
    fn state(&self) -> zbus::Result<String>;
}
