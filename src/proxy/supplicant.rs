//! wpa_supplicant root interface.

use std::collections::HashMap;

use zbus::{
    proxy,
    zvariant::{OwnedObjectPath, OwnedValue, Value},
};

/// Bus name the radio owner claims on the system bus.
pub const SERVICE_NAME: &str = "fi.w1.wpa_supplicant1";

/// The supplicant manager object.
#[proxy(
    default_service = "fi.w1.wpa_supplicant1",
    interface = "fi.w1.wpa_supplicant1",
    default_path = "/fi/w1/wpa_supplicant1"
)]
pub trait Supplicant {
    /// Registers a network interface with the supplicant.
    ///
    /// # Arguments
    /// * `args` - Creation arguments; `Ifname` is mandatory.
    fn create_interface(&self, args: HashMap<&str, Value<'_>>) -> zbus::Result<OwnedObjectPath>;

    /// Returns the object path of an already registered interface.
    fn get_interface(&self, ifname: &str) -> zbus::Result<OwnedObjectPath>;

    /// Capabilities of the supplicant build (e.g. "p2p").
    #[zbus(property)]
    fn capabilities(&self) -> zbus::Result<Vec<String>>;

    /// Object paths of all registered interfaces.
    #[zbus(property)]
    fn interfaces(&self) -> zbus::Result<Vec<OwnedObjectPath>>;

    /// Wi-Fi Display subelements added to management frames.
    #[zbus(property, name = "WFDIEs")]
    fn wfd_ies(&self) -> zbus::Result<Vec<u8>>;

    /// Replaces the published Wi-Fi Display subelements.
    #[zbus(property, name = "WFDIEs")]
    fn set_wfd_ies(&self, ies: &[u8]) -> zbus::Result<()>;

    /// Emitted when an interface was registered.
    #[zbus(signal)]
    fn interface_added(
        &self,
        path: OwnedObjectPath,
        properties: HashMap<String, OwnedValue>,
    ) -> zbus::Result<()>;

    /// Emitted when an interface was deregistered.
    #[zbus(signal)]
    fn interface_removed(&self, path: OwnedObjectPath) -> zbus::Result<()>;
}
