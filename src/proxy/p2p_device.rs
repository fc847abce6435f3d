//! P2P operations of a supplicant interface.
//!
//! The same interface object exists on the management interface (where we
//! discover and connect) and on a group interface (where only `Disconnect`
//! is of interest).

use std::collections::HashMap;

use zbus::{
    proxy,
    zvariant::{OwnedObjectPath, OwnedValue, Value},
};

/// P2P device surface of an interface.
#[proxy(
    default_service = "fi.w1.wpa_supplicant1",
    interface = "fi.w1.wpa_supplicant1.Interface.P2PDevice"
)]
pub trait P2PDevice {
    /// Starts discovery of P2P peers.
    ///
    /// # Arguments
    /// * `args` - Discovery arguments; `Timeout` is in seconds.
    fn find(&self, args: HashMap<&str, Value<'_>>) -> zbus::Result<()>;

    /// Stops an ongoing discovery.
    fn stop_find(&self) -> zbus::Result<()>;

    /// Starts group formation towards a peer.
    ///
    /// Returns the generated PIN when the chosen WPS method produces one.
    fn connect(&self, args: HashMap<&str, Value<'_>>) -> zbus::Result<String>;

    /// Aborts an ongoing group formation.
    fn cancel(&self) -> zbus::Result<()>;

    /// Drops peer and service state the supplicant has accumulated.
    fn flush(&self) -> zbus::Result<()>;

    /// Leaves the group this interface belongs to.
    fn disconnect(&self) -> zbus::Result<()>;

    /// Device configuration dictionary (DeviceName, PrimaryDeviceType, ...).
    #[zbus(property, name = "P2PDeviceConfig")]
    fn p2p_device_config(&self) -> zbus::Result<HashMap<String, OwnedValue>>;

    /// Updates parts of the device configuration.
    #[zbus(property, name = "P2PDeviceConfig")]
    fn set_p2p_device_config(&self, config: HashMap<&str, Value<'_>>) -> zbus::Result<()>;

    /// Discovered peers.
    #[zbus(property)]
    fn peers(&self) -> zbus::Result<Vec<OwnedObjectPath>>;

    /// Emitted when a peer was discovered.
    #[zbus(signal)]
    fn device_found(&self, path: OwnedObjectPath) -> zbus::Result<()>;

    /// Emitted when a peer expired from the supplicant's view.
    #[zbus(signal)]
    fn device_lost(&self, path: OwnedObjectPath) -> zbus::Result<()>;

    /// Emitted when discovery ended.
    #[zbus(signal)]
    fn find_stopped(&self) -> zbus::Result<()>;

    /// Emitted when GO negotiation with a peer succeeded.
    #[zbus(signal, name = "GONegotiationSuccess")]
    fn go_negotiation_success(
        &self,
        properties: HashMap<String, OwnedValue>,
    ) -> zbus::Result<()>;

    /// Emitted when GO negotiation with a peer failed.
    #[zbus(signal, name = "GONegotiationFailure")]
    fn go_negotiation_failure(
        &self,
        properties: HashMap<String, OwnedValue>,
    ) -> zbus::Result<()>;

    /// Emitted when a peer wants to form a group with us.
    #[zbus(signal, name = "GONegotiationRequest")]
    fn go_negotiation_request(
        &self,
        path: OwnedObjectPath,
        dev_passwd_id: u16,
        device_go_intent: u8,
    ) -> zbus::Result<()>;

    /// Emitted when a group came up; the properties carry the group and
    /// interface objects and our role.
    #[zbus(signal)]
    fn group_started(&self, properties: HashMap<String, OwnedValue>) -> zbus::Result<()>;

    /// Emitted when a group was torn down.
    #[zbus(signal)]
    fn group_finished(&self, properties: HashMap<String, OwnedValue>) -> zbus::Result<()>;

    /// Emitted when group formation was aborted before a group existed.
    #[zbus(signal)]
    fn group_formation_failure(&self, reason: String) -> zbus::Result<()>;
}
