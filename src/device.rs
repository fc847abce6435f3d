//! Peer device model and registry.

use std::collections::HashMap;
use std::net::Ipv4Addr;
use std::sync::Arc;

use macaddr::MacAddr6;
use zbus::zvariant::OwnedObjectPath;

use crate::property::Property;
use crate::types::{DeviceRole, DeviceState};

/// A remote peer known to the connection manager.
///
/// The registry owns every device; the active connection attempt holds one
/// additional reference. All mutable fields are updated on the session task
/// only, so readers never observe a half applied transition.
#[derive(Debug)]
pub struct NetworkDevice {
    object_path: OwnedObjectPath,
    address: MacAddr6,
    /// Friendly name the peer announces.
    pub name: Property<String>,
    /// Role the local endpoint plays in the group with this peer.
    pub role: Property<DeviceRole>,
    /// Address the peer got assigned during configuration.
    pub ipv4: Property<Option<Ipv4Addr>>,
    /// Lifecycle of the connection attempt towards this peer.
    pub state: Property<DeviceState>,
}

impl NetworkDevice {
    pub(crate) fn new(object_path: OwnedObjectPath, name: String, address: MacAddr6) -> Arc<Self> {
        Arc::new(Self {
            object_path,
            address,
            name: Property::new(name),
            role: Property::new(DeviceRole::None),
            ipv4: Property::new(None),
            state: Property::new(DeviceState::Idle),
        })
    }

    /// Supplicant object path identifying the peer.
    pub fn object_path(&self) -> &OwnedObjectPath {
        &self.object_path
    }

    /// P2P device address of the peer.
    pub fn address(&self) -> MacAddr6 {
        self.address
    }
}

impl PartialEq for NetworkDevice {
    fn eq(&self, other: &Self) -> bool {
        self.object_path == other.object_path
    }
}

impl Eq for NetworkDevice {}

/// Peer table keyed by supplicant object path.
#[derive(Debug, Default)]
pub(crate) struct DeviceRegistry {
    devices: HashMap<OwnedObjectPath, Arc<NetworkDevice>>,
}

impl DeviceRegistry {
    pub(crate) fn contains(&self, path: &OwnedObjectPath) -> bool {
        self.devices.contains_key(path)
    }

    pub(crate) fn insert(&mut self, device: Arc<NetworkDevice>) {
        self.devices.insert(device.object_path().clone(), device);
    }

    pub(crate) fn remove(&mut self, path: &OwnedObjectPath) -> Option<Arc<NetworkDevice>> {
        self.devices.remove(path)
    }

    /// Looks a device up by address; the first match wins.
    pub(crate) fn find(&self, address: MacAddr6) -> Option<Arc<NetworkDevice>> {
        self.devices
            .values()
            .find(|device| device.address() == address)
            .cloned()
    }

    pub(crate) fn snapshot(&self) -> Vec<Arc<NetworkDevice>> {
        self.devices.values().cloned().collect()
    }

    /// Empties the table, handing the removed devices back.
    pub(crate) fn clear(&mut self) -> Vec<Arc<NetworkDevice>> {
        self.devices.drain().map(|(_, device)| device).collect()
    }
}
