//! Messages flowing through the connection manager.
//!
//! Supplicant signals, DHCP progress, hostname changes, API calls and the
//! connect timer all become messages processed by the session task;
//! collaborators never touch state directly.

use std::net::Ipv4Addr;
use std::sync::Arc;
use std::time::Duration;

use macaddr::MacAddr6;
use tokio::sync::{mpsc, oneshot};
use zbus::zvariant::OwnedObjectPath;

use crate::device::NetworkDevice;
use crate::error::Error;
use crate::types::Capability;

/// Notifications delivered to the upper layer.
#[derive(Debug, Clone)]
pub enum NetworkEvent {
    /// A peer finished its property fetch and entered the device table.
    DeviceFound(Arc<NetworkDevice>),
    /// A peer disappeared.
    DeviceLost(Arc<NetworkDevice>),
    /// A peer attribute changed (role, assigned address, name).
    DeviceChanged(Arc<NetworkDevice>),
    /// The connection lifecycle state of a peer changed.
    DeviceStateChanged(Arc<NetworkDevice>),
    /// Peer discovery started or stopped.
    ScanningChanged(bool),
}

/// GO negotiation outcome as reported by the supplicant.
#[derive(Debug, Clone, Default)]
pub(crate) struct NegotiationOutcome {
    pub(crate) peer: Option<OwnedObjectPath>,
    pub(crate) status: i32,
    pub(crate) oper_freq: i32,
    pub(crate) frequencies: Vec<i32>,
    pub(crate) wps_method: String,
}

/// Messages processed by the session task.
#[derive(Debug)]
pub(crate) enum Event {
    /// The supplicant claimed its bus name.
    ServiceAppeared,
    /// The supplicant dropped off the bus.
    ServiceVanished,
    /// The supplicant registered an interface.
    InterfaceAdded(OwnedObjectPath),
    /// The supplicant deregistered an interface.
    InterfaceRemoved(OwnedObjectPath),
    /// A peer appeared in discovery.
    PeerFound(OwnedObjectPath),
    /// A peer expired from the supplicant's view.
    PeerLost(OwnedObjectPath),
    /// A peer's properties were fetched; it can be announced now.
    PeerReady {
        path: OwnedObjectPath,
        name: String,
        address: MacAddr6,
    },
    /// Discovery ended.
    FindStopped,
    GoNegotiationSuccess(NegotiationOutcome),
    GoNegotiationFailure(NegotiationOutcome),
    /// Group formation was aborted before a group existed.
    PeerConnectFailed { reason: String },
    /// A peer asked us to form a group.
    GroupRequest {
        peer: OwnedObjectPath,
        dev_passwd_id: u16,
    },
    GroupStarted {
        group: OwnedObjectPath,
        interface: OwnedObjectPath,
        role: String,
    },
    GroupFinished {
        group: OwnedObjectPath,
        interface: OwnedObjectPath,
    },
    /// The group interface proxies are up and its ifname is known.
    GroupInterfaceReady { token: u64, ifname: String },
    /// The group interface could not be set up.
    GroupInterfaceFailed { token: u64, reason: String },
    DhcpAddressAssigned {
        token: u64,
        local: Ipv4Addr,
        remote: Ipv4Addr,
    },
    DhcpTerminated { token: u64 },
    /// The connect clock of the attempt identified by `token` expired.
    ConnectTimeout { token: u64 },
    /// Any hostname1 property changed.
    HostnameChanged,
    /// Test barrier: replies once every earlier event was handled.
    #[cfg(test)]
    Sync(oneshot::Sender<()>),
}

/// Sender half of the session queue, handed to collaborators.
pub(crate) type EventSender = mpsc::UnboundedSender<Event>;

/// API requests forwarded to the session task.
#[derive(Debug)]
pub(crate) enum Command {
    Scan {
        timeout: Duration,
        reply: oneshot::Sender<Result<(), Error>>,
    },
    Connect {
        address: MacAddr6,
        reply: oneshot::Sender<Result<(), Error>>,
    },
    Disconnect {
        address: MacAddr6,
        reply: oneshot::Sender<Result<(), Error>>,
    },
    SetCapabilities {
        capabilities: Vec<Capability>,
        reply: oneshot::Sender<()>,
    },
    Release {
        reply: oneshot::Sender<()>,
    },
}
