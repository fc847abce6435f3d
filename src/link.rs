//! The supplicant side of the connection manager.
//!
//! [`SupplicantLink`] is the narrow surface the session task drives. The
//! production [`Supplicant`] wraps the D-Bus proxies and forwards every
//! signal into the session queue; it never advances connection state on its
//! own.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use futures::StreamExt;
use macaddr::MacAddr6;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tracing::{debug, warn};
use zbus::Connection;
use zbus::zvariant::{OwnedObjectPath, OwnedValue, Value};

use crate::error::Error;
use crate::events::{Event, EventSender, NegotiationOutcome};
use crate::net;
use crate::proxy::interface::InterfaceProxy;
use crate::proxy::p2p_device::P2PDeviceProxy;
use crate::proxy::peer::PeerProxy;
use crate::proxy::supplicant::SupplicantProxy;
use crate::types::MiracastMode;
use crate::wps;

const WPS_METHOD: &str = "pbc";
const GO_INTENT: i32 = 7;

/// Operations the session task issues towards the supplicant.
#[async_trait]
pub(crate) trait SupplicantLink: Send + Sync {
    /// Replaces the WFD subelements in management frames.
    async fn publish_wfd_ies(&self, ies: &[u8]) -> Result<(), Error>;

    /// Interfaces currently registered with the supplicant.
    async fn interfaces(&self) -> Result<Vec<OwnedObjectPath>, Error>;

    /// Asks the supplicant to register an interface by kernel name.
    async fn create_interface(&self, ifname: &str) -> Result<OwnedObjectPath, Error>;

    /// Kernel name of an interface object.
    async fn interface_name(&self, path: &OwnedObjectPath) -> Result<String, Error>;

    /// Whether the interface exposes a usable P2P device surface.
    async fn supports_p2p(&self, path: &OwnedObjectPath) -> bool;

    /// Adopts `path` as the management interface and subscribes to its
    /// P2P signals.
    async fn attach(&mut self, path: OwnedObjectPath) -> Result<(), Error>;

    /// Path of the management interface, if one is attached.
    fn attached_path(&self) -> Option<&OwnedObjectPath>;

    /// Drops the management interface and its signal subscriptions.
    async fn detach(&mut self);

    async fn flush(&self) -> Result<(), Error>;

    /// Pushes name and WPS device type into the supplicant configuration.
    async fn set_device_configuration(
        &self,
        name: &str,
        primary_device_type: &str,
    ) -> Result<(), Error>;

    async fn find(&self, timeout: Duration) -> Result<(), Error>;

    async fn stop_find(&self) -> Result<(), Error>;

    /// Starts group formation towards the peer object.
    async fn connect_peer(&self, peer: &OwnedObjectPath) -> Result<(), Error>;

    /// Aborts an ongoing group formation.
    async fn cancel_connect(&self) -> Result<(), Error>;

    /// Fetches the peer's name and address in the background; a
    /// `PeerReady` event is posted on success.
    fn fetch_peer(&self, path: OwnedObjectPath);

    /// Builds the group interface proxies in the background; a
    /// `GroupInterfaceReady` or `GroupInterfaceFailed` event stamped with
    /// `token` is posted.
    fn open_group(&mut self, interface: OwnedObjectPath, token: u64);

    /// Leaves the active group via the group interface.
    async fn group_disconnect(&self) -> Result<(), Error>;

    /// Drops the group proxies.
    async fn close_group(&mut self);

    /// Switches the driver's miracast mode on the management interface.
    /// Failures are warned about and swallowed.
    fn send_miracast_command(&self, mode: MiracastMode);
}

struct Management {
    path: OwnedObjectPath,
    ifname: String,
    p2p: P2PDeviceProxy<'static>,
    monitor: JoinHandle<()>,
}

struct GroupLink {
    p2p: P2PDeviceProxy<'static>,
}

/// Production link over the wpa_supplicant D-Bus API.
pub(crate) struct Supplicant {
    connection: Connection,
    manager: SupplicantProxy<'static>,
    events: EventSender,
    manager_monitor: JoinHandle<()>,
    management: Option<Management>,
    group: Arc<Mutex<Option<GroupLink>>>,
    group_task: Option<JoinHandle<()>>,
}

impl Supplicant {
    pub(crate) async fn new(connection: &Connection, events: EventSender) -> Result<Self, Error> {
        let manager = SupplicantProxy::new(connection).await?;
        let manager_monitor =
            tokio::spawn(monitor_manager(manager.clone(), events.clone()));

        Ok(Self {
            connection: connection.clone(),
            manager,
            events,
            manager_monitor,
            management: None,
            group: Arc::new(Mutex::new(None)),
            group_task: None,
        })
    }

    fn p2p_device(&self) -> Result<&P2PDeviceProxy<'static>, Error> {
        self.management
            .as_ref()
            .map(|management| &management.p2p)
            .ok_or(Error::NoP2pInterface)
    }
}

impl Drop for Supplicant {
    fn drop(&mut self) {
        self.manager_monitor.abort();
        if let Some(management) = self.management.take() {
            management.monitor.abort();
        }
        if let Some(task) = self.group_task.take() {
            task.abort();
        }
    }
}

#[async_trait]
impl SupplicantLink for Supplicant {
    async fn publish_wfd_ies(&self, ies: &[u8]) -> Result<(), Error> {
        Ok(self.manager.set_wfd_ies(ies).await?)
    }

    async fn interfaces(&self) -> Result<Vec<OwnedObjectPath>, Error> {
        Ok(self.manager.interfaces().await?)
    }

    async fn create_interface(&self, ifname: &str) -> Result<OwnedObjectPath, Error> {
        let mut args: HashMap<&str, Value<'_>> = HashMap::new();
        args.insert("Ifname", Value::from(ifname));
        Ok(self.manager.create_interface(args).await?)
    }

    async fn interface_name(&self, path: &OwnedObjectPath) -> Result<String, Error> {
        let interface = InterfaceProxy::new(&self.connection, path.clone()).await?;
        Ok(interface.ifname().await?)
    }

    async fn supports_p2p(&self, path: &OwnedObjectPath) -> bool {
        match P2PDeviceProxy::new(&self.connection, path.clone()).await {
            Ok(p2p) => p2p.p2p_device_config().await.is_ok(),
            Err(_) => false,
        }
    }

    async fn attach(&mut self, path: OwnedObjectPath) -> Result<(), Error> {
        if self.management.is_some() {
            return Ok(());
        }

        let interface = InterfaceProxy::new(&self.connection, path.clone()).await?;
        let ifname = interface.ifname().await?;
        let p2p = P2PDeviceProxy::new(&self.connection, path.clone()).await?;
        let monitor = tokio::spawn(monitor_p2p_device(p2p.clone(), self.events.clone()));

        self.management = Some(Management {
            path,
            ifname,
            p2p,
            monitor,
        });

        Ok(())
    }

    fn attached_path(&self) -> Option<&OwnedObjectPath> {
        self.management.as_ref().map(|management| &management.path)
    }

    async fn detach(&mut self) {
        if let Some(management) = self.management.take() {
            management.monitor.abort();
        }
        self.close_group().await;
    }

    async fn flush(&self) -> Result<(), Error> {
        Ok(self.p2p_device()?.flush().await?)
    }

    async fn set_device_configuration(
        &self,
        name: &str,
        primary_device_type: &str,
    ) -> Result<(), Error> {
        let mut config: HashMap<&str, Value<'_>> = HashMap::new();
        config.insert("DeviceName", Value::from(name));
        if let Some(device_type) = wps::primary_device_type_bytes(primary_device_type) {
            config.insert("PrimaryDeviceType", Value::from(device_type.to_vec()));
        }
        Ok(self.p2p_device()?.set_p2p_device_config(config).await?)
    }

    async fn find(&self, timeout: Duration) -> Result<(), Error> {
        let mut args: HashMap<&str, Value<'_>> = HashMap::new();
        args.insert("Timeout", Value::from(timeout.as_secs() as i32));
        Ok(self.p2p_device()?.find(args).await?)
    }

    async fn stop_find(&self) -> Result<(), Error> {
        Ok(self.p2p_device()?.stop_find().await?)
    }

    async fn connect_peer(&self, peer: &OwnedObjectPath) -> Result<(), Error> {
        let mut args: HashMap<&str, Value<'_>> = HashMap::new();
        args.insert("peer", Value::from(peer.clone().into_inner()));
        args.insert("wps_method", Value::from(WPS_METHOD));
        args.insert("go_intent", Value::from(GO_INTENT));

        let pin = self.p2p_device()?.connect(args).await?;
        if !pin.is_empty() {
            debug!(pin, "supplicant generated a WPS pin");
        }
        Ok(())
    }

    async fn cancel_connect(&self) -> Result<(), Error> {
        Ok(self.p2p_device()?.cancel().await?)
    }

    fn fetch_peer(&self, path: OwnedObjectPath) {
        let connection = self.connection.clone();
        let events = self.events.clone();

        tokio::spawn(async move {
            match fetch_peer_properties(&connection, &path).await {
                Ok((name, address)) => {
                    let _ = events.send(Event::PeerReady {
                        path,
                        name,
                        address,
                    });
                }
                Err(e) => debug!(peer = %path, error = %e, "failed to fetch peer properties"),
            }
        });
    }

    fn open_group(&mut self, interface: OwnedObjectPath, token: u64) {
        let connection = self.connection.clone();
        let events = self.events.clone();
        let slot = Arc::clone(&self.group);

        if let Some(task) = self.group_task.take() {
            task.abort();
        }
        self.group_task = Some(tokio::spawn(async move {
            let result = async {
                let iface = InterfaceProxy::new(&connection, interface.clone()).await?;
                let ifname = iface.ifname().await?;
                let p2p = P2PDeviceProxy::new(&connection, interface.clone()).await?;
                Ok::<_, zbus::Error>((ifname, p2p))
            }
            .await;

            match result {
                Ok((ifname, p2p)) => {
                    *slot.lock().await = Some(GroupLink { p2p });
                    let _ = events.send(Event::GroupInterfaceReady { token, ifname });
                }
                Err(e) => {
                    let _ = events.send(Event::GroupInterfaceFailed {
                        token,
                        reason: e.to_string(),
                    });
                }
            }
        }));
    }

    async fn group_disconnect(&self) -> Result<(), Error> {
        let group = self.group.lock().await;
        let Some(group) = group.as_ref() else {
            return Err(Error::InvalidState("no active group"));
        };
        Ok(group.p2p.disconnect().await?)
    }

    async fn close_group(&mut self) {
        if let Some(task) = self.group_task.take() {
            task.abort();
        }
        *self.group.lock().await = None;
    }

    fn send_miracast_command(&self, mode: MiracastMode) {
        let Some(management) = self.management.as_ref() else {
            return;
        };

        let command = net::miracast_mode_command(mode);
        if let Err(e) = net::send_driver_private_command(&management.ifname, &command) {
            warn!(
                ifname = %management.ifname,
                error = %e,
                "failed to switch the WiFi driver miracast mode"
            );
        }
    }
}

async fn fetch_peer_properties(
    connection: &Connection,
    path: &OwnedObjectPath,
) -> Result<(String, MacAddr6), Error> {
    let peer = PeerProxy::new(connection, path.clone()).await?;
    let name = peer.device_name().await?;
    let address = peer.device_address().await?;

    let Ok(octets) = <[u8; 6]>::try_from(address.as_slice()) else {
        return Err(Error::NegotiationFailed(format!(
            "peer {path} reported a malformed device address"
        )));
    };

    Ok((name, MacAddr6::from(octets)))
}

async fn monitor_manager(manager: SupplicantProxy<'static>, events: EventSender) {
    let mut interface_added = match manager.receive_interface_added().await {
        Ok(stream) => stream,
        Err(e) => {
            warn!(error = %e, "failed to subscribe to InterfaceAdded");
            return;
        }
    };

    let mut interface_removed = match manager.receive_interface_removed().await {
        Ok(stream) => stream,
        Err(e) => {
            warn!(error = %e, "failed to subscribe to InterfaceRemoved");
            return;
        }
    };

    loop {
        tokio::select! {
            Some(signal) = interface_added.next() => {
                if let Ok(args) = signal.args() {
                    let _ = events.send(Event::InterfaceAdded(args.path.clone()));
                }
            }
            Some(signal) = interface_removed.next() => {
                if let Ok(args) = signal.args() {
                    let _ = events.send(Event::InterfaceRemoved(args.path.clone()));
                }
            }
            else => break,
        }
    }

    debug!("supplicant manager signal streams ended");
}

#[allow(clippy::cognitive_complexity)]
async fn monitor_p2p_device(p2p: P2PDeviceProxy<'static>, events: EventSender) {
    macro_rules! subscribe {
        ($stream:ident) => {
            match p2p.$stream().await {
                Ok(stream) => stream,
                Err(e) => {
                    warn!(error = %e, "failed to subscribe to P2P device signals");
                    return;
                }
            }
        };
    }

    let mut device_found = subscribe!(receive_device_found);
    let mut device_lost = subscribe!(receive_device_lost);
    let mut find_stopped = subscribe!(receive_find_stopped);
    let mut negotiation_success = subscribe!(receive_go_negotiation_success);
    let mut negotiation_failure = subscribe!(receive_go_negotiation_failure);
    let mut negotiation_request = subscribe!(receive_go_negotiation_request);
    let mut group_started = subscribe!(receive_group_started);
    let mut group_finished = subscribe!(receive_group_finished);
    let mut formation_failure = subscribe!(receive_group_formation_failure);

    loop {
        tokio::select! {
            Some(signal) = device_found.next() => {
                if let Ok(args) = signal.args() {
                    let _ = events.send(Event::PeerFound(args.path.clone()));
                }
            }
            Some(signal) = device_lost.next() => {
                if let Ok(args) = signal.args() {
                    let _ = events.send(Event::PeerLost(args.path.clone()));
                }
            }
            Some(_) = find_stopped.next() => {
                let _ = events.send(Event::FindStopped);
            }
            Some(signal) = negotiation_success.next() => {
                if let Ok(args) = signal.args() {
                    let _ = events.send(Event::GoNegotiationSuccess(parse_negotiation(
                        &args.properties,
                    )));
                }
            }
            Some(signal) = negotiation_failure.next() => {
                if let Ok(args) = signal.args() {
                    let _ = events.send(Event::GoNegotiationFailure(parse_negotiation(
                        &args.properties,
                    )));
                }
            }
            Some(signal) = negotiation_request.next() => {
                if let Ok(args) = signal.args() {
                    let _ = events.send(Event::GroupRequest {
                        peer: args.path.clone(),
                        dev_passwd_id: args.dev_passwd_id,
                    });
                }
            }
            Some(signal) = group_started.next() => {
                if let Ok(args) = signal.args() {
                    match parse_group_started(&args.properties) {
                        Some(event) => {
                            let _ = events.send(event);
                        }
                        None => warn!("GroupStarted signal without group or interface object"),
                    }
                }
            }
            Some(signal) = group_finished.next() => {
                if let Ok(args) = signal.args() {
                    match parse_group_finished(&args.properties) {
                        Some(event) => {
                            let _ = events.send(event);
                        }
                        None => warn!("GroupFinished signal without group or interface object"),
                    }
                }
            }
            Some(signal) = formation_failure.next() => {
                if let Ok(args) = signal.args() {
                    let _ = events.send(Event::PeerConnectFailed {
                        reason: args.reason.clone(),
                    });
                }
            }
            else => break,
        }
    }

    debug!("P2P device signal streams ended");
}

fn dict_path(props: &HashMap<String, OwnedValue>, key: &str) -> Option<OwnedObjectPath> {
    match props.get(key).map(|value| &**value) {
        Some(Value::ObjectPath(path)) => Some(path.clone().into()),
        _ => None,
    }
}

fn dict_str(props: &HashMap<String, OwnedValue>, key: &str) -> Option<String> {
    match props.get(key).map(|value| &**value) {
        Some(Value::Str(value)) => Some(value.as_str().to_owned()),
        _ => None,
    }
}

fn dict_i32(props: &HashMap<String, OwnedValue>, key: &str) -> i32 {
    match props.get(key).map(|value| &**value) {
        Some(Value::I32(value)) => *value,
        _ => 0,
    }
}

fn dict_i32_list(props: &HashMap<String, OwnedValue>, key: &str) -> Vec<i32> {
    match props.get(key).map(|value| &**value) {
        Some(Value::Array(array)) => array
            .iter()
            .filter_map(|value| match value {
                Value::I32(frequency) => Some(*frequency),
                _ => None,
            })
            .collect(),
        _ => Vec::new(),
    }
}

fn parse_negotiation(props: &HashMap<String, OwnedValue>) -> NegotiationOutcome {
    NegotiationOutcome {
        peer: dict_path(props, "peer_object"),
        status: dict_i32(props, "status"),
        oper_freq: dict_i32(props, "oper_freq"),
        frequencies: dict_i32_list(props, "frequency_list"),
        wps_method: dict_str(props, "wps_method").unwrap_or_default(),
    }
}

fn parse_group_started(props: &HashMap<String, OwnedValue>) -> Option<Event> {
    Some(Event::GroupStarted {
        group: dict_path(props, "group_object")?,
        interface: dict_path(props, "interface_object")?,
        role: dict_str(props, "role").unwrap_or_default(),
    })
}

fn parse_group_finished(props: &HashMap<String, OwnedValue>) -> Option<Event> {
    Some(Event::GroupFinished {
        group: dict_path(props, "group_object")?,
        interface: dict_path(props, "interface_object")?,
    })
}
