//! The session task.
//!
//! One cooperative loop owns every piece of connection state: the peer
//! table, the active attempt, the group proxies, the DHCP endpoint and the
//! connect clock. Supplicant signals, DHCP progress, hostname changes and
//! API calls all arrive as messages; nothing else mutates state, so the
//! state machine never needs a lock.

use std::net::Ipv4Addr;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use macaddr::MacAddr6;
use tokio::sync::{broadcast, mpsc};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};
use zbus::zvariant::OwnedObjectPath;

use crate::config::Config;
use crate::device::{DeviceRegistry, NetworkDevice};
use crate::dhcp::{DhcpFactory, DhcpHandle, DhcpNotifier};
use crate::error::Error;
use crate::events::{Command, Event, EventSender, NegotiationOutcome, NetworkEvent};
use crate::firmware::FirmwareLoader;
use crate::host::HostInfo;
use crate::link::SupplicantLink;
use crate::property::Property;
use crate::selector::InterfaceSelector;
use crate::types::{Capability, DeviceRole, DeviceState, MiracastMode};
use crate::wfd::{DeviceInformation, InformationElement, WfdDeviceType};
use crate::wps;

#[cfg(test)]
mod tests;

/// Builds the bus-facing collaborators once the supplicant service is
/// present.
#[async_trait]
pub(crate) trait LinkBuilder: Send + Sync {
    async fn supplicant(
        &mut self,
        events: EventSender,
    ) -> Result<Box<dyn SupplicantLink>, Error>;

    async fn host_info(&mut self, events: EventSender) -> Result<Box<dyn HostInfo>, Error>;
}

/// Observable mirrors shared between the session task and the service.
#[derive(Debug, Clone)]
pub(crate) struct SharedState {
    pub(crate) devices: Property<Vec<Arc<NetworkDevice>>>,
    pub(crate) capabilities: Property<Vec<Capability>>,
    pub(crate) local_address: Property<Option<Ipv4Addr>>,
    pub(crate) running: Property<bool>,
    pub(crate) scanning: Property<bool>,
}

impl SharedState {
    pub(crate) fn new() -> Self {
        Self {
            devices: Property::new(Vec::new()),
            capabilities: Property::new(Vec::new()),
            local_address: Property::new(None),
            running: Property::new(false),
            scanning: Property::new(false),
        }
    }
}

/// Channel endpoints of a spawned session task.
pub(crate) struct SessionHandles {
    pub(crate) commands: mpsc::UnboundedSender<Command>,
    pub(crate) events: EventSender,
    pub(crate) task: JoinHandle<()>,
}

enum DhcpEndpoint {
    Server(Box<dyn DhcpHandle>),
    Client(Box<dyn DhcpHandle>),
}

impl DhcpEndpoint {
    fn local_address(&self) -> Option<Ipv4Addr> {
        match self {
            Self::Server(handle) | Self::Client(handle) => handle.local_address(),
        }
    }
}

struct GroupContext {
    interface: OwnedObjectPath,
    teardown_requested: bool,
}

pub(crate) struct SessionTask {
    config: Config,
    builder: Box<dyn LinkBuilder>,
    dhcp_factory: Box<dyn DhcpFactory>,
    firmware: Option<Box<dyn FirmwareLoader>>,
    commands: mpsc::UnboundedReceiver<Command>,
    events: mpsc::UnboundedReceiver<Event>,
    events_tx: EventSender,
    notifications: broadcast::Sender<NetworkEvent>,
    shared: SharedState,
    selector: InterfaceSelector,

    registry: DeviceRegistry,
    capabilities: Vec<Capability>,
    session_available: bool,
    link: Option<Box<dyn SupplicantLink>>,
    host: Option<Box<dyn HostInfo>>,
    current: Option<Arc<NetworkDevice>>,
    attempt: u64,
    group: Option<GroupContext>,
    dhcp: Option<DhcpEndpoint>,
    connect_timer: Option<JoinHandle<()>>,
}

impl SessionTask {
    pub(crate) fn spawn(
        config: Config,
        builder: Box<dyn LinkBuilder>,
        dhcp_factory: Box<dyn DhcpFactory>,
        firmware: Option<Box<dyn FirmwareLoader>>,
        shared: SharedState,
        notifications: broadcast::Sender<NetworkEvent>,
    ) -> SessionHandles {
        let (commands_tx, commands_rx) = mpsc::unbounded_channel();
        let (events_tx, events_rx) = mpsc::unbounded_channel();

        let selector = InterfaceSelector::new(config.dedicated_p2p_interface.clone());
        let capabilities = shared.capabilities.get();

        let task = Self {
            config,
            builder,
            dhcp_factory,
            firmware,
            commands: commands_rx,
            events: events_rx,
            events_tx: events_tx.clone(),
            notifications,
            shared,
            selector,
            registry: DeviceRegistry::default(),
            capabilities,
            session_available: true,
            link: None,
            host: None,
            current: None,
            attempt: 0,
            group: None,
            dhcp: None,
            connect_timer: None,
        };

        let task = tokio::spawn(task.run());

        SessionHandles {
            commands: commands_tx,
            events: events_tx,
            task,
        }
    }

    async fn run(mut self) {
        loop {
            tokio::select! {
                command = self.commands.recv() => match command {
                    Some(command) => self.handle_command(command).await,
                    // The service handle is gone; unwind and stop.
                    None => break,
                },
                Some(event) = self.events.recv() => self.handle_event(event).await,
            }
        }

        self.release_stack().await;
        self.cancel_connect_timeout();
    }

    async fn handle_command(&mut self, command: Command) {
        match command {
            Command::Scan { timeout, reply } => {
                let _ = reply.send(self.scan(timeout).await);
            }
            Command::Connect { address, reply } => {
                let _ = reply.send(self.connect(address).await);
            }
            Command::Disconnect { address, reply } => {
                let _ = reply.send(self.disconnect(address).await);
            }
            Command::SetCapabilities {
                capabilities,
                reply,
            } => {
                self.set_capabilities(capabilities).await;
                let _ = reply.send(());
            }
            Command::Release { reply } => {
                debug!("releasing on request");
                self.release_stack().await;
                let _ = reply.send(());
            }
        }
    }

    async fn handle_event(&mut self, event: Event) {
        match event {
            Event::ServiceAppeared => self.on_service_appeared().await,
            Event::ServiceVanished => self.on_service_vanished().await,
            Event::InterfaceAdded(path) => self.on_interface_added(path).await,
            Event::InterfaceRemoved(path) => self.on_interface_removed(path).await,
            Event::PeerFound(path) => self.on_peer_found(path),
            Event::PeerLost(path) => self.on_peer_lost(path).await,
            Event::PeerReady {
                path,
                name,
                address,
            } => self.on_peer_ready(path, name, address),
            Event::FindStopped => self.on_find_stopped(),
            Event::GoNegotiationSuccess(outcome) => self.on_negotiation_success(&outcome),
            Event::GoNegotiationFailure(outcome) => self.on_negotiation_failure(outcome).await,
            Event::PeerConnectFailed { reason } => self.on_peer_connect_failed(reason).await,
            Event::GroupRequest {
                peer,
                dev_passwd_id,
            } => {
                // Sink support would accept here; as a pure source we never
                // take part in a group we did not initiate.
                debug!(%peer, dev_passwd_id, "ignoring incoming group request");
            }
            Event::GroupStarted {
                group,
                interface,
                role,
            } => self.on_group_started(group, interface, role).await,
            Event::GroupFinished { group, interface } => {
                self.on_group_finished(group, interface).await;
            }
            Event::GroupInterfaceReady { token, ifname } => {
                self.on_group_interface_ready(token, ifname).await;
            }
            Event::GroupInterfaceFailed { token, reason } => {
                self.on_group_interface_failed(token, reason).await;
            }
            Event::DhcpAddressAssigned {
                token,
                local,
                remote,
            } => self.on_dhcp_address_assigned(token, local, remote).await,
            Event::DhcpTerminated { token } => self.on_dhcp_terminated(token).await,
            Event::ConnectTimeout { token } => self.on_connect_timeout(token).await,
            Event::HostnameChanged => {
                debug!("hostname changed, syncing device configuration");
                self.sync_device_configuration().await;
            }
            #[cfg(test)]
            Event::Sync(reply) => {
                let _ = reply.send(());
            }
        }
    }

    // ---- lifecycle ----

    async fn on_service_appeared(&mut self) {
        if self.link.is_some() {
            return;
        }
        info!("supplicant service appeared");

        if self.config.need_firmware
            && let Some(loader) = self.firmware.as_ref()
        {
            let ifname = self.config.firmware_interface().to_owned();
            if loader.is_needed(&ifname).await {
                info!(ifname, "loading WiFi firmware");
                if let Err(e) = loader.load(&ifname).await {
                    warn!(error = %e, "firmware load failed, leaving the P2P stack down");
                    return;
                }
            }
        }

        let host = match self.builder.host_info(self.events_tx.clone()).await {
            Ok(host) => host,
            Err(e) => {
                warn!(error = %e, "hostname service unavailable");
                return;
            }
        };
        let link = match self.builder.supplicant(self.events_tx.clone()).await {
            Ok(link) => link,
            Err(e) => {
                warn!(error = %e, "failed to reach the supplicant");
                return;
            }
        };

        self.host = Some(host);
        self.link = Some(link);
        self.publish_wfd_ies().await;
        self.select_interface().await;
    }

    async fn on_service_vanished(&mut self) {
        info!("supplicant service disappeared");
        self.release_stack().await;
    }

    async fn release_stack(&mut self) {
        self.release_interface().await;
        self.link = None;
        self.host = None;

        for device in self.registry.clear() {
            self.notify(NetworkEvent::DeviceLost(device));
        }
        self.publish_devices();
    }

    async fn release_interface(&mut self) {
        if let Some(device) = self.current.take() {
            self.cancel_connect_timeout();
            self.group = None;
            self.drop_dhcp();
            if let Some(link) = self.link.as_deref_mut() {
                link.close_group().await;
            }
            self.advance_state(&device, DeviceState::Disconnected).await;
        }

        if let Some(link) = self.link.as_deref_mut() {
            link.detach().await;
        }
        self.shared.running.set(false);
        if self.shared.scanning.set(false) {
            self.notify(NetworkEvent::ScanningChanged(false));
        }
    }

    // ---- interface selection ----

    async fn select_interface(&mut self) {
        let selected = {
            let Some(link) = self.link.as_deref() else {
                return;
            };
            if link.attached_path().is_some() {
                return;
            }

            let created = if let Some(name) = &self.config.dedicated_p2p_interface {
                match link.create_interface(name).await {
                    Ok(path) => Some(path),
                    Err(e) => {
                        // Creation typically fails after a restart because
                        // the interface survived inside the supplicant;
                        // adopt it from the existing list instead.
                        debug!(error = %e, "interface creation failed, adopting existing");
                        None
                    }
                }
            } else {
                None
            };

            match created {
                Some(path) => Some(path),
                None => match self.selector.select(link).await {
                    Ok(selected) => selected,
                    Err(e) => {
                        warn!(error = %e, "interface selection failed");
                        None
                    }
                },
            }
        };

        match selected {
            Some(path) => self.attach_interface(path).await,
            None => debug!("no usable P2P interface yet"),
        }
    }

    async fn attach_interface(&mut self, path: OwnedObjectPath) {
        {
            let Some(link) = self.link.as_deref_mut() else {
                return;
            };
            if link.attached_path().is_some() {
                return;
            }

            info!(%path, "using P2P interface");
            if let Err(e) = link.attach(path).await {
                warn!(error = %e, "failed to set up the P2P interface");
                return;
            }

            // Bring the device into a well known state.
            if let Err(e) = link.flush().await {
                debug!(error = %e, "flush failed");
            }
        }

        self.shared.running.set(true);
        self.sync_device_configuration().await;
    }

    async fn on_interface_added(&mut self, path: OwnedObjectPath) {
        debug!(%path, "interface added");
        self.select_interface().await;
    }

    async fn on_interface_removed(&mut self, path: OwnedObjectPath) {
        let Some(link) = self.link.as_deref() else {
            return;
        };
        if link.attached_path() != Some(&path) {
            return;
        }

        info!(%path, "management interface removed");
        self.release_interface().await;
    }

    // ---- configuration ----

    async fn sync_device_configuration(&self) {
        let (Some(link), Some(host)) = (self.link.as_deref(), self.host.as_deref()) else {
            return;
        };
        if link.attached_path().is_none() {
            return;
        }

        let hostname = host.hostname().await;
        let device_type = wps::primary_device_type(&host.chassis().await);

        if let Err(e) = link.set_device_configuration(&hostname, &device_type).await {
            warn!(error = %e, "failed to push the device configuration");
        }
    }

    async fn publish_wfd_ies(&self) {
        let Some(link) = self.link.as_deref() else {
            return;
        };

        let device_type = WfdDeviceType::from_capabilities(&self.capabilities);
        debug!(
            ?device_type,
            session_available = self.session_available,
            "publishing WFD information element"
        );

        let mut ie = InformationElement::new();
        ie.add_device_information(DeviceInformation::new(device_type, self.session_available));

        if let Err(e) = link.publish_wfd_ies(&ie.serialize()).await {
            warn!(error = %e, "failed to publish WFD information elements");
        }
    }

    async fn set_capabilities(&mut self, capabilities: Vec<Capability>) {
        if capabilities == self.capabilities {
            return;
        }

        self.capabilities = capabilities.clone();
        self.shared.capabilities.set(capabilities);
        self.publish_wfd_ies().await;
    }

    // ---- peer table ----

    fn on_peer_found(&mut self, path: OwnedObjectPath) {
        if self.registry.contains(&path) {
            return;
        }
        let Some(link) = self.link.as_deref() else {
            return;
        };

        // Announced upward only once the property fetch reports back.
        link.fetch_peer(path);
    }

    fn on_peer_ready(&mut self, path: OwnedObjectPath, name: String, address: MacAddr6) {
        if self.registry.contains(&path) {
            return;
        }

        debug!(peer = %path, %address, "peer ready");
        let device = NetworkDevice::new(path, name, address);
        self.registry.insert(Arc::clone(&device));
        self.publish_devices();
        self.notify(NetworkEvent::DeviceFound(device));
    }

    async fn on_peer_lost(&mut self, path: OwnedObjectPath) {
        let Some(device) = self.registry.remove(&path) else {
            return;
        };
        debug!(peer = %path, "peer lost");

        // Losing the peer we are connected with (possible when we own the
        // group and the remote walks away) tears the whole group down; the
        // GroupFinished signal completes the unwind.
        let is_current = self
            .current
            .as_ref()
            .is_some_and(|current| current.object_path() == &path);
        if is_current {
            self.request_group_teardown().await;
        }

        self.publish_devices();
        self.notify(NetworkEvent::DeviceLost(device));
    }

    fn publish_devices(&self) {
        self.shared.devices.set(self.registry.snapshot());
    }

    fn on_find_stopped(&mut self) {
        if self.shared.scanning.set(false) {
            self.notify(NetworkEvent::ScanningChanged(false));
        }
    }

    // ---- user requests ----

    async fn scan(&mut self, timeout: Duration) -> Result<(), Error> {
        let Some(link) = self.link.as_deref() else {
            return Err(Error::NoP2pInterface);
        };
        if link.attached_path().is_none() {
            return Err(Error::NoP2pInterface);
        }

        link.find(timeout).await?;

        if self.shared.scanning.set(true) {
            self.notify(NetworkEvent::ScanningChanged(true));
        }
        Ok(())
    }

    async fn connect(&mut self, address: MacAddr6) -> Result<(), Error> {
        {
            let Some(link) = self.link.as_deref() else {
                return Err(Error::NoP2pInterface);
            };
            if link.attached_path().is_none() {
                return Err(Error::NoP2pInterface);
            }
        }
        if self.current.is_some() {
            return Err(Error::InvalidState("a connection attempt is in progress"));
        }
        let Some(device) = self.registry.find(address) else {
            return Err(Error::DeviceNotFound(address));
        };

        info!(%address, peer = %device.object_path(), "connecting");

        self.attempt += 1;
        self.current = Some(Arc::clone(&device));

        let connected = match self.link.as_deref() {
            Some(link) => {
                if let Err(e) = link.stop_find().await {
                    debug!(error = %e, "stop find failed");
                }
                link.connect_peer(device.object_path()).await
            }
            None => Err(Error::NoP2pInterface),
        };

        if let Err(e) = connected {
            warn!(error = %e, "connect request failed");
            self.fail_attempt().await;
            return Err(e);
        }

        self.advance_state(&device, DeviceState::Association).await;
        self.arm_connect_timeout();
        Ok(())
    }

    async fn disconnect(&mut self, address: MacAddr6) -> Result<(), Error> {
        if self.link.is_none() {
            return Err(Error::NoP2pInterface);
        }
        let Some(current) = self.current.as_ref() else {
            return Err(Error::InvalidState("no connection attempt in progress"));
        };
        if self.registry.find(address).is_none() {
            return Err(Error::DeviceNotFound(address));
        }

        // Only a formed group can be left; in association the connect
        // timeout does the unwinding.
        let state = current.state.get();
        if !matches!(state, DeviceState::Configuration | DeviceState::Connected) {
            return Err(Error::InvalidState("no group to disconnect from"));
        }
        if self.group.is_none() {
            return Err(Error::InvalidState("no group to disconnect from"));
        }

        self.request_group_teardown().await;
        Ok(())
    }

    /// Issues the group `Disconnect` exactly once per attempt; repeated
    /// teardown requests are no-ops while the GroupFinished signal is on
    /// its way.
    async fn request_group_teardown(&mut self) {
        let Some(group) = self.group.as_mut() else {
            return;
        };
        if group.teardown_requested {
            return;
        }
        group.teardown_requested = true;

        if let Some(link) = self.link.as_deref()
            && let Err(e) = link.group_disconnect().await
        {
            warn!(error = %e, "group disconnect failed");
        }
    }

    // ---- negotiation outcomes ----

    fn on_negotiation_success(&self, outcome: &NegotiationOutcome) {
        if self.current.is_none() {
            return;
        }

        debug!(
            peer = ?outcome.peer,
            oper_freq = outcome.oper_freq,
            wps_method = %outcome.wps_method,
            frequencies = ?outcome.frequencies,
            "group owner negotiation succeeded"
        );
    }

    async fn on_negotiation_failure(&mut self, outcome: NegotiationOutcome) {
        let Some(current) = self.current.as_ref() else {
            return;
        };
        if let Some(peer) = &outcome.peer
            && peer != current.object_path()
        {
            return;
        }

        warn!(
            peer = ?outcome.peer,
            status = outcome.status,
            "group owner negotiation failed"
        );
        self.fail_attempt().await;
    }

    async fn on_peer_connect_failed(&mut self, reason: String) {
        if self.current.is_none() {
            return;
        }

        warn!(reason, "connecting to peer failed");
        self.fail_attempt().await;
    }

    // ---- group lifecycle ----

    async fn on_group_started(
        &mut self,
        group: OwnedObjectPath,
        interface: OwnedObjectPath,
        role: String,
    ) {
        let Some(device) = self.current.clone() else {
            return;
        };

        info!(%group, %interface, role, "group started");
        self.advance_state(&device, DeviceState::Configuration).await;

        device.role.set(DeviceRole::from_group_role(&role));
        self.notify(NetworkEvent::DeviceChanged(Arc::clone(&device)));

        self.group = Some(GroupContext {
            interface: interface.clone(),
            teardown_requested: false,
        });

        if let Some(link) = self.link.as_deref_mut() {
            link.open_group(interface, self.attempt);
        }
    }

    async fn on_group_interface_ready(&mut self, token: u64, ifname: String) {
        if token != self.attempt {
            return;
        }
        let Some(device) = self.current.clone() else {
            return;
        };
        if device.state.get() != DeviceState::Configuration {
            return;
        }
        if self.group.is_none() {
            return;
        }

        debug!(ifname, "group interface ready");

        // Android WiFi drivers have a dedicated mode for miracast traffic;
        // where the command is unknown this is a no-op.
        if let Some(link) = self.link.as_deref() {
            link.send_miracast_command(MiracastMode::Source);
        }

        let notifier = DhcpNotifier::new(self.attempt, self.events_tx.clone());
        let endpoint = if device.role.get() == DeviceRole::GroupOwner {
            DhcpEndpoint::Server(self.dhcp_factory.start_server(&ifname, notifier))
        } else {
            DhcpEndpoint::Client(self.dhcp_factory.start_client(&ifname, notifier))
        };

        if let Some(address) = endpoint.local_address() {
            self.shared.local_address.set(Some(address));
        }
        self.dhcp = Some(endpoint);
    }

    async fn on_group_interface_failed(&mut self, token: u64, reason: String) {
        if token != self.attempt {
            return;
        }
        if self.current.is_none() {
            return;
        }

        warn!(reason, "group interface setup failed");
        self.fail_attempt().await;
    }

    async fn on_group_finished(&mut self, group: OwnedObjectPath, interface: OwnedObjectPath) {
        let Some(device) = self.current.clone() else {
            // The attempt already failed and was cleared; nothing left to
            // unwind here.
            return;
        };
        // Without a live group context this signal belongs to an earlier
        // attempt whose group was already unwound; accepting it would tear
        // down the attempt that is forming right now.
        let Some(context) = self.group.as_ref() else {
            return;
        };
        if context.interface != interface {
            return;
        }

        info!(%group, %interface, "group finished");

        self.cancel_connect_timeout();
        self.drop_dhcp();
        self.group = None;
        if let Some(link) = self.link.as_deref_mut() {
            link.close_group().await;
        }

        self.current = None;
        self.advance_state(&device, DeviceState::Disconnected).await;
    }

    // ---- addressing ----

    async fn on_dhcp_address_assigned(&mut self, token: u64, local: Ipv4Addr, remote: Ipv4Addr) {
        if token != self.attempt {
            return;
        }
        let Some(device) = self.current.clone() else {
            return;
        };
        if device.state.get() != DeviceState::Configuration {
            return;
        }

        info!(%local, %remote, "group link addresses configured");

        device.ipv4.set(Some(remote));
        self.shared.local_address.set(Some(local));

        self.cancel_connect_timeout();
        self.advance_state(&device, DeviceState::Connected).await;
        self.notify(NetworkEvent::DeviceChanged(device));
    }

    async fn on_dhcp_terminated(&mut self, token: u64) {
        if token != self.attempt {
            return;
        }
        let Some(device) = self.current.as_ref() else {
            return;
        };
        if device.state.get() != DeviceState::Configuration {
            return;
        }

        warn!("address configuration failed, tearing the group down");
        self.fail_attempt().await;
    }

    // ---- timeout ----

    fn arm_connect_timeout(&mut self) {
        self.cancel_connect_timeout();

        let events = self.events_tx.clone();
        let token = self.attempt;
        let timeout = self.config.connect_timeout;

        self.connect_timer = Some(tokio::spawn(async move {
            tokio::time::sleep(timeout).await;
            let _ = events.send(Event::ConnectTimeout { token });
        }));
    }

    fn cancel_connect_timeout(&mut self) {
        if let Some(timer) = self.connect_timer.take() {
            timer.abort();
        }
    }

    async fn on_connect_timeout(&mut self, token: u64) {
        if token != self.attempt {
            return;
        }
        self.connect_timer = None;

        let Some(device) = self.current.clone() else {
            return;
        };

        // Once a group is forming the DHCP endpoint owns the clock; it will
        // report termination on its own if addressing never completes.
        if matches!(
            device.state.get(),
            DeviceState::Configuration | DeviceState::Connected
        ) {
            return;
        }

        warn!(address = %device.address(), "timed out while connecting");

        if let Some(link) = self.link.as_deref()
            && let Err(e) = link.cancel_connect().await
        {
            debug!(error = %e, "cancelling the connect attempt failed");
        }

        self.fail_attempt().await;
    }

    // ---- transitions ----

    /// Converges every failure source: cancels the clock, unwinds any group
    /// and DHCP endpoint, advances to `Failure` and clears the attempt.
    async fn fail_attempt(&mut self) {
        self.cancel_connect_timeout();
        self.request_group_teardown().await;

        if self.group.take().is_some()
            && let Some(link) = self.link.as_deref_mut()
        {
            link.close_group().await;
        }
        self.drop_dhcp();

        if let Some(device) = self.current.take() {
            self.advance_state(&device, DeviceState::Failure).await;
        }
    }

    fn drop_dhcp(&mut self) {
        if self.dhcp.take().is_some() {
            debug!("released DHCP endpoint");
        }
        self.shared.local_address.set(None);
    }

    async fn advance_state(&mut self, device: &Arc<NetworkDevice>, state: DeviceState) {
        device.state.set(state);

        if state == DeviceState::Disconnected
            && let Some(link) = self.link.as_deref()
        {
            link.send_miracast_command(MiracastMode::Off);
        }

        // Entering or leaving Connected flips the advertised session
        // availability so other peers see us as busy.
        if matches!(state, DeviceState::Connected | DeviceState::Disconnected) {
            self.session_available = state != DeviceState::Connected;
            self.publish_wfd_ies().await;
        }

        self.notify(NetworkEvent::DeviceStateChanged(Arc::clone(device)));
    }

    fn notify(&self, event: NetworkEvent) {
        let _ = self.notifications.send(event);
    }
}
