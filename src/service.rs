//! Public connection manager service.

use std::net::Ipv4Addr;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use futures::StreamExt;
use tokio::sync::{Mutex, broadcast, mpsc, oneshot};
use tokio::task::JoinHandle;
use tracing::{error, warn};
use zbus::Connection;
use zbus::names::BusName;

use crate::config::Config;
use crate::device::NetworkDevice;
use crate::dhcp::DhcpFactory;
use crate::error::Error;
use crate::events::{Command, Event, EventSender, NetworkEvent};
use crate::firmware::FirmwareLoader;
use crate::host::{HostInfo, SystemHostInfo};
use crate::link::{Supplicant, SupplicantLink};
use crate::proxy::supplicant::SERVICE_NAME;
use crate::session::{LinkBuilder, SessionHandles, SessionTask, SharedState};
use crate::types::Capability;

/// Manages Wi-Fi P2P connections towards Miracast peers.
///
/// Construction is cheap and bus-free; [`setup`](Self::setup) acquires the
/// system bus and arms a watcher on the supplicant service, after which the
/// service initializes itself whenever the supplicant is present. Consumers
/// observe peers through [`events`](Self::events) and the snapshot
/// accessors, and drive connections with
/// [`connect`](Self::connect)/[`disconnect`](Self::disconnect).
pub struct P2pService {
    shared: SharedState,
    notifications: broadcast::Sender<NetworkEvent>,
    state: Mutex<ServiceState>,
}

struct ServiceState {
    config: Config,
    dhcp_factory: Option<Box<dyn DhcpFactory>>,
    firmware: Option<Box<dyn FirmwareLoader>>,
    runtime: Option<Runtime>,
}

struct Runtime {
    commands: mpsc::UnboundedSender<Command>,
    session: JoinHandle<()>,
    watcher: JoinHandle<()>,
}

impl P2pService {
    /// Creates the service with its collaborators.
    ///
    /// `dhcp_factory` provides the addressing endpoints spawned on group
    /// interfaces; `firmware` is consulted when the environment gates
    /// startup on a firmware load.
    pub fn new(
        config: Config,
        dhcp_factory: Box<dyn DhcpFactory>,
        firmware: Option<Box<dyn FirmwareLoader>>,
    ) -> Self {
        let (notifications, _) = broadcast::channel(64);

        Self {
            shared: SharedState::new(),
            notifications,
            state: Mutex::new(ServiceState {
                config,
                dhcp_factory: Some(dhcp_factory),
                firmware,
                runtime: None,
            }),
        }
    }

    /// Connects to the system bus and arms the supplicant service watcher.
    ///
    /// # Errors
    /// Returns `Error::DbusError` when the system bus cannot be acquired;
    /// the service stays inert and `setup` may be called again.
    pub async fn setup(&self) -> Result<(), Error> {
        let mut state = self.state.lock().await;
        if state.runtime.is_some() {
            return Err(Error::InvalidState("service is already set up"));
        }

        let connection = Connection::system().await.map_err(|e| {
            error!(error = %e, "failed to connect to the system bus");
            e
        })?;

        let dhcp_factory = state
            .dhcp_factory
            .take()
            .ok_or(Error::InvalidState("service is already set up"))?;
        let firmware = state.firmware.take();
        let builder = Box::new(SystemLinkBuilder {
            connection: connection.clone(),
        });

        let SessionHandles {
            commands,
            events,
            task,
        } = SessionTask::spawn(
            state.config.clone(),
            builder,
            dhcp_factory,
            firmware,
            self.shared.clone(),
            self.notifications.clone(),
        );

        let watcher = tokio::spawn(watch_supplicant_service(connection, events));

        state.runtime = Some(Runtime {
            commands,
            session: task,
            watcher,
        });
        Ok(())
    }

    /// Tears down proxies, the active group and the current device. The
    /// service watcher stays armed, so a supplicant restart brings the
    /// stack back.
    pub async fn release(&self) {
        let _ = self.request(|reply| Command::Release { reply }).await;
    }

    /// Starts peer discovery for `timeout`.
    ///
    /// # Errors
    /// Returns `Error::InvalidState` without a P2P interface.
    pub async fn scan(&self, timeout: Duration) -> Result<(), Error> {
        self.request(|reply| Command::Scan { timeout, reply })
            .await?
    }

    /// Starts a connection attempt towards `device`.
    ///
    /// Progress arrives as `DeviceStateChanged` events: Association,
    /// Configuration and finally Connected, or Failure on any abort.
    ///
    /// # Errors
    /// Returns `Error::InvalidState` while another attempt is active and
    /// `Error::DeviceNotFound` for a device that is not in the peer table.
    pub async fn connect(&self, device: &NetworkDevice) -> Result<(), Error> {
        let address = device.address();
        self.request(|reply| Command::Connect { address, reply })
            .await?
    }

    /// Disconnects from the active group.
    ///
    /// # Errors
    /// Returns `Error::InvalidState` when no group is up and
    /// `Error::DeviceNotFound` for an unknown device.
    pub async fn disconnect(&self, device: &NetworkDevice) -> Result<(), Error> {
        let address = device.address();
        self.request(|reply| Command::Disconnect { address, reply })
            .await?
    }

    /// Reconfigures the streaming roles offered to peers. Equal input is a
    /// no-op; otherwise the WFD information element is republished.
    pub async fn set_capabilities(&self, capabilities: Vec<Capability>) {
        let sent = self
            .request(|reply| Command::SetCapabilities {
                capabilities: capabilities.clone(),
                reply,
            })
            .await;

        if sent.is_err() {
            // Not set up yet; the session task picks the value up at spawn.
            self.shared.capabilities.set(capabilities);
        }
    }

    /// Streaming roles currently offered.
    pub fn capabilities(&self) -> Vec<Capability> {
        self.shared.capabilities.get()
    }

    /// Snapshot of the peer table.
    pub fn devices(&self) -> Vec<Arc<NetworkDevice>> {
        self.shared.devices.get()
    }

    /// Our address on the group link, while one is configured.
    pub fn local_address(&self) -> Option<Ipv4Addr> {
        self.shared.local_address.get()
    }

    /// Whether a P2P interface is attached and operational.
    pub fn running(&self) -> bool {
        self.shared.running.get()
    }

    /// Whether peer discovery is active.
    pub fn scanning(&self) -> bool {
        self.shared.scanning.get()
    }

    /// Subscribes to device and scan notifications.
    pub fn events(&self) -> broadcast::Receiver<NetworkEvent> {
        self.notifications.subscribe()
    }

    async fn request<T>(
        &self,
        make: impl FnOnce(oneshot::Sender<T>) -> Command,
    ) -> Result<T, Error> {
        let commands = {
            let state = self.state.lock().await;
            state
                .runtime
                .as_ref()
                .map(|runtime| runtime.commands.clone())
        }
        .ok_or(Error::InvalidState("service is not set up"))?;

        let (reply_tx, reply_rx) = oneshot::channel();
        commands
            .send(make(reply_tx))
            .map_err(|_| Error::ServiceDown)?;
        reply_rx.await.map_err(|_| Error::ServiceDown)
    }
}

impl Drop for P2pService {
    fn drop(&mut self) {
        if let Some(runtime) = self.state.get_mut().runtime.take() {
            runtime.session.abort();
            runtime.watcher.abort();
        }
    }
}

struct SystemLinkBuilder {
    connection: Connection,
}

#[async_trait]
impl LinkBuilder for SystemLinkBuilder {
    async fn supplicant(
        &mut self,
        events: EventSender,
    ) -> Result<Box<dyn SupplicantLink>, Error> {
        Ok(Box::new(Supplicant::new(&self.connection, events).await?))
    }

    async fn host_info(&mut self, events: EventSender) -> Result<Box<dyn HostInfo>, Error> {
        Ok(Box::new(SystemHostInfo::new(&self.connection, events).await?))
    }
}

async fn watch_supplicant_service(connection: Connection, events: EventSender) {
    let dbus = match zbus::fdo::DBusProxy::new(&connection).await {
        Ok(proxy) => proxy,
        Err(e) => {
            warn!(error = %e, "cannot watch the supplicant service");
            return;
        }
    };

    let mut owner_changes = match dbus
        .receive_name_owner_changed_with_args(&[(0, SERVICE_NAME)])
        .await
    {
        Ok(stream) => stream,
        Err(e) => {
            warn!(error = %e, "cannot subscribe to bus name changes");
            return;
        }
    };

    if let Ok(name) = BusName::try_from(SERVICE_NAME) {
        match dbus.name_has_owner(name).await {
            Ok(true) => {
                if events.send(Event::ServiceAppeared).is_err() {
                    return;
                }
            }
            Ok(false) => {}
            Err(e) => warn!(error = %e, "initial supplicant probe failed"),
        }
    }

    while let Some(signal) = owner_changes.next().await {
        let Ok(args) = signal.args() else {
            continue;
        };
        let event = if args.new_owner().is_some() {
            Event::ServiceAppeared
        } else {
            Event::ServiceVanished
        };
        if events.send(event).is_err() {
            return;
        }
    }
}
