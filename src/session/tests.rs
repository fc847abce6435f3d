//! Connection flow tests.
//!
//! The session task runs against recorded mock collaborators; tests feed
//! supplicant and DHCP events through the queue and assert on the emitted
//! notifications, the action log and the observable state.

use std::net::Ipv4Addr;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use macaddr::MacAddr6;
use tokio::sync::{broadcast, oneshot};
use tokio::task::JoinHandle;
use zbus::zvariant::OwnedObjectPath;

use super::{LinkBuilder, SessionTask, SharedState};
use crate::config::Config;
use crate::device::NetworkDevice;
use crate::dhcp::{DhcpFactory, DhcpHandle, DhcpNotifier};
use crate::error::Error;
use crate::events::{Command, Event, EventSender, NegotiationOutcome, NetworkEvent};
use crate::host::HostInfo;
use crate::link::SupplicantLink;
use crate::types::{Capability, DeviceRole, DeviceState, MiracastMode};

#[derive(Debug, Clone, PartialEq)]
enum Action {
    PublishIes(Vec<u8>),
    CreateInterface(String),
    Attach(String),
    Detach,
    Flush,
    SetDeviceConfiguration(String, String),
    Find(u64),
    StopFind,
    ConnectPeer(String),
    Cancel,
    OpenGroup(String, u64),
    GroupDisconnect,
    CloseGroup,
    Miracast(MiracastMode),
    StartDhcpServer(String),
    StartDhcpClient(String),
}

type Log = Arc<Mutex<Vec<Action>>>;

#[derive(Debug, Clone)]
struct MockInterface {
    path: OwnedObjectPath,
    name: String,
    p2p: bool,
}

#[derive(Debug, Clone)]
struct LinkConfig {
    interfaces: Vec<MockInterface>,
    peers: Vec<(OwnedObjectPath, String, MacAddr6)>,
    group_ifname: String,
    fail_connect: bool,
    created_path: Option<OwnedObjectPath>,
}

impl Default for LinkConfig {
    fn default() -> Self {
        Self {
            interfaces: vec![MockInterface {
                path: path("/if/0"),
                name: "wlan0".into(),
                p2p: true,
            }],
            peers: Vec::new(),
            group_ifname: "p2p0".into(),
            fail_connect: false,
            created_path: None,
        }
    }
}

struct MockLink {
    log: Log,
    events: EventSender,
    config: LinkConfig,
    attached: Option<OwnedObjectPath>,
}

impl MockLink {
    fn record(&self, action: Action) {
        self.log.lock().unwrap().push(action);
    }
}

#[async_trait]
impl SupplicantLink for MockLink {
    async fn publish_wfd_ies(&self, ies: &[u8]) -> Result<(), Error> {
        self.record(Action::PublishIes(ies.to_vec()));
        Ok(())
    }

    async fn interfaces(&self) -> Result<Vec<OwnedObjectPath>, Error> {
        Ok(self
            .config
            .interfaces
            .iter()
            .map(|interface| interface.path.clone())
            .collect())
    }

    async fn create_interface(&self, ifname: &str) -> Result<OwnedObjectPath, Error> {
        self.record(Action::CreateInterface(ifname.into()));
        self.config
            .created_path
            .clone()
            .ok_or(Error::InvalidState("interface creation refused"))
    }

    async fn interface_name(&self, path: &OwnedObjectPath) -> Result<String, Error> {
        self.config
            .interfaces
            .iter()
            .find(|interface| interface.path == *path)
            .map(|interface| interface.name.clone())
            .ok_or(Error::InvalidState("unknown interface"))
    }

    async fn supports_p2p(&self, path: &OwnedObjectPath) -> bool {
        self.config
            .interfaces
            .iter()
            .any(|interface| interface.path == *path && interface.p2p)
    }

    async fn attach(&mut self, path: OwnedObjectPath) -> Result<(), Error> {
        self.record(Action::Attach(path.to_string()));
        self.attached = Some(path);
        Ok(())
    }

    fn attached_path(&self) -> Option<&OwnedObjectPath> {
        self.attached.as_ref()
    }

    async fn detach(&mut self) {
        self.record(Action::Detach);
        self.attached = None;
    }

    async fn flush(&self) -> Result<(), Error> {
        self.record(Action::Flush);
        Ok(())
    }

    async fn set_device_configuration(
        &self,
        name: &str,
        primary_device_type: &str,
    ) -> Result<(), Error> {
        self.record(Action::SetDeviceConfiguration(
            name.into(),
            primary_device_type.into(),
        ));
        Ok(())
    }

    async fn find(&self, timeout: Duration) -> Result<(), Error> {
        self.record(Action::Find(timeout.as_secs()));
        Ok(())
    }

    async fn stop_find(&self) -> Result<(), Error> {
        self.record(Action::StopFind);
        Ok(())
    }

    async fn connect_peer(&self, peer: &OwnedObjectPath) -> Result<(), Error> {
        self.record(Action::ConnectPeer(peer.to_string()));
        if self.config.fail_connect {
            return Err(Error::NegotiationFailed("refused".into()));
        }
        Ok(())
    }

    async fn cancel_connect(&self) -> Result<(), Error> {
        self.record(Action::Cancel);
        Ok(())
    }

    fn fetch_peer(&self, path: OwnedObjectPath) {
        if let Some((_, name, address)) = self
            .config
            .peers
            .iter()
            .find(|(peer_path, _, _)| *peer_path == path)
        {
            let _ = self.events.send(Event::PeerReady {
                path,
                name: name.clone(),
                address: *address,
            });
        }
    }

    fn open_group(&mut self, interface: OwnedObjectPath, token: u64) {
        self.record(Action::OpenGroup(interface.to_string(), token));
        let _ = self.events.send(Event::GroupInterfaceReady {
            token,
            ifname: self.config.group_ifname.clone(),
        });
    }

    async fn group_disconnect(&self) -> Result<(), Error> {
        self.record(Action::GroupDisconnect);
        Ok(())
    }

    async fn close_group(&mut self) {
        self.record(Action::CloseGroup);
    }

    fn send_miracast_command(&self, mode: MiracastMode) {
        self.record(Action::Miracast(mode));
    }
}

struct MockHost {
    hostname: String,
    chassis: String,
}

#[async_trait]
impl HostInfo for MockHost {
    async fn hostname(&self) -> String {
        self.hostname.clone()
    }

    async fn chassis(&self) -> String {
        self.chassis.clone()
    }
}

struct MockBuilder {
    log: Log,
    link: LinkConfig,
    hostname: String,
    chassis: String,
}

#[async_trait]
impl LinkBuilder for MockBuilder {
    async fn supplicant(
        &mut self,
        events: EventSender,
    ) -> Result<Box<dyn SupplicantLink>, Error> {
        Ok(Box::new(MockLink {
            log: Arc::clone(&self.log),
            events,
            config: self.link.clone(),
            attached: None,
        }))
    }

    async fn host_info(&mut self, _events: EventSender) -> Result<Box<dyn HostInfo>, Error> {
        Ok(Box::new(MockHost {
            hostname: self.hostname.clone(),
            chassis: self.chassis.clone(),
        }))
    }
}

struct MockDhcpHandle {
    released: Arc<AtomicBool>,
}

impl DhcpHandle for MockDhcpHandle {
    fn local_address(&self) -> Option<Ipv4Addr> {
        None
    }
}

impl Drop for MockDhcpHandle {
    fn drop(&mut self) {
        self.released.store(true, Ordering::SeqCst);
    }
}

struct MockDhcpFactory {
    log: Log,
    released: Arc<AtomicBool>,
}

impl DhcpFactory for MockDhcpFactory {
    fn start_server(&self, ifname: &str, _notifier: DhcpNotifier) -> Box<dyn DhcpHandle> {
        self.log
            .lock()
            .unwrap()
            .push(Action::StartDhcpServer(ifname.into()));
        Box::new(MockDhcpHandle {
            released: Arc::clone(&self.released),
        })
    }

    fn start_client(&self, ifname: &str, _notifier: DhcpNotifier) -> Box<dyn DhcpHandle> {
        self.log
            .lock()
            .unwrap()
            .push(Action::StartDhcpClient(ifname.into()));
        Box::new(MockDhcpHandle {
            released: Arc::clone(&self.released),
        })
    }
}

struct Harness {
    commands: tokio::sync::mpsc::UnboundedSender<Command>,
    events: EventSender,
    notifications: broadcast::Receiver<NetworkEvent>,
    shared: SharedState,
    log: Log,
    dhcp_released: Arc<AtomicBool>,
    _task: JoinHandle<()>,
}

fn path(raw: &str) -> OwnedObjectPath {
    OwnedObjectPath::try_from(raw).unwrap()
}

fn peer_address() -> MacAddr6 {
    "aa:bb:cc:dd:ee:ff".parse().unwrap()
}

fn local_ip() -> Ipv4Addr {
    "192.168.7.1".parse().unwrap()
}

fn remote_ip() -> Ipv4Addr {
    "192.168.7.2".parse().unwrap()
}

impl Harness {
    fn new() -> Self {
        Self::with(Config::default(), LinkConfig::default(), "laptop")
    }

    fn with(config: Config, link: LinkConfig, chassis: &str) -> Self {
        let log = Log::default();
        let shared = SharedState::new();
        let (notifications_tx, notifications) = broadcast::channel(64);
        let dhcp_released = Arc::new(AtomicBool::new(false));

        let builder = MockBuilder {
            log: Arc::clone(&log),
            link,
            hostname: "test-host".into(),
            chassis: chassis.into(),
        };
        let factory = MockDhcpFactory {
            log: Arc::clone(&log),
            released: Arc::clone(&dhcp_released),
        };

        let handles = SessionTask::spawn(
            config,
            Box::new(builder),
            Box::new(factory),
            None,
            shared.clone(),
            notifications_tx,
        );

        Self {
            commands: handles.commands,
            events: handles.events,
            notifications,
            shared,
            log,
            dhcp_released,
            _task: handles.task,
        }
    }

    /// Waits until every event sent so far was handled.
    async fn settle(&self) {
        let (tx, rx) = oneshot::channel();
        self.events.send(Event::Sync(tx)).unwrap();
        rx.await.unwrap();
    }

    async fn start(&self) {
        self.events.send(Event::ServiceAppeared).unwrap();
        self.settle().await;
    }

    async fn add_peer(&mut self, raw_path: &str, address: MacAddr6) -> Arc<NetworkDevice> {
        self.events
            .send(Event::PeerReady {
                path: path(raw_path),
                name: "tv".into(),
                address,
            })
            .unwrap();
        self.expect_found().await
    }

    async fn recv(&mut self) -> NetworkEvent {
        self.notifications.recv().await.expect("notifications ended")
    }

    async fn expect_found(&mut self) -> Arc<NetworkDevice> {
        loop {
            if let NetworkEvent::DeviceFound(device) = self.recv().await {
                return device;
            }
        }
    }

    async fn expect_lost(&mut self) -> Arc<NetworkDevice> {
        loop {
            if let NetworkEvent::DeviceLost(device) = self.recv().await {
                return device;
            }
        }
    }

    async fn expect_state(&mut self, state: DeviceState) -> Arc<NetworkDevice> {
        loop {
            if let NetworkEvent::DeviceStateChanged(device) = self.recv().await
                && device.state.get() == state
            {
                return device;
            }
        }
    }

    async fn connect(&self, address: MacAddr6) -> Result<(), Error> {
        let (reply, rx) = oneshot::channel();
        self.commands
            .send(Command::Connect { address, reply })
            .unwrap();
        rx.await.unwrap()
    }

    async fn disconnect(&self, address: MacAddr6) -> Result<(), Error> {
        let (reply, rx) = oneshot::channel();
        self.commands
            .send(Command::Disconnect { address, reply })
            .unwrap();
        rx.await.unwrap()
    }

    async fn scan(&self, timeout: Duration) -> Result<(), Error> {
        let (reply, rx) = oneshot::channel();
        self.commands
            .send(Command::Scan { timeout, reply })
            .unwrap();
        rx.await.unwrap()
    }

    async fn set_capabilities(&self, capabilities: Vec<Capability>) {
        let (reply, rx) = oneshot::channel();
        self.commands
            .send(Command::SetCapabilities {
                capabilities,
                reply,
            })
            .unwrap();
        rx.await.unwrap();
    }

    fn actions(&self) -> Vec<Action> {
        self.log.lock().unwrap().clone()
    }

    fn count(&self, wanted: &Action) -> usize {
        self.actions()
            .iter()
            .filter(|action| *action == wanted)
            .count()
    }

    fn last_published_ie(&self) -> Vec<u8> {
        self.actions()
            .iter()
            .rev()
            .find_map(|action| match action {
                Action::PublishIes(bytes) => Some(bytes.clone()),
                _ => None,
            })
            .expect("no information element published")
    }
}

/// Runs scenario groundwork: service up, one peer, connected as group
/// owner with addresses assigned.
async fn establish_go_connection(harness: &mut Harness) -> Arc<NetworkDevice> {
    harness.start().await;
    let device = harness.add_peer("/p/0", peer_address()).await;

    harness.connect(peer_address()).await.unwrap();
    harness.expect_state(DeviceState::Association).await;

    harness
        .events
        .send(Event::GroupStarted {
            group: path("/g/0"),
            interface: path("/i/0"),
            role: "GO".into(),
        })
        .unwrap();
    harness.expect_state(DeviceState::Configuration).await;
    harness.settle().await;

    harness
        .events
        .send(Event::DhcpAddressAssigned {
            token: 1,
            local: local_ip(),
            remote: remote_ip(),
        })
        .unwrap();
    harness.expect_state(DeviceState::Connected).await;

    device
}

const IE_SOURCE_AVAILABLE: [u8; 9] = [0x00, 0x00, 0x06, 0x00, 0x10, 0x1C, 0x44, 0x00, 0x32];
const IE_SOURCE_BUSY: [u8; 9] = [0x00, 0x00, 0x06, 0x00, 0x00, 0x1C, 0x44, 0x00, 0x32];

#[tokio::test]
async fn setup_attaches_and_syncs_device_configuration() {
    let harness = Harness::new();
    harness.start().await;

    let actions = harness.actions();
    assert!(actions.contains(&Action::PublishIes(IE_SOURCE_AVAILABLE.to_vec())));
    assert!(actions.contains(&Action::Attach("/if/0".into())));
    assert!(actions.contains(&Action::Flush));
    assert!(actions.contains(&Action::SetDeviceConfiguration(
        "test-host".into(),
        "00010050F2040005".into(),
    )));
    assert!(harness.shared.running.get());
}

#[tokio::test]
async fn handset_announces_telephone_device_type() {
    let harness = Harness::with(Config::default(), LinkConfig::default(), "handset");
    harness.start().await;

    assert_eq!(
        harness.count(&Action::SetDeviceConfiguration(
            "test-host".into(),
            "000A0050F2040005".into(),
        )),
        1
    );

    harness
        .set_capabilities(vec![Capability::Source, Capability::Sink])
        .await;

    let ie = harness.last_published_ie();
    assert_eq!(ie[4] & 0x03, 0x03, "dual role bits expected");
    assert_eq!(ie[4] & 0x10, 0x10, "still available");
}

#[tokio::test]
async fn happy_path_as_group_owner() {
    let mut harness = Harness::new();
    let device = establish_go_connection(&mut harness).await;

    let actions = harness.actions();
    let stop_find = actions
        .iter()
        .position(|action| *action == Action::StopFind)
        .expect("no StopFind");
    let connect = actions
        .iter()
        .position(|action| *action == Action::ConnectPeer("/p/0".into()))
        .expect("no Connect");
    assert!(stop_find < connect);

    assert!(actions.contains(&Action::OpenGroup("/i/0".into(), 1)));
    assert!(actions.contains(&Action::Miracast(MiracastMode::Source)));
    assert!(actions.contains(&Action::StartDhcpServer("p2p0".into())));

    assert_eq!(device.ipv4.get(), Some(remote_ip()));
    assert_eq!(harness.shared.local_address.get(), Some(local_ip()));
    assert_eq!(device.role.get(), DeviceRole::GroupOwner);
    assert_eq!(harness.last_published_ie(), IE_SOURCE_BUSY);
}

#[tokio::test]
async fn client_role_starts_a_dhcp_client() {
    let mut harness = Harness::new();
    harness.start().await;
    harness.add_peer("/p/0", peer_address()).await;

    harness.connect(peer_address()).await.unwrap();
    harness.expect_state(DeviceState::Association).await;

    harness
        .events
        .send(Event::GroupStarted {
            group: path("/g/0"),
            interface: path("/i/0"),
            role: "client".into(),
        })
        .unwrap();
    harness.expect_state(DeviceState::Configuration).await;
    harness.settle().await;

    assert_eq!(harness.count(&Action::StartDhcpClient("p2p0".into())), 1);
    assert_eq!(harness.count(&Action::StartDhcpServer("p2p0".into())), 0);
}

#[tokio::test(start_paused = true)]
async fn connect_times_out_in_association() {
    let mut harness = Harness::new();
    harness.start().await;
    harness.add_peer("/p/0", peer_address()).await;

    harness.connect(peer_address()).await.unwrap();
    harness.expect_state(DeviceState::Association).await;

    // No group ever starts; the connect clock runs out.
    harness.expect_state(DeviceState::Failure).await;
    assert_eq!(harness.count(&Action::Cancel), 1);

    // The attempt was cleared, a fresh connect is accepted.
    harness.connect(peer_address()).await.unwrap();
    harness.expect_state(DeviceState::Association).await;
}

#[tokio::test(start_paused = true)]
async fn timeout_is_a_noop_once_the_group_is_forming() {
    let mut harness = Harness::new();
    harness.start().await;
    harness.add_peer("/p/0", peer_address()).await;

    harness.connect(peer_address()).await.unwrap();
    harness.expect_state(DeviceState::Association).await;

    harness
        .events
        .send(Event::GroupStarted {
            group: path("/g/0"),
            interface: path("/i/0"),
            role: "GO".into(),
        })
        .unwrap();
    let device = harness.expect_state(DeviceState::Configuration).await;
    harness.settle().await;

    tokio::time::advance(Duration::from_secs(60)).await;
    harness.settle().await;

    assert_eq!(device.state.get(), DeviceState::Configuration);
    assert_eq!(harness.count(&Action::Cancel), 0);
}

#[tokio::test]
async fn peer_lost_mid_group_disconnects_once() {
    let mut harness = Harness::new();
    establish_go_connection(&mut harness).await;

    harness.events.send(Event::PeerLost(path("/p/0"))).unwrap();
    harness.expect_lost().await;
    assert_eq!(harness.count(&Action::GroupDisconnect), 1);

    harness
        .events
        .send(Event::GroupFinished {
            group: path("/g/0"),
            interface: path("/i/0"),
        })
        .unwrap();
    harness.expect_state(DeviceState::Disconnected).await;

    assert!(harness.dhcp_released.load(Ordering::SeqCst));
    assert!(harness.actions().contains(&Action::Miracast(MiracastMode::Off)));
    assert_eq!(harness.last_published_ie(), IE_SOURCE_AVAILABLE.to_vec());
    assert_eq!(harness.shared.local_address.get(), None);
}

#[tokio::test]
async fn dhcp_termination_fails_the_attempt() {
    let mut harness = Harness::new();
    harness.start().await;
    harness.add_peer("/p/0", peer_address()).await;

    harness.connect(peer_address()).await.unwrap();
    harness.expect_state(DeviceState::Association).await;

    harness
        .events
        .send(Event::GroupStarted {
            group: path("/g/0"),
            interface: path("/i/0"),
            role: "GO".into(),
        })
        .unwrap();
    harness.expect_state(DeviceState::Configuration).await;
    harness.settle().await;

    harness
        .events
        .send(Event::DhcpTerminated { token: 1 })
        .unwrap();
    harness.expect_state(DeviceState::Failure).await;

    assert_eq!(harness.count(&Action::GroupDisconnect), 1);
    assert!(harness.dhcp_released.load(Ordering::SeqCst));

    // The late GroupFinished of the failed attempt is ignored.
    harness
        .events
        .send(Event::GroupFinished {
            group: path("/g/0"),
            interface: path("/i/0"),
        })
        .unwrap();
    harness.settle().await;
    assert!(matches!(
        harness.notifications.try_recv(),
        Err(broadcast::error::TryRecvError::Empty)
    ));
}

#[tokio::test]
async fn stale_group_finished_does_not_cancel_a_new_attempt() {
    let second_address: MacAddr6 = "11:22:33:44:55:66".parse().unwrap();

    let mut harness = Harness::new();
    harness.start().await;
    harness.add_peer("/p/0", peer_address()).await;
    harness.add_peer("/p/1", second_address).await;

    // First attempt reaches Configuration and dies on DHCP; its group is
    // unwound optimistically, before the supplicant reports GroupFinished.
    harness.connect(peer_address()).await.unwrap();
    harness.expect_state(DeviceState::Association).await;
    harness
        .events
        .send(Event::GroupStarted {
            group: path("/g/0"),
            interface: path("/i/0"),
            role: "GO".into(),
        })
        .unwrap();
    harness.expect_state(DeviceState::Configuration).await;
    harness.settle().await;
    harness
        .events
        .send(Event::DhcpTerminated { token: 1 })
        .unwrap();
    harness.expect_state(DeviceState::Failure).await;

    // The next attempt is still associating when the late GroupFinished of
    // the abandoned group arrives; it must not be torn down by it.
    harness.connect(second_address).await.unwrap();
    let device = harness.expect_state(DeviceState::Association).await;
    harness
        .events
        .send(Event::GroupFinished {
            group: path("/g/0"),
            interface: path("/i/0"),
        })
        .unwrap();
    harness.settle().await;

    assert_eq!(device.state.get(), DeviceState::Association);
    assert_eq!(device.address(), second_address);
    assert_eq!(harness.count(&Action::CloseGroup), 1);
}

#[tokio::test]
async fn disconnect_is_idempotent() {
    let mut harness = Harness::new();
    establish_go_connection(&mut harness).await;

    harness.disconnect(peer_address()).await.unwrap();
    harness.disconnect(peer_address()).await.unwrap();
    assert_eq!(harness.count(&Action::GroupDisconnect), 1);

    harness
        .events
        .send(Event::GroupFinished {
            group: path("/g/0"),
            interface: path("/i/0"),
        })
        .unwrap();
    harness.expect_state(DeviceState::Disconnected).await;

    let after = harness.disconnect(peer_address()).await;
    assert!(matches!(after, Err(Error::InvalidState(_))));
}

#[tokio::test]
async fn second_connect_is_rejected_while_one_is_active() {
    let mut harness = Harness::new();
    harness.start().await;
    harness.add_peer("/p/0", peer_address()).await;

    harness.connect(peer_address()).await.unwrap();
    harness.expect_state(DeviceState::Association).await;

    let second = harness.connect(peer_address()).await;
    assert!(matches!(second, Err(Error::InvalidState(_))));
    assert_eq!(harness.count(&Action::ConnectPeer("/p/0".into())), 1);
}

#[tokio::test]
async fn connect_to_unknown_device_is_rejected() {
    let harness = Harness::new();
    harness.start().await;

    let result = harness.connect(peer_address()).await;

    assert!(matches!(result, Err(Error::DeviceNotFound(_))));
    assert_eq!(harness.count(&Action::StopFind), 0);
}

#[tokio::test]
async fn failing_connect_request_clears_the_attempt() {
    let link = LinkConfig {
        fail_connect: true,
        ..Default::default()
    };
    let mut harness = Harness::with(Config::default(), link, "laptop");
    harness.start().await;
    harness.add_peer("/p/0", peer_address()).await;

    let result = harness.connect(peer_address()).await;

    assert!(matches!(result, Err(Error::NegotiationFailed(_))));
    harness.expect_state(DeviceState::Failure).await;

    // The attempt was cleared; the next connect reaches the supplicant
    // again instead of being rejected as already in progress.
    let again = harness.connect(peer_address()).await;
    assert!(matches!(again, Err(Error::NegotiationFailed(_))));
    assert_eq!(harness.count(&Action::ConnectPeer("/p/0".into())), 2);
}

#[tokio::test]
async fn negotiation_failure_clears_the_attempt() {
    let mut harness = Harness::new();
    harness.start().await;
    harness.add_peer("/p/0", peer_address()).await;

    harness.connect(peer_address()).await.unwrap();
    harness.expect_state(DeviceState::Association).await;

    harness
        .events
        .send(Event::GoNegotiationFailure(NegotiationOutcome {
            peer: Some(path("/p/0")),
            status: 5,
            ..Default::default()
        }))
        .unwrap();
    harness.expect_state(DeviceState::Failure).await;

    // Cleared; a new attempt starts from scratch.
    harness.connect(peer_address()).await.unwrap();
    harness.expect_state(DeviceState::Association).await;
}

#[tokio::test]
async fn stale_dhcp_events_are_ignored() {
    let mut harness = Harness::new();
    harness.start().await;
    harness.add_peer("/p/0", peer_address()).await;

    harness.connect(peer_address()).await.unwrap();
    harness.expect_state(DeviceState::Association).await;

    harness
        .events
        .send(Event::GroupStarted {
            group: path("/g/0"),
            interface: path("/i/0"),
            role: "GO".into(),
        })
        .unwrap();
    let device = harness.expect_state(DeviceState::Configuration).await;
    harness.settle().await;

    harness
        .events
        .send(Event::DhcpAddressAssigned {
            token: 99,
            local: local_ip(),
            remote: remote_ip(),
        })
        .unwrap();
    harness.settle().await;

    assert_eq!(device.state.get(), DeviceState::Configuration);
    assert_eq!(device.ipv4.get(), None);
}

#[tokio::test]
async fn equal_capabilities_do_not_republish() {
    let harness = Harness::new();
    harness.start().await;

    let before = harness
        .actions()
        .iter()
        .filter(|action| matches!(action, Action::PublishIes(_)))
        .count();

    harness.set_capabilities(vec![Capability::Source]).await;
    harness.set_capabilities(vec![Capability::Source]).await;

    let after = harness
        .actions()
        .iter()
        .filter(|action| matches!(action, Action::PublishIes(_)))
        .count();
    assert_eq!(after, before + 1);
}

#[tokio::test]
async fn service_vanishing_releases_everything() {
    let mut harness = Harness::new();
    establish_go_connection(&mut harness).await;

    harness.events.send(Event::ServiceVanished).unwrap();
    harness.expect_state(DeviceState::Disconnected).await;
    harness.expect_lost().await;

    assert!(!harness.shared.running.get());
    assert!(harness.shared.devices.get().is_empty());
    assert!(harness.dhcp_released.load(Ordering::SeqCst));
}

#[tokio::test]
async fn dedicated_interface_is_adopted_when_creation_fails() {
    let link = LinkConfig {
        interfaces: vec![MockInterface {
            path: path("/if/7"),
            name: "p2p0".into(),
            p2p: false,
        }],
        ..Default::default()
    };
    let config = Config {
        dedicated_p2p_interface: Some("p2p0".into()),
        ..Default::default()
    };
    let harness = Harness::with(config, link, "laptop");
    harness.start().await;

    let actions = harness.actions();
    assert!(actions.contains(&Action::CreateInterface("p2p0".into())));
    assert!(actions.contains(&Action::Attach("/if/7".into())));
}

#[tokio::test]
async fn first_p2p_capable_interface_wins() {
    let link = LinkConfig {
        interfaces: vec![
            MockInterface {
                path: path("/if/0"),
                name: "wlan0".into(),
                p2p: false,
            },
            MockInterface {
                path: path("/if/1"),
                name: "wlan1".into(),
                p2p: true,
            },
        ],
        ..Default::default()
    };
    let harness = Harness::with(Config::default(), link, "laptop");
    harness.start().await;

    let actions = harness.actions();
    assert!(!actions.contains(&Action::Attach("/if/0".into())));
    assert!(actions.contains(&Action::Attach("/if/1".into())));
}

#[tokio::test]
async fn peers_are_announced_only_after_their_fetch() {
    let link = LinkConfig {
        peers: vec![(path("/p/9"), "projector".into(), peer_address())],
        ..Default::default()
    };
    let mut harness = Harness::with(Config::default(), link, "laptop");
    harness.start().await;

    harness.events.send(Event::PeerFound(path("/p/9"))).unwrap();

    let device = harness.expect_found().await;
    assert_eq!(device.object_path().as_str(), "/p/9");
    assert_eq!(device.address(), peer_address());
    assert_eq!(device.name.get(), "projector");
}

#[tokio::test]
async fn scanning_follows_find_and_find_stopped() {
    let mut harness = Harness::new();
    harness.start().await;

    harness.scan(Duration::from_secs(10)).await.unwrap();
    assert!(harness.shared.scanning.get());
    assert_eq!(harness.count(&Action::Find(10)), 1);
    loop {
        if let NetworkEvent::ScanningChanged(true) = harness.recv().await {
            break;
        }
    }

    harness.events.send(Event::FindStopped).unwrap();
    loop {
        if let NetworkEvent::ScanningChanged(false) = harness.recv().await {
            break;
        }
    }
    assert!(!harness.shared.scanning.get());
}
