//! Host identity announced to peers: name and chassis.

use async_trait::async_trait;
use futures::StreamExt;
use tokio::task::JoinHandle;
use tracing::debug;
use zbus::Connection;

use crate::error::Error;
use crate::events::{Event, EventSender};
use crate::net;
use crate::proxy::hostname::Hostname1Proxy;

/// Source of the name and chassis used in the device configuration.
#[async_trait]
pub(crate) trait HostInfo: Send + Sync {
    /// Friendly name announced to peers.
    async fn hostname(&self) -> String;

    /// Chassis identifier driving the WPS device type.
    async fn chassis(&self) -> String;
}

/// hostname1 backed host identity.
///
/// Prefers the pretty hostname, then the static one, then the transient
/// kernel name, and as a last resort asks the kernel directly. Property
/// changes are forwarded so the device configuration can be re-synced.
pub(crate) struct SystemHostInfo {
    proxy: Hostname1Proxy<'static>,
    monitor: JoinHandle<()>,
}

impl SystemHostInfo {
    pub(crate) async fn new(
        connection: &Connection,
        events: EventSender,
    ) -> Result<Self, Error> {
        let proxy = Hostname1Proxy::new(connection).await?;
        let monitor = tokio::spawn(Self::monitor(proxy.clone(), events));

        Ok(Self { proxy, monitor })
    }

    async fn monitor(proxy: Hostname1Proxy<'static>, events: EventSender) {
        let mut hostname_changed = proxy.receive_hostname_changed().await;
        let mut static_changed = proxy.receive_static_hostname_changed().await;
        let mut pretty_changed = proxy.receive_pretty_hostname_changed().await;

        loop {
            tokio::select! {
                Some(_) = hostname_changed.next() => {
                    let _ = events.send(Event::HostnameChanged);
                }
                Some(_) = static_changed.next() => {
                    let _ = events.send(Event::HostnameChanged);
                }
                Some(_) = pretty_changed.next() => {
                    let _ = events.send(Event::HostnameChanged);
                }
                else => break,
            }
        }

        debug!("hostname property streams ended");
    }
}

impl Drop for SystemHostInfo {
    fn drop(&mut self) {
        self.monitor.abort();
    }
}

#[async_trait]
impl HostInfo for SystemHostInfo {
    async fn hostname(&self) -> String {
        for candidate in [
            self.proxy.pretty_hostname().await,
            self.proxy.static_hostname().await,
            self.proxy.hostname().await,
        ] {
            match candidate {
                Ok(name) if !name.is_empty() => return name,
                Ok(_) => {}
                Err(e) => debug!(error = %e, "hostname lookup failed"),
            }
        }

        net::system_hostname().unwrap_or_default()
    }

    async fn chassis(&self) -> String {
        self.proxy.chassis().await.unwrap_or_default()
    }
}
