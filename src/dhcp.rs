//! Seam towards the DHCP collaborators.
//!
//! Addressing on the group link is owned by external endpoints: a server
//! when we are the group owner, a client otherwise. Implementations report
//! through the [`DhcpNotifier`] handed to them at spawn time and stop when
//! their handle is dropped.

use std::net::Ipv4Addr;

use crate::events::{Event, EventSender};

/// Callback channel of a DHCP endpoint.
///
/// Events are stamped with the connection attempt the endpoint belongs to;
/// reports from an endpoint that outlived its attempt are dropped.
#[derive(Debug, Clone)]
pub struct DhcpNotifier {
    token: u64,
    events: EventSender,
}

impl DhcpNotifier {
    pub(crate) fn new(token: u64, events: EventSender) -> Self {
        Self { token, events }
    }

    /// Reports a completed address configuration on the group link.
    pub fn address_assigned(&self, local: Ipv4Addr, remote: Ipv4Addr) {
        let _ = self.events.send(Event::DhcpAddressAssigned {
            token: self.token,
            local,
            remote,
        });
    }

    /// Reports that the endpoint gave up or exited.
    pub fn terminated(&self) {
        let _ = self.events.send(Event::DhcpTerminated { token: self.token });
    }
}

/// A running DHCP endpoint. Dropping the handle stops it.
pub trait DhcpHandle: Send + Sync {
    /// Address configured on the local end of the group link, once known.
    fn local_address(&self) -> Option<Ipv4Addr>;
}

/// Spawns DHCP endpoints on a group interface.
pub trait DhcpFactory: Send + Sync {
    /// Starts a DHCP server for a group we own.
    fn start_server(&self, ifname: &str, notifier: DhcpNotifier) -> Box<dyn DhcpHandle>;

    /// Starts a DHCP client towards the group owner.
    fn start_client(&self, ifname: &str, notifier: DhcpNotifier) -> Box<dyn DhcpHandle>;
}
