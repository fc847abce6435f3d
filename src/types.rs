//! Shared connection manager types.

/// Streaming roles the local endpoint offers to peers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Capability {
    /// We can send a stream (Miracast source).
    Source,
    /// We can render a stream (Miracast sink).
    Sink,
}

/// Lifecycle of a single connection attempt towards a peer.
///
/// `Disconnected` and `Failure` are terminal for the attempt; the active
/// device reference is dropped when either is entered.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DeviceState {
    /// No attempt ongoing.
    #[default]
    Idle,
    /// Group owner negotiation is running.
    Association,
    /// The group is up, addresses are being configured.
    Configuration,
    /// Addresses assigned, ready for streaming.
    Connected,
    /// The attempt ended orderly.
    Disconnected,
    /// The attempt was aborted.
    Failure,
}

/// Role the local endpoint plays in an active P2P group.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DeviceRole {
    /// No group membership.
    #[default]
    None,
    /// We act as the group owner and run the DHCP server.
    GroupOwner,
    /// We joined someone else's group.
    Client,
}

impl DeviceRole {
    /// Maps the role string of the supplicant's GroupStarted signal.
    pub(crate) fn from_group_role(role: &str) -> Self {
        match role {
            "GO" => Self::GroupOwner,
            "client" => Self::Client,
            _ => Self::None,
        }
    }
}

/// Argument of the `MIRACAST` driver private command.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(i32)]
pub enum MiracastMode {
    Off = 0,
    Source = 1,
    Sink = 2,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn group_role_mapping() {
        assert_eq!(DeviceRole::from_group_role("GO"), DeviceRole::GroupOwner);
        assert_eq!(DeviceRole::from_group_role("client"), DeviceRole::Client);
        assert_eq!(DeviceRole::from_group_role(""), DeviceRole::None);
        assert_eq!(DeviceRole::from_group_role("owner"), DeviceRole::None);
    }
}
