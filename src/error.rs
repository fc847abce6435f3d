use macaddr::MacAddr6;

/// Connection manager errors
#[derive(thiserror::Error, Debug)]
pub enum Error {
    /// D-Bus communication error
    #[error("D-Bus operation failed: {0}")]
    DbusError(#[from] zbus::Error),

    /// The supplicant rejected or aborted a group negotiation
    #[error("peer negotiation failed: {0}")]
    NegotiationFailed(String),

    /// API call not possible in the current state
    #[error("operation not possible: {0}")]
    InvalidState(&'static str),

    /// Device not present in the peer table
    #[error("device {0} is not known")]
    DeviceNotFound(MacAddr6),

    /// No P2P capable interface is available yet
    #[error("no P2P capable interface available")]
    NoP2pInterface,

    /// The session task is gone
    #[error("connection manager is not running")]
    ServiceDown,
}
