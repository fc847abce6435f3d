use std::env;
use std::time::Duration;

/// Name of the interface to create at (or adopt from) the supplicant
/// instead of probing for P2P support.
pub const DEDICATED_P2P_INTERFACE_ENV: &str = "AETHERCAST_DEDICATED_P2P_INTERFACE";

/// Set to `"1"` to gate startup on a firmware load for the P2P interface.
pub const NEED_FIRMWARE_ENV: &str = "AETHERCAST_NEED_FIRMWARE";

const DEFAULT_P2P_INTERFACE: &str = "p2p0";
const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(30);

/// Runtime settings of the connection manager.
///
/// Everything here comes from the environment; the service keeps no state
/// on disk.
#[derive(Debug, Clone)]
pub struct Config {
    /// Interface name to create/adopt, bypassing P2P capability probing.
    pub dedicated_p2p_interface: Option<String>,
    /// Whether startup waits for a firmware load on the P2P interface.
    pub need_firmware: bool,
    /// How long a connection attempt may stay in association before it is
    /// cancelled.
    pub connect_timeout: Duration,
}

impl Config {
    /// Reads the configuration from the process environment.
    pub fn from_env() -> Self {
        Self::from_values(
            env::var(DEDICATED_P2P_INTERFACE_ENV).ok(),
            env::var(NEED_FIRMWARE_ENV).ok(),
        )
    }

    fn from_values(dedicated: Option<String>, need_firmware: Option<String>) -> Self {
        Self {
            dedicated_p2p_interface: dedicated.filter(|name| !name.is_empty()),
            need_firmware: need_firmware.as_deref() == Some("1"),
            connect_timeout: DEFAULT_CONNECT_TIMEOUT,
        }
    }

    /// Interface name the firmware loader is pointed at.
    pub(crate) fn firmware_interface(&self) -> &str {
        self.dedicated_p2p_interface
            .as_deref()
            .unwrap_or(DEFAULT_P2P_INTERFACE)
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            dedicated_p2p_interface: None,
            need_firmware: false,
            connect_timeout: DEFAULT_CONNECT_TIMEOUT,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_environment_uses_defaults() {
        let config = Config::from_values(None, None);

        assert_eq!(config.dedicated_p2p_interface, None);
        assert!(!config.need_firmware);
        assert_eq!(config.connect_timeout, Duration::from_secs(30));
        assert_eq!(config.firmware_interface(), "p2p0");
    }

    #[test]
    fn dedicated_interface_is_picked_up() {
        let config = Config::from_values(Some("p2p-dev-wlan0".into()), None);

        assert_eq!(
            config.dedicated_p2p_interface.as_deref(),
            Some("p2p-dev-wlan0")
        );
        assert_eq!(config.firmware_interface(), "p2p-dev-wlan0");
    }

    #[test]
    fn empty_dedicated_interface_counts_as_unset() {
        let config = Config::from_values(Some(String::new()), None);

        assert_eq!(config.dedicated_p2p_interface, None);
    }

    #[test]
    fn firmware_gate_requires_exactly_one() {
        assert!(Config::from_values(None, Some("1".into())).need_firmware);
        assert!(!Config::from_values(None, Some("0".into())).need_firmware);
        assert!(!Config::from_values(None, Some("yes".into())).need_firmware);
    }
}
