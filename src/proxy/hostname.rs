//! systemd-hostnamed interface.

use zbus::proxy;

/// Host naming and chassis information.
#[proxy(
    default_service = "org.freedesktop.hostname1",
    interface = "org.freedesktop.hostname1",
    default_path = "/org/freedesktop/hostname1"
)]
pub trait Hostname1 {
    /// Transient (kernel) hostname.
    #[zbus(property)]
    fn hostname(&self) -> zbus::Result<String>;

    /// Configured hostname from /etc/hostname.
    #[zbus(property)]
    fn static_hostname(&self) -> zbus::Result<String>;

    /// Human readable host name.
    #[zbus(property)]
    fn pretty_hostname(&self) -> zbus::Result<String>;

    /// Chassis type of the machine (laptop, handset, ...).
    #[zbus(property)]
    fn chassis(&self) -> zbus::Result<String>;
}
