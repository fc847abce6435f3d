//! Seam towards the platform firmware loader.

use async_trait::async_trait;

use crate::error::Error;

/// Loads WiFi firmware on platforms that gate P2P behind it.
///
/// Consulted once when the supplicant appears and `AETHERCAST_NEED_FIRMWARE`
/// is set; a failed load keeps the stack down until the service bounces.
#[async_trait]
pub trait FirmwareLoader: Send + Sync {
    /// Whether the interface needs a firmware load before use.
    async fn is_needed(&self, ifname: &str) -> bool;

    /// Performs the load, returning once the firmware is active.
    async fn load(&self, ifname: &str) -> Result<(), Error>;
}
