//! Picks the interface the P2P device is driven on.

use tracing::debug;
use zbus::zvariant::OwnedObjectPath;

use crate::error::Error;
use crate::link::SupplicantLink;

/// Selection policy over the interfaces the supplicant reports.
///
/// With a dedicated interface name configured only that interface is
/// acceptable; otherwise the first interface whose P2P surface responds
/// wins. Re-run whenever the manager's interface list changes.
pub(crate) struct InterfaceSelector {
    dedicated: Option<String>,
}

impl InterfaceSelector {
    pub(crate) fn new(dedicated: Option<String>) -> Self {
        Self { dedicated }
    }

    pub(crate) async fn select(
        &self,
        link: &dyn SupplicantLink,
    ) -> Result<Option<OwnedObjectPath>, Error> {
        for path in link.interfaces().await? {
            if let Some(wanted) = &self.dedicated {
                match link.interface_name(&path).await {
                    Ok(name) if name == *wanted => return Ok(Some(path)),
                    Ok(name) => debug!(%path, name, "skipping interface, name mismatch"),
                    Err(e) => debug!(%path, error = %e, "skipping unnamed interface"),
                }
            } else if link.supports_p2p(&path).await {
                return Ok(Some(path));
            }
        }

        Ok(None)
    }
}
