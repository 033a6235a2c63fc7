//! Network Monitoring Implementation

use async_trait::async_trait;
use bridge_traits::{
    error::Result,
    network::{ConnectionType, NetworkMonitor, NetworkSnapshot},
};
use std::time::Duration;
use tracing::debug;

const DEFAULT_CHECK_ADDR: &str = "8.8.8.8:53";

/// Desktop network monitor implementation
///
/// Desktops are treated as wired whenever a TCP connect succeeds. Telling WiFi
/// from Ethernet needs platform APIs (netlink, SystemConfiguration, WinAPI);
/// hosts that care can feed a `HostNetworkMonitor` instead.
pub struct DesktopNetworkMonitor {
    check_addr: String,
    check_timeout: Duration,
}

impl DesktopNetworkMonitor {
    pub fn new() -> Self {
        Self {
            check_addr: DEFAULT_CHECK_ADDR.to_string(),
            check_timeout: Duration::from_secs(5),
        }
    }

    /// Check a different address, e.g. the media CDN.
    pub fn with_check_target(check_addr: impl Into<String>, check_timeout: Duration) -> Self {
        Self {
            check_addr: check_addr.into(),
            check_timeout,
        }
    }

    async fn check_connectivity(&self) -> bool {
        matches!(
            tokio::time::timeout(
                self.check_timeout,
                tokio::net::TcpStream::connect(self.check_addr.as_str()),
            )
            .await,
            Ok(Ok(_))
        )
    }
}

impl Default for DesktopNetworkMonitor {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl NetworkMonitor for DesktopNetworkMonitor {
    async fn snapshot(&self) -> Result<NetworkSnapshot> {
        let connection_type = if self.check_connectivity().await {
            ConnectionType::Wired
        } else {
            ConnectionType::None
        };

        debug!(connection = connection_type.as_str(), "Network snapshot taken");
        Ok(NetworkSnapshot::new(connection_type))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_snapshot_is_wired_or_offline() {
        let monitor = DesktopNetworkMonitor::new();
        let snapshot = monitor.snapshot().await.unwrap();

        assert!(matches!(
            snapshot.connection_type,
            ConnectionType::Wired | ConnectionType::None
        ));
        assert!(snapshot.signal_strength.is_none());
    }

    #[tokio::test]
    async fn test_local_listener_is_reachable() {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();

        let monitor = DesktopNetworkMonitor::with_check_target(addr.to_string(), Duration::from_secs(1));
        assert!(monitor.is_connected().await);
        assert!(monitor.is_high_bandwidth().await);
        assert!(!monitor.is_low_power_mode().await);
    }
}
