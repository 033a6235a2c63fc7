//! Network Monitoring Abstraction
//!
//! Provides the connection snapshot and power state the cache core uses to
//! pick a rendition and to decide whether speculative downloads are allowed.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio::sync::watch;

use crate::error::Result;

/// Network connection type
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConnectionType {
    /// Not connected to any network
    None,
    /// Connected, but the medium could not be determined
    Unknown,
    /// Cellular/mobile data connection
    Cellular,
    /// WiFi connection
    Wifi,
    /// Ethernet or other wired connection
    Wired,
}

impl ConnectionType {
    pub fn is_connected(&self) -> bool {
        !matches!(self, ConnectionType::None)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ConnectionType::None => "none",
            ConnectionType::Unknown => "unknown",
            ConnectionType::Cellular => "cellular",
            ConnectionType::Wifi => "wifi",
            ConnectionType::Wired => "wired",
        }
    }
}

/// WiFi signal quality bucket.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SignalStrength {
    VeryWeak,
    Weak,
    Fair,
    Good,
    Excellent,
}

impl SignalStrength {
    /// Bucket an RSSI reading (dBm).
    pub fn from_rssi(rssi_dbm: i32) -> Self {
        if rssi_dbm >= -50 {
            SignalStrength::Excellent
        } else if rssi_dbm >= -70 {
            SignalStrength::Good
        } else if rssi_dbm >= -85 {
            SignalStrength::Fair
        } else if rssi_dbm >= -100 {
            SignalStrength::Weak
        } else {
            SignalStrength::VeryWeak
        }
    }

    /// Bucket level from 0 (very weak) to 4 (excellent).
    pub fn level(&self) -> u8 {
        match self {
            SignalStrength::VeryWeak => 0,
            SignalStrength::Weak => 1,
            SignalStrength::Fair => 2,
            SignalStrength::Good => 3,
            SignalStrength::Excellent => 4,
        }
    }

    /// Throughput scale factor in `[0, 1]`.
    pub fn factor(&self) -> f64 {
        f64::from(self.level()) / 4.0
    }

    pub fn label(&self) -> &'static str {
        match self {
            SignalStrength::VeryWeak => "Very Weak",
            SignalStrength::Weak => "Weak",
            SignalStrength::Fair => "Fair",
            SignalStrength::Good => "Good",
            SignalStrength::Excellent => "Excellent",
        }
    }
}

/// Point-in-time view of the connection, supplied per decision.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct NetworkSnapshot {
    pub connection_type: ConnectionType,
    pub signal_strength: Option<SignalStrength>,
}

impl NetworkSnapshot {
    pub fn new(connection_type: ConnectionType) -> Self {
        Self {
            connection_type,
            signal_strength: None,
        }
    }

    pub fn offline() -> Self {
        Self::new(ConnectionType::None)
    }

    pub fn with_signal(mut self, strength: SignalStrength) -> Self {
        self.signal_strength = Some(strength);
        self
    }

    pub fn with_rssi(self, rssi_dbm: i32) -> Self {
        self.with_signal(SignalStrength::from_rssi(rssi_dbm))
    }

    pub fn is_connected(&self) -> bool {
        self.connection_type.is_connected()
    }

    /// WiFi and wired links count as high bandwidth for speculative downloads.
    pub fn is_high_bandwidth(&self) -> bool {
        matches!(
            self.connection_type,
            ConnectionType::Wifi | ConnectionType::Wired
        )
    }
}

impl Default for NetworkSnapshot {
    fn default() -> Self {
        Self::new(ConnectionType::Unknown)
    }
}

/// Network monitor trait
///
/// Supplied by the host application. Implementations report the current
/// connection and the device power mode:
///
/// - **Desktop**: TCP connect check, always wired
/// - **Mobile**: NetInfo / ConnectivityManager plus the OS low-power flag
/// - **Embedding hosts**: push updates into [`HostNetworkMonitor`]
///
/// # Example
///
/// ```ignore
/// use bridge_traits::network::NetworkMonitor;
///
/// async fn may_prefetch(monitor: &dyn NetworkMonitor) -> bool {
///     monitor.is_high_bandwidth().await && !monitor.is_low_power_mode().await
/// }
/// ```
#[async_trait]
pub trait NetworkMonitor: Send + Sync {
    /// Get the current connection snapshot
    async fn snapshot(&self) -> Result<NetworkSnapshot>;

    /// Whether the device is in a battery-saving mode
    async fn is_low_power_mode(&self) -> bool {
        false
    }

    /// Check if currently connected to any network
    async fn is_connected(&self) -> bool {
        matches!(self.snapshot().await, Ok(snapshot) if snapshot.is_connected())
    }

    /// Check if the connection is suitable for speculative downloads
    async fn is_high_bandwidth(&self) -> bool {
        matches!(self.snapshot().await, Ok(snapshot) if snapshot.is_high_bandwidth())
    }
}

/// Network monitor fed by the host application.
///
/// Hosts call [`update`](Self::update) from their connectivity callbacks;
/// subscribers observe every change through a `watch` channel.
#[derive(Debug)]
pub struct HostNetworkMonitor {
    snapshot: watch::Sender<NetworkSnapshot>,
    low_power_mode: watch::Sender<bool>,
}

impl HostNetworkMonitor {
    pub fn new(initial: NetworkSnapshot) -> Self {
        Self {
            snapshot: watch::Sender::new(initial),
            low_power_mode: watch::Sender::new(false),
        }
    }

    /// Replace the current snapshot.
    pub fn update(&self, snapshot: NetworkSnapshot) {
        self.snapshot.send_replace(snapshot);
    }

    pub fn set_low_power_mode(&self, enabled: bool) {
        self.low_power_mode.send_replace(enabled);
    }

    pub fn current(&self) -> NetworkSnapshot {
        *self.snapshot.borrow()
    }

    /// Receiver that observes every snapshot change.
    pub fn subscribe(&self) -> watch::Receiver<NetworkSnapshot> {
        self.snapshot.subscribe()
    }
}

impl Default for HostNetworkMonitor {
    fn default() -> Self {
        Self::new(NetworkSnapshot::default())
    }
}

#[async_trait]
impl NetworkMonitor for HostNetworkMonitor {
    async fn snapshot(&self) -> Result<NetworkSnapshot> {
        Ok(self.current())
    }

    async fn is_low_power_mode(&self) -> bool {
        *self.low_power_mode.borrow()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rssi_buckets() {
        assert_eq!(SignalStrength::from_rssi(-40), SignalStrength::Excellent);
        assert_eq!(SignalStrength::from_rssi(-50), SignalStrength::Excellent);
        assert_eq!(SignalStrength::from_rssi(-65), SignalStrength::Good);
        assert_eq!(SignalStrength::from_rssi(-80), SignalStrength::Fair);
        assert_eq!(SignalStrength::from_rssi(-95), SignalStrength::Weak);
        assert_eq!(SignalStrength::from_rssi(-110), SignalStrength::VeryWeak);
    }

    #[test]
    fn test_signal_factor_range() {
        assert_eq!(SignalStrength::Excellent.factor(), 1.0);
        assert_eq!(SignalStrength::Fair.factor(), 0.5);
        assert_eq!(SignalStrength::VeryWeak.factor(), 0.0);
    }

    #[test]
    fn test_snapshot_bandwidth_classes() {
        assert!(NetworkSnapshot::new(ConnectionType::Wifi).is_high_bandwidth());
        assert!(NetworkSnapshot::new(ConnectionType::Wired).is_high_bandwidth());
        assert!(!NetworkSnapshot::new(ConnectionType::Cellular).is_high_bandwidth());
        assert!(!NetworkSnapshot::offline().is_connected());
        assert!(NetworkSnapshot::default().is_connected());
    }

    #[tokio::test]
    async fn test_host_monitor_updates() {
        let monitor = HostNetworkMonitor::new(NetworkSnapshot::new(ConnectionType::Cellular));
        assert!(!monitor.is_high_bandwidth().await);
        assert!(!monitor.is_low_power_mode().await);

        monitor.update(NetworkSnapshot::new(ConnectionType::Wifi).with_rssi(-60));
        monitor.set_low_power_mode(true);

        let snapshot = monitor.snapshot().await.unwrap();
        assert_eq!(snapshot.connection_type, ConnectionType::Wifi);
        assert_eq!(snapshot.signal_strength, Some(SignalStrength::Good));
        assert!(monitor.is_high_bandwidth().await);
        assert!(monitor.is_low_power_mode().await);
    }

    #[tokio::test]
    async fn test_host_monitor_subscription() {
        let monitor = HostNetworkMonitor::default();
        let mut rx = monitor.subscribe();

        monitor.update(NetworkSnapshot::offline());
        rx.changed().await.unwrap();
        assert_eq!(*rx.borrow(), NetworkSnapshot::offline());
    }
}
