//! # Network Quality Selection
//!
//! Picks the rendition to request for the current connection. Renditions
//! are pre-encoded and live next to the source URL with a per-tier suffix
//! (`video.mp4` → `video_720p.mp4`).
//!
//! Selection order:
//!
//! 1. A forced level always wins.
//! 2. No connection selects the lowest tier.
//! 3. Low-power mode selects the second-lowest tier.
//! 4. Otherwise the highest tier whose `min_mbps_required` fits the
//!    estimated throughput of the connection.

use bridge_traits::network::{ConnectionType, NetworkSnapshot};
use serde::{Deserialize, Serialize};
use std::fmt;
use tracing::debug;

use crate::error::{CacheError, Result};

/// Rendition level, ordered from lowest to highest bitrate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QualityLevel {
    UltraLow,
    Low,
    Medium,
    High,
    UltraHigh,
}

impl QualityLevel {
    pub const ALL: [QualityLevel; 5] = [
        QualityLevel::UltraLow,
        QualityLevel::Low,
        QualityLevel::Medium,
        QualityLevel::High,
        QualityLevel::UltraHigh,
    ];

    pub fn index(&self) -> usize {
        *self as usize
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            QualityLevel::UltraLow => "ultra_low",
            QualityLevel::Low => "low",
            QualityLevel::Medium => "medium",
            QualityLevel::High => "high",
            QualityLevel::UltraHigh => "ultra_high",
        }
    }
}

impl fmt::Display for QualityLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One rung of the ladder.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QualityTier {
    pub level: QualityLevel,
    pub label: String,
    pub bitrate_kbps: u32,
    pub min_mbps_required: f64,
    /// Inserted before the file extension, e.g. `_720p`
    pub uri_suffix: String,
}

impl QualityTier {
    pub fn new(
        level: QualityLevel,
        label: impl Into<String>,
        bitrate_kbps: u32,
        min_mbps_required: f64,
    ) -> Self {
        let label = label.into();
        Self {
            uri_suffix: format!("_{}", label.to_lowercase()),
            level,
            label,
            bitrate_kbps,
            min_mbps_required,
        }
    }

    /// "720p (1500kbps)"
    pub fn display_label(&self) -> String {
        format!("{} ({}kbps)", self.label, self.bitrate_kbps)
    }
}

/// Tiers in strictly ascending bitrate order.
#[derive(Debug, Clone, PartialEq)]
pub struct QualityLadder {
    tiers: Vec<QualityTier>,
}

impl QualityLadder {
    /// 240p / 360p / 720p / 1080p / 4K.
    pub fn standard() -> Self {
        Self {
            tiers: vec![
                QualityTier::new(QualityLevel::UltraLow, "240p", 300, 0.3),
                QualityTier::new(QualityLevel::Low, "360p", 600, 0.6),
                QualityTier::new(QualityLevel::Medium, "720p", 1500, 1.5),
                QualityTier::new(QualityLevel::High, "1080p", 3000, 3.0),
                QualityTier::new(QualityLevel::UltraHigh, "4K", 6000, 6.0),
            ],
        }
    }

    /// Build a custom ladder.
    ///
    /// # Errors
    ///
    /// Returns [`CacheError::Config`] if `tiers` is empty or not strictly
    /// ascending by bitrate.
    pub fn new(tiers: Vec<QualityTier>) -> Result<Self> {
        if tiers.is_empty() {
            return Err(CacheError::Config(
                "quality ladder must not be empty".to_string(),
            ));
        }
        if tiers
            .windows(2)
            .any(|pair| pair[0].bitrate_kbps >= pair[1].bitrate_kbps)
        {
            return Err(CacheError::Config(
                "quality ladder must be ascending by bitrate".to_string(),
            ));
        }
        Ok(Self { tiers })
    }

    pub fn tiers(&self) -> &[QualityTier] {
        &self.tiers
    }

    pub fn len(&self) -> usize {
        self.tiers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tiers.is_empty()
    }

    pub fn lowest(&self) -> &QualityTier {
        &self.tiers[0]
    }

    /// Second rung, or the only rung of a one-tier ladder.
    pub fn second_lowest(&self) -> &QualityTier {
        self.tiers.get(1).unwrap_or(&self.tiers[0])
    }

    pub fn highest(&self) -> &QualityTier {
        &self.tiers[self.tiers.len() - 1]
    }

    pub fn get(&self, level: QualityLevel) -> Option<&QualityTier> {
        self.tiers.iter().find(|tier| tier.level == level)
    }

    pub fn index_of(&self, level: QualityLevel) -> Option<usize> {
        self.tiers.iter().position(|tier| tier.level == level)
    }
}

impl Default for QualityLadder {
    fn default() -> Self {
        Self::standard()
    }
}

/// Outcome of comparing two network snapshots.
#[derive(Debug, Clone, PartialEq)]
pub struct QualityRecommendation {
    pub should_change: bool,
    pub quality: QualityTier,
    pub reason: String,
    pub type_changed: bool,
}

/// Chooses a [`QualityTier`] per snapshot and damps switching.
#[derive(Debug, Clone, Default)]
pub struct NetworkQualitySelector {
    ladder: QualityLadder,
}

impl NetworkQualitySelector {
    pub fn new(ladder: QualityLadder) -> Self {
        Self { ladder }
    }

    pub fn ladder(&self) -> &QualityLadder {
        &self.ladder
    }

    pub fn select(
        &self,
        snapshot: &NetworkSnapshot,
        low_power_mode: bool,
        forced: Option<QualityLevel>,
    ) -> &QualityTier {
        if let Some(level) = forced {
            match self.ladder.get(level) {
                Some(tier) => return tier,
                None => debug!(level = %level, "Forced level not on ladder, ignoring"),
            }
        }

        if !snapshot.is_connected() {
            return self.ladder.lowest();
        }

        if low_power_mode {
            return self.ladder.second_lowest();
        }

        let max_mbps = Self::estimated_max_mbps(snapshot);
        self.ladder
            .tiers()
            .iter()
            .rev()
            .find(|tier| tier.min_mbps_required <= max_mbps)
            .unwrap_or_else(|| self.ladder.lowest())
    }

    /// Throughput estimate for a connection class.
    ///
    /// WiFi scales its baseline by the signal bucket when one is known.
    pub fn estimated_max_mbps(snapshot: &NetworkSnapshot) -> f64 {
        match snapshot.connection_type {
            ConnectionType::None => 0.0,
            ConnectionType::Unknown => 0.5,
            ConnectionType::Cellular => 2.5,
            ConnectionType::Wifi => match snapshot.signal_strength {
                Some(strength) => 25.0 * strength.factor(),
                None => 25.0,
            },
            ConnectionType::Wired => 100.0,
        }
    }

    /// Hysteresis: only switch across two or more rungs.
    pub fn should_switch(&self, current: &QualityTier, proposed: &QualityTier) -> bool {
        if current.level == proposed.level {
            return false;
        }
        let position = |tier: &QualityTier| {
            self.ladder
                .index_of(tier.level)
                .unwrap_or_else(|| tier.level.index())
        };
        position(current).abs_diff(position(proposed)) >= 2
    }

    /// Decide whether playback should move to a new tier after a network
    /// change. Without a current tier any proposal is a change.
    pub fn analyze_change(
        &self,
        previous: &NetworkSnapshot,
        current: &NetworkSnapshot,
        current_quality: Option<&QualityTier>,
        low_power_mode: bool,
    ) -> QualityRecommendation {
        let quality = self.select(current, low_power_mode, None).clone();
        let type_changed = previous.connection_type != current.connection_type;
        let should_switch = match current_quality {
            Some(active) => self.should_switch(active, &quality),
            None => true,
        };

        let reason = if should_switch {
            format!(
                "Network quality changed: {} → {}",
                current_quality.map_or("Auto", |q| q.label.as_str()),
                quality.label
            )
        } else if type_changed {
            format!(
                "Network type changed: {} → {}",
                previous.connection_type.as_str(),
                current.connection_type.as_str()
            )
        } else {
            "Quality unchanged - stable network".to_string()
        };

        QualityRecommendation {
            should_change: type_changed || should_switch,
            quality,
            reason,
            type_changed,
        }
    }
}

/// URL of the rendition for `tier`.
///
/// Only the last path segment is rewritten and any query or fragment is
/// kept. URLs that already carry a ladder suffix or have no extension are
/// returned unchanged.
pub fn quality_uri(uri: &str, tier: &QualityTier, ladder: &QualityLadder) -> String {
    let split_at = uri.find(['?', '#']).unwrap_or(uri.len());
    let (path, tail) = uri.split_at(split_at);

    let segment_start = path.rfind('/').map_or(0, |i| i + 1);
    let segment = &path[segment_start..];

    if ladder
        .tiers()
        .iter()
        .any(|t| segment.contains(t.uri_suffix.as_str()))
    {
        return uri.to_string();
    }

    let Some(dot) = segment.rfind('.') else {
        return uri.to_string();
    };
    let dot = segment_start + dot;

    format!("{}{}{}{}", &path[..dot], tier.uri_suffix, &path[dot..], tail)
}

/// Seconds of media to buffer ahead for a tier; 8 when no tier is active.
pub fn recommended_buffer_secs(tier: Option<&QualityTier>) -> u32 {
    match tier.map(|t| t.bitrate_kbps) {
        None => 8,
        Some(kbps) if kbps <= 300 => 4,
        Some(kbps) if kbps <= 600 => 6,
        Some(kbps) if kbps <= 1500 => 8,
        Some(kbps) if kbps <= 3000 => 10,
        Some(_) => 12,
    }
}

/// "720p (1500kbps)", or "Auto" when no tier is pinned.
pub fn format_label(tier: Option<&QualityTier>) -> String {
    tier.map_or_else(|| "Auto".to_string(), QualityTier::display_label)
}
