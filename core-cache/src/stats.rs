//! Cache statistics and monitoring

use serde::{Deserialize, Serialize};

use crate::entry::CacheTier;

/// Occupancy of one tier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TierStats {
    pub tier: CacheTier,
    pub entry_count: usize,
    pub total_bytes: u64,
    pub budget_bytes: u64,
}

impl TierStats {
    /// Usage as a percentage of the budget.
    pub fn usage_percentage(&self) -> f64 {
        if self.budget_bytes == 0 {
            return 0.0;
        }

        (self.total_bytes as f64 / self.budget_bytes as f64) * 100.0
    }

    /// Returns true if the tier is near its budget (>90%).
    pub fn is_near_capacity(&self) -> bool {
        self.usage_percentage() > 90.0
    }

    /// Bytes that eviction would have to free to get back under budget.
    pub fn space_needed(&self) -> u64 {
        self.total_bytes.saturating_sub(self.budget_bytes)
    }

    pub fn average_entry_size(&self) -> u64 {
        if self.entry_count == 0 {
            0
        } else {
            self.total_bytes / self.entry_count as u64
        }
    }
}

/// Snapshot of both tiers plus fetch activity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CacheStats {
    pub ephemeral: TierStats,
    pub durable: TierStats,
    /// Network fetches currently in flight
    pub in_flight: usize,
}

impl CacheStats {
    pub fn total_bytes(&self) -> u64 {
        self.ephemeral.total_bytes + self.durable.total_bytes
    }

    pub fn tier(&self, tier: CacheTier) -> &TierStats {
        match tier {
            CacheTier::Ephemeral => &self.ephemeral,
            CacheTier::Durable => &self.durable,
        }
    }
}

/// Outcome of one budget enforcement pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct EvictionReport {
    pub tier: CacheTier,
    pub removed_entries: usize,
    pub freed_bytes: u64,
    /// Deletes the tier refused; those entries stay counted.
    pub failed_deletes: usize,
    pub remaining_bytes: u64,
}

impl EvictionReport {
    pub fn new(tier: CacheTier, remaining_bytes: u64) -> Self {
        Self {
            tier,
            removed_entries: 0,
            freed_bytes: 0,
            failed_deletes: 0,
            remaining_bytes,
        }
    }

    pub fn is_noop(&self) -> bool {
        self.removed_entries == 0 && self.failed_deletes == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tier(total_bytes: u64, budget_bytes: u64, entry_count: usize) -> TierStats {
        TierStats {
            tier: CacheTier::Durable,
            entry_count,
            total_bytes,
            budget_bytes,
        }
    }

    #[test]
    fn test_usage_percentage() {
        assert_eq!(tier(50, 100, 1).usage_percentage(), 50.0);
        assert_eq!(tier(50, 0, 1).usage_percentage(), 0.0);
        assert!(tier(95, 100, 1).is_near_capacity());
        assert!(!tier(80, 100, 1).is_near_capacity());
    }

    #[test]
    fn test_space_needed() {
        assert_eq!(tier(150, 100, 3).space_needed(), 50);
        assert_eq!(tier(50, 100, 3).space_needed(), 0);
    }

    #[test]
    fn test_average_entry_size() {
        assert_eq!(tier(300, 1000, 3).average_entry_size(), 100);
        assert_eq!(tier(0, 1000, 0).average_entry_size(), 0);
    }

    #[test]
    fn test_totals() {
        let stats = CacheStats {
            ephemeral: TierStats {
                tier: CacheTier::Ephemeral,
                ..tier(10, 100, 1)
            },
            durable: tier(20, 100, 2),
            in_flight: 0,
        };
        assert_eq!(stats.total_bytes(), 30);
        assert_eq!(stats.tier(CacheTier::Durable).entry_count, 2);
    }

    #[test]
    fn test_eviction_report_noop() {
        let report = EvictionReport::new(CacheTier::Ephemeral, 10);
        assert!(report.is_noop());
    }
}
