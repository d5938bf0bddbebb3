use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::chain::Chain;
use crate::error::ChainError;

/// Suggestions older than this are stale and must not be served.
pub const FEE_SUGGESTION_TTL_SECS: i64 = 30;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FeePriority {
    Low,
    Medium,
    High,
    Urgent,
}

impl FeePriority {
    pub const ALL: [FeePriority; 4] = [
        FeePriority::Low,
        FeePriority::Medium,
        FeePriority::High,
        FeePriority::Urgent,
    ];

    fn index(self) -> usize {
        self as usize
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Congestion {
    Low,
    Medium,
    High,
    VeryHigh,
}

impl Congestion {
    pub const ALL: [Congestion; 4] = [
        Congestion::Low,
        Congestion::Medium,
        Congestion::High,
        Congestion::VeryHigh,
    ];

    fn index(self) -> usize {
        self as usize
    }

    /// Buckets a load ratio (observed / capacity, or observed / floor) using
    /// three ascending cut points.
    pub fn from_ratio(ratio: f64, cuts: [f64; 3]) -> Self {
        if !ratio.is_finite() {
            return Congestion::Medium;
        }
        if ratio < cuts[0] {
            Congestion::Low
        } else if ratio < cuts[1] {
            Congestion::Medium
        } else if ratio < cuts[2] {
            Congestion::High
        } else {
            Congestion::VeryHigh
        }
    }
}

/// A priority-tiered fee suggestion.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FeeSuggestion {
    pub chain: Chain,
    pub priority: FeePriority,
    pub congestion: Congestion,
    /// Fee per `unit`, in the chain's base denomination.
    #[serde(with = "u128_string")]
    pub fee_per_unit: u128,
    pub unit: String,
    pub estimated_confirmation_secs: u64,
    pub computed_at: DateTime<Utc>,
}

impl FeeSuggestion {
    pub fn is_stale(&self, now: DateTime<Utc>) -> bool {
        now - self.computed_at >= Duration::seconds(FEE_SUGGESTION_TTL_SECS)
    }
}

/// Adapter-local fee constants.
///
/// Index order of every array is `Low, Medium, High, Urgent` for tiers and
/// `Low, Medium, High, VeryHigh` for congestion. Multipliers are per-mille.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FeeSchedule {
    pub unit: &'static str,
    pub tier_fees: [u128; 4],
    pub congestion_multipliers: [u32; 4],
    pub tier_confirmation_secs: [u64; 4],
    pub congestion_delays: [u32; 4],
}

impl FeeSchedule {
    /// Rejects schedules that would break fee or time ordering.
    pub fn validate(&self) -> Result<(), ChainError> {
        let fees_ascend = self.tier_fees.windows(2).all(|w| w[0] <= w[1]);
        let secs_descend = self.tier_confirmation_secs.windows(2).all(|w| w[0] >= w[1]);
        let mults_ascend = self.congestion_multipliers.windows(2).all(|w| w[0] <= w[1]);
        let delays_ascend = self.congestion_delays.windows(2).all(|w| w[0] <= w[1]);

        if !fees_ascend || self.tier_fees[0] >= self.tier_fees[3] {
            return Err(ChainError::Build(format!(
                "{}: tier fees must ascend from low to urgent",
                self.unit
            )));
        }
        if !secs_descend || self.tier_confirmation_secs[3] >= self.tier_confirmation_secs[0] {
            return Err(ChainError::Build(format!(
                "{}: confirmation times must descend from low to urgent",
                self.unit
            )));
        }
        if !mults_ascend || self.congestion_multipliers[0] < 1000 {
            return Err(ChainError::Build(format!(
                "{}: congestion multipliers must be >= 1000 and non-decreasing",
                self.unit
            )));
        }
        if !delays_ascend || self.congestion_delays[0] < 1000 {
            return Err(ChainError::Build(format!(
                "{}: congestion delays must be >= 1000 and non-decreasing",
                self.unit
            )));
        }
        Ok(())
    }

    /// Fee per unit: `floor + tier_fee * multiplier`.
    ///
    /// `floor` is a live network minimum (EIP-1559 base fee, min relay fee);
    /// adding it uniformly keeps the tier ordering.
    pub fn fee_for(&self, priority: FeePriority, congestion: Congestion, floor: u128) -> u128 {
        let mult = u128::from(self.congestion_multipliers[congestion.index()]);
        let scaled = self.tier_fees[priority.index()].saturating_mul(mult) / 1000;
        floor.saturating_add(scaled)
    }

    pub fn confirmation_secs(&self, priority: FeePriority, congestion: Congestion) -> u64 {
        let delay = u64::from(self.congestion_delays[congestion.index()]);
        self.tier_confirmation_secs[priority.index()]
            .saturating_mul(delay)
            .div_ceil(1000)
    }

    pub fn suggest(
        &self,
        chain: Chain,
        priority: FeePriority,
        congestion: Congestion,
        floor: u128,
    ) -> FeeSuggestion {
        FeeSuggestion {
            chain,
            priority,
            congestion,
            fee_per_unit: self.fee_for(priority, congestion, floor),
            unit: self.unit.to_string(),
            estimated_confirmation_secs: self.confirmation_secs(priority, congestion),
            computed_at: Utc::now(),
        }
    }
}

mod u128_string {
    use super::*;

    pub fn serialize<S: Serializer>(value: &u128, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_str(&value.to_string())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<u128, D::Error> {
        let raw = String::deserialize(d)?;
        raw.parse().map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn schedule() -> FeeSchedule {
        FeeSchedule {
            unit: "test/unit",
            tier_fees: [10, 20, 40, 80],
            congestion_multipliers: [1000, 1250, 1750, 2500],
            tier_confirmation_secs: [600, 300, 120, 30],
            congestion_delays: [1000, 1500, 2000, 3000],
        }
    }

    #[test]
    fn ordering_holds_for_every_congestion_level() {
        let s = schedule();
        s.validate().unwrap();
        for c in Congestion::ALL {
            let fees: Vec<u128> = FeePriority::ALL.iter().map(|p| s.fee_for(*p, c, 5)).collect();
            assert!(fees.windows(2).all(|w| w[0] <= w[1]), "{c:?}: {fees:?}");
            assert!(
                s.confirmation_secs(FeePriority::Urgent, c) <= s.confirmation_secs(FeePriority::Low, c)
            );
        }
    }

    #[test]
    fn very_high_congestion_keeps_strict_ordering() {
        let s = schedule();
        let low = s.suggest(Chain::Ethereum, FeePriority::Low, Congestion::VeryHigh, 0);
        let urgent = s.suggest(Chain::Ethereum, FeePriority::Urgent, Congestion::VeryHigh, 0);
        assert!(urgent.fee_per_unit > low.fee_per_unit);
        assert!(urgent.estimated_confirmation_secs < low.estimated_confirmation_secs);
        assert_eq!(low.fee_per_unit, 25);
        assert_eq!(low.estimated_confirmation_secs, 1800);
    }

    #[test]
    fn congestion_never_lowers_fee() {
        let s = schedule();
        for p in FeePriority::ALL {
            let fees: Vec<u128> = Congestion::ALL.iter().map(|c| s.fee_for(p, *c, 0)).collect();
            assert!(fees.windows(2).all(|w| w[0] <= w[1]));
        }
    }

    #[test]
    fn validate_rejects_inverted_tiers() {
        let mut s = schedule();
        s.tier_fees = [80, 40, 20, 10];
        assert!(s.validate().is_err());

        let mut s = schedule();
        s.tier_confirmation_secs = [30, 120, 300, 600];
        assert!(s.validate().is_err());

        let mut s = schedule();
        s.congestion_multipliers = [900, 1000, 1100, 1200];
        assert!(s.validate().is_err());
    }

    #[test]
    fn from_ratio_buckets() {
        let cuts = [0.5, 0.8, 0.95];
        assert_eq!(Congestion::from_ratio(0.1, cuts), Congestion::Low);
        assert_eq!(Congestion::from_ratio(0.5, cuts), Congestion::Medium);
        assert_eq!(Congestion::from_ratio(0.9, cuts), Congestion::High);
        assert_eq!(Congestion::from_ratio(1.3, cuts), Congestion::VeryHigh);
        assert_eq!(Congestion::from_ratio(f64::NAN, cuts), Congestion::Medium);
    }

    #[test]
    fn staleness_after_ttl() {
        let s = schedule();
        let mut suggestion = s.suggest(Chain::Bitcoin, FeePriority::High, Congestion::Low, 0);
        let now = suggestion.computed_at;
        assert!(!suggestion.is_stale(now + Duration::seconds(29)));
        assert!(suggestion.is_stale(now + Duration::seconds(30)));
        suggestion.computed_at = now - Duration::seconds(120);
        assert!(suggestion.is_stale(now));
    }

    #[test]
    fn fee_serializes_as_string() {
        let s = schedule();
        let suggestion = s.suggest(Chain::Solana, FeePriority::Medium, Congestion::Medium, 0);
        let json = serde_json::to_value(&suggestion).unwrap();
        assert_eq!(json["fee_per_unit"], "25");
        assert_eq!(json["priority"], "medium");
        let back: FeeSuggestion = serde_json::from_value(json).unwrap();
        assert_eq!(back, suggestion);
    }
}
