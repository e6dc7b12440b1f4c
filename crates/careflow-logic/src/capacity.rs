//! Capacity, congestion feedback and admission gating.
//!
//! Congestion is formal-care load (occupancy plus queued patients) over
//! total formal capacity, bounded to [0, 1]. Above half-full it starts to
//! feed back into the week's rates:
//!
//! | Effect | At congestion 0.5 | At congestion 1.0 |
//! |--------|-------------------|-------------------|
//! | Arrivals into formal care | ×1.00 | ×0.75 |
//! | Resolution at every level | ×1.00 | ×1.20 |
//! | Referral to the next level | ×1.00 | ×0.70 |

use serde::{Deserialize, Serialize};

use crate::params::{ModelParameters, NUM_LEVELS};
use crate::sanitize::{safe_div, unit};
use crate::state::CompartmentalState;

/// Share of total formal capacity held by each level (community → tertiary).
pub const LEVEL_CAPACITY_SPLIT: [f64; NUM_LEVELS] = [0.40, 0.30, 0.20, 0.10];

/// Congestion below this has no feedback effect.
pub const CONGESTION_THRESHOLD: f64 = 0.5;

const MAX_ARRIVAL_SUPPRESSION: f64 = 0.25;
const MAX_RESOLUTION_BOOST: f64 = 0.20;
const MAX_REFERRAL_REDUCTION: f64 = 0.30;

/// Admission never falls below this share of desired inflow.
pub const MIN_ADMISSION_SHARE: f64 = 0.2;

/// Total formal capacity in persons.
pub fn total_capacity(params: &ModelParameters, population: f64) -> f64 {
    params.capacity_share.max(0.0) * population.max(0.0)
}

/// Capacity of formal level `k`.
pub fn level_capacity(params: &ModelParameters, population: f64, k: usize) -> f64 {
    total_capacity(params, population) * LEVEL_CAPACITY_SPLIT[k.min(NUM_LEVELS - 1)]
}

/// System congestion in [0, 1] for the state at the start of a week.
///
/// With no capacity at all the system is fully congested as soon as
/// anyone is in it.
pub fn system_congestion(
    state: &CompartmentalState,
    params: &ModelParameters,
    population: f64,
) -> f64 {
    let load = state.formal_occupancy() + state.total_queued();
    let capacity = total_capacity(params, population);
    if capacity <= 0.0 {
        return if load > 0.0 { 1.0 } else { 0.0 };
    }
    unit(safe_div(load, capacity, 1.0))
}

/// Rate modifiers produced by congestion for one week.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CongestionFeedback {
    /// Multiplier on arrivals into formal care.
    pub arrival_factor: f64,
    /// Multiplier on resolution at every formal level.
    pub resolution_boost: f64,
    /// Multiplier on referral to the next level.
    pub referral_factor: f64,
}

impl CongestionFeedback {
    pub fn from_congestion(congestion: f64) -> Self {
        let excess = unit((unit(congestion) - CONGESTION_THRESHOLD) / (1.0 - CONGESTION_THRESHOLD));
        Self {
            arrival_factor: 1.0 - MAX_ARRIVAL_SUPPRESSION * excess,
            resolution_boost: 1.0 + MAX_RESOLUTION_BOOST * excess,
            referral_factor: 1.0 - MAX_REFERRAL_REDUCTION * excess,
        }
    }

    /// No feedback.
    pub fn neutral() -> Self {
        Self::from_congestion(0.0)
    }
}

/// Share of desired inflow a level can admit this week.
///
/// Degrades with congestion in proportion to the disease's competition
/// sensitivity, floored at [`MIN_ADMISSION_SHARE`].
pub fn capacity_multiplier(congestion: f64, competition_sensitivity: f64) -> f64 {
    let sensitivity = competition_sensitivity.max(0.0);
    (1.0 - 0.5 * unit(congestion) * sensitivity).clamp(MIN_ADMISSION_SHARE, 1.0)
}

/// How much AI tooling stretches a level's spare capacity for clearing queues.
pub fn clearance_expansion(params: &ModelParameters) -> f64 {
    1.0 + params.resource_utilization.max(0.0)
        + params.treatment_efficiency.max(0.0)
        + params.discharge_efficiency.max(0.0)
}

/// Queue clearance rate after capacity gating.
///
/// Clearance can take at most the level's headroom (expanded by AI
/// tooling) and at most `base_rate` of the queue.
pub fn gated_clearance_rate(
    queue_length: f64,
    base_rate: f64,
    headroom: f64,
    expansion: f64,
) -> f64 {
    let base = unit(base_rate);
    if queue_length <= 0.0 {
        return base;
    }
    let available = headroom.max(0.0) * expansion.max(0.0);
    base.min(safe_div(available, queue_length, base))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_split_sums_to_one() {
        let total: f64 = LEVEL_CAPACITY_SPLIT.iter().sum();
        assert!((total - 1.0).abs() < 1e-12);
    }

    #[test]
    fn test_feedback_inactive_below_threshold() {
        for c in [0.0, 0.25, 0.5] {
            let fb = CongestionFeedback::from_congestion(c);
            assert_eq!(fb, CongestionFeedback::neutral());
            assert_eq!(fb.arrival_factor, 1.0);
            assert_eq!(fb.resolution_boost, 1.0);
            assert_eq!(fb.referral_factor, 1.0);
        }
    }

    #[test]
    fn test_feedback_full_congestion() {
        let fb = CongestionFeedback::from_congestion(1.0);
        assert!((fb.arrival_factor - 0.75).abs() < 1e-12);
        assert!((fb.resolution_boost - 1.20).abs() < 1e-12);
        assert!((fb.referral_factor - 0.70).abs() < 1e-12);
    }

    #[test]
    fn test_feedback_linear_midway() {
        let fb = CongestionFeedback::from_congestion(0.75);
        assert!((fb.arrival_factor - 0.875).abs() < 1e-12);
        assert!((fb.resolution_boost - 1.10).abs() < 1e-12);
        assert!((fb.referral_factor - 0.85).abs() < 1e-12);
    }

    #[test]
    fn test_capacity_multiplier_floor() {
        assert_eq!(capacity_multiplier(0.0, 1.0), 1.0);
        assert!((capacity_multiplier(1.0, 1.0) - 0.5).abs() < 1e-12);
        assert_eq!(capacity_multiplier(1.0, 5.0), MIN_ADMISSION_SHARE);
        assert_eq!(capacity_multiplier(1.0, -3.0), 1.0);
    }

    #[test]
    fn test_congestion_bounded() {
        let p = ModelParameters {
            capacity_share: 0.001,
            ..Default::default()
        };
        let s = CompartmentalState {
            levels: [500.0, 500.0, 500.0, 500.0],
            ..Default::default()
        };
        assert_eq!(system_congestion(&s, &p, 1000.0), 1.0);
        assert!((system_congestion(&s, &p, 4_000_000.0) - 0.5).abs() < 1e-12);
    }

    #[test]
    fn test_congestion_counts_queues() {
        let p = ModelParameters {
            capacity_share: 0.01,
            ..Default::default()
        };
        let s = CompartmentalState {
            queues: [25.0, 0.0, 0.0, 0.0],
            ..Default::default()
        };
        assert!((system_congestion(&s, &p, 10_000.0) - 0.25).abs() < 1e-12);
    }

    #[test]
    fn test_zero_capacity() {
        let p = ModelParameters {
            capacity_share: 0.0,
            ..Default::default()
        };
        let empty = CompartmentalState::default();
        assert_eq!(system_congestion(&empty, &p, 1000.0), 0.0);
        let busy = CompartmentalState {
            levels: [1.0, 0.0, 0.0, 0.0],
            ..Default::default()
        };
        assert_eq!(system_congestion(&busy, &p, 1000.0), 1.0);
    }

    #[test]
    fn test_gated_clearance() {
        // plenty of headroom: base rate applies
        assert_eq!(gated_clearance_rate(100.0, 0.5, 1000.0, 1.0), 0.5);
        // 20 free slots for 100 queued
        assert!((gated_clearance_rate(100.0, 0.5, 20.0, 1.0) - 0.2).abs() < 1e-12);
        // AI expansion doubles it
        assert!((gated_clearance_rate(100.0, 0.5, 20.0, 2.0) - 0.4).abs() < 1e-12);
        // no headroom, no clearance
        assert_eq!(gated_clearance_rate(100.0, 0.5, -5.0, 1.0), 0.0);
        assert_eq!(gated_clearance_rate(0.0, 0.5, 0.0, 1.0), 0.5);
    }

    #[test]
    fn test_clearance_expansion() {
        let p = ModelParameters {
            resource_utilization: 0.1,
            treatment_efficiency: 0.2,
            discharge_efficiency: 0.05,
            ..Default::default()
        };
        assert!((clearance_expansion(&p) - 1.35).abs() < 1e-12);
        assert_eq!(clearance_expansion(&ModelParameters::default()), 1.0);
    }
}
