//! Cost, DALY and ICER calculation.
//!
//! Costs come from accumulated patient-days at each formal level plus AI
//! fixed and per-episode costs. DALYs combine years of life lost to death
//! with disability-weighted time spent sick.

use serde::{Deserialize, Serialize};

use crate::params::{ModelParameters, NUM_LEVELS};
use crate::runner::SimulationResult;
use crate::sanitize::sanitize;
use crate::state::CompartmentalState;

const DAYS_PER_YEAR: f64 = 365.25;

/// Cost and burden derived from a terminal state.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Economics {
    pub total_cost: f64,
    pub dalys: f64,
    /// Years of life lost (discounted).
    pub yll: f64,
    /// Years lived with disability (discounted).
    pub yld: f64,
}

/// `1 − discount_rate` for a positive rate, otherwise 1.
pub fn discount_factor(discount_rate: f64) -> f64 {
    if discount_rate > 0.0 {
        1.0 - discount_rate
    } else {
        1.0
    }
}

/// Σ level patient-days × per-diem + AI fixed cost + AI per-episode cost × episodes.
pub fn total_cost(state: &CompartmentalState, params: &ModelParameters) -> f64 {
    let care: f64 = (0..NUM_LEVELS)
        .map(|k| state.patient_days.levels[k] * params.cost_level(k))
        .sum();
    sanitize(care + params.ai_fixed_cost + params.ai_variable_cost * state.episodes_touched)
}

/// Cost and DALYs for the accumulated state.
pub fn calculate_economics(state: &CompartmentalState, params: &ModelParameters) -> Economics {
    let df = discount_factor(params.discount_rate);
    let years_lost_per_death =
        (params.regional_life_expectancy - params.mean_age_of_infection).max(0.0);
    let yll = sanitize(state.dead * years_lost_per_death * df);
    let sick_days = state.patient_days.outside_formal() + state.patient_days.formal();
    let yld = sanitize(sick_days * (params.disability_weight / DAYS_PER_YEAR) * df);

    Economics {
        total_cost: total_cost(state, params),
        dalys: sanitize(yll + yld),
        yll,
        yld,
    }
}

/// Incremental cost-effectiveness of an intervention against a baseline.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum Icer {
    /// No costlier and no worse, strictly better on at least one.
    Dominant,
    /// No cheaper and strictly more DALYs.
    Dominated,
    /// Cost per DALY averted; `+∞` when DALYs are identical.
    Ratio(f64),
}

impl Icer {
    /// The ratio bounded for downstream arithmetic; `None` for either sentinel.
    pub fn finite_value(&self) -> Option<f64> {
        match self {
            Icer::Dominant | Icer::Dominated => None,
            Icer::Ratio(r) => Some(sanitize(*r)),
        }
    }

    pub fn is_dominant(&self) -> bool {
        matches!(self, Icer::Dominant)
    }

    pub fn is_dominated(&self) -> bool {
        matches!(self, Icer::Dominated)
    }
}

/// ICER from raw cost and DALY totals.
///
/// A cheaper but worse intervention still yields a positive ratio: cost
/// saved per DALY added.
pub fn icer(
    intervention_cost: f64,
    intervention_dalys: f64,
    baseline_cost: f64,
    baseline_dalys: f64,
) -> Icer {
    let (ci, di) = (sanitize(intervention_cost), sanitize(intervention_dalys));
    let (cb, db) = (sanitize(baseline_cost), sanitize(baseline_dalys));

    if ci <= cb && di <= db && (ci < cb || di < db) {
        return Icer::Dominant;
    }
    if ci >= cb && di > db {
        return Icer::Dominated;
    }
    let averted = db - di;
    if averted == 0.0 {
        return Icer::Ratio(f64::INFINITY);
    }
    Icer::Ratio((ci - cb) / averted)
}

/// ICER of `intervention` relative to `baseline`.
pub fn calculate_icer(intervention: &SimulationResult, baseline: &SimulationResult) -> Icer {
    icer(
        intervention.total_cost,
        intervention.dalys,
        baseline.total_cost,
        baseline.dalys,
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::PatientDays;

    fn terminal() -> CompartmentalState {
        CompartmentalState {
            dead: 10.0,
            episodes_touched: 1000.0,
            patient_days: PatientDays {
                untreated: 365.25,
                informal: 365.25,
                levels: [100.0, 50.0, 20.0, 10.0],
            },
            ..Default::default()
        }
    }

    #[test]
    fn test_discount_factor() {
        assert_eq!(discount_factor(0.0), 1.0);
        assert_eq!(discount_factor(-0.1), 1.0);
        assert!((discount_factor(0.03) - 0.97).abs() < 1e-12);
    }

    #[test]
    fn test_total_cost() {
        let p = ModelParameters {
            ai_fixed_cost: 500.0,
            ai_variable_cost: 0.5,
            ..Default::default()
        };
        // 100×5 + 50×20 + 20×60 + 10×150 = 4200
        let cost = total_cost(&terminal(), &p);
        assert!((cost - (4200.0 + 500.0 + 500.0)).abs() < 1e-9);
    }

    #[test]
    fn test_dalys() {
        let p = ModelParameters {
            discount_rate: 0.0,
            disability_weight: 0.2,
            regional_life_expectancy: 65.0,
            mean_age_of_infection: 30.0,
            ..Default::default()
        };
        let e = calculate_economics(&terminal(), &p);
        assert!((e.yll - 350.0).abs() < 1e-9);
        let sick_days = 365.25 * 2.0 + 180.0;
        assert!((e.yld - sick_days * 0.2 / 365.25).abs() < 1e-9);
        assert!((e.dalys - (e.yll + e.yld)).abs() < 1e-9);
    }

    #[test]
    fn test_dalys_discounted() {
        let p = ModelParameters {
            discount_rate: 0.03,
            ..Default::default()
        };
        let undiscounted = calculate_economics(
            &terminal(),
            &ModelParameters {
                discount_rate: 0.0,
                ..Default::default()
            },
        );
        let e = calculate_economics(&terminal(), &p);
        assert!((e.dalys - undiscounted.dalys * 0.97).abs() < 1e-9);
    }

    #[test]
    fn test_no_yll_when_age_exceeds_life_expectancy() {
        let p = ModelParameters {
            mean_age_of_infection: 80.0,
            regional_life_expectancy: 60.0,
            ..Default::default()
        };
        assert_eq!(calculate_economics(&terminal(), &p).yll, 0.0);
    }

    #[test]
    fn test_icer_ratio() {
        assert_eq!(icer(1500.0, 90.0, 1000.0, 100.0), Icer::Ratio(50.0));
    }

    #[test]
    fn test_icer_dominant() {
        assert_eq!(icer(900.0, 90.0, 1000.0, 100.0), Icer::Dominant);
        assert_eq!(icer(1000.0, 90.0, 1000.0, 100.0), Icer::Dominant);
        assert_eq!(icer(900.0, 100.0, 1000.0, 100.0), Icer::Dominant);
    }

    #[test]
    fn test_icer_dominated() {
        assert_eq!(icer(1500.0, 110.0, 1000.0, 100.0), Icer::Dominated);
        assert_eq!(icer(1000.0, 110.0, 1000.0, 100.0), Icer::Dominated);
        let r = icer(1500.0, 110.0, 1000.0, 100.0);
        assert!(r.is_dominated() && !r.is_dominant());
        assert_eq!(r.finite_value(), None);
    }

    #[test]
    fn test_icer_cheaper_but_worse_is_positive() {
        // 500 saved for 10 DALYs added
        assert_eq!(icer(500.0, 110.0, 1000.0, 100.0), Icer::Ratio(50.0));
    }

    #[test]
    fn test_icer_zero_daly_difference() {
        assert_eq!(icer(1200.0, 100.0, 1000.0, 100.0), Icer::Ratio(f64::INFINITY));
        assert_eq!(icer(1000.0, 100.0, 1000.0, 100.0), Icer::Ratio(f64::INFINITY));
        let sanitized = Icer::Ratio(f64::INFINITY).finite_value().unwrap();
        assert!(sanitized.is_finite() && sanitized > 0.0);
    }

    #[test]
    fn test_icer_nan_inputs_sanitized() {
        let r = icer(f64::NAN, 90.0, 0.0, 100.0);
        assert!(r.finite_value().map_or(true, |v| v.is_finite()));
    }

    #[test]
    fn test_icer_never_negative_when_dominant() {
        for (ci, di) in [(0.0, 0.0), (10.0, 5.0), (999.0, 99.9)] {
            let r = icer(ci, di, 1000.0, 100.0);
            assert!(r.is_dominant());
            assert_eq!(r.finite_value(), None);
        }
    }
}
