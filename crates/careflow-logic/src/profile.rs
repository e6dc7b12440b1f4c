//! Layered assembly of [`ModelParameters`].
//!
//! Scenarios are built from three layers, each applied over the last:
//!
//! 1. a **disease profile**: baseline incidence, resolution, mortality
//!    and referral rates plus burden inputs;
//! 2. a **health-system preset**: care-seeking shares, per-diem costs,
//!    capacity, and multipliers applied to the disease's formal-care
//!    rates;
//! 3. an optional **country adjustment**: sparse overrides where every
//!    field is optional and only present fields apply.
//!
//! The profile and preset *values* are calibration data owned by the
//! caller; this module only defines how the layers combine.

use serde::{Deserialize, Serialize};

use crate::params::{clamp_probabilities, ModelParameters, NUM_LEVELS};

/// Weekly rates for the six sick compartments.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CompartmentRates {
    pub untreated: f64,
    pub informal: f64,
    pub levels: [f64; NUM_LEVELS],
}

/// Disease-specific baselines.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DiseaseProfile {
    pub id: String,
    pub lambda: f64,
    pub mu: CompartmentRates,
    pub delta: CompartmentRates,
    /// Referral out of L0, L1, L2.
    pub rho: [f64; 3],
    pub disability_weight: f64,
    pub mean_age_of_infection: f64,
    pub competition_sensitivity: f64,
}

/// Health-system characteristics, applied over a disease profile.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HealthSystemPreset {
    pub name: String,
    pub phi0: f64,
    pub sigma_i: f64,
    pub informal_care_ratio: f64,
    /// Per-diem cost, L0..L3.
    pub costs: [f64; NUM_LEVELS],
    pub capacity_share: f64,
    pub regional_life_expectancy: f64,
    /// Multiplies formal-level resolution rates.
    pub resolution_multiplier: f64,
    /// Multiplies formal-level mortality rates.
    pub mortality_multiplier: f64,
    /// Multiplies referral rates.
    pub referral_multiplier: f64,
}

/// Sparse per-country overrides. `None` leaves the preset value in place.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CountryAdjustment {
    pub regional_life_expectancy: Option<f64>,
    pub cost_multiplier: Option<f64>,
    pub capacity_multiplier: Option<f64>,
    pub phi0: Option<f64>,
    pub informal_care_ratio: Option<f64>,
    pub discount_rate: Option<f64>,
}

/// Merge disease, preset and country layers into one parameter set.
///
/// Fields none of the layers speak to (queue tunables, AI fields) keep
/// their [`ModelParameters::default`] values. Any probability pushed out
/// of [0, 1] by a multiplier is clamped.
pub fn build_parameters(
    disease: &DiseaseProfile,
    preset: &HealthSystemPreset,
    country: Option<&CountryAdjustment>,
) -> ModelParameters {
    let mut p = ModelParameters {
        lambda: disease.lambda,
        mu_untreated: disease.mu.untreated,
        mu_informal: disease.mu.informal,
        delta_untreated: disease.delta.untreated,
        delta_informal: disease.delta.informal,
        disability_weight: disease.disability_weight,
        mean_age_of_infection: disease.mean_age_of_infection,
        competition_sensitivity: disease.competition_sensitivity,

        phi0: preset.phi0,
        sigma_i: preset.sigma_i,
        informal_care_ratio: preset.informal_care_ratio,
        cost_l0: preset.costs[0],
        cost_l1: preset.costs[1],
        cost_l2: preset.costs[2],
        cost_l3: preset.costs[3],
        capacity_share: preset.capacity_share,
        regional_life_expectancy: preset.regional_life_expectancy,
        ..Default::default()
    };

    let mu = disease.mu.levels.map(|m| m * preset.resolution_multiplier);
    let delta = disease.delta.levels.map(|d| d * preset.mortality_multiplier);
    let rho = disease.rho.map(|r| r * preset.referral_multiplier);
    [p.mu_l0, p.mu_l1, p.mu_l2, p.mu_l3] = mu;
    [p.delta_l0, p.delta_l1, p.delta_l2, p.delta_l3] = delta;
    [p.rho_l0, p.rho_l1, p.rho_l2] = rho;

    if let Some(c) = country {
        if let Some(le) = c.regional_life_expectancy {
            p.regional_life_expectancy = le;
        }
        if let Some(m) = c.cost_multiplier {
            p.cost_l0 *= m;
            p.cost_l1 *= m;
            p.cost_l2 *= m;
            p.cost_l3 *= m;
        }
        if let Some(m) = c.capacity_multiplier {
            p.capacity_share *= m;
        }
        if let Some(phi0) = c.phi0 {
            p.phi0 = phi0;
        }
        if let Some(ratio) = c.informal_care_ratio {
            p.informal_care_ratio = ratio;
        }
        if let Some(rate) = c.discount_rate {
            p.discount_rate = rate;
        }
    }

    let (p, events) = clamp_probabilities(p);
    if !events.is_empty() {
        log::warn!(
            "{} parameter(s) clamped building {} / {}",
            events.len(),
            disease.id,
            preset.name
        );
    }
    p
}

#[cfg(test)]
mod tests {
    use super::*;

    fn disease() -> DiseaseProfile {
        DiseaseProfile {
            id: "synthetic".to_string(),
            lambda: 0.3,
            mu: CompartmentRates {
                untreated: 0.05,
                informal: 0.1,
                levels: [0.3, 0.4, 0.5, 0.6],
            },
            delta: CompartmentRates {
                untreated: 0.01,
                informal: 0.008,
                levels: [0.004, 0.006, 0.01, 0.02],
            },
            rho: [0.1, 0.08, 0.05],
            disability_weight: 0.3,
            mean_age_of_infection: 25.0,
            competition_sensitivity: 0.8,
        }
    }

    fn preset() -> HealthSystemPreset {
        HealthSystemPreset {
            name: "low-resource".to_string(),
            phi0: 0.35,
            sigma_i: 0.1,
            informal_care_ratio: 0.4,
            costs: [2.0, 8.0, 30.0, 90.0],
            capacity_share: 0.003,
            regional_life_expectancy: 62.0,
            resolution_multiplier: 0.8,
            mortality_multiplier: 1.5,
            referral_multiplier: 1.0,
        }
    }

    #[test]
    fn test_layers_combine() {
        let p = build_parameters(&disease(), &preset(), None);
        assert_eq!(p.lambda, 0.3);
        assert_eq!(p.phi0, 0.35);
        assert!((p.mu_l1 - 0.4 * 0.8).abs() < 1e-12);
        assert!((p.delta_l3 - 0.02 * 1.5).abs() < 1e-12);
        assert_eq!(p.rho_l2, 0.05);
        assert_eq!(p.cost_l2, 30.0);
        assert_eq!(p.competition_sensitivity, 0.8);
        // untreated and informal rates are not system-dependent
        assert_eq!(p.mu_untreated, 0.05);
        assert_eq!(p.delta_informal, 0.008);
        // nobody set these
        assert_eq!(p.queue_clearance_rate, ModelParameters::default().queue_clearance_rate);
        assert!(!p.ai_active);
    }

    #[test]
    fn test_country_overrides_only_present_fields() {
        let country = CountryAdjustment {
            regional_life_expectancy: Some(70.0),
            cost_multiplier: Some(2.0),
            ..Default::default()
        };
        let base = build_parameters(&disease(), &preset(), None);
        let p = build_parameters(&disease(), &preset(), Some(&country));
        assert_eq!(p.regional_life_expectancy, 70.0);
        assert_eq!(p.cost_l3, 180.0);
        assert_eq!(p.phi0, base.phi0);
        assert_eq!(p.capacity_share, base.capacity_share);
    }

    #[test]
    fn test_multipliers_clamped() {
        let mut hot = preset();
        hot.resolution_multiplier = 3.0;
        let p = build_parameters(&disease(), &hot, None);
        assert_eq!(p.mu_l3, 1.0);
        assert_eq!(p.mu_l2, 1.0);
        assert!((p.mu_l0 - 0.9).abs() < 1e-12);
    }

    #[test]
    fn test_country_json_is_sparse() {
        let c: CountryAdjustment = serde_json::from_str(r#"{"phi0": 0.5}"#).unwrap();
        assert_eq!(c.phi0, Some(0.5));
        assert_eq!(c.cost_multiplier, None);
    }
}
