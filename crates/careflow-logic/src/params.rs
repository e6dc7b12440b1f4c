//! Per-scenario rate constants and the probability bounds stage.
//!
//! `ModelParameters` is assembled once per scenario by the caller (see
//! [`crate::profile`]), optionally transformed by
//! [`crate::interventions::apply_ai_interventions`], and then handed to the
//! runner by reference. Nothing in the kernel mutates a caller's instance.
//!
//! All rates are weekly probabilities unless noted. Outflow probabilities
//! for one compartment need not sum to 1; the remainder stays put.

use serde::{Deserialize, Serialize};

use crate::sanitize::unit;

/// Number of formal care levels (community, primary, district, tertiary).
pub const NUM_LEVELS: usize = 4;

/// Rate constants for one scenario.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ModelParameters {
    // ── Care seeking ──
    /// Probability a new case enters formal care directly.
    pub phi0: f64,
    /// Weekly probability an informal-care case moves to formal care.
    pub sigma_i: f64,
    /// Share of non-formal entrants who use informal care (rest untreated).
    pub informal_care_ratio: f64,
    /// Annual per-capita incidence.
    pub lambda: f64,

    // ── Resolution ──
    pub mu_untreated: f64,
    pub mu_informal: f64,
    pub mu_l0: f64,
    pub mu_l1: f64,
    pub mu_l2: f64,
    pub mu_l3: f64,

    // ── Mortality ──
    pub delta_untreated: f64,
    pub delta_informal: f64,
    pub delta_l0: f64,
    pub delta_l1: f64,
    pub delta_l2: f64,
    pub delta_l3: f64,

    // ── Referral to the next level up ──
    pub rho_l0: f64,
    pub rho_l1: f64,
    pub rho_l2: f64,

    // ── Per-diem costs (currency units per patient-day) ──
    pub cost_l0: f64,
    pub cost_l1: f64,
    pub cost_l2: f64,
    pub cost_l3: f64,

    // ── Burden ──
    pub disability_weight: f64,
    pub mean_age_of_infection: f64,
    pub regional_life_expectancy: f64,
    pub discount_rate: f64,

    // ── Capacity and queues ──
    /// Total formal care capacity as a share of population.
    pub capacity_share: f64,
    /// How strongly congestion crowds out admission (disease-sensitive).
    pub competition_sensitivity: f64,
    pub queue_abandonment_rate: f64,
    pub queue_bypass_rate: f64,
    pub queue_clearance_rate: f64,
    pub queue_self_resolve_rate: f64,

    // ── AI-derived ──
    pub ai_fixed_cost: f64,
    /// Cost per episode touched, already scaled by uptake.
    pub ai_variable_cost: f64,
    /// Set when any intervention is active; drives episode counting.
    pub ai_active: bool,
    /// Share of incidence resolved at home without entering care.
    pub visit_reduction: f64,
    /// Share of non-formal entrants redirected to formal care at onset.
    pub direct_routing_improvement: f64,
    /// Share of likely-referred primary patients routed straight to L1.
    pub smart_routing: f64,
    /// Share of would-be queue additions diverted before queuing.
    pub queue_prevention: f64,
    pub length_of_stay_reduction: f64,
    pub discharge_efficiency: f64,
    pub treatment_efficiency: f64,
    pub resource_utilization: f64,
}

impl Default for ModelParameters {
    fn default() -> Self {
        Self {
            phi0: 0.45,
            sigma_i: 0.15,
            informal_care_ratio: 0.20,
            lambda: 0.20,

            mu_untreated: 0.05,
            mu_informal: 0.10,
            mu_l0: 0.35,
            mu_l1: 0.45,
            mu_l2: 0.50,
            mu_l3: 0.55,

            delta_untreated: 0.004,
            delta_informal: 0.003,
            delta_l0: 0.002,
            delta_l1: 0.003,
            delta_l2: 0.005,
            delta_l3: 0.010,

            rho_l0: 0.10,
            rho_l1: 0.08,
            rho_l2: 0.05,

            cost_l0: 5.0,
            cost_l1: 20.0,
            cost_l2: 60.0,
            cost_l3: 150.0,

            disability_weight: 0.2,
            mean_age_of_infection: 30.0,
            regional_life_expectancy: 65.0,
            discount_rate: 0.03,

            capacity_share: 0.005,
            competition_sensitivity: 0.5,
            queue_abandonment_rate: 0.10,
            queue_bypass_rate: 0.05,
            queue_clearance_rate: 0.50,
            queue_self_resolve_rate: 0.03,

            ai_fixed_cost: 0.0,
            ai_variable_cost: 0.0,
            ai_active: false,
            visit_reduction: 0.0,
            direct_routing_improvement: 0.0,
            smart_routing: 0.0,
            queue_prevention: 0.0,
            length_of_stay_reduction: 0.0,
            discharge_efficiency: 0.0,
            treatment_efficiency: 0.0,
            resource_utilization: 0.0,
        }
    }
}

/// Baseline parameter set used when the caller supplies nothing else.
pub fn default_parameters() -> ModelParameters {
    ModelParameters::default()
}

/// Mortality rate names: untreated, informal, then L0..L3.
pub const MORTALITY_FIELDS: [&str; 6] = [
    "delta_untreated",
    "delta_informal",
    "delta_l0",
    "delta_l1",
    "delta_l2",
    "delta_l3",
];

/// Names of every probability-typed field, in [`ModelParameters::probability_slots`] order.
pub const PROBABILITY_FIELDS: [&str; 32] = [
    "phi0",
    "sigma_i",
    "informal_care_ratio",
    "mu_untreated",
    "mu_informal",
    "mu_l0",
    "mu_l1",
    "mu_l2",
    "mu_l3",
    "delta_untreated",
    "delta_informal",
    "delta_l0",
    "delta_l1",
    "delta_l2",
    "delta_l3",
    "rho_l0",
    "rho_l1",
    "rho_l2",
    "disability_weight",
    "discount_rate",
    "queue_abandonment_rate",
    "queue_bypass_rate",
    "queue_clearance_rate",
    "queue_self_resolve_rate",
    "visit_reduction",
    "direct_routing_improvement",
    "smart_routing",
    "queue_prevention",
    "length_of_stay_reduction",
    "discharge_efficiency",
    "treatment_efficiency",
    "resource_utilization",
];

impl ModelParameters {
    fn probability_slots(&mut self) -> [&mut f64; 32] {
        [
            &mut self.phi0,
            &mut self.sigma_i,
            &mut self.informal_care_ratio,
            &mut self.mu_untreated,
            &mut self.mu_informal,
            &mut self.mu_l0,
            &mut self.mu_l1,
            &mut self.mu_l2,
            &mut self.mu_l3,
            &mut self.delta_untreated,
            &mut self.delta_informal,
            &mut self.delta_l0,
            &mut self.delta_l1,
            &mut self.delta_l2,
            &mut self.delta_l3,
            &mut self.rho_l0,
            &mut self.rho_l1,
            &mut self.rho_l2,
            &mut self.disability_weight,
            &mut self.discount_rate,
            &mut self.queue_abandonment_rate,
            &mut self.queue_bypass_rate,
            &mut self.queue_clearance_rate,
            &mut self.queue_self_resolve_rate,
            &mut self.visit_reduction,
            &mut self.direct_routing_improvement,
            &mut self.smart_routing,
            &mut self.queue_prevention,
            &mut self.length_of_stay_reduction,
            &mut self.discharge_efficiency,
            &mut self.treatment_efficiency,
            &mut self.resource_utilization,
        ]
    }

    /// Snapshot of every probability-typed field as `(name, value)`.
    pub fn probabilities(&self) -> Vec<(&'static str, f64)> {
        let mut copy = self.clone();
        PROBABILITY_FIELDS
            .iter()
            .copied()
            .zip(copy.probability_slots().into_iter().map(|v| *v))
            .collect()
    }

    /// Mutable handles to every mortality rate, in [`MORTALITY_FIELDS`] order.
    pub fn mortality_slots(&mut self) -> [&mut f64; 6] {
        [
            &mut self.delta_untreated,
            &mut self.delta_informal,
            &mut self.delta_l0,
            &mut self.delta_l1,
            &mut self.delta_l2,
            &mut self.delta_l3,
        ]
    }

    /// Copy with the `index`-th mortality rate of [`MORTALITY_FIELDS`]
    /// raised by `by`.
    pub fn with_mortality_raised(&self, index: usize, by: f64) -> Self {
        let mut out = self.clone();
        if let Some(slot) = out.mortality_slots().into_iter().nth(index) {
            *slot += by;
        }
        out
    }

    /// Resolution rate at formal level `k` (0..4).
    pub fn mu_level(&self, k: usize) -> f64 {
        match k {
            0 => self.mu_l0,
            1 => self.mu_l1,
            2 => self.mu_l2,
            _ => self.mu_l3,
        }
    }

    /// Mortality rate at formal level `k` (0..4).
    pub fn delta_level(&self, k: usize) -> f64 {
        match k {
            0 => self.delta_l0,
            1 => self.delta_l1,
            2 => self.delta_l2,
            _ => self.delta_l3,
        }
    }

    /// Referral rate out of level `k`. Tertiary care refers nowhere.
    pub fn rho_level(&self, k: usize) -> f64 {
        match k {
            0 => self.rho_l0,
            1 => self.rho_l1,
            2 => self.rho_l2,
            _ => 0.0,
        }
    }

    /// Per-diem cost at level `k`.
    pub fn cost_level(&self, k: usize) -> f64 {
        match k {
            0 => self.cost_l0,
            1 => self.cost_l1,
            2 => self.cost_l2,
            _ => self.cost_l3,
        }
    }
}

/// A probability field that had to be pulled back into [0, 1].
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ClampEvent {
    pub field: &'static str,
    pub original: f64,
    pub clamped: f64,
}

/// Clamp every probability-typed field into [0, 1].
///
/// Returns the bounded parameters and one event per field that moved.
/// Clamping is a recoverable condition: each event is logged at `warn`
/// and the run proceeds.
pub fn clamp_probabilities(params: ModelParameters) -> (ModelParameters, Vec<ClampEvent>) {
    let mut out = params;
    let mut events = Vec::new();
    for (&name, slot) in PROBABILITY_FIELDS.iter().zip(out.probability_slots()) {
        let original = *slot;
        let clamped = unit(original);
        // NaN never compares equal, so it always records an event
        if clamped != original {
            log::warn!("clamped {} from {} to {}", name, original, clamped);
            events.push(ClampEvent {
                field: name,
                original,
                clamped,
            });
            *slot = clamped;
        }
    }
    (out, events)
}
