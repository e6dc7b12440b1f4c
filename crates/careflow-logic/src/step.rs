//! The weekly state transition.
//!
//! `step` is a pure function of `(state, params, population)`: it reads
//! the pre-week snapshot, computes every flow from it, and returns a new
//! snapshot. Flow order within a week:
//!
//! 1. Incidence arrives; the self-care visit-reduction share resolves at home.
//! 2. Congestion from the pre-week load sets arrival, resolution and
//!    referral modifiers.
//! 3. Entrants split into formal seeking (F), informal care (I) and
//!    untreated (U).
//! 4. Every stock loses deaths, resolutions and onward transitions.
//! 5. Last week's F, less the share congestion holds back, and this
//!    week's referrals become desired inflow per level; a capacity
//!    multiplier decides how much is admitted.
//! 6. Unmet inflow queues, less the share AI diverts before queuing.
//! 7. Existing queues lose their five competing outflows.
//! 8. Accumulators (R, D, patient-days, episodes, queue deaths) update.

use serde::{Deserialize, Serialize};

use crate::capacity::{
    capacity_multiplier, clearance_expansion, gated_clearance_rate, level_capacity,
    system_congestion, CongestionFeedback,
};
use crate::params::{ModelParameters, NUM_LEVELS};
use crate::queue::{advance_queue, competing_outflows, QueueOutflows, QueueRates};
use crate::sanitize::{safe_div, sanitize, unit};
use crate::state::CompartmentalState;

/// Days per model week.
pub const DAYS_PER_WEEK: f64 = 7.0;

/// Weeks per year, for converting annual incidence.
pub const WEEKS_PER_YEAR: f64 = 52.0;

/// Flows realised during one week, for diagnostics and conservation checks.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct WeeklyFlows {
    pub congestion: f64,
    pub incidence: f64,
    pub home_resolved: f64,
    /// Formal seekers held in F for another week by arrival suppression.
    pub held_back: f64,
    /// Desired inflow per level before capacity gating.
    pub desired: [f64; NUM_LEVELS],
    pub admitted: [f64; NUM_LEVELS],
    /// Unmet inflow diverted to informal care instead of queuing.
    pub diverted: [f64; NUM_LEVELS],
    /// Additions to each queue this week.
    pub queue_inflow: [f64; NUM_LEVELS],
    pub queue_outflow: [QueueOutflows; NUM_LEVELS],
}

/// Advance one week.
pub fn step(
    state: &CompartmentalState,
    params: &ModelParameters,
    population: f64,
) -> CompartmentalState {
    step_with_flows(state, params, population).0
}

/// Advance one week and report the flows that produced the new state.
pub fn step_with_flows(
    state: &CompartmentalState,
    params: &ModelParameters,
    population: f64,
) -> (CompartmentalState, WeeklyFlows) {
    let population = population.max(0.0);
    let congestion = system_congestion(state, params, population);
    let feedback = CongestionFeedback::from_congestion(congestion);
    let admit_share = capacity_multiplier(congestion, params.competition_sensitivity);

    // ── Incidence and entry split ──
    let incidence = sanitize(params.lambda * population / WEEKS_PER_YEAR).max(0.0);
    let home_resolved = incidence * unit(params.visit_reduction);
    let entering = incidence - home_resolved;

    let phi0 = unit(params.phi0);
    let direct_share = unit(phi0 + (1.0 - phi0) * unit(params.direct_routing_improvement));
    let new_seeking = entering * direct_share;
    let outside = entering - new_seeking;
    let new_informal = outside * unit(params.informal_care_ratio);
    let new_untreated = outside - new_informal;

    // ── Outflows from U and I ──
    let [u_deaths, u_resolved] = competing_outflows(
        state.untreated,
        [params.delta_untreated, params.mu_untreated],
    );
    let [i_deaths, i_resolved, i_to_formal] = competing_outflows(
        state.informal,
        [params.delta_informal, params.mu_informal, params.sigma_i],
    );

    // ── Outflows from formal levels ──
    let mut level_deaths = [0.0; NUM_LEVELS];
    let mut level_resolved = [0.0; NUM_LEVELS];
    let mut referred_up = [0.0; NUM_LEVELS];
    let mut effective_rates = [(0.0, 0.0, 0.0); NUM_LEVELS];
    for k in 0..NUM_LEVELS {
        let delta = unit(params.delta_level(k));
        let mu = unit(params.mu_level(k) * feedback.resolution_boost);
        let rho = unit(params.rho_level(k) * feedback.referral_factor);
        effective_rates[k] = (delta, mu, rho);
        let [d, r, up] = competing_outflows(state.levels[k], [delta, mu, rho]);
        level_deaths[k] = d;
        level_resolved[k] = r;
        referred_up[k] = up;
    }

    // ── Desired inflow: dispatch F, then referrals ──
    // Suppressed arrivals wait in F rather than leaving formal seeking.
    let seeking = state.seeking_formal.max(0.0);
    let dispatched = seeking * feedback.arrival_factor;
    let held_back = seeking - dispatched;
    let (delta0, mu0, rho0) = effective_rates[0];
    let l0_referral_share = safe_div(rho0, delta0 + mu0 + rho0, 0.0);
    let routed_past_l0 = dispatched * unit(params.smart_routing) * l0_referral_share;
    let desired = [
        dispatched - routed_past_l0,
        routed_past_l0 + referred_up[0],
        referred_up[1],
        referred_up[2],
    ];

    // ── Admission, diversion and queues ──
    let prevention = unit(params.queue_prevention);
    let expansion = clearance_expansion(params);
    let queue_rates_base = QueueRates {
        mortality: params.delta_untreated,
        abandonment: params.queue_abandonment_rate,
        bypass: params.queue_bypass_rate,
        self_resolution: params.queue_self_resolve_rate,
        clearance: params.queue_clearance_rate,
    };

    let mut admitted = [0.0; NUM_LEVELS];
    let mut diverted = [0.0; NUM_LEVELS];
    let mut queue_inflow = [0.0; NUM_LEVELS];
    let mut queue_outflow = [QueueOutflows::default(); NUM_LEVELS];
    let mut queues = [0.0; NUM_LEVELS];
    for k in 0..NUM_LEVELS {
        admitted[k] = desired[k] * admit_share;
        let unmet = desired[k] - admitted[k];
        diverted[k] = unmet * prevention;
        queue_inflow[k] = unmet - diverted[k];

        let departures = level_deaths[k] + level_resolved[k] + referred_up[k];
        let occupancy_after = state.levels[k] - departures + admitted[k];
        let headroom = level_capacity(params, population, k) - occupancy_after;
        let rates = QueueRates {
            clearance: gated_clearance_rate(
                state.queues[k],
                params.queue_clearance_rate,
                headroom,
                expansion,
            ),
            ..queue_rates_base
        };
        let (out, remaining) = advance_queue(state.queues[k], &rates);
        queue_outflow[k] = out;
        queues[k] = remaining + queue_inflow[k];
    }

    // ── Assemble next state ──
    let abandoned: f64 = queue_outflow.iter().map(|o| o.abandoned).sum();
    let bypassed: f64 = queue_outflow.iter().map(|o| o.bypassed).sum();
    let queue_resolved: f64 = queue_outflow.iter().map(|o| o.self_resolved).sum();
    let queue_deaths: f64 = queue_outflow.iter().map(|o| o.deaths).sum();

    let mut next = state.clone();
    next.week = state.week + 1;
    next.untreated = stock(state.untreated - u_deaths - u_resolved + new_untreated + abandoned);
    next.informal = stock(
        state.informal - i_deaths - i_resolved - i_to_formal
            + new_informal
            + bypassed
            + diverted.iter().sum::<f64>(),
    );
    next.seeking_formal = stock(new_seeking + i_to_formal + held_back);
    for k in 0..NUM_LEVELS {
        next.levels[k] = stock(
            state.levels[k] - level_deaths[k] - level_resolved[k] - referred_up[k]
                + admitted[k]
                + queue_outflow[k].cleared,
        );
        next.queues[k] = stock(queues[k]);
    }

    next.resolved = sanitize(
        state.resolved
            + home_resolved
            + u_resolved
            + i_resolved
            + level_resolved.iter().sum::<f64>()
            + queue_resolved,
    );
    next.dead = sanitize(
        state.dead + u_deaths + i_deaths + level_deaths.iter().sum::<f64>() + queue_deaths,
    );
    next.queue_deaths = sanitize(state.queue_deaths + queue_deaths);

    let stay_factor = 1.0 - unit(params.length_of_stay_reduction);
    next.patient_days.untreated += DAYS_PER_WEEK * next.untreated;
    next.patient_days.informal += DAYS_PER_WEEK * next.informal;
    for k in 0..NUM_LEVELS {
        next.patient_days.levels[k] += DAYS_PER_WEEK * next.levels[k] * stay_factor;
    }
    if params.ai_active {
        next.episodes_touched += incidence;
    }

    let flows = WeeklyFlows {
        congestion,
        incidence,
        home_resolved,
        held_back,
        desired,
        admitted,
        diverted,
        queue_inflow,
        queue_outflow,
    };
    (next, flows)
}

/// Stocks are sanitized and never negative.
fn stock(value: f64) -> f64 {
    sanitize(value).max(0.0)
}
